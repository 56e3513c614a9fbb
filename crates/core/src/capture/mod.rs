//! Download capture: size policy, promotion into the output directory and
//! temp cleanup.

mod error;
mod policy;
mod promote;

pub use error::CaptureError;
pub use policy::{megabytes, output_file_name, SizeCeiling};
pub use promote::{CaptureOutcome, DownloadCapture};
