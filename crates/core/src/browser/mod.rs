//! Browser automation seam.
//!
//! [`BrowserDriver`] launches one isolated session (browser process,
//! browsing context, page) per link; [`BrowserSession`] exposes the handful
//! of page interactions the step executor needs; [`PendingDownload`] is the
//! transfer started by the final click. [`SessionDriver`] wraps a driver with
//! the open/close bookkeeping the pipeline relies on.
//!
//! The production backend is [`ChromiumDriver`] (Chrome DevTools Protocol
//! via chromiumoxide). Tests use `testing::MockBrowserDriver`.

mod chromium;
mod error;
mod session;
mod traits;
mod types;

pub use chromium::ChromiumDriver;
pub use error::SessionError;
pub use session::SessionDriver;
pub use traits::{BrowserDriver, BrowserSession, PendingDownload};
pub use types::{LaunchOptions, Selector};
