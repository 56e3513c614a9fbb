//! Fixed description of the third-party page: its URL and how each control
//! is recognised. Tied to the page's current markup.

use std::time::Duration;

use crate::browser::Selector;

pub const TARGET_URL: &str = "https://teraboxdl.site/";

/// Short name used in log lines.
pub const TARGET_NAME: &str = "teraboxdl.site";

pub fn consent_button() -> Selector {
    Selector::with_text("button", "Accept All")
}

/// One way of locating the link input, with how long to wait for it.
#[derive(Debug, Clone)]
pub struct InputStrategy {
    pub selector: Selector,
    /// `None` waits for the configured input timeout; `Some(ZERO)` probes once.
    pub wait: Option<Duration>,
    pub label: &'static str,
}

/// Ordered fallback chain for the link input. First match wins.
pub fn link_input_strategies() -> Vec<InputStrategy> {
    vec![
        InputStrategy {
            selector: Selector::css(r#"input[placeholder*="Terabox"]"#),
            wait: None,
            label: "input",
        },
        InputStrategy {
            selector: Selector::css("input, textarea"),
            wait: Some(Duration::ZERO),
            label: "fallback input selector",
        },
    ]
}

pub const FETCH_LABEL: &str = "Download & Stream";

pub fn fetch_button() -> Selector {
    Selector::with_text("button", FETCH_LABEL)
}

pub fn play_control() -> Selector {
    Selector::css("svg.lucide-play")
}

pub const FINAL_LABEL: &str = "Download Video";

pub fn final_download_button() -> Selector {
    Selector::with_text("button", FINAL_LABEL)
}
