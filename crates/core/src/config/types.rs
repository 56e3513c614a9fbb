use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
    #[serde(default)]
    pub flow: FlowConfig,
}

/// Control server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    7878
}

/// Browser launch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    /// Path to a Chromium-family executable (Chrome, Brave, Edge).
    /// When unset, chromiumoxide looks for a system install.
    #[serde(default)]
    pub executable: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
    /// Extra command-line switches passed to the browser process.
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Timeout for individual DevTools requests, including launch (seconds).
    #[serde(default = "default_launch_timeout")]
    pub launch_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            extra_args: Vec::new(),
            launch_timeout_secs: default_launch_timeout(),
        }
    }
}

impl BrowserConfig {
    pub fn launch_timeout(&self) -> Duration {
        Duration::from_secs(self.launch_timeout_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    800
}

fn default_launch_timeout() -> u64 {
    30
}

/// Where downloads land and what is accepted
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadsConfig {
    /// Final destination for `vid<N>.mp4` files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Root for per-session browser download directories.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    /// Size ceiling in megabytes (1 MB = 1024 * 1024 bytes).
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            staging_dir: default_staging_dir(),
            max_file_size_mb: default_max_file_size_mb(),
        }
    }
}

impl DownloadsConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// `~/Documents/TeraDownload`, falling back to the home directory and
/// finally the working directory on platforms without either.
pub fn default_output_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Documents")))
        .unwrap_or_default()
        .join("TeraDownload")
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir().join("teradl-staging")
}

fn default_max_file_size_mb() -> u64 {
    100
}

/// Which step sequence the target page currently uses.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlowVariant {
    /// Fetch/stream, then play, then download.
    #[default]
    StreamPlay,
    /// Fetch, then download directly.
    Direct,
}

impl FlowVariant {
    pub fn has_play_step(&self) -> bool {
        matches!(self, Self::StreamPlay)
    }
}

/// UI step timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlowConfig {
    #[serde(default)]
    pub variant: FlowVariant,
    /// Interval between element probes while waiting (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_consent_timeout")]
    pub consent_timeout_ms: u64,
    #[serde(default = "default_input_timeout")]
    pub input_timeout_ms: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_ms: u64,
    #[serde(default = "default_play_probe_attempts")]
    pub play_probe_attempts: u32,
    #[serde(default = "default_play_probe_interval")]
    pub play_probe_interval_ms: u64,
    /// Pause after clicking play so the download page can render.
    #[serde(default = "default_play_settle")]
    pub play_settle_ms: u64,
    #[serde(default = "default_final_timeout")]
    pub final_timeout_ms: u64,
    /// Pause after scrolling the final button into view.
    #[serde(default = "default_final_settle")]
    pub final_settle_ms: u64,
    #[serde(default = "default_download_start_timeout")]
    pub download_start_timeout_ms: u64,
}

fn default_poll_interval() -> u64 {
    250
}

fn default_consent_timeout() -> u64 {
    5_000
}

fn default_input_timeout() -> u64 {
    8_000
}

fn default_fetch_timeout() -> u64 {
    15_000
}

fn default_play_probe_attempts() -> u32 {
    20
}

fn default_play_probe_interval() -> u64 {
    1_000
}

fn default_play_settle() -> u64 {
    2_000
}

fn default_final_timeout() -> u64 {
    30_000
}

fn default_final_settle() -> u64 {
    500
}

fn default_download_start_timeout() -> u64 {
    60_000
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            variant: FlowVariant::default(),
            poll_interval_ms: default_poll_interval(),
            consent_timeout_ms: default_consent_timeout(),
            input_timeout_ms: default_input_timeout(),
            fetch_timeout_ms: default_fetch_timeout(),
            play_probe_attempts: default_play_probe_attempts(),
            play_probe_interval_ms: default_play_probe_interval(),
            play_settle_ms: default_play_settle(),
            final_timeout_ms: default_final_timeout(),
            final_settle_ms: default_final_settle(),
            download_start_timeout_ms: default_download_start_timeout(),
        }
    }
}

impl FlowConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn consent_timeout(&self) -> Duration {
        Duration::from_millis(self.consent_timeout_ms)
    }

    pub fn input_timeout(&self) -> Duration {
        Duration::from_millis(self.input_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn play_probe_interval(&self) -> Duration {
        Duration::from_millis(self.play_probe_interval_ms)
    }

    pub fn play_settle(&self) -> Duration {
        Duration::from_millis(self.play_settle_ms)
    }

    pub fn final_timeout(&self) -> Duration {
        Duration::from_millis(self.final_timeout_ms)
    }

    pub fn final_settle(&self) -> Duration {
        Duration::from_millis(self.final_settle_ms)
    }

    pub fn download_start_timeout(&self) -> Duration {
        Duration::from_millis(self.download_start_timeout_ms)
    }
}

/// Sanitized config for API responses (local paths of the browser reduced
/// to flags)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub browser: SanitizedBrowserConfig,
    pub downloads: SanitizedDownloadsConfig,
    pub flow: FlowConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedBrowserConfig {
    pub executable_configured: bool,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub extra_args_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDownloadsConfig {
    pub output_dir: PathBuf,
    pub max_file_size_mb: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            browser: SanitizedBrowserConfig {
                executable_configured: config.browser.executable.is_some(),
                headless: config.browser.headless,
                viewport_width: config.browser.viewport_width,
                viewport_height: config.browser.viewport_height,
                extra_args_count: config.browser.extra_args.len(),
            },
            downloads: SanitizedDownloadsConfig {
                output_dir: config.downloads.output_dir.clone(),
                max_file_size_mb: config.downloads.max_file_size_mb,
            },
            flow: config.flow.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 7878);
        assert!(config.browser.headless);
        assert_eq!(config.browser.viewport_width, 1280);
        assert_eq!(config.browser.viewport_height, 800);
        assert_eq!(config.downloads.max_file_size_mb, 100);
        assert_eq!(config.flow.variant, FlowVariant::StreamPlay);
        assert!(config.downloads.output_dir.ends_with("TeraDownload"));
    }

    #[test]
    fn test_max_file_size_bytes() {
        let downloads = DownloadsConfig {
            max_file_size_mb: 100,
            ..Default::default()
        };
        assert_eq!(downloads.max_file_size_bytes(), 104_857_600);
    }

    #[test]
    fn test_deserialize_flow_variant() {
        let flow: FlowConfig = toml::from_str(r#"variant = "direct""#).unwrap();
        assert_eq!(flow.variant, FlowVariant::Direct);
        assert!(!flow.variant.has_play_step());
        assert_eq!(flow.fetch_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_sanitized_config_hides_browser_path() {
        let mut config = Config::default();
        config.browser.executable = Some(PathBuf::from("/opt/brave/brave"));
        config.browser.extra_args = vec!["--proxy-server=corp:3128".into()];

        let sanitized = SanitizedConfig::from(&config);
        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(sanitized.browser.executable_configured);
        assert_eq!(sanitized.browser.extra_args_count, 1);
        assert!(!json.contains("brave"));
        assert!(!json.contains("corp"));
    }
}
