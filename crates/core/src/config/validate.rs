use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Viewport dimensions are non-zero
/// - Size ceiling is non-zero
/// - Play probing makes at least one attempt
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.browser.viewport_width == 0 || config.browser.viewport_height == 0 {
        return Err(ConfigError::ValidationError(
            "browser viewport dimensions must be non-zero".to_string(),
        ));
    }

    if config.downloads.max_file_size_mb == 0 {
        return Err(ConfigError::ValidationError(
            "downloads.max_file_size_mb cannot be 0".to_string(),
        ));
    }

    if config.flow.play_probe_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "flow.play_probe_attempts must be at least 1".to_string(),
        ));
    }

    Ok(())
}
