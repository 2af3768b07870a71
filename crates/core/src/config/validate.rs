use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Both buckets are set
/// - Server port is not 0
/// - At least one storage attempt is allowed
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.storage.input_bucket.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "INPUT_BUCKET (storage.input_bucket) is required".to_string(),
        ));
    }

    if config.storage.output_bucket.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "OUTPUT_BUCKET (storage.output_bucket) is required".to_string(),
        ));
    }

    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.retry.attempts == 0 {
        return Err(ConfigError::ValidationError(
            "retry.attempts must be at least 1".to_string(),
        ));
    }

    Ok(())
}
