//! Release configuration.

use attrel_core::ConfigError;
use attrel_filter::FilterConfig;
use serde::{Deserialize, Serialize};

/// Root attribute release configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [filter.script]
/// enabled = true
/// max_operations = 10000
///
/// [transcoding]
/// strict_decode = false
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Filtering engine configuration.
    pub filter: FilterConfig,

    /// Transcoding configuration.
    pub transcoding: TranscodingConfig,
}

impl ReleaseConfig {
    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first section's `ConfigError`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.filter.validate()?;
        self.transcoding.validate()
    }
}

/// Transcoding configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TranscodingConfig {
    /// Reject inbound wire objects no rule can decode.
    /// When false they are logged and skipped.
    pub strict_decode: bool,
}

impl TranscodingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ReleaseConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.transcoding.strict_decode);
    }

    #[test]
    fn test_partial_deserialization() {
        let config: ReleaseConfig =
            serde_json::from_str(r#"{"transcoding": {"strict_decode": true}}"#).unwrap();
        assert!(config.transcoding.strict_decode);
        assert!(config.filter.script.enabled);
    }

    #[test]
    fn test_invalid_filter_section() {
        let config: ReleaseConfig =
            serde_json::from_str(r#"{"filter": {"script": {"max_operations": 0}}}"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(_))
        ));
    }
}
