//! Filtering engine configuration.

use attrel_core::ConfigError;
use serde::{Deserialize, Serialize};

/// Filtering configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [filter.script]
/// enabled = true
/// max_operations = 10000
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Scripted rule and matcher configuration.
    pub script: ScriptConfig,
}

impl FilterConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if scripting is enabled with a zero limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.script.validate()
    }
}

/// Expression evaluator limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Enable scripted rules and matchers.
    pub enabled: bool,

    /// Maximum operations per evaluation.
    /// Prevents runaway expressions on the request path.
    pub max_operations: u64,

    /// Maximum function call depth.
    pub max_call_levels: usize,

    /// Maximum expression nesting depth.
    pub max_expr_depth: usize,

    /// Maximum length of any string produced during evaluation.
    pub max_string_size: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_operations: 10_000,
            max_call_levels: 32,
            max_expr_depth: 64,
            max_string_size: 10_000,
        }
    }
}

impl ScriptConfig {
    /// Validates the limits. Disabled scripting skips validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.max_operations == 0 {
            return Err(ConfigError::invalid_value(
                "script.max_operations must be greater than 0",
            ));
        }
        if self.max_call_levels == 0 {
            return Err(ConfigError::invalid_value(
                "script.max_call_levels must be greater than 0",
            ));
        }
        if self.max_expr_depth == 0 {
            return Err(ConfigError::invalid_value(
                "script.max_expr_depth must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(FilterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_operations_fails_validation() {
        let mut config = FilterConfig::default();
        config.script.max_operations = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_operations"));
    }

    #[test]
    fn test_disabled_script_skips_validation() {
        let mut config = FilterConfig::default();
        config.script.enabled = false;
        config.script.max_operations = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialization() {
        let config: FilterConfig =
            serde_json::from_str(r#"{"script": {"max_operations": 50}}"#).unwrap();
        assert_eq!(config.script.max_operations, 50);
        assert!(config.script.enabled);
        assert_eq!(config.script.max_call_levels, 32);
    }
}
