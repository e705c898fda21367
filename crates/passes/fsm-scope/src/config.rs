//! Naming configuration for a scope tree

use crate::error::ScopeError;
use serde::{Deserialize, Serialize};

/// How frames and generated names are spelled
///
/// Loaded from the `[scope]` table of the compiler's configuration file or
/// built with [`ScopeConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScopeConfig {
    /// Character joining path segments and names
    pub separator: char,

    /// Label of the implicit root frame
    pub root_segment: String,

    /// Prefix for automatically numbered frame labels
    pub label_prefix: String,

    /// Prefix for temporary variables
    pub temp_prefix: String,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            separator: '_',
            root_segment: "_".to_string(),
            label_prefix: "s".to_string(),
            temp_prefix: "tmp".to_string(),
        }
    }
}

impl ScopeConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::InvalidConfig` if the document is malformed or
    /// fails [`ScopeConfig::validate`].
    pub fn from_toml_str(source: &str) -> Result<Self, ScopeError> {
        let config: Self =
            toml::from_str(source).map_err(|err| ScopeError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the names this configuration produces are well formed
    ///
    /// # Errors
    ///
    /// Returns `ScopeError::InvalidConfig` for an empty prefix or root label,
    /// or a root label or frame label prefix that contains the separator.
    pub fn validate(&self) -> Result<(), ScopeError> {
        if self.root_segment.is_empty() {
            return Err(ScopeError::InvalidConfig(
                "root-segment must not be empty".to_string(),
            ));
        }
        if self.label_prefix.is_empty() || self.temp_prefix.is_empty() {
            return Err(ScopeError::InvalidConfig(
                "label-prefix and temp-prefix must not be empty".to_string(),
            ));
        }
        // A root of exactly the separator (the default `_`) is one segment.
        if self.root_segment.len() > self.separator.len_utf8()
            && self.root_segment.contains(self.separator)
        {
            return Err(ScopeError::InvalidConfig(format!(
                "root-segment `{}` contains the separator `{}`",
                self.root_segment, self.separator
            )));
        }
        if self.label_prefix.contains(self.separator) {
            return Err(ScopeError::InvalidConfig(format!(
                "label-prefix `{}` contains the separator `{}`",
                self.label_prefix, self.separator
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ScopeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ScopeConfig::from_toml_str("temp-prefix = \"t\"\n").unwrap();
        assert_eq!(config.temp_prefix, "t");
        assert_eq!(config.separator, '_');
        assert_eq!(config.label_prefix, "s");
    }

    #[test]
    fn test_full_toml() {
        let source = r#"
            separator = "$"
            root-segment = "top"
            label-prefix = "blk"
            temp-prefix = "scratch"
        "#;
        let config = ScopeConfig::from_toml_str(source).unwrap();
        assert_eq!(config.separator, '$');
        assert_eq!(config.root_segment, "top");
        assert_eq!(config.label_prefix, "blk");
        assert_eq!(config.temp_prefix, "scratch");
    }

    #[test]
    fn test_root_with_separator_rejected() {
        let result = ScopeConfig::from_toml_str("root-segment = \"top_level\"\n");
        assert!(matches!(result, Err(ScopeError::InvalidConfig(_))));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let result = ScopeConfig::from_toml_str("separator = 3\n");
        assert!(matches!(result, Err(ScopeError::InvalidConfig(_))));
    }
}
