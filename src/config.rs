//! Rule parameters, global settings and host capabilities.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// A single rule parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(untagged)
)]
pub enum ParamValue {
    /// Integer parameter
    Integer(i64),
    /// Boolean parameter
    Boolean(bool),
    /// String parameter
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Integer(n) => write!(f, "{}", n),
            ParamValue::Boolean(b) => write!(f, "{}", b),
            ParamValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Integer(value)
    }
}

/// Parameters of one rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct RuleParams {
    values: BTreeMap<String, ParamValue>,
}

impl RuleParams {
    /// Empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Raw value of a parameter.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    /// String parameter, or `default` when unset.
    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .map(ToString::to_string)
            .unwrap_or_else(|| default.to_string())
    }

    /// String parameter that must be set and non-empty.
    pub fn require_str(&self, rule: &str, key: &str) -> Result<String> {
        match self.values.get(key) {
            Some(value) if !value.to_string().trim().is_empty() => Ok(value.to_string()),
            _ => Err(Error::Configuration {
                rule: rule.to_string(),
                message: format!("missing required parameter '{}'", key),
            }),
        }
    }

    /// Non-negative integer parameter, or `default` when unset.
    pub fn get_usize(&self, rule: &str, key: &str, default: usize) -> Result<usize> {
        match self.get_optional_u64(rule, key)? {
            None => Ok(default),
            Some(n) => usize::try_from(n).map_err(|_| out_of_range(rule, key, n)),
        }
    }

    /// Optional platform version parameter.
    pub fn get_version(&self, rule: &str, key: &str) -> Result<Option<u32>> {
        self.get_optional_u64(rule, key)?
            .map(|n| u32::try_from(n).map_err(|_| out_of_range(rule, key, n)))
            .transpose()
    }

    fn get_optional_u64(&self, rule: &str, key: &str) -> Result<Option<u64>> {
        let invalid = |value: &ParamValue| Error::Configuration {
            rule: rule.to_string(),
            message: format!("parameter '{}' is not a non-negative integer: {}", key, value),
        };
        match self.values.get(key) {
            None => Ok(None),
            Some(ParamValue::Integer(n)) => u64::try_from(*n)
                .map(Some)
                .map_err(|_| invalid(&ParamValue::Integer(*n))),
            Some(value @ ParamValue::Text(text)) => {
                text.trim().parse().map(Some).map_err(|_| invalid(value))
            }
            Some(value) => Err(invalid(value)),
        }
    }
}

fn out_of_range(rule: &str, key: &str, value: u64) -> Error {
    Error::Configuration {
        rule: rule.to_string(),
        message: format!("parameter '{}' is out of range: {}", key, value),
    }
}

/// Global settings shared by all checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct Settings {
    /// Minimum platform version targeted by the analysed project
    pub min_platform_version: Option<u32>,
}

impl Settings {
    /// Settings for a project whose oldest supported platform is `version`.
    pub fn with_min_platform_version(version: u32) -> Self {
        Self {
            min_platform_version: Some(version),
        }
    }

    /// Whether the project may run on a platform older than `version`.
    ///
    /// A project without a declared minimum may run anywhere.
    pub fn supports_platform_below(&self, version: u32) -> bool {
        self.min_platform_version.map_or(true, |min| min < version)
    }
}

/// What the embedding host accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    /// Host has a channel for analysis errors
    pub analysis_errors: bool,
    /// Host can display secondary locations
    pub secondary_locations: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            analysis_errors: true,
            secondary_locations: true,
        }
    }
}

/// Enabled rules with their parameters, plus global settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct AnalyzerConfig {
    /// Enabled rules, keyed by rule key
    pub rules: BTreeMap<String, RuleParams>,
    /// Global settings
    pub settings: Settings,
}

impl AnalyzerConfig {
    /// Every built-in rule with default parameters.
    ///
    /// `XPathCheck` is left out since it has no meaningful default
    /// expression.
    pub fn all_rules() -> Self {
        let rules = crate::checks::BUILTIN_RULES
            .iter()
            .filter(|&&key| key != crate::checks::XPATH_RULE)
            .map(|&key| (key.to_string(), RuleParams::new()))
            .collect();
        Self {
            rules,
            settings: Settings::default(),
        }
    }

    /// Enables a rule.
    pub fn enable(mut self, rule: impl Into<String>, params: RuleParams) -> Self {
        self.rules.insert(rule.into(), params);
        self
    }

    /// Whether a rule is enabled.
    pub fn is_enabled(&self, rule: &str) -> bool {
        self.rules.contains_key(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_usize() {
        let params = RuleParams::new()
            .with("indentSize", 4i64)
            .with("tabSize", "8")
            .with("bad", "x")
            .with("negative", -1i64);
        assert_eq!(params.get_usize("R", "indentSize", 2).unwrap(), 4);
        assert_eq!(params.get_usize("R", "tabSize", 2).unwrap(), 8);
        assert_eq!(params.get_usize("R", "missing", 2).unwrap(), 2);
        assert!(matches!(
            params.get_usize("R", "bad", 2),
            Err(Error::Configuration { ref rule, .. }) if rule == "R"
        ));
        assert!(params.get_usize("R", "negative", 2).is_err());
    }

    #[test]
    fn test_get_version() {
        let params = RuleParams::new()
            .with("untilPlatformVersion", 21i64)
            .with("huge", 1i64 << 40);
        assert_eq!(params.get_version("R", "untilPlatformVersion").unwrap(), Some(21));
        assert_eq!(params.get_version("R", "missing").unwrap(), None);
        assert!(params.get_version("R", "huge").is_err());
    }

    #[test]
    fn test_supports_platform_below() {
        assert!(Settings::default().supports_platform_below(21));
        assert!(Settings::with_min_platform_version(16).supports_platform_below(21));
        assert!(!Settings::with_min_platform_version(21).supports_platform_below(21));
        assert!(!Settings::with_min_platform_version(26).supports_platform_below(21));
    }

    #[test]
    fn test_strings() {
        let params = RuleParams::new().with("expression", "//a").with("blank", " ");
        assert_eq!(params.get_str("expression", ""), "//a");
        assert_eq!(params.get_str("message", "default"), "default");
        assert!(params.require_str("XPathCheck", "blank").is_err());
        assert!(params.require_str("XPathCheck", "missing").is_err());
    }

    #[test]
    fn test_all_rules() {
        let config = AnalyzerConfig::all_rules();
        assert!(config.is_enabled("TabCharacterCheck"));
        assert!(config.is_enabled("ParsingError"));
        assert!(!config.is_enabled("XPathCheck"));
    }
}
