//! Dashboard settings: match-value specs and autonomous selector lists.
//!
//! Parsed once at startup and validated before the server starts. Never
//! mutated afterwards.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{BroadcasterError, Result};
use crate::log::LogLevel;
use crate::wire;

const DEFAULT_DIAL_MIN: f64 = 0.0;
const DEFAULT_DIAL_MAX: f64 = 10.0;

/// How a match value is rendered on the match page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchValueType {
    Value,
    Boolean,
    Other,
    Auto,
    Dial,
    Log,
}

impl MatchValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchValueType::Value => "value",
            MatchValueType::Boolean => "boolean",
            MatchValueType::Other => "other",
            MatchValueType::Auto => "auto",
            MatchValueType::Dial => "dial",
            MatchValueType::Log => "log",
        }
    }

    /// Value published when the store has no entry for the key
    pub fn default_value(&self) -> &'static str {
        match self {
            MatchValueType::Dial => "0",
            _ => "",
        }
    }
}

/// One published field of the match topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchValueSpec {
    /// Store key the value is read from
    pub key: String,

    #[serde(rename = "type")]
    pub kind: MatchValueType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Dial lower bound (dial only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Dial upper bound (dial only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Minimum level of embedded log entries (log only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,
}

impl MatchValueSpec {
    pub fn new(key: impl Into<String>, kind: MatchValueType) -> Self {
        Self {
            key: key.into(),
            kind,
            display_name: None,
            min: None,
            max: None,
            level: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// Name shown on the dashboard
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.key)
    }

    pub fn min(&self) -> f64 {
        self.min.unwrap_or(DEFAULT_DIAL_MIN)
    }

    pub fn max(&self) -> f64 {
        self.max.unwrap_or(DEFAULT_DIAL_MAX)
    }

    pub fn threshold(&self) -> LogLevel {
        self.level.unwrap_or(LogLevel::Info)
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(BroadcasterError::InvalidSettings(reason));

        if self.key.trim().is_empty() {
            return invalid("match value with empty key".to_string());
        }
        if wire::contains_reserved(self.name()) {
            return invalid(format!("match value {} has a reserved token in its name", self.key));
        }
        if self.kind != MatchValueType::Dial && (self.min.is_some() || self.max.is_some()) {
            return invalid(format!("min/max set on non-dial match value {}", self.key));
        }
        if self.kind != MatchValueType::Log && self.level.is_some() {
            return invalid(format!("level set on non-log match value {}", self.key));
        }
        if self.min() > self.max() {
            return invalid(format!(
                "dial {} has min {} greater than max {}",
                self.key,
                self.min(),
                self.max()
            ));
        }
        Ok(())
    }
}

/// Option lists for the autonomous route selector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutonomousOptions {
    pub origins: Vec<String>,
    pub destinations: Vec<String>,
    pub actions: Vec<String>,
}

impl AutonomousOptions {
    fn validate(&self) -> Result<()> {
        let lists = [
            ("origins", &self.origins),
            ("destinations", &self.destinations),
            ("actions", &self.actions),
        ];

        for (list, options) in lists {
            if let Some(bad) = options.iter().find(|o| wire::contains_reserved(o)) {
                return Err(BroadcasterError::InvalidSettings(format!(
                    "auto {} entry {:?} contains a reserved token",
                    list, bad
                )));
            }
        }
        Ok(())
    }
}

/// The `webdashboard` configuration category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardSettings {
    /// Published in this order
    pub match_values: Vec<MatchValueSpec>,
    pub auto_selector: AutonomousOptions,
}

impl DashboardSettings {
    /// Reject malformed entries up front
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for spec in &self.match_values {
            spec.validate()?;
            if !seen.insert(spec.key.as_str()) {
                return Err(BroadcasterError::InvalidSettings(format!(
                    "duplicate match value key {}",
                    spec.key
                )));
            }
        }

        self.auto_selector.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(spec: MatchValueSpec) -> DashboardSettings {
        DashboardSettings {
            match_values: vec![spec],
            ..Default::default()
        }
    }

    #[test]
    fn test_spec_defaults() {
        let dial = MatchValueSpec::new("ipn_speed", MatchValueType::Dial);
        assert_eq!(dial.name(), "ipn_speed");
        assert_eq!(dial.min(), 0.0);
        assert_eq!(dial.max(), 10.0);

        let log = MatchValueSpec::new("log", MatchValueType::Log);
        assert_eq!(log.threshold(), LogLevel::Info);

        let named = MatchValueSpec::new("auto", MatchValueType::Auto).with_display_name("Selected Auto");
        assert_eq!(named.name(), "Selected Auto");
    }

    #[test]
    fn test_valid_settings() {
        let settings = DashboardSettings {
            match_values: vec![
                MatchValueSpec::new("ipn_speed", MatchValueType::Dial).with_range(0.0, 5.0),
                MatchValueSpec::new("log", MatchValueType::Log).with_level(LogLevel::Warn),
                MatchValueSpec::new("ips_selected_auto", MatchValueType::Auto),
            ],
            auto_selector: AutonomousOptions {
                origins: vec!["Left".to_string(), "Right".to_string()],
                destinations: vec!["Scale".to_string()],
                actions: vec!["Score".to_string()],
            },
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_rejects_duplicate_keys() {
        let settings = DashboardSettings {
            match_values: vec![
                MatchValueSpec::new("a", MatchValueType::Value),
                MatchValueSpec::new("a", MatchValueType::Boolean),
            ],
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(BroadcasterError::InvalidSettings(_))));
    }

    #[test]
    fn test_rejects_misplaced_fields() {
        let mut spec = MatchValueSpec::new("a", MatchValueType::Value);
        spec.min = Some(1.0);
        assert!(settings_with(spec).validate().is_err());

        let mut spec = MatchValueSpec::new("b", MatchValueType::Dial);
        spec.level = Some(LogLevel::Error);
        assert!(settings_with(spec).validate().is_err());

        let spec = MatchValueSpec::new("c", MatchValueType::Dial).with_range(10.0, 1.0);
        assert!(settings_with(spec).validate().is_err());

        let spec = MatchValueSpec::new("  ", MatchValueType::Value);
        assert!(settings_with(spec).validate().is_err());
    }

    #[test]
    fn test_rejects_reserved_tokens() {
        let spec = MatchValueSpec::new("a", MatchValueType::Value).with_display_name("x~y");
        assert!(settings_with(spec).validate().is_err());

        let settings = DashboardSettings {
            auto_selector: AutonomousOptions {
                origins: vec!["Left&Right".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
