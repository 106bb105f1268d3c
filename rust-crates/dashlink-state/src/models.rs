//! Typed values shared between the state store, the event bus and the
//! dashboard broadcaster.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// A named group of numeric components (e.g. `{x: 1.0, y: 2.0}`).
///
/// Sorted so rendering is deterministic.
pub type Vector = BTreeMap<String, f64>;

/// Operating mode of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Autonomous,
    Teleop,
    Disabled,
    Test,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Autonomous => write!(f, "autonomous"),
            Mode::Teleop => write!(f, "teleop"),
            Mode::Disabled => write!(f, "disabled"),
            Mode::Test => write!(f, "test"),
        }
    }
}

impl FromStr for Mode {
    type Err = StateError;

    /// Parse the short names used by dashboard clients.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Mode::Autonomous),
            "teleop" => Ok(Mode::Teleop),
            "disabled" => Ok(Mode::Disabled),
            "test" => Ok(Mode::Test),
            other => Err(StateError::UnknownMode(other.to_string())),
        }
    }
}

/// Value written by an output (actuator) channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputValue {
    Numeric(f64),
    Boolean(bool),
    Text(String),
}

impl fmt::Display for OutputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputValue::Numeric(v) => f.write_str(&format_decimal(*v)),
            OutputValue::Boolean(b) => write!(f, "{}", b),
            OutputValue::Text(s) => f.write_str(s),
        }
    }
}

/// Mutation requested by a remote client, published on the event bus.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    NumericSet { name: String, value: f64 },
    BooleanSet { name: String, value: bool },
    VectorSet { name: String, value: Vector },
}

impl StateEvent {
    /// Key of the value being changed
    pub fn name(&self) -> &str {
        match self {
            StateEvent::NumericSet { name, .. }
            | StateEvent::BooleanSet { name, .. }
            | StateEvent::VectorSet { name, .. } => name,
        }
    }
}

/// Render a number in shortest round-trip form, keeping a trailing `.0`
/// on integral values (`12.0`, `0.25`).
pub fn format_decimal(value: f64) -> String {
    format!("{:?}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!("auto".parse::<Mode>().unwrap(), Mode::Autonomous);
        assert_eq!("teleop".parse::<Mode>().unwrap(), Mode::Teleop);
        assert_eq!("disabled".parse::<Mode>().unwrap(), Mode::Disabled);
        assert_eq!("test".parse::<Mode>().unwrap(), Mode::Test);
        assert!("AUTO".parse::<Mode>().is_err());
        assert!("autonomous".parse::<Mode>().is_err());
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(12.0), "12.0");
        assert_eq!(format_decimal(0.25), "0.25");
        assert_eq!(format_decimal(-3.5), "-3.5");
    }

    #[test]
    fn test_output_display() {
        assert_eq!(OutputValue::Numeric(1.0).to_string(), "1.0");
        assert_eq!(OutputValue::Boolean(true).to_string(), "true");
        assert_eq!(OutputValue::Text("ok".to_string()).to_string(), "ok");
    }
}
