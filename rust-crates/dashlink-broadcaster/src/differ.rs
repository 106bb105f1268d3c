//! Per-topic delta computation
//!
//! Each differ keeps the last values it published and renders only the
//! entries that changed since then. Clearing a cache makes the next diff
//! publish everything.

use std::collections::HashMap;

use dashlink_state::{format_decimal, OutputValue, StateStore, Vector};

use crate::log::LogEvent;
use crate::settings::{MatchValueSpec, MatchValueType};
use crate::wire::{MATCH_FIELD_SEPARATOR, VALUE_FIELD_SEPARATOR};

/// Cached value meaning "the log field had nothing to show"
pub const EMPTY_LOG_SENTINEL: &str = "empty";

/// Copy of every value kind taken at one instant
#[derive(Debug, Clone, Default)]
pub struct ValuesSnapshot {
    pub numerics: HashMap<String, f64>,
    pub booleans: HashMap<String, bool>,
    pub strings: HashMap<String, String>,
    pub vectors: HashMap<String, Vector>,
    pub outputs: HashMap<String, OutputValue>,
}

impl ValuesSnapshot {
    pub fn capture(store: &dyn StateStore) -> Self {
        Self {
            numerics: store.numerics(),
            booleans: store.booleans(),
            strings: store.strings(),
            vectors: store.vectors(),
            outputs: store.outputs(),
        }
    }
}

/// Last values sent on the values topic, per kind
#[derive(Debug, Default)]
pub struct ValuesDiffer {
    last: ValuesSnapshot,
}

impl ValuesDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.last = ValuesSnapshot::default();
    }

    /// Records for every entry that is new or changed.
    ///
    /// The cache is replaced by `current` in full afterwards.
    pub fn diff(&mut self, current: ValuesSnapshot) -> Vec<String> {
        let mut records = Vec::new();

        changed(&current.numerics, &self.last.numerics, same_number, &mut records, |key, v| {
            value_record("numeric", key, &format!("{:.6}", v))
        });
        changed(&current.booleans, &self.last.booleans, |a, b| a == b, &mut records, |key, v| {
            value_record("boolean", key, &v.to_string())
        });
        changed(&current.strings, &self.last.strings, |a, b| a == b, &mut records, |key, v| {
            value_record("string", key, v)
        });
        changed(&current.vectors, &self.last.vectors, |a, b| a == b, &mut records, render_vector);
        changed(&current.outputs, &self.last.outputs, |a, b| a == b, &mut records, |key, v| {
            value_record("output", key, &v.to_string())
        });

        self.last = current;
        records
    }
}

fn changed<V>(
    current: &HashMap<String, V>,
    last: &HashMap<String, V>,
    same: impl Fn(&V, &V) -> bool,
    out: &mut Vec<String>,
    render: impl Fn(&str, &V) -> String,
) {
    for (key, value) in current {
        let unchanged = last.get(key).is_some_and(|previous| same(previous, value));
        if !unchanged {
            out.push(render(key, value));
        }
    }
}

// Bitwise so NaN compares equal to itself
fn same_number(a: &f64, b: &f64) -> bool {
    a.to_bits() == b.to_bits()
}

fn value_record(kind: &str, key: &str, value: &str) -> String {
    [kind, key, value].join(VALUE_FIELD_SEPARATOR)
}

fn render_vector(key: &str, vector: &Vector) -> String {
    let mut record = format!("vector{}{}", VALUE_FIELD_SEPARATOR, key);
    for (component, value) in vector {
        record.push_str(VALUE_FIELD_SEPARATOR);
        record.push_str(component);
        record.push_str(": ");
        record.push_str(&format_decimal(*value));
    }
    record
}

/// Merge numeric, boolean, string and output values into one lookup.
///
/// Kinds are merged in that order; on a key collision the later kind wins.
pub fn merged_values(store: &dyn StateStore) -> HashMap<String, String> {
    let mut merged = HashMap::new();
    merged.extend(store.numerics().into_iter().map(|(k, v)| (k, format_decimal(v))));
    merged.extend(store.booleans().into_iter().map(|(k, v)| (k, v.to_string())));
    merged.extend(store.strings());
    merged.extend(store.outputs().into_iter().map(|(k, v)| (k, v.to_string())));
    merged
}

/// Last values sent on the match topic, keyed by match value key
#[derive(Debug, Default)]
pub struct MatchDiffer {
    last: HashMap<String, String>,
}

impl MatchDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.last.clear();
    }

    pub fn cached(&self, key: &str) -> Option<&str> {
        self.last.get(key).map(String::as_str)
    }

    /// Records for every match value that changed, in configured order.
    ///
    /// `pending_logs` is consumed by the first log entry; events below its
    /// threshold are discarded.
    pub fn diff(
        &mut self,
        specs: &[MatchValueSpec],
        values: &HashMap<String, String>,
        pending_logs: &mut Vec<LogEvent>,
    ) -> Vec<String> {
        let mut records = Vec::new();

        for spec in specs {
            if spec.kind == MatchValueType::Log {
                let text = filter_logs(std::mem::take(pending_logs), spec);
                if text.is_empty() {
                    self.last.insert(spec.key.clone(), EMPTY_LOG_SENTINEL.to_string());
                } else {
                    records.push(match_record(spec, &text));
                    self.last.insert(spec.key.clone(), text);
                }
                continue;
            }

            let value = values
                .get(&spec.key)
                .cloned()
                .unwrap_or_else(|| spec.kind.default_value().to_string());

            if self.last.get(&spec.key) == Some(&value) {
                continue;
            }

            records.push(match_record(spec, &value));
            self.last.insert(spec.key.clone(), value);
        }

        records
    }
}

fn filter_logs(events: Vec<LogEvent>, spec: &MatchValueSpec) -> String {
    let threshold = spec.threshold().priority();
    let mut text = String::new();
    for event in events.iter().filter(|e| e.level.priority() >= threshold) {
        event.render_into(&mut text);
    }
    text
}

fn match_record(spec: &MatchValueSpec, value: &str) -> String {
    let mut fields = vec![
        spec.kind.as_str().to_string(),
        spec.name().to_string(),
        value.to_string(),
    ];
    if spec.kind == MatchValueType::Dial {
        fields.push(spec.min().to_string());
        fields.push(spec.max().to_string());
    }
    fields.join(MATCH_FIELD_SEPARATOR)
}
