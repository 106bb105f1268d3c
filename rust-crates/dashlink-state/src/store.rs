//! Telemetry state store
//!
//! The store owns the live values. Readers take full copies per kind so
//! nothing is borrowed across a broadcast.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::models::{OutputValue, StateEvent, Vector};

/// Read/write access to the machine's telemetry values.
pub trait StateStore: Send + Sync {
    fn numerics(&self) -> HashMap<String, f64>;
    fn booleans(&self) -> HashMap<String, bool>;
    fn strings(&self) -> HashMap<String, String>;
    fn vectors(&self) -> HashMap<String, Vector>;
    fn outputs(&self) -> HashMap<String, OutputValue>;

    fn get_string(&self, key: &str) -> Option<String>;
    fn set_string(&self, key: &str, value: &str);

    fn get_vector(&self, key: &str) -> Option<Vector>;

    fn set_numeric(&self, key: &str, value: f64);
}

#[derive(Debug, Default)]
struct Values {
    numerics: HashMap<String, f64>,
    booleans: HashMap<String, bool>,
    strings: HashMap<String, String>,
    vectors: HashMap<String, Vector>,
    outputs: HashMap<String, OutputValue>,
}

/// Process-local store backed by a single lock
#[derive(Debug, Default)]
pub struct InMemoryStore {
    values: RwLock<Values>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_boolean(&self, key: &str, value: bool) {
        self.values.write().booleans.insert(key.to_string(), value);
    }

    pub fn set_vector(&self, key: &str, value: Vector) {
        self.values.write().vectors.insert(key.to_string(), value);
    }

    pub fn set_output(&self, key: &str, value: OutputValue) {
        self.values.write().outputs.insert(key.to_string(), value);
    }

    pub fn get_numeric(&self, key: &str) -> Option<f64> {
        self.values.read().numerics.get(key).copied()
    }

    pub fn get_boolean(&self, key: &str) -> Option<bool> {
        self.values.read().booleans.get(key).copied()
    }

    /// Apply a mutation event published by a dashboard client
    pub fn apply(&self, event: &StateEvent) {
        debug!("Applying {:?}", event);
        match event {
            StateEvent::NumericSet { name, value } => self.set_numeric(name, *value),
            StateEvent::BooleanSet { name, value } => self.set_boolean(name, *value),
            StateEvent::VectorSet { name, value } => self.set_vector(name, value.clone()),
        }
    }
}

impl StateStore for InMemoryStore {
    fn numerics(&self) -> HashMap<String, f64> {
        self.values.read().numerics.clone()
    }

    fn booleans(&self) -> HashMap<String, bool> {
        self.values.read().booleans.clone()
    }

    fn strings(&self) -> HashMap<String, String> {
        self.values.read().strings.clone()
    }

    fn vectors(&self) -> HashMap<String, Vector> {
        self.values.read().vectors.clone()
    }

    fn outputs(&self) -> HashMap<String, OutputValue> {
        self.values.read().outputs.clone()
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.values.read().strings.get(key).cloned()
    }

    fn set_string(&self, key: &str, value: &str) {
        self.values
            .write()
            .strings
            .insert(key.to_string(), value.to_string());
    }

    fn get_vector(&self, key: &str) -> Option<Vector> {
        self.values.read().vectors.get(key).cloned()
    }

    fn set_numeric(&self, key: &str, value: f64) {
        self.values.write().numerics.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshots_are_copies() {
        let store = InMemoryStore::new();
        store.set_numeric("temp", 10.0);

        let mut snapshot = store.numerics();
        snapshot.insert("temp".to_string(), 99.0);

        assert_eq!(store.get_numeric("temp"), Some(10.0));
    }

    #[test]
    fn test_apply_events() {
        let store = InMemoryStore::new();

        store.apply(&StateEvent::NumericSet { name: "speed".to_string(), value: 2.5 });
        store.apply(&StateEvent::BooleanSet { name: "armed".to_string(), value: true });

        let mut vector = Vector::new();
        vector.insert("x".to_string(), 1.0);
        store.apply(&StateEvent::VectorSet { name: "pose".to_string(), value: vector.clone() });

        assert_eq!(store.get_numeric("speed"), Some(2.5));
        assert_eq!(store.get_boolean("armed"), Some(true));
        assert_eq!(store.get_vector("pose"), Some(vector));
    }

    #[test]
    fn test_strings() {
        let store = InMemoryStore::new();
        assert_eq!(store.get_string("missing"), None);

        store.set_string("ips_selected_auto", "No Auto");
        assert_eq!(store.get_string("ips_selected_auto").as_deref(), Some("No Auto"));
        assert_eq!(store.strings().len(), 1);
    }
}
