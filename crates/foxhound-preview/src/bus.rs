//! Settings bus
//!
//! Mirrors the customizer's settings inside the preview. The controls pane
//! pushes values in with [`SettingsBus::set`]; every actual change is
//! broadcast to subscribers as a [`SettingChange`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

/// Capacity of the change broadcast channel
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// A single setting change notification
#[derive(Debug, Clone, PartialEq)]
pub struct SettingChange {
    /// Setting identifier, e.g. `post[page][42]`
    pub id: String,
    /// New value
    pub value: Value,
    /// Value before the change (`None` if the setting was just created)
    pub previous: Option<Value>,
}

impl SettingChange {
    pub fn new(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            value,
            previous: None,
        }
    }

    /// Current value of the setting
    pub fn get(&self) -> &Value {
        &self.value
    }
}

/// In-process settings registry with change notifications
#[derive(Debug)]
pub struct SettingsBus {
    values: Mutex<HashMap<String, Value>>,
    changes: broadcast::Sender<SettingChange>,
}

impl Default for SettingsBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsBus {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: Mutex::new(HashMap::new()),
            changes,
        }
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a setting's initial value without notifying
    pub fn register(&self, id: impl Into<String>, value: Value) {
        self.values().insert(id.into(), value);
    }

    /// Set a value, notifying subscribers if it changed
    ///
    /// Returns `true` if a change was emitted.
    pub fn set(&self, id: impl Into<String>, value: Value) -> bool {
        let id = id.into();
        let previous = {
            let mut values = self.values();
            if values.get(&id) == Some(&value) {
                return false;
            }
            values.insert(id.clone(), value.clone())
        };

        trace!("setting {} changed", id);
        // No subscribers is fine: nothing is listening yet.
        let _ = self.changes.send(SettingChange {
            id,
            value,
            previous,
        });
        true
    }

    /// Current value of a setting
    pub fn get(&self, id: &str) -> Option<Value> {
        self.values().get(id).cloned()
    }

    /// Copy of every registered setting
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.values().clone()
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_emits_change_with_previous() {
        let bus = SettingsBus::new();
        bus.register("blogname", json!("Old"));
        let mut rx = bus.subscribe();

        assert!(bus.set("blogname", json!("New")));

        let change = rx.recv().await.unwrap();
        assert_eq!(change.id, "blogname");
        assert_eq!(change.get(), &json!("New"));
        assert_eq!(change.previous, Some(json!("Old")));
    }

    #[tokio::test]
    async fn test_unchanged_value_is_silent() {
        let bus = SettingsBus::new();
        bus.register("blogname", json!("Same"));
        let mut rx = bus.subscribe();

        assert!(!bus.set("blogname", json!("Same")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_snapshot() {
        let bus = SettingsBus::new();
        bus.register("nav_menu_item[1]", json!({ "title": "Home" }));
        bus.set("nav_menu_locations[primary]", json!(3));

        let snapshot = bus.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(bus.get("nav_menu_locations[primary]"), Some(json!(3)));
    }
}
