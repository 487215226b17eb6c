//! Explicit registry of runtime side effects
//!
//! Owned by the driver of one tenant and shared with its synchronizers, so
//! no process-wide state is involved and every test gets a fresh one.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Delivery model of a message listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerKind {
    Queue,
    Topic,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queue => f.write_str("queue"),
            Self::Topic => f.write_str("topic"),
        }
    }
}

/// Registered message consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerRuntime {
    pub handler: String,
    pub kind: ListenerKind,
    pub running: bool,
}

/// Registered security role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRuntime {
    pub description: Option<String>,
}

/// Consumers and roles currently in effect
#[derive(Debug, Default)]
pub struct RuntimeRegistry {
    listeners: DashMap<String, ListenerRuntime>,
    roles: DashMap<String, RoleRuntime>,
}

impl RuntimeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a consumer; a replaced one is stopped
    pub fn register_listener(&self, name: &str, handler: &str, kind: ListenerKind) {
        self.listeners.insert(
            name.to_string(),
            ListenerRuntime {
                handler: handler.to_string(),
                kind,
                running: false,
            },
        );
    }

    pub fn unregister_listener(&self, name: &str) -> Option<ListenerRuntime> {
        self.listeners.remove(name).map(|(_, runtime)| runtime)
    }

    /// Start a registered consumer
    ///
    /// Returns `Some(false)` if it was already running, `None` if unknown.
    pub fn start_listener(&self, name: &str) -> Option<bool> {
        let mut entry = self.listeners.get_mut(name)?;
        if entry.running {
            return Some(false);
        }
        entry.running = true;
        Some(true)
    }

    /// Stop a consumer; `false` if unknown or not running
    pub fn stop_listener(&self, name: &str) -> bool {
        match self.listeners.get_mut(name) {
            Some(mut entry) if entry.running => {
                entry.running = false;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn listener(&self, name: &str) -> Option<ListenerRuntime> {
        self.listeners.get(name).map(|entry| entry.clone())
    }

    #[must_use]
    pub fn is_running(&self, name: &str) -> bool {
        self.listeners.get(name).is_some_and(|entry| entry.running)
    }

    /// Names of running consumers, sorted
    #[must_use]
    pub fn running_listeners(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .listeners
            .iter()
            .filter(|entry| entry.running)
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn register_role(&self, name: &str, description: Option<&str>) {
        self.roles.insert(
            name.to_string(),
            RoleRuntime {
                description: description.map(str::to_string),
            },
        );
    }

    pub fn unregister_role(&self, name: &str) -> bool {
        self.roles.remove(name).is_some()
    }

    #[must_use]
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    /// Registered role names, sorted
    #[must_use]
    pub fn roles(&self) -> Vec<String> {
        let mut names: Vec<String> = self.roles.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_and_stop_are_guarded() {
        let registry = RuntimeRegistry::new();
        assert_eq!(registry.start_listener("orders"), None);

        registry.register_listener("orders", "orders.handle", ListenerKind::Queue);
        assert_eq!(registry.start_listener("orders"), Some(true));
        assert_eq!(registry.start_listener("orders"), Some(false));
        assert!(registry.is_running("orders"));

        assert!(registry.stop_listener("orders"));
        assert!(!registry.stop_listener("orders"));
        assert!(registry.running_listeners().is_empty());
    }

    #[test]
    fn reregistering_resets_running_flag() {
        let registry = RuntimeRegistry::new();
        registry.register_listener("orders", "a", ListenerKind::Topic);
        registry.start_listener("orders");
        registry.register_listener("orders", "b", ListenerKind::Topic);
        assert!(!registry.is_running("orders"));
        assert_eq!(registry.listener("orders").map(|l| l.handler), Some("b".into()));
    }

    #[test]
    fn roles_register_and_unregister() {
        let registry = RuntimeRegistry::new();
        registry.register_role("Operator", Some("runs jobs"));
        registry.register_role("Admin", None);
        assert_eq!(registry.roles(), vec!["Admin", "Operator"]);
        assert!(registry.unregister_role("Admin"));
        assert!(!registry.has_role("Admin"));
    }
}
