//! A single runtime-tunable option.

use crate::listeners::{Listeners, Subscription};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Shared, observable option value.
///
/// Clones share the same value and listeners.
pub struct ConfigOption<T> {
    name: &'static str,
    value: Arc<RwLock<T>>,
    listeners: Listeners<T>,
}

impl<T> ConfigOption<T>
where
    T: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static,
{
    pub fn new(name: &'static str, value: T) -> Self {
        Self {
            name,
            value: Arc::new(RwLock::new(value)),
            listeners: Listeners::new(),
        }
    }

    /// Dotted option name, e.g. `mock.collections.selected`
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value(&self) -> T {
        self.value.read().clone()
    }

    /// Set a new value. Listeners run only when the value actually changes,
    /// after the new value is visible to readers. Returns whether it changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.value.write();
            if *current == value {
                return false;
            }
            *current = value.clone();
        }
        debug!(option = self.name, value = ?value, "Option changed");
        self.listeners.emit(&value);
        true
    }

    pub fn on_change(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }
}

impl<T> Clone for ConfigOption<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            value: Arc::clone(&self.value),
            listeners: self.listeners.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ConfigOption<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigOption")
            .field("name", &self.name)
            .field("value", &*self.value.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_set_notifies_with_new_value() {
        let option = ConfigOption::new("mock.routes.delay", 0u64);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _sub = option.on_change(move |v| s.lock().push(*v));

        assert!(option.set(100));
        assert!(!option.set(100));
        assert!(option.set(0));

        assert_eq!(*seen.lock(), vec![100, 0]);
        assert_eq!(option.value(), 0);
    }

    #[test]
    fn test_clones_share_state() {
        let option = ConfigOption::new("files.watch", true);
        let clone = option.clone();
        clone.set(false);
        assert!(!option.value());
    }

    #[test]
    fn test_listener_can_read_new_value() {
        let option = ConfigOption::new("mock.collections.selected", None::<String>);
        let reader = option.clone();
        let observed = Arc::new(Mutex::new(None));
        let o = Arc::clone(&observed);
        let _sub = option.on_change(move |_| *o.lock() = reader.value());

        option.set(Some("alt".to_string()));
        assert_eq!(observed.lock().as_deref(), Some("alt"));
    }
}
