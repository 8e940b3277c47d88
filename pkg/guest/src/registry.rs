//! Thread-safe registry of live guest instances, keyed by name.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::GuestError;
use crate::instance::GuestInstance;

#[derive(Default)]
pub struct GuestRegistry {
    instances: DashMap<String, Arc<GuestInstance>>,
}

impl GuestRegistry {
    pub fn new() -> Self {
        GuestRegistry {
            instances: DashMap::new(),
        }
    }

    /// Insert a freshly-created instance. Fails if the name is already taken.
    pub fn register(&self, instance: Arc<GuestInstance>) -> Result<(), GuestError> {
        let name = instance.name().to_string();
        if self.instances.contains_key(&name) {
            return Err(GuestError::InstanceConflict(name));
        }
        self.instances.insert(name, instance);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<GuestInstance>> {
        self.instances.get(name).map(|e| Arc::clone(e.value()))
    }

    pub fn unregister(&self, name: &str) {
        self.instances.remove(name);
    }

    /// Snapshot of every guest's name and current state, for `ListGuests`.
    pub fn list(&self) -> Vec<(String, String)> {
        self.instances
            .iter()
            .map(|e| (e.key().clone(), e.value().state().to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn new_instance(name: &str) -> Arc<GuestInstance> {
        Arc::new(GuestInstance::new(
            name,
            PathBuf::from("/tmp/x.ini"),
            PathBuf::from("/tmp"),
            PathBuf::from("/tmp"),
        ))
    }

    #[test]
    fn registering_the_same_name_twice_conflicts() {
        let registry = GuestRegistry::new();
        registry.register(new_instance("demo")).unwrap();
        let err = registry.register(new_instance("demo")).unwrap_err();
        assert!(matches!(err, GuestError::InstanceConflict(n) if n == "demo"));
    }

    #[test]
    fn unregister_then_register_succeeds() {
        let registry = GuestRegistry::new();
        registry.register(new_instance("demo")).unwrap();
        registry.unregister("demo");
        assert!(registry.register(new_instance("demo")).is_ok());
    }

    #[test]
    fn list_reflects_every_registered_guest() {
        let registry = GuestRegistry::new();
        registry.register(new_instance("a")).unwrap();
        registry.register(new_instance("b")).unwrap();
        let mut names: Vec<_> = registry.list().into_iter().map(|(n, _)| n).collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn get_returns_none_for_an_unknown_name() {
        let registry = GuestRegistry::new();
        assert!(registry.get("nope").is_none());
    }
}
