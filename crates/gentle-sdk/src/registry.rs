//! Backends by name.

use std::collections::BTreeMap;
use std::fmt;

use gentle_index::SnapshotIndex;
use gentle_store::{DataStore, FsDataStore, InMemoryDataStore, TracedStore};
use tracing::info;

use crate::config::GentleConfig;
use crate::error::{SdkError, SdkResult};

/// Builds a store from a configuration.
pub type BackendConstructor =
    Box<dyn Fn(&GentleConfig) -> SdkResult<Box<dyn DataStore>> + Send + Sync>;

/// Maps backend names to constructors. Built explicitly at startup and
/// passed to [`Gentle::open_with`](crate::Gentle::open_with).
pub struct BackendRegistry {
    constructors: BTreeMap<String, BackendConstructor>,
}

impl BackendRegistry {
    /// A registry with no backends.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Register `constructor` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&GentleConfig) -> SdkResult<Box<dyn DataStore>> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Build the configured backend, then wrap it in a snapshot journal
    /// and a tracing layer if the configuration asks for them.
    pub fn open(&self, config: &GentleConfig) -> SdkResult<Box<dyn DataStore>> {
        let constructor = self
            .constructors
            .get(&config.backend)
            .ok_or_else(|| SdkError::UnknownBackend(config.backend.clone()))?;
        let mut store = constructor(config)?;
        if config.journaled {
            store = Box::new(SnapshotIndex::open(store)?);
        }
        if config.trace {
            store = Box::new(TracedStore::new(store));
        }
        info!(
            backend = %config.backend,
            journaled = config.journaled,
            trace = config.trace,
            "opened store"
        );
        Ok(store)
    }
}

impl Default for BackendRegistry {
    /// `"memory"` and `"fs"`.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("memory", |_| Ok(Box::new(InMemoryDataStore::new())));
        registry.register("fs", |config| {
            let dir = config.require_data_dir()?;
            Ok(Box::new(FsDataStore::open(dir, config.create)?))
        });
        registry
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gentle_types::ContentId;

    #[test]
    fn default_backends() {
        let registry = BackendRegistry::default();
        assert_eq!(registry.names(), vec!["fs", "memory"]);
        assert!(!BackendRegistry::empty().contains("memory"));
    }

    #[test]
    fn unknown_backend() {
        let registry = BackendRegistry::default();
        let config = GentleConfig {
            backend: "s3".into(),
            ..GentleConfig::default()
        };
        assert!(matches!(
            registry.open(&config).err(),
            Some(SdkError::UnknownBackend(name)) if name == "s3"
        ));
    }

    #[test]
    fn fs_backend_needs_a_directory() {
        let registry = BackendRegistry::default();
        let config = GentleConfig {
            backend: "fs".into(),
            ..GentleConfig::default()
        };
        assert!(matches!(registry.open(&config).err(), Some(SdkError::Config(_))));
    }

    #[test]
    fn fs_backend_persists() {
        let dir = tempfile::tempdir().unwrap();
        let registry = BackendRegistry::default();
        let config = GentleConfig::fs(dir.path());
        let id = registry.open(&config).unwrap().content().put(b"kept").unwrap();
        let reopened = registry.open(&config).unwrap();
        assert_eq!(reopened.content().get(&id).unwrap(), b"kept");
    }

    #[test]
    fn layers_wrap_any_backend() {
        let registry = BackendRegistry::default();
        let config = GentleConfig::memory().journaled(true).traced(true);
        let store = registry.open(&config).unwrap();
        let id = store.content().put(b"layered").unwrap();
        assert_eq!(id, ContentId::digest(b"layered"));
        assert!(store.content().contains(&id).unwrap());
    }

    #[test]
    fn custom_backend() {
        let mut registry = BackendRegistry::empty();
        registry.register("scratch", |_| Ok(Box::new(InMemoryDataStore::new())));
        let config = GentleConfig {
            backend: "scratch".into(),
            ..GentleConfig::default()
        };
        assert!(registry.open(&config).is_ok());
        assert_eq!(format!("{registry:?}"), "BackendRegistry { backends: [\"scratch\"] }");
    }
}
