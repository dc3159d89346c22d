//! Holder for resolved configuration trees, keyed by name.
//!
//! Reading a key before it has been set fails with `NotConfigured`. A key is
//! set once; `replace` is the explicit way to reconfigure it.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::ConfigTree;

/// Key used by `set` and `get`.
pub const DEFAULT_KEY: &str = "default";

#[derive(Debug, Default)]
pub struct ConfigHolder {
    slots: RwLock<HashMap<String, Arc<ConfigTree>>>,
}

impl ConfigHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide holder.
    pub fn global() -> &'static ConfigHolder {
        static GLOBAL: OnceLock<ConfigHolder> = OnceLock::new();
        GLOBAL.get_or_init(ConfigHolder::new)
    }

    pub fn set(&self, tree: ConfigTree) -> ApplicationResult<Arc<ConfigTree>> {
        self.set_keyed(DEFAULT_KEY, tree)
    }

    pub fn set_keyed(&self, key: &str, tree: ConfigTree) -> ApplicationResult<Arc<ConfigTree>> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if slots.contains_key(key) {
            return Err(ApplicationError::AlreadyConfigured {
                key: key.to_string(),
            });
        }
        let tree = Arc::new(tree);
        slots.insert(key.to_string(), tree.clone());
        debug!("configured '{}'", key);
        Ok(tree)
    }

    /// Store `tree` under `key`, returning the tree it replaced.
    pub fn replace(&self, key: &str, tree: ConfigTree) -> Option<Arc<ConfigTree>> {
        debug!("reconfigured '{}'", key);
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), Arc::new(tree))
    }

    pub fn get(&self) -> ApplicationResult<Arc<ConfigTree>> {
        self.get_keyed(DEFAULT_KEY)
    }

    pub fn get_keyed(&self, key: &str) -> ApplicationResult<Arc<ConfigTree>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| ApplicationError::NotConfigured {
                key: key.to_string(),
            })
    }

    pub fn remove(&self, key: &str) -> Option<Arc<ConfigTree>> {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Configured keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}
