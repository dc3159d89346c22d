//! Named dependency providers for binder parameters that are not config values.

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::application::{ApplicationError, ApplicationResult};

type Shared = Arc<dyn Any + Send + Sync>;
type Provider = Box<dyn Fn() -> Shared + Send + Sync>;

/// Registry of named factories, called on every lookup.
#[derive(Default)]
pub struct Providers {
    providers: BTreeMap<String, Provider>,
}

impl Providers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, replacing any previous one.
    pub fn register<T, F>(&mut self, name: &str, provider: F)
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.providers
            .insert(name.to_string(), Box::new(move || Arc::new(provider()) as Shared));
    }

    /// Register a shared instance; every lookup returns the same value.
    pub fn register_instance<T: Any + Send + Sync>(&mut self, name: &str, instance: Arc<T>) {
        self.providers
            .insert(name.to_string(), Box::new(move || instance.clone() as Shared));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn get_any(&self, name: &str) -> ApplicationResult<Shared> {
        let provider = self
            .providers
            .get(name)
            .ok_or_else(|| ApplicationError::DependencyNotFound {
                name: name.to_string(),
            })?;
        Ok(provider())
    }

    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> ApplicationResult<Arc<T>> {
        downcast(name, self.get_any(name)?)
    }
}

pub(crate) fn downcast<T: Any + Send + Sync>(name: &str, value: Shared) -> ApplicationResult<Arc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| ApplicationError::DependencyType {
            name: name.to_string(),
            expected: type_name::<T>().to_string(),
        })
}

impl fmt::Debug for Providers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Providers")
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
