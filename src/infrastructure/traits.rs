//! I/O boundary traits for testability
//!
//! These traits abstract external I/O operations, allowing services
//! to be tested with in-memory implementations.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string (UTF-8).
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Environment variable lookup.
pub trait Environment: Send + Sync {
    /// Value of `name`, or `None` when unset (or not valid unicode).
    fn var(&self, name: &str) -> Option<String>;

    /// All variables, sorted by name.
    fn vars(&self) -> Vec<(String, String)>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Process environment.
#[derive(Debug, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn vars(&self) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = std::env::vars().collect();
        vars.sort();
        vars
    }
}

/// Fixed set of variables, independent of the process environment.
#[derive(Debug, Default, Clone)]
pub struct StaticEnvironment {
    vars: BTreeMap<String, String>,
}

impl StaticEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_string(), value.to_string());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StaticEnvironment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Environment for StaticEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn vars(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_static_environment_when_looking_up_then_only_known_vars() {
        let env = StaticEnvironment::new().with("DB_USER", "alice");
        assert_eq!(env.var("DB_USER").as_deref(), Some("alice"));
        assert_eq!(env.var("DB_PASSWORD"), None);
        assert_eq!(env.vars().len(), 1);
    }

    #[test]
    fn given_missing_file_when_reading_then_not_found() {
        let fs = RealFileSystem;
        let err = fs
            .read_to_string(Path::new("/definitely/not/here.yaml"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
