//! Error conversion helpers for common I/O operations
//!
//! Provides extension traits for cleaner error handling with path context.

use std::io;
use std::path::Path;

use crate::application::{ApplicationError, ApplicationResult};

/// Extension trait for converting `io::Result` to `ApplicationResult` with context.
pub trait IoResultExt<T> {
    /// Attach the path that was being read.
    ///
    /// # Example
    /// ```ignore
    /// fs.read_to_string(&path).with_path_context(&path)?;
    /// ```
    fn with_path_context(self, path: &Path) -> ApplicationResult<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path_context(self, path: &Path) -> ApplicationResult<T> {
        self.map_err(|e| ApplicationError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
