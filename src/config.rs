//! Storage configuration.
//!
//! The active codec is an explicit value handed to [`crate::Storage`] at
//! construction; there is no process-wide mutable state anywhere in the
//! crate.

use crate::storage::StorageFormat;

/// Options controlling how graphs are persisted and restored.
#[derive(Debug, Clone, Copy)]
pub struct StorageConfig {
    /// The active storage format.
    pub format: StorageFormat,
    /// Run the structural validator on every loaded graph.
    ///
    /// Disabling this is only meant for diagnostics on known-bad files.
    pub validate_on_load: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            format: StorageFormat::Document,
            validate_on_load: true,
        }
    }
}

impl StorageConfig {
    /// Sets the storage format.
    #[must_use]
    pub const fn with_format(mut self, format: StorageFormat) -> Self {
        self.format = format;
        self
    }

    /// Enables or disables load-time validation.
    #[must_use]
    pub const fn with_validate_on_load(mut self, validate: bool) -> Self {
        self.validate_on_load = validate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.format, StorageFormat::Document);
        assert!(config.validate_on_load);
    }

    #[test]
    fn test_builder() {
        let config = StorageConfig::default()
            .with_format(StorageFormat::Relational)
            .with_validate_on_load(false);
        assert_eq!(config.format, StorageFormat::Relational);
        assert!(!config.validate_on_load);
    }
}
