//! # Orgchart
//!
//! Persistence core for hierarchical organization structures.
//!
//! An organization is a rooted tree of units (boards, departments, groups)
//! carrying named roles, with employees assigned to roles across units. This
//! crate serializes such a graph to three interchangeable on-disk formats and
//! reconstructs an equivalent graph from any of them:
//!
//! - **Document**: nested JSON-like text where containment implies hierarchy
//! - **Tabular**: a flat, multi-section CSV file with explicit references
//! - **Relational**: a SQLite database with foreign-keyed tables
//!
//! Each format is a [`storage::StorageCodec`] selected at runtime through
//! [`storage::StorageFormat`]; all three satisfy the same save/load contract.
//! Loaded graphs pass through [`validation`] before they are accepted.
//!
//! ## Example
//!
//! ```rust,ignore
//! use orgchart::config::StorageConfig;
//! use orgchart::storage::{Storage, StorageFormat};
//!
//! let storage = Storage::new(StorageConfig::default().with_format(StorageFormat::Tabular));
//! if storage.save(&graph, "orgchart.csv") {
//!     let restored = storage.load("orgchart.csv");
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod identity;
pub mod models;
pub mod observability;
pub mod storage;
pub mod validation;

// Re-exports for convenience
pub use config::StorageConfig;
pub use models::{EmployeeId, OrgGraph, RoleId, RoleType, UnitId, UnitKind};
pub use storage::{LoadReport, LoadedGraph, Storage, StorageCodec, StorageFormat};
pub use validation::{ValidationOutcome, validate};

/// Error type for orgchart operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Format` | Wrong or corrupt byte signature, missing section/table, truncated content |
/// | `Structure` | A loaded graph breaks a hierarchy invariant (non-root board, group with children) |
/// | `Io` | File or database access fails |
///
/// Dangling per-record references (a missing parent id, an assignment naming
/// an unknown employee) are deliberately *not* errors: the offending record
/// is dropped into the [`storage::LoadReport`] and the load continues.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The input is not a well-formed artifact of the requested format.
    ///
    /// Raised when:
    /// - A document file does not start with `{` (or carries the legacy
    ///   binary serialization magic)
    /// - A tabular file has no section marker or recognized header line
    /// - A relational file is not a SQLite database
    ///
    /// Always aborts the load; no partial graph is produced.
    #[error("unrecognized or corrupt format: {0}")]
    Format(String),

    /// A reconstructed graph violates a structural invariant.
    ///
    /// Raised when:
    /// - A `Group` unit has child units
    /// - A `Board` unit appears below the tree root
    /// - Sibling units share a name
    /// - A catalog role is bound to an incompatible unit kind
    #[error("structural violation: {0}")]
    Structure(String),

    /// An I/O or database operation failed.
    ///
    /// Raised when:
    /// - The destination/source file cannot be opened, read, or written
    /// - A SQLite statement fails or the integrity check does not pass
    #[error("operation '{operation}' failed: {cause}")]
    Io {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Wraps a low-level failure into an [`Error::Io`] with context.
    pub fn io(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Io {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for orgchart operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Format("not a CSV file".to_string());
        assert_eq!(
            err.to_string(),
            "unrecognized or corrupt format: not a CSV file"
        );

        let err = Error::Structure("group 'Core' has child units".to_string());
        assert!(err.to_string().contains("group 'Core'"));

        let err = Error::io("open_database", "permission denied");
        assert_eq!(
            err.to_string(),
            "operation 'open_database' failed: permission denied"
        );
    }
}
