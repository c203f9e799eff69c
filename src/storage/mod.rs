//! Storage codecs and the strategy surface.
//!
//! Three interchangeable codecs persist the organization graph:
//!
//! | Format | Artifact | Notes |
//! |--------|----------|-------|
//! | Document | nested JSON-like text | containment implies hierarchy |
//! | Tabular | multi-section CSV | explicit ids, two-pass relinking |
//! | Relational | SQLite database | foreign-keyed tables, join table |
//!
//! Codecs never mutate the graph they save, and every load builds a fresh
//! graph from scratch. All operations are synchronous and blocking; file
//! handles and connections are scoped to the call and released on every
//! exit path. Callers serialize concurrent access externally.

pub mod document;
pub mod relational;
pub(crate) mod reconstruct;
pub mod tabular;

use crate::config::StorageConfig;
use crate::models::OrgGraph;
use crate::{Error, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

/// Supported storage formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageFormat {
    /// Nested JSON-like document.
    Document,
    /// Flat multi-section CSV.
    Tabular,
    /// SQLite database.
    Relational,
}

impl StorageFormat {
    /// Returns all supported formats.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Document, Self::Tabular, Self::Relational]
    }

    /// Returns the conventional file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Document => "json",
            Self::Tabular => "csv",
            Self::Relational => "db",
        }
    }

    /// Returns the format name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Tabular => "tabular",
            Self::Relational => "relational",
        }
    }
}

impl FromStr for StorageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "document" | "json" => Ok(Self::Document),
            "tabular" | "csv" => Ok(Self::Tabular),
            "relational" | "db" | "sqlite" | "dbms" => Ok(Self::Relational),
            _ => Err(Error::Format(format!("unknown storage format: {s}"))),
        }
    }
}

impl fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-load record of recoverable problems.
///
/// Dangling references (a parent id nobody declared, an assignment naming a
/// missing employee) drop only the offending record; the reasons accumulate
/// here so callers can surface them. Warnings cover fallbacks and other
/// conditions that changed behavior without dropping data.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// One entry per skipped record, with the reason.
    pub skipped: Vec<String>,
    /// Non-fatal conditions encountered during the load.
    pub warnings: Vec<String>,
}

impl LoadReport {
    /// Records a skipped record and logs it.
    pub fn skip(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(%reason, "record skipped during load");
        self.skipped.push(reason);
    }

    /// Records a warning and logs it.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(%message, "load warning");
        self.warnings.push(message);
    }

    /// Returns true if the load completed without skips or warnings.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.warnings.is_empty()
    }
}

/// A freshly reconstructed graph together with its load report.
#[derive(Debug)]
pub struct LoadedGraph {
    /// The reconstructed graph.
    pub graph: OrgGraph,
    /// Recoverable problems encountered while reconstructing it.
    pub report: LoadReport,
}

/// Save/load contract every codec satisfies.
///
/// Implementations convert every internal failure into [`Error`] before
/// returning; no parser or database error type crosses this boundary.
pub trait StorageCodec: Send + Sync {
    /// The format this codec reads and writes.
    fn format(&self) -> StorageFormat;

    /// Writes the full graph to `destination`.
    ///
    /// The graph is not mutated. On failure the destination is left
    /// unchanged or clearly unusable; never half-written valid-looking
    /// output.
    fn save(&self, graph: &OrgGraph, destination: &Path) -> Result<()>;

    /// Reads `source` and reconstructs a graph.
    ///
    /// Recoverable per-record problems land in the returned
    /// [`LoadReport`]; unrecoverable ones abort with an error.
    fn load(&self, source: &Path) -> Result<LoadedGraph>;
}

/// Creates the codec for a format.
#[must_use]
pub fn create_codec(format: StorageFormat) -> Box<dyn StorageCodec> {
    match format {
        StorageFormat::Document => Box::new(document::DocumentCodec::new()),
        StorageFormat::Tabular => Box::new(tabular::TabularCodec::new()),
        StorageFormat::Relational => Box::new(relational::RelationalCodec::new()),
    }
}

/// Application-facing storage front end.
///
/// Wraps the active codec (an explicit configuration value, not a process
/// singleton) and absorbs errors into the boolean/option contract the
/// editing layer consumes: `save` returns `false` instead of erroring,
/// `load` returns `None`. The underlying `try_*` methods expose full
/// errors and load reports for callers that want them.
pub struct Storage {
    codec: Box<dyn StorageCodec>,
    validate_on_load: bool,
}

impl Storage {
    /// Creates a storage front end from a configuration.
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        Self {
            codec: create_codec(config.format),
            validate_on_load: config.validate_on_load,
        }
    }

    /// Creates a storage front end for a format with default options.
    #[must_use]
    pub fn from_format(format: StorageFormat) -> Self {
        Self::new(StorageConfig::default().with_format(format))
    }

    /// Returns the active format.
    #[must_use]
    pub fn format(&self) -> StorageFormat {
        self.codec.format()
    }

    /// Saves the graph, returning the full error on failure.
    pub fn try_save(&self, graph: &OrgGraph, destination: impl AsRef<Path>) -> Result<()> {
        let destination = destination.as_ref();
        let start = Instant::now();
        let result = self.codec.save(graph, destination);
        record_operation("save", self.format(), start, result.is_ok());
        result
    }

    /// Saves the graph; `false` means failure (already logged).
    pub fn save(&self, graph: &OrgGraph, destination: impl AsRef<Path>) -> bool {
        match self.try_save(graph, destination.as_ref()) {
            Ok(()) => true,
            Err(error) => {
                tracing::error!(%error, destination = %destination.as_ref().display(), "save failed");
                false
            },
        }
    }

    /// Loads a graph, validating it, returning full error and report.
    ///
    /// # Errors
    ///
    /// Propagates codec errors, and converts hard structural violations in
    /// the reconstructed graph into [`Error::Structure`].
    pub fn try_load(&self, source: impl AsRef<Path>) -> Result<LoadedGraph> {
        let source = source.as_ref();
        let start = Instant::now();
        let result = self.load_and_validate(source);
        record_operation("load", self.format(), start, result.is_ok());
        result
    }

    /// Loads a graph; `None` means unrecoverable failure (already logged).
    pub fn load(&self, source: impl AsRef<Path>) -> Option<OrgGraph> {
        match self.try_load(source.as_ref()) {
            Ok(loaded) => Some(loaded.graph),
            Err(error) => {
                tracing::error!(%error, source = %source.as_ref().display(), "load failed");
                None
            },
        }
    }

    fn load_and_validate(&self, source: &Path) -> Result<LoadedGraph> {
        let mut loaded = self.codec.load(source)?;
        if self.validate_on_load {
            let warnings = crate::validation::validate(&loaded.graph).into_result()?;
            loaded.report.warnings.extend(warnings);
        }
        Ok(loaded)
    }
}

fn record_operation(operation: &'static str, format: StorageFormat, start: Instant, ok: bool) {
    let outcome = if ok { "success" } else { "error" };
    metrics::counter!(
        "orgchart_operation_total",
        "operation" => operation,
        "format" => format.as_str(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!(
        "orgchart_operation_duration_seconds",
        "operation" => operation,
        "format" => format.as_str()
    )
    .record(start.elapsed().as_secs_f64());
}
