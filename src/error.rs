//! Error types for counter maintenance.

use crate::types::Value;
use thiserror::Error;

/// Main error type for counter operations.
///
/// Resolution misses (a null foreign key, a missing row) are not errors and
/// never show up here; drift found by reconciliation is reported as data.
#[derive(Debug, Error)]
pub enum CounterError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("No relation {relation} on {model}")]
    UnknownRelation { model: String, relation: String },

    #[error("Relation chain must not be empty")]
    EmptyChain,

    #[error("No counter cache defined on {0}")]
    NoCounters(String),

    #[error(
        "Fixing counter caches is not supported when using a foreign key override ({0}); \
         skip it with skip_unsupported"
    )]
    UnsupportedOverride(String),

    #[error(
        "Must provide column names for relation {0} when the column name is dynamic; \
         skip it with skip_unsupported"
    )]
    DynamicColumnWithoutColumnNames(String),

    #[error("Column conditions must map conditions to column names: {0}")]
    MalformedColumnConditions(String),

    #[error("Relation {relation} is declared inconsistently across {models:?}")]
    IncompatibleRelation { relation: String, models: Vec<String> },

    #[error("Record of {0} has no primary key value")]
    MissingPrimaryKey(String),

    #[error("Delta column {column} holds a non-numeric value: {value:?}")]
    InvalidDelta { column: String, value: Value },

    #[error("Session aborted: a counter hook failed earlier in this transaction")]
    SessionAborted,

    #[error("Datastore error: {0}")]
    Datastore(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl CounterError {
    /// True for errors caused by a mistake in declared counters or schema
    /// metadata. These are fatal and never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CounterError::UnknownModel(_)
                | CounterError::UnknownRelation { .. }
                | CounterError::EmptyChain
                | CounterError::NoCounters(_)
                | CounterError::UnsupportedOverride(_)
                | CounterError::DynamicColumnWithoutColumnNames(_)
                | CounterError::MalformedColumnConditions(_)
                | CounterError::IncompatibleRelation { .. }
        )
    }
}

/// Result type for counter operations.
pub type Result<T> = std::result::Result<T, CounterError>;
