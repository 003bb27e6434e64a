//! FILENAME: analysis-engine/src/error.rs

use thiserror::Error;

/// Failures surfaced to the completion callbacks.
///
/// Configuration-resolution misses are deliberately absent: a configured
/// table or field the executed query does not carry is skipped, not
/// reported, so that shared report definitions tolerate tenant schema
/// drift.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// Produced by the aggregation collaborator and carried in the
    /// result's error slot.
    #[error("aggregation failed: {0}")]
    Aggregation(String),

    /// Raised by the execution context before any aggregation ran.
    #[error("query transport failed: {0}")]
    Transport(String),
}
