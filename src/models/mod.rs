//! Serializable records written to disk or stdout

/// Embedding cache persisted between runs.
pub mod cache;
/// The result of one lookup.
pub mod report;
