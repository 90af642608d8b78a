//! Timeline composition error types

use thiserror::Error;

/// Errors that can occur during timeline queries and period bookkeeping
#[derive(Error, Debug)]
pub enum TimelineError {
    /// A global period index beyond the current total. Indicates the caller
    /// and the engine have desynchronized; never silently clamped.
    #[error("global period index {index} out of range (period count {count})")]
    PeriodIndexOutOfRange { index: usize, count: usize },

    /// A global window index beyond the current total
    #[error("global window index {index} out of range (window count {count})")]
    WindowIndexOutOfRange { index: usize, count: usize },

    /// A period was requested before any composite timeline was published
    #[error("no composite timeline has been published yet")]
    NotComposed,
}

/// Errors surfaced by a source that failed to prepare.
///
/// These are queried pull-style through the composer's error check, never
/// pushed asynchronously; the composer caches nothing and forwards the
/// first error found among live sources on each check.
#[derive(Error, Debug, Clone)]
pub enum PreparationError {
    /// The source's media could not be reached
    #[error("source media unavailable: {0}")]
    Unavailable(String),

    /// The source fetched a manifest it could not make sense of
    #[error("malformed source manifest: {0}")]
    MalformedManifest(String),

    /// The source was released before preparation completed
    #[error("source released before preparation completed")]
    Released,
}

/// Result type for timeline operations
pub type TimelineResult<T> = Result<T, TimelineError>;
