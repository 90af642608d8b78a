//! Common types for Medley
//!
//! This module contains the fundamental timeline types used throughout the
//! composition engine: window and period snapshots, opaque period
//! identifiers, and period handles.

use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of concurrently live sources in the composer's sliding
/// window. Two keeps both sides of a gapless transition materialized: the
/// playing source and the next queued one.
pub const DEFAULT_LIVE_SOURCE_WINDOW: usize = 2;

/// Opaque per-source metadata blob, reported alongside a timeline when
/// preparation completes. Sources with no manifest report `Value::Null`.
pub type ManifestData = serde_json::Value;

/// A user-facing playable span, composed of one or more periods.
///
/// Period indices are local to the owning source's timeline; the composite
/// timeline re-bases them into the global index space before returning a
/// window to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineWindow {
    /// Index of the first period belonging to this window
    pub first_period_index: usize,
    /// Index of the last period belonging to this window (inclusive)
    pub last_period_index: usize,
    /// Window duration in microseconds
    pub duration_us: u64,
}

impl TimelineWindow {
    /// Number of periods spanned by this window
    pub fn period_count(&self) -> usize {
        self.last_period_index - self.first_period_index + 1
    }
}

/// The smallest independently-playable unit within a source's timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelinePeriod {
    /// Index of the window this period belongs to
    pub window_index: usize,
    /// Period duration in microseconds
    pub duration_us: u64,
    /// Opaque identifier, present only when ids were requested
    pub uid: Option<PeriodUid>,
}

/// Opaque period identifier.
///
/// Sources mint `Value` uids that are unique within their own timeline.
/// The composite timeline wraps them as `Tagged` pairs carrying the owning
/// slot index, so identifiers stay globally unique even when the same
/// source instance occupies two slots and reports identical child uids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeriodUid {
    /// A source-private identifier
    Value(u64),
    /// A slot-tagged identifier minted by a composite timeline
    Tagged {
        /// Index of the slot that owns the child identifier
        slot: usize,
        /// The child timeline's own identifier
        child: Box<PeriodUid>,
    },
}

impl PeriodUid {
    /// Wrap a child identifier with the owning slot index
    pub fn tagged(slot: usize, child: PeriodUid) -> Self {
        PeriodUid::Tagged {
            slot,
            child: Box::new(child),
        }
    }

    /// Unwrap a tagged identifier into its slot index and child
    pub fn as_tagged(&self) -> Option<(usize, &PeriodUid)> {
        match self {
            PeriodUid::Tagged { slot, child } => Some((*slot, child)),
            PeriodUid::Value(_) => None,
        }
    }
}

static NEXT_PERIOD_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Handle for an opened period.
///
/// Handles are minted from a process-wide counter via [`PeriodHandle::mint`]
/// so they stay unique across sources; the lease table keys release routing
/// by handle alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeriodHandle(u64);

impl PeriodHandle {
    /// Mint a fresh, process-unique handle. Called by sources when opening
    /// a period.
    pub fn mint() -> Self {
        PeriodHandle(NEXT_PERIOD_HANDLE.fetch_add(1, Ordering::Relaxed))
    }
}
