//! Medley Core - windowed media timeline composition engine
//!
//! Concatenates an ordered, mutable collection of independently-prepared
//! media sources into one logical timeline addressable with flat global
//! indices. Sources report their private timelines asynchronously; the
//! [`TimelineComposer`] merges them into an immutable
//! [`CompositeTimeline`] snapshot, keeps the merge consistent as sources
//! are appended or evicted from the bounded sliding window, and routes
//! period open/release back to the owning source.

pub mod composer;
pub mod dedup;
pub mod error;
pub mod lease;
pub mod offsets;
pub mod source;
pub mod timeline;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use composer::{ComposerEvent, TimelineComposer};
pub use error::{PreparationError, TimelineError, TimelineResult};
pub use lease::{PeriodLease, PeriodLeaseTable};
pub use offsets::OffsetIndex;
pub use source::{
    MediaSource, PeriodAllocator, PrepareTicket, PreparedSource, SlotToken, SourceHandle,
    SourceKey, SourceTimeline,
};
pub use timeline::CompositeTimeline;
pub use types::*;
