//! Source capability seam
//!
//! Everything the composer consumes from the outside world crosses this
//! boundary: the [`MediaSource`] capability (asynchronous preparation,
//! period open/close, release), the read-only [`SourceTimeline`] snapshot
//! a prepared source reports, and the identity-keyed [`SourceHandle`] the
//! composer stores in its slots.
//!
//! # Message-Driven Preparation
//!
//! Preparation is non-blocking: the composer hands each source a
//! [`PrepareTicket`] carrying a slot token and a completion sender. The
//! source completes the ticket (from any thread) once its timeline and
//! manifest are known, and the result travels back to the composer as a
//! [`PreparedSource`] message. The composer validates the token against
//! its live slots before applying the result, which is what lets it
//! discard completions for slots that were evicted in the meantime.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::channel::Sender;

use crate::error::{PreparationError, TimelineResult};
use crate::types::{ManifestData, PeriodHandle, PeriodUid, TimelinePeriod, TimelineWindow};

/// Read-only view of a single source's private timeline.
///
/// All indices are local to this timeline; the composite timeline performs
/// the re-basing into global index space.
pub trait SourceTimeline: Send + Sync {
    /// Number of periods in this timeline
    fn period_count(&self) -> usize;

    /// Number of windows in this timeline
    fn window_count(&self) -> usize;

    /// Look up a window by local index
    fn window(&self, local_index: usize) -> TimelineResult<TimelineWindow>;

    /// Look up a period by local index. When `with_ids` is set the period
    /// carries this timeline's own opaque identifier.
    fn period(&self, local_index: usize, with_ids: bool) -> TimelineResult<TimelinePeriod>;

    /// Reverse lookup: local period index for an identifier previously
    /// returned by this timeline, or `None` if unknown.
    fn index_of_period(&self, uid: &PeriodUid) -> Option<usize>;
}

/// Media buffer allocation boundary for opened periods.
///
/// Opaque to the engine; sources draw period buffers through it.
pub trait PeriodAllocator: Send + Sync {
    /// Allocate a media buffer of the given size in bytes
    fn allocate(&self, bytes: usize) -> Box<[u8]>;
}

/// An independently-prepared media source.
///
/// Methods take `&self`; interior mutability is the source's business.
/// Sources must mint period handles through [`PeriodHandle::mint`] so the
/// composer's lease table can key releases by handle alone.
pub trait MediaSource: Send + Sync {
    /// Begin asynchronous preparation. The source completes the ticket
    /// once its timeline and manifest are known; completing twice for one
    /// ticket is not possible (the ticket is consumed).
    fn prepare(&self, ticket: PrepareTicket);

    /// Surface a preparation failure, if one has occurred. Propagating,
    /// not swallowing: a healthy source returns `Ok(())`.
    fn maybe_surface_preparation_error(&self) -> Result<(), PreparationError>;

    /// Open a period at a local index, drawing buffers from the allocator
    fn open_period(
        &self,
        local_index: usize,
        allocator: &dyn PeriodAllocator,
        start_position_us: u64,
    ) -> PeriodHandle;

    /// Close a previously opened period
    fn close_period(&self, handle: PeriodHandle);

    /// Release all resources held by this source
    fn release(&self);
}

/// Identity token for one slot instance within a composer.
///
/// Unique per preparation request; a completion carrying a token that no
/// longer matches a live slot is stale and gets discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotToken(u64);

impl SlotToken {
    pub(crate) fn new(value: u64) -> Self {
        SlotToken(value)
    }
}

/// One-shot preparation ticket handed to a source by the composer
pub struct PrepareTicket {
    token: SlotToken,
    reply: Sender<PreparedSource>,
}

impl PrepareTicket {
    pub(crate) fn new(token: SlotToken, reply: Sender<PreparedSource>) -> Self {
        Self { token, reply }
    }

    /// The slot token this ticket was issued for
    pub fn token(&self) -> SlotToken {
        self.token
    }

    /// Complete preparation, reporting the source's timeline and manifest.
    /// Consumes the ticket; the send is best-effort since the composer may
    /// already have been dropped.
    pub fn complete(self, timeline: Arc<dyn SourceTimeline>, manifest: ManifestData) {
        let _ = self.reply.send(PreparedSource {
            token: self.token,
            timeline,
            manifest,
        });
    }
}

/// Completion message produced by a source finishing preparation
pub struct PreparedSource {
    /// Token of the slot this preparation was requested for
    pub token: SlotToken,
    /// The source's private timeline snapshot
    pub timeline: Arc<dyn SourceTimeline>,
    /// The source's manifest, `Value::Null` if it has none
    pub manifest: ManifestData,
}

impl fmt::Debug for PreparedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedSource")
            .field("token", &self.token)
            .field("periods", &self.timeline.period_count())
            .field("windows", &self.timeline.window_count())
            .finish()
    }
}

static NEXT_SOURCE_KEY: AtomicU64 = AtomicU64::new(1);

/// Stable identity key assigned to a source at handle registration.
///
/// Identity, never value equality: two handles registered from equivalent
/// media are still distinct sources. Cloning a handle preserves its key,
/// which is how the same source instance appears in two slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceKey(u64);

/// A registered, identity-keyed reference to a [`MediaSource`]
#[derive(Clone)]
pub struct SourceHandle {
    key: SourceKey,
    source: Arc<dyn MediaSource>,
}

impl SourceHandle {
    /// Register a source, assigning it a fresh identity key
    pub fn register(source: Arc<dyn MediaSource>) -> Self {
        Self {
            key: SourceKey(NEXT_SOURCE_KEY.fetch_add(1, Ordering::Relaxed)),
            source,
        }
    }

    /// This handle's identity key
    pub fn key(&self) -> SourceKey {
        self.key
    }

    /// Whether two handles refer to the same registered source instance
    pub fn same_source(&self, other: &SourceHandle) -> bool {
        self.key == other.key
    }

    /// Access the underlying source capability
    pub fn source(&self) -> &dyn MediaSource {
        self.source.as_ref()
    }
}

impl fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SourceHandle").field(&self.key).finish()
    }
}
