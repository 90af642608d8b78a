//! Timeline composer - the composition controller
//!
//! Owns the ordered list of live source slots, drives asynchronous
//! preparation, folds per-source timelines into a [`CompositeTimeline`]
//! once every live slot has reported, and enforces the bounded
//! sliding-window append/evict policy.
//!
//! # Message-Driven Architecture
//!
//! The composer is built for a single logical owner thread and performs no
//! internal locking. Preparation requests carry a slot token and a clone
//! of the composer's completion sender; sources may complete from any
//! thread, and the owner thread folds results in by calling
//! [`drain_completions`](TimelineComposer::drain_completions). Published
//! timelines arrive as [`ComposerEvent`] messages on the channel returned
//! by [`subscribe`](TimelineComposer::subscribe), no polling needed.

use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::dedup::duplicate_flags;
use crate::error::{PreparationError, TimelineError, TimelineResult};
use crate::lease::PeriodLeaseTable;
use crate::source::{
    PeriodAllocator, PrepareTicket, PreparedSource, SlotToken, SourceHandle, SourceTimeline,
};
use crate::timeline::CompositeTimeline;
use crate::types::{ManifestData, PeriodHandle, DEFAULT_LIVE_SOURCE_WINDOW};

/// Events published by the composer
#[derive(Clone)]
pub enum ComposerEvent {
    /// A new composite timeline was built: every live slot has reported.
    /// Manifests are ordered by slot.
    TimelineReady {
        timeline: Arc<CompositeTimeline>,
        manifests: Vec<ManifestData>,
    },
}

/// Per-slot preparation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Unprepared,
    Preparing,
    Ready,
}

/// One entry in the ordered list of live sources
struct SourceSlot {
    handle: SourceHandle,
    /// Identity of this slot instance; completions are matched against it,
    /// never against the slot's position
    token: SlotToken,
    /// True if an earlier slot holds the same source identity. Duplicate
    /// slots never independently trigger preparation or release; they
    /// mirror the first slot holding their handle.
    is_duplicate: bool,
    state: SlotState,
    timeline: Option<Arc<dyn SourceTimeline>>,
    manifest: Option<ManifestData>,
}

impl SourceSlot {
    fn is_ready(&self) -> bool {
        self.timeline.is_some()
    }
}

/// Concatenates independently-prepared media sources into a single logical
/// timeline, keeping at most a fixed window of sources live.
pub struct TimelineComposer {
    slots: Vec<SourceSlot>,
    /// Maximum number of concurrently live sources
    window: usize,
    next_token: u64,
    completion_tx: Sender<PreparedSource>,
    completion_rx: Receiver<PreparedSource>,
    event_tx: Sender<ComposerEvent>,
    event_rx: Receiver<ComposerEvent>,
    leases: PeriodLeaseTable,
    /// Last published composite; swapped whole, never patched
    current: Option<Arc<CompositeTimeline>>,
    /// Source handles as ordered at publish time, one per composite slot.
    /// Period opening resolves through this snapshot, never through the
    /// live slot list: eviction shifts live positions while the published
    /// composite stays stale.
    current_sources: Vec<SourceHandle>,
}

impl TimelineComposer {
    /// Create an empty composer with the default live-source window
    pub fn new() -> Self {
        Self::with_window(DEFAULT_LIVE_SOURCE_WINDOW)
    }

    /// Create an empty composer with a custom live-source window
    pub fn with_window(window: usize) -> Self {
        assert!(window >= 1, "live-source window must hold at least one source");
        let (completion_tx, completion_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        Self {
            slots: Vec::new(),
            window,
            next_token: 0,
            completion_tx,
            completion_rx,
            event_tx,
            event_rx,
            leases: PeriodLeaseTable::default(),
            current: None,
            current_sources: Vec::new(),
        }
    }

    /// Create a composer pre-loaded with an ordered list of sources.
    ///
    /// The same handle may appear more than once. The sliding window is
    /// not enforced at construction, only on [`append`](Self::append).
    pub fn with_sources<I>(handles: I) -> Self
    where
        I: IntoIterator<Item = SourceHandle>,
    {
        let mut composer = Self::new();
        for handle in handles {
            composer.push_slot(handle);
        }
        composer.refresh_duplicate_flags();
        composer
    }

    /// Subscribe to composition events
    pub fn subscribe(&self) -> Receiver<ComposerEvent> {
        self.event_rx.clone()
    }

    /// Number of currently live sources
    pub fn live_source_count(&self) -> usize {
        self.slots.len()
    }

    /// The configured live-source window
    pub fn window_size(&self) -> usize {
        self.window
    }

    /// The last published composite timeline, if any
    pub fn current_timeline(&self) -> Option<Arc<CompositeTimeline>> {
        self.current.clone()
    }

    /// Request preparation for every non-duplicate slot that has not been
    /// asked yet. Completions arrive through the completion channel; call
    /// [`drain_completions`](Self::drain_completions) to fold them in.
    pub fn prepare_all(&mut self) {
        for index in 0..self.slots.len() {
            let slot = &self.slots[index];
            if !slot.is_duplicate && slot.state == SlotState::Unprepared {
                self.request_prepare(index);
            }
        }
    }

    /// Apply every queued preparation completion
    pub fn drain_completions(&mut self) {
        while let Ok(completed) = self.completion_rx.try_recv() {
            self.handle_completion(completed);
        }
    }

    /// Fold one preparation completion into the slot table.
    ///
    /// A completion whose token matches no live slot belongs to an evicted
    /// slot and is silently discarded. A valid completion is copied
    /// forward to every later slot holding the same handle, and a new
    /// composite is published once every live slot has a timeline.
    pub fn handle_completion(&mut self, completed: PreparedSource) {
        let Some(index) = self
            .slots
            .iter()
            .position(|slot| slot.token == completed.token)
        else {
            log::debug!(
                "discarding stale preparation completion for {:?}",
                completed.token
            );
            return;
        };

        let key = self.slots[index].handle.key();
        log::debug!(
            "source {:?} prepared: {} periods, {} windows",
            key,
            completed.timeline.period_count(),
            completed.timeline.window_count()
        );

        let slot = &mut self.slots[index];
        slot.timeline = Some(completed.timeline.clone());
        slot.manifest = Some(completed.manifest.clone());
        slot.state = SlotState::Ready;

        // Mirror the result into every later slot holding the same handle.
        // Matched structurally by key, not by is_duplicate: the flag only
        // marks occurrences after the first, but all mirrors need the data.
        for mirror in self.slots[index + 1..].iter_mut() {
            if mirror.handle.key() == key {
                mirror.timeline = Some(completed.timeline.clone());
                mirror.manifest = Some(completed.manifest.clone());
                mirror.state = SlotState::Ready;
            }
        }

        self.maybe_publish();
    }

    /// Append a source to the end of the timeline.
    ///
    /// Evicts the oldest slot first when the live count would exceed the
    /// window, then requests preparation for the new slot only — unless it
    /// duplicates a live slot, in which case it mirrors that slot's data
    /// and no new preparation request is issued.
    pub fn append(&mut self, handle: SourceHandle) {
        log::info!("appending source {:?}", handle.key());
        self.push_slot(handle);
        while self.slots.len() > self.window {
            self.evict_oldest();
        }
        self.refresh_duplicate_flags();

        let index = self.slots.len() - 1;
        if self.slots[index].is_duplicate {
            let key = self.slots[index].handle.key();
            if let Some(primary) = self.slots[..index]
                .iter()
                .find(|slot| slot.handle.key() == key)
            {
                let timeline = primary.timeline.clone();
                let manifest = primary.manifest.clone();
                let state = primary.state;
                let slot = &mut self.slots[index];
                slot.timeline = timeline;
                slot.manifest = manifest;
                slot.state = state;
            }
            // If the primary is still preparing, its completion will be
            // mirrored forward when it arrives.
            self.maybe_publish();
        } else if self.slots[index].state == SlotState::Unprepared {
            self.request_prepare(index);
        } else {
            // The appended handle matched the slot that eviction just
            // removed, and the new slot inherited its in-flight request or
            // prepared data. A second preparation must not be issued.
            self.maybe_publish();
        }
    }

    /// Open a period at a global index.
    ///
    /// Resolves the owning source through the handles snapshotted when the
    /// composite was published, delegates at the local index, and records a
    /// lease so release can be routed later even if the source has been
    /// evicted by then.
    pub fn create_period(
        &mut self,
        global_period_index: usize,
        allocator: &dyn PeriodAllocator,
        start_position_us: u64,
    ) -> TimelineResult<PeriodHandle> {
        let composite = self.current.as_ref().ok_or(TimelineError::NotComposed)?;
        if global_period_index >= composite.period_count() {
            return Err(TimelineError::PeriodIndexOutOfRange {
                index: global_period_index,
                count: composite.period_count(),
            });
        }
        let slot_index = composite.offsets().slot_for_period(global_period_index);
        let local_index = global_period_index - composite.offsets().first_period_of(slot_index);
        // current_sources is replaced together with current, so it always
        // has one handle per composite slot.
        let handle = self.current_sources[slot_index].clone();

        let period = handle
            .source()
            .open_period(local_index, allocator, start_position_us);
        self.leases.insert(period, slot_index, handle);
        Ok(period)
    }

    /// Close a previously opened period. Releasing a handle with no lease
    /// is a silent no-op: it can legitimately happen after eviction, and
    /// must never crash playback.
    pub fn release_period(&mut self, period: PeriodHandle) {
        match self.leases.remove(period) {
            Some(lease) => lease.handle.source().close_period(period),
            None => log::debug!("ignoring release of unknown period handle {:?}", period),
        }
    }

    /// Forward the first preparation error among live sources, if any.
    ///
    /// Pull-style: nothing is cached, duplicate slots are skipped, and the
    /// first error found wins.
    pub fn maybe_surface_preparation_error(&self) -> Result<(), PreparationError> {
        for slot in &self.slots {
            if !slot.is_duplicate {
                slot.handle.source().maybe_surface_preparation_error()?;
            }
        }
        Ok(())
    }

    /// Release every distinct live source once and clear all derived
    /// state. Safe to call more than once.
    pub fn release_all(&mut self) {
        for slot in &self.slots {
            if !slot.is_duplicate {
                log::info!("releasing source {:?}", slot.handle.key());
                slot.handle.source().release();
            }
        }
        self.slots.clear();
        self.leases.clear();
        self.current = None;
        self.current_sources.clear();
        // Anything still in flight now belongs to no slot.
        while self.completion_rx.try_recv().is_ok() {}
    }

    fn push_slot(&mut self, handle: SourceHandle) {
        let token = SlotToken::new(self.next_token);
        self.next_token += 1;
        self.slots.push(SourceSlot {
            handle,
            token,
            is_duplicate: false,
            state: SlotState::Unprepared,
            timeline: None,
            manifest: None,
        });
    }

    fn refresh_duplicate_flags(&mut self) {
        let flags = duplicate_flags(self.slots.iter().map(|slot| slot.handle.key()));
        for (slot, flag) in self.slots.iter_mut().zip(flags) {
            slot.is_duplicate = flag;
        }
    }

    fn request_prepare(&mut self, index: usize) {
        let ticket = PrepareTicket::new(self.slots[index].token, self.completion_tx.clone());
        let slot = &mut self.slots[index];
        slot.state = SlotState::Preparing;
        log::debug!(
            "requesting preparation for source {:?} (slot {})",
            slot.handle.key(),
            index
        );
        slot.handle.source().prepare(ticket);
    }

    fn evict_oldest(&mut self) {
        let evicted = self.slots.remove(0);
        let key = evicted.handle.key();
        if let Some(mirror) = self
            .slots
            .iter_mut()
            .find(|slot| slot.handle.key() == key)
        {
            // The surviving mirror becomes the primary. If it has no data
            // yet, it inherits the evicted slot's token so an in-flight
            // completion still lands somewhere valid.
            if mirror.timeline.is_none() {
                mirror.token = evicted.token;
                mirror.state = evicted.state;
                mirror.timeline = evicted.timeline;
                mirror.manifest = evicted.manifest;
            }
            log::debug!("evicted slot for source {:?}; a mirror slot retains it", key);
        } else {
            log::info!("evicting and releasing source {:?}", key);
            evicted.handle.source().release();
        }
        // Leases opened through the evicted slot survive; release_period
        // routes through the handle retained in the lease table.
    }

    /// Build and publish a new composite if every live slot has reported
    fn maybe_publish(&mut self) {
        if self.slots.is_empty() {
            return;
        }
        let mut timelines = Vec::with_capacity(self.slots.len());
        let mut manifests = Vec::with_capacity(self.slots.len());
        let mut sources = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            match &slot.timeline {
                Some(timeline) => {
                    timelines.push(timeline.clone());
                    manifests.push(slot.manifest.clone().unwrap_or(ManifestData::Null));
                    sources.push(slot.handle.clone());
                }
                None => return,
            }
        }

        let composite = Arc::new(CompositeTimeline::new(timelines));
        log::info!(
            "published composite timeline: {} periods, {} windows across {} sources",
            composite.period_count(),
            composite.window_count(),
            self.slots.len()
        );
        self.current = Some(composite.clone());
        self.current_sources = sources;
        let _ = self.event_tx.send(ComposerEvent::TimelineReady {
            timeline: composite,
            manifests,
        });
    }
}

impl Default for TimelineComposer {
    fn default() -> Self {
        Self::new()
    }
}
