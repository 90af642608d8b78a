//! Composite timeline - the merged, read-only view across all live slots
//!
//! Built from a snapshot of every slot's timeline plus a fresh
//! [`OffsetIndex`], only once all live slots have reported. Immutable after
//! construction: a later composition event produces a brand-new value and
//! the composer swaps the visible `Arc`, never patches one already handed
//! to readers.

use std::sync::Arc;

use crate::error::{TimelineError, TimelineResult};
use crate::offsets::OffsetIndex;
use crate::source::SourceTimeline;
use crate::types::{PeriodUid, TimelinePeriod, TimelineWindow};

/// Concatenation of one or more source timelines into a single global
/// index space.
pub struct CompositeTimeline {
    timelines: Vec<Arc<dyn SourceTimeline>>,
    offsets: OffsetIndex,
}

impl CompositeTimeline {
    /// Build from an ordered snapshot of per-slot timelines
    pub fn new(timelines: Vec<Arc<dyn SourceTimeline>>) -> Self {
        let offsets = OffsetIndex::from_counts(
            timelines
                .iter()
                .map(|timeline| (timeline.period_count(), timeline.window_count())),
        );
        Self { timelines, offsets }
    }

    /// The offset index underlying this composition
    pub fn offsets(&self) -> &OffsetIndex {
        &self.offsets
    }

    /// Total period count across all slots
    pub fn period_count(&self) -> usize {
        self.offsets.period_count()
    }

    /// Total window count across all slots
    pub fn window_count(&self) -> usize {
        self.offsets.window_count()
    }

    /// Look up a window by global index.
    ///
    /// The owning slot's timeline answers at the local index; the window's
    /// embedded period range is then re-based into the global index space.
    pub fn window(&self, global_window_index: usize) -> TimelineResult<TimelineWindow> {
        if global_window_index >= self.window_count() {
            return Err(TimelineError::WindowIndexOutOfRange {
                index: global_window_index,
                count: self.window_count(),
            });
        }
        let slot = self.offsets.slot_for_window(global_window_index);
        let local_index = global_window_index - self.offsets.first_window_of(slot);
        let mut window = self.timelines[slot].window(local_index)?;

        let first_period = self.offsets.first_period_of(slot);
        window.first_period_index += first_period;
        window.last_period_index += first_period;
        Ok(window)
    }

    /// Look up a period by global index.
    ///
    /// The period's embedded window index is re-based, and when ids are
    /// requested the child uid is wrapped with the owning slot index so
    /// identifiers stay globally unique across duplicate slots.
    pub fn period(
        &self,
        global_period_index: usize,
        with_ids: bool,
    ) -> TimelineResult<TimelinePeriod> {
        if global_period_index >= self.period_count() {
            return Err(TimelineError::PeriodIndexOutOfRange {
                index: global_period_index,
                count: self.period_count(),
            });
        }
        let slot = self.offsets.slot_for_period(global_period_index);
        let local_index = global_period_index - self.offsets.first_period_of(slot);
        let mut period = self.timelines[slot].period(local_index, with_ids)?;

        period.window_index += self.offsets.first_window_of(slot);
        if with_ids {
            period.uid = period.uid.take().map(|child| PeriodUid::tagged(slot, child));
        }
        Ok(period)
    }

    /// Global period index for a tagged identifier, `None` if the
    /// identifier is not a tagged pair, its slot is out of range, or the
    /// child timeline does not recognize the child identifier.
    pub fn index_of_period(&self, uid: &PeriodUid) -> Option<usize> {
        let (slot, child) = uid.as_tagged()?;
        if slot >= self.timelines.len() {
            return None;
        }
        self.timelines[slot]
            .index_of_period(child)
            .map(|local_index| self.offsets.first_period_of(slot) + local_index)
    }
}

/// A composition is itself a source timeline, so compositions nest.
impl SourceTimeline for CompositeTimeline {
    fn period_count(&self) -> usize {
        CompositeTimeline::period_count(self)
    }

    fn window_count(&self) -> usize {
        CompositeTimeline::window_count(self)
    }

    fn window(&self, local_index: usize) -> TimelineResult<TimelineWindow> {
        CompositeTimeline::window(self, local_index)
    }

    fn period(&self, local_index: usize, with_ids: bool) -> TimelineResult<TimelinePeriod> {
        CompositeTimeline::period(self, local_index, with_ids)
    }

    fn index_of_period(&self, uid: &PeriodUid) -> Option<usize> {
        CompositeTimeline::index_of_period(self, uid)
    }
}
