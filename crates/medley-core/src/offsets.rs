//! Offset index - prefix sums over per-slot period and window counts
//!
//! Built once from an ordered sequence of per-slot counts and never
//! mutated; a composition event always derives a fresh index.

/// Cumulative period/window offsets for an ordered list of source slots.
///
/// `period_offsets[i]` is the total period count through slot `i`
/// inclusive, so slot `i` owns the global range
/// `[period_offsets[i-1], period_offsets[i])` (slot 0 starting at 0).
/// Both arrays are non-decreasing and their last entries are the totals.
#[derive(Debug, Clone, Default)]
pub struct OffsetIndex {
    period_offsets: Vec<usize>,
    window_offsets: Vec<usize>,
}

impl OffsetIndex {
    /// Build the index from per-slot `(period_count, window_count)` pairs
    pub fn from_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut period_offsets = Vec::new();
        let mut window_offsets = Vec::new();
        let mut periods = 0;
        let mut windows = 0;
        for (period_count, window_count) in counts {
            periods += period_count;
            windows += window_count;
            period_offsets.push(periods);
            window_offsets.push(windows);
        }
        Self {
            period_offsets,
            window_offsets,
        }
    }

    /// Number of slots covered by this index
    pub fn slot_count(&self) -> usize {
        self.period_offsets.len()
    }

    /// Total period count across all slots
    pub fn period_count(&self) -> usize {
        self.period_offsets.last().copied().unwrap_or(0)
    }

    /// Total window count across all slots
    pub fn window_count(&self) -> usize {
        self.window_offsets.last().copied().unwrap_or(0)
    }

    /// Slot owning a global period index: floor search with exclusive
    /// upper bound. The caller must have range-checked the index; an index
    /// at or past the total maps to `slot_count()`.
    pub fn slot_for_period(&self, global_period_index: usize) -> usize {
        self.period_offsets
            .partition_point(|&offset| offset <= global_period_index)
    }

    /// Slot owning a global window index; same contract as
    /// [`slot_for_period`](Self::slot_for_period)
    pub fn slot_for_window(&self, global_window_index: usize) -> usize {
        self.window_offsets
            .partition_point(|&offset| offset <= global_window_index)
    }

    /// First global period index belonging to a slot
    pub fn first_period_of(&self, slot_index: usize) -> usize {
        if slot_index == 0 {
            0
        } else {
            self.period_offsets[slot_index - 1]
        }
    }

    /// First global window index belonging to a slot
    pub fn first_window_of(&self, slot_index: usize) -> usize {
        if slot_index == 0 {
            0
        } else {
            self.window_offsets[slot_index - 1]
        }
    }
}
