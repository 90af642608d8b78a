//! Shared test fakes: a deterministic source timeline and a scriptable
//! media source that counts capability calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{PreparationError, TimelineError, TimelineResult};
use crate::source::{MediaSource, PeriodAllocator, PrepareTicket, SourceHandle, SourceTimeline};
use crate::types::{ManifestData, PeriodHandle, PeriodUid, TimelinePeriod, TimelineWindow};

/// Bytes every stub period draws from its allocator on open
pub(crate) const PERIOD_BUFFER_BYTES: usize = 4096;

/// Route `log::` output from scenario tests through env_logger. Repeated
/// calls are fine; only the first initializes.
pub(crate) fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic timeline: one entry per window, each spanning a fixed
/// number of periods. Period uids are `PeriodUid::Value(local_index)`.
pub(crate) struct StubTimeline {
    /// (first_period, last_period) per window, local indices
    windows: Vec<(usize, usize)>,
    /// Owning window index per period
    period_windows: Vec<usize>,
    duration_us: u64,
}

impl StubTimeline {
    /// Build from per-window period spans, e.g. `&[2, 1]` is two windows
    /// covering periods 0..=1 and 2..=2.
    pub fn with_spans(spans: &[usize], duration_us: u64) -> Self {
        let mut windows = Vec::with_capacity(spans.len());
        let mut period_windows = Vec::new();
        let mut next_period = 0;
        for (window_index, &span) in spans.iter().enumerate() {
            assert!(span > 0, "windows span at least one period");
            windows.push((next_period, next_period + span - 1));
            for _ in 0..span {
                period_windows.push(window_index);
            }
            next_period += span;
        }
        Self {
            windows,
            period_windows,
            duration_us,
        }
    }
}

impl SourceTimeline for StubTimeline {
    fn period_count(&self) -> usize {
        self.period_windows.len()
    }

    fn window_count(&self) -> usize {
        self.windows.len()
    }

    fn window(&self, local_index: usize) -> TimelineResult<TimelineWindow> {
        let (first, last) = *self.windows.get(local_index).ok_or(
            TimelineError::WindowIndexOutOfRange {
                index: local_index,
                count: self.windows.len(),
            },
        )?;
        Ok(TimelineWindow {
            first_period_index: first,
            last_period_index: last,
            duration_us: self.duration_us,
        })
    }

    fn period(&self, local_index: usize, with_ids: bool) -> TimelineResult<TimelinePeriod> {
        let window_index = *self.period_windows.get(local_index).ok_or(
            TimelineError::PeriodIndexOutOfRange {
                index: local_index,
                count: self.period_windows.len(),
            },
        )?;
        Ok(TimelinePeriod {
            window_index,
            duration_us: self.duration_us,
            uid: with_ids.then(|| PeriodUid::Value(local_index as u64)),
        })
    }

    fn index_of_period(&self, uid: &PeriodUid) -> Option<usize> {
        match uid {
            PeriodUid::Value(value) if (*value as usize) < self.period_windows.len() => {
                Some(*value as usize)
            }
            _ => None,
        }
    }
}

/// Allocator that hands out zeroed buffers
pub(crate) struct NoopAllocator;

impl PeriodAllocator for NoopAllocator {
    fn allocate(&self, bytes: usize) -> Box<[u8]> {
        vec![0; bytes].into_boxed_slice()
    }
}

/// Scriptable media source. Completes preparation immediately by default;
/// in deferred mode it parks tickets until `complete_pending` is called,
/// which is how tests stage late-arriving completions.
pub(crate) struct StubSource {
    timeline: Arc<StubTimeline>,
    manifest: ManifestData,
    defer: bool,
    error: Option<PreparationError>,
    pending: Mutex<Vec<PrepareTicket>>,
    prepare_calls: AtomicUsize,
    release_calls: AtomicUsize,
    opened: Mutex<Vec<(usize, u64)>>,
    closed: Mutex<Vec<PeriodHandle>>,
    allocated_bytes: AtomicUsize,
}

impl StubSource {
    pub fn ready(spans: &[usize], duration_us: u64) -> Self {
        Self {
            timeline: Arc::new(StubTimeline::with_spans(spans, duration_us)),
            manifest: ManifestData::Null,
            defer: false,
            error: None,
            pending: Mutex::new(Vec::new()),
            prepare_calls: AtomicUsize::new(0),
            release_calls: AtomicUsize::new(0),
            opened: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
            allocated_bytes: AtomicUsize::new(0),
        }
    }

    pub fn deferred(spans: &[usize], duration_us: u64) -> Self {
        let mut source = Self::ready(spans, duration_us);
        source.defer = true;
        source
    }

    pub fn with_manifest(mut self, manifest: ManifestData) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn with_error(mut self, error: PreparationError) -> Self {
        self.error = Some(error);
        self
    }

    /// Complete every parked preparation ticket
    pub fn complete_pending(&self) {
        let tickets: Vec<PrepareTicket> = self.pending.lock().unwrap().drain(..).collect();
        for ticket in tickets {
            ticket.complete(self.timeline.clone(), self.manifest.clone());
        }
    }

    pub fn prepare_calls(&self) -> usize {
        self.prepare_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> Vec<(usize, u64)> {
        self.opened.lock().unwrap().clone()
    }

    pub fn closed(&self) -> Vec<PeriodHandle> {
        self.closed.lock().unwrap().clone()
    }

    /// Total bytes drawn through allocators across all opened periods
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes.load(Ordering::SeqCst)
    }
}

impl MediaSource for StubSource {
    fn prepare(&self, ticket: PrepareTicket) {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        if self.defer {
            self.pending.lock().unwrap().push(ticket);
        } else {
            ticket.complete(self.timeline.clone(), self.manifest.clone());
        }
    }

    fn maybe_surface_preparation_error(&self) -> Result<(), PreparationError> {
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn open_period(
        &self,
        local_index: usize,
        allocator: &dyn PeriodAllocator,
        start_position_us: u64,
    ) -> PeriodHandle {
        let buffer = allocator.allocate(PERIOD_BUFFER_BYTES);
        self.allocated_bytes.fetch_add(buffer.len(), Ordering::SeqCst);
        self.opened.lock().unwrap().push((local_index, start_position_us));
        PeriodHandle::mint()
    }

    fn close_period(&self, handle: PeriodHandle) {
        self.closed.lock().unwrap().push(handle);
    }

    fn release(&self) {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Register a fresh, immediately-ready stub source
pub(crate) fn stub_handle(spans: &[usize], duration_us: u64) -> SourceHandle {
    SourceHandle::register(Arc::new(StubSource::ready(spans, duration_us)))
}
