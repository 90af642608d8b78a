//! Period lease tracking
//!
//! Maps every open period handle back to the slot that opened it and a
//! retained clone of that slot's source handle. Leases are independent of
//! slot lifetime: a period opened on a slot that has since been evicted is
//! still releasable against the retained handle.

use std::collections::HashMap;

use crate::source::SourceHandle;
use crate::types::PeriodHandle;

/// One open period: the slot index it was opened through and the source
/// handle release must route to.
#[derive(Debug, Clone)]
pub struct PeriodLease {
    /// Slot index at the time the period was opened
    pub slot_index: usize,
    /// Retained handle to the originating source
    pub handle: SourceHandle,
}

/// Table of open period leases
#[derive(Debug, Default)]
pub struct PeriodLeaseTable {
    leases: HashMap<PeriodHandle, PeriodLease>,
}

impl PeriodLeaseTable {
    /// Record a lease for a freshly opened period
    pub fn insert(&mut self, period: PeriodHandle, slot_index: usize, handle: SourceHandle) {
        let previous = self.leases.insert(
            period,
            PeriodLease { slot_index, handle },
        );
        if previous.is_some() {
            log::warn!("period handle {:?} leased twice", period);
        }
    }

    /// Remove and return the lease for a period, `None` if the handle is
    /// unknown (already released, or the period was never opened here).
    pub fn remove(&mut self, period: PeriodHandle) -> Option<PeriodLease> {
        self.leases.remove(&period)
    }

    /// Whether a lease exists for this period
    pub fn contains(&self, period: PeriodHandle) -> bool {
        self.leases.contains_key(&period)
    }

    /// Number of open leases
    pub fn len(&self) -> usize {
        self.leases.len()
    }

    /// Whether no leases are open
    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    /// Drop all leases
    pub fn clear(&mut self) {
        self.leases.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::stub_handle;

    #[test]
    fn test_insert_and_remove() {
        let mut table = PeriodLeaseTable::default();
        let handle = stub_handle(&[2], 1_000_000);
        let period = PeriodHandle::mint();

        table.insert(period, 1, handle.clone());
        assert!(table.contains(period));
        assert_eq!(table.len(), 1);

        let lease = table.remove(period).unwrap();
        assert_eq!(lease.slot_index, 1);
        assert!(lease.handle.same_source(&handle));
        assert!(table.is_empty());
    }

    #[test]
    fn test_remove_unknown_handle_is_none() {
        let mut table = PeriodLeaseTable::default();
        assert!(table.remove(PeriodHandle::mint()).is_none());
    }

    #[test]
    fn test_clear() {
        let mut table = PeriodLeaseTable::default();
        let handle = stub_handle(&[2], 1_000_000);
        table.insert(PeriodHandle::mint(), 0, handle.clone());
        table.insert(PeriodHandle::mint(), 1, handle);
        table.clear();
        assert!(table.is_empty());
    }
}
