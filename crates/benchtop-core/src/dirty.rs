//! Tracks which containers need their derived state (mix color,
//! measurement) recomputed this tick.
//!
//! The mixture phase only visits containers whose contents changed; moved
//! equipment is tracked separately for zone re-checks and display layers.
//! Call [`mark_clean`](DirtyTracker::mark_clean) at the end of a tick.

use crate::id::EquipmentId;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    changed_contents: BTreeSet<EquipmentId>,
    moved: BTreeSet<EquipmentId>,
    bench_dirty: bool,
    any_dirty: bool,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A container's contents changed (dispense, removal of entries).
    pub fn mark_contents(&mut self, equipment: EquipmentId) {
        self.changed_contents.insert(equipment);
        self.any_dirty = true;
    }

    /// An instance was placed, moved, or docked.
    pub fn mark_moved(&mut self, equipment: EquipmentId) {
        self.moved.insert(equipment);
        self.any_dirty = true;
    }

    /// The bench population changed (instance added or removed).
    pub fn mark_bench(&mut self) {
        self.bench_dirty = true;
        self.any_dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.any_dirty
    }

    pub fn is_contents_dirty(&self, equipment: EquipmentId) -> bool {
        self.changed_contents.contains(&equipment)
    }

    pub fn is_moved(&self, equipment: EquipmentId) -> bool {
        self.moved.contains(&equipment)
    }

    pub fn is_bench_dirty(&self) -> bool {
        self.bench_dirty
    }

    pub fn changed_contents(&self) -> &BTreeSet<EquipmentId> {
        &self.changed_contents
    }

    pub fn moved(&self) -> &BTreeSet<EquipmentId> {
        &self.moved
    }

    /// Reset all flags, marking everything as clean.
    pub fn mark_clean(&mut self) {
        self.changed_contents.clear();
        self.moved.clear();
        self.bench_dirty = false;
        self.any_dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn make_ids(count: usize) -> Vec<EquipmentId> {
        let mut sm: SlotMap<EquipmentId, ()> = SlotMap::with_key();
        (0..count).map(|_| sm.insert(())).collect()
    }

    #[test]
    fn starts_clean() {
        let tracker = DirtyTracker::new();
        assert!(!tracker.is_dirty());
        assert!(!tracker.is_bench_dirty());
        assert!(tracker.changed_contents().is_empty());
    }

    #[test]
    fn mark_contents_tracks_container() {
        let ids = make_ids(2);
        let mut tracker = DirtyTracker::new();
        tracker.mark_contents(ids[0]);
        assert!(tracker.is_dirty());
        assert!(tracker.is_contents_dirty(ids[0]));
        assert!(!tracker.is_contents_dirty(ids[1]));
    }

    #[test]
    fn moved_and_contents_are_separate() {
        let ids = make_ids(1);
        let mut tracker = DirtyTracker::new();
        tracker.mark_moved(ids[0]);
        assert!(tracker.is_moved(ids[0]));
        assert!(!tracker.is_contents_dirty(ids[0]));
    }

    #[test]
    fn mark_clean_resets_everything() {
        let ids = make_ids(1);
        let mut tracker = DirtyTracker::new();
        tracker.mark_contents(ids[0]);
        tracker.mark_moved(ids[0]);
        tracker.mark_bench();
        tracker.mark_clean();
        assert!(!tracker.is_dirty());
        assert!(!tracker.is_contents_dirty(ids[0]));
        assert!(!tracker.is_moved(ids[0]));
        assert!(!tracker.is_bench_dirty());
    }

    #[test]
    fn duplicate_marks_collapse() {
        let ids = make_ids(1);
        let mut tracker = DirtyTracker::new();
        tracker.mark_contents(ids[0]);
        tracker.mark_contents(ids[0]);
        assert_eq!(tracker.changed_contents().len(), 1);
    }
}
