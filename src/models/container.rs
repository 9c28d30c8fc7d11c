use crate::models::types::{ContainerKind, ItemId};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A named, fixed-capacity ordered slot array. Slot bounds are validated by
/// the transaction engine before any call lands here; an out-of-range index
/// is a caller bug, not a recoverable condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    kind: ContainerKind,
    slots: Vec<Option<ItemId>>,
}

impl Container {
    pub fn new(kind: ContainerKind) -> Self {
        Self {
            kind,
            slots: vec![None; kind.capacity() as usize],
        }
    }

    #[inline]
    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    #[inline]
    pub fn get(&self, slot: u32) -> Option<ItemId> {
        debug_assert!(slot < self.capacity(), "slot {slot} out of {}", self.kind);
        self.slots[slot as usize]
    }

    /// Place an item, returning the previous occupant (if any).
    #[inline]
    pub fn bind(&mut self, slot: u32, item: ItemId) -> Option<ItemId> {
        debug_assert!(slot < self.capacity(), "slot {slot} out of {}", self.kind);
        self.slots[slot as usize].replace(item)
    }

    /// Empty a slot, returning what was there.
    #[inline]
    pub fn unbind(&mut self, slot: u32) -> Option<ItemId> {
        debug_assert!(slot < self.capacity(), "slot {slot} out of {}", self.kind);
        self.slots[slot as usize].take()
    }

    /// All occupied slots in index order.
    pub fn iter_bound(&self) -> impl Iterator<Item = (u32, ItemId)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|id| (i as u32, id)))
    }

    /// First empty slot within `range`, clamped to capacity.
    pub fn first_free_in(&self, range: Range<u32>) -> Option<u32> {
        let end = range.end.min(self.capacity());
        (range.start..end).find(|&i| self.slots[i as usize].is_none())
    }

    /// Slot currently holding `item`, if bound here.
    pub fn slot_of(&self, item: ItemId) -> Option<u32> {
        self.iter_bound().find(|(_, id)| *id == item).map(|(s, _)| s)
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_returns_previous_occupant() {
        let mut c = Container::new(ContainerKind::WeaponDrawer);
        assert_eq!(c.bind(2, ItemId(10)), None);
        assert_eq!(c.bind(2, ItemId(11)), Some(ItemId(10)));
        assert_eq!(c.get(2), Some(ItemId(11)));
    }

    #[test]
    fn unbind_empties_slot() {
        let mut c = Container::new(ContainerKind::WeaponDrawer);
        c.bind(0, ItemId(5));
        assert_eq!(c.unbind(0), Some(ItemId(5)));
        assert_eq!(c.unbind(0), None);
        assert_eq!(c.get(0), None);
    }

    #[test]
    fn first_free_skips_occupied_and_respects_range() {
        let mut c = Container::new(ContainerKind::Personal);
        c.bind(50, ItemId(1));
        c.bind(51, ItemId(2));
        assert_eq!(c.first_free_in(50..100), Some(52));
        assert_eq!(c.first_free_in(50..52), None);
    }

    #[test]
    fn snapshot_round_trip_preserves_slots() {
        let mut c = Container::new(ContainerKind::Equipped);
        c.bind(3, ItemId(77));
        c.bind(13, ItemId(78));
        let json = serde_json::to_string(&c).unwrap();
        let back: Container = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
