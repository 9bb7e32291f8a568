//! Single-slot buffer behind "undo dot" / "redo dot".
//!
//! Removing the last point parks it here; restoring appends it back. Any other
//! structural edit empties the slot, so there is never more than one point to
//! bring back.

use crate::document::{Point, Tag};

/// A point taken off the end of a flow, together with its tag memberships
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedPoint {
    pub point: Point,
    pub tags: Vec<Tag>,
}

/// Holds at most one removed point
#[derive(Debug, Clone, Default)]
pub struct RemovedPointSlot {
    slot: Option<RemovedPoint>,
}

impl RemovedPointSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a removed point, discarding whatever was parked before
    pub fn store(&mut self, removed: RemovedPoint) {
        self.slot = Some(removed);
    }

    /// Take the parked point out of the slot
    pub fn take(&mut self) -> Option<RemovedPoint> {
        self.slot.take()
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }

    pub fn can_restore(&self) -> bool {
        self.slot.is_some()
    }

    pub fn peek(&self) -> Option<&RemovedPoint> {
        self.slot.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PointId;

    fn removed(id: u64) -> RemovedPoint {
        RemovedPoint {
            point: Point::new(PointId(id), 50.0),
            tags: Vec::new(),
        }
    }

    #[test]
    fn holds_only_latest() {
        let mut slot = RemovedPointSlot::new();
        assert!(!slot.can_restore());

        slot.store(removed(1));
        slot.store(removed(2));
        assert_eq!(slot.peek().map(|r| r.point.id), Some(PointId(2)));

        assert_eq!(slot.take().map(|r| r.point.id), Some(PointId(2)));
        assert!(slot.take().is_none());
    }

    #[test]
    fn clear_empties() {
        let mut slot = RemovedPointSlot::new();
        slot.store(removed(7));
        slot.clear();
        assert!(!slot.can_restore());
    }
}
