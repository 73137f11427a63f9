use crate::id::ItemTypeId;
use serde::{Deserialize, Serialize};

/// A single item travelling on a belt.
///
/// `dist_to_next` is the free distance from this item's front edge to the
/// next obstruction ahead: the back edge of the item in front, or — for the
/// frontmost item — the belt's downstream end, of which the last
/// `reserved_front_space` units are blocked.
///
/// A `BeltItem` is exclusively owned by one belt's sequence at a time;
/// carry-over moves it (never copies it) onto the downstream belt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeltItem {
    pub kind: ItemTypeId,
    pub dist_to_next: u32,
}

impl BeltItem {
    pub fn new(kind: ItemTypeId, dist_to_next: u32) -> Self {
        Self { kind, dist_to_next }
    }
}
