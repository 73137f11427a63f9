//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::belt::Belt;
use crate::id::{BeltId, ItemTypeId};
use crate::system::BeltSystem;

// ===========================================================================
// Item kinds
// ===========================================================================

pub fn iron() -> ItemTypeId {
    ItemTypeId(0)
}
pub fn copper() -> ItemTypeId {
    ItemTypeId(1)
}
pub fn gear() -> ItemTypeId {
    ItemTypeId(2)
}
pub fn crystal() -> ItemTypeId {
    ItemTypeId(3)
}

// ===========================================================================
// Builders
// ===========================================================================

/// A standalone belt with its length already set.
pub fn belt(length: u32, speed: u32) -> Belt {
    let mut belt = Belt::new(speed);
    belt.set_length(length);
    belt
}

/// Register a fresh belt and return its id.
pub fn add_belt(system: &mut BeltSystem, length: u32, speed: u32) -> BeltId {
    system.add_belt(belt(length, speed))
}

/// A system with verification mode on, so every tick and mutation asserts
/// the full consistency checks.
pub fn verified_system() -> BeltSystem {
    let mut system = BeltSystem::new();
    system.set_verify(true);
    system
}

/// Build a linear chain `ids[0] -> ids[1] -> ... -> ids[n-1]` of identical
/// belts.
pub fn chain(system: &mut BeltSystem, count: usize, length: u32, speed: u32) -> Vec<BeltId> {
    let ids: Vec<BeltId> = (0..count).map(|_| add_belt(system, length, speed)).collect();
    for window in ids.windows(2) {
        system.connect_belts(window[0], window[1]).expect("chain link");
    }
    ids
}

// ===========================================================================
// Queries
// ===========================================================================

/// Total items across every belt in the system.
pub fn total_items(system: &BeltSystem) -> usize {
    system.belts().map(|(_, belt)| belt.items().len()).sum()
}

/// Assert the conservation identity on one belt:
/// gaps + footprints + rear + reserved == length.
pub fn assert_conservation(system: &BeltSystem, id: BeltId) {
    let belt = system.belt(id).expect("belt exists");
    assert_eq!(
        belt.rear_space(),
        belt.rear_space_ground_truth(),
        "belt {id:?} rear space drifted from ground truth"
    );
}
