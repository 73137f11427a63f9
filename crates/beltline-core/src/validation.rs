//! Whole-system consistency checking.
//!
//! [`check_consistency`] runs the O(items) ground-truth checks behind every
//! invariant the incremental bookkeeping is supposed to maintain: rear-space
//! recomputation, distance bounds, link symmetry, group partitioning and the
//! update-order permutation. It is cheap enough for tests to run after every
//! tick; production callers enable it selectively via
//! [`BeltSystem::set_verify`], which panics on the first finding (a finding
//! means corrupted invariants, not a recoverable condition).

use crate::id::{BeltId, GroupId};
use crate::space::FOOTPRINT_I;
use crate::system::BeltSystem;
use std::collections::{BTreeSet, VecDeque};

/// A violated invariant, naming the belt or group it was found on.
#[derive(Debug, thiserror::Error)]
pub enum ConsistencyError {
    #[error("belt {belt:?}: tracked rear space {tracked} != recomputed {recomputed}")]
    RearSpaceDrift {
        belt: BeltId,
        tracked: i32,
        recomputed: i32,
    },
    #[error("belt {belt:?}: rear space {rear} outside [-footprint, length {length}]")]
    RearSpaceOutOfBounds { belt: BeltId, rear: i32, length: u32 },
    #[error("belt {belt:?}: item {index} distance {dist} exceeds belt length {length}")]
    ItemDistanceTooLarge {
        belt: BeltId,
        index: usize,
        dist: u32,
        length: u32,
    },
    #[error("belt {belt:?}: front item distance {dist} below reserved front space {reserved}")]
    FrontItemInsideReservation {
        belt: BeltId,
        dist: u32,
        reserved: u32,
    },
    #[error("belt {belt:?}: edge to {other:?} is not mirrored")]
    BrokenLink { belt: BeltId, other: BeltId },
    #[error("belt {belt:?}: active input {input:?} is not among its inputs")]
    ForeignActiveInput { belt: BeltId, input: BeltId },
    #[error("belt {belt:?}: not a member of its group {group:?}")]
    GroupMembershipMismatch {
        belt: BeltId,
        group: Option<GroupId>,
    },
    #[error("group {group:?} is not a maximal connected component")]
    GroupNotAComponent { group: GroupId },
    #[error("update order is not a permutation of the belt ids")]
    OrderNotAPermutation,
}

/// Check every invariant the system maintains between ticks. Returns the
/// first violation found, sweeping belts in ascending id order so failures
/// are deterministic.
pub fn check_consistency(system: &BeltSystem) -> Result<(), ConsistencyError> {
    let ids: BTreeSet<BeltId> = system.belts.keys().copied().collect();

    for &id in &ids {
        let Some(belt) = system.belts.get(&id) else {
            continue;
        };

        // Space accounting.
        let recomputed = belt.rear_space_ground_truth();
        if belt.rear_space() != recomputed {
            return Err(ConsistencyError::RearSpaceDrift {
                belt: id,
                tracked: belt.rear_space(),
                recomputed,
            });
        }
        if belt.rear_space() < -FOOTPRINT_I || belt.rear_space() > belt.length() as i32 {
            return Err(ConsistencyError::RearSpaceOutOfBounds {
                belt: id,
                rear: belt.rear_space(),
                length: belt.length(),
            });
        }
        for (index, item) in belt.items().iter().enumerate() {
            if item.dist_to_next > belt.length() {
                return Err(ConsistencyError::ItemDistanceTooLarge {
                    belt: id,
                    index,
                    dist: item.dist_to_next,
                    length: belt.length(),
                });
            }
        }
        if let Some(front) = belt.items().first() {
            if front.dist_to_next < belt.reserved_front_space() {
                return Err(ConsistencyError::FrontItemInsideReservation {
                    belt: id,
                    dist: front.dist_to_next,
                    reserved: belt.reserved_front_space(),
                });
            }
        }

        // Link symmetry.
        if let Some(next) = belt.next_belt() {
            let mirrored = system
                .belts
                .get(&next)
                .is_some_and(|n| n.input_belts().contains(&id));
            if !mirrored {
                return Err(ConsistencyError::BrokenLink {
                    belt: id,
                    other: next,
                });
            }
        }
        for &input in belt.input_belts() {
            let mirrored = system
                .belts
                .get(&input)
                .is_some_and(|upstream| upstream.next_belt() == Some(id));
            if !mirrored {
                return Err(ConsistencyError::BrokenLink {
                    belt: id,
                    other: input,
                });
            }
        }
        if let Some(active) = belt.current_input() {
            if !belt.input_belts().contains(&active) {
                return Err(ConsistencyError::ForeignActiveInput {
                    belt: id,
                    input: active,
                });
            }
        }

        // Group membership.
        let in_group = belt
            .group()
            .and_then(|gid| system.groups.get(&gid))
            .is_some_and(|group| group.belt_ids.contains(&id));
        if !in_group {
            return Err(ConsistencyError::GroupMembershipMismatch {
                belt: id,
                group: belt.group(),
            });
        }
    }

    // Every group must be exactly one connected component.
    for (&gid, group) in &system.groups {
        if let Some(&start) = group.belt_ids.iter().next() {
            let component = flood(system, start);
            if component != group.belt_ids {
                return Err(ConsistencyError::GroupNotAComponent { group: gid });
            }
        }
    }

    // Update order is a permutation of the belt ids.
    let ordered: BTreeSet<BeltId> = system.update_order.iter().copied().collect();
    if ordered != ids || system.update_order.len() != ids.len() {
        return Err(ConsistencyError::OrderNotAPermutation);
    }

    Ok(())
}

/// The connected component containing `start`, over upstream and downstream
/// edges.
fn flood(system: &BeltSystem, start: BeltId) -> BTreeSet<BeltId> {
    let mut component = BTreeSet::new();
    let mut queue = VecDeque::from([start]);
    while let Some(id) = queue.pop_front() {
        if !component.insert(id) {
            continue;
        }
        if let Some(belt) = system.belts.get(&id) {
            if let Some(next) = belt.next_belt() {
                if !component.contains(&next) {
                    queue.push_back(next);
                }
            }
            for &input in belt.input_belts() {
                if !component.contains(&input) {
                    queue.push_back(input);
                }
            }
        }
    }
    component
}
