//! A single conveyor belt segment.
//!
//! A [`Belt`] owns an ordered sequence of [`BeltItem`]s (front to back) on a
//! fixed-length track and does exact integer bookkeeping of the free space
//! around them:
//!
//! - `rear_space` — signed free distance between the belt's upstream end and
//!   its occupied content. Negative means the rearmost item overhangs onto
//!   the belt feeding this one (at most one footprint).
//! - `reserved_front_space` — distance blocked at the downstream end, either
//!   by the tail of an item that has partially crossed onto the next belt or
//!   by an external constraint (a stopped machine, a closed gate).
//!
//! Each item stores only `dist_to_next`: the free distance from its front
//! edge to the next obstruction ahead (the item in front's back edge, or the
//! belt's downstream end for the frontmost item). The ground truth
//! `rear_space` is therefore `length − Σ(dist_to_next + footprint)`, and the
//! per-tick movement loop maintains it incrementally.
//!
//! Everything here touches only this belt's state. Protocols that reach a
//! neighbor — carry-over, the upstream reservation cascade, split/join
//! wiring — are driven by [`crate::system::BeltSystem`] over belt ids.

use crate::error::BeltError;
use crate::id::{BeltId, GroupId, ItemTypeId};
use crate::item::BeltItem;
use crate::space::{item_span, FOOTPRINT_I, ITEM_FOOTPRINT};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Belt
// ---------------------------------------------------------------------------

/// One fixed-length belt segment.
///
/// Constructed standalone with [`Belt::new`], then registered with
/// [`crate::system::BeltSystem::add_belt`], which assigns its id and group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Belt {
    pub(crate) length: u32,
    /// Distance advanced per tick. Capped at one item footprint so at most
    /// one item can cross a belt boundary per tick.
    pub(crate) speed: u32,
    pub(crate) rear_space: i32,
    pub(crate) reserved_front_space: u32,
    /// Items front to back: index 0 is the frontmost (closest to the
    /// downstream end).
    pub(crate) items: Vec<BeltItem>,
    pub(crate) next_belt: Option<BeltId>,
    pub(crate) input_belts: Vec<BeltId>,
    /// Round-robin across inputs instead of first-eligible priority.
    pub balance_inputs: bool,
    /// The upstream belt currently allowed to carry items over, and the one
    /// whose transfer may still straddle the boundary while `rear_space` is
    /// negative.
    pub(crate) current_input: Option<BeltId>,
    /// First item still able to move. Persists across ticks; recomputed on
    /// every mutation that can free space ahead.
    pub(crate) front_item_index: usize,
    pub(crate) group: Option<GroupId>,
    /// Accumulated carry-over shortfall from clamping against a crowded
    /// downstream belt.
    pub(crate) carry_error: u32,
}

impl Belt {
    /// Create a standalone belt with the given speed (units per tick).
    /// Speeds above one item footprint are capped.
    pub fn new(speed: u32) -> Self {
        Self {
            length: 0,
            speed: speed.min(ITEM_FOOTPRINT),
            rear_space: 0,
            reserved_front_space: 0,
            items: Vec::new(),
            next_belt: None,
            input_belts: Vec::new(),
            balance_inputs: false,
            current_input: None,
            front_item_index: 0,
            group: None,
            carry_error: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn rear_space(&self) -> i32 {
        self.rear_space
    }

    pub fn reserved_front_space(&self) -> u32 {
        self.reserved_front_space
    }

    pub fn items(&self) -> &[BeltItem] {
        &self.items
    }

    pub fn next_belt(&self) -> Option<BeltId> {
        self.next_belt
    }

    pub fn input_belts(&self) -> &[BeltId] {
        &self.input_belts
    }

    pub fn current_input(&self) -> Option<BeltId> {
        self.current_input
    }

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub fn front_item_index(&self) -> usize {
        self.front_item_index
    }

    pub fn carry_error(&self) -> u32 {
        self.carry_error
    }

    // -----------------------------------------------------------------------
    // Length and rear space
    // -----------------------------------------------------------------------

    /// Set the track length and recompute `rear_space` from the item list.
    pub fn set_length(&mut self, length: u32) {
        self.length = length;
        self.recalculate_rear_space();
    }

    /// Ground-truth recompute of `rear_space` from the item list, O(items).
    pub fn recalculate_rear_space(&mut self) {
        self.rear_space = self.rear_space_ground_truth();
        debug_assert!(
            self.rear_space >= -FOOTPRINT_I,
            "rear space {} below the one-footprint overhang limit",
            self.rear_space
        );
    }

    /// The value `rear_space` must equal between ticks. The frontmost item's
    /// stored distance already spans the reserved region, so the reservation
    /// only enters the formula when the belt is empty.
    pub(crate) fn rear_space_ground_truth(&self) -> i32 {
        if self.items.is_empty() {
            self.length as i32 - self.reserved_front_space as i32
        } else {
            let occupied: i64 = self
                .items
                .iter()
                .map(|item| item_span(item.dist_to_next) as i64)
                .sum();
            (self.length as i64 - occupied) as i32
        }
    }

    // -----------------------------------------------------------------------
    // Front-item cursor
    // -----------------------------------------------------------------------

    /// Advance the cursor past items flush against their obstruction.
    pub(crate) fn determine_next_front_item(&mut self) {
        while self.front_item_index < self.items.len() {
            let threshold = if self.front_item_index == 0 {
                self.reserved_front_space
            } else {
                0
            };
            if self.items[self.front_item_index].dist_to_next > threshold {
                break;
            }
            self.front_item_index += 1;
        }
    }

    pub(crate) fn recalculate_front_item(&mut self) {
        self.front_item_index = 0;
        self.determine_next_front_item();
    }

    // -----------------------------------------------------------------------
    // Item placement and removal
    // -----------------------------------------------------------------------

    /// Append an item flush against the belt's upstream end. Fails when less
    /// than one footprint of rear space is free.
    pub fn append_item(&mut self, kind: ItemTypeId) -> Result<(), BeltError> {
        if self.rear_space < FOOTPRINT_I {
            return Err(BeltError::InsufficientSpace {
                needed: ITEM_FOOTPRINT,
                available: self.rear_space,
            });
        }
        let dist = (self.rear_space - FOOTPRINT_I) as u32
            + if self.items.is_empty() {
                self.reserved_front_space
            } else {
                0
            };
        self.items.push(BeltItem::new(kind, dist));
        self.rear_space = 0;
        Ok(())
    }

    /// Append an item behind every existing item, with its front edge at
    /// `dist_to_end` from the downstream end. The offset must land inside the
    /// free rear region; up to one footprint may overhang past the upstream
    /// end (the caller is responsible for the matching upstream reservation,
    /// as during state restore).
    pub fn append_item_at(&mut self, kind: ItemTypeId, dist_to_end: u32) -> Result<(), BeltError> {
        if dist_to_end > self.length {
            return Err(BeltError::InvalidOffset {
                offset: dist_to_end,
                length: self.length,
            });
        }
        let dist = if !self.items.is_empty() {
            // Distance from the new front edge to the rearmost item's back
            // edge; negative would overlap.
            let rearmost_back = self.length as i32 - self.rear_space;
            let gap = dist_to_end as i32 - rearmost_back;
            if gap < 0 {
                return Err(BeltError::InsufficientSpace {
                    needed: (-gap) as u32,
                    available: self.rear_space,
                });
            }
            gap as u32
        } else {
            if dist_to_end < self.reserved_front_space {
                return Err(BeltError::InsufficientSpace {
                    needed: self.reserved_front_space - dist_to_end,
                    available: 0,
                });
            }
            dist_to_end
        };
        self.items.push(BeltItem::new(kind, dist));
        self.rear_space = self.length as i32 - dist_to_end as i32 - FOOTPRINT_I;
        Ok(())
    }

    /// Remove the item at `index`, merging its footprint and gap into the
    /// item behind it (or back into `rear_space` if it was the rearmost).
    pub fn remove_item(&mut self, index: usize) -> Option<BeltItem> {
        if index >= self.items.len() {
            return None;
        }
        let item = self.items.remove(index);
        let span = item_span(item.dist_to_next) as i32;
        if index < self.items.len() {
            self.items[index].dist_to_next += span as u32;
        } else {
            self.rear_space += span;
            if self.items.is_empty() {
                self.rear_space -= self.reserved_front_space as i32;
            }
        }
        self.recalculate_front_item();
        Some(item)
    }

    // -----------------------------------------------------------------------
    // Space queries
    // -----------------------------------------------------------------------

    /// Free space around a target offset (a front-edge position measured
    /// from the downstream end).
    ///
    /// `to_front` is the free distance from the offset toward the downstream
    /// end before the nearest obstruction (negative when the offset is inside
    /// an item or inside the reserved region). `to_back` is the free distance
    /// left behind an item placed at the offset, before the next obstruction
    /// rearward (negative when a footprint does not fit). `index_before` is
    /// the item immediately in front of the offset, if any.
    pub fn get_available_space_at(&self, dist_to_end: u32) -> Result<SpaceAt, BeltError> {
        if dist_to_end > self.length {
            return Err(BeltError::InvalidOffset {
                offset: dist_to_end,
                length: self.length,
            });
        }

        let mut front: u32 = 0;
        let mut back: u32 = self.length;
        let mut index_before: Option<usize> = None;
        let mut d: u32 = 0;
        let mut found = false;

        for i in 0..self.items.len() {
            let prev_d = d;
            d += self.items[i].dist_to_next;
            if d > dist_to_end {
                // The offset falls in the gap ahead of item i.
                back = d;
                if i > 0 {
                    front = prev_d;
                    index_before = Some(i - 1);
                } else {
                    front = self.reserved_front_space;
                }
                found = true;
                break;
            }
            d += ITEM_FOOTPRINT;
            if d > dist_to_end {
                // The offset falls inside item i (not at its front edge).
                front = d;
                back = front;
                if i + 1 < self.items.len() {
                    back += self.items[i + 1].dist_to_next;
                } else {
                    back = self.length;
                }
                index_before = Some(i);
                found = true;
                break;
            }
        }

        if !found {
            if self.items.is_empty() {
                front = self.reserved_front_space;
            } else {
                // Beyond the rearmost item; d is its back edge.
                front = d;
                index_before = Some(self.items.len() - 1);
            }
        }

        Ok(SpaceAt {
            to_front: dist_to_end as i32 - front as i32,
            to_back: back as i32 - dist_to_end as i32 - FOOTPRINT_I,
            index_before,
        })
    }

    // -----------------------------------------------------------------------
    // Backward compaction
    // -----------------------------------------------------------------------

    /// Push the item at `start` backward (upstream) by up to `amount`,
    /// consuming the gaps behind it and then dropping `rear_space` no lower
    /// than `rear_floor`. Items behind move only as far as their own gaps
    /// force them to. Returns the distance the item at `start` actually
    /// moved; its `dist_to_next` grows by exactly that much.
    pub(crate) fn push_items_back(&mut self, start: usize, amount: u32, rear_floor: i32) -> u32 {
        debug_assert!(start < self.items.len());
        let mut remaining = amount;
        let mut i = start + 1;
        while remaining > 0 && i < self.items.len() {
            let take = self.items[i].dist_to_next.min(remaining);
            self.items[i].dist_to_next -= take;
            remaining -= take;
            i += 1;
        }
        if remaining > 0 {
            let headroom = (self.rear_space - rear_floor).max(0) as u32;
            let drop = remaining.min(headroom);
            self.rear_space -= drop as i32;
            remaining -= drop;
        }
        let moved = amount - remaining;
        self.items[start].dist_to_next += moved;
        moved
    }

    /// How far the item at `start` could move backward without any help from
    /// the upstream belt: the gaps behind it plus the rear headroom down to
    /// zero.
    pub(crate) fn push_capacity_local(&self, start: usize) -> u32 {
        let gaps: u32 = self.items[start + 1..]
            .iter()
            .map(|item| item.dist_to_next)
            .sum();
        gaps + self.rear_space.max(0) as u32
    }

    /// How much the reservation could grow without upstream help: the front
    /// item's slack plus everything `push_capacity_local` can recover (for an
    /// empty belt, just the free rear space).
    pub(crate) fn reservation_capacity_local(&self) -> u32 {
        match self.items.first() {
            Some(front) => {
                front.dist_to_next - self.reserved_front_space + self.push_capacity_local(0)
            }
            None => self.rear_space.max(0) as u32,
        }
    }

    /// How much more of this belt's rearmost item may overhang upstream.
    pub(crate) fn overhang_room(&self) -> u32 {
        ITEM_FOOTPRINT.saturating_sub((-self.rear_space).max(0) as u32)
    }

    /// The belt to push space requests to: the active input, or the sole
    /// input when there is exactly one.
    pub(crate) fn push_upstream_target(&self) -> Option<BeltId> {
        self.current_input.or_else(|| match self.input_belts[..] {
            [only] => Some(only),
            _ => None,
        })
    }

    // -----------------------------------------------------------------------
    // Splitting and joining
    // -----------------------------------------------------------------------

    /// Partition this belt at `dist_to_end`: this belt keeps the downstream
    /// `[0, dist_to_end)` portion, the returned belt takes the upstream
    /// remainder with the items behind the boundary. An item straddling the
    /// boundary stays on the downstream side, overhanging (negative
    /// `rear_space`); the system mirrors that overhang as reserved front
    /// space on the new upstream belt when it wires the pair together.
    pub(crate) fn split_at(&mut self, dist_to_end: u32) -> Result<Belt, BeltError> {
        if dist_to_end == 0 || dist_to_end >= self.length {
            return Err(BeltError::InvalidSplitPoint {
                offset: dist_to_end,
                length: self.length,
            });
        }
        let space = self.get_available_space_at(dist_to_end)?;
        let start = space.index_before.map_or(0, |i| i + 1);

        let mut upstream = Belt::new(self.speed);
        upstream.balance_inputs = self.balance_inputs;
        upstream.items = self.items.split_off(start);
        upstream.length = self.length - dist_to_end;
        self.length = dist_to_end;

        // The new belt's frontmost item now measures its distance to the
        // split boundary instead of to an item that stayed downstream.
        if let Some(first) = upstream.items.first_mut() {
            first.dist_to_next = (space.to_back + FOOTPRINT_I).max(0) as u32;
        }

        upstream.recalculate_rear_space();
        self.recalculate_rear_space();
        upstream.recalculate_front_item();
        self.recalculate_front_item();
        Ok(upstream)
    }

    /// Absorb `other` (the belt feeding this one) onto this belt's rear:
    /// items append behind this belt's, bridged by the boundary gap, and the
    /// track extends by `other`'s length. `other`'s reservation against this
    /// belt dissolves; the combined rear is `other`'s.
    pub(crate) fn absorb_rear(&mut self, mut other: Belt) {
        let bridge = self.rear_space;
        if let Some(first) = other.items.first_mut() {
            first.dist_to_next = (first.dist_to_next as i32 + bridge) as u32;
        }
        self.items.append(&mut other.items);
        self.length += other.length;
        self.recalculate_rear_space();
        self.recalculate_front_item();
    }
}

/// Result of [`Belt::get_available_space_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceAt {
    pub to_front: i32,
    pub to_back: i32,
    pub index_before: Option<usize>,
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::{tiles, ITEM_FOOTPRINT};

    fn kind(n: u32) -> ItemTypeId {
        ItemTypeId(n)
    }

    fn belt(length: u32, speed: u32) -> Belt {
        let mut b = Belt::new(speed);
        b.set_length(length);
        b
    }

    // -----------------------------------------------------------------------
    // Construction and rear space
    // -----------------------------------------------------------------------

    #[test]
    fn new_belt_caps_speed_at_footprint() {
        let b = Belt::new(10_000);
        assert_eq!(b.speed(), ITEM_FOOTPRINT);
    }

    #[test]
    fn empty_belt_rear_space_is_length() {
        let b = belt(tiles(2), 256);
        assert_eq!(b.rear_space(), tiles(2) as i32);
    }

    #[test]
    fn rear_space_tracks_appends() {
        let mut b = belt(1024, 256);
        b.append_item(kind(0)).unwrap();
        // Flush append: item sits at the very rear, no free space behind it.
        assert_eq!(b.rear_space(), 0);
        assert_eq!(b.items()[0].dist_to_next, 1024 - ITEM_FOOTPRINT);
    }

    #[test]
    fn append_rejected_when_rear_too_small() {
        let mut b = belt(ITEM_FOOTPRINT - 1, 256);
        let err = b.append_item(kind(0)).unwrap_err();
        assert!(matches!(err, BeltError::InsufficientSpace { .. }));
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut b = belt(1024, 256);
        b.append_item_at(kind(0), 100).unwrap();
        b.append_item_at(kind(1), 500).unwrap();
        let first = b.rear_space();
        b.recalculate_rear_space();
        assert_eq!(b.rear_space(), first);
        b.recalculate_rear_space();
        assert_eq!(b.rear_space(), first);
    }

    // -----------------------------------------------------------------------
    // append_item_at
    // -----------------------------------------------------------------------

    #[test]
    fn append_at_places_front_edge() {
        let mut b = belt(1024, 256);
        b.append_item_at(kind(0), 100).unwrap();
        assert_eq!(b.items()[0].dist_to_next, 100);
        assert_eq!(b.rear_space(), 1024 - 100 - ITEM_FOOTPRINT as i32);
    }

    #[test]
    fn append_at_rejects_overlap() {
        let mut b = belt(1024, 256);
        b.append_item_at(kind(0), 100).unwrap();
        // The first item's back edge is at 356; a front edge at 300 overlaps.
        let err = b.append_item_at(kind(1), 300).unwrap_err();
        assert!(matches!(err, BeltError::InsufficientSpace { .. }));
    }

    #[test]
    fn append_at_allows_partial_overhang() {
        let mut b = belt(1024, 256);
        // Front edge at 1000: the back edge lands 232 past the upstream end.
        b.append_item_at(kind(0), 1000).unwrap();
        assert_eq!(b.rear_space(), -232);
    }

    #[test]
    fn append_at_rejects_past_length() {
        let mut b = belt(1024, 256);
        let err = b.append_item_at(kind(0), 1025).unwrap_err();
        assert!(matches!(err, BeltError::InvalidOffset { .. }));
    }

    // -----------------------------------------------------------------------
    // remove_item
    // -----------------------------------------------------------------------

    #[test]
    fn remove_merges_span_into_follower() {
        let mut b = belt(2048, 256);
        b.append_item_at(kind(0), 100).unwrap();
        b.append_item_at(kind(1), 500).unwrap();
        // Gap of item 1: 500 - 356 = 144.
        assert_eq!(b.items()[1].dist_to_next, 144);
        let removed = b.remove_item(0).unwrap();
        assert_eq!(removed.kind, kind(0));
        // Follower inherits footprint + gap of the removed item.
        assert_eq!(b.items()[0].dist_to_next, 144 + 100 + ITEM_FOOTPRINT);
        assert_eq!(b.rear_space(), b.rear_space_ground_truth());
    }

    #[test]
    fn remove_last_merges_into_rear_space() {
        let mut b = belt(1024, 256);
        b.append_item_at(kind(0), 100).unwrap();
        b.remove_item(0).unwrap();
        assert!(b.items().is_empty());
        assert_eq!(b.rear_space(), 1024);
    }

    #[test]
    fn remove_out_of_range_is_none() {
        let mut b = belt(1024, 256);
        assert!(b.remove_item(0).is_none());
    }

    // -----------------------------------------------------------------------
    // get_available_space_at
    // -----------------------------------------------------------------------

    #[test]
    fn space_on_empty_belt() {
        let b = belt(1024, 256);
        let s = b.get_available_space_at(500).unwrap();
        assert_eq!(s.to_front, 500);
        assert_eq!(s.to_back, 1024 - 500 - ITEM_FOOTPRINT as i32);
        assert_eq!(s.index_before, None);
    }

    #[test]
    fn space_in_gap_ahead_of_front_item() {
        let mut b = belt(1024, 256);
        b.append_item_at(kind(0), 400).unwrap();
        // Offset 100 lies in the gap between the downstream end and the item.
        let s = b.get_available_space_at(100).unwrap();
        assert_eq!(s.to_front, 100);
        assert_eq!(s.to_back, 400 - 100 - ITEM_FOOTPRINT as i32);
        assert_eq!(s.index_before, None);
    }

    #[test]
    fn space_behind_rearmost_item() {
        let mut b = belt(2048, 256);
        b.append_item_at(kind(0), 100).unwrap();
        let s = b.get_available_space_at(800).unwrap();
        // Item back edge at 356.
        assert_eq!(s.to_front, 800 - 356);
        assert_eq!(s.to_back, 2048 - 800 - ITEM_FOOTPRINT as i32);
        assert_eq!(s.index_before, Some(0));
    }

    #[test]
    fn space_inside_an_item_is_negative() {
        let mut b = belt(1024, 256);
        b.append_item_at(kind(0), 100).unwrap();
        // Offset 200 is inside the item spanning [100, 356).
        let s = b.get_available_space_at(200).unwrap();
        assert!(s.to_front < 0);
        assert_eq!(s.index_before, Some(0));
    }

    #[test]
    fn space_respects_reserved_front() {
        let mut b = belt(1024, 256);
        b.reserved_front_space = 128;
        let s = b.get_available_space_at(64).unwrap();
        assert_eq!(s.to_front, 64 - 128);
    }

    // -----------------------------------------------------------------------
    // push_items_back
    // -----------------------------------------------------------------------

    #[test]
    fn push_back_consumes_gaps_then_rear() {
        let mut b = belt(2048, 256);
        b.append_item_at(kind(0), 0).unwrap();
        b.append_item_at(kind(1), 300).unwrap();
        // Item 1 gap: 300 - 256 = 44. Rear: 2048 - 556 = 1492.
        let moved = b.push_items_back(0, 100, 0);
        assert_eq!(moved, 100);
        assert_eq!(b.items()[0].dist_to_next, 100);
        // Gap fully consumed, the rest came out of rear space.
        assert_eq!(b.items()[1].dist_to_next, 0);
        assert_eq!(b.rear_space(), 1492 - 56);
        assert_eq!(b.rear_space(), b.rear_space_ground_truth());
    }

    #[test]
    fn push_back_stops_at_rear_floor() {
        let mut b = belt(512, 256);
        b.append_item_at(kind(0), 0).unwrap();
        // Rear: 512 - 256 = 256.
        let moved = b.push_items_back(0, 300, 0);
        assert_eq!(moved, 256);
        assert_eq!(b.rear_space(), 0);
        assert_eq!(b.items()[0].dist_to_next, 256);
    }

    #[test]
    fn push_back_into_overhang_with_floor() {
        let mut b = belt(512, 256);
        b.append_item_at(kind(0), 0).unwrap();
        // With a granted floor the rear may go negative.
        let moved = b.push_items_back(0, 300, -100);
        assert_eq!(moved, 300);
        assert_eq!(b.rear_space(), -44);
    }

    // -----------------------------------------------------------------------
    // split_at
    // -----------------------------------------------------------------------

    #[test]
    fn split_partitions_items_and_lengths() {
        let mut b = belt(2048, 256);
        b.append_item_at(kind(0), 100).unwrap();
        b.append_item_at(kind(1), 1500).unwrap();
        let upstream = b.split_at(1024).unwrap();

        assert_eq!(b.length(), 1024);
        assert_eq!(upstream.length(), 1024);
        assert_eq!(b.items().len(), 1);
        assert_eq!(upstream.items().len(), 1);
        assert_eq!(b.items()[0].kind, kind(0));
        assert_eq!(upstream.items()[0].kind, kind(1));
        // The upstream item's front edge was at 1500, so 476 from the split
        // boundary at 1024.
        assert_eq!(upstream.items()[0].dist_to_next, 476);
        assert_eq!(b.rear_space(), b.rear_space_ground_truth());
        assert_eq!(upstream.rear_space(), upstream.rear_space_ground_truth());
    }

    #[test]
    fn split_straddling_item_stays_downstream_and_overhangs() {
        let mut b = belt(2048, 256);
        // Item spans [900, 1156): straddles a split at 1024.
        b.append_item_at(kind(0), 900).unwrap();
        let upstream = b.split_at(1024).unwrap();

        assert_eq!(b.items().len(), 1);
        assert!(upstream.items().is_empty());
        // Back edge at 1156 is 132 past the new downstream end of 1024.
        assert_eq!(b.rear_space(), -132);
        assert_eq!(upstream.rear_space(), 1024);
    }

    #[test]
    fn split_rejects_degenerate_points() {
        let mut b = belt(1024, 256);
        assert!(matches!(
            b.split_at(0),
            Err(BeltError::InvalidSplitPoint { .. })
        ));
        assert!(matches!(
            b.split_at(1024),
            Err(BeltError::InvalidSplitPoint { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // absorb_rear
    // -----------------------------------------------------------------------

    #[test]
    fn absorb_rear_bridges_the_boundary() {
        let mut front = belt(1024, 256);
        front.append_item_at(kind(0), 100).unwrap();
        let mut rear = belt(1024, 256);
        rear.append_item_at(kind(1), 200).unwrap();

        let front_rear_space = front.rear_space();
        front.absorb_rear(rear);

        assert_eq!(front.length(), 2048);
        assert_eq!(front.items().len(), 2);
        // The absorbed item's gap now crosses the old boundary.
        assert_eq!(
            front.items()[1].dist_to_next as i32,
            200 + front_rear_space
        );
        assert_eq!(front.rear_space(), front.rear_space_ground_truth());
    }
}
