//! The belt system: registry, connectivity graph, group partitioning,
//! deterministic update ordering, and every protocol that crosses a belt
//! boundary.
//!
//! Belts reference each other only by [`BeltId`] through a flat id-keyed
//! table, so arbitrary rewiring and cyclic topologies are safe. The system
//! is the sole owner of that table; there is no global state — callers
//! construct and hold a [`BeltSystem`].
//!
//! # Tick pipeline
//!
//! [`BeltSystem::tick`] walks `update_order` (downstream before upstream
//! within every chain) and, per belt:
//!
//! 1. **Reservation refresh** — reconcile `reserved_front_space` against the
//!    downstream overhang left by an earlier carry-over.
//! 2. **Movement** — advance items by `speed`; the frontmost item is carried
//!    over onto the next belt when it would overshoot and the next belt
//!    accepts this one as its input.
//! 3. **Rear reconciliation** — O(1) bookkeeping with a full-recompute
//!    fallback.
//! 4. **Active-input refresh** — pick which upstream belt may send next.
//!
//! Topology mutations (connect, disconnect, split, join, add, remove) must
//! happen strictly between ticks.

use crate::belt::Belt;
use crate::error::BeltError;
use crate::id::{BeltId, GroupId, ItemTypeId};
use crate::item::BeltItem;
use crate::space::{item_span, FOOTPRINT_I, ITEM_FOOTPRINT};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

// ---------------------------------------------------------------------------
// BeltGroup
// ---------------------------------------------------------------------------

/// A maximal connected component of belts under the upstream/downstream
/// relation. Purely an update-ordering optimization: rebuilding the order
/// after a topology change only touches the affected group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeltGroup {
    pub id: GroupId,
    pub belt_ids: BTreeSet<BeltId>,
}

impl BeltGroup {
    fn new(id: GroupId) -> Self {
        Self {
            id,
            belt_ids: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.belt_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.belt_ids.is_empty()
    }
}

// ---------------------------------------------------------------------------
// BeltSystem
// ---------------------------------------------------------------------------

/// Owner of all belts, their connectivity, group partitioning and the
/// per-tick update order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeltSystem {
    pub(crate) belts: HashMap<BeltId, Belt>,
    /// Permutation of all belt ids, downstream-before-upstream within each
    /// chain; cycles resolved by a deterministic sweep.
    pub(crate) update_order: Vec<BeltId>,
    pub(crate) groups: BTreeMap<GroupId, BeltGroup>,
    next_belt_id: u32,
    next_group_id: u32,
    tick: u64,
    /// Verification mode: when set, the O(items) consistency checks run
    /// after every tick and completed mutation, and panic on failure.
    #[serde(skip)]
    verify: bool,
}

impl Default for BeltSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl BeltSystem {
    pub fn new() -> Self {
        Self {
            belts: HashMap::new(),
            update_order: Vec::new(),
            groups: BTreeMap::new(),
            next_belt_id: 0,
            next_group_id: 0,
            tick: 0,
            verify: false,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn belt(&self, id: BeltId) -> Option<&Belt> {
        self.belts.get(&id)
    }

    /// Iterate all belts. Iteration order is unspecified; use
    /// [`BeltSystem::update_order`] for the deterministic tick sequence.
    pub fn belts(&self) -> impl Iterator<Item = (BeltId, &Belt)> {
        self.belts.iter().map(|(&id, belt)| (id, belt))
    }

    pub fn len(&self) -> usize {
        self.belts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.belts.is_empty()
    }

    pub fn update_order(&self) -> &[BeltId] {
        &self.update_order
    }

    pub fn group(&self, id: GroupId) -> Option<&BeltGroup> {
        self.groups.get(&id)
    }

    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &BeltGroup)> {
        self.groups.iter().map(|(&id, group)| (id, group))
    }

    pub fn group_of(&self, id: BeltId) -> Option<GroupId> {
        self.belts.get(&id).and_then(|b| b.group)
    }

    /// Whether `a` currently feeds into `b`.
    pub fn belts_are_connected(&self, a: BeltId, b: BeltId) -> bool {
        self.belts.get(&a).is_some_and(|belt| belt.next_belt == Some(b))
    }

    /// Ticks elapsed since construction.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Toggle verification mode (see [`crate::validation`]).
    pub fn set_verify(&mut self, on: bool) {
        self.verify = on;
    }

    fn maybe_verify(&self) {
        if self.verify {
            if let Err(e) = crate::validation::check_consistency(self) {
                panic!("belt system consistency check failed: {e}");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a belt under a fresh auto-incremented id.
    pub fn add_belt(&mut self, belt: Belt) -> BeltId {
        let id = BeltId(self.next_belt_id);
        self.next_belt_id += 1;
        self.insert_belt(id, belt);
        self.maybe_verify();
        id
    }

    /// Register a belt under a caller-chosen id (save replay, multiplayer).
    /// Bumps the id counter past `id`.
    pub fn add_belt_with_id(&mut self, belt: Belt, id: BeltId) -> Result<(), BeltError> {
        if self.belts.contains_key(&id) {
            return Err(BeltError::DuplicateBelt(id));
        }
        if id.0 >= self.next_belt_id {
            self.next_belt_id = id.0 + 1;
        }
        self.insert_belt(id, belt);
        self.maybe_verify();
        Ok(())
    }

    fn insert_belt(&mut self, id: BeltId, mut belt: Belt) {
        let gid = GroupId(self.next_group_id);
        self.next_group_id += 1;
        belt.group = Some(gid);

        let mut group = BeltGroup::new(gid);
        group.belt_ids.insert(id);
        self.groups.insert(gid, group);

        // Into the update order: a belt with no downstream goes to the very
        // front; otherwise right after its downstream (or appended when the
        // downstream has not been registered yet).
        match belt.next_belt {
            None => self.update_order.insert(0, id),
            Some(next) => match self.update_order.iter().position(|&x| x == next) {
                Some(pos) => self.update_order.insert(pos + 1, id),
                None => self.update_order.push(id),
            },
        }

        self.belts.insert(id, belt);
    }

    /// Remove a belt, unlinking its neighbors and splitting its group if the
    /// removal disconnected a chain. Removing an absent id is a no-op.
    pub fn remove_belt(&mut self, id: BeltId) {
        let Some(belt) = self.belts.get(&id) else {
            return;
        };
        let input_ids = belt.input_belts.clone();
        let next_id = belt.next_belt;
        let gid = belt.group;

        for input in &input_ids {
            if let Some(upstream) = self.belts.get_mut(input) {
                upstream.next_belt = None;
                upstream.reserved_front_space = 0;
                upstream.recalculate_rear_space();
                upstream.recalculate_front_item();
            }
        }
        if let Some(next) = next_id {
            if let Some(downstream) = self.belts.get_mut(&next) {
                downstream.input_belts.retain(|&x| x != id);
                if downstream.current_input == Some(id) {
                    downstream.current_input = None;
                }
            }
        }

        self.belts.remove(&id);
        self.update_order.retain(|&x| x != id);

        if let Some(gid) = gid {
            let now_empty = match self.groups.get_mut(&gid) {
                Some(group) => {
                    group.belt_ids.remove(&id);
                    group.belt_ids.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.groups.remove(&gid);
            } else if !input_ids.is_empty() && next_id.is_some() {
                // The belt sat mid-chain; its component may have split.
                self.check_and_split_group(gid);
            }
        }
        self.maybe_verify();
    }

    // -----------------------------------------------------------------------
    // Connectivity
    // -----------------------------------------------------------------------

    /// Wire `a` to feed into `b`, replacing `a`'s previous downstream and
    /// merging groups when the two belts were in different components.
    pub fn connect_belts(&mut self, a: BeltId, b: BeltId) -> Result<(), BeltError> {
        self.connect_inner(a, b)?;
        self.maybe_verify();
        Ok(())
    }

    fn connect_inner(&mut self, a: BeltId, b: BeltId) -> Result<(), BeltError> {
        if a == b {
            return Err(BeltError::SelfConnection(a));
        }
        if !self.belts.contains_key(&a) {
            return Err(BeltError::UnknownBelt(a));
        }
        if !self.belts.contains_key(&b) {
            return Err(BeltError::UnknownBelt(b));
        }

        if let Some(prev) = self.belts.get(&a).and_then(|belt| belt.next_belt) {
            self.disconnect_inner(a, prev);
        }

        if let Some(belt) = self.belts.get_mut(&a) {
            belt.next_belt = Some(b);
        }
        if let Some(belt) = self.belts.get_mut(&b) {
            belt.input_belts.push(a);
        }

        let ga = self.group_of(a);
        let gb = self.group_of(b);
        match (ga, gb) {
            (Some(ga), Some(gb)) if ga != gb => self.merge_groups(ga, gb),
            (Some(ga), _) => self.rebuild_group_update_order(ga),
            _ => {}
        }
        Ok(())
    }

    /// Clear the edge `a → b`. A no-op unless `a`'s downstream is exactly
    /// `b` (this subsumes unknown ids: an unknown belt is connected to
    /// nothing).
    pub fn disconnect_belts(&mut self, a: BeltId, b: BeltId) {
        self.disconnect_inner(a, b);
        self.maybe_verify();
    }

    fn disconnect_inner(&mut self, a: BeltId, b: BeltId) {
        let connected =
            self.belts.get(&a).is_some_and(|belt| belt.next_belt == Some(b))
                && self.belts.contains_key(&b);
        if !connected {
            return;
        }

        if let Some(belt) = self.belts.get_mut(&a) {
            belt.next_belt = None;
            belt.reserved_front_space = 0;
            belt.recalculate_rear_space();
            belt.recalculate_front_item();
        }
        if let Some(belt) = self.belts.get_mut(&b) {
            belt.input_belts.retain(|&x| x != a);
            if belt.current_input == Some(a) {
                belt.current_input = None;
            }
        }

        if let Some(gid) = self.group_of(a) {
            self.check_and_split_group(gid);
        }
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// Merge two groups, keeping the id of the larger (ties keep the first),
    /// and rebuild the merged group's slice of the update order.
    fn merge_groups(&mut self, g1: GroupId, g2: GroupId) {
        let (Some(a), Some(b)) = (self.groups.get(&g1), self.groups.get(&g2)) else {
            return;
        };
        let (keep, merge) = if a.len() >= b.len() { (g1, g2) } else { (g2, g1) };

        let Some(merged) = self.groups.remove(&merge) else {
            return;
        };
        for &bid in &merged.belt_ids {
            if let Some(belt) = self.belts.get_mut(&bid) {
                belt.group = Some(keep);
            }
        }
        if let Some(group) = self.groups.get_mut(&keep) {
            group.belt_ids.extend(merged.belt_ids);
        }
        self.rebuild_group_update_order(keep);
    }

    /// Re-derive the connected components of a group after an edge was
    /// removed. The first component (containing the smallest member id)
    /// keeps the group id; the rest get fresh ids.
    fn check_and_split_group(&mut self, gid: GroupId) {
        let Some(group) = self.groups.get(&gid) else {
            return;
        };
        if group.belt_ids.len() <= 1 {
            return;
        }

        let mut unvisited = group.belt_ids.clone();
        let mut components: Vec<BTreeSet<BeltId>> = Vec::new();
        while let Some(&start) = unvisited.iter().next() {
            let mut component = BTreeSet::new();
            let mut queue = VecDeque::from([start]);
            while let Some(cur) = queue.pop_front() {
                if !unvisited.remove(&cur) {
                    continue;
                }
                component.insert(cur);
                if let Some(belt) = self.belts.get(&cur) {
                    if let Some(next) = belt.next_belt {
                        if unvisited.contains(&next) {
                            queue.push_back(next);
                        }
                    }
                    for &input in &belt.input_belts {
                        if unvisited.contains(&input) {
                            queue.push_back(input);
                        }
                    }
                }
            }
            components.push(component);
        }

        if components.len() <= 1 {
            return;
        }

        let mut components = components.into_iter();
        if let (Some(first), Some(group)) = (components.next(), self.groups.get_mut(&gid)) {
            group.belt_ids = first;
        }
        let mut fresh = Vec::new();
        for component in components {
            let ngid = GroupId(self.next_group_id);
            self.next_group_id += 1;
            for &bid in &component {
                if let Some(belt) = self.belts.get_mut(&bid) {
                    belt.group = Some(ngid);
                }
            }
            self.groups.insert(
                ngid,
                BeltGroup {
                    id: ngid,
                    belt_ids: component,
                },
            );
            fresh.push(ngid);
        }
        for ngid in fresh {
            self.rebuild_group_update_order(ngid);
        }
        self.rebuild_group_update_order(gid);
    }

    // -----------------------------------------------------------------------
    // Update order
    // -----------------------------------------------------------------------

    /// Rebuild one group's slice of the update order: every chain end (belt
    /// with no downstream) is walked upstream through its inputs, appending
    /// downstream-before-upstream; members left over (pure cycles) are
    /// appended in a final sweep over ascending ids.
    fn rebuild_group_update_order(&mut self, gid: GroupId) {
        let Some(group) = self.groups.get(&gid) else {
            return;
        };
        let members = group.belt_ids.clone();
        self.update_order.retain(|id| !members.contains(id));

        let mut visited: BTreeSet<BeltId> = BTreeSet::new();
        for &bid in &members {
            if self.belts.get(&bid).is_some_and(|b| b.next_belt.is_none()) {
                self.append_chain_to_order(bid, &mut visited, &members);
            }
        }
        for &bid in &members {
            if !visited.contains(&bid) {
                self.append_chain_to_order(bid, &mut visited, &members);
            }
        }
    }

    /// Depth-first upstream walk with an explicit stack; inputs are pushed
    /// in reverse so they are visited in list order.
    fn append_chain_to_order(
        &mut self,
        start: BeltId,
        visited: &mut BTreeSet<BeltId>,
        members: &BTreeSet<BeltId>,
    ) {
        let mut stack = vec![start];
        while let Some(bid) = stack.pop() {
            if visited.contains(&bid) || !members.contains(&bid) {
                continue;
            }
            let Some(belt) = self.belts.get(&bid) else {
                continue;
            };
            visited.insert(bid);
            self.update_order.push(bid);
            for &input in belt.input_belts.iter().rev() {
                if members.contains(&input) && !visited.contains(&input) {
                    stack.push(input);
                }
            }
        }
    }

    /// Rebuild every group's order from scratch (bulk restores).
    pub fn rebuild_all_orders(&mut self) {
        self.update_order.clear();
        let gids: Vec<GroupId> = self.groups.keys().copied().collect();
        for gid in gids {
            self.rebuild_group_update_order(gid);
        }
        self.maybe_verify();
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance the whole system by one step. Must run to completion before
    /// any topology mutation.
    pub fn tick(&mut self) {
        for i in 0..self.update_order.len() {
            let id = self.update_order[i];
            self.update_belt(id);
        }
        self.tick += 1;
        self.maybe_verify();
    }

    fn update_belt(&mut self, id: BeltId) {
        if !self.belts.contains_key(&id) {
            return;
        }
        self.refresh_reservation(id);
        self.advance_belt(id);
        self.reconcile_rear(id);
        self.refresh_active_input(id);
    }

    /// Reconcile this belt's reservation against the downstream overhang.
    /// The downstream belt has already moved this tick (downstream before
    /// upstream), so `-next.rear_space` is the current position of the tail
    /// of the item this belt carried over. Shrinks free space immediately;
    /// growth goes through the push-back cascade and may fall short when
    /// the chain is jammed.
    fn refresh_reservation(&mut self, id: BeltId) {
        let Some(belt) = self.belts.get(&id) else {
            return;
        };
        let Some(next_id) = belt.next_belt else {
            // No downstream: the reservation belongs to external logic.
            return;
        };
        let target = match self.belts.get(&next_id) {
            // Only the belt the overhanging item came from (the active
            // input, or the sole input after a reservation cascade) keeps
            // the mirrored reservation.
            Some(next) if next.push_upstream_target() == Some(id) => {
                (-next.rear_space).max(0) as u32
            }
            _ => 0,
        };
        let current = belt.reserved_front_space;
        if target == current {
            return;
        }
        if target < current {
            if let Some(belt) = self.belts.get_mut(&id) {
                belt.reserved_front_space = target;
                // An empty belt's rear space covers the reserved region.
                belt.recalculate_rear_space();
                belt.recalculate_front_item();
            }
        } else {
            self.raise_reservation_cascade(id, target - current);
        }
    }

    /// The per-tick movement loop. The front-movable item advances by up to
    /// `speed`; items behind it move with it implicitly (their stored gaps
    /// are unchanged), and whatever distance it cannot use cascades to the
    /// next movable item. The frontmost item is carried over to the next
    /// belt instead of stopping at the downstream end when eligible.
    fn advance_belt(&mut self, id: BeltId) {
        let mut remaining = match self.belts.get(&id) {
            Some(belt) if !belt.items.is_empty() => belt.speed,
            _ => return,
        };

        while remaining > 0 {
            let Some(belt) = self.belts.get(&id) else {
                return;
            };
            let idx = belt.front_item_index;
            if idx >= belt.items.len() {
                break;
            }
            let dist = belt.items[idx].dist_to_next;
            let reserved = belt.reserved_front_space;
            let effective = if idx == 0 { dist - reserved } else { dist };

            if effective >= remaining {
                if let Some(belt) = self.belts.get_mut(&id) {
                    belt.items[idx].dist_to_next -= remaining;
                    belt.rear_space += remaining as i32;
                }
                break;
            }

            let carry = idx == 0
                && reserved == 0
                && belt
                    .next_belt
                    .is_some_and(|next| self.accepts_carry_over(next, id));
            let moved = effective;
            if carry {
                self.execute_carry_over(id);
            } else if let Some(belt) = self.belts.get_mut(&id) {
                belt.items[idx].dist_to_next -= effective;
                belt.rear_space += effective as i32;
                if moved == 0 {
                    belt.front_item_index += 1;
                }
                belt.determine_next_front_item();
            }
            if carry {
                if let Some(belt) = self.belts.get_mut(&id) {
                    // The carried item left the sequence; the cursor stays on
                    // the new frontmost item.
                    belt.determine_next_front_item();
                }
            }
            remaining -= moved;
        }
    }

    /// Whether `next` currently accepts a carry-over from `from`: either no
    /// input is active yet, or `from` is the active input and the previous
    /// transfer has fully cleared the boundary region.
    fn accepts_carry_over(&self, next: BeltId, from: BeltId) -> bool {
        match self.belts.get(&next) {
            Some(belt) => match belt.current_input {
                None => belt.rear_space >= 0,
                Some(active) => active == from && belt.rear_space > 0,
            },
            None => false,
        }
    }

    /// Move the frontmost item across the boundary onto the next belt.
    ///
    /// The carry distance is how far past the downstream end a full tick of
    /// movement would push the item, clamped to the space the next belt has
    /// left (the shortfall accumulates in `carry_error`). The tail of the
    /// item may keep occupying the end of this belt; that occupancy is the
    /// sender's new reserved front space, mirrored by the receiver's
    /// (possibly negative) rear space, which also marks this belt as the
    /// receiver's active input.
    fn execute_carry_over(&mut self, sender_id: BeltId) {
        let next_id = match self.belts.get(&sender_id).and_then(|b| b.next_belt) {
            Some(next) => next,
            None => {
                debug_assert!(false, "carry-over without a next belt");
                return;
            }
        };
        let [Some(sender), Some(next)] = self.belts.get_disjoint_mut([&sender_id, &next_id])
        else {
            debug_assert!(false, "carry-over across a dangling edge");
            return;
        };
        debug_assert!(!sender.items.is_empty());
        debug_assert!(sender.items[0].dist_to_next < sender.speed);

        let mut item = sender.items.remove(0);
        let old_dist = item.dist_to_next;
        let want = sender.speed - old_dist;
        let max_carry = (next.rear_space + FOOTPRINT_I).max(0) as u32;
        let carry = want.min(max_carry);
        sender.carry_error += want - carry;

        item.dist_to_next = (next.rear_space - carry as i32).max(0) as u32;
        next.rear_space -= item_span(item.dist_to_next) as i32;
        next.items.push(item);
        if next.rear_space < 0 {
            next.current_input = Some(sender_id);
        }

        // The sender's new reservation is the landed item's tail, which is
        // exactly the receiver's overhang. In the unclamped case this equals
        // footprint − carry; when the landing was clamped to a crowded rear
        // it is larger, keeping the sender's books clear of the tail.
        sender.reserved_front_space = (-next.rear_space).max(0) as u32;
        if let Some(front) = sender.items.first_mut() {
            front.dist_to_next += sender.reserved_front_space;
        }
        sender.rear_space +=
            old_dist as i32 + FOOTPRINT_I - sender.reserved_front_space as i32;
    }

    /// O(1) rear bookkeeping is exact; fall back to the ground-truth
    /// recompute if it ever drifted past the belt length.
    fn reconcile_rear(&mut self, id: BeltId) {
        if let Some(belt) = self.belts.get_mut(&id) {
            if belt.rear_space > belt.length as i32 {
                belt.recalculate_rear_space();
            }
        }
    }

    /// Re-select which upstream belt may carry items over: round-robin from
    /// the current choice when balancing, first eligible otherwise. An
    /// upstream belt is eligible when its frontmost item is close enough to
    /// need a carry-over within one of its ticks. The current choice is kept
    /// while its transfer still straddles the boundary.
    fn refresh_active_input(&mut self, id: BeltId) {
        let Some(belt) = self.belts.get(&id) else {
            return;
        };
        if belt.input_belts.is_empty() {
            return;
        }
        if belt.rear_space < 0 && belt.current_input.is_some() {
            return;
        }

        let inputs = belt.input_belts.clone();
        let start = if belt.balance_inputs {
            belt.current_input
                .and_then(|cur| inputs.iter().position(|&x| x == cur))
                .map_or(0, |pos| (pos + 1) % inputs.len())
        } else {
            0
        };

        let mut chosen = None;
        for offset in 0..inputs.len() {
            let candidate = inputs[(start + offset) % inputs.len()];
            let eligible = self.belts.get(&candidate).is_some_and(|upstream| {
                upstream
                    .items
                    .first()
                    .is_some_and(|front| front.dist_to_next < upstream.speed)
            });
            if eligible {
                chosen = Some(candidate);
                break;
            }
        }
        if let Some(belt) = self.belts.get_mut(&id) {
            belt.current_input = chosen;
        }
    }

    // -----------------------------------------------------------------------
    // Reserved front space
    // -----------------------------------------------------------------------

    /// Set a belt's reserved front space. Decreasing frees the space
    /// immediately. Increasing pushes the belt's content backward by exactly
    /// the needed amount, cascading through the gaps, the rear space, and —
    /// when the rearmost item must overhang — the upstream chain's own
    /// reserved front space. Returns how much the reservation actually grew
    /// (0 for decreases); less than requested means the chain is jammed.
    ///
    /// The per-call increase must stay below one item footprint.
    pub fn set_reserved_front_space(&mut self, id: BeltId, space: u32) -> Result<u32, BeltError> {
        let Some(belt) = self.belts.get_mut(&id) else {
            return Err(BeltError::UnknownBelt(id));
        };
        let current = belt.reserved_front_space;
        if space <= current {
            belt.reserved_front_space = space;
            belt.recalculate_rear_space();
            belt.recalculate_front_item();
            self.maybe_verify();
            return Ok(0);
        }
        let delta = space - current;
        if delta >= ITEM_FOOTPRINT {
            return Err(BeltError::InvalidReservation { delta });
        }
        let granted = self.raise_reservation_cascade(id, delta);
        self.maybe_verify();
        Ok(granted)
    }

    /// The inverse chain update: grow `origin`'s reservation by `delta`,
    /// compacting backward across belt boundaries.
    ///
    /// Runs in two passes with an explicit frame list instead of recursion.
    /// The ascend pass walks the active-input chain, computing how much each
    /// belt cannot absorb locally and therefore asks of its upstream (capped
    /// by the one-footprint overhang room, and cut off at a revisited belt —
    /// a cycle can never free space for itself). The descend pass applies
    /// grants top-down: each belt learns how much extra overhang its rear
    /// may take before compacting its own content.
    fn raise_reservation_cascade(&mut self, origin: BeltId, delta: u32) -> u32 {
        debug_assert!(delta <= ITEM_FOOTPRINT);

        struct Frame {
            belt: BeltId,
            raise: u32,
        }
        let mut frames = vec![Frame {
            belt: origin,
            raise: delta,
        }];
        let mut visited: HashSet<BeltId> = HashSet::from([origin]);

        loop {
            let top = match frames.last() {
                Some(frame) => frame,
                None => break,
            };
            let Some(belt) = self.belts.get(&top.belt) else {
                break;
            };
            let unsatisfied = top.raise.saturating_sub(belt.reservation_capacity_local());
            let ask = unsatisfied.min(belt.overhang_room());
            if ask == 0 {
                break;
            }
            let Some(upstream) = belt.push_upstream_target() else {
                break;
            };
            if !self.belts.contains_key(&upstream) || !visited.insert(upstream) {
                break;
            }
            frames.push(Frame {
                belt: upstream,
                raise: ask,
            });
        }

        let mut granted_above = 0u32;
        while let Some(frame) = frames.pop() {
            granted_above = self.apply_reservation_raise(frame.belt, frame.raise, granted_above);
        }
        granted_above
    }

    /// Grow one belt's reservation by up to `raise`, with `upstream_granted`
    /// extra overhang room secured on its upstream. Returns the achieved
    /// growth.
    fn apply_reservation_raise(&mut self, id: BeltId, raise: u32, upstream_granted: u32) -> u32 {
        let Some(belt) = self.belts.get_mut(&id) else {
            return 0;
        };
        let overhang = (-belt.rear_space).max(0) as u32;
        let floor = -(((overhang + upstream_granted).min(ITEM_FOOTPRINT)) as i32);

        let granted = if belt.items.is_empty() {
            // Nothing to compact; the reservation eats directly into the
            // free rear (an empty belt never overhangs).
            let grant = raise.min(belt.rear_space.max(0) as u32);
            belt.rear_space -= grant as i32;
            grant
        } else {
            let slack = belt.items[0].dist_to_next - belt.reserved_front_space;
            if raise <= slack {
                raise
            } else {
                slack + belt.push_items_back(0, raise - slack, floor)
            }
        };
        belt.reserved_front_space += granted;
        belt.recalculate_front_item();
        granted
    }

    // -----------------------------------------------------------------------
    // Item placement
    // -----------------------------------------------------------------------

    /// Insert an item with its front edge `dist_to_end` units from the
    /// belt's downstream end. A space deficit behind the insertion point is
    /// recovered by pushing rearward items back, propagating across a
    /// single-input boundary by reserving the upstream belt's front space.
    pub fn insert_item(
        &mut self,
        id: BeltId,
        kind: ItemTypeId,
        dist_to_end: u32,
    ) -> Result<(), BeltError> {
        let Some(belt) = self.belts.get(&id) else {
            return Err(BeltError::UnknownBelt(id));
        };
        let space = belt.get_available_space_at(dist_to_end)?;
        if space.to_front < 0 {
            return Err(BeltError::InsufficientSpace {
                needed: (-space.to_front) as u32,
                available: space.to_front,
            });
        }
        let insert_idx = space.index_before.map_or(0, |i| i + 1);
        let rearmost = insert_idx == belt.items.len();
        let mut to_back = space.to_back;

        if to_back < 0 {
            let deficit = (-to_back) as u32;
            if rearmost {
                // The new item's tail would overhang; secure the room on the
                // upstream belt first.
                let granted = match belt.push_upstream_target() {
                    Some(upstream) if self.belts.contains_key(&upstream) => {
                        self.raise_reservation_cascade(upstream, deficit)
                    }
                    _ => 0,
                };
                if granted < deficit {
                    return Err(BeltError::InsufficientSpace {
                        needed: deficit,
                        available: granted as i32,
                    });
                }
            } else {
                let ask = deficit
                    .saturating_sub(belt.push_capacity_local(insert_idx))
                    .min(belt.overhang_room());
                let upstream = belt.push_upstream_target();
                let overhang = (-belt.rear_space).max(0) as u32;
                let granted_up = match upstream {
                    Some(up) if ask > 0 && self.belts.contains_key(&up) => {
                        self.raise_reservation_cascade(up, ask)
                    }
                    _ => 0,
                };
                let floor = -(((overhang + granted_up).min(ITEM_FOOTPRINT)) as i32);
                let Some(belt) = self.belts.get_mut(&id) else {
                    return Err(BeltError::UnknownBelt(id));
                };
                let moved = belt.push_items_back(insert_idx, deficit, floor);
                if moved < deficit {
                    return Err(BeltError::InsufficientSpace {
                        needed: deficit,
                        available: moved as i32,
                    });
                }
                to_back += moved as i32;
            }
        }

        let Some(belt) = self.belts.get_mut(&id) else {
            return Err(BeltError::UnknownBelt(id));
        };
        let dist = if insert_idx == 0 {
            dist_to_end
        } else {
            space.to_front as u32
        };
        belt.items.insert(insert_idx, BeltItem::new(kind, dist));
        if insert_idx + 1 < belt.items.len() {
            belt.items[insert_idx + 1].dist_to_next = to_back as u32;
        } else {
            belt.rear_space = to_back;
        }
        belt.recalculate_front_item();
        self.maybe_verify();
        Ok(())
    }

    /// Append an item flush against a belt's upstream end.
    pub fn append_item(&mut self, id: BeltId, kind: ItemTypeId) -> Result<(), BeltError> {
        let Some(belt) = self.belts.get_mut(&id) else {
            return Err(BeltError::UnknownBelt(id));
        };
        belt.append_item(kind)?;
        self.maybe_verify();
        Ok(())
    }

    /// Append an item behind every existing item at an exact offset.
    pub fn append_item_at(
        &mut self,
        id: BeltId,
        kind: ItemTypeId,
        dist_to_end: u32,
    ) -> Result<(), BeltError> {
        let Some(belt) = self.belts.get_mut(&id) else {
            return Err(BeltError::UnknownBelt(id));
        };
        belt.append_item_at(kind, dist_to_end)?;
        self.maybe_verify();
        Ok(())
    }

    /// Remove the item at `index` from a belt.
    pub fn remove_item(&mut self, id: BeltId, index: usize) -> Result<BeltItem, BeltError> {
        let Some(belt) = self.belts.get_mut(&id) else {
            return Err(BeltError::UnknownBelt(id));
        };
        let item = belt.remove_item(index).ok_or(BeltError::InvalidOffset {
            offset: index as u32,
            length: belt.items.len() as u32,
        })?;
        self.maybe_verify();
        Ok(item)
    }

    // -----------------------------------------------------------------------
    // Split and join
    // -----------------------------------------------------------------------

    /// Split a belt at `dist_to_end`. The belt keeps the downstream portion;
    /// a new belt takes the upstream portion and inherits the original's
    /// inputs, wired new → original. Returns the new belt's id.
    pub fn split_belt(&mut self, id: BeltId, dist_to_end: u32) -> Result<BeltId, BeltError> {
        let Some(belt) = self.belts.get_mut(&id) else {
            return Err(BeltError::UnknownBelt(id));
        };
        let mut upstream = belt.split_at(dist_to_end)?;
        upstream.current_input = belt.current_input.take();
        let old_inputs = std::mem::take(&mut belt.input_belts);
        // Re-wired below through connect_belts; the upstream half starts
        // with no inputs of its own.
        for &input in &old_inputs {
            if let Some(feeder) = self.belts.get_mut(&input) {
                feeder.next_belt = None;
            }
        }

        let new_id = BeltId(self.next_belt_id);
        self.next_belt_id += 1;
        self.insert_belt(new_id, upstream);
        for input in old_inputs {
            self.connect_inner(input, new_id)?;
        }
        self.connect_inner(new_id, id)?;

        // An item straddling the split boundary overhangs the downstream
        // half; mirror its tail as reserved front space on the new belt.
        let overhang = self
            .belts
            .get(&id)
            .map_or(0, |belt| (-belt.rear_space).max(0) as u32);
        if overhang > 0 {
            if let Some(belt) = self.belts.get_mut(&id) {
                belt.current_input = Some(new_id);
            }
            if let Some(belt) = self.belts.get_mut(&new_id) {
                belt.reserved_front_space = overhang;
                belt.recalculate_rear_space();
                belt.recalculate_front_item();
            }
        }
        self.maybe_verify();
        Ok(new_id)
    }

    /// Join the single-input chain `other → id` into one belt: `other`'s
    /// items append behind `id`'s, `other`'s inputs (reversed, for
    /// round-robin determinism) become `id`'s, and `other` leaves the
    /// system. Returns `id`.
    pub fn join_belts(&mut self, id: BeltId) -> Result<BeltId, BeltError> {
        let Some(belt) = self.belts.get(&id) else {
            return Err(BeltError::UnknownBelt(id));
        };
        let &[other_id] = belt.input_belts.as_slice() else {
            return Err(BeltError::NotJoinable(id));
        };
        let Some(other) = self.belts.get(&other_id) else {
            return Err(BeltError::UnknownBelt(other_id));
        };
        if other.next_belt != Some(id) {
            return Err(BeltError::NotJoinable(id));
        }

        let Some(mut other) = self.belts.remove(&other_id) else {
            return Err(BeltError::UnknownBelt(other_id));
        };
        let feeder_ids = std::mem::take(&mut other.input_belts);
        let feeder_current = other.current_input.take();
        let balance = other.balance_inputs;

        if let Some(gid) = other.group {
            if let Some(group) = self.groups.get_mut(&gid) {
                group.belt_ids.remove(&other_id);
            }
        }
        self.update_order.retain(|&x| x != other_id);

        for &feeder in &feeder_ids {
            if let Some(belt) = self.belts.get_mut(&feeder) {
                belt.next_belt = Some(id);
            }
        }

        if let Some(belt) = self.belts.get_mut(&id) {
            belt.absorb_rear(other);
            belt.input_belts = feeder_ids.into_iter().rev().collect();
            belt.current_input = feeder_current;
            belt.balance_inputs = balance;
        }

        if let Some(gid) = self.group_of(id) {
            self.rebuild_group_update_order(gid);
        }
        self.maybe_verify();
        Ok(id)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
