//! Beltline Core -- continuous conveyor-belt logistics for factory games.
//!
//! Discrete items travel along one-dimensional belt segments wired into
//! directed chains and trees, under exact integer space accounting that
//! never lets two items overlap. The core owns the connectivity graph and a
//! deterministic, dependency-respecting per-tick update order, and keeps
//! both correct under dynamic topology changes (connect, disconnect, split,
//! join, add, remove).
//!
//! # Tick model
//!
//! An external game loop calls [`system::BeltSystem::tick`] once per step.
//! Belts update downstream-before-upstream, so a belt's items can carry
//! over onto a neighbor that has already made room this tick. Topology
//! mutations must happen strictly between ticks; the whole core is
//! single-threaded and does no I/O.
//!
//! # Space accounting
//!
//! Every item stores one number: the free distance to the next obstruction
//! ahead. Each belt tracks the signed free space at its upstream end
//! (`rear_space`, negative while an item overhangs onto the belt behind)
//! and the blocked space at its downstream end (`reserved_front_space`,
//! the tail of an item that has partially crossed onto the next belt, or an
//! external constraint). The conservation identity
//! `gaps + footprints + rear_space + reserved_front_space == length` holds
//! between ticks and after every completed mutation, and
//! [`validation::check_consistency`] asserts it -- plus link symmetry,
//! group partitioning and the update-order permutation -- when verification
//! mode is on.
//!
//! # Key types
//!
//! - [`system::BeltSystem`] -- owner of all belts, the graph, the groups
//!   and the update order; the tick entry point and the topology-mutation
//!   API.
//! - [`belt::Belt`] -- one fixed-length segment: movement, insertion,
//!   removal, space queries, split/join partition math.
//! - [`item::BeltItem`] -- an item-kind tag plus its distance to the next
//!   obstruction.
//! - [`id::BeltId`], [`id::GroupId`], [`id::ItemTypeId`] -- stable integer
//!   ids; item kinds come from an external catalog and stay opaque here.
//! - [`error::BeltError`] -- contract violations and unknown-id lookups.
//!
//! Persistence is an external collaborator: every state type derives serde
//! traits, and [`system::BeltSystem::add_belt_with_id`] plus
//! [`system::BeltSystem::connect_belts`] plus
//! [`system::BeltSystem::append_item_at`] form the replay surface a save
//! layer reconstructs from.

pub mod belt;
pub mod error;
pub mod id;
pub mod item;
pub mod space;
pub mod system;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
