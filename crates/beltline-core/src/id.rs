use serde::{Deserialize, Serialize};

/// Identifies a belt segment in the system. Stable across topology changes;
/// assignable by the caller (save replay, multiplayer) via
/// [`crate::system::BeltSystem::add_belt_with_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BeltId(pub u32);

/// Identifies a connected component of belts. Fresh ids are allocated when
/// groups split; ids are never reused for a different component while the
/// original group is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u32);

/// Identifies an item kind in the external catalog. The core treats this as
/// an opaque tag: cheap to copy and compare, never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemTypeId(pub u32);
