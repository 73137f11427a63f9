use crate::id::BeltId;

/// Errors that can occur during belt operations.
///
/// Every variant except [`BeltError::UnknownBelt`] is a contract violation:
/// the caller asked for something the current state cannot honor, and the
/// operation was rejected before corrupting any invariants. Unknown-id
/// lookups are reported uniformly from every mutation entry point that
/// names a belt which must exist; the expected-skip cases (disconnecting a
/// pair that is not connected, removing an absent id) are silent no-ops and
/// never produce an error.
#[derive(Debug, thiserror::Error)]
pub enum BeltError {
    #[error("belt not found: {0:?}")]
    UnknownBelt(BeltId),
    #[error("belt id already in use: {0:?}")]
    DuplicateBelt(BeltId),
    #[error("cannot connect a belt to itself: {0:?}")]
    SelfConnection(BeltId),
    #[error("not enough free space: needed {needed}, available {available}")]
    InsufficientSpace { needed: u32, available: i32 },
    #[error("offset {offset} exceeds belt length {length}")]
    InvalidOffset { offset: u32, length: u32 },
    #[error("invalid split point {offset} on belt of length {length}")]
    InvalidSplitPoint { offset: u32, length: u32 },
    #[error("reservation increase of {delta} reaches one item footprint")]
    InvalidReservation { delta: u32 },
    #[error("belt {0:?} is not the head of a single-input chain")]
    NotJoinable(BeltId),
}
