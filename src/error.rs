use crate::equip::RequirementFailure;
use crate::models::types::{ContainerKind, ItemId, OwnerKey};
use thiserror::Error;

pub type AppResult<T> = Result<T, DomainError>;

/// Everything an engine transaction can reject with. All variants are
/// raised before any mutation commits; a returned error means no state
/// changed and nothing was fanned out.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Slot index outside the container's capacity
    #[error("slot {slot} out of range for {container}")]
    OutOfRange { container: ContainerKind, slot: u32 },

    /// Destination slot already holds an item and this operation cannot swap
    #[error("slot {slot} in {container} is occupied")]
    SlotOccupied { container: ContainerKind, slot: u32 },

    /// No free slot left in the scanned range
    #[error("{0} is full")]
    ContainerFull(ContainerKind),

    /// Caller's clan rank does not allow this operation
    #[error("insufficient clan permission")]
    InsufficientPermission,

    /// Equip requirements failed; every failing class is listed
    #[error("equip requirements not met")]
    RequirementNotMet(Vec<RequirementFailure>),

    /// No live item registered under this id
    #[error("item {0} not found")]
    ItemNotFound(ItemId),

    /// Item exists but is not bound under the caller's owner context
    #[error("item {item} is not owned by {owner}")]
    NotOwner { item: ItemId, owner: OwnerKey },

    /// Balance too low for a currency transfer
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: i64, need: i64 },

    /// Currency transfer under the minimum transfer value
    #[error("transfer of {amount} below minimum of {minimum}")]
    BelowMinimum { amount: i64, minimum: i64 },

    /// Some precondition failed
    #[error("precondition failed: {0}")]
    PreconditionFailed(&'static str),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Failures surfaced by the persistence collaborator. During hydration these
/// bubble up as `DomainError::Repo`; after a commit they are logged by the
/// synchronizer instead (in-memory state stays authoritative).
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
