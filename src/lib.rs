pub mod catalog;
pub mod config;
pub mod engine;
pub mod equip;
pub mod error;
pub mod loader;
pub mod logging;
pub mod models;
pub mod notify;
pub mod persist;
pub mod repo;
pub mod store;

// Convenient re-exports (so call sites can do `armory::InventoryEngine`, etc.)
pub use engine::{
    DepositOutcome, DestroyOutcome, EquipKind, InventoryEngine, TxOutcome,
};
pub use error::{AppResult, DomainError};
pub use models::types::{ClanId, ContainerKind, ItemId, OwnerKey, PlayerId, SessionId, TemplateId};
