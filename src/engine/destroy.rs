use super::{InventoryEngine, Tx};
use crate::error::{AppResult, DomainError};
use crate::models::types::{ContainerKind, ItemId, OwnerKey, PlayerId};

/// Result of a destroy/reduce transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyOutcome {
    /// Instance fully destroyed and its slot freed
    Destroyed,
    /// Stack decremented; instance still live
    Reduced { remaining: u32 },
}

impl InventoryEngine {
    /// Destroy `quantity` units of an item in the caller's own context (the
    /// actor, or the actor's clan). Reducing at or past the current stack
    /// destroys the instance and frees its slot; stacks never go negative.
    /// Lockbox stacks only support full destruction.
    pub async fn destroy_item(
        &self,
        actor: PlayerId,
        owner: OwnerKey,
        item: ItemId,
        quantity: u32,
    ) -> AppResult<DestroyOutcome> {
        if quantity == 0 {
            return Err(DomainError::PreconditionFailed("cannot destroy zero units"));
        }
        match owner {
            OwnerKey::Player(player) if player == actor => {}
            OwnerKey::Clan(clan) => {
                if self.clan_of(actor)? != clan {
                    return Err(DomainError::InsufficientPermission);
                }
            }
            _ => return Err(DomainError::InsufficientPermission),
        }

        let handle = self.store.require(owner)?;
        let (outcome, committed) = {
            let mut state = handle.lock();
            if !state.has_item(item) {
                return Err(DomainError::NotOwner { item, owner });
            }
            let stack = state.item(item)?.stack;
            if owner.is_clan() && quantity < stack {
                return Err(DomainError::PreconditionFailed(
                    "partial reduction of lockbox stacks is not supported",
                ));
            }

            let mut tx = Tx::begin(&state);
            let outcome = if quantity >= stack {
                if let Some((kind, slot)) = tx.next.locate_item(item) {
                    tx.unbind(kind, slot)?;
                    if kind == ContainerKind::WeaponDrawer {
                        tx.sync_weapon_mirror()?;
                    }
                }
                tx.destroy_item(item)?;
                DestroyOutcome::Destroyed
            } else {
                let remaining = stack - quantity;
                tx.set_stack(item, remaining)?;
                DestroyOutcome::Reduced { remaining }
            };
            (outcome, vec![tx.commit(&mut state)])
        };
        self.finish(committed).await;
        Ok(outcome)
    }
}
