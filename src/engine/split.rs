use super::{InventoryEngine, Tx};
use crate::error::{AppResult, DomainError};
use crate::models::types::{ContainerKind, ItemId, OwnerKey, PlayerId};

impl InventoryEngine {
    /// Carve `quantity` units off a stack into a fresh instance bound in an
    /// empty slot of the same container. Splits never merge or swap, and
    /// both halves must end up non-empty; moving a whole stack is a move,
    /// not a split. Returns the new instance's id.
    pub async fn split_stack(
        &self,
        actor: PlayerId,
        kind: ContainerKind,
        src_slot: u32,
        dest_slot: u32,
        quantity: u32,
    ) -> AppResult<ItemId> {
        if !matches!(kind, ContainerKind::Personal | ContainerKind::Home) {
            return Err(DomainError::PreconditionFailed("only storage stacks can be split"));
        }
        Self::check_slot(kind, src_slot)?;
        Self::check_slot(kind, dest_slot)?;
        if src_slot == dest_slot {
            return Err(DomainError::SlotOccupied { container: kind, slot: dest_slot });
        }
        if quantity == 0 {
            return Err(DomainError::PreconditionFailed("cannot split zero units"));
        }

        let handle = self.store.require(OwnerKey::Player(actor))?;
        let (split_off, committed) = {
            let mut state = handle.lock();
            let Some(source) = state.container(kind)?.get(src_slot) else {
                return Err(DomainError::PreconditionFailed("source slot is empty"));
            };
            if state.container(kind)?.get(dest_slot).is_some() {
                return Err(DomainError::SlotOccupied { container: kind, slot: dest_slot });
            }
            let instance = state.item(source)?.clone();
            if quantity >= instance.stack {
                return Err(DomainError::PreconditionFailed("split must leave units on the source"));
            }

            let mut split_off = instance.clone();
            split_off.id = self.ids.allocate();
            split_off.stack = quantity;

            let mut tx = Tx::begin(&state);
            tx.set_stack(source, instance.stack - quantity)?;
            let id = split_off.id;
            tx.create_item(split_off);
            tx.bind(kind, dest_slot, id)?;
            (id, vec![tx.commit(&mut state)])
        };
        self.finish(committed).await;
        Ok(split_off)
    }
}
