use super::{InventoryEngine, Tx, TxOutcome};
use crate::error::{AppResult, DomainError};
use crate::models::types::{ContainerKind, OwnerKey, PlayerId};
use crate::store::lock_ordered;

impl InventoryEngine {
    /// Move one bound item to another slot, in the same container or across
    /// containers, swapping with whatever occupies the destination. This is
    /// the primitive under drag-and-drop, take-from-home, targeted lockbox
    /// deposits and targeted withdrawals.
    ///
    /// Moving a slot onto itself or moving from an empty slot commits
    /// nothing and reports `NoOp`. A move inside the clan lockbox refuses an
    /// occupied destination instead of swapping.
    pub async fn move_item(
        &self,
        actor: PlayerId,
        src_kind: ContainerKind,
        src_slot: u32,
        dest_kind: ContainerKind,
        dest_slot: u32,
    ) -> AppResult<TxOutcome> {
        Self::check_slot(src_kind, src_slot)?;
        Self::check_slot(dest_kind, dest_slot)?;
        if src_kind == ContainerKind::Equipped || dest_kind == ContainerKind::Equipped {
            return Err(DomainError::PreconditionFailed("equipped slots change only through equip"));
        }
        if (src_kind == ContainerKind::WeaponDrawer) != (dest_kind == ContainerKind::WeaponDrawer) {
            return Err(DomainError::PreconditionFailed("weapon drawer exchanges only through equip"));
        }
        if src_kind == dest_kind && src_slot == dest_slot {
            return Ok(TxOutcome::NoOp);
        }

        let src_owner = self.owner_for(actor, src_kind)?;
        let dest_owner = self.owner_for(actor, dest_kind)?;
        if let (OwnerKey::Clan(clan), OwnerKey::Player(_)) = (src_owner, dest_owner) {
            self.check_withdraw_rank(clan, actor)?;
        }

        if src_owner == dest_owner {
            self.move_within_owner(src_owner, src_kind, src_slot, dest_kind, dest_slot).await
        } else {
            self.move_across_owners(src_owner, src_kind, src_slot, dest_owner, dest_kind, dest_slot)
                .await
        }
    }

    async fn move_within_owner(
        &self,
        owner: OwnerKey,
        src_kind: ContainerKind,
        src_slot: u32,
        dest_kind: ContainerKind,
        dest_slot: u32,
    ) -> AppResult<TxOutcome> {
        let handle = self.store.require(owner)?;
        let committed = {
            let mut state = handle.lock();

            let Some(moving) = state.container(src_kind)?.get(src_slot) else {
                return Ok(TxOutcome::NoOp);
            };
            let occupant = state.container(dest_kind)?.get(dest_slot);
            if owner.is_clan() && occupant.is_some() {
                return Err(DomainError::SlotOccupied { container: dest_kind, slot: dest_slot });
            }

            let mut tx = Tx::begin(&state);
            tx.unbind(src_kind, src_slot)?;
            if let Some(swapped) = occupant {
                tx.unbind(dest_kind, dest_slot)?;
                tx.bind(src_kind, src_slot, swapped)?;
            }
            tx.bind(dest_kind, dest_slot, moving)?;
            if src_kind == ContainerKind::WeaponDrawer || dest_kind == ContainerKind::WeaponDrawer {
                tx.sync_weapon_mirror()?;
            }
            tx.commit(&mut state)
        };
        self.finish(vec![committed]).await;
        Ok(TxOutcome::Committed)
    }

    async fn move_across_owners(
        &self,
        src_owner: OwnerKey,
        src_kind: ContainerKind,
        src_slot: u32,
        dest_owner: OwnerKey,
        dest_kind: ContainerKind,
        dest_slot: u32,
    ) -> AppResult<TxOutcome> {
        let src_handle = self.store.require(src_owner)?;
        let dest_handle = self.store.require(dest_owner)?;
        let committed = {
            let (mut src_state, mut dest_state) =
                lock_ordered(&src_handle, &dest_handle, src_owner, dest_owner);

            let Some(moving) = src_state.container(src_kind)?.get(src_slot) else {
                return Ok(TxOutcome::NoOp);
            };
            let occupant = dest_state.container(dest_kind)?.get(dest_slot);

            let mut tx_src = Tx::begin(&src_state);
            let mut tx_dest = Tx::begin(&dest_state);

            tx_src.unbind(src_kind, src_slot)?;
            let instance = tx_src.release_item(moving)?;
            tx_dest.adopt_item(instance);

            if let Some(swapped) = occupant {
                tx_dest.unbind(dest_kind, dest_slot)?;
                let returned = tx_dest.release_item(swapped)?;
                tx_src.adopt_item(returned);
                tx_src.bind(src_kind, src_slot, swapped)?;
            }
            tx_dest.bind(dest_kind, dest_slot, moving)?;

            vec![tx_src.commit(&mut src_state), tx_dest.commit(&mut dest_state)]
        };
        self.finish(committed).await;
        Ok(TxOutcome::Committed)
    }
}
