use super::{InventoryEngine, PostEffect, Tx, TxOutcome};
use crate::equip::validate_equip;
use crate::error::{AppResult, DomainError};
use crate::models::types::{ACTIVE_WEAPON_MIRROR_SLOT, ContainerKind, OwnerKey, PlayerId};

/// Which equipment family an equip targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipKind {
    Armor,
    Weapon,
}

impl EquipKind {
    pub fn dest_container(self) -> ContainerKind {
        match self {
            EquipKind::Armor => ContainerKind::Equipped,
            EquipKind::Weapon => ContainerKind::WeaponDrawer,
        }
    }
}

impl InventoryEngine {
    /// Equip from a personal slot, swapping any currently equipped piece
    /// back into that slot. An empty source slot turns this into a plain
    /// unequip of the destination. Requirement checks run before anything
    /// moves; a failed check leaves both containers untouched and reports
    /// every failing requirement class at once.
    pub async fn equip(
        &self,
        actor: PlayerId,
        src_slot: u32,
        dest_slot: u32,
        kind: EquipKind,
    ) -> AppResult<TxOutcome> {
        let dest_kind = kind.dest_container();
        Self::check_slot(ContainerKind::Personal, src_slot)?;
        Self::check_slot(dest_kind, dest_slot)?;
        if kind == EquipKind::Armor && dest_slot == ACTIVE_WEAPON_MIRROR_SLOT {
            return Err(DomainError::PreconditionFailed("slot reserved for the active weapon"));
        }

        let handle = self.store.require(OwnerKey::Player(actor))?;
        let committed = {
            let mut state = handle.lock();

            let candidate = state.container(ContainerKind::Personal)?.get(src_slot);
            let returning = state.container(dest_kind)?.get(dest_slot);
            if candidate.is_none() && returning.is_none() {
                return Ok(TxOutcome::NoOp);
            }

            if let Some(item) = candidate {
                let instance = state.item(item)?;
                let template = self
                    .catalog
                    .resolve(instance.template)
                    .ok_or(DomainError::PreconditionFailed("unknown item template"))?;
                if kind == EquipKind::Weapon && !template.is_weapon {
                    return Err(DomainError::PreconditionFailed("only weapons fit the drawer"));
                }
                let failures = validate_equip(state.player()?, template);
                if !failures.is_empty() {
                    tracing::debug!(player = %actor, failures = ?failures, "equip rejected");
                    return Err(DomainError::RequirementNotMet(failures));
                }
            }

            let mut tx = Tx::begin(&state);
            tx.unbind(ContainerKind::Personal, src_slot)?;
            if let Some(swapped) = returning {
                tx.unbind(dest_kind, dest_slot)?;
                tx.bind(ContainerKind::Personal, src_slot, swapped)?;
            }
            if let Some(item) = candidate {
                tx.bind(dest_kind, dest_slot, item)?;
            }
            match kind {
                EquipKind::Armor => {
                    tx.push_effect(PostEffect::Appearance(actor, candidate));
                    tx.push_effect(PostEffect::Stats(actor));
                }
                EquipKind::Weapon => {
                    tx.sync_weapon_mirror()?;
                    tx.push_effect(PostEffect::Stats(actor));
                }
            }
            tx.commit(&mut state)
        };
        self.finish(vec![committed]).await;
        Ok(TxOutcome::Committed)
    }
}
