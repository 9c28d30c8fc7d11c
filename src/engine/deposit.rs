use super::{InventoryEngine, Tx, merge_candidates};
use crate::catalog::ItemTemplate;
use crate::error::{AppResult, DomainError};
use crate::models::item::ItemSpec;
use crate::models::types::{ContainerKind, ItemId, OwnerKey, PlayerId};
use crate::store::lock_ordered;
use std::ops::Range;

/// Where the units of a stack-merge deposit ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositOutcome {
    /// Every unit merged into an existing stack; the source instance is gone
    Merged { into: ItemId },
    /// The (possibly reduced) instance landed in a free slot
    Placed { item: ItemId, slot: u32 },
    /// Source slot was empty; nothing committed
    NoOp,
}

/// Merge pass of the deposit algorithm: pour units into same-template
/// stacks with spare room inside `range`, front to back. Returns the units
/// left over and the last stack that absorbed any.
fn apply_merges(
    tx: &mut Tx,
    kind: ContainerKind,
    range: Range<u32>,
    template: &ItemTemplate,
    units: u32,
) -> AppResult<(u32, Option<ItemId>)> {
    let candidates =
        merge_candidates(tx.next.container(kind)?, range, template.id, &tx.next, template.stack_limit);
    let mut remaining = units;
    let mut absorbed = None;
    for (_, id, spare) in candidates {
        if remaining == 0 {
            break;
        }
        let take = spare.min(remaining);
        let current = tx.next.item(id)?.stack;
        tx.set_stack(id, current + take)?;
        remaining -= take;
        absorbed = Some(id);
    }
    Ok((remaining, absorbed))
}

impl InventoryEngine {
    /// Deposit the item in a personal slot into the clan lockbox without a
    /// target slot: merge into existing stacks first, then bind any
    /// remainder in the first free slot of the purchased-tab range. With no
    /// free slot the whole deposit fails, merges included.
    pub async fn deposit_to_lockbox(&self, actor: PlayerId, src_slot: u32) -> AppResult<DepositOutcome> {
        Self::check_slot(ContainerKind::Personal, src_slot)?;
        let clan = self.clan_of(actor)?;
        let player_key = OwnerKey::Player(actor);
        let clan_key = OwnerKey::Clan(clan);
        let player_handle = self.store.require(player_key)?;
        let clan_handle = self.store.require(clan_key)?;

        let (outcome, committed) = {
            let (mut player_state, mut clan_state) =
                lock_ordered(&player_handle, &clan_handle, player_key, clan_key);

            let Some(moving) = player_state.container(ContainerKind::Personal)?.get(src_slot) else {
                return Ok(DepositOutcome::NoOp);
            };
            let instance = player_state.item(moving)?.clone();
            let template = self
                .catalog
                .resolve(instance.template)
                .ok_or(DomainError::PreconditionFailed("unknown item template"))?;
            let unlocked = 0..player_state.player()?.unlocked_lockbox_slots();

            let mut tx_player = Tx::begin(&player_state);
            let mut tx_clan = Tx::begin(&clan_state);
            tx_player.unbind(ContainerKind::Personal, src_slot)?;

            let outcome = match apply_merges(
                &mut tx_clan,
                ContainerKind::ClanLockbox,
                unlocked.clone(),
                template,
                instance.stack,
            )? {
                (0, Some(into)) => {
                    tx_player.destroy_item(moving)?;
                    DepositOutcome::Merged { into }
                }
                (remaining, _) => {
                    let slot = tx_clan
                        .next
                        .container(ContainerKind::ClanLockbox)?
                        .first_free_in(unlocked)
                        .ok_or(DomainError::ContainerFull(ContainerKind::ClanLockbox))?;
                    let released = tx_player.release_item(moving)?;
                    tx_clan.adopt_item(released);
                    if remaining != instance.stack {
                        tx_clan.set_stack(moving, remaining)?;
                    }
                    tx_clan.bind(ContainerKind::ClanLockbox, slot, moving)?;
                    DepositOutcome::Placed { item: moving, slot }
                }
            };

            let committed =
                vec![tx_player.commit(&mut player_state), tx_clan.commit(&mut clan_state)];
            (outcome, committed)
        };
        self.finish(committed).await;
        Ok(outcome)
    }

    /// Take an item out of the clan lockbox. Leader or deputy rank only.
    /// With a destination slot this behaves like a targeted move (swapping
    /// any occupant back into the lockbox slot); without one the item is
    /// merged and auto-placed into the personal category range, and a full
    /// personal range fails the withdrawal outright.
    pub async fn withdraw_from_lockbox(
        &self,
        actor: PlayerId,
        src_slot: u32,
        dest_slot: Option<u32>,
    ) -> AppResult<DepositOutcome> {
        Self::check_slot(ContainerKind::ClanLockbox, src_slot)?;
        if let Some(dest) = dest_slot {
            Self::check_slot(ContainerKind::Personal, dest)?;
        }
        let clan = self.clan_of(actor)?;
        self.check_withdraw_rank(clan, actor)?;
        let player_key = OwnerKey::Player(actor);
        let clan_key = OwnerKey::Clan(clan);
        let player_handle = self.store.require(player_key)?;
        let clan_handle = self.store.require(clan_key)?;

        let (outcome, committed) = {
            let (mut player_state, mut clan_state) =
                lock_ordered(&player_handle, &clan_handle, player_key, clan_key);

            let Some(moving) = clan_state.container(ContainerKind::ClanLockbox)?.get(src_slot) else {
                return Ok(DepositOutcome::NoOp);
            };

            let mut tx_player = Tx::begin(&player_state);
            let mut tx_clan = Tx::begin(&clan_state);
            tx_clan.unbind(ContainerKind::ClanLockbox, src_slot)?;

            let outcome = match dest_slot {
                Some(dest) => {
                    let occupant = tx_player.next.container(ContainerKind::Personal)?.get(dest);
                    let released = tx_clan.release_item(moving)?;
                    tx_player.adopt_item(released);
                    if let Some(swapped) = occupant {
                        tx_player.unbind(ContainerKind::Personal, dest)?;
                        let returned = tx_player.release_item(swapped)?;
                        tx_clan.adopt_item(returned);
                        tx_clan.bind(ContainerKind::ClanLockbox, src_slot, swapped)?;
                    }
                    tx_player.bind(ContainerKind::Personal, dest, moving)?;
                    DepositOutcome::Placed { item: moving, slot: dest }
                }
                None => {
                    let instance = tx_clan.next.item(moving)?.clone();
                    let template = self
                        .catalog
                        .resolve(instance.template)
                        .ok_or(DomainError::PreconditionFailed("unknown item template"))?;
                    let band = template.category.personal_range();
                    match apply_merges(
                        &mut tx_player,
                        ContainerKind::Personal,
                        band.clone(),
                        template,
                        instance.stack,
                    )? {
                        (0, Some(into)) => {
                            tx_clan.destroy_item(moving)?;
                            DepositOutcome::Merged { into }
                        }
                        (remaining, _) => {
                            let slot = tx_player
                                .next
                                .container(ContainerKind::Personal)?
                                .first_free_in(band)
                                .ok_or(DomainError::ContainerFull(ContainerKind::Personal))?;
                            let released = tx_clan.release_item(moving)?;
                            tx_player.adopt_item(released);
                            if remaining != instance.stack {
                                tx_player.set_stack(moving, remaining)?;
                            }
                            tx_player.bind(ContainerKind::Personal, slot, moving)?;
                            DepositOutcome::Placed { item: moving, slot }
                        }
                    }
                }
            };

            let committed =
                vec![tx_player.commit(&mut player_state), tx_clan.commit(&mut clan_state)];
            (outcome, committed)
        };
        self.finish(committed).await;
        Ok(outcome)
    }

    /// Create units of a template directly in a player's personal
    /// container: the entry point loot and vendor collaborators use. The
    /// grant merges like any deposit and mints a fresh instance only for
    /// the remainder.
    pub async fn grant_item(&self, player: PlayerId, spec: ItemSpec) -> AppResult<DepositOutcome> {
        if spec.stack == 0 {
            return Err(DomainError::PreconditionFailed("cannot grant an empty stack"));
        }
        let template = self
            .catalog
            .resolve(spec.template)
            .ok_or(DomainError::PreconditionFailed("unknown item template"))?;
        if spec.stack > template.stack_limit.max(1) {
            return Err(DomainError::PreconditionFailed("grant exceeds the template stack limit"));
        }
        let handle = self.store.require(OwnerKey::Player(player))?;

        let (outcome, committed) = {
            let mut state = handle.lock();
            let band = template.category.personal_range();
            let mut tx = Tx::begin(&state);

            let outcome =
                match apply_merges(&mut tx, ContainerKind::Personal, band.clone(), template, spec.stack)? {
                    (0, Some(into)) => DepositOutcome::Merged { into },
                    (remaining, _) => {
                        let slot = tx
                            .next
                            .container(ContainerKind::Personal)?
                            .first_free_in(band)
                            .ok_or(DomainError::ContainerFull(ContainerKind::Personal))?;
                        let mut minted = self.ids.mint(&spec, template.max_durability);
                        minted.stack = remaining;
                        let item = minted.id;
                        tx.create_item(minted);
                        tx.bind(ContainerKind::Personal, slot, item)?;
                        DepositOutcome::Placed { item, slot }
                    }
                };

            (outcome, vec![tx.commit(&mut state)])
        };
        self.finish(committed).await;
        Ok(outcome)
    }
}
