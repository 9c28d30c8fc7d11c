use crate::engine::InventoryEngine;
use crate::error::AppResult;
use crate::models::container::Container;
use crate::models::item::ItemInstance;
use crate::models::player::{ClanTreasury, PlayerProfile};
use crate::models::types::{ACTIVE_WEAPON_MIRROR_SLOT, ContainerKind, ContainerRef, OwnerKey};
use crate::notify::InventoryEvent;
use crate::repo::SlotBinding;
use crate::store::OwnerState;
use std::collections::HashMap;

/// Player container kinds in the order their reloads are sent.
const PLAYER_KINDS: [ContainerKind; 4] = [
    ContainerKind::Personal,
    ContainerKind::Home,
    ContainerKind::Equipped,
    ContainerKind::WeaponDrawer,
];

fn reload_event(state: &OwnerState, kind: ContainerKind) -> AppResult<InventoryEvent> {
    let container = state.container(kind)?;
    let slots = (0..container.capacity()).map(|s| container.get(s)).collect();
    Ok(InventoryEvent::ContainerReload { container: ContainerRef::new(state.key, kind), slots })
}

/// Fill a fresh owner state from persisted rows. Rows that no longer fit
/// (unknown kind for this owner, slot past capacity, missing or duplicated
/// instance) are logged and skipped rather than poisoning the load.
fn hydrate(state: &mut OwnerState, bindings: Vec<SlotBinding>, items: Vec<ItemInstance>) {
    let mut instances: HashMap<_, _> = items.into_iter().map(|i| (i.id, i)).collect();
    for binding in bindings {
        if binding.kind == ContainerKind::Equipped && binding.slot == ACTIVE_WEAPON_MIRROR_SLOT {
            tracing::warn!(owner = %state.key, "skipping persisted weapon-mirror row");
            continue;
        }
        let Ok(container) = state.container_mut(binding.kind) else {
            tracing::warn!(owner = %state.key, kind = %binding.kind.as_str(), "skipping binding for foreign container kind");
            continue;
        };
        if binding.slot >= container.capacity() {
            tracing::warn!(owner = %state.key, slot = binding.slot, "skipping binding past container capacity");
            continue;
        }
        let Some(instance) = instances.remove(&binding.item) else {
            tracing::warn!(owner = %state.key, item = %binding.item, "skipping binding without an instance row");
            continue;
        };
        if container.get(binding.slot).is_some() {
            tracing::warn!(owner = %state.key, slot = binding.slot, "skipping binding into an occupied slot");
            continue;
        }
        container.bind(binding.slot, binding.item);
        state.register_item(instance);
    }
}

/// Rebuild the active-weapon mirror from the drawer; the mirror is never
/// persisted.
fn restore_weapon_mirror(state: &mut OwnerState) -> AppResult<()> {
    let active_slot = state.player()?.active_weapon_slot;
    let drawer: &Container = state.container(ContainerKind::WeaponDrawer)?;
    let in_drawer = if active_slot < drawer.capacity() { drawer.get(active_slot) } else { None };
    if let Some(item) = in_drawer {
        state.container_mut(ContainerKind::Equipped)?.bind(ACTIVE_WEAPON_MIRROR_SLOT, item);
    }
    Ok(())
}

impl InventoryEngine {
    /// Hydrate a player's containers from storage and install them,
    /// replacing any stale in-memory state wholesale. Connected sessions of
    /// the player get a full reload of every container plus the purchased
    /// lockbox tabs.
    pub async fn load_player(&self, profile: PlayerProfile) -> AppResult<()> {
        let player = profile.id;
        let tabs = profile.lockbox_tabs;
        let key = OwnerKey::Player(player);
        let (bindings, items) = self.repo.load_owner(key).await?;

        let mut state = OwnerState::new_player(profile);
        hydrate(&mut state, bindings, items);
        restore_weapon_mirror(&mut state)?;
        for item in state.items() {
            self.ids.reserve_through(item.id);
        }

        let mut events = Vec::with_capacity(PLAYER_KINDS.len() + 1);
        for kind in PLAYER_KINDS {
            events.push(reload_event(&state, kind)?);
        }
        events.push(InventoryEvent::TabPermissions { player, tabs });

        tracing::info!(%player, items = state.items().count(), "player inventory loaded");
        self.store.install(state);
        let hub = self.hub();
        for event in &events {
            hub.notify_player(player, event);
        }
        Ok(())
    }

    /// Hydrate a clan's lockbox from storage and install it, replacing any
    /// stale state. Every connected member gets the full lockbox reload.
    pub async fn load_clan(&self, treasury: ClanTreasury) -> AppResult<()> {
        let clan = treasury.id;
        let key = OwnerKey::Clan(clan);
        let (bindings, items) = self.repo.load_owner(key).await?;

        let mut state = OwnerState::new_clan(treasury);
        hydrate(&mut state, bindings, items);
        for item in state.items() {
            self.ids.reserve_through(item.id);
        }
        let reload = reload_event(&state, ContainerKind::ClanLockbox)?;

        tracing::info!(%clan, items = state.items().count(), "clan lockbox loaded");
        self.store.install(state);
        self.hub().notify_clan(clan, &reload);
        Ok(())
    }

    /// Drop an owner's in-memory state, for example when the last session
    /// of a player disconnects.
    pub fn unload(&self, owner: OwnerKey) {
        self.store.remove(owner);
    }
}
