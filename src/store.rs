use crate::error::{AppResult, DomainError};
use crate::models::container::Container;
use crate::models::item::{ItemInstance, ItemSpec};
use crate::models::player::{ClanTreasury, PlayerProfile};
use crate::models::types::{ACTIVE_WEAPON_MIRROR_SLOT, ContainerKind, ItemId, OwnerKey};
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ledger side of an owner: a player carries a full profile, a clan carries
/// its treasury.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OwnerProfile {
    Player(PlayerProfile),
    Clan(ClanTreasury),
}

/// Everything one owner's mutex guards: its containers, its slice of the
/// item registry and its ledgers. Cloning yields the snapshot that
/// transactions compute their next state on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerState {
    pub key: OwnerKey,
    containers: HashMap<ContainerKind, Container>,
    items: HashMap<ItemId, ItemInstance>,
    pub profile: OwnerProfile,
}

impl OwnerState {
    pub fn new_player(profile: PlayerProfile) -> Self {
        let mut containers = HashMap::new();
        for kind in [
            ContainerKind::Personal,
            ContainerKind::Home,
            ContainerKind::Equipped,
            ContainerKind::WeaponDrawer,
        ] {
            containers.insert(kind, Container::new(kind));
        }
        Self {
            key: OwnerKey::Player(profile.id),
            containers,
            items: HashMap::new(),
            profile: OwnerProfile::Player(profile),
        }
    }

    pub fn new_clan(treasury: ClanTreasury) -> Self {
        let mut containers = HashMap::new();
        containers.insert(ContainerKind::ClanLockbox, Container::new(ContainerKind::ClanLockbox));
        Self {
            key: OwnerKey::Clan(treasury.id),
            containers,
            items: HashMap::new(),
            profile: OwnerProfile::Clan(treasury),
        }
    }

    // ========================================================================
    // CONTAINERS
    // ========================================================================

    pub fn container(&self, kind: ContainerKind) -> AppResult<&Container> {
        self.containers
            .get(&kind)
            .ok_or(DomainError::PreconditionFailed("owner does not hold this container kind"))
    }

    pub fn container_mut(&mut self, kind: ContainerKind) -> AppResult<&mut Container> {
        self.containers
            .get_mut(&kind)
            .ok_or(DomainError::PreconditionFailed("owner does not hold this container kind"))
    }

    /// Which container and slot currently bind `item`, if any. The
    /// active-weapon mirror (equipped slot 13) is a display alias of the
    /// drawer binding and never counts as a location.
    pub fn locate_item(&self, item: ItemId) -> Option<(ContainerKind, u32)> {
        self.containers.values().find_map(|c| {
            c.iter_bound()
                .find(|&(slot, id)| {
                    id == item
                        && !(c.kind() == ContainerKind::Equipped && slot == ACTIVE_WEAPON_MIRROR_SLOT)
                })
                .map(|(slot, _)| (c.kind(), slot))
        })
    }

    // ========================================================================
    // ITEM REGISTRY
    // ========================================================================

    pub fn item(&self, id: ItemId) -> AppResult<&ItemInstance> {
        self.items.get(&id).ok_or(DomainError::ItemNotFound(id))
    }

    pub fn item_mut(&mut self, id: ItemId) -> AppResult<&mut ItemInstance> {
        self.items.get_mut(&id).ok_or(DomainError::ItemNotFound(id))
    }

    pub fn has_item(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn register_item(&mut self, item: ItemInstance) {
        debug_assert!(!self.items.contains_key(&item.id), "item {} registered twice", item.id);
        self.items.insert(item.id, item);
    }

    /// Drop a registry entry. The item must already be unbound.
    pub fn remove_item(&mut self, id: ItemId) -> AppResult<ItemInstance> {
        debug_assert!(self.locate_item(id).is_none(), "destroying bound item {id}");
        self.items.remove(&id).ok_or(DomainError::ItemNotFound(id))
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemInstance> {
        self.items.values()
    }

    // ========================================================================
    // LEDGERS
    // ========================================================================

    pub fn player(&self) -> AppResult<&PlayerProfile> {
        match &self.profile {
            OwnerProfile::Player(p) => Ok(p),
            OwnerProfile::Clan(_) => Err(DomainError::PreconditionFailed("owner is not a player")),
        }
    }

    pub fn player_mut(&mut self) -> AppResult<&mut PlayerProfile> {
        match &mut self.profile {
            OwnerProfile::Player(p) => Ok(p),
            OwnerProfile::Clan(_) => Err(DomainError::PreconditionFailed("owner is not a player")),
        }
    }

    pub fn treasury(&self) -> AppResult<&ClanTreasury> {
        match &self.profile {
            OwnerProfile::Clan(t) => Ok(t),
            OwnerProfile::Player(_) => Err(DomainError::PreconditionFailed("owner is not a clan")),
        }
    }

    pub fn treasury_mut(&mut self) -> AppResult<&mut ClanTreasury> {
        match &mut self.profile {
            OwnerProfile::Clan(t) => Ok(t),
            OwnerProfile::Player(_) => Err(DomainError::PreconditionFailed("owner is not a clan")),
        }
    }
}

pub type OwnerHandle = Arc<Mutex<OwnerState>>;

/// All owner states known to this process. One entry per player or clan;
/// each entry's mutex serializes every transaction touching that owner.
pub struct OwnerStore {
    owners: DashMap<OwnerKey, OwnerHandle>,
}

impl OwnerStore {
    pub fn new() -> Self {
        Self { owners: DashMap::new() }
    }

    /// Handle for an owner that has been installed. Commands against an
    /// owner that never loaded are rejected upstream.
    pub fn get(&self, key: OwnerKey) -> Option<OwnerHandle> {
        self.owners.get(&key).map(|e| e.value().clone())
    }

    pub fn require(&self, key: OwnerKey) -> AppResult<OwnerHandle> {
        self.get(key)
            .ok_or(DomainError::PreconditionFailed("owner state not loaded"))
    }

    /// Install (or replace) an owner's state wholesale. Used by hydration;
    /// replacing discards any stale in-memory assumption.
    pub fn install(&self, state: OwnerState) -> OwnerHandle {
        let key = state.key;
        let handle = Arc::new(Mutex::new(state));
        self.owners.insert(key, handle.clone());
        handle
    }

    pub fn remove(&self, key: OwnerKey) {
        self.owners.remove(&key);
    }

    pub fn contains(&self, key: OwnerKey) -> bool {
        self.owners.contains_key(&key)
    }
}

impl Default for OwnerStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock two distinct owners in the global order (players before clans, then
/// by id), returning the guards in the order the caller passed them.
pub fn lock_ordered<'a>(
    a: &'a OwnerHandle,
    b: &'a OwnerHandle,
    a_key: OwnerKey,
    b_key: OwnerKey,
) -> (MutexGuard<'a, OwnerState>, MutexGuard<'a, OwnerState>) {
    debug_assert_ne!(a_key, b_key, "lock_ordered needs two distinct owners");
    if a_key < b_key {
        let ga = a.lock();
        let gb = b.lock();
        (ga, gb)
    } else {
        let gb = b.lock();
        let ga = a.lock();
        (ga, gb)
    }
}

/// Monotonic instance-id source. Hydration bumps it past every persisted id
/// before the first grant can run.
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: AtomicU64::new(1) }
    }

    pub fn allocate(&self) -> ItemId {
        ItemId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Never hand out `id` or anything below it again.
    pub fn reserve_through(&self, id: ItemId) {
        self.next.fetch_max(id.0 + 1, Ordering::Relaxed);
    }

    /// Materialize a fresh instance from a spec.
    pub fn mint(&self, spec: &ItemSpec, max_durability: u32) -> ItemInstance {
        ItemInstance {
            id: self.allocate(),
            template: spec.template,
            stack: spec.stack,
            durability: max_durability,
            color: spec.color,
            crafter: spec.crafter.clone(),
            ammo: spec.ammo,
            acquired_at: chrono::Utc::now(),
        }
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
