use crate::catalog::ItemCatalog;
use crate::config::Config;
use crate::error::{AppResult, DomainError};
use crate::models::container::Container;
use crate::models::item::ItemInstance;
use crate::models::player::{ClanTreasury, PlayerProfile};
use crate::models::types::{
    ClanId, ContainerKind, ContainerRef, ItemId, OwnerKey, PlayerId, SessionId, TemplateId,
};
use crate::notify::{InventoryEvent, SessionHub};
use crate::persist::{SyncDelta, SyncOp, Synchronizer};
use crate::repo::InventoryRepo;
use crate::store::{IdAllocator, OwnerState, OwnerStore};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

mod currency;
mod deposit;
mod destroy;
mod equip_op;
mod move_op;
mod split;

pub use deposit::DepositOutcome;
pub use destroy::DestroyOutcome;
pub use equip_op::EquipKind;

/// Clan membership collaborator. Rank 0 is a plain member; withdrawal from
/// the shared lockbox needs rank 2 or higher.
pub trait ClanDirectory: Send + Sync {
    fn member_rank(&self, clan: ClanId, player: PlayerId) -> Option<u8>;
}

/// In-memory directory for tests and single-process embedding.
pub struct StaticClanDirectory {
    ranks: DashMap<(ClanId, PlayerId), u8>,
}

impl StaticClanDirectory {
    pub fn new() -> Self {
        Self { ranks: DashMap::new() }
    }

    pub fn set_rank(&self, clan: ClanId, player: PlayerId, rank: u8) {
        self.ranks.insert((clan, player), rank);
    }

    pub fn remove_member(&self, clan: ClanId, player: PlayerId) {
        self.ranks.remove(&(clan, player));
    }
}

impl Default for StaticClanDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ClanDirectory for StaticClanDirectory {
    fn member_rank(&self, clan: ClanId, player: PlayerId) -> Option<u8> {
        self.ranks.get(&(clan, player)).map(|e| *e.value())
    }
}

/// Post-commit hooks for appearance, stat and weapon-state recomputation.
/// Never invoked for a rejected transaction.
pub trait EquipSideEffects: Send + Sync {
    fn appearance_changed(&self, player: PlayerId, item: Option<ItemId>);
    fn stats_changed(&self, player: PlayerId);
    fn weapon_ready_changed(&self, player: PlayerId, ready: bool);
}

/// No-op hook set for embedders without an appearance pipeline.
pub struct NullEffects;

impl EquipSideEffects for NullEffects {
    fn appearance_changed(&self, _player: PlayerId, _item: Option<ItemId>) {}
    fn stats_changed(&self, _player: PlayerId) {}
    fn weapon_ready_changed(&self, _player: PlayerId, _ready: bool) {}
}

/// Result of a move-family transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// All mutations applied
    Committed,
    /// Nothing to do (self-move or empty source); no state changed
    NoOp,
}

pub(crate) enum PostEffect {
    Appearance(PlayerId, Option<ItemId>),
    Stats(PlayerId),
    WeaponReady(PlayerId, bool),
}

/// Mutation buffer over a cloned owner state. Operations compute their full
/// next state here; nothing becomes visible until `commit` writes the clone
/// back under the owner's lock. Dropping a Tx discards every planned change.
pub(crate) struct Tx {
    pub next: OwnerState,
    delta: SyncDelta,
    events: Vec<InventoryEvent>,
    effects: Vec<PostEffect>,
}

impl Tx {
    pub fn begin(state: &OwnerState) -> Self {
        Self {
            next: state.clone(),
            delta: SyncDelta::new(state.key),
            events: Vec::new(),
            effects: Vec::new(),
        }
    }

    fn cref(&self, kind: ContainerKind) -> ContainerRef {
        ContainerRef::new(self.next.key, kind)
    }

    // ========================================================================
    // SLOT MUTATIONS
    // ========================================================================

    /// Bind into a slot known to be empty.
    pub fn bind(&mut self, kind: ContainerKind, slot: u32, item: ItemId) -> AppResult<()> {
        let prev = self.next.container_mut(kind)?.bind(slot, item);
        debug_assert!(prev.is_none(), "bind over occupied {kind}:{slot}");
        self.delta.push(SyncOp::UpsertBinding { kind, slot, item });
        self.events.push(InventoryEvent::SlotBound { container: self.cref(kind), slot, item });
        Ok(())
    }

    pub fn unbind(&mut self, kind: ContainerKind, slot: u32) -> AppResult<Option<ItemId>> {
        let removed = self.next.container_mut(kind)?.unbind(slot);
        if let Some(item) = removed {
            self.delta.push(SyncOp::DeleteBinding { kind, slot });
            self.events.push(InventoryEvent::SlotUnbound { container: self.cref(kind), slot, item });
        }
        Ok(removed)
    }

    // ========================================================================
    // REGISTRY MUTATIONS
    // ========================================================================

    pub fn set_stack(&mut self, item: ItemId, stack: u32) -> AppResult<()> {
        self.next.item_mut(item)?.stack = stack;
        self.delta.push(SyncOp::UpdateStack { item, stack });
        self.events.push(InventoryEvent::StackChanged { item, stack });
        Ok(())
    }

    /// Register a brand-new instance (also persists the row).
    pub fn create_item(&mut self, item: ItemInstance) {
        self.delta.push(SyncOp::InsertItem { item: item.clone() });
        self.events.push(InventoryEvent::ItemData { item: item.clone() });
        self.next.register_item(item);
    }

    /// Adopt an instance migrating in from another owner (row already
    /// persisted; only the binding changes hands).
    pub fn adopt_item(&mut self, item: ItemInstance) {
        self.events.push(InventoryEvent::ItemData { item: item.clone() });
        self.next.register_item(item);
    }

    /// Drop an unbound instance and its persisted row.
    pub fn destroy_item(&mut self, item: ItemId) -> AppResult<ItemInstance> {
        let removed = self.next.remove_item(item)?;
        self.delta.push(SyncOp::DeleteItem { item });
        Ok(removed)
    }

    /// Remove the registry entry without touching the persisted row, for
    /// hand-over to another owner's Tx.
    pub fn release_item(&mut self, item: ItemId) -> AppResult<ItemInstance> {
        self.next.remove_item(item)
    }

    // ========================================================================
    // LEDGER MUTATIONS
    // ========================================================================

    pub fn set_player_credits(&mut self, total: i64) -> AppResult<()> {
        let profile = self.next.player_mut()?;
        profile.credits = total;
        let player = profile.id;
        self.delta.push(SyncOp::PlayerCredits { player, total });
        Ok(())
    }

    pub fn set_player_prestige(&mut self, total: i64) -> AppResult<()> {
        let profile = self.next.player_mut()?;
        profile.prestige = total;
        let player = profile.id;
        self.delta.push(SyncOp::PlayerPrestige { player, total });
        Ok(())
    }

    pub fn set_lockbox_credits(&mut self, total: i64) -> AppResult<()> {
        let profile = self.next.player_mut()?;
        profile.lockbox_credits = total;
        let player = profile.id;
        self.delta.push(SyncOp::LockboxCredits { player, total });
        self.events.push(InventoryEvent::LockboxFunds { player, total });
        Ok(())
    }

    pub fn set_purchased_tabs(&mut self, tabs: u8) -> AppResult<()> {
        let profile = self.next.player_mut()?;
        profile.lockbox_tabs = tabs;
        let player = profile.id;
        self.delta.push(SyncOp::PurchasedTabs { player, tabs });
        self.events.push(InventoryEvent::TabPermissions { player, tabs });
        Ok(())
    }

    pub fn set_clan_funds(&mut self, credits: i64, prestige: i64) -> AppResult<()> {
        let treasury = self.next.treasury_mut()?;
        let changed_credits = treasury.credits != credits;
        let changed_prestige = treasury.prestige != prestige;
        treasury.credits = credits;
        treasury.prestige = prestige;
        let clan = treasury.id;
        if changed_credits {
            self.delta.push(SyncOp::ClanCredits { clan, total: credits });
        }
        if changed_prestige {
            self.delta.push(SyncOp::ClanPrestige { clan, total: prestige });
        }
        self.events.push(InventoryEvent::ClanFunds { clan, credits, prestige });
        Ok(())
    }

    // ========================================================================
    // WEAPON MIRROR
    // ========================================================================

    /// Re-derive the active-weapon mirror (equipped slot 13) from the
    /// drawer after any drawer mutation. The mirror is a display alias, not
    /// an ownership binding, so it carries no registry changes; an emptied
    /// mirror also drops the weapon-ready flag.
    pub fn sync_weapon_mirror(&mut self) -> AppResult<()> {
        use crate::models::types::ACTIVE_WEAPON_MIRROR_SLOT;

        let active_slot = self.next.player()?.active_weapon_slot;
        let drawer = self.next.container(ContainerKind::WeaponDrawer)?;
        let in_drawer = if active_slot < drawer.capacity() { drawer.get(active_slot) } else { None };
        let mirrored = self.next.container(ContainerKind::Equipped)?.get(ACTIVE_WEAPON_MIRROR_SLOT);
        if in_drawer == mirrored {
            return Ok(());
        }

        let player = self.next.player()?.id;
        let equipped = self.next.container_mut(ContainerKind::Equipped)?;
        match in_drawer {
            Some(item) => {
                equipped.bind(ACTIVE_WEAPON_MIRROR_SLOT, item);
                self.events.push(InventoryEvent::SlotBound {
                    container: ContainerRef::equipped(player),
                    slot: ACTIVE_WEAPON_MIRROR_SLOT,
                    item,
                });
                self.effects.push(PostEffect::Appearance(player, Some(item)));
            }
            None => {
                if let Some(item) = equipped.unbind(ACTIVE_WEAPON_MIRROR_SLOT) {
                    self.events.push(InventoryEvent::SlotUnbound {
                        container: ContainerRef::equipped(player),
                        slot: ACTIVE_WEAPON_MIRROR_SLOT,
                        item,
                    });
                    self.effects.push(PostEffect::Appearance(player, None));
                }
                let profile = self.next.player_mut()?;
                if profile.weapon_ready {
                    profile.weapon_ready = false;
                    self.effects.push(PostEffect::WeaponReady(player, false));
                }
            }
        }
        Ok(())
    }

    pub fn push_effect(&mut self, effect: PostEffect) {
        self.effects.push(effect);
    }

    /// Write the computed next state back. The caller still holds the
    /// owner's lock; after this the mutation is final.
    pub fn commit(self, state: &mut OwnerState) -> Committed {
        let owner = self.next.key;
        *state = self.next;
        Committed {
            owner,
            delta: self.delta,
            events: self.events,
            effects: self.effects,
        }
    }
}

/// What leaves the locked section after a commit: the write set for the
/// synchronizer plus the events and hooks to fan out.
pub(crate) struct Committed {
    pub owner: OwnerKey,
    pub delta: SyncDelta,
    pub events: Vec<InventoryEvent>,
    pub effects: Vec<PostEffect>,
}

/// The transaction engine. One explicitly constructed instance per process,
/// handed by reference to every session handler; dropping it (after
/// `shutdown`) is the whole lifecycle.
pub struct InventoryEngine {
    pub(crate) store: OwnerStore,
    pub(crate) ids: IdAllocator,
    pub(crate) catalog: Arc<dyn ItemCatalog>,
    pub(crate) clans: Arc<dyn ClanDirectory>,
    pub(crate) effects: Arc<dyn EquipSideEffects>,
    pub(crate) repo: Arc<dyn InventoryRepo>,
    hub: Arc<SessionHub>,
    sync: Synchronizer,
    session_queue: usize,
}

impl InventoryEngine {
    pub fn new(
        config: &Config,
        repo: Arc<dyn InventoryRepo>,
        catalog: Arc<dyn ItemCatalog>,
        clans: Arc<dyn ClanDirectory>,
        effects: Arc<dyn EquipSideEffects>,
    ) -> Self {
        let sync = Synchronizer::spawn(repo.clone(), config.sync_lanes, config.sync_queue);
        Self {
            store: OwnerStore::new(),
            ids: IdAllocator::new(),
            catalog,
            clans,
            effects,
            repo,
            hub: Arc::new(SessionHub::new()),
            sync,
            session_queue: config.session_queue,
        }
    }

    pub fn hub(&self) -> Arc<SessionHub> {
        self.hub.clone()
    }

    /// Register a connected session and get its event stream.
    pub fn attach_session(
        &self,
        session: SessionId,
        player: PlayerId,
        clan: Option<ClanId>,
    ) -> mpsc::Receiver<InventoryEvent> {
        self.hub.register(session, player, clan, self.session_queue)
    }

    pub fn detach_session(&self, session: SessionId) {
        self.hub.unregister(session);
    }

    /// Drain queued durable writes and stop the lane workers.
    pub async fn shutdown(self) {
        self.sync.shutdown().await;
    }

    // ========================================================================
    // STATE BOOTSTRAP (repo-less; hydration lives in loader.rs)
    // ========================================================================

    /// Install a player state directly, bypassing the repository. Intended
    /// for embedders that hydrate elsewhere, and for tests.
    pub fn install_player(&self, profile: PlayerProfile) {
        self.store.install(OwnerState::new_player(profile));
    }

    pub fn install_clan(&self, treasury: ClanTreasury) {
        self.store.install(OwnerState::new_clan(treasury));
    }

    /// Put a fresh instance straight into a slot, bypassing transaction
    /// rules. Bootstrap/test seam; live mutations go through the
    /// operations.
    pub fn seed_item(
        &self,
        owner: OwnerKey,
        kind: ContainerKind,
        slot: u32,
        item: ItemInstance,
    ) -> AppResult<()> {
        let handle = self.store.require(owner)?;
        let mut state = handle.lock();
        self.ids.reserve_through(item.id);
        state.register_item(item.clone());
        state.container_mut(kind)?.bind(slot, item.id);
        Ok(())
    }

    // ========================================================================
    // READ API
    // ========================================================================

    /// Copy of one container's slot array.
    pub fn container_slots(&self, owner: OwnerKey, kind: ContainerKind) -> AppResult<Vec<Option<ItemId>>> {
        let handle = self.store.require(owner)?;
        let state = handle.lock();
        let container = state.container(kind)?;
        Ok((0..container.capacity()).map(|s| container.get(s)).collect())
    }

    pub fn item_snapshot(&self, owner: OwnerKey, item: ItemId) -> AppResult<ItemInstance> {
        let handle = self.store.require(owner)?;
        let state = handle.lock();
        Ok(state.item(item)?.clone())
    }

    pub fn player_snapshot(&self, player: PlayerId) -> AppResult<PlayerProfile> {
        let handle = self.store.require(OwnerKey::Player(player))?;
        let state = handle.lock();
        Ok(state.player()?.clone())
    }

    pub fn treasury_snapshot(&self, clan: ClanId) -> AppResult<ClanTreasury> {
        let handle = self.store.require(OwnerKey::Clan(clan))?;
        let state = handle.lock();
        Ok(state.treasury()?.clone())
    }

    /// Sum of stack units per template across one owner's registry.
    pub fn stack_totals(&self, owner: OwnerKey) -> AppResult<Vec<(TemplateId, u64)>> {
        let handle = self.store.require(owner)?;
        let state = handle.lock();
        let mut totals: std::collections::BTreeMap<_, u64> = std::collections::BTreeMap::new();
        for item in state.items() {
            *totals.entry(item.template).or_default() += u64::from(item.stack);
        }
        Ok(totals.into_iter().collect())
    }

    // ========================================================================
    // INTERNALS SHARED BY THE OPERATIONS
    // ========================================================================

    /// The clan the actor belongs to, or the precondition error every
    /// lockbox operation raises for clanless players.
    pub(crate) fn clan_of(&self, actor: PlayerId) -> AppResult<ClanId> {
        let handle = self.store.require(OwnerKey::Player(actor))?;
        let state = handle.lock();
        state
            .player()?
            .clan
            .ok_or(DomainError::PreconditionFailed("not in a clan"))
    }

    /// Owner a container kind resolves to for this actor.
    pub(crate) fn owner_for(&self, actor: PlayerId, kind: ContainerKind) -> AppResult<OwnerKey> {
        if kind.is_player_kind() {
            Ok(OwnerKey::Player(actor))
        } else {
            Ok(OwnerKey::Clan(self.clan_of(actor)?))
        }
    }

    pub(crate) fn check_slot(kind: ContainerKind, slot: u32) -> AppResult<()> {
        if slot < kind.capacity() {
            Ok(())
        } else {
            Err(DomainError::OutOfRange { container: kind, slot })
        }
    }

    /// Withdrawal gate for the shared container: leader or first deputy.
    pub(crate) fn check_withdraw_rank(&self, clan: ClanId, actor: PlayerId) -> AppResult<()> {
        match self.clans.member_rank(clan, actor) {
            Some(rank) if rank >= 2 => Ok(()),
            Some(_) => Err(DomainError::InsufficientPermission),
            None => Err(DomainError::InsufficientPermission),
        }
    }

    /// Dispatch everything a committed transaction produced. Callers must
    /// have dropped all owner locks before awaiting this.
    pub(crate) async fn finish(&self, committed: Vec<Committed>) {
        for c in &committed {
            match c.owner {
                OwnerKey::Player(player) => {
                    for event in &c.events {
                        self.hub.notify_player(player, event);
                    }
                }
                OwnerKey::Clan(clan) => {
                    for event in &c.events {
                        self.hub.notify_clan(clan, event);
                    }
                }
            }
            for effect in &c.effects {
                match effect {
                    PostEffect::Appearance(player, item) => self.effects.appearance_changed(*player, *item),
                    PostEffect::Stats(player) => self.effects.stats_changed(*player),
                    PostEffect::WeaponReady(player, ready) => {
                        self.effects.weapon_ready_changed(*player, *ready)
                    }
                }
            }
        }
        for c in committed {
            self.sync.dispatch(c.delta).await;
        }
    }
}

/// First mergeable slot scan shared by the deposit paths: same template,
/// spare stack room, inside `range`.
pub(crate) fn merge_candidates(
    container: &Container,
    range: std::ops::Range<u32>,
    template: TemplateId,
    items: &OwnerState,
    stack_limit: u32,
) -> Vec<(u32, ItemId, u32)> {
    let mut found = Vec::new();
    let end = range.end.min(container.capacity());
    for slot in range.start..end {
        let Some(id) = container.get(slot) else { continue };
        let Ok(existing) = items.item(id) else { continue };
        if existing.template != template {
            continue;
        }
        let spare = existing.spare_capacity(stack_limit);
        if spare > 0 {
            found.push((slot, id, spare));
        }
    }
    found
}
