use crate::error::RepoError;
use crate::models::item::ItemInstance;
use crate::models::types::{ClanId, ContainerKind, ItemId, OwnerKey, PlayerId};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

pub type RepoResult<T> = Result<T, RepoError>;

/// One persisted slot binding row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotBinding {
    pub kind: ContainerKind,
    pub slot: u32,
    pub item: ItemId,
}

/// Durable-storage collaborator. The engine only ever calls this after an
/// in-memory commit (through the synchronizer) or during hydration; the
/// schema behind it is the embedder's business.
#[async_trait::async_trait]
pub trait InventoryRepo: Send + Sync {
    // ========================================================================
    // HYDRATION
    // ========================================================================

    /// All slot bindings of one owner, every container kind included.
    async fn load_container_items(&self, owner: OwnerKey) -> RepoResult<Vec<SlotBinding>>;

    /// Snapshot of a single item instance.
    async fn load_item(&self, item: ItemId) -> RepoResult<ItemInstance>;

    // ========================================================================
    // SLOT BINDINGS
    // ========================================================================

    async fn upsert_slot_binding(
        &self,
        owner: OwnerKey,
        kind: ContainerKind,
        slot: u32,
        item: ItemId,
    ) -> RepoResult<()>;

    async fn delete_slot_binding(&self, owner: OwnerKey, kind: ContainerKind, slot: u32) -> RepoResult<()>;

    // ========================================================================
    // ITEM ROWS
    // ========================================================================

    async fn insert_item(&self, item: &ItemInstance) -> RepoResult<()>;

    async fn update_stack_size(&self, item: ItemId, stack: u32) -> RepoResult<()>;

    async fn delete_item(&self, item: ItemId) -> RepoResult<()>;

    // ========================================================================
    // LEDGERS
    // ========================================================================

    async fn update_lockbox_credits(&self, player: PlayerId, total: i64) -> RepoResult<()>;

    async fn update_player_credits(&self, player: PlayerId, total: i64) -> RepoResult<()>;

    async fn update_player_prestige(&self, player: PlayerId, total: i64) -> RepoResult<()>;

    async fn update_clan_credits(&self, clan: ClanId, total: i64) -> RepoResult<()>;

    async fn update_clan_prestige(&self, clan: ClanId, total: i64) -> RepoResult<()>;

    async fn update_purchased_tabs(&self, player: PlayerId, tabs: u8) -> RepoResult<()>;

    // ========================================================================
    // CONVENIENCE (default implementations)
    // ========================================================================

    /// Bindings plus the instance snapshot for each bound item.
    async fn load_owner(&self, owner: OwnerKey) -> RepoResult<(Vec<SlotBinding>, Vec<ItemInstance>)> {
        let bindings = self.load_container_items(owner).await?;
        let mut items = Vec::with_capacity(bindings.len());
        for b in &bindings {
            items.push(self.load_item(b.item).await?);
        }
        Ok((bindings, items))
    }
}

/// In-memory repository for tests and single-process embedding. Writes can
/// be switched off to exercise the divergence-and-reload path.
pub struct MemoryRepo {
    bindings: DashMap<(OwnerKey, ContainerKind, u32), ItemId>,
    items: DashMap<ItemId, ItemInstance>,
    lockbox_credits: DashMap<PlayerId, i64>,
    player_credits: DashMap<PlayerId, i64>,
    player_prestige: DashMap<PlayerId, i64>,
    clan_credits: DashMap<ClanId, i64>,
    clan_prestige: DashMap<ClanId, i64>,
    purchased_tabs: DashMap<PlayerId, u8>,
    available: AtomicBool,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self {
            bindings: DashMap::new(),
            items: DashMap::new(),
            lockbox_credits: DashMap::new(),
            player_credits: DashMap::new(),
            player_prestige: DashMap::new(),
            clan_credits: DashMap::new(),
            clan_prestige: DashMap::new(),
            purchased_tabs: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate a storage outage; writes fail until switched back on.
    pub fn set_available(&self, up: bool) {
        self.available.store(up, Ordering::SeqCst);
    }

    fn check_up(&self) -> RepoResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepoError::Unavailable("memory repo offline".into()))
        }
    }

    // Seeding helpers for hydration tests.

    pub fn seed_item(&self, item: ItemInstance) {
        self.items.insert(item.id, item);
    }

    pub fn seed_binding(&self, owner: OwnerKey, kind: ContainerKind, slot: u32, item: ItemId) {
        self.bindings.insert((owner, kind, slot), item);
    }

    pub fn binding(&self, owner: OwnerKey, kind: ContainerKind, slot: u32) -> Option<ItemId> {
        self.bindings.get(&(owner, kind, slot)).map(|e| *e.value())
    }

    pub fn stored_stack(&self, item: ItemId) -> Option<u32> {
        self.items.get(&item).map(|e| e.value().stack)
    }
}

impl Default for MemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl InventoryRepo for MemoryRepo {
    async fn load_container_items(&self, owner: OwnerKey) -> RepoResult<Vec<SlotBinding>> {
        let mut out: Vec<SlotBinding> = self
            .bindings
            .iter()
            .filter(|e| e.key().0 == owner)
            .map(|e| SlotBinding {
                kind: e.key().1,
                slot: e.key().2,
                item: *e.value(),
            })
            .collect();
        out.sort_by_key(|b| (b.kind, b.slot));
        Ok(out)
    }

    async fn load_item(&self, item: ItemId) -> RepoResult<ItemInstance> {
        self.items
            .get(&item)
            .map(|e| e.value().clone())
            .ok_or_else(|| RepoError::NotFound(format!("item {item}")))
    }

    async fn upsert_slot_binding(
        &self,
        owner: OwnerKey,
        kind: ContainerKind,
        slot: u32,
        item: ItemId,
    ) -> RepoResult<()> {
        self.check_up()?;
        self.bindings.insert((owner, kind, slot), item);
        Ok(())
    }

    async fn delete_slot_binding(&self, owner: OwnerKey, kind: ContainerKind, slot: u32) -> RepoResult<()> {
        self.check_up()?;
        self.bindings.remove(&(owner, kind, slot));
        Ok(())
    }

    async fn insert_item(&self, item: &ItemInstance) -> RepoResult<()> {
        self.check_up()?;
        self.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_stack_size(&self, item: ItemId, stack: u32) -> RepoResult<()> {
        self.check_up()?;
        match self.items.get_mut(&item) {
            Some(mut e) => {
                e.value_mut().stack = stack;
                Ok(())
            }
            None => Err(RepoError::NotFound(format!("item {item}"))),
        }
    }

    async fn delete_item(&self, item: ItemId) -> RepoResult<()> {
        self.check_up()?;
        self.items.remove(&item);
        Ok(())
    }

    async fn update_lockbox_credits(&self, player: PlayerId, total: i64) -> RepoResult<()> {
        self.check_up()?;
        self.lockbox_credits.insert(player, total);
        Ok(())
    }

    async fn update_player_credits(&self, player: PlayerId, total: i64) -> RepoResult<()> {
        self.check_up()?;
        self.player_credits.insert(player, total);
        Ok(())
    }

    async fn update_player_prestige(&self, player: PlayerId, total: i64) -> RepoResult<()> {
        self.check_up()?;
        self.player_prestige.insert(player, total);
        Ok(())
    }

    async fn update_clan_credits(&self, clan: ClanId, total: i64) -> RepoResult<()> {
        self.check_up()?;
        self.clan_credits.insert(clan, total);
        Ok(())
    }

    async fn update_clan_prestige(&self, clan: ClanId, total: i64) -> RepoResult<()> {
        self.check_up()?;
        self.clan_prestige.insert(clan, total);
        Ok(())
    }

    async fn update_purchased_tabs(&self, player: PlayerId, tabs: u8) -> RepoResult<()> {
        self.check_up()?;
        self.purchased_tabs.insert(player, tabs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::TemplateId;

    fn item(id: u64) -> ItemInstance {
        ItemInstance {
            id: ItemId(id),
            template: TemplateId(1),
            stack: 1,
            durability: 100,
            color: 0,
            crafter: None,
            ammo: None,
            acquired_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn load_owner_returns_bindings_with_instances() {
        let repo = MemoryRepo::new();
        let owner = OwnerKey::Player(PlayerId::new());
        repo.seed_item(item(1));
        repo.seed_item(item(2));
        repo.seed_binding(owner, ContainerKind::Personal, 0, ItemId(1));
        repo.seed_binding(owner, ContainerKind::Home, 10, ItemId(2));

        let (bindings, items) = repo.load_owner(owner).await.unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn writes_fail_while_offline() {
        let repo = MemoryRepo::new();
        let owner = OwnerKey::Player(PlayerId::new());
        repo.set_available(false);
        let err = repo
            .upsert_slot_binding(owner, ContainerKind::Personal, 0, ItemId(1))
            .await;
        assert!(matches!(err, Err(RepoError::Unavailable(_))));

        repo.set_available(true);
        assert!(repo.upsert_slot_binding(owner, ContainerKind::Personal, 0, ItemId(1)).await.is_ok());
    }
}
