use crate::models::item::ItemInstance;
use crate::models::types::{ClanId, ContainerKind, ItemId, OwnerKey, PlayerId};
use crate::repo::{InventoryRepo, RepoResult};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One durable write derived from a committed transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOp {
    UpsertBinding { kind: ContainerKind, slot: u32, item: ItemId },
    DeleteBinding { kind: ContainerKind, slot: u32 },
    InsertItem { item: ItemInstance },
    UpdateStack { item: ItemId, stack: u32 },
    DeleteItem { item: ItemId },
    LockboxCredits { player: PlayerId, total: i64 },
    PlayerCredits { player: PlayerId, total: i64 },
    PlayerPrestige { player: PlayerId, total: i64 },
    ClanCredits { clan: ClanId, total: i64 },
    ClanPrestige { clan: ClanId, total: i64 },
    PurchasedTabs { player: PlayerId, tabs: u8 },
}

/// The write set of one committed transaction for one owner. Binding ops
/// are relative to `owner`; ledger ops carry their own key.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncDelta {
    pub owner: OwnerKey,
    pub ops: Vec<SyncOp>,
}

impl SyncDelta {
    pub fn new(owner: OwnerKey) -> Self {
        Self { owner, ops: Vec::new() }
    }

    pub fn push(&mut self, op: SyncOp) {
        self.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Translates committed deltas into repository calls, strictly after the
/// in-memory commit. Deltas for the same owner always land on the same lane,
/// so one owner's writes stay ordered; lane count bounds storage
/// concurrency. A failed write is logged and abandoned; the next full
/// reload reconciles.
pub struct Synchronizer {
    lanes: Vec<mpsc::Sender<SyncDelta>>,
    workers: Vec<JoinHandle<()>>,
}

impl Synchronizer {
    pub fn spawn(repo: Arc<dyn InventoryRepo>, lanes: usize, queue_capacity: usize) -> Self {
        let lane_count = lanes.max(1);
        let mut senders = Vec::with_capacity(lane_count);
        let mut workers = Vec::with_capacity(lane_count);

        for lane in 0..lane_count {
            let (tx, mut rx) = mpsc::channel::<SyncDelta>(queue_capacity.max(1));
            let repo = repo.clone();
            workers.push(tokio::spawn(async move {
                while let Some(delta) = rx.recv().await {
                    apply_delta(repo.as_ref(), &delta).await;
                }
                tracing::debug!(lane, "sync lane drained");
            }));
            senders.push(tx);
        }

        Self { lanes: senders, workers }
    }

    fn lane_of(&self, owner: OwnerKey) -> usize {
        let mut hasher = std::hash::DefaultHasher::new();
        owner.hash(&mut hasher);
        (hasher.finish() as usize) % self.lanes.len()
    }

    /// Queue a committed delta. Waits for lane space rather than dropping;
    /// callers hold no locks at this point.
    pub async fn dispatch(&self, delta: SyncDelta) {
        if delta.is_empty() {
            return;
        }
        let lane = self.lane_of(delta.owner);
        if self.lanes[lane].send(delta).await.is_err() {
            tracing::error!(lane, "sync lane closed; delta lost until next reload");
        }
    }

    /// Close all lanes and wait for queued writes to finish.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn apply_delta(repo: &dyn InventoryRepo, delta: &SyncDelta) {
    for op in &delta.ops {
        if let Err(e) = apply_op(repo, delta.owner, op).await {
            // In-memory state already reflects what players saw; never roll
            // back here. Reconciled by the next full reload.
            tracing::error!(owner = %delta.owner, error = %e, ?op, "durable write failed");
        }
    }
}

async fn apply_op(repo: &dyn InventoryRepo, owner: OwnerKey, op: &SyncOp) -> RepoResult<()> {
    match op {
        SyncOp::UpsertBinding { kind, slot, item } => {
            repo.upsert_slot_binding(owner, *kind, *slot, *item).await
        }
        SyncOp::DeleteBinding { kind, slot } => repo.delete_slot_binding(owner, *kind, *slot).await,
        SyncOp::InsertItem { item } => repo.insert_item(item).await,
        SyncOp::UpdateStack { item, stack } => repo.update_stack_size(*item, *stack).await,
        SyncOp::DeleteItem { item } => repo.delete_item(*item).await,
        SyncOp::LockboxCredits { player, total } => repo.update_lockbox_credits(*player, *total).await,
        SyncOp::PlayerCredits { player, total } => repo.update_player_credits(*player, *total).await,
        SyncOp::PlayerPrestige { player, total } => repo.update_player_prestige(*player, *total).await,
        SyncOp::ClanCredits { clan, total } => repo.update_clan_credits(*clan, *total).await,
        SyncOp::ClanPrestige { clan, total } => repo.update_clan_prestige(*clan, *total).await,
        SyncOp::PurchasedTabs { player, tabs } => repo.update_purchased_tabs(*player, *tabs).await,
    }
}
