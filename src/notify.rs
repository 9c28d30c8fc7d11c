use crate::models::item::ItemInstance;
use crate::models::types::{ClanId, ContainerRef, ItemId, PlayerId, SessionId};
use dashmap::DashMap;
use tokio::sync::mpsc;

/// Container-delta events pushed to connected sessions. The messaging layer
/// turns these into wire packets; the engine never blocks on a slow session
/// (full channels drop the event, the client re-syncs from the next full
/// reload).
#[derive(Debug, Clone, PartialEq)]
pub enum InventoryEvent {
    /// An item landed in a slot
    SlotBound { container: ContainerRef, slot: u32, item: ItemId },
    /// A slot was emptied
    SlotUnbound { container: ContainerRef, slot: u32, item: ItemId },
    /// Stack count of a live instance changed
    StackChanged { item: ItemId, stack: u32 },
    /// Instance data for an item the session may not have seen yet
    ItemData { item: ItemInstance },
    /// Authoritative full state of one container
    ContainerReload { container: ContainerRef, slots: Vec<Option<ItemId>> },
    /// Personal lockbox balance changed
    LockboxFunds { player: PlayerId, total: i64 },
    /// Clan treasury balances changed
    ClanFunds { clan: ClanId, credits: i64, prestige: i64 },
    /// Purchased lockbox tabs changed (or were re-requested)
    TabPermissions { player: PlayerId, tabs: u8 },
}

struct SessionEntry {
    player: PlayerId,
    clan: Option<ClanId>,
    tx: mpsc::Sender<InventoryEvent>,
}

/// Live sessions with inventory visibility. Clan visibility is recomputed
/// at notify time from whatever is registered right now; members who
/// disconnect mid-transaction simply miss the event.
pub struct SessionHub {
    sessions: DashMap<SessionId, SessionEntry>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self { sessions: DashMap::new() }
    }

    /// Register a connected session. `capacity` bounds its event queue.
    pub fn register(
        &self,
        session: SessionId,
        player: PlayerId,
        clan: Option<ClanId>,
        capacity: usize,
    ) -> mpsc::Receiver<InventoryEvent> {
        let (tx, rx) = mpsc::channel(capacity);
        self.sessions.insert(session, SessionEntry { player, clan, tx });
        rx
    }

    pub fn unregister(&self, session: SessionId) {
        self.sessions.remove(&session);
    }

    /// Update a session's clan after membership changes, so lockbox
    /// visibility follows without a reconnect.
    pub fn set_clan(&self, session: SessionId, clan: Option<ClanId>) {
        if let Some(mut entry) = self.sessions.get_mut(&session) {
            entry.clan = clan;
        }
    }

    pub fn connected_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Deliver to every session of one player.
    pub fn notify_player(&self, player: PlayerId, event: &InventoryEvent) {
        self.fan_out(event, |e| e.player == player);
    }

    /// Deliver to every connected member of a clan.
    pub fn notify_clan(&self, clan: ClanId, event: &InventoryEvent) {
        self.fan_out(event, |e| e.clan == Some(clan));
    }

    fn fan_out(&self, event: &InventoryEvent, visible: impl Fn(&SessionEntry) -> bool) {
        for entry in self.sessions.iter() {
            if !visible(entry.value()) {
                continue;
            }
            if entry.value().tx.try_send(event.clone()).is_err() {
                // Queue full or receiver gone; the session catches up on its
                // next container reload.
                tracing::debug!(player = %entry.value().player, "dropped inventory event");
            }
        }
    }
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}
