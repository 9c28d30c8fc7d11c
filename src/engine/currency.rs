use super::{InventoryEngine, Tx};
use crate::error::{AppResult, DomainError};
use crate::models::player::CurrencyKind;
use crate::models::types::{OwnerKey, PlayerId};
use crate::notify::InventoryEvent;
use crate::store::lock_ordered;

/// Smallest amount the personal lockbox accepts, in either direction.
pub const LOCKBOX_TRANSFER_MINIMUM: i64 = 500;

/// Credit price per purchasable lockbox tab. Tab 1 is free with the clan.
pub const LOCKBOX_TAB_PRICES: [(u8, i64); 4] =
    [(2, 100_000), (3, 1_000_000), (4, 10_000_000), (5, 100_000_000)];

fn checked_deposit(balance: i64, amount: i64) -> AppResult<i64> {
    balance
        .checked_add(amount)
        .ok_or(DomainError::PreconditionFailed("balance overflow"))
}

impl InventoryEngine {
    /// Move credits between a player's wallet and their personal lockbox.
    /// Positive amounts deposit, negative amounts withdraw; both directions
    /// enforce the transfer minimum. Returns the new lockbox balance.
    pub async fn transfer_lockbox_credits(&self, actor: PlayerId, amount: i64) -> AppResult<i64> {
        if amount == i64::MIN {
            return Err(DomainError::PreconditionFailed("transfer amount out of range"));
        }
        if amount.abs() < LOCKBOX_TRANSFER_MINIMUM {
            return Err(DomainError::BelowMinimum { amount, minimum: LOCKBOX_TRANSFER_MINIMUM });
        }

        let handle = self.store.require(OwnerKey::Player(actor))?;
        let (total, committed) = {
            let mut state = handle.lock();
            let profile = state.player()?;
            let (credits, lockbox) = (profile.credits, profile.lockbox_credits);

            let (new_credits, new_lockbox) = if amount > 0 {
                if credits < amount {
                    return Err(DomainError::InsufficientFunds { have: credits, need: amount });
                }
                (credits - amount, checked_deposit(lockbox, amount)?)
            } else {
                let need = -amount;
                if lockbox < need {
                    return Err(DomainError::InsufficientFunds { have: lockbox, need });
                }
                (checked_deposit(credits, need)?, lockbox - need)
            };

            let mut tx = Tx::begin(&state);
            tx.set_player_credits(new_credits)?;
            tx.set_lockbox_credits(new_lockbox)?;
            (new_lockbox, vec![tx.commit(&mut state)])
        };
        self.finish(committed).await;
        Ok(total)
    }

    /// Move credits or prestige between a member's wallet and the clan
    /// treasury. Positive deposits, negative withdraws; both directions
    /// enforce the transfer minimum, the treasury is never driven below
    /// zero, and every connected member sees the new balances.
    pub async fn transfer_clan_credits(
        &self,
        actor: PlayerId,
        amount: i64,
        kind: CurrencyKind,
    ) -> AppResult<()> {
        if amount == i64::MIN {
            return Err(DomainError::PreconditionFailed("transfer amount out of range"));
        }
        if amount.abs() < LOCKBOX_TRANSFER_MINIMUM {
            return Err(DomainError::BelowMinimum { amount, minimum: LOCKBOX_TRANSFER_MINIMUM });
        }
        let clan = self.clan_of(actor)?;
        let player_key = OwnerKey::Player(actor);
        let clan_key = OwnerKey::Clan(clan);
        let player_handle = self.store.require(player_key)?;
        let clan_handle = self.store.require(clan_key)?;

        let committed = {
            let (mut player_state, mut clan_state) =
                lock_ordered(&player_handle, &clan_handle, player_key, clan_key);
            let profile = player_state.player()?;
            let treasury = clan_state.treasury()?;
            let wallet = match kind {
                CurrencyKind::Credits => profile.credits,
                CurrencyKind::Prestige => profile.prestige,
            };
            let pool = match kind {
                CurrencyKind::Credits => treasury.credits,
                CurrencyKind::Prestige => treasury.prestige,
            };

            let (new_wallet, new_pool) = if amount > 0 {
                if wallet < amount {
                    return Err(DomainError::InsufficientFunds { have: wallet, need: amount });
                }
                (wallet - amount, checked_deposit(pool, amount)?)
            } else {
                let need = -amount;
                if pool < need {
                    return Err(DomainError::InsufficientFunds { have: pool, need });
                }
                (checked_deposit(wallet, need)?, pool - need)
            };

            let mut tx_player = Tx::begin(&player_state);
            let mut tx_clan = Tx::begin(&clan_state);
            match kind {
                CurrencyKind::Credits => {
                    tx_player.set_player_credits(new_wallet)?;
                    tx_clan.set_clan_funds(new_pool, treasury.prestige)?;
                }
                CurrencyKind::Prestige => {
                    tx_player.set_player_prestige(new_wallet)?;
                    tx_clan.set_clan_funds(treasury.credits, new_pool)?;
                }
            }
            vec![tx_player.commit(&mut player_state), tx_clan.commit(&mut clan_state)]
        };
        self.finish(committed).await;
        Ok(())
    }

    /// Buy the next clan lockbox tab with wallet credits. Tabs unlock in
    /// order and the price is checked against the wallet here, not by the
    /// client. Returns the new tab count.
    pub async fn purchase_lockbox_tab(&self, actor: PlayerId, tab: u8) -> AppResult<u8> {
        let price = LOCKBOX_TAB_PRICES
            .iter()
            .find(|(t, _)| *t == tab)
            .map(|(_, p)| *p)
            .ok_or(DomainError::PreconditionFailed("unknown lockbox tab"))?;
        self.clan_of(actor)?;

        let handle = self.store.require(OwnerKey::Player(actor))?;
        let committed = {
            let mut state = handle.lock();
            let profile = state.player()?;
            if tab != profile.lockbox_tabs + 1 {
                return Err(DomainError::PreconditionFailed("lockbox tabs unlock in order"));
            }
            if profile.credits < price {
                return Err(DomainError::InsufficientFunds { have: profile.credits, need: price });
            }
            let new_credits = profile.credits - price;

            let mut tx = Tx::begin(&state);
            tx.set_player_credits(new_credits)?;
            tx.set_purchased_tabs(tab)?;
            vec![tx.commit(&mut state)]
        };
        self.finish(committed).await;
        Ok(tab)
    }

    /// Re-send the purchased-tab state to the player's sessions, for
    /// clients rebuilding their lockbox view.
    pub fn lockbox_tab_permissions(&self, actor: PlayerId) -> AppResult<u8> {
        let handle = self.store.require(OwnerKey::Player(actor))?;
        let tabs = {
            let state = handle.lock();
            state.player()?.lockbox_tabs
        };
        self.hub().notify_player(actor, &InventoryEvent::TabPermissions { player: actor, tabs });
        Ok(tabs)
    }
}
