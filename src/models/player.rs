use crate::models::types::{ClanId, PlayerId, SkillId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Core attribute block used by equip requirement checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub body: u32,
    pub mind: u32,
    pub spirit: u32,
}

/// The engine-visible slice of a player: requirement inputs, container
/// gating state and currency ledgers. Everything here mutates only under the
/// player's owner lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub id: PlayerId,
    pub level: u32,
    pub race: u32,
    pub attributes: Attributes,
    pub skills: HashMap<SkillId, u32>,

    /// Weapon-drawer index currently selected as the active weapon
    pub active_weapon_slot: u32,
    /// True while the active weapon is drawn
    pub weapon_ready: bool,

    pub clan: Option<ClanId>,

    /// Lockbox tabs unlocked so far (tab 1 is free, 5 max)
    pub lockbox_tabs: u8,

    pub credits: i64,
    pub prestige: i64,
    pub lockbox_credits: i64,
}

impl PlayerProfile {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            level: 1,
            race: 0,
            attributes: Attributes::default(),
            skills: HashMap::new(),
            active_weapon_slot: 0,
            weapon_ready: false,
            clan: None,
            lockbox_tabs: 1,
            credits: 0,
            prestige: 0,
            lockbox_credits: 0,
        }
    }

    pub fn skill_level(&self, skill: SkillId) -> Option<u32> {
        self.skills.get(&skill).copied()
    }

    /// Usable slot count of the shared lockbox from this player's
    /// perspective (100 slots per unlocked tab).
    #[inline]
    pub fn unlocked_lockbox_slots(&self) -> u32 {
        u32::from(self.lockbox_tabs) * 100
    }
}

/// Scalar ledgers of a clan. Balances never go negative; withdrawals are
/// rejected before commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClanTreasury {
    pub id: ClanId,
    pub credits: i64,
    pub prestige: i64,
}

impl ClanTreasury {
    pub fn new(id: ClanId) -> Self {
        Self {
            id,
            credits: 0,
            prestige: 0,
        }
    }
}

/// Which clan ledger a treasury transfer touches.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrencyKind {
    Credits,
    Prestige,
}

impl CurrencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurrencyKind::Credits => "credits",
            CurrencyKind::Prestige => "prestige",
        }
    }
}

impl core::fmt::Display for CurrencyKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
