use crate::models::types::{ItemId, TemplateId};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Client-side inventory grid category. The personal container is
/// partitioned into one contiguous 50-slot band per category, so
/// auto-placement never mixes categories.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    Weapon,
    Armor,
    Consumable,
    Component,
    Misc,
}

/// Slots reserved per category inside the personal container.
pub const CATEGORY_BAND: u32 = 50;

impl ItemCategory {
    /// First personal slot of this category's band.
    #[inline]
    pub fn personal_base(&self) -> u32 {
        match self {
            ItemCategory::Weapon => 0,
            ItemCategory::Armor => CATEGORY_BAND,
            ItemCategory::Consumable => 2 * CATEGORY_BAND,
            ItemCategory::Component => 3 * CATEGORY_BAND,
            ItemCategory::Misc => 4 * CATEGORY_BAND,
        }
    }

    /// The personal-slot range auto-placement scans for this category.
    pub fn personal_range(&self) -> Range<u32> {
        let base = self.personal_base();
        base..base + CATEGORY_BAND
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCategory::Weapon => "weapon",
            ItemCategory::Armor => "armor",
            ItemCategory::Consumable => "consumable",
            ItemCategory::Component => "component",
            ItemCategory::Misc => "misc",
        }
    }
}

impl core::fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One physical item. The id is stable across sessions; everything else is
/// mutable only by the transaction engine while the owning container's lock
/// is held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInstance {
    /// Instance id, assigned by the persistence layer
    pub id: ItemId,

    /// Immutable template reference into the catalog
    pub template: TemplateId,

    /// Units represented by this instance
    pub stack: u32,

    /// Remaining hit points
    pub durability: u32,

    /// Cosmetic color variant
    pub color: u32,

    /// Name of the crafting player, if crafted
    pub crafter: Option<String>,

    /// Loaded rounds; only meaningful for weapon templates
    pub ammo: Option<u32>,

    /// When this instance entered the owner's possession
    pub acquired_at: chrono::DateTime<chrono::Utc>,
}

impl ItemInstance {
    /// Units that still fit on this instance given the template's limit.
    #[inline]
    pub fn spare_capacity(&self, stack_limit: u32) -> u32 {
        stack_limit.saturating_sub(self.stack)
    }

    pub fn is_crafted(&self) -> bool {
        self.crafter.is_some()
    }
}

/// Everything needed to materialize a fresh instance, minus the id (the
/// registry assigns one at creation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSpec {
    pub template: TemplateId,
    pub stack: u32,
    pub color: u32,
    pub crafter: Option<String>,
    pub ammo: Option<u32>,
}

impl ItemSpec {
    pub fn new(template: TemplateId, stack: u32) -> Self {
        Self {
            template,
            stack,
            color: 0,
            crafter: None,
            ammo: None,
        }
    }

    pub fn with_crafter(mut self, crafter: impl Into<String>) -> Self {
        self.crafter = Some(crafter.into());
        self
    }
}
