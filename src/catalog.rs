use crate::models::item::ItemCategory;
use crate::models::types::{SkillId, TemplateId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Skill gate on a template: the player must have learned `skill` at
/// `level` or higher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRequirement {
    pub skill: SkillId,
    pub level: u32,
}

/// Per-template equip gates. Absent fields do not gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipRequirements {
    pub min_level: Option<u32>,
    pub max_level: Option<u32>,
    pub body: Option<u32>,
    pub mind: Option<u32>,
    pub spirit: Option<u32>,
    /// Race id the item is restricted to, if any
    pub race: Option<u32>,
    pub skill: Option<SkillRequirement>,
}

/// Static item rules resolved from a template id. Loading these from data
/// files is the embedder's concern; the engine only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTemplate {
    pub id: TemplateId,
    pub name: String,
    pub category: ItemCategory,
    pub stack_limit: u32,
    pub max_durability: u32,
    pub is_weapon: bool,
    pub requirements: EquipRequirements,
}

impl ItemTemplate {
    pub fn new(id: TemplateId, name: impl Into<String>, category: ItemCategory, stack_limit: u32) -> Self {
        Self {
            id,
            name: name.into(),
            category,
            stack_limit,
            max_durability: 100,
            is_weapon: matches!(category, ItemCategory::Weapon),
            requirements: EquipRequirements::default(),
        }
    }
}

/// Read-only template resolution. Implementations must be cheap to call;
/// the engine resolves templates inside locked sections.
pub trait ItemCatalog: Send + Sync {
    fn resolve(&self, template: TemplateId) -> Option<&ItemTemplate>;
}

/// In-memory catalog for embedding and tests.
pub struct StaticCatalog {
    templates: HashMap<TemplateId, ItemTemplate>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self { templates: HashMap::new() }
    }

    pub fn insert(&mut self, template: ItemTemplate) -> &mut Self {
        self.templates.insert(template.id, template);
        self
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<ItemTemplate> for StaticCatalog {
    fn from_iter<I: IntoIterator<Item = ItemTemplate>>(iter: I) -> Self {
        Self {
            templates: iter.into_iter().map(|t| (t.id, t)).collect(),
        }
    }
}

impl ItemCatalog for StaticCatalog {
    fn resolve(&self, template: TemplateId) -> Option<&ItemTemplate> {
        self.templates.get(&template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_inserted_templates() {
        let mut cat = StaticCatalog::new();
        cat.insert(ItemTemplate::new(TemplateId(9), "Crystal Shard", ItemCategory::Component, 20));
        assert_eq!(cat.resolve(TemplateId(9)).unwrap().stack_limit, 20);
        assert!(cat.resolve(TemplateId(10)).is_none());
    }

    #[test]
    fn weapon_flag_follows_category() {
        let t = ItemTemplate::new(TemplateId(1), "Pulse Rifle", ItemCategory::Weapon, 1);
        assert!(t.is_weapon);
        let t = ItemTemplate::new(TemplateId(2), "Ration Pack", ItemCategory::Consumable, 50);
        assert!(!t.is_weapon);
    }
}
