//! Category-filtered views over the item definition table.
//!
//! An item is classified by its numeric `itemType` and its
//! `itemCategoryHashes` tags. Matching is an OR over both fields per
//! category, and categories are not exclusive: an item may land in more
//! than one chunk.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::definition::{Definition, DefinitionTable};
use crate::CryptarchError;

/// Item chunk categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemCategory {
    Weapons,
    Armor,
    Consumables,
    Cosmetics,
}

impl ItemCategory {
    pub const ALL: [ItemCategory; 4] = [
        ItemCategory::Weapons,
        ItemCategory::Armor,
        ItemCategory::Consumables,
        ItemCategory::Cosmetics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCategory::Weapons => "weapons",
            ItemCategory::Armor => "armor",
            ItemCategory::Consumables => "consumables",
            ItemCategory::Cosmetics => "cosmetics",
        }
    }

    fn rule(&self) -> &'static ChunkRule {
        match self {
            ItemCategory::Weapons => &WEAPONS,
            ItemCategory::Armor => &ARMOR,
            ItemCategory::Consumables => &CONSUMABLES,
            ItemCategory::Cosmetics => &COSMETICS,
        }
    }

    /// Whether `definition` belongs to this category.
    pub fn matches(&self, definition: &Definition) -> bool {
        self.rule().matches(definition)
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemCategory {
    type Err = CryptarchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CryptarchError::InvalidCategory(s.to_owned()))
    }
}

struct ChunkRule {
    item_types: &'static [i64],
    category_hashes: &'static [u32],
}

impl ChunkRule {
    fn matches(&self, definition: &Definition) -> bool {
        definition
            .item_type
            .is_some_and(|t| self.item_types.contains(&t))
            || definition
                .item_category_hashes
                .iter()
                .any(|h| self.category_hashes.contains(h))
    }
}

// itemType: 2 armor, 3 weapon, 9 consumable, 14 emblem, 21 ship,
// 22 vehicle, 23 emote, 24 ghost, 29 finisher.
static WEAPONS: ChunkRule = ChunkRule {
    item_types: &[3],
    category_hashes: &[1],
};
static ARMOR: ChunkRule = ChunkRule {
    item_types: &[2],
    category_hashes: &[20],
};
static CONSUMABLES: ChunkRule = ChunkRule {
    item_types: &[9],
    category_hashes: &[35],
};
static COSMETICS: ChunkRule = ChunkRule {
    item_types: &[14, 21, 22, 23, 24, 29],
    category_hashes: &[19, 39, 42, 43, 44],
};

/// The slice of the item table belonging to one category.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemChunk {
    category: ItemCategory,
    entries: HashMap<u32, Arc<Definition>>,
}

impl ItemChunk {
    /// Scan `items` once and keep the entries matching `category`.
    pub fn derive(category: ItemCategory, items: &DefinitionTable) -> Self {
        let entries = items
            .iter()
            .filter(|(_, def)| category.matches(def))
            .map(|(hash, def)| (*hash, Arc::clone(def)))
            .collect();
        Self { category, entries }
    }

    pub fn category(&self) -> ItemCategory {
        self.category
    }

    pub fn get(&self, hash: u32) -> Option<&Arc<Definition>> {
        self.entries.get(&hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &Arc<Definition>)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(item_type: Option<i64>, categories: &[u32]) -> Definition {
        Definition {
            item_type,
            item_category_hashes: categories.to_vec(),
            ..Definition::default()
        }
    }

    fn table(items: Vec<(u32, Definition)>) -> DefinitionTable {
        DefinitionTable::new(
            "DestinyInventoryItemDefinition",
            items.into_iter().map(|(h, d)| (h, Arc::new(d))).collect(),
        )
    }

    #[test]
    fn parses_category_names() {
        assert_eq!("weapons".parse::<ItemCategory>().unwrap(), ItemCategory::Weapons);
        assert_eq!(" Armor ".parse::<ItemCategory>().unwrap(), ItemCategory::Armor);
        let err = "emotes".parse::<ItemCategory>().unwrap_err();
        assert_eq!(err, CryptarchError::InvalidCategory("emotes".into()));
    }

    #[test]
    fn matches_by_type_or_tag() {
        assert!(ItemCategory::Weapons.matches(&item(Some(3), &[])));
        assert!(ItemCategory::Weapons.matches(&item(None, &[1, 2])));
        assert!(!ItemCategory::Weapons.matches(&item(Some(2), &[20])));
        assert!(!ItemCategory::Consumables.matches(&item(None, &[])));
    }

    #[test]
    fn an_item_may_match_several_categories() {
        // A ghost shell: cosmetic by type, armor by tag.
        let ghost = item(Some(24), &[20, 39]);
        let matched: Vec<_> = ItemCategory::ALL
            .into_iter()
            .filter(|c| c.matches(&ghost))
            .collect();
        assert_eq!(matched, vec![ItemCategory::Armor, ItemCategory::Cosmetics]);
    }

    #[test]
    fn derive_filters_table() {
        let items = table(vec![
            (1, item(Some(3), &[1])),
            (2, item(Some(2), &[20])),
            (3, item(Some(9), &[35])),
            (4, item(None, &[1])),
        ]);
        let weapons = ItemChunk::derive(ItemCategory::Weapons, &items);
        assert_eq!(weapons.len(), 2);
        assert!(weapons.get(1).is_some());
        assert!(weapons.get(4).is_some());
        assert_eq!(weapons.category(), ItemCategory::Weapons);

        let derived_again = ItemChunk::derive(ItemCategory::Weapons, &items);
        assert_eq!(weapons, derived_again);
    }
}
