//! Load tiers and the data each tier produces.
//!
//! The essential tier is deliberately tiny so the UI becomes usable in
//! well under a second; the analysis tier holds the tens of megabytes
//! only deep inventory and build analysis need.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::definition::{Definition, DefinitionTable};

pub const STAT_DEFINITIONS: &str = "DestinyStatDefinition";
pub const DAMAGE_TYPE_DEFINITIONS: &str = "DestinyDamageTypeDefinition";
pub const CLASS_DEFINITIONS: &str = "DestinyClassDefinition";
pub const ENERGY_TYPE_DEFINITIONS: &str = "DestinyEnergyTypeDefinition";

pub const ITEM_DEFINITIONS: &str = "DestinyInventoryItemDefinition";
pub const PERK_DEFINITIONS: &str = "DestinySandboxPerkDefinition";
pub const PLUG_SET_DEFINITIONS: &str = "DestinyPlugSetDefinition";
pub const SOCKET_TYPE_DEFINITIONS: &str = "DestinySocketTypeDefinition";

/// A named group of tables fetched together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadTier {
    Essential,
    Analysis,
}

impl LoadTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadTier::Essential => "essential",
            LoadTier::Analysis => "analysis",
        }
    }
}

impl fmt::Display for LoadTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tables make up each tier.
///
/// Chunking loads the item table on demand whether or not a tier lists it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierConfig {
    pub essential: Vec<String>,
    pub analysis: Vec<String>,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            essential: [
                STAT_DEFINITIONS,
                DAMAGE_TYPE_DEFINITIONS,
                CLASS_DEFINITIONS,
                ENERGY_TYPE_DEFINITIONS,
            ]
            .map(String::from)
            .to_vec(),
            analysis: [
                ITEM_DEFINITIONS,
                PERK_DEFINITIONS,
                PLUG_SET_DEFINITIONS,
                SOCKET_TYPE_DEFINITIONS,
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

impl TierConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn essential<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.essential = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn analysis<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.analysis = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn tables(&self, tier: LoadTier) -> &[String] {
        match tier {
            LoadTier::Essential => &self.essential,
            LoadTier::Analysis => &self.analysis,
        }
    }
}

/// The tables of one tier, each present (possibly empty).
#[derive(Debug, Clone, Default)]
pub struct TierTables {
    tables: HashMap<String, Arc<DefinitionTable>>,
    failed: Vec<String>,
}

impl TierTables {
    pub(crate) fn new(tables: HashMap<String, Arc<DefinitionTable>>, failed: Vec<String>) -> Self {
        Self { tables, failed }
    }

    /// Table by name. Tables that failed to load are present and empty.
    pub fn table(&self, name: &str) -> Option<&Arc<DefinitionTable>> {
        self.tables.get(name)
    }

    /// Look up one definition.
    pub fn definition(&self, table: &str, hash: u32) -> Option<&Arc<Definition>> {
        self.tables.get(table).and_then(|t| t.get(hash))
    }

    /// Names of tables that failed and were replaced by empty ones.
    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn named(&self, name: &str) -> Arc<DefinitionTable> {
        self.tables
            .get(name)
            .cloned()
            .unwrap_or_else(|| Arc::new(DefinitionTable::empty(name)))
    }
}

/// Small tables the UI needs before it can render anything.
#[derive(Debug, Clone, Default)]
pub struct EssentialData {
    pub tables: TierTables,
}

impl EssentialData {
    pub fn stats(&self) -> Arc<DefinitionTable> {
        self.tables.named(STAT_DEFINITIONS)
    }

    pub fn damage_types(&self) -> Arc<DefinitionTable> {
        self.tables.named(DAMAGE_TYPE_DEFINITIONS)
    }

    pub fn classes(&self) -> Arc<DefinitionTable> {
        self.tables.named(CLASS_DEFINITIONS)
    }

    pub fn energy_types(&self) -> Arc<DefinitionTable> {
        self.tables.named(ENERGY_TYPE_DEFINITIONS)
    }
}

/// Large tables for inventory and build analysis. May be all empty.
#[derive(Debug, Clone, Default)]
pub struct AnalysisData {
    pub tables: TierTables,
}

impl AnalysisData {
    pub fn items(&self) -> Arc<DefinitionTable> {
        self.tables.named(ITEM_DEFINITIONS)
    }

    pub fn perks(&self) -> Arc<DefinitionTable> {
        self.tables.named(PERK_DEFINITIONS)
    }

    pub fn plug_sets(&self) -> Arc<DefinitionTable> {
        self.tables.named(PLUG_SET_DEFINITIONS)
    }

    pub fn socket_types(&self) -> Arc<DefinitionTable> {
        self.tables.named(SOCKET_TYPE_DEFINITIONS)
    }

    /// True when nothing at all was loaded.
    pub fn is_empty(&self) -> bool {
        self.tables.tables.values().all(|t| t.is_empty())
    }
}
