// ═══════════════════════════════════════════════════════════════════════
// Rules configuration — storage cap, costs, unit and building tables
//
// The core consumes these values; it never owns them. A builtin table
// ships with the crate and can be replaced by a JSON file at startup.
// ═══════════════════════════════════════════════════════════════════════

use crate::types::{ResourceKind, ResourceMap};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use std::{fs, io};
use thiserror::Error;

pub const BUILTIN_RULES_CONFIG: &str = include_str!("data/rules.json");

/// Static definition of a unit type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDefinition {
    pub code: String,
    pub attack: i32,
    pub defence: i32,
    pub ranged: bool,
    pub range_min: u32,
    pub range_max: u32,
    pub move_points: u32,
    pub max_hp: i32,
    pub cost: ResourceMap,
    /// Only spawnable types may be produced by cities.
    #[serde(default = "default_true")]
    pub spawnable: bool,
}

impl UnitDefinition {
    /// Attack range as (min, max). Melee units always strike at exactly 1.
    pub fn attack_range(&self) -> (u32, u32) {
        if self.ranged {
            (self.range_min, self.range_max)
        } else {
            (1, 1)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingDefinition {
    pub code: String,
    pub cost: ResourceMap,
    #[serde(default)]
    pub defence_bonus: i32,
    #[serde(default)]
    pub max_hp_bonus: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CityRules {
    pub base_defence: i32,
    pub max_hp: i32,
}

impl Default for CityRules {
    fn default() -> Self {
        CityRules { base_defence: 10, max_hp: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionRules {
    pub base_cost: u32,
    pub per_tile_cost: u32,
    pub initial_tile_count: u32,
}

impl Default for ExpansionRules {
    fn default() -> Self {
        ExpansionRules { base_cost: 20, per_tile_cost: 10, initial_tile_count: 7 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default = "default_storage_cap")]
    pub storage_cap: u32,
    #[serde(default = "default_harvest_yield")]
    pub harvest_yield: u32,
    #[serde(default)]
    pub resource_regen_per_turn: u32,
    #[serde(default)]
    pub city: CityRules,
    #[serde(default)]
    pub expansion: ExpansionRules,
    pub units: Vec<UnitDefinition>,
    pub buildings: Vec<BuildingDefinition>,
    /// Unit type every participant starts with.
    pub starting_unit: String,
    #[serde(default = "default_ai_budget")]
    pub ai_turn_budget_ms: u64,
    #[serde(default = "default_ai_actions")]
    pub ai_max_actions_per_turn: u32,
    #[serde(default = "default_ttl")]
    pub idempotency_ttl_secs: u64,
}

fn default_true() -> bool { true }
fn default_storage_cap() -> u32 { 100 }
fn default_harvest_yield() -> u32 { 1 }
fn default_ai_budget() -> u64 { 2_000 }
fn default_ai_actions() -> u32 { 64 }
fn default_ttl() -> u64 { 600 }

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse rules config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read rules config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid rules config: {0}")]
    Invalid(String),
}

impl RulesConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_RULES_CONFIG)
                .expect("builtin rules config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: RulesConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        RulesConfig::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_cap == 0 {
            return Err(ConfigError::Invalid("storage_cap must be positive".into()));
        }
        let mut seen = HashSet::new();
        for unit in &self.units {
            if !seen.insert(unit.code.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate unit code '{}'", unit.code)));
            }
            if unit.ranged && (unit.range_min == 0 || unit.range_min > unit.range_max) {
                return Err(ConfigError::Invalid(format!(
                    "unit '{}' has invalid range {}..={}",
                    unit.code, unit.range_min, unit.range_max
                )));
            }
            if unit.max_hp <= 0 {
                return Err(ConfigError::Invalid(format!("unit '{}' needs positive max_hp", unit.code)));
            }
        }
        let mut seen = HashSet::new();
        for building in &self.buildings {
            if !seen.insert(building.code.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate building code '{}'",
                    building.code
                )));
            }
        }
        if self.unit(&self.starting_unit).is_none() {
            return Err(ConfigError::Invalid(format!(
                "starting unit '{}' is not defined",
                self.starting_unit
            )));
        }
        Ok(())
    }

    pub fn unit(&self, code: &str) -> Option<&UnitDefinition> {
        self.units.iter().find(|u| u.code == code)
    }

    pub fn building(&self, code: &str) -> Option<&BuildingDefinition> {
        self.buildings.iter().find(|b| b.code == code)
    }

    /// Wheat needed for a city that currently owns `owned_tiles`.
    pub fn expansion_cost(&self, owned_tiles: u32) -> u32 {
        let extra = owned_tiles.saturating_sub(self.expansion.initial_tile_count);
        self.expansion.base_cost + extra * self.expansion.per_tile_cost
    }

    /// Resource used to pay for territory expansion.
    pub fn expansion_resource(&self) -> ResourceKind {
        ResourceKind::Wheat
    }

    pub fn ai_turn_budget(&self) -> Duration {
        Duration::from_millis(self.ai_turn_budget_ms)
    }

    pub fn idempotency_ttl(&self) -> Duration {
        Duration::from_secs(self.idempotency_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_is_valid() {
        let rules = RulesConfig::builtin();
        rules.validate().unwrap();
        assert_eq!(rules.storage_cap, 100);
        assert_eq!(rules.city.base_defence, 10);
        let warrior = rules.unit("warrior").unwrap();
        assert_eq!(warrior.cost.get(&ResourceKind::Iron), Some(&10));
        assert_eq!(warrior.attack_range(), (1, 1));
        assert_eq!(rules.building("walls").unwrap().defence_bonus, 10);
    }

    #[test]
    fn expansion_cost_formula() {
        let rules = RulesConfig::builtin();
        assert_eq!(rules.expansion_cost(5), 20);
        assert_eq!(rules.expansion_cost(7), 20);
        assert_eq!(rules.expansion_cost(10), 50);
    }

    #[test]
    fn rejects_duplicate_codes_and_bad_ranges() {
        let mut rules = (*RulesConfig::builtin()).clone();
        rules.units.push(rules.units[0].clone());
        assert!(matches!(rules.validate(), Err(ConfigError::Invalid(_))));

        let mut rules = (*RulesConfig::builtin()).clone();
        let archer = rules.units.iter_mut().find(|u| u.ranged).unwrap();
        archer.range_min = 5;
        archer.range_max = 2;
        assert!(matches!(rules.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let json = r#"{
            "units": [{ "code": "scout", "attack": 1, "defence": 1, "ranged": false,
                        "range_min": 1, "range_max": 1, "move_points": 4, "max_hp": 5,
                        "cost": { "wheat": 3 } }],
            "buildings": [],
            "starting_unit": "scout"
        }"#;
        let rules = RulesConfig::from_json_str(json).unwrap();
        assert_eq!(rules.storage_cap, 100);
        assert_eq!(rules.expansion.per_tile_cost, 10);
        assert!(rules.unit("scout").unwrap().spawnable);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = RulesConfig::from_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed { .. }));
    }
}
