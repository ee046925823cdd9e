// ═══════════════════════════════════════════════════════════════════════
// City economy — harvest, spawn, build, expand
//
// Spawn/build/expand are split in two halves: `plan_*` validates against
// an immutable view of the state and returns a fully-resolved plan,
// `commit_*` applies that plan and cannot fail. The mutator only commits
// after every check has passed.
// ═══════════════════════════════════════════════════════════════════════

use crate::config::RulesConfig;
use crate::error::ActionError;
use crate::grid::{neighbors, Position};
use crate::types::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ── Harvest ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestReport {
    pub harvested: ResourceMap,
    pub overflow: ResourceMap,
}

impl HarvestReport {
    pub fn absorb(&mut self, other: HarvestReport) {
        for (kind, n) in other.harvested {
            *self.harvested.entry(kind).or_insert(0) += n;
        }
        for (kind, n) in other.overflow {
            *self.overflow.entry(kind).or_insert(0) += n;
        }
    }

    fn add(map: &mut ResourceMap, kind: ResourceKind, n: u32) {
        if n > 0 {
            *map.entry(kind).or_insert(0) += n;
        }
    }
}

/// Collect from every resource tile in one city's territory.
///
/// Tiles under an enemy unit are skipped. When the city's stock for a
/// resource is already at the storage cap the yield counts as overflow
/// and neither the tile nor the stock changes.
pub fn harvest_city(state: &mut GameState, city_id: CityId, rules: &RulesConfig) -> HarvestReport {
    let mut report = HarvestReport::default();
    let Some(city) = state.cities.get(&city_id) else {
        return report;
    };
    let owner = city.owner;
    let territory: Vec<TileId> = city.territory.iter().copied().collect();
    let cap = rules.storage_cap;

    for tile_id in territory {
        let Some(tile) = state.map.tile(tile_id) else { continue };
        let Some(resource) = tile.resource else { continue };
        if resource.amount == 0 || state.enemy_unit_at(tile.position, owner) {
            continue;
        }

        let kind = resource.kind;
        let taken = rules.harvest_yield.min(resource.amount);
        let stock = state.cities.get(&city_id).map_or(0, |c| c.stock_of(kind));
        if stock >= cap {
            HarvestReport::add(&mut report.overflow, kind, taken);
            continue;
        }

        let gained = taken.min(cap - stock);
        if let Some(city) = state.cities.get_mut(&city_id) {
            *city.stock.entry(kind).or_insert(0) += gained;
        }
        if let Some(res) = state.map.tile_mut(tile_id).and_then(|t| t.resource.as_mut()) {
            res.amount -= taken;
        }
        HarvestReport::add(&mut report.harvested, kind, gained);
        HarvestReport::add(&mut report.overflow, kind, taken - gained);
    }

    debug!(city = city_id.0, harvested = ?report.harvested, overflow = ?report.overflow, "harvest");
    report
}

/// Harvest every city owned by `owner`, in city id order.
pub fn harvest_participant(state: &mut GameState, owner: ParticipantId, rules: &RulesConfig) -> HarvestReport {
    let cities: Vec<CityId> = state.cities_of(owner).map(|c| c.id).collect();
    let mut total = HarvestReport::default();
    for id in cities {
        total.absorb(harvest_city(state, id, rules));
    }
    total
}

/// Let depleted resource tiles grow back toward their capacity.
pub fn regenerate_resources(state: &mut GameState, rules: &RulesConfig) {
    if rules.resource_regen_per_turn == 0 {
        return;
    }
    for tile in &mut state.map.tiles {
        if let Some(res) = &mut tile.resource {
            res.amount = (res.amount + rules.resource_regen_per_turn).min(res.capacity);
        }
    }
}

// ── Shared checks ──────────────────────────────────────────────────────

/// Fails on the first resource (in kind order) the city cannot cover.
pub fn check_affordable(city: &City, cost: &ResourceMap) -> Result<(), ActionError> {
    for (&resource, &required) in cost {
        let current = city.stock_of(resource);
        if current < required {
            return Err(ActionError::InsufficientResources { resource, required, current });
        }
    }
    Ok(())
}

fn deduct(city: &mut City, cost: &ResourceMap) {
    for (kind, amount) in cost {
        let entry = city.stock.entry(*kind).or_insert(0);
        *entry = entry.saturating_sub(*amount);
    }
}

/// The city tile first, then its neighbors clockwise from East: the first
/// in-bounds, non-water, unoccupied candidate.
pub fn spawn_position(state: &GameState, origin: Position) -> Option<Position> {
    std::iter::once(origin)
        .chain(neighbors(origin))
        .find(|p| state.map.is_passable(*p) && !state.is_occupied(*p))
}

// ── Spawn ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnPlan {
    pub city_id: CityId,
    pub owner: ParticipantId,
    pub unit_type: String,
    pub cost: ResourceMap,
    pub position: Position,
    pub hp: i32,
}

pub fn plan_spawn(state: &GameState, city: &City, unit_type: &str, rules: &RulesConfig) -> Result<SpawnPlan, ActionError> {
    let def = rules.unit(unit_type)
        .filter(|d| d.spawnable)
        .ok_or_else(|| ActionError::InvalidUnitType(unit_type.to_string()))?;
    check_affordable(city, &def.cost)?;
    let position = spawn_position(state, city.position).ok_or(ActionError::SpawnBlocked)?;
    Ok(SpawnPlan {
        city_id: city.id,
        owner: city.owner,
        unit_type: def.code.clone(),
        cost: def.cost.clone(),
        position,
        hp: def.max_hp,
    })
}

pub fn commit_spawn(state: &mut GameState, plan: SpawnPlan) -> UnitId {
    let id = state.allocate_unit_id();
    if let Some(city) = state.cities.get_mut(&plan.city_id) {
        deduct(city, &plan.cost);
        city.has_acted_this_turn = true;
    }
    state.units.insert(id, Unit {
        id,
        owner: plan.owner,
        unit_type: plan.unit_type,
        position: plan.position,
        hp: plan.hp,
        // Fresh units wait for their owner's next turn.
        has_acted: true,
    });
    id
}

// ── Build ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub city_id: CityId,
    pub building: String,
    pub cost: ResourceMap,
    pub defence_bonus: i32,
    pub max_hp_bonus: i32,
}

pub fn plan_build(city: &City, building: &str, rules: &RulesConfig) -> Result<BuildPlan, ActionError> {
    let def = rules.building(building)
        .ok_or_else(|| ActionError::InvalidInput(format!("unknown building '{building}'")))?;
    if city.buildings.contains(&def.code) {
        return Err(ActionError::BuildingAlreadyExists(def.code.clone()));
    }
    check_affordable(city, &def.cost)?;
    Ok(BuildPlan {
        city_id: city.id,
        building: def.code.clone(),
        cost: def.cost.clone(),
        defence_bonus: def.defence_bonus,
        max_hp_bonus: def.max_hp_bonus,
    })
}

pub fn commit_build(state: &mut GameState, plan: BuildPlan) {
    if let Some(city) = state.cities.get_mut(&plan.city_id) {
        deduct(city, &plan.cost);
        city.buildings.insert(plan.building);
        city.defence_bonus += plan.defence_bonus;
        city.max_hp += plan.max_hp_bonus;
        city.hp += plan.max_hp_bonus;
        city.has_acted_this_turn = true;
    }
}

// ── Expand ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandPlan {
    pub city_id: CityId,
    pub tile: TileId,
    pub resource: ResourceKind,
    pub cost: u32,
}

pub fn plan_expand(state: &GameState, city: &City, target: TileId, rules: &RulesConfig) -> Result<ExpandPlan, ActionError> {
    let tile = state.map.tile(target)
        .ok_or_else(|| ActionError::InvalidInput(format!("tile {} is off the map", target.0)))?;

    if let Some(holder) = state.city_owning_tile(target) {
        if holder.owner == city.owner {
            return Err(ActionError::InvalidTarget(format!("tile {} is already owned", target.0)));
        }
        return Err(ActionError::TileOwnedByEnemy);
    }
    if !tile.terrain.is_passable() {
        return Err(ActionError::InvalidTerrain);
    }

    let adjacent = neighbors(tile.position).into_iter()
        .filter_map(|p| state.map.tile_id(p))
        .any(|id| city.owns_tile(id));
    if !adjacent {
        return Err(ActionError::TileNotAdjacent);
    }
    if state.enemy_unit_at(tile.position, city.owner) {
        return Err(ActionError::TileOccupiedByEnemy);
    }

    let resource = rules.expansion_resource();
    let cost = rules.expansion_cost(city.territory.len() as u32);
    let current = city.stock_of(resource);
    if current < cost {
        return Err(ActionError::InsufficientResources { resource, required: cost, current });
    }

    Ok(ExpandPlan { city_id: city.id, tile: target, resource, cost })
}

pub fn commit_expand(state: &mut GameState, plan: ExpandPlan) {
    if let Some(city) = state.cities.get_mut(&plan.city_id) {
        let mut cost = ResourceMap::new();
        cost.insert(plan.resource, plan.cost);
        deduct(city, &cost);
        city.territory.insert(plan.tile);
        city.has_acted_this_turn = true;
    }
}
