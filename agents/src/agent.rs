// ═══════════════════════════════════════════════════════════════════════
// Agent Trait — interface that all AI agents must implement
//
// KEY DESIGN PRINCIPLE:
//   Agents receive an `AgentView` (a projected snapshot, never the live
//   GameState) and answer with at most one `Command` per call. Every
//   command goes through the engine's validator like a human's would,
//   so an agent cannot break the rules even when it is wrong about them.
//
//   The caller keeps calling `decide` until it returns `None`. Actors
//   whose command was rejected are put in `tried` and skipped from then
//   on, so the loop always terminates.
// ═══════════════════════════════════════════════════════════════════════

use hexrule_engine::config::{BuildingDefinition, RulesConfig, UnitDefinition};
use hexrule_engine::grid::{distance, in_range, neighbors, Position};
use hexrule_engine::projection::{CityView, StateSnapshot, UnitView};
use hexrule_engine::types::*;
use std::collections::BTreeSet;
use std::sync::Arc;

/// What an agent is allowed to look at while deciding.
#[derive(Debug, Clone)]
pub struct AgentView {
    pub viewer: ParticipantId,
    pub snapshot: StateSnapshot,
    pub rules: Arc<RulesConfig>,
    /// Actors whose last command was rejected this turn.
    pub tried: BTreeSet<ActorRef>,
}

/// Something a unit can attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackTarget {
    Unit(UnitId),
    City(CityId),
}

impl AttackTarget {
    pub fn command(self, attacker: UnitId) -> Command {
        match self {
            AttackTarget::Unit(target) => Command::AttackUnit { attacker, target },
            AttackTarget::City(target_city) => Command::AttackCity { attacker, target_city },
        }
    }
}

impl AgentView {
    pub fn new(viewer: ParticipantId, snapshot: StateSnapshot, rules: Arc<RulesConfig>) -> Self {
        AgentView { viewer, snapshot, rules, tried: BTreeSet::new() }
    }

    // ── Actors ─────────────────────────────────────────────────────────

    /// Own cities that can still act and have not been tried.
    pub fn ready_cities(&self) -> impl Iterator<Item = &CityView> {
        self.snapshot.cities_of(self.viewer)
            .filter(|c| !c.has_acted_this_turn && !self.tried.contains(&ActorRef::City(c.id)))
    }

    /// Own units that can still act and have not been tried.
    pub fn ready_units(&self) -> impl Iterator<Item = &UnitView> {
        self.snapshot.units_of(self.viewer)
            .filter(|u| !u.has_acted && !self.tried.contains(&ActorRef::Unit(u.id)))
    }

    pub fn enemy_units(&self) -> impl Iterator<Item = &UnitView> {
        self.snapshot.units.iter().filter(|u| u.owner != self.viewer)
    }

    pub fn enemy_cities(&self) -> impl Iterator<Item = &CityView> {
        self.snapshot.cities.iter().filter(|c| c.owner != self.viewer)
    }

    pub fn city_at(&self, pos: Position) -> Option<&CityView> {
        self.snapshot.cities.iter().find(|c| c.position == pos)
    }

    pub fn unit_def(&self, unit: &UnitView) -> Option<&UnitDefinition> {
        self.rules.unit(&unit.unit_type)
    }

    // ── Unit options ───────────────────────────────────────────────────

    /// Tiles the unit could move to this turn, nearest first.
    pub fn move_options(&self, unit: &UnitView) -> Vec<Position> {
        let Some(def) = self.unit_def(unit) else { return Vec::new() };
        let blocked = |p: Position| {
            !self.snapshot.is_passable(p)
                || self.snapshot.unit_at(p).is_some()
                || self.city_at(p).map_or(false, |c| c.owner != self.viewer)
        };
        self.snapshot.grid()
            .reachable(unit.position, def.move_points, blocked)
            .into_iter()
            .map(|(p, _)| p)
            .collect()
    }

    /// Enemy units and cities inside the unit's strike range.
    pub fn attack_options(&self, unit: &UnitView) -> Vec<AttackTarget> {
        let Some(def) = self.unit_def(unit) else { return Vec::new() };
        let (min, max) = def.attack_range();
        let units = self.enemy_units()
            .filter(|e| in_range(unit.position, e.position, min, max))
            .map(|e| AttackTarget::Unit(e.id));
        let cities = self.enemy_cities()
            .filter(|c| in_range(unit.position, c.position, min, max))
            .map(|c| AttackTarget::City(c.id));
        units.chain(cities).collect()
    }

    /// Distance from `pos` to the nearest enemy unit or city.
    pub fn distance_to_enemy(&self, pos: Position) -> Option<u32> {
        self.enemy_units().map(|u| u.position)
            .chain(self.enemy_cities().map(|c| c.position))
            .map(|p| distance(pos, p))
            .min()
    }

    // ── City options ───────────────────────────────────────────────────

    fn can_afford(city: &CityView, cost: &ResourceMap) -> bool {
        cost.iter().all(|(kind, n)| city.stock.get(kind).copied().unwrap_or(0) >= *n)
    }

    /// A spawned unit would find a free tile.
    pub fn can_place_unit(&self, city: &CityView) -> bool {
        std::iter::once(city.position)
            .chain(neighbors(city.position))
            .any(|p| self.snapshot.is_passable(p) && self.snapshot.unit_at(p).is_none())
    }

    pub fn affordable_units(&self, city: &CityView) -> Vec<&UnitDefinition> {
        self.rules.units.iter()
            .filter(|u| u.spawnable && Self::can_afford(city, &u.cost))
            .collect()
    }

    pub fn affordable_buildings(&self, city: &CityView) -> Vec<&BuildingDefinition> {
        self.rules.buildings.iter()
            .filter(|b| !city.buildings.contains(&b.code) && Self::can_afford(city, &b.cost))
            .collect()
    }

    /// Unowned land tiles next to the city's territory, free of enemy
    /// units, when the city can pay for the next expansion.
    pub fn expansion_options(&self, city: &CityView) -> Vec<TileId> {
        let wheat = city.stock.get(&self.rules.expansion_resource()).copied().unwrap_or(0);
        if wheat < city.expansion_cost {
            return Vec::new();
        }
        let owned: BTreeSet<TileId> = city.territory.iter().copied().collect();
        let mut options = BTreeSet::new();
        for id in &owned {
            let Some(tile) = self.snapshot.tiles.get(id.0 as usize) else { continue };
            for pos in neighbors(tile.position) {
                let Some(next) = self.snapshot.tile_at(pos) else { continue };
                let enemy_here = self.snapshot.unit_at(pos).map_or(false, |u| u.owner != self.viewer);
                if next.owner_city.is_none() && next.terrain.is_passable() && !enemy_here {
                    options.insert(next.id);
                }
            }
        }
        options.into_iter().collect()
    }
}

/// Trait that all AI agents must implement.
pub trait Agent: Send + Sync {
    /// Human-readable name for this agent (e.g., "Random", "Heuristic").
    fn name(&self) -> &str;

    /// The seat this agent is playing.
    fn participant(&self) -> ParticipantId;

    /// Next command to issue, or `None` when the agent is done for the
    /// turn. Cities act before units, both in id order.
    fn decide(&mut self, view: &AgentView) -> Option<Command> {
        let cities: Vec<CityId> = view.ready_cities().map(|c| c.id).collect();
        for id in cities {
            if let Some(cmd) = self.choose_city_action(view, id) {
                return Some(cmd);
            }
        }
        let units: Vec<UnitId> = view.ready_units().map(|u| u.id).collect();
        for id in units {
            if let Some(cmd) = self.choose_unit_action(view, id) {
                return Some(cmd);
            }
        }
        None
    }

    // ── Individual decision methods ────────────────────────────────────

    /// Spawn, build or expand with this city. `None` = leave it idle.
    fn choose_city_action(&mut self, view: &AgentView, city: CityId) -> Option<Command>;

    /// Move or attack with this unit. `None` = leave it idle.
    fn choose_unit_action(&mut self, view: &AgentView, unit: UnitId) -> Option<Command>;
}
