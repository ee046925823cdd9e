// ═══════════════════════════════════════════════════════════════════════
// Action validator & mutator — the single entry point for commands
//
// Every command goes through the same pipeline:
//   1. idempotent replay      (external path only)
//   2. game / turn / guard    (guard check on the external path only)
//   3. actor + ownership + per-turn flag
//   4. command preconditions  → a fully-resolved `Mutation`
//   5. commit                 (infallible, one step)
//   6. cache + project        (cache on the external path only)
//
// Steps 1–4 only read the state, so a rejection leaves it untouched.
// ═══════════════════════════════════════════════════════════════════════

use crate::combat::{self, AttackOutcome, Combatant};
use crate::config::{RulesConfig, UnitDefinition};
use crate::economy::{self, BuildPlan, ExpandPlan, SpawnPlan};
use crate::error::ActionError;
use crate::grid::{distance, Position};
use crate::idempotency::IdempotencyCache;
use crate::projection::{project, StateSnapshot};
use crate::turn::{TurnGuard, TurnSummary};
use crate::types::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// What a successful command returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Response {
    Snapshot(StateSnapshot),
    TurnEnded { snapshot: StateSnapshot, summary: TurnSummary },
}

impl Response {
    pub fn snapshot(&self) -> &StateSnapshot {
        match self {
            Response::Snapshot(s) => s,
            Response::TurnEnded { snapshot, .. } => snapshot,
        }
    }

    pub fn summary(&self) -> Option<&TurnSummary> {
        match self {
            Response::Snapshot(_) => None,
            Response::TurnEnded { summary, .. } => Some(summary),
        }
    }
}

/// A validated change, ready to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Mutation {
    Move { unit: UnitId, to: Position },
    AttackUnit { attacker: UnitId, target: UnitId, outcome: AttackOutcome },
    AttackCity { attacker: UnitId, city: CityId, outcome: AttackOutcome },
    Spawn(SpawnPlan),
    Build(BuildPlan),
    Expand(ExpandPlan),
}

// ── Entry points ───────────────────────────────────────────────────────

/// Apply a command arriving from outside the core.
pub fn apply(
    state: &mut GameState,
    cache: &mut IdempotencyCache,
    request: &CommandRequest,
    rules: &RulesConfig,
) -> Result<Response, ActionError> {
    if let Some(key) = &request.idempotency_key {
        if let Some(replay) = cache.lookup(state.id, key, &request.command)? {
            debug!(game = %state.id, key = %key, "idempotent replay");
            return Ok(replay);
        }
    }

    if state.turn_in_progress {
        return Err(ActionError::TurnInProgress);
    }

    let response = execute(state, request.caller, &request.command, rules).map(Response::Snapshot)?;

    if let Some(key) = &request.idempotency_key {
        cache.store(state.id, key, &request.command, &response);
    }
    Ok(response)
}

/// Apply a command for the seat currently playing inside a turn advance.
/// Same rules as [`apply`]; the guard is held by the caller.
pub fn apply_guarded(
    guard: &mut TurnGuard<'_>,
    caller: ParticipantId,
    command: &Command,
    rules: &RulesConfig,
) -> Result<StateSnapshot, ActionError> {
    execute(guard, caller, command, rules)
}

fn execute(
    state: &mut GameState,
    caller: ParticipantId,
    command: &Command,
    rules: &RulesConfig,
) -> Result<StateSnapshot, ActionError> {
    if state.status == GameStatus::Finished {
        return Err(ActionError::GameFinished);
    }
    if state.active != caller {
        return Err(ActionError::NotPlayerTurn);
    }

    let mutation = match validate(state, caller, command, rules) {
        Ok(m) => m,
        Err(e) => {
            debug!(game = %state.id, caller = %caller, command = command.kind(), error = %e, "command rejected");
            return Err(e);
        }
    };
    commit(state, mutation);
    info!(game = %state.id, caller = %caller, command = command.kind(), "command applied");
    Ok(project(state, rules))
}

// ── Validation ─────────────────────────────────────────────────────────

fn acting_unit<'s>(
    state: &'s GameState,
    caller: ParticipantId,
    id: UnitId,
    rules: &'s RulesConfig,
) -> Result<(&'s Unit, &'s UnitDefinition), ActionError> {
    let unit = state.units.get(&id)
        .filter(|u| u.owner == caller)
        .ok_or(ActionError::UnitNotOwnedOrNotFound)?;
    if unit.has_acted {
        return Err(ActionError::UnitAlreadyActed);
    }
    let def = rules.unit(&unit.unit_type)
        .ok_or_else(|| ActionError::InvalidUnitType(unit.unit_type.clone()))?;
    Ok((unit, def))
}

fn acting_city(state: &GameState, caller: ParticipantId, id: CityId) -> Result<&City, ActionError> {
    let city = state.cities.get(&id)
        .filter(|c| c.owner == caller)
        .ok_or(ActionError::CityNotOwnedOrNotFound)?;
    if city.has_acted_this_turn {
        return Err(ActionError::CityAlreadyActed);
    }
    Ok(city)
}

/// Tiles a unit owned by `mover` may not enter or cross.
fn blocks_movement(state: &GameState, mover: ParticipantId, pos: Position) -> bool {
    !state.map.is_passable(pos)
        || state.is_occupied(pos)
        || state.city_at(pos).map_or(false, |c| c.owner != mover)
}

fn validate(
    state: &GameState,
    caller: ParticipantId,
    command: &Command,
    rules: &RulesConfig,
) -> Result<Mutation, ActionError> {
    match command {
        Command::MoveUnit { unit_id, target } => {
            let (unit, def) = acting_unit(state, caller, *unit_id, rules)?;
            let tile = state.map.tile_at(*target)
                .ok_or_else(|| ActionError::InvalidInput(format!("{target} is off the map")))?;
            if unit.position == *target {
                return Err(ActionError::InvalidTarget("unit is already on that tile".into()));
            }
            if !tile.terrain.is_passable() {
                return Err(ActionError::InvalidTerrain);
            }
            if state.is_occupied(*target) {
                return Err(ActionError::InvalidTarget(format!("{target} is occupied")));
            }
            if state.city_at(*target).map_or(false, |c| c.owner != caller) {
                return Err(ActionError::InvalidTarget(format!("{target} holds an enemy city")));
            }
            let reachable = state.map.grid
                .reachable(unit.position, def.move_points, |p| blocks_movement(state, caller, p));
            if !reachable.iter().any(|(p, _)| p == target) {
                return Err(ActionError::OutOfRange {
                    distance: distance(unit.position, *target),
                    min: 1,
                    max: def.move_points,
                });
            }
            Ok(Mutation::Move { unit: unit.id, to: *target })
        }

        Command::AttackUnit { attacker, target } => {
            let (unit, def) = acting_unit(state, caller, *attacker, rules)?;
            let victim = state.units.get(target)
                .ok_or_else(|| ActionError::InvalidTarget(format!("unit {} does not exist", target.0)))?;
            if victim.owner == caller {
                return Err(ActionError::InvalidTarget("cannot attack an own unit".into()));
            }
            combat::check_range(def, unit.position, victim.position)?;
            let victim_def = rules.unit(&victim.unit_type)
                .ok_or_else(|| ActionError::InvalidUnitType(victim.unit_type.clone()))?;
            let outcome = combat::resolve_attack(
                Combatant::unit(def, unit.hp),
                Combatant::unit(victim_def, victim.hp),
                def.ranged,
            );
            Ok(Mutation::AttackUnit { attacker: unit.id, target: victim.id, outcome })
        }

        Command::AttackCity { attacker, target_city } => {
            let (unit, def) = acting_unit(state, caller, *attacker, rules)?;
            let city = state.cities.get(target_city)
                .ok_or_else(|| ActionError::InvalidTarget(format!("city {} does not exist", target_city.0)))?;
            if city.owner == caller {
                return Err(ActionError::InvalidTarget("cannot attack an own city".into()));
            }
            combat::check_range(def, unit.position, city.position)?;
            let outcome = combat::resolve_attack(
                Combatant::unit(def, unit.hp),
                Combatant::city(city.defence(), city.hp),
                def.ranged,
            );
            Ok(Mutation::AttackCity { attacker: unit.id, city: city.id, outcome })
        }

        Command::SpawnUnit { city_id, unit_type } => {
            let city = acting_city(state, caller, *city_id)?;
            economy::plan_spawn(state, city, unit_type, rules).map(Mutation::Spawn)
        }

        Command::BuildBuilding { city_id, building } => {
            let city = acting_city(state, caller, *city_id)?;
            economy::plan_build(city, building, rules).map(Mutation::Build)
        }

        Command::ExpandTerritory { city_id, target_tile } => {
            let city = acting_city(state, caller, *city_id)?;
            economy::plan_expand(state, city, *target_tile, rules).map(Mutation::Expand)
        }

        Command::EndTurn => Err(ActionError::InvalidInput(
            "end turn is handled by the turn orchestrator".into(),
        )),
    }
}

// ── Commit ─────────────────────────────────────────────────────────────

fn commit(state: &mut GameState, mutation: Mutation) {
    match mutation {
        Mutation::Move { unit, to } => {
            if let Some(u) = state.units.get_mut(&unit) {
                u.position = to;
                u.has_acted = true;
            }
        }

        Mutation::AttackUnit { attacker, target, outcome } => {
            if let Some(u) = state.units.get_mut(&attacker) {
                u.hp = outcome.attacker_hp;
                u.has_acted = true;
            }
            if let Some(t) = state.units.get_mut(&target) {
                t.hp = outcome.target_hp;
            }
            remove_destroyed(state);
        }

        Mutation::AttackCity { attacker, city, outcome } => {
            if let Some(u) = state.units.get_mut(&attacker) {
                u.hp = outcome.attacker_hp;
                u.has_acted = true;
            }
            if let Some(c) = state.cities.get_mut(&city) {
                c.hp = outcome.target_hp.max(0);
                if c.hp == 0 {
                    warn!(game = %state.id, city = city.0, "city reduced to 0 hp");
                }
            }
            remove_destroyed(state);
        }

        Mutation::Spawn(plan) => {
            economy::commit_spawn(state, plan);
        }
        Mutation::Build(plan) => economy::commit_build(state, plan),
        Mutation::Expand(plan) => economy::commit_expand(state, plan),
    }
}

fn remove_destroyed(state: &mut GameState) {
    let game = state.id;
    state.units.retain(|id, u| {
        let alive = u.hp > 0;
        if !alive {
            debug!(game = %game, unit = id.0, "unit destroyed");
        }
        alive
    });
}
