// ═══════════════════════════════════════════════════════════════════════
// Heuristic Agent — makes decisions using simple strategic heuristics.
// Significantly stronger than RandomAgent.
//
//   Cities:  fortify when threatened → keep the army at 3 units per city
//            → grab resource tiles → spawn with whatever is left
//   Units:   best-scoring attack → close in on the nearest enemy
// ═══════════════════════════════════════════════════════════════════════

use crate::agent::{Agent, AgentView, AttackTarget};
use hexrule_engine::combat::damage;
use hexrule_engine::config::UnitDefinition;
use hexrule_engine::grid::{distance, Position};
use hexrule_engine::projection::{CityView, UnitView};
use hexrule_engine::types::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const THREAT_RADIUS: u32 = 3;
const UNITS_PER_CITY: usize = 3;
const KILL_BONUS: i32 = 20;
const DEATH_PENALTY: i32 = 30;

pub struct HeuristicAgent {
    participant: ParticipantId,
    rng: ChaCha8Rng,
}

impl HeuristicAgent {
    pub fn new(participant: ParticipantId, seed: u64) -> Self {
        HeuristicAgent {
            participant,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// An enemy unit is within striking distance of the city.
    fn threatened(&self, view: &AgentView, city: &CityView) -> bool {
        view.enemy_units().any(|u| distance(u.position, city.position) <= THREAT_RADIUS)
    }

    fn army_size(&self, view: &AgentView) -> usize {
        view.snapshot.units_of(self.participant).count()
    }

    /// Strongest affordable unit type, by attack + defence.
    fn best_spawn<'v>(&self, view: &'v AgentView, city: &CityView) -> Option<&'v UnitDefinition> {
        if !view.can_place_unit(city) {
            return None;
        }
        view.affordable_units(city)
            .into_iter()
            .max_by(|a, b| (a.attack + a.defence, &b.code).cmp(&(b.attack + b.defence, &a.code)))
    }

    /// Damage dealt minus damage taken, with a bonus for a kill and a
    /// penalty for dying in the exchange.
    fn attack_score(&self, view: &AgentView, unit: &UnitView, def: &UnitDefinition, target: AttackTarget) -> Option<i32> {
        match target {
            AttackTarget::Unit(id) => {
                let victim = view.snapshot.unit(id)?;
                let victim_def = view.rules.unit(&victim.unit_type)?;
                let dealt = damage(def.attack, victim_def.defence);
                let taken = if def.ranged { 0 } else { damage(victim_def.attack, def.defence) };
                let mut score = dealt - taken;
                if dealt >= victim.hp {
                    score += KILL_BONUS;
                }
                if taken >= unit.hp {
                    score -= DEATH_PENALTY;
                }
                Some(score)
            }
            AttackTarget::City(id) => {
                let city = view.snapshot.city(id)?;
                Some(damage(def.attack, city.defence))
            }
        }
    }
}

impl Agent for HeuristicAgent {
    fn name(&self) -> &str { "Heuristic" }
    fn participant(&self) -> ParticipantId { self.participant }

    fn choose_city_action(&mut self, view: &AgentView, city: CityId) -> Option<Command> {
        let city = view.snapshot.city(city)?;
        let threatened = self.threatened(view, city);

        if threatened {
            let fortification = view.affordable_buildings(city)
                .into_iter()
                .filter(|b| b.defence_bonus > 0)
                .max_by_key(|b| b.defence_bonus);
            if let Some(b) = fortification {
                return Some(Command::BuildBuilding { city_id: city.id, building: b.code.clone() });
            }
        }

        let cities = view.snapshot.cities_of(self.participant).count().max(1);
        if threatened || self.army_size(view) < cities * UNITS_PER_CITY {
            if let Some(def) = self.best_spawn(view, city) {
                return Some(Command::SpawnUnit { city_id: city.id, unit_type: def.code.clone() });
            }
        }

        // Prefer tiles that still have something to harvest.
        let options = view.expansion_options(city);
        let rich = options.iter().copied().find(|id| {
            view.snapshot.tiles.get(id.0 as usize)
                .and_then(|t| t.resource)
                .map_or(false, |r| r.amount > 0)
        });
        if let Some(target_tile) = rich.or_else(|| options.first().copied()) {
            return Some(Command::ExpandTerritory { city_id: city.id, target_tile });
        }

        self.best_spawn(view, city)
            .map(|def| Command::SpawnUnit { city_id: city.id, unit_type: def.code.clone() })
    }

    fn choose_unit_action(&mut self, view: &AgentView, unit: UnitId) -> Option<Command> {
        let unit = view.snapshot.unit(unit)?;
        let def = view.unit_def(unit)?;

        let best_attack = view.attack_options(unit)
            .into_iter()
            .filter_map(|t| self.attack_score(view, unit, def, t).map(|s| (s, t)))
            .filter(|(s, _)| *s > 0)
            .max_by_key(|(s, _)| *s);
        if let Some((_, target)) = best_attack {
            return Some(target.command(unit.id));
        }

        // Ranged units hold at their longest reach, melee units close in.
        let desired = def.attack_range().1;
        let gap = |p: Position| view.distance_to_enemy(p).map(|d| d.abs_diff(desired));
        let current = gap(unit.position)?;
        let mut moves = view.move_options(unit);
        moves.shuffle(&mut self.rng);
        let (best, best_gap) = moves.into_iter()
            .filter_map(|p| gap(p).map(|g| (p, g)))
            .min_by_key(|(_, g)| *g)?;
        if best_gap < current {
            Some(Command::MoveUnit { unit_id: unit.id, target: best })
        } else {
            None
        }
    }
}
