// ═══════════════════════════════════════════════════════════════════════
// Random Agent — picks uniformly among the options the view offers.
// Serves as baseline and for testing engine stability.
// ═══════════════════════════════════════════════════════════════════════

use crate::agent::{Agent, AgentView};
use hexrule_engine::types::*;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub struct RandomAgent {
    participant: ParticipantId,
    rng: ChaCha8Rng,
}

impl RandomAgent {
    pub fn new(participant: ParticipantId, seed: u64) -> Self {
        RandomAgent {
            participant,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Agent for RandomAgent {
    fn name(&self) -> &str { "Random" }
    fn participant(&self) -> ParticipantId { self.participant }

    fn choose_city_action(&mut self, view: &AgentView, city: CityId) -> Option<Command> {
        let city = view.snapshot.city(city)?;
        let mut options: Vec<Command> = Vec::new();

        if view.can_place_unit(city) {
            options.extend(view.affordable_units(city).into_iter().map(|u| Command::SpawnUnit {
                city_id: city.id,
                unit_type: u.code.clone(),
            }));
        }
        options.extend(view.affordable_buildings(city).into_iter().map(|b| Command::BuildBuilding {
            city_id: city.id,
            building: b.code.clone(),
        }));
        options.extend(view.expansion_options(city).into_iter().map(|t| Command::ExpandTerritory {
            city_id: city.id,
            target_tile: t,
        }));

        // Sometimes save up instead.
        if options.is_empty() || self.rng.gen_bool(0.25) {
            return None;
        }
        options.choose(&mut self.rng).cloned()
    }

    fn choose_unit_action(&mut self, view: &AgentView, unit: UnitId) -> Option<Command> {
        let unit = view.snapshot.unit(unit)?;

        let targets = view.attack_options(unit);
        if !targets.is_empty() && self.rng.gen_bool(0.7) {
            return targets.choose(&mut self.rng).map(|t| t.command(unit.id));
        }

        let moves = view.move_options(unit);
        if moves.is_empty() || self.rng.gen_bool(0.2) {
            return None;
        }
        moves.choose(&mut self.rng).map(|&target| Command::MoveUnit { unit_id: unit.id, target })
    }
}
