pub mod agent;
pub mod random;
pub mod heuristic;

pub use agent::{Agent, AgentView, AttackTarget};
pub use random::RandomAgent;
pub use heuristic::HeuristicAgent;

use hexrule_engine::types::ParticipantId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The agent implementations a seat can be driven by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Random,
    Heuristic,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentKind::Random => write!(f, "random"),
            AgentKind::Heuristic => write!(f, "heuristic"),
        }
    }
}

impl FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(AgentKind::Random),
            "heuristic" => Ok(AgentKind::Heuristic),
            other => Err(format!("unknown agent '{other}' (expected random or heuristic)")),
        }
    }
}

pub fn make_agent(kind: AgentKind, participant: ParticipantId, seed: u64) -> Box<dyn Agent> {
    match kind {
        AgentKind::Random => Box::new(RandomAgent::new(participant, seed)),
        AgentKind::Heuristic => Box::new(HeuristicAgent::new(participant, seed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexrule_engine::config::RulesConfig;
    use hexrule_engine::idempotency::IdempotencyCache;
    use hexrule_engine::mutator::apply;
    use hexrule_engine::projection::project;
    use hexrule_engine::setup::{create_initial_state, GameSetup};
    use hexrule_engine::turn::{advance_turn, TurnLedger};
    use hexrule_engine::types::*;
    use std::time::Duration;

    /// Let `agent` play its seat until it passes. Returns (accepted, rejected).
    fn play_seat(agent: &mut dyn Agent, state: &mut GameState, rules: &std::sync::Arc<RulesConfig>) -> (u32, u32) {
        let mut cache = IdempotencyCache::new(Duration::from_secs(60));
        let mut view = AgentView::new(agent.participant(), project(state, rules), rules.clone());
        let (mut accepted, mut rejected) = (0, 0);
        for _ in 0..200 {
            let Some(command) = agent.decide(&view) else { break };
            let request = CommandRequest { caller: agent.participant(), command: command.clone(), idempotency_key: None };
            match apply(state, &mut cache, &request, rules) {
                Ok(response) => {
                    accepted += 1;
                    view.snapshot = response.snapshot().clone();
                }
                Err(_) => {
                    rejected += 1;
                    if let Some(actor) = command.actor() {
                        view.tried.insert(actor);
                    }
                }
            }
        }
        (accepted, rejected)
    }

    fn human_seat_game(seed: u64) -> (GameState, std::sync::Arc<RulesConfig>) {
        let rules = RulesConfig::builtin();
        let mut setup = GameSetup::new(seed, vec![
            ("A".into(), ParticipantKind::Human),
            ("B".into(), ParticipantKind::Human),
        ]);
        setup.starting_stock = ResourceKind::ALL.iter().map(|k| (*k, 40)).collect();
        let state = create_initial_state(GameId(seed), &setup, &rules).unwrap();
        (state, rules)
    }

    #[test]
    fn test_agent_kind_parsing() {
        assert_eq!("heuristic".parse::<AgentKind>(), Ok(AgentKind::Heuristic));
        assert_eq!("RANDOM".parse::<AgentKind>(), Ok(AgentKind::Random));
        assert!("minimax".parse::<AgentKind>().is_err());
        assert_eq!(AgentKind::Random.to_string(), "random");
    }

    #[test]
    fn test_heuristic_first_turn_is_legal() {
        for seed in 0..10 {
            let (mut state, rules) = human_seat_game(seed);
            let mut agent = HeuristicAgent::new(ParticipantId(0), seed);
            let (accepted, rejected) = play_seat(&mut agent, &mut state, &rules);
            assert!(accepted >= 1, "seed {seed}: heuristic agent did nothing");
            assert_eq!(rejected, 0, "seed {seed}: heuristic agent issued an illegal command");
        }
    }

    #[test]
    fn test_random_agents_play_many_turns() {
        for seed in 0..5 {
            let (mut state, rules) = human_seat_game(seed);
            let mut agents = [
                make_agent(AgentKind::Random, ParticipantId(0), seed),
                make_agent(AgentKind::Heuristic, ParticipantId(1), seed + 100),
            ];
            let mut ledger = TurnLedger::default();
            for _ in 0..20 {
                if state.status == GameStatus::Finished {
                    break;
                }
                let seat = state.active.0 as usize;
                let (_, rejected) = play_seat(agents[seat].as_mut(), &mut state, &rules);
                assert_eq!(rejected, 0, "seed {seed}: {} issued an illegal command", agents[seat].name());
                let caller = state.active;
                advance_turn(&mut state, caller, &rules, &mut ledger).unwrap();
            }
            assert!(state.turn > 1);
        }
    }

    #[test]
    fn test_tried_actors_are_skipped() {
        let (state, rules) = human_seat_game(3);
        let mut view = AgentView::new(ParticipantId(0), project(&state, &rules), rules.clone());
        for city in state.cities_of(ParticipantId(0)) {
            view.tried.insert(ActorRef::City(city.id));
        }
        for unit in state.units_of(ParticipantId(0)) {
            view.tried.insert(ActorRef::Unit(unit.id));
        }
        let mut agent = HeuristicAgent::new(ParticipantId(0), 3);
        assert_eq!(agent.decide(&view), None);
    }
}
