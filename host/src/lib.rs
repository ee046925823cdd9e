// ═══════════════════════════════════════════════════════════════════════
// Game host — the registry of running games
//
// Each game is an independent `GameHandle`. The registry lock is only
// taken to look a handle up or to add one, so games never wait on each
// other.
// ═══════════════════════════════════════════════════════════════════════

pub mod error;
pub mod handle;
pub mod orchestrator;
pub mod store;
#[cfg(test)]
mod tests;

pub use error::HostError;
pub use handle::{GameHandle, Session, SharedAgent, TurnGuardFlag};
pub use store::{SavedGame, SnapshotStore, SqliteStore, StoreError};

use hexrule_agents::Agent;
use hexrule_engine::config::RulesConfig;
use hexrule_engine::error::ActionError;
use hexrule_engine::mutator::Response;
use hexrule_engine::projection::StateSnapshot;
use hexrule_engine::setup::{create_initial_state, GameSetup};
use hexrule_engine::types::*;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

pub struct GameHost {
    rules: Arc<RulesConfig>,
    games: RwLock<HashMap<GameId, Arc<GameHandle>>>,
    next_id: AtomicU64,
}

impl GameHost {
    pub fn new(rules: Arc<RulesConfig>) -> Self {
        GameHost {
            rules,
            games: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn rules(&self) -> &Arc<RulesConfig> {
        &self.rules
    }

    fn check_agents(state: &GameState, agents: &[Box<dyn Agent>]) -> Result<(), ActionError> {
        for p in state.participants.iter().filter(|p| p.kind == ParticipantKind::Ai && !p.eliminated) {
            if !agents.iter().any(|a| a.participant() == p.id) {
                return Err(ActionError::InvalidInput(format!("AI seat {} has no agent", p.id)));
            }
        }
        Ok(())
    }

    fn register(&self, state: GameState, agents: Vec<Box<dyn Agent>>) -> Result<GameId, HostError> {
        Self::check_agents(&state, &agents)?;
        let id = state.id;
        let handle = Arc::new(GameHandle::new(state, self.rules.clone(), agents));
        self.games.write().insert(id, handle);
        Ok(id)
    }

    /// Start a new game. Every AI seat needs an agent.
    pub fn create_game(&self, setup: &GameSetup, agents: Vec<Box<dyn Agent>>) -> Result<GameId, HostError> {
        let id = GameId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let state = create_initial_state(id, setup, &self.rules)?;
        let id = self.register(state, agents)?;
        info!(game = %id, seed = setup.seed, participants = setup.participants.len(), "game created");
        Ok(id)
    }

    pub fn handle(&self, game: GameId) -> Result<Arc<GameHandle>, HostError> {
        self.games.read().get(&game).cloned().ok_or(HostError::GameNotFound(game))
    }

    pub async fn submit(
        &self,
        game: GameId,
        caller: ParticipantId,
        command: Command,
        idempotency_key: Option<String>,
    ) -> Result<Response, HostError> {
        self.handle(game)?.submit(caller, command, idempotency_key).await
    }

    pub async fn end_turn(
        &self,
        game: GameId,
        caller: ParticipantId,
        idempotency_key: Option<String>,
    ) -> Result<Response, HostError> {
        self.handle(game)?.end_turn(caller, idempotency_key).await
    }

    pub fn snapshot(&self, game: GameId) -> Result<Arc<StateSnapshot>, HostError> {
        Ok(self.handle(game)?.snapshot())
    }

    pub async fn save(&self, game: GameId, store: &dyn SnapshotStore) -> Result<(), HostError> {
        let state = self.handle(game)?.state().await;
        store.save(&state)?;
        info!(game = %game, turn = state.turn, "game saved");
        Ok(())
    }

    /// Bring a saved game back under this host, keeping its id.
    pub fn load(&self, store: &dyn SnapshotStore, game: GameId, agents: Vec<Box<dyn Agent>>) -> Result<GameId, HostError> {
        let state = store.load(game)?.ok_or(HostError::GameNotFound(game))?;
        self.next_id.fetch_max(game.0 + 1, Ordering::Relaxed);
        let turn = state.turn;
        let id = self.register(state, agents)?;
        info!(game = %id, turn, "game loaded");
        Ok(id)
    }

    pub fn games(&self) -> Vec<GameId> {
        let mut ids: Vec<GameId> = self.games.read().keys().copied().collect();
        ids.sort();
        ids
    }
}
