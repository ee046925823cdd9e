// ═══════════════════════════════════════════════════════════════════════
// Game handle — everything the host keeps for one running game
//
//   guard      atomic flag, held for a whole end-turn (AI turns included);
//              commands arriving meanwhile are rejected, not queued
//   cache      idempotency cache behind its own short lock, so a retried
//              command is answered even while a turn is advancing
//   session    the mutable game: state + turn ledger, behind an async
//              mutex (short critical sections)
//   published  last committed snapshot; readers clone the Arc and never
//              touch the session
// ═══════════════════════════════════════════════════════════════════════

use crate::error::HostError;
use hexrule_agents::Agent;
use hexrule_engine::config::RulesConfig;
use hexrule_engine::error::ActionError;
use hexrule_engine::idempotency::IdempotencyCache;
use hexrule_engine::mutator::{self, Response};
use hexrule_engine::projection::{project, StateSnapshot};
use hexrule_engine::turn::TurnLedger;
use hexrule_engine::types::*;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// An agent shared between the host and the blocking worker running it.
pub type SharedAgent = Arc<parking_lot::Mutex<Box<dyn Agent>>>;

// ── Turn guard flag ────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct TurnGuardFlag(AtomicBool);

/// Held while a turn advances; clears the flag when dropped.
#[derive(Debug)]
pub struct HeldFlag<'a>(&'a AtomicBool);

impl TurnGuardFlag {
    /// Never waits: `None` if someone else holds the flag.
    pub fn try_acquire(&self) -> Option<HeldFlag<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| HeldFlag(&self.0))
    }

    pub fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Drop for HeldFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ── Session & handle ───────────────────────────────────────────────────

pub struct Session {
    pub state: GameState,
    pub ledger: TurnLedger,
}

pub struct GameHandle {
    pub(crate) id: GameId,
    pub(crate) rules: Arc<RulesConfig>,
    pub(crate) guard: TurnGuardFlag,
    pub(crate) cache: parking_lot::Mutex<IdempotencyCache>,
    pub(crate) session: Mutex<Session>,
    pub(crate) published: RwLock<Arc<StateSnapshot>>,
    pub(crate) agents: BTreeMap<ParticipantId, SharedAgent>,
}

impl GameHandle {
    pub fn new(mut state: GameState, rules: Arc<RulesConfig>, agents: Vec<Box<dyn Agent>>) -> Self {
        // A saved game is always between turns.
        state.turn_in_progress = false;
        let published = Arc::new(project(&state, &rules));
        let agents = agents.into_iter()
            .map(|a| (a.participant(), Arc::new(parking_lot::Mutex::new(a))))
            .collect();
        GameHandle {
            id: state.id,
            guard: TurnGuardFlag::default(),
            cache: parking_lot::Mutex::new(IdempotencyCache::new(rules.idempotency_ttl())),
            session: Mutex::new(Session {
                ledger: TurnLedger::default(),
                state,
            }),
            published: RwLock::new(published),
            agents,
            rules,
        }
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    /// Last committed snapshot. Never waits on a running command or turn.
    pub fn snapshot(&self) -> Arc<StateSnapshot> {
        self.published.read().clone()
    }

    pub(crate) fn publish(&self, snapshot: StateSnapshot) {
        *self.published.write() = Arc::new(snapshot);
    }

    /// Copy of the live aggregate, taken between commands.
    pub async fn state(&self) -> GameState {
        self.session.lock().await.state.clone()
    }

    /// The stored response for `key`, if this exact command was already
    /// answered.
    pub(crate) fn replay(&self, key: &str, command: &Command) -> Result<Option<Response>, ActionError> {
        let replay = self.cache.lock().lookup(self.id, key, command)?;
        if replay.is_some() {
            debug!(game = %self.id, key = %key, command = command.kind(), "replayed");
        }
        Ok(replay)
    }

    /// Apply one command. `EndTurn` is routed to the orchestrator.
    pub async fn submit(
        &self,
        caller: ParticipantId,
        command: Command,
        idempotency_key: Option<String>,
    ) -> Result<Response, HostError> {
        if command == Command::EndTurn {
            return self.end_turn(caller, idempotency_key).await;
        }
        if let Some(key) = &idempotency_key {
            if let Some(replay) = self.replay(key, &command)? {
                return Ok(replay);
            }
        }
        if self.guard.is_held() {
            return Err(ActionError::TurnInProgress.into());
        }

        let mut session = self.session.lock().await;
        // The end-turn may have started while we waited for the lock.
        if self.guard.is_held() {
            return Err(ActionError::TurnInProgress.into());
        }

        let Session { state, ledger } = &mut *session;
        let request = CommandRequest { caller, command, idempotency_key };
        let (replayed, result) = {
            let mut cache = self.cache.lock();
            // A concurrent retry of the same key may have landed meanwhile.
            let replayed = request.idempotency_key.as_deref()
                .map_or(false, |key| matches!(cache.lookup(state.id, key, &request.command), Ok(Some(_))));
            (replayed, mutator::apply(state, &mut cache, &request, &self.rules))
        };
        // A replay changes nothing: no ledger entry, nothing new to publish.
        if replayed {
            return Ok(result?);
        }
        ledger.record(&request.command, &result);

        let response = result?;
        debug!(game = %self.id, caller = %caller, command = request.command.kind(), "command committed");
        self.publish(response.snapshot().clone());
        Ok(response)
    }
}
