// ═══════════════════════════════════════════════════════════════════════
// Turn state machine — guard, participant rotation, turn summary
//
//   AwaitingActions ──end turn──▶ Advancing ──complete──▶ AwaitingActions
//        (guard clear)            (guard set)              (next participant)
//
// `TurnGuard` is the only way to set the guard flag and it clears the
// flag when dropped, so every exit path (success, rejection, timeout,
// an early `?`) releases it.
//
// `TurnAdvance` walks one advance step by step. Callers that run AI
// seats (the host) interleave their decision loop between
// `next_ai_seat` and `finish_ai_seat`; `advance_turn` is the same walk
// with every AI seat passing.
// ═══════════════════════════════════════════════════════════════════════

use crate::config::RulesConfig;
use crate::economy::{self, HarvestReport};
use crate::error::ActionError;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use tracing::info;

// ── Guard ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct TurnGuard<'a> {
    state: &'a mut GameState,
    ended_by: ParticipantId,
}

impl<'a> TurnGuard<'a> {
    /// Enter `Advancing` on behalf of `caller`, who must be the active
    /// participant of a running game.
    pub fn acquire(state: &'a mut GameState, caller: ParticipantId) -> Result<Self, ActionError> {
        if state.turn_in_progress {
            return Err(ActionError::TurnInProgress);
        }
        if state.status == GameStatus::Finished {
            return Err(ActionError::GameFinished);
        }
        if state.active != caller {
            return Err(ActionError::NotPlayerTurn);
        }
        state.turn_in_progress = true;
        Ok(TurnGuard { state, ended_by: caller })
    }

    pub fn ended_by(&self) -> ParticipantId {
        self.ended_by
    }
}

impl Deref for TurnGuard<'_> {
    type Target = GameState;

    fn deref(&self) -> &GameState {
        self.state
    }
}

impl DerefMut for TurnGuard<'_> {
    fn deref_mut(&mut self) -> &mut GameState {
        self.state
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.state.turn_in_progress = false;
    }
}

// ── Summary & ledger ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayedProduction {
    pub city_id: CityId,
    pub unit_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSummary {
    /// The turn number that just ended.
    pub turn: u32,
    pub ended_by: ParticipantId,
    pub next_active: ParticipantId,
    pub harvested: ResourceMap,
    pub overflow: ResourceMap,
    pub produced_units: Vec<String>,
    pub delayed_productions: Vec<DelayedProduction>,
    pub ai_ran: bool,
    pub ai_timed_out: bool,
    pub ai_actions: u32,
    pub eliminated: Vec<ParticipantId>,
}

/// Production outcomes observed since the last advance. Lives beside the
/// game state rather than in it: a rejected spawn is recorded here
/// without touching the aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnLedger {
    produced: Vec<String>,
    delayed: Vec<DelayedProduction>,
}

impl TurnLedger {
    pub fn record<T>(&mut self, command: &Command, result: &Result<T, ActionError>) {
        if let Command::SpawnUnit { city_id, unit_type } = command {
            match result {
                Ok(_) => self.produced.push(unit_type.clone()),
                Err(ActionError::SpawnBlocked) => self.delayed.push(DelayedProduction {
                    city_id: *city_id,
                    unit_type: unit_type.clone(),
                }),
                Err(_) => {}
            }
        }
    }

    fn take(&mut self) -> (Vec<String>, Vec<DelayedProduction>) {
        (std::mem::take(&mut self.produced), std::mem::take(&mut self.delayed))
    }
}

// ── Rotation helpers ───────────────────────────────────────────────────

/// The next non-eliminated participant after `after`, wrapping around.
/// Returns `after` itself when nobody else is left.
pub fn next_participant(state: &GameState, after: ParticipantId) -> ParticipantId {
    let n = state.participants.len();
    let Some(start) = state.participants.iter().position(|p| p.id == after) else {
        return after;
    };
    (1..=n)
        .map(|offset| &state.participants[(start + offset) % n])
        .find(|p| !p.eliminated)
        .map_or(after, |p| p.id)
}

/// Make `who` active and clear the per-turn flags on everything it owns.
pub fn begin_participant_turn(state: &mut GameState, who: ParticipantId) {
    state.active = who;
    for unit in state.units.values_mut().filter(|u| u.owner == who) {
        unit.has_acted = false;
    }
    for city in state.cities.values_mut().filter(|c| c.owner == who) {
        city.has_acted_this_turn = false;
    }
}

/// Mark participants with neither units nor cities as eliminated and end
/// the game once at most one remains. Returns the newly eliminated.
pub fn update_eliminations(state: &mut GameState) -> Vec<ParticipantId> {
    let mut fallen = Vec::new();
    let ids: Vec<ParticipantId> = state.participants.iter()
        .filter(|p| !p.eliminated)
        .map(|p| p.id)
        .collect();
    for id in ids {
        let alive = state.units_of(id).next().is_some() || state.cities_of(id).next().is_some();
        if !alive {
            fallen.push(id);
        }
    }
    for p in state.participants.iter_mut().filter(|p| fallen.contains(&p.id)) {
        p.eliminated = true;
    }

    let remaining: Vec<ParticipantId> = state.participants.iter()
        .filter(|p| !p.eliminated)
        .map(|p| p.id)
        .collect();
    if remaining.len() <= 1 && state.participants.len() > 1 {
        state.status = GameStatus::Finished;
        state.winner = remaining.first().copied();
    }
    fallen
}

// ── Advance ────────────────────────────────────────────────────────────

/// What happened while one AI seat played.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AiSeatOutcome {
    pub actions: u32,
    pub timed_out: bool,
}

#[derive(Debug)]
pub struct TurnAdvance<'a> {
    guard: TurnGuard<'a>,
    rules: &'a RulesConfig,
    cursor: ParticipantId,
    report: HarvestReport,
    ai_ran: bool,
    ai_timed_out: bool,
    ai_actions: u32,
}

impl<'a> TurnAdvance<'a> {
    /// Take the guard and harvest the ending participant's cities.
    pub fn begin(state: &'a mut GameState, caller: ParticipantId, rules: &'a RulesConfig) -> Result<Self, ActionError> {
        let mut guard = TurnGuard::acquire(state, caller)?;
        let report = economy::harvest_participant(&mut guard, caller, rules);
        Ok(TurnAdvance {
            guard,
            rules,
            cursor: caller,
            report,
            ai_ran: false,
            ai_timed_out: false,
            ai_actions: 0,
        })
    }

    /// Hand the turn to the next seat if it is an AI. Stops at the first
    /// human or when rotation comes back to whoever ended the turn.
    pub fn next_ai_seat(&mut self) -> Option<ParticipantId> {
        if self.guard.status == GameStatus::Finished {
            return None;
        }
        let candidate = next_participant(&self.guard, self.cursor);
        if candidate == self.guard.ended_by() {
            return None;
        }
        let is_ai = self.guard.participant(candidate)
            .map_or(false, |p| p.kind == ParticipantKind::Ai);
        if !is_ai {
            return None;
        }
        begin_participant_turn(&mut self.guard, candidate);
        self.cursor = candidate;
        Some(candidate)
    }

    /// Close the current AI seat: record its outcome and harvest its cities.
    pub fn finish_ai_seat(&mut self, outcome: AiSeatOutcome) {
        self.ai_ran = true;
        self.ai_actions += outcome.actions;
        self.ai_timed_out |= outcome.timed_out;
        let seat = self.cursor;
        let report = economy::harvest_participant(&mut self.guard, seat, self.rules);
        self.report.absorb(report);
    }

    /// The guarded state, for commands issued on behalf of an AI seat.
    pub fn guard_mut(&mut self) -> &mut TurnGuard<'a> {
        &mut self.guard
    }

    pub fn state(&self) -> &GameState {
        &self.guard
    }

    /// Leave `Advancing`: settle eliminations, bump the turn counter,
    /// activate the next participant and release the guard.
    pub fn complete(mut self, ledger: &mut TurnLedger) -> TurnSummary {
        let ended_turn = self.guard.turn;
        let ended_by = self.guard.ended_by();

        economy::regenerate_resources(&mut self.guard, self.rules);
        let eliminated = update_eliminations(&mut self.guard);
        let next = match self.guard.winner {
            Some(winner) if self.guard.status == GameStatus::Finished => winner,
            _ => next_participant(&self.guard, self.cursor),
        };

        self.guard.turn += 1;
        begin_participant_turn(&mut self.guard, next);

        let (produced_units, delayed_productions) = ledger.take();
        info!(
            game = %self.guard.id,
            turn = ended_turn,
            ended_by = %ended_by,
            next = %next,
            ai_ran = self.ai_ran,
            ai_timed_out = self.ai_timed_out,
            "turn advanced"
        );

        TurnSummary {
            turn: ended_turn,
            ended_by,
            next_active: next,
            harvested: self.report.harvested,
            overflow: self.report.overflow,
            produced_units,
            delayed_productions,
            ai_ran: self.ai_ran,
            ai_timed_out: self.ai_timed_out,
            ai_actions: self.ai_actions,
            eliminated,
        }
        // guard dropped here → flag cleared
    }
}

/// End `caller`'s turn with every AI seat passing. The host runs the same
/// walk with a real decision loop per AI seat.
pub fn advance_turn(
    state: &mut GameState,
    caller: ParticipantId,
    rules: &RulesConfig,
    ledger: &mut TurnLedger,
) -> Result<TurnSummary, ActionError> {
    let mut advance = TurnAdvance::begin(state, caller, rules)?;
    while advance.next_ai_seat().is_some() {
        advance.finish_ai_seat(AiSeatOutcome::default());
    }
    Ok(advance.complete(ledger))
}
