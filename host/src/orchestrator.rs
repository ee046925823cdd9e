// ═══════════════════════════════════════════════════════════════════════
// Turn orchestrator — the asynchronous end-turn sequence
//
//   1. replay if the idempotency key is known
//   2. take the host guard flag (non-blocking) and the session
//   3. TurnAdvance::begin       on a working copy of the state; guard set,
//                               ending participant harvests
//   4. per following AI seat:   decision loop under the seat's budget,
//                               then the seat harvests
//   5. TurnAdvance::complete    next participant active, guard cleared
//   6. swap the copy into the session, cache, publish
//
// The session only ever holds a completed turn. If the end-turn future is
// dropped midway, the copy goes with it and the game is as it was before
// the call.
//
// Agents decide on blocking workers. A seat whose budget runs out simply
// stops issuing commands: what it already committed stays, and the turn
// advances exactly as if it had passed.
// ═══════════════════════════════════════════════════════════════════════

use crate::error::HostError;
use crate::handle::GameHandle;
use hexrule_agents::AgentView;
use hexrule_engine::error::ActionError;
use hexrule_engine::mutator::{self, Response};
use hexrule_engine::projection::project;
use hexrule_engine::turn::{AiSeatOutcome, TurnAdvance, TurnLedger};
use hexrule_engine::types::*;
use tokio::time::timeout;
use tracing::{info, warn};

impl GameHandle {
    pub async fn end_turn(&self, caller: ParticipantId, idempotency_key: Option<String>) -> Result<Response, HostError> {
        if let Some(key) = &idempotency_key {
            if let Some(replay) = self.replay(key, &Command::EndTurn)? {
                return Ok(replay);
            }
        }
        let Some(_held) = self.guard.try_acquire() else {
            return Err(ActionError::TurnInProgress.into());
        };
        let mut session = self.session.lock().await;
        // Another call with the same key may have finished meanwhile.
        if let Some(key) = &idempotency_key {
            if let Some(replay) = self.replay(key, &Command::EndTurn)? {
                return Ok(replay);
            }
        }

        let mut state = session.state.clone();
        let mut ledger = session.ledger.clone();
        let mut advance = TurnAdvance::begin(&mut state, caller, &self.rules)?;
        while let Some(seat) = advance.next_ai_seat() {
            let outcome = self.run_ai_seat(&mut advance, &mut ledger, seat).await;
            advance.finish_ai_seat(outcome);
        }
        let summary = advance.complete(&mut ledger);

        let response = Response::TurnEnded { snapshot: project(&state, &self.rules), summary };
        session.state = state;
        session.ledger = ledger;
        if let Some(key) = &idempotency_key {
            self.cache.lock().store(self.id, key, &Command::EndTurn, &response);
        }
        self.publish(response.snapshot().clone());
        Ok(response)
    }

    /// Let one AI seat play until its agent passes, it runs out of
    /// actions, or its time budget expires.
    async fn run_ai_seat(
        &self,
        advance: &mut TurnAdvance<'_>,
        ledger: &mut TurnLedger,
        seat: ParticipantId,
    ) -> AiSeatOutcome {
        let Some(agent) = self.agents.get(&seat).cloned() else {
            warn!(game = %self.id, participant = %seat, "AI seat has no agent; passing");
            return AiSeatOutcome::default();
        };

        let budget = self.rules.ai_turn_budget();
        let max_actions = self.rules.ai_max_actions_per_turn;
        let mut actions = 0u32;
        let mut view = AgentView::new(seat, project(advance.state(), &self.rules), self.rules.clone());

        let play = async {
            while actions < max_actions {
                let agent = agent.clone();
                let snapshot = view.clone();
                let decision = tokio::task::spawn_blocking(move || agent.lock().decide(&snapshot)).await;
                let command = match decision {
                    Ok(Some(command)) => command,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(game = %self.id, participant = %seat, error = %e, "agent worker failed");
                        break;
                    }
                };

                let result = mutator::apply_guarded(advance.guard_mut(), seat, &command, &self.rules);
                ledger.record(&command, &result);
                match result {
                    Ok(snapshot) => {
                        actions += 1;
                        view.snapshot = snapshot;
                    }
                    Err(e) => {
                        warn!(game = %self.id, participant = %seat, command = command.kind(), error = %e, "AI command rejected");
                        match command.actor() {
                            Some(actor) => {
                                view.tried.insert(actor);
                            }
                            None => break,
                        }
                    }
                }
            }
        };

        let timed_out = timeout(budget, play).await.is_err();
        if timed_out {
            warn!(
                game = %self.id,
                error = %ActionError::AiTimeout { participant: seat },
                budget_ms = budget.as_millis() as u64,
                actions,
                "AI seat stopped"
            );
        } else {
            info!(game = %self.id, participant = %seat, actions, "AI seat finished");
        }
        AiSeatOutcome { actions, timed_out }
    }
}
