// ═══════════════════════════════════════════════════════════════════════
// Idempotency cache — (game, client key) → first response
//
// A retried command with the same key and payload gets the stored
// response back and is not applied again. Reusing a key for a different
// payload is a conflict. Entries expire after the configured TTL.
//
// The cache has no lock of its own: it is always reached through the
// same per-game serialization as the state it protects.
// ═══════════════════════════════════════════════════════════════════════

use crate::error::ActionError;
use crate::mutator::Response;
use crate::types::{Command, GameId};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry {
    command: Command,
    response: Response,
    stored_at: Instant,
}

#[derive(Debug, Clone)]
pub struct IdempotencyCache {
    ttl: Duration,
    entries: HashMap<(GameId, String), Entry>,
}

impl IdempotencyCache {
    pub fn new(ttl: Duration) -> Self {
        IdempotencyCache { ttl, entries: HashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `Ok(Some(_))` on a replay, `Ok(None)` on a miss.
    pub fn lookup(&self, game: GameId, key: &str, command: &Command) -> Result<Option<Response>, ActionError> {
        self.lookup_at(game, key, command, Instant::now())
    }

    pub fn lookup_at(
        &self,
        game: GameId,
        key: &str,
        command: &Command,
        now: Instant,
    ) -> Result<Option<Response>, ActionError> {
        let Some(entry) = self.entries.get(&(game, key.to_string())) else {
            return Ok(None);
        };
        if now.saturating_duration_since(entry.stored_at) >= self.ttl {
            return Ok(None);
        }
        if entry.command != *command {
            return Err(ActionError::IdempotencyConflict);
        }
        Ok(Some(entry.response.clone()))
    }

    pub fn store(&mut self, game: GameId, key: &str, command: &Command, response: &Response) {
        self.store_at(game, key, command, response, Instant::now());
    }

    pub fn store_at(&mut self, game: GameId, key: &str, command: &Command, response: &Response, now: Instant) {
        self.purge_expired(now);
        self.entries.insert((game, key.to_string()), Entry {
            command: command.clone(),
            response: response.clone(),
            stored_at: now,
        });
    }

    pub fn purge_expired(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries.retain(|_, e| now.saturating_duration_since(e.stored_at) < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RulesConfig;
    use crate::projection::project;
    use crate::setup::{create_initial_state, GameSetup};

    fn response() -> Response {
        let rules = RulesConfig::builtin();
        let state = create_initial_state(GameId(1), &GameSetup::human_vs_ai(1, 1), &rules).unwrap();
        Response::Snapshot(project(&state, &rules))
    }

    #[test]
    fn entries_expire_after_ttl() {
        let mut cache = IdempotencyCache::new(Duration::from_secs(10));
        let t0 = Instant::now();
        let response = response();
        cache.store_at(GameId(1), "k", &Command::EndTurn, &response, t0);

        let hit = cache.lookup_at(GameId(1), "k", &Command::EndTurn, t0 + Duration::from_secs(9)).unwrap();
        assert_eq!(hit, Some(response));
        let miss = cache.lookup_at(GameId(1), "k", &Command::EndTurn, t0 + Duration::from_secs(10)).unwrap();
        assert_eq!(miss, None);

        cache.purge_expired(t0 + Duration::from_secs(11));
        assert!(cache.is_empty());
    }

    #[test]
    fn keys_are_scoped_per_game() {
        let mut cache = IdempotencyCache::new(Duration::from_secs(60));
        cache.store(GameId(1), "k", &Command::EndTurn, &response());
        assert_eq!(cache.lookup(GameId(2), "k", &Command::EndTurn).unwrap(), None);
        assert_eq!(
            cache.lookup(GameId(1), "k", &Command::MoveUnit { unit_id: crate::types::UnitId(0), target: crate::grid::Position::new(0, 0) }),
            Err(ActionError::IdempotencyConflict)
        );
    }
}
