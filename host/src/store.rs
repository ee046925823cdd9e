// ═══════════════════════════════════════════════════════════════════════
// Store — SQLite persistence for game aggregates
//
// One row per game: the whole GameState as JSON plus the turn metadata
// needed to list saved games without decoding them.
// ═══════════════════════════════════════════════════════════════════════

use hexrule_engine::types::{GameId, GameState, GameStatus};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("codec: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Where the host saves and loads game aggregates.
pub trait SnapshotStore: Send + Sync {
    fn save(&self, state: &GameState) -> Result<(), StoreError>;
    fn load(&self, id: GameId) -> Result<Option<GameState>, StoreError>;
}

/// Listing row for a saved game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedGame {
    pub id: GameId,
    pub turn: u32,
    pub finished: bool,
    pub winner: Option<u8>,
    pub saved_at: String,
}

pub struct SqliteStore {
    // rusqlite connections are not Sync.
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database at the given path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// In-memory database (useful for tests).
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("
            CREATE TABLE IF NOT EXISTS games (
                id          INTEGER PRIMARY KEY,
                seed        INTEGER NOT NULL,
                turn        INTEGER NOT NULL,
                finished    INTEGER NOT NULL,
                winner      INTEGER,
                state       TEXT NOT NULL,
                saved_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );
        ")?;
        Ok(SqliteStore { conn: Mutex::new(conn) })
    }

    /// All saved games, newest id first.
    pub fn list(&self) -> Result<Vec<SavedGame>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, turn, finished, winner, saved_at FROM games ORDER BY id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SavedGame {
                id: GameId(row.get::<_, i64>(0)? as u64),
                turn: row.get::<_, i64>(1)? as u32,
                finished: row.get::<_, i64>(2)? != 0,
                winner: row.get::<_, Option<i64>>(3)?.map(|w| w as u8),
                saved_at: row.get(4)?,
            })
        })?;
        let saved = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(saved)
    }
}

impl SnapshotStore for SqliteStore {
    fn save(&self, state: &GameState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state)?;
        self.conn.lock().execute(
            "INSERT INTO games (id, seed, turn, finished, winner, state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                turn = excluded.turn,
                finished = excluded.finished,
                winner = excluded.winner,
                state = excluded.state,
                saved_at = datetime('now')",
            params![
                state.id.0 as i64,
                state.seed as i64,
                state.turn as i64,
                (state.status == GameStatus::Finished) as i64,
                state.winner.map(|w| w.0 as i64),
                json,
            ],
        )?;
        Ok(())
    }

    fn load(&self, id: GameId) -> Result<Option<GameState>, StoreError> {
        let json: Option<String> = self.conn.lock()
            .query_row(
                "SELECT state FROM games WHERE id = ?1",
                params![id.0 as i64],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexrule_engine::config::RulesConfig;
    use hexrule_engine::setup::{create_initial_state, GameSetup};

    fn game(id: u64) -> GameState {
        create_initial_state(GameId(id), &GameSetup::human_vs_ai(id, 1), &RulesConfig::builtin()).unwrap()
    }

    #[test]
    fn save_and_load_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let state = game(3);
        store.save(&state).unwrap();
        assert_eq!(store.load(GameId(3)).unwrap(), Some(state));
        assert_eq!(store.load(GameId(4)).unwrap(), None);
    }

    #[test]
    fn save_overwrites_and_lists() {
        let store = SqliteStore::in_memory().unwrap();
        let mut state = game(1);
        store.save(&state).unwrap();
        state.turn = 9;
        state.status = GameStatus::Finished;
        state.winner = Some(hexrule_engine::types::ParticipantId(1));
        store.save(&state).unwrap();
        store.save(&game(2)).unwrap();

        let saved = store.list().unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].id, GameId(2));
        assert_eq!(saved[1].turn, 9);
        assert!(saved[1].finished);
        assert_eq!(saved[1].winner, Some(1));
    }
}
