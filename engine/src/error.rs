// ═══════════════════════════════════════════════════════════════════════
// Action errors — every way a command can be rejected
//
// Errors are values. Nothing in the core panics on bad input, and a
// rejected command never leaves a partial mutation behind.
// ═══════════════════════════════════════════════════════════════════════

use crate::types::{ParticipantId, ResourceKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ActionError {
    // ── Ownership / turn ───────────────────────────────────────────────
    #[error("it is not this participant's turn")]
    NotPlayerTurn,
    #[error("a turn advance is in progress")]
    TurnInProgress,
    #[error("the game has finished")]
    GameFinished,
    #[error("city not found or not owned by caller")]
    CityNotOwnedOrNotFound,
    #[error("city has already acted this turn")]
    CityAlreadyActed,
    #[error("unit not found or not owned by caller")]
    UnitNotOwnedOrNotFound,
    #[error("unit has already acted this turn")]
    UnitAlreadyActed,

    // ── Validation ─────────────────────────────────────────────────────
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid unit type '{0}'")]
    InvalidUnitType(String),
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("target at distance {distance} is outside range {min}..={max}")]
    OutOfRange { distance: u32, min: u32, max: u32 },
    #[error("terrain is impassable")]
    InvalidTerrain,
    #[error("tile is not adjacent to the city's territory")]
    TileNotAdjacent,
    #[error("tile is owned by an enemy city")]
    TileOwnedByEnemy,
    #[error("tile is occupied by an enemy unit")]
    TileOccupiedByEnemy,

    // ── Resources ──────────────────────────────────────────────────────
    #[error("insufficient {resource}: required {required}, current {current}")]
    InsufficientResources { resource: ResourceKind, required: u32, current: u32 },
    #[error("building '{0}' already exists in this city")]
    BuildingAlreadyExists(String),

    // ── Placement ──────────────────────────────────────────────────────
    #[error("no free tile to place the unit")]
    SpawnBlocked,

    // ── Concurrency ────────────────────────────────────────────────────
    #[error("idempotency key reused with a different command")]
    IdempotencyConflict,

    // ── Timeout ────────────────────────────────────────────────────────
    #[error("AI turn for {participant} exceeded its time budget")]
    AiTimeout { participant: ParticipantId },
}

pub type ActionResult<T> = std::result::Result<T, ActionError>;
