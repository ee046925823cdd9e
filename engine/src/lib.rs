pub mod types;
pub mod grid;
pub mod config;
pub mod error;
pub mod combat;
pub mod economy;
pub mod mutator;
pub mod idempotency;
pub mod turn;
pub mod projection;
pub mod setup;

pub use types::*;
pub use grid::{distance, neighbors, HexGrid, Position, FIRST_NEIGHBOR, NEIGHBOR_ORDER};
pub use config::{ConfigError, RulesConfig, UnitDefinition, BuildingDefinition};
pub use error::{ActionError, ActionResult};
pub use idempotency::IdempotencyCache;
pub use mutator::{apply, apply_guarded, Response};
pub use projection::{project, StateSnapshot};
pub use setup::{create_initial_state, GameSetup};
pub use turn::{advance_turn, AiSeatOutcome, TurnAdvance, TurnGuard, TurnLedger, TurnSummary};
