use crate::store::StoreError;
use hexrule_engine::error::ActionError;
use hexrule_engine::types::GameId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error("game {0} not found")]
    GameNotFound(GameId),
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

impl HostError {
    /// The rules-level rejection, if this is one.
    pub fn action(&self) -> Option<&ActionError> {
        match self {
            HostError::Action(e) => Some(e),
            _ => None,
        }
    }
}
