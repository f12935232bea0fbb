//! Rejection reasons for intents.
//!
//! Every variant is a local, recoverable rejection: the session is left
//! exactly as it was and only the originating client hears about it.

use crate::board::Resource;
use crate::player::PlayerId;
use crate::trade::OfferId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How much of one resource a player was short
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub resource: Resource,
    pub needed: u32,
    pub available: u32,
}

impl std::fmt::Display for Shortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} of {})", self.resource, self.available, self.needed)
    }
}

fn list_shortfalls(missing: &[Shortfall]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that can occur when applying intents
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Not your turn")]
    OutOfTurn,

    #[error("Insufficient resources: {}", list_shortfalls(.missing))]
    InsufficientResources { missing: Vec<Shortfall> },

    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Invalid action for current phase")]
    InvalidPhase,

    #[error("Invalid dice roll {0}+{1}")]
    InvalidRoll(u8, u8),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Unknown or resolved trade offer {0}")]
    UnknownOffer(OfferId),

    #[error("Unknown player {0}")]
    UnknownPlayer(PlayerId),

    #[error("No development card at index {0}")]
    NoSuchCard(usize),

    #[error("Development card {0} was already used")]
    CardAlreadyUsed(usize),

    #[error("Development card {0} was bought this turn")]
    CardNotReady(usize),

    #[error("Invalid trade: {0}")]
    InvalidTrade(String),

    #[error("Too many {0} in one hand")]
    ResourceOverflow(Resource),

    #[error("No {0} pieces left")]
    NoPiecesRemaining(String),

    #[error("Session is full")]
    SessionFull,

    #[error("Not enough players to start")]
    NotEnoughPlayers,

    #[error("Not every player is ready")]
    PlayersNotReady,
}

impl GameError {
    /// The resources named by an `InsufficientResources` rejection
    pub fn short_resources(&self) -> Vec<Resource> {
        match self {
            GameError::InsufficientResources { missing } => {
                missing.iter().map(|s| s.resource).collect()
            }
            _ => Vec::new(),
        }
    }
}
