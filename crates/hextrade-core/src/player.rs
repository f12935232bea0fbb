//! Player state.
//!
//! Resource counts are not stored here; they live in the session's
//! [`ResourceLedger`](crate::ledger::ResourceLedger) so there is exactly one
//! mutator for them.

use crate::dev_cards::{DevCard, DevCardKind};
use serde::{Deserialize, Serialize};

/// Player identifier (seat index within a session)
pub type PlayerId = u8;

/// Player color for UI rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerColor {
    Red,
    Blue,
    Orange,
    White,
    Green,
    Brown,
}

impl PlayerColor {
    /// Get color for a seat index
    pub fn for_player(id: PlayerId) -> Self {
        match id % 6 {
            0 => PlayerColor::Red,
            1 => PlayerColor::Blue,
            2 => PlayerColor::Orange,
            3 => PlayerColor::White,
            4 => PlayerColor::Green,
            _ => PlayerColor::Brown,
        }
    }
}

/// Pieces a player has not yet placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceSupply {
    pub roads: u32,
    pub settlements: u32,
    pub cities: u32,
}

impl Default for PieceSupply {
    fn default() -> Self {
        Self {
            roads: 15,
            settlements: 5,
            cities: 4,
        }
    }
}

/// A single player's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: PlayerColor,
    /// Development cards, used or not, in draw order
    pub dev_cards: Vec<DevCard>,
    /// Points from buildings and point cards
    pub points: u32,
    /// Length of this player's longest continuous road
    pub longest_road: u32,
    /// Robber cards played
    pub robber_uses: u32,
    pub ready: bool,
    /// False once the player's connection is gone; turn advance skips them
    pub active: bool,
    pub pieces: PieceSupply,
    /// Settlements placed so far, founding ones included
    pub settlements_built: u32,
    /// Roads placed so far, founding ones included
    pub roads_built: u32,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            color: PlayerColor::for_player(id),
            dev_cards: Vec::new(),
            points: 0,
            longest_road: 0,
            robber_uses: 0,
            ready: false,
            active: true,
            pieces: PieceSupply::default(),
            settlements_built: 0,
            roads_built: 0,
        }
    }

    /// Number of development cards held (used cards included)
    pub fn hand_size(&self) -> usize {
        self.dev_cards.len()
    }

    pub fn unused_cards(&self) -> impl Iterator<Item = &DevCard> {
        self.dev_cards.iter().filter(|c| !c.used)
    }

    /// Unused cards of one kind
    pub fn count_unused(&self, kind: DevCardKind) -> usize {
        self.unused_cards().filter(|c| c.kind == kind).count()
    }

    /// A copy of this player with card contents removed, for other viewers
    pub fn redacted(&self) -> Player {
        Player {
            dev_cards: Vec::new(),
            ..self.clone()
        }
    }
}
