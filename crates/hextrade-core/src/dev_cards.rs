//! Development cards: weighted draws and use bookkeeping.

use crate::error::GameError;
use crate::player::Player;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Development card types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevCardKind {
    /// Move the robber
    Robber,
    /// Place two roads for free
    Road,
    /// One point
    Point,
}

/// Relative draw weight of each card type
pub const CARD_WEIGHTS: [(DevCardKind, u32); 3] = [
    (DevCardKind::Robber, 5),
    (DevCardKind::Road, 1),
    (DevCardKind::Point, 1),
];

/// Free roads granted by a road card
pub const FREE_ROADS: u32 = 2;

/// A card in a player's hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevCard {
    pub kind: DevCardKind,
    pub used: bool,
    /// Turn number the card was bought on
    pub bought_on_turn: u32,
}

impl DevCard {
    pub fn new(kind: DevCardKind, bought_on_turn: u32) -> Self {
        Self {
            kind,
            used: false,
            bought_on_turn,
        }
    }
}

/// What using a card does to the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    GrantPoint,
    FreeRoads(u32),
    RobberPlacement,
}

impl DevCardKind {
    pub fn effect(&self) -> Effect {
        match self {
            DevCardKind::Robber => Effect::RobberPlacement,
            DevCardKind::Road => Effect::FreeRoads(FREE_ROADS),
            DevCardKind::Point => Effect::GrantPoint,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DevCardKind::Robber => "robber",
            DevCardKind::Road => "road building",
            DevCardKind::Point => "point",
        }
    }
}

/// Draw a card type, weighted by [`CARD_WEIGHTS`]
pub fn draw<R: Rng>(rng: &mut R) -> DevCardKind {
    let total: u32 = CARD_WEIGHTS.iter().map(|(_, w)| w).sum();
    let mut pick = rng.gen_range(0..total);
    for (kind, weight) in CARD_WEIGHTS {
        if pick < weight {
            return kind;
        }
        pick -= weight;
    }
    DevCardKind::Robber
}

/// Check that a card can be used on `turn` without changing anything
pub fn check_usable(player: &Player, index: usize, turn: u32) -> Result<DevCardKind, GameError> {
    let card = player
        .dev_cards
        .get(index)
        .ok_or(GameError::NoSuchCard(index))?;
    if card.used {
        return Err(GameError::CardAlreadyUsed(index));
    }
    if card.bought_on_turn == turn {
        return Err(GameError::CardNotReady(index));
    }
    Ok(card.kind)
}

/// Mark a card used and return its effect.
///
/// Rejects cards that are missing, already used, or bought on `turn`;
/// a rejected use leaves the hand untouched.
pub fn use_card(player: &mut Player, index: usize, turn: u32) -> Result<Effect, GameError> {
    let kind = check_usable(player, index, turn)?;
    player.dev_cards[index].used = true;
    if kind == DevCardKind::Robber {
        player.robber_uses += 1;
    }
    Ok(kind.effect())
}
