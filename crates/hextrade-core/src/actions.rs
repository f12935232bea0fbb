//! Intents players submit and the events they produce.

use crate::board::{Board, Resource, TileId};
use crate::dev_cards::{DevCardKind, Effect};
use crate::hex::{EdgeCoord, VertexCoord};
use crate::ledger::{ResourceDelta, ResourceHand};
use crate::player::PlayerId;
use crate::session::GamePhase;
use crate::structures::Structure;
use crate::trade::{OfferId, TradeOffer, TradeResolution, TradeTarget};
use serde::{Deserialize, Serialize};

/// A request to change game state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Intent {
    RollDice,
    BuildRoad(EdgeCoord),
    BuildSettlement(VertexCoord),
    /// Upgrade one of your settlements
    BuildCity(VertexCoord),
    BuyDevCard,
    /// Use the card at this index of your hand
    UseDevCard(usize),
    ProposeTrade {
        give: ResourceHand,
        receive: ResourceHand,
        to: TradeTarget,
    },
    RespondTrade {
        offer: OfferId,
        accept: bool,
    },
    CancelTrade(OfferId),
    MoveRobber {
        tile: TileId,
        steal_from: Option<PlayerId>,
    },
    EndTurn,
}

impl Intent {
    /// Short label for logs
    pub fn name(&self) -> &'static str {
        match self {
            Intent::RollDice => "roll_dice",
            Intent::BuildRoad(_) => "build_road",
            Intent::BuildSettlement(_) => "build_settlement",
            Intent::BuildCity(_) => "build_city",
            Intent::BuyDevCard => "buy_dev_card",
            Intent::UseDevCard(_) => "use_dev_card",
            Intent::ProposeTrade { .. } => "propose_trade",
            Intent::RespondTrade { .. } => "respond_trade",
            Intent::CancelTrade(_) => "cancel_trade",
            Intent::MoveRobber { .. } => "move_robber",
            Intent::EndTurn => "end_turn",
        }
    }
}

/// State changes broadcast to a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum GameEvent {
    /// Sent once when the game starts
    BoardSnapshot {
        board: Board,
        robber: Option<TileId>,
    },

    PlayerJoined {
        player: PlayerId,
        name: String,
    },

    PlayerReady {
        player: PlayerId,
        ready: bool,
    },

    /// A player's connection went away or came back
    PlayerActivity {
        player: PlayerId,
        active: bool,
    },

    DiceRolled {
        player: PlayerId,
        dice: (u8, u8),
        total: u8,
    },

    ResourcesChanged {
        deltas: Vec<ResourceDelta>,
    },

    StructureAdded {
        structure: Structure,
    },

    PointsChanged {
        player: PlayerId,
        points: u32,
    },

    LongestRoadChanged {
        player: PlayerId,
        length: u32,
    },

    /// Public: only the new hand size
    DevCardBought {
        player: PlayerId,
        hand_size: usize,
    },

    /// Private to the buyer
    DevCardDrawn {
        index: usize,
        kind: DevCardKind,
    },

    DevCardUsed {
        player: PlayerId,
        index: usize,
        kind: DevCardKind,
        effect: Effect,
    },

    RobberMoved {
        player: PlayerId,
        from: Option<TileId>,
        to: TileId,
    },

    /// A card count moved without saying which resource it was
    HandSizeChanged {
        player: PlayerId,
        change: i64,
    },

    /// `resource` is only filled in for the thief and the victim
    ResourceStolen {
        thief: PlayerId,
        victim: PlayerId,
        resource: Option<Resource>,
    },

    TradeProposed {
        offer: TradeOffer,
    },

    TradeResolved {
        offer: TradeOffer,
        resolution: TradeResolution,
    },

    PhaseChanged {
        phase: GamePhase,
    },

    TurnChanged {
        player: PlayerId,
        turn: u32,
    },

    /// Human-readable history line
    Narration {
        text: String,
    },
}

/// An event for one player only
#[derive(Debug, Clone, PartialEq)]
pub struct Whisper {
    pub to: PlayerId,
    pub event: GameEvent,
}

/// Events produced by one accepted intent.
///
/// `public` goes to every subscriber of the session, each entry of
/// `private` only to the player it names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub public: Vec<GameEvent>,
    pub private: Vec<Whisper>,
}

impl Outcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: GameEvent) {
        self.public.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = GameEvent>) {
        self.public.extend(events);
    }

    /// Queue an event for one player only
    pub fn whisper(&mut self, to: PlayerId, event: GameEvent) {
        self.private.push(Whisper { to, event });
    }

    /// Private events addressed to `player`
    pub fn private_for(&self, player: PlayerId) -> impl Iterator<Item = &GameEvent> + '_ {
        self.private
            .iter()
            .filter(move |w| w.to == player)
            .map(|w| &w.event)
    }

    pub fn narrate(&mut self, text: impl Into<String>) {
        self.public.push(GameEvent::Narration { text: text.into() });
    }
}
