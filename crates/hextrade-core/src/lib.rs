//! Hextrade - authoritative game core for a hex-map resource-trading game
//!
//! This crate holds the rules and state of one game session:
//! - Hex coordinate system for tiles, vertices, and edges
//! - Board generation from fixed material, number and port pools
//! - The resource ledger, the only mutator of resource counts
//! - Structure placement, development cards and trading
//! - The session state machine that applies intents one at a time
//!
//! # Architecture
//!
//! The core is synchronous and does no I/O. A caller owns a [`Session`],
//! feeds it [`Intent`]s and forwards the resulting [`GameEvent`]s. All
//! randomness comes from an injected, seedable RNG.
//!
//! # Modules
//!
//! - [`hex`]: Coordinate system for hex tiles, vertices, and edges
//! - [`board`]: Board generation and layout
//! - [`ledger`]: Resource hands, costs and production
//! - [`structures`]: Roads, settlements, cities and placement rules
//! - [`dev_cards`]: Development card draws and effects
//! - [`trade`]: Player and bank trades
//! - [`session`]: The game state machine

pub mod actions;
pub mod board;
pub mod dev_cards;
pub mod error;
pub mod hex;
pub mod ledger;
pub mod player;
pub mod session;
pub mod structures;
pub mod trade;

// Re-export commonly used types
pub use actions::{GameEvent, Intent, Outcome, Whisper};
pub use board::{Board, BoardConfig, BoardError, HexTile, Material, Port, PortKind, Resource, TileId};
pub use dev_cards::{DevCard, DevCardKind, Effect};
pub use error::{GameError, Shortfall};
pub use hex::{EdgeCoord, EdgeDirection, HexCoord, VertexCoord, VertexDirection};
pub use ledger::{costs, ResourceDelta, ResourceHand, ResourceLedger};
pub use player::{Player, PlayerColor, PlayerId};
pub use session::{GamePhase, PlayerView, ResumePhase, RuleConfig, Session, SessionSnapshot};
pub use structures::{Building, BuildingKind, PlacementRules, Road, Structure, Structures};
pub use trade::{BankRates, OfferId, TradeNegotiator, TradeOffer, TradeResolution, TradeTarget};
