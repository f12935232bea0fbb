//! WebSocket protocol messages for Hextrade multiplayer.

use hextrade_core::{GameError, GameEvent, Intent, PlayerId, SessionSnapshot};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Open a new session and take the first seat
    CreateSession { player_name: String },

    /// Join an existing session by room code
    JoinSession { code: String, player_name: String },

    /// Leave the current session
    LeaveSession,

    /// Toggle ready in the lobby
    SetReady { ready: bool },

    /// Submit a game intent
    Intent { intent: Intent },

    /// Ask for a full view of the session
    RequestSnapshot,

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with assigned client ID
    Welcome { client_id: Uuid },

    /// Seated in a session
    Joined {
        code: String,
        player: PlayerId,
        snapshot: Box<SessionSnapshot>,
    },

    /// Left the session
    Left,

    /// A session event, numbered in publish order
    Event {
        session: String,
        seq: u64,
        event: GameEvent,
    },

    /// An event only this client may see
    Private { event: GameEvent },

    /// An intent was refused; nothing changed
    Rejected {
        intent: String,
        error: GameError,
        message: String,
    },

    /// Full session view
    Snapshot { snapshot: Box<SessionSnapshot> },

    /// Error not tied to a game rule
    Error { message: String },

    /// Pong response
    Pong,
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn rejected(intent: &str, error: GameError) -> Self {
        ServerMessage::Rejected {
            intent: intent.to_string(),
            message: error.to_string(),
            error,
        }
    }
}
