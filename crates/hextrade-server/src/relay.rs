//! Per-session broadcast of game events.
//!
//! Each session is a channel with its own sequence counter. A publish holds
//! the channel's entry while it numbers the event and hands it to every
//! subscriber, so all subscribers see one total order per session.

use crate::protocol::ServerMessage;
use dashmap::DashMap;
use hextrade_core::{GameEvent, PlayerId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Connection identifier
pub type ClientId = Uuid;

/// Outbound queue of one connection
pub type ClientSender = mpsc::UnboundedSender<ServerMessage>;

#[derive(Debug)]
struct Subscriber {
    client: ClientId,
    player: PlayerId,
    sender: ClientSender,
}

#[derive(Debug, Default)]
struct Channel {
    next_seq: u64,
    subscribers: Vec<Subscriber>,
}

#[derive(Debug, Default)]
pub struct SessionEventRelay {
    channels: DashMap<String, Channel>,
}

impl SessionEventRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start delivering a session's events to a client seated as `player`.
    ///
    /// Re-subscribing the same client replaces its entry.
    pub fn subscribe(&self, session: &str, client: ClientId, player: PlayerId, sender: ClientSender) {
        let mut channel = self.channels.entry(session.to_string()).or_default();
        channel.subscribers.retain(|s| s.client != client);
        channel.subscribers.push(Subscriber {
            client,
            player,
            sender,
        });
        info!(
            session = %session,
            client = %client,
            player,
            subscribers = channel.subscribers.len(),
            "client subscribed"
        );
    }

    /// Stop delivering to a client. Returns whether it was subscribed.
    pub fn unsubscribe(&self, session: &str, client: ClientId) -> bool {
        let Some(mut channel) = self.channels.get_mut(session) else {
            return false;
        };
        let before = channel.subscribers.len();
        channel.subscribers.retain(|s| s.client != client);
        let removed = channel.subscribers.len() != before;
        if removed {
            info!(session = %session, client = %client, "client unsubscribed");
        }
        removed
    }

    /// Deliver an event to every current subscriber of a session.
    ///
    /// Returns the sequence number given to the event, or `None` if the
    /// session has no channel. Subscribers whose connection is gone are
    /// dropped.
    pub fn publish(&self, session: &str, event: GameEvent) -> Option<u64> {
        let Some(mut channel) = self.channels.get_mut(session) else {
            debug!(session = %session, "no channel for session");
            return None;
        };

        let seq = channel.next_seq;
        channel.next_seq += 1;
        let msg = ServerMessage::Event {
            session: session.to_string(),
            seq,
            event,
        };

        debug!(
            session = %session,
            seq,
            subscribers = channel.subscribers.len(),
            "publishing event"
        );
        channel.subscribers.retain(|s| {
            let delivered = s.sender.send(msg.clone()).is_ok();
            if !delivered {
                warn!(session = %session, client = %s.client, "dropping closed subscriber");
            }
            delivered
        });
        Some(seq)
    }

    /// Send a message to the subscriber seated as `player` only
    pub fn send_to_player(&self, session: &str, player: PlayerId, msg: ServerMessage) -> bool {
        self.channels
            .get(session)
            .and_then(|channel| {
                channel
                    .subscribers
                    .iter()
                    .find(|s| s.player == player)
                    .map(|s| s.sender.send(msg).is_ok())
            })
            .unwrap_or(false)
    }

    pub fn subscriber_count(&self, session: &str) -> usize {
        self.channels
            .get(session)
            .map(|channel| channel.subscribers.len())
            .unwrap_or(0)
    }

    /// Forget a session and all its subscribers
    pub fn drop_session(&self, session: &str) {
        if self.channels.remove(session).is_some() {
            info!(session = %session, "session channel closed");
        }
    }
}
