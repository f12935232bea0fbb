//! One task per session.
//!
//! The task owns the [`Session`] and applies commands strictly one at a
//! time in the order they arrive. Accepted outcomes are published through
//! the relay before the caller hears back, so every subscriber sees the
//! events of command N before any event of command N+1. Events meant for
//! one player are sent to that player's connection alone.

use crate::protocol::ServerMessage;
use crate::relay::{ClientId, ClientSender, SessionEventRelay};
use hextrade_core::{GameError, Intent, Outcome, PlayerId, Session, SessionSnapshot};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session {0} is closed")]
    Closed(String),

    #[error(transparent)]
    Game(#[from] GameError),
}

type Reply<T> = oneshot::Sender<Result<T, GameError>>;

enum Command {
    Join {
        client: ClientId,
        name: String,
        sender: ClientSender,
        reply: Reply<(PlayerId, SessionSnapshot)>,
    },
    Ready {
        player: PlayerId,
        ready: bool,
        reply: Reply<()>,
    },
    Intent {
        player: PlayerId,
        intent: Intent,
        reply: Reply<()>,
    },
    Leave {
        player: PlayerId,
        client: ClientId,
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        viewer: Option<PlayerId>,
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Close,
}

/// Cloneable handle to a running session task
#[derive(Debug, Clone)]
pub struct SessionHandle {
    code: String,
    commands: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Join { .. } => "join",
            Command::Ready { .. } => "ready",
            Command::Intent { intent, .. } => intent.name(),
            Command::Leave { .. } => "leave",
            Command::Snapshot { .. } => "snapshot",
            Command::Close => "close",
        };
        f.write_str(name)
    }
}

/// Start the task that owns `session`
pub fn spawn(session: Session, relay: Arc<SessionEventRelay>) -> SessionHandle {
    let code = session.code().to_string();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(session, relay, rx));
    info!(session = %code, "session started");
    SessionHandle { code, commands: tx }
}

async fn run(
    mut session: Session,
    relay: Arc<SessionEventRelay>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let code = session.code().to_string();

    while let Some(command) = commands.recv().await {
        debug!(session = %code, command = ?command, "applying command");
        match command {
            Command::Join {
                client,
                name,
                sender,
                reply,
            } => {
                let result = session.add_player(name).map(|(player, outcome)| {
                    relay.subscribe(&code, client, player, sender);
                    publish(&relay, &code, outcome);
                    (player, session.snapshot(Some(player)))
                });
                let _ = reply.send(result);
            }

            Command::Ready { player, ready, reply } => {
                let result = session.set_ready(player, ready).map(|outcome| {
                    publish(&relay, &code, outcome);
                });
                let _ = reply.send(result);
            }

            Command::Intent {
                player,
                intent,
                reply,
            } => {
                let name = intent.name();
                let result = session.apply(player, intent).map(|outcome| {
                    publish(&relay, &code, outcome);
                });
                match &result {
                    Ok(_) => debug!(session = %code, player, intent = name, "intent accepted"),
                    Err(e) => info!(session = %code, player, intent = name, error = %e, "intent rejected"),
                }
                let _ = reply.send(result);
            }

            Command::Leave {
                player,
                client,
                reply,
            } => {
                relay.unsubscribe(&code, client);
                match session.set_active(player, false) {
                    Ok(outcome) => publish(&relay, &code, outcome),
                    Err(e) => warn!(session = %code, player, error = %e, "leave for unknown player"),
                }
                let closed = session.is_abandoned();
                let _ = reply.send(closed);
                if closed {
                    break;
                }
            }

            Command::Snapshot { viewer, reply } => {
                let _ = reply.send(session.snapshot(viewer));
            }

            Command::Close => break,
        }
    }

    relay.drop_session(&code);
    info!(session = %code, "session closed");
}

fn publish(relay: &SessionEventRelay, code: &str, outcome: Outcome) {
    for event in outcome.public {
        relay.publish(code, event);
    }
    for whisper in outcome.private {
        if !relay.send_to_player(code, whisper.to, ServerMessage::Private { event: whisper.event }) {
            debug!(session = %code, player = whisper.to, "private event had no listener");
        }
    }
}

impl SessionHandle {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| SessionError::Closed(self.code.clone()))?;
        rx.await.map_err(|_| SessionError::Closed(self.code.clone()))
    }

    /// Seat a new player and subscribe their connection to the session
    pub async fn join(
        &self,
        client: ClientId,
        name: String,
        sender: ClientSender,
    ) -> Result<(PlayerId, SessionSnapshot), SessionError> {
        let result = self
            .request(|reply| Command::Join {
                client,
                name,
                sender,
                reply,
            })
            .await?;
        Ok(result?)
    }

    pub async fn set_ready(&self, player: PlayerId, ready: bool) -> Result<(), SessionError> {
        let result = self
            .request(|reply| Command::Ready { player, ready, reply })
            .await?;
        Ok(result?)
    }

    /// Apply an intent. Its events have been delivered by the time this returns.
    pub async fn submit(&self, player: PlayerId, intent: Intent) -> Result<(), SessionError> {
        let result = self
            .request(|reply| Command::Intent {
                player,
                intent,
                reply,
            })
            .await?;
        Ok(result?)
    }

    /// Mark a player as gone. Returns true if the session closed as a result.
    pub async fn leave(&self, player: PlayerId, client: ClientId) -> Result<bool, SessionError> {
        self.request(|reply| Command::Leave {
            player,
            client,
            reply,
        })
        .await
    }

    pub async fn snapshot(&self, viewer: Option<PlayerId>) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| Command::Snapshot { viewer, reply }).await
    }

    /// Stop the session. Commands already queued are still applied.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }
}
