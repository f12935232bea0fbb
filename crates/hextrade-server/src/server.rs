//! WebSocket server and connection handling.

use crate::config::ServerConfig;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::relay::{ClientId, ClientSender, SessionEventRelay};
use crate::sequencer::{self, SessionError, SessionHandle};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use hextrade_core::{PlayerId, Session};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;

const CODE_LEN: usize = 6;

/// Where a connection is seated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub code: String,
    pub player: PlayerId,
}

/// Server state shared across all connections.
pub struct ServerState {
    pub config: ServerConfig,
    /// Running sessions by room code
    pub sessions: DashMap<String, SessionHandle>,
    pub relay: Arc<SessionEventRelay>,
    /// Outbound queue of every connection
    pub client_senders: DashMap<ClientId, ClientSender>,
    /// Mapping from connection to its seat
    pub seats: DashMap<ClientId, Seat>,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            sessions: DashMap::new(),
            relay: Arc::new(SessionEventRelay::new()),
            client_senders: DashMap::new(),
            seats: DashMap::new(),
        }
    }

    /// Track a new connection and return the queue its messages land in.
    pub fn register(&self, client: ClientId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.client_senders.insert(client, tx);
        rx
    }

    /// Send a message to a specific connection.
    pub fn send_to_client(&self, client: ClientId, msg: ServerMessage) {
        if let Some(sender) = self.client_senders.get(&client) {
            let _ = sender.send(msg);
        }
    }

    fn seat(&self, client: ClientId) -> Option<Seat> {
        self.seats.get(&client).map(|s| s.clone())
    }

    fn session(&self, code: &str) -> Option<SessionHandle> {
        let handle = self.sessions.get(code).map(|h| h.clone())?;
        if handle.is_closed() {
            self.sessions.remove(code);
            return None;
        }
        Some(handle)
    }

    fn fresh_code(&self) -> String {
        loop {
            let code: String = Uuid::new_v4()
                .simple()
                .to_string()
                .chars()
                .take(CODE_LEN)
                .collect::<String>()
                .to_ascii_uppercase();
            if !self.sessions.contains_key(&code) {
                return code;
            }
        }
    }

    /// Open a session with the configured rules
    fn create_session(&self) -> Result<SessionHandle, String> {
        let code = self.fresh_code();
        let session = Session::new(code.clone(), self.config.rules()).map_err(|e| e.to_string())?;
        let handle = sequencer::spawn(session, Arc::clone(&self.relay));
        self.sessions.insert(code, handle.clone());
        Ok(handle)
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

/// Run the WebSocket server.
pub async fn run_server(state: Arc<ServerState>) -> anyhow::Result<()> {
    let addr = state.config.addr;
    let listener = TcpListener::bind(addr).await?;
    info!("Hextrade server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let client_id = Uuid::new_v4();
    let mut rx = state.register(client_id);

    let welcome = ServerMessage::Welcome { client_id };
    ws_sender
        .send(Message::Text(serde_json::to_string(&welcome)?))
        .await?;

    // Forward queued messages to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Failed to encode message: {}", e),
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_message(client_id, client_msg, &state).await,
                Err(e) => {
                    warn!("Invalid message from {}: {}", client_id, e);
                    state.send_to_client(client_id, ServerMessage::error(format!("Invalid message: {e}")));
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", client_id);
                break;
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", client_id, e);
                break;
            }
            _ => {}
        }
    }

    handle_disconnect(client_id, &state).await;
    state.client_senders.remove(&client_id);
    send_task.abort();

    info!("Connection closed for {}", client_id);
    Ok(())
}

/// Handle a client message.
pub async fn handle_message(client: ClientId, msg: ClientMessage, state: &ServerState) {
    match msg {
        ClientMessage::CreateSession { player_name } => {
            if state.seat(client).is_some() {
                state.send_to_client(client, ServerMessage::error("Already in a session"));
                return;
            }
            match state.create_session() {
                Ok(handle) => {
                    info!(session = %handle.code(), client = %client, "session created");
                    join(client, handle, player_name, state).await;
                }
                Err(e) => state.send_to_client(client, ServerMessage::error(e)),
            }
        }

        ClientMessage::JoinSession { code, player_name } => {
            if state.seat(client).is_some() {
                state.send_to_client(client, ServerMessage::error("Already in a session"));
                return;
            }
            match state.session(&code.to_ascii_uppercase()) {
                Some(handle) => join(client, handle, player_name, state).await,
                None => state.send_to_client(client, ServerMessage::error("Session not found")),
            }
        }

        ClientMessage::LeaveSession => {
            if leave(client, state).await {
                state.send_to_client(client, ServerMessage::Left);
            } else {
                state.send_to_client(client, ServerMessage::error("Not in a session"));
            }
        }

        ClientMessage::SetReady { ready } => {
            let Some((seat, handle)) = seated(client, state) else {
                return;
            };
            if let Err(e) = handle.set_ready(seat.player, ready).await {
                report(client, "set_ready", e, state);
            }
        }

        ClientMessage::Intent { intent } => {
            let Some((seat, handle)) = seated(client, state) else {
                return;
            };
            let name = intent.name();
            if let Err(e) = handle.submit(seat.player, intent).await {
                report(client, name, e, state);
            }
        }

        ClientMessage::RequestSnapshot => {
            let Some((seat, handle)) = seated(client, state) else {
                return;
            };
            match handle.snapshot(Some(seat.player)).await {
                Ok(snapshot) => state.send_to_client(
                    client,
                    ServerMessage::Snapshot {
                        snapshot: Box::new(snapshot),
                    },
                ),
                Err(e) => state.send_to_client(client, ServerMessage::error(e.to_string())),
            }
        }

        ClientMessage::Ping => {
            state.send_to_client(client, ServerMessage::Pong);
        }
    }
}

async fn join(client: ClientId, handle: SessionHandle, player_name: String, state: &ServerState) {
    let Some(sender) = state.client_senders.get(&client).map(|s| s.clone()) else {
        return;
    };
    match handle.join(client, player_name, sender).await {
        Ok((player, snapshot)) => {
            let code = handle.code().to_string();
            state.seats.insert(
                client,
                Seat {
                    code: code.clone(),
                    player,
                },
            );
            state.send_to_client(
                client,
                ServerMessage::Joined {
                    code,
                    player,
                    snapshot: Box::new(snapshot),
                },
            );
        }
        Err(e) => report(client, "join", e, state),
    }
}

/// Look up the caller's seat and session, telling them if they have none
fn seated(client: ClientId, state: &ServerState) -> Option<(Seat, SessionHandle)> {
    let found = state
        .seat(client)
        .and_then(|seat| state.session(&seat.code).map(|handle| (seat, handle)));
    if found.is_none() {
        state.send_to_client(client, ServerMessage::error("Not in a session"));
    }
    found
}

fn report(client: ClientId, action: &str, err: SessionError, state: &ServerState) {
    let msg = match err {
        SessionError::Game(e) => ServerMessage::rejected(action, e),
        closed @ SessionError::Closed(_) => ServerMessage::error(closed.to_string()),
    };
    state.send_to_client(client, msg);
}

/// Vacate the client's seat. Returns false if it had none.
async fn leave(client: ClientId, state: &ServerState) -> bool {
    let Some((_, seat)) = state.seats.remove(&client) else {
        return false;
    };
    if let Some(handle) = state.session(&seat.code) {
        match handle.leave(seat.player, client).await {
            Ok(true) => {
                state.sessions.remove(&seat.code);
                info!(session = %seat.code, "session abandoned");
            }
            Ok(false) => {}
            Err(e) => warn!(session = %seat.code, "leave failed: {}", e),
        }
    }
    true
}

/// Handle client disconnect.
async fn handle_disconnect(client: ClientId, state: &ServerState) {
    leave(client, state).await;
}
