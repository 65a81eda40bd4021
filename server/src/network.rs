//! Server network layer handling WebSocket sessions and event dispatch

use crate::broadcast::{into_message, Broadcaster};
use crate::config::ServerConfig;
use crate::handler::{self, Effect};
use crate::registry::ConnectionRegistry;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{decode_binary, decode_text, ClientEvent, Codec, ServerEvent};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

/// Messages sent from connection tasks to the dispatcher
#[derive(Debug)]
pub enum ServerMessage {
    Connected {
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Message>,
        reply: oneshot::Sender<Option<u32>>,
    },
    Event {
        connection_id: u32,
        event: ClientEvent,
        codec: Codec,
    },
    Disconnected {
        connection_id: u32,
    },
    Shutdown,
}

/// Owns all synchronization state and applies events one at a time
///
/// Every registry mutation and every broadcast happens inside
/// [`Dispatcher::handle_message`], so events are never interleaved.
pub struct Dispatcher {
    registry: ConnectionRegistry,
    broadcaster: Broadcaster,
    config: ServerConfig,
}

impl Dispatcher {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            registry: ConnectionRegistry::new(config.max_clients),
            broadcaster: Broadcaster::new(),
            config,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Processes one message, returns false once the server should stop
    pub fn handle_message(&mut self, message: ServerMessage) -> bool {
        match message {
            ServerMessage::Connected {
                addr,
                sender,
                reply,
            } => {
                let connection_id = self.handle_connect(addr, sender);
                if reply.send(connection_id).is_err() {
                    // Connection task vanished before learning its id
                    if let Some(id) = connection_id {
                        self.handle_disconnect(id);
                    }
                }
            }
            ServerMessage::Event {
                connection_id,
                event,
                codec,
            } => {
                self.broadcaster.set_codec(connection_id, codec);
                let effect = handler::dispatch(&mut self.registry, connection_id, event);
                self.apply_effect(connection_id, effect);
            }
            ServerMessage::Disconnected { connection_id } => {
                self.handle_disconnect(connection_id);
            }
            ServerMessage::Shutdown => {
                info!("Server shutting down");
                return false;
            }
        }
        true
    }

    fn handle_connect(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Message>,
    ) -> Option<u32> {
        let connection_id = match self.registry.connect(addr) {
            Ok(id) => id,
            Err(e) => {
                warn!("Refusing connection from {}: {}", addr, e);
                let notice = ServerEvent::Rejected { reason: e.reason() };
                if let Ok(frame) = Codec::Json.encode(&notice) {
                    let _ = sender.send(into_message(frame));
                }
                let _ = sender.send(Message::Close(None));
                return None;
            }
        };

        self.broadcaster.attach(connection_id, sender);
        self.send_or_log(connection_id, &ServerEvent::Welcome { id: connection_id });

        if self.config.sync_on_join {
            let snapshot = ServerEvent::UserList(self.registry.list_all());
            self.send_or_log(connection_id, &snapshot);
        }

        Some(connection_id)
    }

    fn handle_disconnect(&mut self, connection_id: u32) {
        self.broadcaster.detach(connection_id);
        let effect = handler::handle_disconnect(&mut self.registry, connection_id);
        self.apply_effect(connection_id, effect);
    }

    fn apply_effect(&mut self, connection_id: u32, effect: Effect) {
        match effect {
            Effect::Broadcast => {
                if let Err(e) = self.broadcaster.publish(&self.registry.list_all()) {
                    error!("Failed to encode snapshot: {}", e);
                }
            }
            Effect::Reject(reason) => {
                if self.config.notify_rejections {
                    let notice = ServerEvent::Rejected {
                        reason: reason.reason(),
                    };
                    self.send_or_log(connection_id, &notice);
                }
            }
            Effect::None => {}
        }
    }

    fn send_or_log(&self, connection_id: u32, event: &ServerEvent) {
        if let Err(e) = self.broadcaster.send_to(connection_id, event) {
            warn!("{}", e);
        }
    }
}

/// WebSocket server feeding a single [`Dispatcher`]
pub struct Server {
    listener: TcpListener,
    dispatcher: Dispatcher,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(config.address()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            dispatcher: Dispatcher::new(config),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Sender that stops the dispatcher when given [`ServerMessage::Shutdown`]
    pub fn handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Accepts connections and dispatches their events until shut down
    pub async fn run(self) {
        let Server {
            listener,
            mut dispatcher,
            server_tx,
            mut server_rx,
        } = self;

        let acceptor = tokio::spawn(accept_loop(listener, server_tx));
        info!("Server started successfully");

        while let Some(message) = server_rx.recv().await {
            if !dispatcher.handle_message(message) {
                break;
            }
        }

        acceptor.abort();
    }
}

async fn accept_loop(listener: TcpListener, server_tx: mpsc::UnboundedSender<ServerMessage>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tokio::spawn(handle_connection(stream, addr, server_tx.clone()));
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

/// Drives one WebSocket from handshake to disconnect
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };
    let (mut sink, mut stream) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = sink.send(message).await {
                debug!("Write to {} failed: {}", addr, e);
                break;
            }
            if closing {
                break;
            }
        }
    });

    let (reply_tx, reply_rx) = oneshot::channel();
    let connected = ServerMessage::Connected {
        addr,
        sender: out_tx,
        reply: reply_tx,
    };
    if server_tx.send(connected).is_err() {
        error!("Dispatcher is gone, dropping connection from {}", addr);
        writer.abort();
        return;
    }

    let connection_id = match reply_rx.await {
        Ok(Some(id)) => id,
        _ => {
            // Refused, let the writer flush the notice and close frame
            let _ = writer.await;
            return;
        }
    };

    while let Some(frame) = stream.next().await {
        let decoded = match frame {
            Ok(Message::Text(text)) => {
                Some(decode_text::<ClientEvent>(text.as_str()).map(|e| (e, Codec::Json)))
            }
            Ok(Message::Binary(bytes)) => {
                Some(decode_binary::<ClientEvent>(&bytes[..]).map(|e| (e, Codec::Binary)))
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => None,
            Err(e) => {
                debug!("Read from connection {} failed: {}", connection_id, e);
                break;
            }
        };

        match decoded {
            Some(Ok((event, codec))) => {
                let message = ServerMessage::Event {
                    connection_id,
                    event,
                    codec,
                };
                if server_tx.send(message).is_err() {
                    break;
                }
            }
            Some(Err(e)) => {
                warn!("Malformed frame from connection {}: {}", connection_id, e);
            }
            None => {}
        }
    }

    if let Err(e) = server_tx.send(ServerMessage::Disconnected { connection_id }) {
        error!("Failed to report disconnect: {}", e);
    }
    writer.abort();
}
