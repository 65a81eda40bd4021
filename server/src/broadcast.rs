//! Fan-out of snapshots to connected sessions
//!
//! Every attached session owns an unbounded outbound queue drained by its
//! writer task. Sends never wait, so a slow client cannot stall the
//! dispatcher. Delivery is best effort: a session whose queue is gone is
//! reported and skipped, the remaining sessions still get the snapshot.

use crate::error::SyncError;
use log::{debug, warn};
use shared::{Codec, Frame, Participant, ServerEvent};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Outbound half of a connected session
#[derive(Debug)]
pub struct Session {
    pub sender: mpsc::UnboundedSender<Message>,
    pub codec: Codec,
}

/// Result of one broadcast
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: Vec<u32>,
}

#[derive(Default)]
pub struct Broadcaster {
    sessions: HashMap<u32, Session>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, connection_id: u32, sender: mpsc::UnboundedSender<Message>) {
        self.sessions.insert(
            connection_id,
            Session {
                sender,
                codec: Codec::default(),
            },
        );
    }

    pub fn detach(&mut self, connection_id: u32) -> bool {
        self.sessions.remove(&connection_id).is_some()
    }

    /// Switches the encoding used for a session's outbound frames
    pub fn set_codec(&mut self, connection_id: u32, codec: Codec) {
        if let Some(session) = self.sessions.get_mut(&connection_id) {
            if session.codec != codec {
                debug!("Connection {} switched to {:?} frames", connection_id, codec);
                session.codec = codec;
            }
        }
    }

    pub fn codec(&self, connection_id: u32) -> Option<Codec> {
        self.sessions.get(&connection_id).map(|s| s.codec)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sends the full participant list to every session, originator included
    ///
    /// The snapshot is encoded at most once per codec in use.
    pub fn publish(&self, snapshot: &[Participant]) -> Result<PublishReport, SyncError> {
        let event = ServerEvent::UserList(snapshot.to_vec());
        let mut encoded: HashMap<Codec, Message> = HashMap::new();
        let mut report = PublishReport::default();

        for (connection_id, session) in &self.sessions {
            let message = match encoded.get(&session.codec) {
                Some(message) => message.clone(),
                None => {
                    let message = into_message(session.codec.encode(&event)?);
                    encoded.insert(session.codec, message.clone());
                    message
                }
            };

            match deliver(*connection_id, session, message) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("{}", e);
                    report.failed.push(*connection_id);
                }
            }
        }

        debug!(
            "Broadcast userList ({} participants) to {} sessions, {} failed",
            snapshot.len(),
            report.delivered,
            report.failed.len()
        );
        Ok(report)
    }

    /// Sends a single event to one session
    pub fn send_to(&self, connection_id: u32, event: &ServerEvent) -> Result<(), SyncError> {
        let session = self
            .sessions
            .get(&connection_id)
            .ok_or_else(|| SyncError::Transport {
                connection_id,
                reason: "no such session".to_string(),
            })?;
        let message = into_message(session.codec.encode(event)?);
        deliver(connection_id, session, message)
    }
}

pub fn into_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(bytes) => Message::Binary(bytes.into()),
    }
}

fn deliver(connection_id: u32, session: &Session, message: Message) -> Result<(), SyncError> {
    session
        .sender
        .send(message)
        .map_err(|e| SyncError::Transport {
            connection_id,
            reason: e.to_string(),
        })
}
