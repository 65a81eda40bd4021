//! Connection tracking and participant state for the presence server
//!
//! This module owns the authoritative record of every live connection:
//! - Connection lifecycle (connect, register, disconnect)
//! - Display attributes set at registration
//! - Last-write-wins position updates
//!
//! Entries exist from the moment a connection is accepted until its
//! disconnect is processed. Only named entries are visible in snapshots.

use crate::error::SyncError;
use log::info;
use shared::{default_color, is_valid_name, Participant, Position};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

/// State kept for one live connection
///
/// A connection starts anonymous at the origin with a palette color and
/// becomes named after its first successful registration.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Identifier assigned on connect, never reused
    pub id: u32,
    /// Remote address of the transport connection
    pub addr: SocketAddr,
    /// Display name, `None` until registered
    pub name: Option<String>,
    pub color: String,
    pub position: Position,
    pub connected_at: Instant,
}

impl Connection {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            name: None,
            color: default_color(id),
            position: Position::origin(),
            connected_at: Instant::now(),
        }
    }

    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    /// Snapshot view of this connection, `None` while anonymous
    pub fn participant(&self) -> Option<Participant> {
        self.name
            .as_ref()
            .map(|name| Participant::new(self.id, name.clone(), self.color.clone(), self.position))
    }
}

/// Registry of every live connection keyed by connection id
///
/// Owned by the dispatcher and mutated only from there, so no locking is
/// needed. Ids start at 1 and increase for each accepted connection.
pub struct ConnectionRegistry {
    connections: HashMap<u32, Connection>,
    next_connection_id: u32,
    max_clients: usize,
}

impl ConnectionRegistry {
    pub fn new(max_clients: usize) -> Self {
        Self {
            connections: HashMap::new(),
            next_connection_id: 1,
            max_clients,
        }
    }

    /// Adds an anonymous entry for a newly accepted connection
    ///
    /// Fails with `Capacity` when the registry already holds `max_clients`
    /// connections. A refused connection does not consume an id.
    pub fn connect(&mut self, addr: SocketAddr) -> Result<u32, SyncError> {
        if self.connections.len() >= self.max_clients {
            return Err(SyncError::Capacity(self.max_clients));
        }

        let connection_id = self.next_connection_id;
        self.next_connection_id += 1;

        info!("Connection {} opened from {}", connection_id, addr);
        self.connections
            .insert(connection_id, Connection::new(connection_id, addr));

        Ok(connection_id)
    }

    /// Sets the display name and optionally the color of a connection
    ///
    /// Registering again overwrites name and color but keeps the position.
    /// Without a color the current one is kept, which is the palette default
    /// on first registration. Unknown ids get an entry so the registry can
    /// be driven without a transport.
    pub fn register(
        &mut self,
        connection_id: u32,
        name: &str,
        color: Option<&str>,
    ) -> Result<Participant, SyncError> {
        if !is_valid_name(name) {
            return Err(SyncError::name_too_short(name));
        }

        let connection = self
            .connections
            .entry(connection_id)
            .or_insert_with(|| Connection::new(connection_id, unspecified_addr()));

        connection.name = Some(name.to_string());
        if let Some(color) = color {
            connection.color = color.to_string();
        }

        info!(
            "Connection {} registered as '{}' ({})",
            connection_id, name, connection.color
        );

        Ok(Participant::new(
            connection_id,
            name.to_string(),
            connection.color.clone(),
            connection.position,
        ))
    }

    /// Overwrites the position of a named connection
    ///
    /// Returns `None` without touching anything when the connection is
    /// unknown or still anonymous. A missing `y` keeps the current height.
    pub fn update_position(
        &mut self,
        connection_id: u32,
        x: f32,
        y: Option<f32>,
        z: f32,
    ) -> Option<Participant> {
        let connection = self.connections.get_mut(&connection_id)?;
        if !connection.is_named() {
            return None;
        }

        connection.position = Position {
            x,
            y: y.unwrap_or(connection.position.y),
            z,
        };
        connection.participant()
    }

    /// Removes a connection, returning its last state if it was present
    ///
    /// Removing an id twice is harmless.
    pub fn remove(&mut self, connection_id: u32) -> Option<Connection> {
        let removed = self.connections.remove(&connection_id);
        if let Some(connection) = &removed {
            info!(
                "Connection {} closed after {:.1}s",
                connection.id,
                connection.connected_at.elapsed().as_secs_f32()
            );
        }
        removed
    }

    /// Every named participant ordered by id
    pub fn list_all(&self) -> Vec<Participant> {
        let mut participants: Vec<Participant> = self
            .connections
            .values()
            .filter_map(Connection::participant)
            .collect();
        participants.sort_by_key(|p| p.id);
        participants
    }

    pub fn get(&self, connection_id: u32) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    pub fn contains(&self, connection_id: u32) -> bool {
        self.connections.contains_key(&connection_id)
    }

    pub fn is_named(&self, connection_id: u32) -> bool {
        self.connections
            .get(&connection_id)
            .is_some_and(Connection::is_named)
    }

    /// Returns the number of live connections, named or not
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

fn unspecified_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 0))
}
