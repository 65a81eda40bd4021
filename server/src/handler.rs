//! Per-connection event handling
//!
//! Each inbound event maps to a handler that takes the registry, the
//! originating connection id and the payload, and reports what the
//! dispatcher should do next. Handlers never touch the network, so the
//! whole protocol can be exercised without a socket.
//!
//! A connection is anonymous until a valid `setName` arrives and named
//! from then on. Moves from anonymous connections are dropped.

use crate::error::SyncError;
use crate::registry::ConnectionRegistry;
use log::{debug, warn};
use shared::{ClientEvent, Position};

/// Outcome of handling one event
#[derive(Debug)]
pub enum Effect {
    /// State changed, every session must receive a fresh snapshot
    Broadcast,
    /// The event was dropped without changing state
    Reject(SyncError),
    /// Nothing visible changed
    None,
}

impl Effect {
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Effect::Broadcast)
    }
}

/// Routes a decoded client event to its handler
pub fn dispatch(registry: &mut ConnectionRegistry, connection_id: u32, event: ClientEvent) -> Effect {
    match event {
        ClientEvent::SetName { name, color } => {
            handle_set_name(registry, connection_id, &name, color.as_deref())
        }
        ClientEvent::Move { x, y, z } => handle_move(registry, connection_id, x, y, z),
    }
}

/// Registers or renames the connection
pub fn handle_set_name(
    registry: &mut ConnectionRegistry,
    connection_id: u32,
    name: &str,
    color: Option<&str>,
) -> Effect {
    match registry.register(connection_id, name, color) {
        Ok(_) => Effect::Broadcast,
        Err(e) => {
            warn!("Dropping setName from connection {}: {}", connection_id, e);
            Effect::Reject(e)
        }
    }
}

/// Moves a named connection, last write wins
pub fn handle_move(
    registry: &mut ConnectionRegistry,
    connection_id: u32,
    x: f32,
    y: Option<f32>,
    z: f32,
) -> Effect {
    let target = Position {
        x,
        y: y.unwrap_or(0.0),
        z,
    };
    if !target.is_finite() {
        warn!("Dropping move from connection {}: non-finite coordinates", connection_id);
        return Effect::Reject(SyncError::non_finite_position());
    }

    match registry.update_position(connection_id, x, y, z) {
        Some(participant) => {
            debug!(
                "Connection {} moved to ({}, {}, {})",
                connection_id, participant.x, participant.y, participant.z
            );
            Effect::Broadcast
        }
        None => {
            debug!("Ignoring move from unregistered connection {}", connection_id);
            Effect::Reject(SyncError::UnregisteredAction(connection_id))
        }
    }
}

/// Drops the connection from the registry
///
/// Only a named connection leaving changes the snapshot, so anonymous
/// disconnects do not trigger a broadcast.
pub fn handle_disconnect(registry: &mut ConnectionRegistry, connection_id: u32) -> Effect {
    match registry.remove(connection_id) {
        Some(connection) if connection.is_named() => Effect::Broadcast,
        _ => Effect::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::net::SocketAddr;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    fn set_name(name: &str, color: Option<&str>) -> ClientEvent {
        ClientEvent::SetName {
            name: name.to_string(),
            color: color.map(str::to_string),
        }
    }

    fn move_to(x: f32, z: f32) -> ClientEvent {
        ClientEvent::Move { x, y: None, z }
    }

    #[test]
    fn test_set_name_broadcasts() {
        let mut registry = ConnectionRegistry::new(4);
        let id = registry.connect(test_addr()).unwrap();

        let effect = dispatch(&mut registry, id, set_name("Alice", Some("#ff0000")));

        assert!(effect.is_broadcast());
        assert_eq!(registry.list_all().len(), 1);
    }

    #[test]
    fn test_short_name_is_rejected_without_change() {
        let mut registry = ConnectionRegistry::new(4);
        let id = registry.connect(test_addr()).unwrap();

        let effect = dispatch(&mut registry, id, set_name("ab", None));

        assert!(matches!(effect, Effect::Reject(SyncError::Validation(_))));
        assert!(registry.list_all().is_empty());
        assert!(!registry.is_named(id));
    }

    #[test]
    fn test_short_rename_keeps_previous_name() {
        let mut registry = ConnectionRegistry::new(4);
        let id = registry.connect(test_addr()).unwrap();
        dispatch(&mut registry, id, set_name("Alice", None));

        let effect = dispatch(&mut registry, id, set_name("Al", None));

        assert!(matches!(effect, Effect::Reject(_)));
        assert_eq!(registry.list_all()[0].name, "Alice");
    }

    #[test]
    fn test_second_set_name_overwrites() {
        let mut registry = ConnectionRegistry::new(4);
        let id = registry.connect(test_addr()).unwrap();
        dispatch(&mut registry, id, set_name("Alice", Some("#ff0000")));

        let effect = dispatch(&mut registry, id, set_name("Alicia", Some("#0000ff")));

        assert!(effect.is_broadcast());
        let listed = registry.list_all();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Alicia");
        assert_eq!(listed[0].color, "#0000ff");
    }

    #[test]
    fn test_move_before_set_name_is_dropped() {
        let mut registry = ConnectionRegistry::new(4);
        let id = registry.connect(test_addr()).unwrap();

        let effect = dispatch(&mut registry, id, move_to(1.0, 2.0));

        assert!(matches!(effect, Effect::Reject(SyncError::UnregisteredAction(i)) if i == id));
        assert_eq!(registry.get(id).unwrap().position, Position::origin());
    }

    #[test]
    fn test_move_after_set_name_broadcasts() {
        let mut registry = ConnectionRegistry::new(4);
        let id = registry.connect(test_addr()).unwrap();
        dispatch(&mut registry, id, set_name("Bob", None));

        let effect = dispatch(&mut registry, id, move_to(1.0, 2.0));

        assert!(effect.is_broadcast());
        let bob = &registry.list_all()[0];
        assert_approx_eq!(bob.x, 1.0);
        assert_approx_eq!(bob.z, 2.0);
    }

    #[test]
    fn test_non_finite_move_is_rejected() {
        let mut registry = ConnectionRegistry::new(4);
        let id = registry.connect(test_addr()).unwrap();
        dispatch(&mut registry, id, set_name("Bob", None));

        let effect = handle_move(&mut registry, id, f32::INFINITY, None, 0.0);

        assert!(matches!(effect, Effect::Reject(SyncError::Validation(_))));
        assert_eq!(registry.list_all()[0].position(), Position::origin());
    }

    #[test]
    fn test_disconnect_of_named_connection_broadcasts() {
        let mut registry = ConnectionRegistry::new(4);
        let id = registry.connect(test_addr()).unwrap();
        dispatch(&mut registry, id, set_name("Alice", None));

        assert!(handle_disconnect(&mut registry, id).is_broadcast());
        assert!(registry.is_empty());

        // Second disconnect is a no-op
        assert!(matches!(handle_disconnect(&mut registry, id), Effect::None));
    }

    #[test]
    fn test_disconnect_of_anonymous_connection_is_silent() {
        let mut registry = ConnectionRegistry::new(4);
        let id = registry.connect(test_addr()).unwrap();

        assert!(matches!(handle_disconnect(&mut registry, id), Effect::None));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_matches_live_connections() {
        let mut registry = ConnectionRegistry::new(8);
        let a = registry.connect(test_addr()).unwrap();
        let b = registry.connect(test_addr()).unwrap();
        let c = registry.connect(test_addr()).unwrap();

        dispatch(&mut registry, a, set_name("Alice", None));
        dispatch(&mut registry, b, set_name("Bob", None));
        dispatch(&mut registry, c, move_to(5.0, 5.0));
        handle_disconnect(&mut registry, a);

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(b));
        assert!(registry.contains(c));
        let named: Vec<u32> = registry.list_all().iter().map(|p| p.id).collect();
        assert_eq!(named, vec![b]);
    }
}
