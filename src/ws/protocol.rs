//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::command::{DirectionSet, InputCommand};
use crate::game::entity::EntityId;
use crate::game::physics::Position;

/// Transport boundary failures
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// One step of directional intent
    Input {
        /// Held directions, e.g. `["forward", "left"]`
        keys: DirectionSet,
        /// Per-entity sequence number, starts at 0
        seq: u64,
        /// Frame delta in seconds (clamped server-side)
        dt: f64,
        /// Client timestamp (unix ms)
        ct: u64,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

impl ClientMsg {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Wire form of a locally produced command
    pub fn from_command(cmd: &InputCommand) -> Self {
        ClientMsg::Input {
            keys: cmd.keys,
            seq: cmd.seq,
            dt: cmd.dt,
            ct: cmd.client_ts,
        }
    }
}

/// Authoritative entity state as broadcast to every viewer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub x: f64,
    pub y: f64,
    /// Latest processed input sequence (0 before any input)
    pub seq: u64,
    /// Client timestamp of that input
    pub ct: u64,
    /// Server send time (unix ms)
    pub st: u64,
}

impl EntitySnapshot {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once to a new connection: its own identity and spawn point
    Connected { id: EntityId, x: f64, y: f64 },

    /// Authoritative state of one entity
    Snapshot(EntitySnapshot),

    /// Entity left; viewers should drop it
    Departed { id: EntityId },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
        server_time: u64,
    },
}

impl ServerMsg {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_wire_shape() {
        let msg = ClientMsg::decode(
            r#"{"type":"input","keys":["forward","left"],"seq":7,"dt":0.016,"ct":1700000000000}"#,
        )
        .unwrap();

        match msg {
            ClientMsg::Input { keys, seq, dt, ct } => {
                assert!(keys.forward && keys.left);
                assert!(!keys.reverse && !keys.right);
                assert_eq!(seq, 7);
                assert_eq!(dt, 0.016);
                assert_eq!(ct, 1_700_000_000_000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_is_flat_tagged_object() {
        let id = EntityId::new_random();
        let msg = ServerMsg::Snapshot(EntitySnapshot {
            id,
            x: 0.5,
            y: -1.0,
            seq: 3,
            ct: 10,
            st: 20,
        });

        let value: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "snapshot");
        assert_eq!(value["id"], id.to_string());
        assert_eq!(value["seq"], 3);
        assert_eq!(value["y"], -1.0);
    }

    #[test]
    fn test_bad_payloads_rejected_at_boundary() {
        assert!(matches!(
            ClientMsg::decode(r#"{"type":"input","keys":["up"],"seq":0,"dt":0.1,"ct":0}"#),
            Err(ProtocolError::Decode(_))
        ));
        assert!(ClientMsg::decode(r#"{"type":"input","keys":[],"seq":-1,"dt":0.1,"ct":0}"#).is_err());
        assert!(ClientMsg::decode("not json").is_err());
    }

    #[test]
    fn test_departed_carries_only_identity() {
        let id = EntityId::new_random();
        let json = ServerMsg::Departed { id }.encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_object().map(|o| o.len()), Some(2));
        assert_eq!(ServerMsg::decode(&json).unwrap(), ServerMsg::Departed { id });
    }
}
