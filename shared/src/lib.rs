use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_NAME_LENGTH: usize = 3;
pub const DEFAULT_PORT: u16 = 3001;

/// Palette handed out to participants that register without a color
pub const DEFAULT_COLORS: [&str; 8] = [
    "#1f77b4", "#d62728", "#2ca02c", "#9467bd", "#ff7f0e", "#17becf", "#e377c2", "#bcbd22",
];

/// Picks a stable palette color for a connection id
pub fn default_color(connection_id: u32) -> String {
    let index = (connection_id.max(1) as usize - 1) % DEFAULT_COLORS.len();
    DEFAULT_COLORS[index].to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn origin() -> Self {
        Self::default()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// A named participant as it appears in a `userList` snapshot
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Participant {
    pub id: u32,
    pub name: String,
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Participant {
    pub fn new(id: u32, name: String, color: String, position: Position) -> Self {
        Self {
            id,
            name,
            color,
            x: position.x,
            y: position.y,
            z: position.z,
        }
    }

    pub fn position(&self) -> Position {
        Position {
            x: self.x,
            y: self.y,
            z: self.z,
        }
    }
}

/// Events sent by clients
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ClientEvent {
    #[serde(rename = "setName")]
    SetName {
        name: String,
        #[serde(default)]
        color: Option<String>,
    },
    #[serde(rename = "move")]
    Move {
        x: f32,
        #[serde(default)]
        y: Option<f32>,
        z: f32,
    },
}

/// Events sent by the server
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ServerEvent {
    #[serde(rename = "welcome")]
    Welcome { id: u32 },
    #[serde(rename = "userList")]
    UserList(Vec<Participant>),
    #[serde(rename = "rejected")]
    Rejected { reason: String },
}

/// Frame encoding negotiated per session
///
/// Text frames carry JSON, binary frames carry bincode. A session answers
/// in the encoding of the last frame it sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Codec {
    #[default]
    Json,
    Binary,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid json frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid binary frame: {0}")]
    Binary(#[from] bincode::Error),
}

/// An encoded frame ready to be wrapped in a transport message
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Codec {
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Frame, ProtocolError> {
        match self {
            Codec::Json => Ok(Frame::Text(serde_json::to_string(value)?)),
            Codec::Binary => Ok(Frame::Binary(bincode::serialize(value)?)),
        }
    }
}

pub fn decode_text<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

pub fn decode_binary<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(bincode::deserialize(bytes)?)
}

/// Names shorter than `MIN_NAME_LENGTH` characters are refused at registration
pub fn is_valid_name(name: &str) -> bool {
    name.chars().count() >= MIN_NAME_LENGTH
}
