//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::error::SyncError;

/// Players are identified by their connection id
pub type PlayerId = Uuid;

/// Client-assigned correlation id, echoed back by the server as `opId`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputId {
    /// Monotonic per-client sequence number
    pub action_id: u32,
    /// Client send time (epoch ms)
    pub ts: u64,
}

/// The operation a player wants applied (level state)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerOp {
    /// Desired heading in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joystick_angle: Option<f64>,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMsg {
    /// Latest input intent
    #[serde(rename = "onInput", rename_all = "camelCase")]
    Input {
        #[serde(default)]
        player_op: PlayerOp,
        id: InputId,
    },

    /// Liveness probe
    #[serde(rename = "ping")]
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMsg {
    /// Sent once right after the connection is accepted
    #[serde(rename = "welcome", rename_all = "camelCase")]
    Welcome { player_id: PlayerId, server_time: u64 },

    /// Per-observer world snapshot
    #[serde(rename = "onTick")]
    Tick(TickSnapshot),

    /// Pong response
    #[serde(rename = "pong")]
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Serialize a message for the wire
pub fn encode<T: Serialize>(msg: &T) -> Result<String, SyncError> {
    serde_json::to_string(msg).map_err(|e| SyncError::Serialization(e.to_string()))
}

/// One observer's snapshot: server time plus ordered views.
/// The observer's own detailed view is always last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSnapshot {
    /// Server time (epoch ms)
    pub t: u64,
    pub all: Vec<PlayerView>,
}

impl TickSnapshot {
    /// View of a specific player, if present
    pub fn view_of(&self, player_id: PlayerId) -> Option<&PlayerView> {
        self.all.iter().find(|v| v.player_id() == player_id)
    }
}

/// Kinds of marked fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Name,
    Active,
    Dead,
    Score,
    Notice,
}

/// A marked field value riding along with the steady-state payload
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerField {
    /// Display name
    Name(String),
    /// Player has finished spawning
    Active(bool),
    /// Player is dead
    Dead(bool),
    /// Score
    Score(u32),
    /// One-off notification text
    Notice(String),
}

impl PlayerField {
    pub fn kind(&self) -> FieldKind {
        match self {
            PlayerField::Name(_) => FieldKind::Name,
            PlayerField::Active(_) => FieldKind::Active,
            PlayerField::Dead(_) => FieldKind::Dead,
            PlayerField::Score(_) => FieldKind::Score,
            PlayerField::Notice(_) => FieldKind::Notice,
        }
    }
}

/// Closed set of optional fields, flattened into a view on the wire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl FieldSet {
    /// Write a field, replacing any earlier value of the same kind
    pub fn set(&mut self, field: PlayerField) {
        match field {
            PlayerField::Name(v) => self.name = Some(v),
            PlayerField::Active(v) => self.active = Some(v),
            PlayerField::Dead(v) => self.dead = Some(v),
            PlayerField::Score(v) => self.score = Some(v),
            PlayerField::Notice(v) => self.notice = Some(v),
        }
    }

    pub fn clear(&mut self, kind: FieldKind) {
        match kind {
            FieldKind::Name => self.name = None,
            FieldKind::Active => self.active = None,
            FieldKind::Dead => self.dead = None,
            FieldKind::Score => self.score = None,
            FieldKind::Notice => self.notice = None,
        }
    }

    pub fn clear_all(&mut self) {
        *self = FieldSet::default();
    }

    pub fn is_empty(&self) -> bool {
        *self == FieldSet::default()
    }

    /// `self` with every field present in `top` replaced by `top`'s value
    pub fn overlaid_with(&self, top: &FieldSet) -> FieldSet {
        FieldSet {
            name: top.name.clone().or_else(|| self.name.clone()),
            active: top.active.or(self.active),
            dead: top.dead.or(self.dead),
            score: top.score.or(self.score),
            notice: top.notice.clone().or_else(|| self.notice.clone()),
        }
    }
}

/// Full-detail view of a player, sent to nearby observers and to the player
/// itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedView {
    pub player_id: PlayerId,
    /// Heading in whole degrees
    pub angle: i32,
    pub x: i32,
    pub y: i32,
    /// Last input id the server applied for this player
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_id: Option<InputId>,
    #[serde(flatten)]
    pub fields: FieldSet,
}

/// Identity plus persistent fields, sent to far-away observers.
/// Carries no pose by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    pub player_id: PlayerId,
    #[serde(flatten)]
    pub fields: FieldSet,
}

/// Either bandwidth tier of a player's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlayerView {
    Detailed(DetailedView),
    Summary(SummaryView),
}

impl PlayerView {
    pub fn player_id(&self) -> PlayerId {
        match self {
            PlayerView::Detailed(v) => v.player_id,
            PlayerView::Summary(v) => v.player_id,
        }
    }

    pub fn fields(&self) -> &FieldSet {
        match self {
            PlayerView::Detailed(v) => &v.fields,
            PlayerView::Summary(v) => &v.fields,
        }
    }

    pub fn as_detailed(&self) -> Option<&DetailedView> {
        match self {
            PlayerView::Detailed(v) => Some(v),
            PlayerView::Summary(_) => None,
        }
    }
}
