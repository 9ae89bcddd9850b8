//! Error taxonomy for the synchronization layer

use uuid::Uuid;

/// Faults raised while ingesting input, building views or sending snapshots.
///
/// None of these abort a tick: the caller logs them and skips the offending
/// player or observer for the current cycle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// Unparseable message or a field with an unusable value
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Event for a connection that is not (or no longer) registered
    #[error("Unknown connection: {0}")]
    UnknownConnection(Uuid),

    /// A view would carry a NaN or infinite number
    #[error("Non-finite {field} for player {player_id}")]
    NonFinite { player_id: Uuid, field: &'static str },

    /// A view coordinate does not fit the wire's integer range
    #[error("Out-of-range {field} for player {player_id}")]
    OutOfRange { player_id: Uuid, field: &'static str },

    /// Encoding a message failed
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Handing a payload to one connection failed
    #[error("Send to {player_id} failed: {reason}")]
    Transport { player_id: Uuid, reason: String },
}
