//! Crate-wide error types
//!
//! A closed error taxonomy with structured context. Human-readable messages
//! are rendered by `Display`; the wire boundary uses [`SfuError::code`] so
//! clients can branch on stable codes instead of message strings.

use crate::engine::EngineError;
use crate::ids::{PeerId, ProducerId, TransportId};
use crate::negotiation::NegotiationError;
use crate::rtp::MediaKind;
use crate::transport::Direction;

/// Convenience result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SfuError>;

/// The resource a lookup failed to resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    /// No peer registered under this id
    Peer(PeerId),
    /// No transport registered under this id
    Transport(TransportId),
    /// No producer of this kind published in the room
    Producer(MediaKind),
}

/// Error type for SFU core operations
#[derive(Debug, Clone)]
pub enum SfuError {
    /// A referenced peer/transport/producer does not exist
    NotFound(NotFound),
    /// The requester's capabilities cannot consume the target producer
    IncompatibleCapabilities(ProducerId),
    /// The peer has no receive-direction transport to bind a consumer to
    NoReceiveTransport(PeerId),
    /// Operation requires a transport of a different direction
    InvalidDirection {
        /// The transport the operation was attempted on
        transport_id: TransportId,
        /// The direction the operation requires
        expected: Direction,
    },
    /// DTLS connect delegated to the engine failed
    Connect(EngineError),
    /// A non-connect engine call failed
    Engine(EngineError),
    /// The media engine process died; the room is unusable
    EngineDied,
    /// The configured codec preferences are unusable (startup only)
    Config(NegotiationError),
}

impl SfuError {
    /// Stable wire-level error code
    pub fn code(&self) -> &'static str {
        match self {
            SfuError::NotFound(_) => "NOT_FOUND",
            SfuError::IncompatibleCapabilities(_) => "INCOMPATIBLE_CAPABILITIES",
            SfuError::NoReceiveTransport(_) => "NO_RECV_TRANSPORT",
            SfuError::InvalidDirection { .. } => "INVALID_DIRECTION",
            SfuError::Connect(_) => "CONNECT_ERROR",
            SfuError::Engine(_) => "ENGINE_ERROR",
            SfuError::EngineDied => "ENGINE_FAILURE",
            SfuError::Config(_) => "INVALID_CONFIG",
        }
    }

    /// Whether this error means the whole room must stop serving
    pub fn is_fatal(&self) -> bool {
        matches!(self, SfuError::EngineDied)
    }
}

impl std::fmt::Display for SfuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SfuError::NotFound(NotFound::Peer(id)) => write!(f, "Peer not found: {}", id),
            SfuError::NotFound(NotFound::Transport(id)) => {
                write!(f, "Transport not found: {}", id)
            }
            SfuError::NotFound(NotFound::Producer(kind)) => {
                write!(f, "No {} producer in room", kind)
            }
            SfuError::IncompatibleCapabilities(id) => {
                write!(f, "Capabilities cannot consume producer {}", id)
            }
            SfuError::NoReceiveTransport(peer) => {
                write!(f, "Peer {} has no receive transport", peer)
            }
            SfuError::InvalidDirection {
                transport_id,
                expected,
            } => write!(
                f,
                "Transport {} is not a {} transport",
                transport_id, expected
            ),
            SfuError::Connect(e) => write!(f, "Transport connect failed: {}", e),
            SfuError::Engine(e) => write!(f, "Engine call failed: {}", e),
            SfuError::EngineDied => write!(f, "Media engine died"),
            SfuError::Config(e) => write!(f, "Invalid room configuration: {}", e),
        }
    }
}

impl std::error::Error for SfuError {}
