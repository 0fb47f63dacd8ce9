//! # sfu-rs
//!
//! Session-management core for a selective forwarding unit (SFU): the
//! orchestration layer that tracks room state, per-peer transports,
//! published producers and forwarding consumers, negotiates capabilities,
//! and follows the active speaker.
//!
//! Packet-level media work — ICE/DTLS/SRTP, RTP forwarding, audio-level
//! analysis — is delegated to an external media engine behind the traits in
//! [`engine`]. This crate is everything above that seam.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<Room>
//!      ┌──────────────────────────────────────────────┐
//!      │ CapabilityNegotiator   (immutable caps)      │
//!      │ TransportRegistry      (peer ⇄ transports)   │
//!      │ TrackRegistry          (producers/consumers) │
//!      │ SpeakerTracker         (watch channel)       │
//!      │ peers: HashMap<PeerId, Peer>                 │
//!      └──────────────┬───────────────────────────────┘
//!                     │ async trait calls / event channels
//!                     ▼
//!            dyn MediaEngine / dyn MediaRouter
//! ```
//!
//! # Usage
//!
//! Open one [`room::Room`] per process with an engine implementation and a
//! [`config::RoomConfig`], generate a [`ids::PeerId`] per incoming
//! connection via [`room::Room::join`], and feed decoded client requests
//! through [`signal::dispatch`]. On disconnect, call [`room::Room::leave`]
//! to release everything the peer owned.

pub mod config;
pub mod engine;
pub mod error;
pub mod ids;
pub mod negotiation;
pub mod room;
pub mod rtp;
pub mod signal;
pub mod speaker;
pub mod track;
pub mod transport;

pub use config::RoomConfig;
pub use error::{Result, SfuError};
pub use room::Room;
