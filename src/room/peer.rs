//! Peer record
//!
//! Per-participant state kept by the room: join/last-seen times, which
//! producers the peer owns, per-consumer layer preferences, and a loose
//! stats map updated by whatever telemetry the embedding server collects.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::ids::{ConsumerId, PeerId, ProducerId};
use crate::rtp::MediaKind;

/// Layer selection state for one consumer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerLayers {
    /// Layer currently being forwarded
    pub current_layer: Option<u8>,
    /// Layer the client asked for
    pub client_selected_layer: Option<u8>,
}

/// One connected participant
#[derive(Debug, Clone)]
pub struct Peer {
    /// Server-generated id, unique per connection
    pub id: PeerId,
    /// When the peer joined
    pub joined_at: Instant,
    /// Last time a request from this peer was dispatched
    pub last_seen: Instant,
    /// Producers the peer owns, by kind
    pub media: HashMap<MediaKind, ProducerId>,
    /// Layer state of the peer's consumers
    pub consumer_layers: HashMap<ConsumerId, ConsumerLayers>,
    /// Named stats, e.g. bitrate estimates
    pub stats: HashMap<String, f64>,
}

impl Peer {
    /// Create a fresh peer record
    pub fn new(id: PeerId) -> Self {
        let now = Instant::now();
        Self {
            id,
            joined_at: now,
            last_seen: now,
            media: HashMap::new(),
            consumer_layers: HashMap::new(),
            stats: HashMap::new(),
        }
    }

    /// Mark the peer as seen now
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// How long the peer has been in the room
    pub fn session_duration(&self) -> Duration {
        self.joined_at.elapsed()
    }
}
