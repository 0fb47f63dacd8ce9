//! Media engine seam
//!
//! The SFU core performs no packet-level work itself; ICE/DTLS/SRTP, RTP
//! forwarding and audio-level analysis are delegated to an external media
//! engine reached through the traits in this module. The core calls down
//! with `async` methods and receives events back over channels: a
//! `broadcast` stream for engine lifecycle and an `mpsc` stream of
//! audio-level samples for the speaker tracker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::config::WebRtcTransportOptions;
use crate::ids::{ConsumerId, ProducerId, TransportId};
use crate::rtp::{MediaKind, RtpCodecCapability, RtpParameters};
use crate::transport::params::{DtlsParameters, IceCandidate, IceParameters};

#[cfg(test)]
pub(crate) mod testing;

/// Error reported by the underlying media engine
///
/// Engine failures are opaque to the core; the message is carried through
/// for logging and the wire boundary.
#[derive(Debug, Clone)]
pub struct EngineError {
    message: String,
}

impl EngineError {
    /// Create an engine error with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EngineError {}

/// Lifecycle event pushed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// The engine worker process died unexpectedly
    Died,
}

/// One (producer, volume) sample from the audio-level observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSample {
    /// Producer the volume was measured on
    pub producer_id: ProducerId,
    /// Volume in dBvo (negative values, 0 is loudest)
    pub volume: i32,
}

/// Event from the audio-level observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioLevelEvent {
    /// Producers above the threshold, ordered loudest first
    Volumes(Vec<VolumeSample>),
    /// No producer above the threshold for the observer's silence window
    Silence,
}

/// Connection material for a freshly allocated transport
///
/// Everything the remote peer needs to connect; internal engine state is
/// never exposed.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    /// Engine-assigned transport id
    pub id: TransportId,
    /// Server-side ICE parameters
    pub ice_parameters: IceParameters,
    /// Server-side ICE candidates
    pub ice_candidates: Vec<IceCandidate>,
    /// Server-side DTLS parameters
    pub dtls_parameters: DtlsParameters,
}

/// Handle for a freshly allocated consumer
#[derive(Debug, Clone)]
pub struct ConsumerHandle {
    /// Engine-assigned consumer id
    pub id: ConsumerId,
}

/// The engine worker abstraction
///
/// One engine instance backs one room. Implementations wrap whatever native
/// media stack actually moves packets.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Create a router configured with the room's codec set
    async fn create_router(
        &self,
        codecs: &[RtpCodecCapability],
    ) -> Result<Arc<dyn MediaRouter>, EngineError>;

    /// Subscribe to engine lifecycle events
    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;
}

/// Router-level media primitives
#[async_trait]
pub trait MediaRouter: Send + Sync {
    /// Allocate a transport and return its connection material
    async fn create_transport(
        &self,
        options: &WebRtcTransportOptions,
    ) -> Result<TransportHandle, EngineError>;

    /// Complete the DTLS handshake with the remote side's parameters
    async fn connect_transport(
        &self,
        transport_id: TransportId,
        dtls: &DtlsParameters,
    ) -> Result<(), EngineError>;

    /// Close a transport and everything running on it
    async fn close_transport(&self, transport_id: TransportId);

    /// Start receiving a keyed media stream on a transport
    async fn create_producer(
        &self,
        transport_id: TransportId,
        kind: MediaKind,
        rtp_parameters: &RtpParameters,
    ) -> Result<ProducerId, EngineError>;

    /// Stop and release a producer
    async fn close_producer(&self, producer_id: ProducerId);

    /// Start forwarding a producer's stream over a transport
    async fn create_consumer(
        &self,
        transport_id: TransportId,
        producer_id: ProducerId,
        rtp_parameters: &RtpParameters,
    ) -> Result<ConsumerHandle, EngineError>;

    /// Stop and release a consumer
    async fn close_consumer(&self, consumer_id: ConsumerId);

    /// Start the audio-level observer with the given sampling interval
    ///
    /// The returned receiver yields volume and silence events until the
    /// router is dropped.
    async fn start_audio_observer(
        &self,
        interval: Duration,
    ) -> Result<mpsc::Receiver<AudioLevelEvent>, EngineError>;
}
