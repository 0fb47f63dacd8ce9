//! Producer and consumer records

use serde::Serialize;

use crate::ids::{ConsumerId, PeerId, ProducerId, TransportId};
use crate::negotiation::ConsumerType;
use crate::rtp::{MediaKind, RtpParameters};

/// A published media stream
///
/// Carries the owning peer and transport so lifecycle cascades and the
/// speaker tracker can resolve ownership later.
#[derive(Debug, Clone)]
pub struct ProducerRecord {
    /// Engine-assigned producer id
    pub id: ProducerId,
    /// Media kind
    pub kind: MediaKind,
    /// Publishing peer
    pub peer_id: PeerId,
    /// Send transport the stream arrives on
    pub transport_id: TransportId,
    /// Negotiated parameters the stream was published with
    pub rtp_parameters: RtpParameters,
    /// Whether the publisher has paused the stream
    pub paused: bool,
    /// Caller-supplied metadata, passed through untouched
    pub app_data: serde_json::Value,
}

/// A forwarding handle delivering one producer to one receiving peer
#[derive(Debug, Clone)]
pub struct ConsumerRecord {
    /// Engine-assigned consumer id
    pub id: ConsumerId,
    /// Producer being forwarded
    pub producer_id: ProducerId,
    /// Receiving peer
    pub peer_id: PeerId,
    /// Receive transport the forwarding runs on
    pub transport_id: TransportId,
    /// Media kind
    pub kind: MediaKind,
    /// Parameters derived for this consumer
    pub rtp_parameters: RtpParameters,
    /// Layer structure of the consumer
    pub consumer_type: ConsumerType,
}

/// What a receiving client gets back from a consume request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerDescriptor {
    /// Producer being forwarded
    pub producer_id: ProducerId,
    /// Consumer id
    pub id: ConsumerId,
    /// Media kind
    pub kind: MediaKind,
    /// Parameters the client should receive with
    pub rtp_parameters: RtpParameters,
    /// Layer structure of the consumer
    #[serde(rename = "type")]
    pub consumer_type: ConsumerType,
    /// Whether the producer is currently paused
    pub producer_paused: bool,
}
