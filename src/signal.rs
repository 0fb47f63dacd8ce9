//! Signaling boundary
//!
//! The request/response surface spoken over each participant's message
//! channel. Transport framing (WebSocket or otherwise) is the embedding
//! server's business; this module only defines the typed requests, the
//! uniform `{result}` / `{error}` envelope, and the dispatch into [`Room`].
//! Error codes and messages are rendered here and nowhere else.

use serde::{Deserialize, Serialize};

use crate::ids::{PeerId, TransportId};
use crate::room::Room;
use crate::rtp::{MediaKind, RtpCapabilities, RtpParameters};
use crate::transport::{Direction, DtlsParameters};

/// A client request, tagged by event name
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum Request {
    /// Fetch the room-wide capability set
    GetRouterRtpCapabilities,
    /// Allocate a transport of the given direction
    #[serde(rename_all = "camelCase")]
    CreateTransport {
        /// Client-side direction of the new transport
        direction: Direction,
    },
    /// Complete the DTLS handshake for a transport
    #[serde(rename_all = "camelCase")]
    ConnectTransport {
        /// Transport to connect
        transport_id: TransportId,
        /// Remote side's DTLS parameters
        dtls_parameters: DtlsParameters,
    },
    /// Publish a stream on a send transport
    #[serde(rename_all = "camelCase")]
    SendTrack {
        /// Send transport carrying the stream
        transport_id: TransportId,
        /// Media kind of the stream
        kind: MediaKind,
        /// Negotiated parameters of the stream
        rtp_parameters: RtpParameters,
        /// Caller metadata, passed through to the producer record
        #[serde(default)]
        app_data: serde_json::Value,
    },
    /// Consume the room's current producer of a kind
    #[serde(rename_all = "camelCase")]
    ReceiveTrack {
        /// Kind to consume
        media_type: MediaKind,
        /// Receiver's declared capabilities
        rtp_capabilities: RtpCapabilities,
    },
}

/// Structured failure returned to the requesting client
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Stable error code
    pub code: &'static str,
    /// Human-readable message
    pub message: String,
}

/// Uniform per-request response envelope
#[derive(Debug, Clone, Serialize)]
pub enum Envelope {
    /// Success, carrying the operation result
    #[serde(rename = "result")]
    Result(serde_json::Value),
    /// Failure, carrying code and message
    #[serde(rename = "error")]
    Error(ErrorBody),
}

/// Handle one request on behalf of a peer
///
/// Non-fatal failures are converted into error envelopes for this peer
/// only; they never affect other peers' in-flight requests.
pub async fn dispatch(room: &Room, peer_id: PeerId, request: Request) -> Envelope {
    match handle(room, peer_id, request).await {
        Ok(result) => Envelope::Result(result),
        Err(e) => {
            if e.is_fatal() {
                tracing::error!(peer = %peer_id, error = %e, "Request failed fatally");
            } else {
                tracing::debug!(peer = %peer_id, code = e.code(), error = %e, "Request failed");
            }
            Envelope::Error(ErrorBody {
                code: e.code(),
                message: e.to_string(),
            })
        }
    }
}

async fn handle(
    room: &Room,
    peer_id: PeerId,
    request: Request,
) -> crate::error::Result<serde_json::Value> {
    match request {
        Request::GetRouterRtpCapabilities => Ok(to_value(&room.router_rtp_capabilities())),
        Request::CreateTransport { direction } => {
            let info = room.create_transport(peer_id, direction).await?;
            Ok(serde_json::json!({ "transportOptions": to_value(&info) }))
        }
        Request::ConnectTransport {
            transport_id,
            dtls_parameters,
        } => {
            room.connect_transport(transport_id, &dtls_parameters).await?;
            Ok(serde_json::Value::Bool(true))
        }
        Request::SendTrack {
            transport_id,
            kind,
            rtp_parameters,
            app_data,
        } => {
            let id = room
                .publish(peer_id, transport_id, kind, rtp_parameters, app_data)
                .await?;
            Ok(serde_json::json!({ "id": id }))
        }
        Request::ReceiveTrack {
            media_type,
            rtp_capabilities,
        } => {
            let descriptor = room.consume(peer_id, media_type, &rtp_capabilities).await?;
            Ok(to_value(&descriptor))
        }
    }
}

// All response types serialize infallibly (string keys, no opaque types).
fn to_value<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
