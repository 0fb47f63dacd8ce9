//! Capability types
//!
//! What a party is able to send or receive: codec capabilities with
//! preferred payload types, plus header extensions. The room-wide set is
//! computed once by the negotiator and immutable afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Media kind of a stream or codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio stream
    Audio,
    /// Video stream
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// An RTCP feedback mechanism a codec supports (e.g. `nack`, `nack pli`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcpFeedback {
    /// Feedback type (e.g. "nack", "ccm", "transport-cc")
    #[serde(rename = "type")]
    pub feedback_type: String,
    /// Feedback parameter (e.g. "pli", "fir")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

impl RtcpFeedback {
    /// Create a feedback entry without a parameter
    pub fn new(feedback_type: impl Into<String>) -> Self {
        Self {
            feedback_type: feedback_type.into(),
            parameter: None,
        }
    }

    /// Create a feedback entry with a parameter
    pub fn with_parameter(feedback_type: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            feedback_type: feedback_type.into(),
            parameter: Some(parameter.into()),
        }
    }
}

/// One codec a party can send or receive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecCapability {
    /// Media kind this codec applies to
    pub kind: MediaKind,
    /// MIME type, e.g. "audio/opus" or "video/VP8"
    pub mime_type: String,
    /// Preferred RTP payload type, assigned during capability generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_payload_type: Option<u8>,
    /// Codec clock rate in Hz
    pub clock_rate: u32,
    /// Number of channels (audio only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    /// Codec-specific parameters (fmtp), e.g. H264 packetization-mode
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, serde_json::Value>,
    /// Supported RTCP feedback mechanisms
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

impl RtpCodecCapability {
    /// Whether this is a retransmission codec (e.g. "video/rtx")
    pub fn is_rtx(&self) -> bool {
        self.mime_type.to_ascii_lowercase().ends_with("/rtx")
    }
}

/// A supported RTP header extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpHeaderExtension {
    /// Media kind this extension applies to
    pub kind: MediaKind,
    /// Extension URI
    pub uri: String,
    /// Preferred extension id
    pub preferred_id: u8,
}

/// The complete capability set of a party (or of the room)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCapabilities {
    /// Supported codecs
    #[serde(default)]
    pub codecs: Vec<RtpCodecCapability>,
    /// Supported header extensions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub header_extensions: Vec<RtpHeaderExtension>,
}
