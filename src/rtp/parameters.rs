//! Negotiated parameter types
//!
//! The concrete parameters of one stream: which codecs at which payload
//! types, header extension ids, encodings (simulcast layers) and RTCP
//! settings. Producers arrive with these; consumers get a derived set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::capabilities::RtcpFeedback;

/// One negotiated codec within a stream's parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecParameters {
    /// MIME type, e.g. "audio/opus"
    pub mime_type: String,
    /// Negotiated RTP payload type
    pub payload_type: u8,
    /// Codec clock rate in Hz
    pub clock_rate: u32,
    /// Number of channels (audio only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    /// Codec-specific parameters (fmtp)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, serde_json::Value>,
    /// Negotiated RTCP feedback mechanisms
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

impl RtpCodecParameters {
    /// Whether this is a retransmission codec
    pub fn is_rtx(&self) -> bool {
        self.mime_type.to_ascii_lowercase().ends_with("/rtx")
    }
}

/// One encoding (layer) of a stream
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpEncodingParameters {
    /// RTP synchronization source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssrc: Option<u32>,
    /// RID (simulcast stream identifier)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
    /// SVC scalability mode, e.g. "L3T3"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalability_mode: Option<String>,
    /// Maximum bitrate for this layer, bits/sec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bitrate: Option<u32>,
}

/// A negotiated header extension within a stream's parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpHeaderExtensionParameters {
    /// Extension URI
    pub uri: String,
    /// Negotiated extension id
    pub id: u8,
}

/// RTCP settings for a stream
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcpParameters {
    /// Canonical name for RTCP SDES
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cname: Option<String>,
    /// Whether reduced-size RTCP (RFC 5506) is in use
    #[serde(default)]
    pub reduced_size: bool,
}

/// Complete negotiated parameters of one stream
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpParameters {
    /// Media section identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
    /// Negotiated codecs, primary first
    pub codecs: Vec<RtpCodecParameters>,
    /// Negotiated header extensions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub header_extensions: Vec<RtpHeaderExtensionParameters>,
    /// Stream encodings; more than one means simulcast
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub encodings: Vec<RtpEncodingParameters>,
    /// RTCP settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtcp: Option<RtcpParameters>,
}
