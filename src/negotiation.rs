//! Capability negotiation
//!
//! Computes the immutable room-wide capability set from configured codec
//! preferences, answers "can this receiver consume this producer?" queries,
//! and derives the RTP parameters a consumer is created with. Pure logic:
//! no engine calls, no mutable state after construction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rtp::{
    MediaKind, RtcpFeedback, RtpCapabilities, RtpCodecCapability, RtpCodecParameters,
    RtpEncodingParameters, RtpHeaderExtension, RtpHeaderExtensionParameters, RtpParameters,
};

/// First payload type assigned from the dynamic range
const DYNAMIC_PAYLOAD_TYPE_START: u8 = 100;
/// Last usable dynamic payload type
const DYNAMIC_PAYLOAD_TYPE_END: u8 = 127;

/// How a consumer forwards its producer's layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumerType {
    /// Single encoding
    Simple,
    /// Multiple independent encodings
    Simulcast,
    /// Scalable video coding layers within one encoding
    Svc,
}

/// Error raised while building the room capability set
#[derive(Debug, Clone)]
pub enum NegotiationError {
    /// A configured codec is unusable
    InvalidCodec {
        /// MIME type of the offending codec
        mime_type: String,
        /// What was wrong with it
        reason: &'static str,
    },
    /// Ran out of dynamic payload types
    PayloadTypesExhausted,
}

impl std::fmt::Display for NegotiationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NegotiationError::InvalidCodec { mime_type, reason } => {
                write!(f, "Invalid codec {}: {}", mime_type, reason)
            }
            NegotiationError::PayloadTypesExhausted => {
                write!(f, "No dynamic payload types left to assign")
            }
        }
    }
}

impl std::error::Error for NegotiationError {}

/// The room's capability negotiator
///
/// Holds the capability set computed once at session creation; every
/// accessor returns structurally identical data for the room's lifetime.
#[derive(Debug)]
pub struct CapabilityNegotiator {
    capabilities: RtpCapabilities,
}

impl CapabilityNegotiator {
    /// Build the room capability set from codec preferences
    ///
    /// Validates each codec and assigns payload types from the dynamic
    /// range where the preference left them unset.
    pub fn new(preferred_codecs: &[RtpCodecCapability]) -> Result<Self, NegotiationError> {
        let mut codecs = Vec::with_capacity(preferred_codecs.len());
        let mut used_types: Vec<u8> = Vec::new();
        let mut next_type = DYNAMIC_PAYLOAD_TYPE_START;

        for preferred in preferred_codecs {
            let mut codec = preferred.clone();
            validate_codec(&codec)?;

            if codec.kind == MediaKind::Audio && codec.channels.is_none() {
                codec.channels = Some(default_channels(&codec.mime_type));
            }

            match codec.preferred_payload_type {
                Some(pt) => {
                    if used_types.contains(&pt) {
                        return Err(NegotiationError::InvalidCodec {
                            mime_type: codec.mime_type.clone(),
                            reason: "duplicate payload type",
                        });
                    }
                    used_types.push(pt);
                }
                None => {
                    while used_types.contains(&next_type) {
                        if next_type == DYNAMIC_PAYLOAD_TYPE_END {
                            return Err(NegotiationError::PayloadTypesExhausted);
                        }
                        next_type += 1;
                    }
                    if next_type > DYNAMIC_PAYLOAD_TYPE_END {
                        return Err(NegotiationError::PayloadTypesExhausted);
                    }
                    codec.preferred_payload_type = Some(next_type);
                    used_types.push(next_type);
                    next_type = next_type.saturating_add(1);
                }
            }

            codecs.push(codec);
        }

        Ok(Self {
            capabilities: RtpCapabilities {
                codecs,
                header_extensions: default_header_extensions(),
            },
        })
    }

    /// The room-wide capability set, fixed at session creation
    pub fn capabilities(&self) -> &RtpCapabilities {
        &self.capabilities
    }

    /// Whether a receiver with `receiver_caps` can consume a producer
    /// negotiated with `producer_params`
    ///
    /// True if at least one non-RTX producer codec has a matching codec in
    /// the receiver's capabilities.
    pub fn can_consume(
        &self,
        producer_params: &RtpParameters,
        receiver_caps: &RtpCapabilities,
    ) -> bool {
        producer_params
            .codecs
            .iter()
            .filter(|c| !c.is_rtx())
            .any(|c| receiver_caps.codecs.iter().any(|cap| codec_matches(c, cap)))
    }

    /// Derive the parameters and type for a consumer of `producer_params`
    ///
    /// Returns `None` when nothing is consumable (the caller maps this to
    /// an incompatible-capabilities failure).
    pub fn consumer_parameters(
        &self,
        producer_params: &RtpParameters,
        receiver_caps: &RtpCapabilities,
    ) -> Option<(RtpParameters, ConsumerType)> {
        let mut codecs = Vec::new();

        for codec in producer_params.codecs.iter().filter(|c| !c.is_rtx()) {
            let matched = receiver_caps
                .codecs
                .iter()
                .find(|cap| codec_matches(codec, cap));

            if let Some(cap) = matched {
                codecs.push(RtpCodecParameters {
                    mime_type: codec.mime_type.clone(),
                    payload_type: cap.preferred_payload_type.unwrap_or(codec.payload_type),
                    clock_rate: codec.clock_rate,
                    channels: codec.channels,
                    parameters: codec.parameters.clone(),
                    rtcp_feedback: intersect_feedback(&codec.rtcp_feedback, &cap.rtcp_feedback),
                });
            }
        }

        if codecs.is_empty() {
            return None;
        }

        let header_extensions = producer_params
            .header_extensions
            .iter()
            .filter_map(|ext| {
                receiver_caps
                    .header_extensions
                    .iter()
                    .find(|cap| cap.uri == ext.uri)
                    .map(|cap| RtpHeaderExtensionParameters {
                        uri: ext.uri.clone(),
                        id: cap.preferred_id,
                    })
            })
            .collect();

        let consumer_type = classify_encodings(&producer_params.encodings);

        // The consumer forwards a single selected encoding regardless of
        // how many layers the producer sends.
        let encodings = vec![producer_params
            .encodings
            .first()
            .cloned()
            .unwrap_or_default()];

        let params = RtpParameters {
            mid: None,
            codecs,
            header_extensions,
            encodings,
            rtcp: producer_params.rtcp.clone(),
        };

        Some((params, consumer_type))
    }
}

fn validate_codec(codec: &RtpCodecCapability) -> Result<(), NegotiationError> {
    let mime = codec.mime_type.to_ascii_lowercase();
    let expected_prefix = match codec.kind {
        MediaKind::Audio => "audio/",
        MediaKind::Video => "video/",
    };

    if !mime.starts_with(expected_prefix) {
        return Err(NegotiationError::InvalidCodec {
            mime_type: codec.mime_type.clone(),
            reason: "MIME type does not match codec kind",
        });
    }
    if codec.clock_rate == 0 {
        return Err(NegotiationError::InvalidCodec {
            mime_type: codec.mime_type.clone(),
            reason: "zero clock rate",
        });
    }
    Ok(())
}

fn default_channels(mime_type: &str) -> u8 {
    if mime_type.eq_ignore_ascii_case("audio/opus") {
        2
    } else {
        1
    }
}

/// Whether a producer codec is satisfied by a receiver codec capability
fn codec_matches(producer: &RtpCodecParameters, receiver: &RtpCodecCapability) -> bool {
    if receiver.is_rtx() {
        return false;
    }
    if !producer
        .mime_type
        .eq_ignore_ascii_case(&receiver.mime_type)
    {
        return false;
    }
    if producer.clock_rate != receiver.clock_rate {
        return false;
    }
    if receiver.kind == MediaKind::Audio
        && producer.channels.unwrap_or(1) != receiver.channels.unwrap_or(1)
    {
        return false;
    }
    if producer.mime_type.eq_ignore_ascii_case("video/h264") {
        if packetization_mode(&producer.parameters) != packetization_mode(&receiver.parameters) {
            return false;
        }
        if let (Some(a), Some(b)) = (
            profile_idc(&producer.parameters),
            profile_idc(&receiver.parameters),
        ) {
            if a != b {
                return false;
            }
        }
    }
    true
}

fn packetization_mode(parameters: &BTreeMap<String, serde_json::Value>) -> u64 {
    parameters
        .get("packetization-mode")
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
}

/// First two hex digits of profile-level-id: the H264 profile
///
/// Client-supplied, so slicing must tolerate arbitrary (non-ASCII) input.
fn profile_idc(parameters: &BTreeMap<String, serde_json::Value>) -> Option<String> {
    parameters
        .get("profile-level-id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.get(..2))
        .map(|s| s.to_ascii_lowercase())
}

fn intersect_feedback(producer: &[RtcpFeedback], receiver: &[RtcpFeedback]) -> Vec<RtcpFeedback> {
    producer
        .iter()
        .filter(|fb| receiver.contains(fb))
        .cloned()
        .collect()
}

fn classify_encodings(encodings: &[RtpEncodingParameters]) -> ConsumerType {
    if encodings.iter().any(|e| e.scalability_mode.is_some()) {
        ConsumerType::Svc
    } else if encodings.len() > 1 {
        ConsumerType::Simulcast
    } else {
        ConsumerType::Simple
    }
}

fn default_header_extensions() -> Vec<RtpHeaderExtension> {
    vec![
        RtpHeaderExtension {
            kind: MediaKind::Audio,
            uri: "urn:ietf:params:rtp-hdrext:sdes:mid".to_string(),
            preferred_id: 1,
        },
        RtpHeaderExtension {
            kind: MediaKind::Video,
            uri: "urn:ietf:params:rtp-hdrext:sdes:mid".to_string(),
            preferred_id: 1,
        },
        RtpHeaderExtension {
            kind: MediaKind::Audio,
            uri: "urn:ietf:params:rtp-hdrext:ssrc-audio-level".to_string(),
            preferred_id: 10,
        },
        RtpHeaderExtension {
            kind: MediaKind::Video,
            uri: "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time".to_string(),
            preferred_id: 4,
        },
        RtpHeaderExtension {
            kind: MediaKind::Video,
            uri: "urn:3gpp:video-orientation".to_string(),
            preferred_id: 11,
        },
    ]
}
