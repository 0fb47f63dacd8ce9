//! Room configuration

use std::collections::BTreeMap;
use std::time::Duration;

use crate::rtp::{MediaKind, RtcpFeedback, RtpCodecCapability};

/// Listen address announced in ICE candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenIp {
    /// Local IP to bind
    pub ip: String,
    /// Publicly announced IP, if different (NAT)
    pub announced_ip: Option<String>,
}

/// Options for engine-allocated WebRTC transports
#[derive(Debug, Clone)]
pub struct WebRtcTransportOptions {
    /// Addresses to listen on
    pub listen_ips: Vec<ListenIp>,
    /// Offer UDP candidates
    pub enable_udp: bool,
    /// Offer TCP candidates
    pub enable_tcp: bool,
    /// Prefer UDP over TCP when both are available
    pub prefer_udp: bool,
    /// Initial available outgoing bitrate, bits/sec
    pub initial_available_outgoing_bitrate: u32,
}

impl Default for WebRtcTransportOptions {
    fn default() -> Self {
        Self {
            listen_ips: vec![ListenIp {
                ip: "0.0.0.0".to_string(),
                announced_ip: None,
            }],
            enable_udp: true,
            enable_tcp: true,
            prefer_udp: true,
            initial_available_outgoing_bitrate: 800_000,
        }
    }
}

/// Room configuration options
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Codec preferences the negotiator builds the room capability set from
    pub media_codecs: Vec<RtpCodecCapability>,
    /// Audio-level observer sampling interval
    pub audio_level_interval: Duration,
    /// Transport allocation options
    pub transport: WebRtcTransportOptions,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            media_codecs: default_media_codecs(),
            audio_level_interval: Duration::from_millis(800),
            transport: WebRtcTransportOptions::default(),
        }
    }
}

impl RoomConfig {
    /// Replace the codec preference list
    pub fn media_codecs(mut self, codecs: Vec<RtpCodecCapability>) -> Self {
        self.media_codecs = codecs;
        self
    }

    /// Set the audio-level observer sampling interval
    pub fn audio_level_interval(mut self, interval: Duration) -> Self {
        self.audio_level_interval = interval;
        self
    }

    /// Set the announced listen IPs
    pub fn listen_ips(mut self, ips: Vec<ListenIp>) -> Self {
        self.transport.listen_ips = ips;
        self
    }

    /// Set the initial available outgoing bitrate
    pub fn initial_available_outgoing_bitrate(mut self, bitrate: u32) -> Self {
        self.transport.initial_available_outgoing_bitrate = bitrate;
        self
    }
}

/// Default codec preferences: opus, VP8 and H264 constrained baseline
pub fn default_media_codecs() -> Vec<RtpCodecCapability> {
    vec![
        RtpCodecCapability {
            kind: MediaKind::Audio,
            mime_type: "audio/opus".to_string(),
            preferred_payload_type: None,
            clock_rate: 48_000,
            channels: Some(2),
            parameters: BTreeMap::new(),
            rtcp_feedback: vec![RtcpFeedback::new("transport-cc")],
        },
        RtpCodecCapability {
            kind: MediaKind::Video,
            mime_type: "video/VP8".to_string(),
            preferred_payload_type: None,
            clock_rate: 90_000,
            channels: None,
            parameters: BTreeMap::new(),
            rtcp_feedback: vec![
                RtcpFeedback::new("nack"),
                RtcpFeedback::with_parameter("nack", "pli"),
                RtcpFeedback::with_parameter("ccm", "fir"),
                RtcpFeedback::new("transport-cc"),
            ],
        },
        RtpCodecCapability {
            kind: MediaKind::Video,
            mime_type: "video/H264".to_string(),
            preferred_payload_type: None,
            clock_rate: 90_000,
            channels: None,
            parameters: BTreeMap::from([
                ("packetization-mode".to_string(), serde_json::json!(1)),
                (
                    "profile-level-id".to_string(),
                    serde_json::json!("42e01f"),
                ),
                ("level-asymmetry-allowed".to_string(), serde_json::json!(1)),
            ]),
            rtcp_feedback: vec![
                RtcpFeedback::new("nack"),
                RtcpFeedback::with_parameter("nack", "pli"),
                RtcpFeedback::with_parameter("ccm", "fir"),
                RtcpFeedback::new("transport-cc"),
            ],
        },
    ]
}
