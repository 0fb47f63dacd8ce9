//! RTP data model
//!
//! The capability and parameter types exchanged during negotiation. These
//! mirror the wire form clients already speak (camelCase JSON); the crate
//! never parses RTP packets, only the negotiation metadata around them.

pub mod capabilities;
pub mod parameters;

pub use capabilities::{MediaKind, RtcpFeedback, RtpCapabilities, RtpCodecCapability, RtpHeaderExtension};
pub use parameters::{
    RtcpParameters, RtpCodecParameters, RtpEncodingParameters, RtpHeaderExtensionParameters,
    RtpParameters,
};
