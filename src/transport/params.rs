//! Transport connection parameters
//!
//! The ICE/DTLS material exchanged with the remote peer when a transport is
//! created or connected. Produced by the engine; the core only carries them
//! to and from the signaling boundary, never inspects them.

use serde::{Deserialize, Serialize};

/// ICE parameters of the server-side transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceParameters {
    /// ICE username fragment
    pub username_fragment: String,
    /// ICE password
    pub password: String,
    /// Whether ICE lite is in use
    #[serde(default)]
    pub ice_lite: bool,
}

/// One ICE candidate of the server-side transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    /// Candidate foundation
    pub foundation: String,
    /// Candidate priority
    pub priority: u32,
    /// Candidate IP or hostname
    pub ip: String,
    /// Transport protocol ("udp" | "tcp")
    pub protocol: String,
    /// Candidate port
    pub port: u16,
    /// Candidate type ("host" in this design)
    #[serde(rename = "type")]
    pub candidate_type: String,
}

/// Role in the DTLS handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtlsRole {
    /// Negotiate the role
    Auto,
    /// DTLS client
    Client,
    /// DTLS server
    Server,
}

/// A certificate fingerprint used to authenticate the DTLS handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DtlsFingerprint {
    /// Hash algorithm, e.g. "sha-256"
    pub algorithm: String,
    /// Fingerprint value in colon-separated hex
    pub value: String,
}

/// DTLS parameters of one side of a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DtlsParameters {
    /// DTLS role of this side
    pub role: DtlsRole,
    /// Certificate fingerprints
    pub fingerprints: Vec<DtlsFingerprint>,
}
