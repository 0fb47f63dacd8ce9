//! Transport tracking
//!
//! Per-peer network transports: one for sending, one for receiving. The
//! registry tags each engine-allocated transport with its owner and
//! direction and tracks the connection state machine.

pub mod params;
pub mod registry;

pub use params::{DtlsFingerprint, DtlsParameters, DtlsRole, IceCandidate, IceParameters};
pub use registry::{ConnectionState, Direction, TransportConnectInfo, TransportRecord, TransportRegistry};
