//! Producer/consumer tracking
//!
//! The media-stream side of the room: the single room-wide producer slot
//! per kind and the forwarding consumers bound to receiving peers'
//! transports.

pub mod record;
pub mod registry;

pub use record::{ConsumerDescriptor, ConsumerRecord, ProducerRecord};
pub use registry::TrackRegistry;
