//! Newtype identifiers
//!
//! Server-generated UUIDv4 ids for every entity the registries track.
//! Newtypes rather than aliases so a producer id can never be passed where
//! a transport id is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random id
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

define_id!(
    /// Identifies one connected participant
    PeerId
);
define_id!(
    /// Identifies one network transport
    TransportId
);
define_id!(
    /// Identifies one published media stream
    ProducerId
);
define_id!(
    /// Identifies one forwarding handle bound to a receiving peer
    ConsumerId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<PeerId> = (0..1000).map(|_| PeerId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_serde_transparent() {
        let id = TransportId::new();
        let json = serde_json::to_string(&id).unwrap();
        // Serializes as a bare string, not a wrapped object
        assert!(json.starts_with('"'));
        let back: TransportId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
