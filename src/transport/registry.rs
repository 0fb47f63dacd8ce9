//! Transport registry
//!
//! Thread-safe via `RwLock`. Engine calls are never made while a lock is
//! held: allocation and handshake complete first, then the result is
//! recorded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::WebRtcTransportOptions;
use crate::engine::MediaRouter;
use crate::error::{NotFound, Result, SfuError};
use crate::ids::{PeerId, TransportId};

use super::params::{DtlsParameters, IceCandidate, IceParameters};

/// Direction of a transport from the client's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Client publishes media over this transport
    Send,
    /// Client receives forwarded media over this transport
    Receive,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Send => write!(f, "send"),
            Direction::Receive => write!(f, "receive"),
        }
    }
}

/// DTLS/ICE connection state of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Allocated, handshake not started
    New,
    /// Handshake in progress
    Connecting,
    /// Handshake complete
    Connected,
    /// Handshake failed; the client must recreate the transport
    Failed,
}

/// One registered transport
#[derive(Debug, Clone)]
pub struct TransportRecord {
    /// Engine-assigned transport id
    pub id: TransportId,
    /// Owning peer
    pub peer_id: PeerId,
    /// Client-side direction
    pub direction: Direction,
    /// Connection state
    pub state: ConnectionState,
    /// When the transport was allocated
    pub created_at: Instant,
    /// Creation order, used for deterministic duplicate tie-breaking
    seq: u64,
}

/// Connection material returned to the remote peer
///
/// Only what the client needs to connect; internal registry state stays
/// server-side.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportConnectInfo {
    /// Transport id the client references in later requests
    pub id: TransportId,
    /// Server-side ICE parameters
    pub ice_parameters: IceParameters,
    /// Server-side ICE candidates
    pub ice_candidates: Vec<IceCandidate>,
    /// Server-side DTLS parameters
    pub dtls_parameters: DtlsParameters,
}

/// Registry of all transports in the room
pub struct TransportRegistry {
    router: Arc<dyn MediaRouter>,
    options: WebRtcTransportOptions,
    transports: RwLock<HashMap<TransportId, TransportRecord>>,
    next_seq: AtomicU64,
}

impl TransportRegistry {
    /// Create a registry allocating through the given router
    pub fn new(router: Arc<dyn MediaRouter>, options: WebRtcTransportOptions) -> Self {
        Self {
            router,
            options,
            transports: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Allocate a transport for a peer and register it
    ///
    /// Nothing prevents a peer from creating several transports of the same
    /// direction; lookups resolve duplicates to the most recently created.
    pub async fn create(
        &self,
        peer_id: PeerId,
        direction: Direction,
    ) -> Result<TransportConnectInfo> {
        let handle = self
            .router
            .create_transport(&self.options)
            .await
            .map_err(SfuError::Engine)?;

        let record = TransportRecord {
            id: handle.id,
            peer_id,
            direction,
            state: ConnectionState::New,
            created_at: Instant::now(),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };

        self.transports.write().await.insert(handle.id, record);

        tracing::info!(
            transport = %handle.id,
            peer = %peer_id,
            direction = %direction,
            "Transport created"
        );

        Ok(TransportConnectInfo {
            id: handle.id,
            ice_parameters: handle.ice_parameters,
            ice_candidates: handle.ice_candidates,
            dtls_parameters: handle.dtls_parameters,
        })
    }

    /// Complete the DTLS handshake for a transport
    ///
    /// A failed handshake is propagated, not retried; the transport is left
    /// in `Failed` state and the client is expected to recreate it.
    pub async fn connect(&self, transport_id: TransportId, dtls: &DtlsParameters) -> Result<()> {
        {
            let mut transports = self.transports.write().await;
            let record = transports
                .get_mut(&transport_id)
                .ok_or(SfuError::NotFound(NotFound::Transport(transport_id)))?;
            record.state = ConnectionState::Connecting;
        }

        match self.router.connect_transport(transport_id, dtls).await {
            Ok(()) => {
                if let Some(record) = self.transports.write().await.get_mut(&transport_id) {
                    record.state = ConnectionState::Connected;
                }
                tracing::info!(transport = %transport_id, "Transport connected");
                Ok(())
            }
            Err(e) => {
                if let Some(record) = self.transports.write().await.get_mut(&transport_id) {
                    record.state = ConnectionState::Failed;
                }
                tracing::warn!(transport = %transport_id, error = %e, "Transport connect failed");
                Err(SfuError::Connect(e))
            }
        }
    }

    /// Look up a transport by id
    pub async fn get(&self, transport_id: TransportId) -> Option<TransportRecord> {
        self.transports.read().await.get(&transport_id).cloned()
    }

    /// Look up a peer's transport of the given direction
    ///
    /// Linear scan; if the peer created duplicates, the most recently
    /// created one wins.
    pub async fn get_by_peer_and_direction(
        &self,
        peer_id: PeerId,
        direction: Direction,
    ) -> Option<TransportRecord> {
        self.transports
            .read()
            .await
            .values()
            .filter(|t| t.peer_id == peer_id && t.direction == direction)
            .max_by_key(|t| t.seq)
            .cloned()
    }

    /// All transport ids owned by a peer
    pub async fn ids_for_peer(&self, peer_id: PeerId) -> Vec<TransportId> {
        self.transports
            .read()
            .await
            .values()
            .filter(|t| t.peer_id == peer_id)
            .map(|t| t.id)
            .collect()
    }

    /// Remove a peer's transports, closing their engine resources
    ///
    /// Returns the removed ids so the caller can cascade consumer cleanup.
    pub async fn remove_for_peer(&self, peer_id: PeerId) -> Vec<TransportId> {
        let removed: Vec<TransportId> = {
            let mut transports = self.transports.write().await;
            let ids: Vec<TransportId> = transports
                .values()
                .filter(|t| t.peer_id == peer_id)
                .map(|t| t.id)
                .collect();
            for id in &ids {
                transports.remove(id);
            }
            ids
        };

        for id in &removed {
            self.router.close_transport(*id).await;
            tracing::info!(transport = %id, peer = %peer_id, "Transport closed");
        }

        removed
    }

    /// Number of registered transports
    pub async fn count(&self) -> usize {
        self.transports.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeEngine;
    use crate::engine::MediaEngine;

    async fn registry() -> (Arc<crate::engine::testing::FakeRouter>, TransportRegistry) {
        let engine = FakeEngine::new();
        let router = engine.create_router(&[]).await.unwrap();
        (
            engine.router(),
            TransportRegistry::new(router, WebRtcTransportOptions::default()),
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_, registry) = registry().await;
        let peer = PeerId::new();

        let info = registry.create(peer, Direction::Send).await.unwrap();
        assert!(!info.ice_candidates.is_empty());

        let record = registry.get(info.id).await.unwrap();
        assert_eq!(record.peer_id, peer);
        assert_eq!(record.direction, Direction::Send);
        assert_eq!(record.state, ConnectionState::New);
    }

    #[tokio::test]
    async fn test_connect_transitions_state() {
        let (fake, registry) = registry().await;
        let peer = PeerId::new();
        let info = registry.create(peer, Direction::Send).await.unwrap();

        registry
            .connect(info.id, &info.dtls_parameters)
            .await
            .unwrap();

        let record = registry.get(info.id).await.unwrap();
        assert_eq!(record.state, ConnectionState::Connected);
        assert!(fake.is_connected(info.id));
    }

    #[tokio::test]
    async fn test_connect_unknown_transport() {
        let (_, registry) = registry().await;
        let dtls = DtlsParameters {
            role: crate::transport::DtlsRole::Client,
            fingerprints: Vec::new(),
        };

        let result = registry.connect(TransportId::new(), &dtls).await;
        assert!(matches!(
            result,
            Err(SfuError::NotFound(NotFound::Transport(_)))
        ));
    }

    #[tokio::test]
    async fn test_connect_failure_marks_failed() {
        let (fake, registry) = registry().await;
        let peer = PeerId::new();
        let info = registry.create(peer, Direction::Receive).await.unwrap();

        fake.fail_connect.store(true, std::sync::atomic::Ordering::Relaxed);
        let result = registry.connect(info.id, &info.dtls_parameters).await;
        assert!(matches!(result, Err(SfuError::Connect(_))));

        let record = registry.get(info.id).await.unwrap();
        assert_eq!(record.state, ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_duplicate_lookup_prefers_most_recent() {
        let (_, registry) = registry().await;
        let peer = PeerId::new();

        let _first = registry.create(peer, Direction::Send).await.unwrap();
        let second = registry.create(peer, Direction::Send).await.unwrap();

        let found = registry
            .get_by_peer_and_direction(peer, Direction::Send)
            .await
            .unwrap();
        assert_eq!(found.id, second.id);
    }

    #[tokio::test]
    async fn test_remove_for_peer_closes_engine_resources() {
        let (fake, registry) = registry().await;
        let peer = PeerId::new();
        let other = PeerId::new();

        let a = registry.create(peer, Direction::Send).await.unwrap();
        let b = registry.create(peer, Direction::Receive).await.unwrap();
        let keep = registry.create(other, Direction::Send).await.unwrap();

        let removed = registry.remove_for_peer(peer).await;
        assert_eq!(removed.len(), 2);
        assert!(removed.contains(&a.id));
        assert!(removed.contains(&b.id));

        assert!(registry.get(a.id).await.is_none());
        assert!(registry.get(keep.id).await.is_some());
        assert_eq!(fake.closed_transports().len(), 2);
    }
}
