//! In-memory engine for tests
//!
//! Allocates ids and canned connection material without any real media
//! stack. Records every close call so tests can assert teardown order, and
//! exposes the observer/event senders so tests can inject volume samples or
//! an engine death.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::config::WebRtcTransportOptions;
use crate::ids::{ConsumerId, ProducerId, TransportId};
use crate::rtp::{MediaKind, RtpCodecCapability, RtpParameters};
use crate::transport::params::{
    DtlsFingerprint, DtlsParameters, DtlsRole, IceCandidate, IceParameters,
};

use super::{
    AudioLevelEvent, ConsumerHandle, EngineError, EngineEvent, MediaEngine, MediaRouter,
    TransportHandle,
};

/// Fake engine backing one [`FakeRouter`]
pub(crate) struct FakeEngine {
    events: broadcast::Sender<EngineEvent>,
    router: Arc<FakeRouter>,
}

impl FakeEngine {
    pub(crate) fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(4);
        Arc::new(Self {
            events,
            router: Arc::new(FakeRouter::default()),
        })
    }

    /// Simulate the engine worker dying
    pub(crate) fn kill(&self) {
        let _ = self.events.send(EngineEvent::Died);
    }

    pub(crate) fn router(&self) -> Arc<FakeRouter> {
        Arc::clone(&self.router)
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn create_router(
        &self,
        _codecs: &[RtpCodecCapability],
    ) -> Result<Arc<dyn MediaRouter>, EngineError> {
        Ok(self.router() as Arc<dyn MediaRouter>)
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }
}

#[derive(Default)]
struct FakeRouterState {
    live_transports: HashSet<TransportId>,
    connected_transports: HashSet<TransportId>,
    live_producers: HashSet<ProducerId>,
    closed_transports: Vec<TransportId>,
    closed_producers: Vec<ProducerId>,
    closed_consumers: Vec<ConsumerId>,
    volume_tx: Option<mpsc::Sender<AudioLevelEvent>>,
}

/// Fake router tracking allocations and closes
#[derive(Default)]
pub(crate) struct FakeRouter {
    /// When set, `connect_transport` fails with a handshake error
    pub(crate) fail_connect: AtomicBool,
    next_port: AtomicU32,
    inner: Mutex<FakeRouterState>,
}

impl FakeRouter {
    /// Sender feeding the observer stream handed out by `start_audio_observer`
    pub(crate) fn volume_sender(&self) -> mpsc::Sender<AudioLevelEvent> {
        self.inner
            .lock()
            .unwrap()
            .volume_tx
            .clone()
            .expect("audio observer not started")
    }

    pub(crate) fn closed_producers(&self) -> Vec<ProducerId> {
        self.inner.lock().unwrap().closed_producers.clone()
    }

    pub(crate) fn closed_transports(&self) -> Vec<TransportId> {
        self.inner.lock().unwrap().closed_transports.clone()
    }

    pub(crate) fn closed_consumers(&self) -> Vec<ConsumerId> {
        self.inner.lock().unwrap().closed_consumers.clone()
    }

    pub(crate) fn is_connected(&self, transport_id: TransportId) -> bool {
        self.inner
            .lock()
            .unwrap()
            .connected_transports
            .contains(&transport_id)
    }
}

#[async_trait]
impl MediaRouter for FakeRouter {
    async fn create_transport(
        &self,
        _options: &WebRtcTransportOptions,
    ) -> Result<TransportHandle, EngineError> {
        let id = TransportId::new();
        let port = 40_000 + self.next_port.fetch_add(1, Ordering::Relaxed) as u16;
        self.inner.lock().unwrap().live_transports.insert(id);

        Ok(TransportHandle {
            id,
            ice_parameters: IceParameters {
                username_fragment: format!("ufrag-{}", port),
                password: format!("pwd-{}", port),
                ice_lite: true,
            },
            ice_candidates: vec![IceCandidate {
                foundation: "udpcandidate".to_string(),
                priority: 1_076_302_079,
                ip: "127.0.0.1".to_string(),
                protocol: "udp".to_string(),
                port,
                candidate_type: "host".to_string(),
            }],
            dtls_parameters: DtlsParameters {
                role: DtlsRole::Auto,
                fingerprints: vec![DtlsFingerprint {
                    algorithm: "sha-256".to_string(),
                    value: "A0:B1:C2".to_string(),
                }],
            },
        })
    }

    async fn connect_transport(
        &self,
        transport_id: TransportId,
        _dtls: &DtlsParameters,
    ) -> Result<(), EngineError> {
        if self.fail_connect.load(Ordering::Relaxed) {
            return Err(EngineError::new("dtls handshake failed"));
        }
        let mut inner = self.inner.lock().unwrap();
        if !inner.live_transports.contains(&transport_id) {
            return Err(EngineError::new("unknown transport"));
        }
        inner.connected_transports.insert(transport_id);
        Ok(())
    }

    async fn close_transport(&self, transport_id: TransportId) {
        let mut inner = self.inner.lock().unwrap();
        inner.live_transports.remove(&transport_id);
        inner.closed_transports.push(transport_id);
    }

    async fn create_producer(
        &self,
        transport_id: TransportId,
        _kind: MediaKind,
        _rtp_parameters: &RtpParameters,
    ) -> Result<ProducerId, EngineError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.live_transports.contains(&transport_id) {
            return Err(EngineError::new("unknown transport"));
        }
        let id = ProducerId::new();
        inner.live_producers.insert(id);
        Ok(id)
    }

    async fn close_producer(&self, producer_id: ProducerId) {
        let mut inner = self.inner.lock().unwrap();
        inner.live_producers.remove(&producer_id);
        inner.closed_producers.push(producer_id);
    }

    async fn create_consumer(
        &self,
        transport_id: TransportId,
        producer_id: ProducerId,
        _rtp_parameters: &RtpParameters,
    ) -> Result<ConsumerHandle, EngineError> {
        let inner = self.inner.lock().unwrap();
        if !inner.live_transports.contains(&transport_id) {
            return Err(EngineError::new("unknown transport"));
        }
        if !inner.live_producers.contains(&producer_id) {
            return Err(EngineError::new("unknown producer"));
        }
        Ok(ConsumerHandle {
            id: ConsumerId::new(),
        })
    }

    async fn close_consumer(&self, consumer_id: ConsumerId) {
        self.inner.lock().unwrap().closed_consumers.push(consumer_id);
    }

    async fn start_audio_observer(
        &self,
        _interval: Duration,
    ) -> Result<mpsc::Receiver<AudioLevelEvent>, EngineError> {
        let (tx, rx) = mpsc::channel(16);
        self.inner.lock().unwrap().volume_tx = Some(tx);
        Ok(rx)
    }
}
