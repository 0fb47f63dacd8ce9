//! Session/room coordination
//!
//! One `Room` per process: the single owner of the engine router, the
//! negotiator, both registries, the peer map and the speaker tracker.
//! Every request handler operates on an injected `Arc<Room>`; there is no
//! module-level singleton.
//!
//! Engine death is fatal for the whole room: a monitor task flags the room,
//! all further requests fail with `ENGINE_FAILURE`, and
//! [`Room::engine_failed`] resolves so the embedding process can exit and
//! let its supervisor restart it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use crate::config::RoomConfig;
use crate::engine::{EngineEvent, MediaEngine};
use crate::error::{NotFound, Result, SfuError};
use crate::ids::{PeerId, ProducerId, TransportId};
use crate::negotiation::CapabilityNegotiator;
use crate::rtp::{MediaKind, RtpCapabilities, RtpParameters};
use crate::speaker::{ActiveSpeaker, SpeakerTracker};
use crate::track::{ConsumerDescriptor, TrackRegistry};
use crate::transport::{Direction, DtlsParameters, TransportConnectInfo, TransportRegistry};

pub mod peer;

pub use peer::{ConsumerLayers, Peer};

/// The room coordinator
pub struct Room {
    negotiator: CapabilityNegotiator,
    transports: TransportRegistry,
    tracks: Arc<TrackRegistry>,
    peers: RwLock<HashMap<PeerId, Peer>>,
    speaker: SpeakerTracker,
    fatal: Arc<AtomicBool>,
    died_rx: watch::Receiver<bool>,
    monitor: JoinHandle<()>,
}

impl Room {
    /// One-time session initialization
    ///
    /// Builds the capability set, creates the engine router with it, starts
    /// the audio-level observer and wires it to the speaker tracker, and
    /// spawns the engine death monitor.
    pub async fn open(engine: Arc<dyn MediaEngine>, config: RoomConfig) -> Result<Arc<Self>> {
        let negotiator = CapabilityNegotiator::new(&config.media_codecs).map_err(SfuError::Config)?;

        let router = engine
            .create_router(&negotiator.capabilities().codecs)
            .await
            .map_err(SfuError::Engine)?;

        let observer_rx = router
            .start_audio_observer(config.audio_level_interval)
            .await
            .map_err(SfuError::Engine)?;

        let tracks = Arc::new(TrackRegistry::new(Arc::clone(&router)));
        let speaker = SpeakerTracker::spawn(observer_rx, Arc::clone(&tracks));
        let transports = TransportRegistry::new(router, config.transport.clone());

        let fatal = Arc::new(AtomicBool::new(false));
        let (died_tx, died_rx) = watch::channel(false);
        let monitor = {
            let mut events = engine.subscribe();
            let fatal = Arc::clone(&fatal);
            tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    match event {
                        EngineEvent::Died => {
                            tracing::error!("Media engine died, room can no longer serve");
                            fatal.store(true, Ordering::SeqCst);
                            let _ = died_tx.send(true);
                            break;
                        }
                    }
                }
            })
        };

        tracing::info!(
            codecs = negotiator.capabilities().codecs.len(),
            observer_interval_ms = config.audio_level_interval.as_millis() as u64,
            "Room opened"
        );

        Ok(Arc::new(Self {
            negotiator,
            transports,
            tracks,
            peers: RwLock::new(HashMap::new()),
            speaker,
            fatal,
            died_rx,
            monitor,
        }))
    }

    /// The room-wide capability set, structurally identical on every call
    pub fn router_rtp_capabilities(&self) -> RtpCapabilities {
        self.negotiator.capabilities().clone()
    }

    /// Register a new participant and return its server-generated id
    pub async fn join(&self) -> Result<PeerId> {
        self.check_fatal()?;

        let peer_id = PeerId::new();
        self.peers.write().await.insert(peer_id, Peer::new(peer_id));
        tracing::info!(peer = %peer_id, "Peer joined");
        Ok(peer_id)
    }

    /// Remove a participant and cascade-release everything it owned
    ///
    /// Producers are closed and their slot cleared (consumers bound to them
    /// go too), then the peer's transports and the consumers running on
    /// them, then the peer record. Unknown peers are ignored with a
    /// warning.
    pub async fn leave(&self, peer_id: PeerId) {
        let Some(peer) = self.peers.write().await.remove(&peer_id) else {
            tracing::warn!(peer = %peer_id, "Leave for unknown peer ignored");
            return;
        };

        self.tracks.remove_for_peer(peer_id).await;

        let transport_ids = self.transports.ids_for_peer(peer_id).await;
        self.tracks
            .remove_consumers_on_transports(&transport_ids)
            .await;
        self.transports.remove_for_peer(peer_id).await;

        tracing::info!(
            peer = %peer_id,
            session_secs = peer.session_duration().as_secs(),
            "Peer left"
        );
    }

    /// Allocate a transport for a peer
    pub async fn create_transport(
        &self,
        peer_id: PeerId,
        direction: Direction,
    ) -> Result<TransportConnectInfo> {
        self.check_fatal()?;
        self.touch_peer(peer_id).await?;
        self.transports.create(peer_id, direction).await
    }

    /// Complete the DTLS handshake for a transport
    pub async fn connect_transport(
        &self,
        transport_id: TransportId,
        dtls: &DtlsParameters,
    ) -> Result<()> {
        self.check_fatal()?;
        self.transports.connect(transport_id, dtls).await
    }

    /// Publish a stream on a send transport
    ///
    /// The producer's app data is the caller's metadata merged with the
    /// owning peer and transport ids.
    pub async fn publish(
        &self,
        peer_id: PeerId,
        transport_id: TransportId,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
        app_data: serde_json::Value,
    ) -> Result<ProducerId> {
        self.check_fatal()?;
        self.touch_peer(peer_id).await?;

        let transport = self
            .transports
            .get(transport_id)
            .await
            .ok_or(SfuError::NotFound(NotFound::Transport(transport_id)))?;
        // A peer may only publish on its own transport
        if transport.peer_id != peer_id {
            return Err(SfuError::NotFound(NotFound::Transport(transport_id)));
        }
        if transport.direction != Direction::Send {
            return Err(SfuError::InvalidDirection {
                transport_id,
                expected: Direction::Send,
            });
        }

        let app_data = tag_app_data(app_data, transport.peer_id, transport_id);
        let producer_id = self
            .tracks
            .publish(&transport, kind, rtp_parameters, app_data)
            .await?;

        if let Some(peer) = self.peers.write().await.get_mut(&transport.peer_id) {
            peer.media.insert(kind, producer_id);
        }

        Ok(producer_id)
    }

    /// Create a consumer for the room's current producer of `kind`
    pub async fn consume(
        &self,
        peer_id: PeerId,
        kind: MediaKind,
        receiver_caps: &RtpCapabilities,
    ) -> Result<ConsumerDescriptor> {
        self.check_fatal()?;
        self.touch_peer(peer_id).await?;

        let producer = self
            .tracks
            .get_producer(kind)
            .await
            .ok_or(SfuError::NotFound(NotFound::Producer(kind)))?;

        let (rtp_parameters, consumer_type) = self
            .negotiator
            .consumer_parameters(&producer.rtp_parameters, receiver_caps)
            .ok_or(SfuError::IncompatibleCapabilities(producer.id))?;

        let transport = self
            .transports
            .get_by_peer_and_direction(peer_id, Direction::Receive)
            .await
            .ok_or(SfuError::NoReceiveTransport(peer_id))?;

        let descriptor = self
            .tracks
            .create_consumer(&transport, &producer, rtp_parameters, consumer_type)
            .await?;

        if let Some(peer) = self.peers.write().await.get_mut(&peer_id) {
            peer.consumer_layers
                .insert(descriptor.id, ConsumerLayers::default());
        }

        Ok(descriptor)
    }

    /// Whether `receiver_caps` can consume the identified producer
    ///
    /// Fails closed: unknown producer ids are not consumable.
    pub async fn can_consume(
        &self,
        producer_id: ProducerId,
        receiver_caps: &RtpCapabilities,
    ) -> bool {
        match self.tracks.producer_by_id(producer_id).await {
            Some(producer) => self
                .negotiator
                .can_consume(&producer.rtp_parameters, receiver_caps),
            None => false,
        }
    }

    /// Snapshot of the current active speaker
    pub fn active_speaker(&self) -> Option<ActiveSpeaker> {
        self.speaker.current()
    }

    /// Watch active-speaker changes
    pub fn speaker_changes(&self) -> watch::Receiver<Option<ActiveSpeaker>> {
        self.speaker.subscribe()
    }

    /// Record a named stat on a peer (bitrate estimates and the like,
    /// collected by the embedding server's telemetry)
    pub async fn record_stat(
        &self,
        peer_id: PeerId,
        name: impl Into<String>,
        value: f64,
    ) -> Result<()> {
        self.peers
            .write()
            .await
            .get_mut(&peer_id)
            .map(|peer| {
                peer.stats.insert(name.into(), value);
            })
            .ok_or(SfuError::NotFound(NotFound::Peer(peer_id)))
    }

    /// Snapshot of a peer record
    pub async fn peer(&self, peer_id: PeerId) -> Option<Peer> {
        self.peers.read().await.get(&peer_id).cloned()
    }

    /// Number of joined peers
    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Resolves once the engine has died
    ///
    /// The embedding process is expected to exit at that point; the room
    /// itself only refuses further work.
    pub async fn engine_failed(&self) {
        let mut rx = self.died_rx.clone();
        if rx.wait_for(|died| *died).await.is_err() {
            // Monitor ended without a death event; never resolve.
            std::future::pending::<()>().await;
        }
    }

    fn check_fatal(&self) -> Result<()> {
        if self.fatal.load(Ordering::SeqCst) {
            Err(SfuError::EngineDied)
        } else {
            Ok(())
        }
    }

    async fn touch_peer(&self, peer_id: PeerId) -> Result<()> {
        self.peers
            .write()
            .await
            .get_mut(&peer_id)
            .map(Peer::touch)
            .ok_or(SfuError::NotFound(NotFound::Peer(peer_id)))
    }
}

impl Drop for Room {
    fn drop(&mut self) {
        self.monitor.abort();
    }
}

fn tag_app_data(
    app_data: serde_json::Value,
    peer_id: PeerId,
    transport_id: TransportId,
) -> serde_json::Value {
    let mut map = match app_data {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    map.insert("peerId".to_string(), serde_json::json!(peer_id));
    map.insert("transportId".to_string(), serde_json::json!(transport_id));
    serde_json::Value::Object(map)
}
