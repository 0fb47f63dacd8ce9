//! Media stream registry
//!
//! One producer slot per media kind, room-wide (single-broadcaster model),
//! plus the consumers forwarding those producers. Slot replacement is
//! transactional: the swap happens in one lock scope and the displaced
//! producer's engine resources (and its consumers) are closed afterward,
//! so no consumer ever references an unregistered producer and every
//! displaced producer is torn down.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::engine::MediaRouter;
use crate::error::{NotFound, Result, SfuError};
use crate::ids::{ConsumerId, PeerId, ProducerId, TransportId};
use crate::negotiation::ConsumerType;
use crate::rtp::{MediaKind, RtpParameters};
use crate::transport::TransportRecord;

use super::record::{ConsumerDescriptor, ConsumerRecord, ProducerRecord};

#[derive(Default)]
struct Tracks {
    producers: HashMap<MediaKind, ProducerRecord>,
    consumers: HashMap<ConsumerId, ConsumerRecord>,
}

/// Registry of producers and consumers in the room
pub struct TrackRegistry {
    router: Arc<dyn MediaRouter>,
    tracks: RwLock<Tracks>,
}

impl TrackRegistry {
    /// Create a registry allocating through the given router
    pub fn new(router: Arc<dyn MediaRouter>) -> Self {
        Self {
            router,
            tracks: RwLock::new(Tracks::default()),
        }
    }

    /// Publish a stream on a send transport, replacing any existing
    /// producer of the same kind
    ///
    /// Last write wins on the room-wide slot; two peers racing to publish
    /// the same kind is an accepted semantic of the single-broadcaster
    /// design.
    pub async fn publish(
        &self,
        transport: &TransportRecord,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
        app_data: serde_json::Value,
    ) -> Result<ProducerId> {
        let producer_id = self
            .router
            .create_producer(transport.id, kind, &rtp_parameters)
            .await
            .map_err(SfuError::Engine)?;

        let record = ProducerRecord {
            id: producer_id,
            kind,
            peer_id: transport.peer_id,
            transport_id: transport.id,
            rtp_parameters,
            paused: false,
            app_data,
        };

        // Displace and install in one lock scope so racing publishes each
        // observe exactly the producer they displaced; whatever came out of
        // the slot is then torn down.
        let (old_producer, old_consumers) = {
            let mut tracks = self.tracks.write().await;
            let old = tracks.producers.insert(kind, record);
            let consumers = match &old {
                Some(old) => {
                    remove_consumers_where(&mut tracks, |c| c.producer_id == old.id)
                }
                None => Vec::new(),
            };
            (old, consumers)
        };

        if let Some(old) = &old_producer {
            for consumer in &old_consumers {
                self.router.close_consumer(consumer.id).await;
            }
            self.router.close_producer(old.id).await;
            tracing::info!(
                producer = %old.id,
                kind = %kind,
                consumers_dropped = old_consumers.len(),
                "Producer replaced"
            );
        }

        tracing::info!(
            producer = %producer_id,
            peer = %transport.peer_id,
            transport = %transport.id,
            kind = %kind,
            "Producer published"
        );

        Ok(producer_id)
    }

    /// Create a consumer forwarding `producer` over `transport`
    ///
    /// The caller has already run the capability check and derived the
    /// consumer parameters.
    pub async fn create_consumer(
        &self,
        transport: &TransportRecord,
        producer: &ProducerRecord,
        rtp_parameters: RtpParameters,
        consumer_type: ConsumerType,
    ) -> Result<ConsumerDescriptor> {
        let handle = self
            .router
            .create_consumer(transport.id, producer.id, &rtp_parameters)
            .await
            .map_err(SfuError::Engine)?;

        let record = ConsumerRecord {
            id: handle.id,
            producer_id: producer.id,
            peer_id: transport.peer_id,
            transport_id: transport.id,
            kind: producer.kind,
            rtp_parameters: rtp_parameters.clone(),
            consumer_type,
        };

        // The producer may have been replaced or torn down while the engine
        // call was in flight; a consumer record must never reference an
        // unregistered producer.
        let still_current = {
            let mut tracks = self.tracks.write().await;
            match tracks.producers.get(&producer.kind) {
                Some(current) if current.id == producer.id => {
                    tracks.consumers.insert(handle.id, record);
                    true
                }
                _ => false,
            }
        };
        if !still_current {
            self.router.close_consumer(handle.id).await;
            tracing::debug!(
                consumer = %handle.id,
                producer = %producer.id,
                "Consumer discarded, producer gone during creation"
            );
            return Err(SfuError::NotFound(NotFound::Producer(producer.kind)));
        }

        tracing::info!(
            consumer = %handle.id,
            producer = %producer.id,
            peer = %transport.peer_id,
            kind = %producer.kind,
            "Consumer created"
        );

        Ok(ConsumerDescriptor {
            producer_id: producer.id,
            id: handle.id,
            kind: producer.kind,
            rtp_parameters,
            consumer_type,
            producer_paused: producer.paused,
        })
    }

    /// Current producer of the given kind
    pub async fn get_producer(&self, kind: MediaKind) -> Option<ProducerRecord> {
        self.tracks.read().await.producers.get(&kind).cloned()
    }

    /// Look up a producer by id (scan; at most one slot per kind)
    pub async fn producer_by_id(&self, producer_id: ProducerId) -> Option<ProducerRecord> {
        self.tracks
            .read()
            .await
            .producers
            .values()
            .find(|p| p.id == producer_id)
            .cloned()
    }

    /// Owning peer of a producer, if it is registered
    pub async fn producer_owner(&self, producer_id: ProducerId) -> Option<PeerId> {
        self.producer_by_id(producer_id).await.map(|p| p.peer_id)
    }

    /// Remove and close a peer's producers and every consumer bound to them
    pub async fn remove_for_peer(&self, peer_id: PeerId) {
        let (producers, consumers) = {
            let mut tracks = self.tracks.write().await;
            let kinds: Vec<MediaKind> = tracks
                .producers
                .values()
                .filter(|p| p.peer_id == peer_id)
                .map(|p| p.kind)
                .collect();
            let producers: Vec<ProducerRecord> = kinds
                .iter()
                .filter_map(|k| tracks.producers.remove(k))
                .collect();
            let ids: Vec<ProducerId> = producers.iter().map(|p| p.id).collect();
            let consumers =
                remove_consumers_where(&mut tracks, |c| ids.contains(&c.producer_id));
            (producers, consumers)
        };

        for consumer in &consumers {
            self.router.close_consumer(consumer.id).await;
        }
        for producer in &producers {
            self.router.close_producer(producer.id).await;
            tracing::info!(
                producer = %producer.id,
                peer = %peer_id,
                kind = %producer.kind,
                "Producer closed (owner left)"
            );
        }
    }

    /// Remove and close consumers running on the given transports
    pub async fn remove_consumers_on_transports(&self, transport_ids: &[TransportId]) {
        let consumers = {
            let mut tracks = self.tracks.write().await;
            remove_consumers_where(&mut tracks, |c| transport_ids.contains(&c.transport_id))
        };

        for consumer in &consumers {
            self.router.close_consumer(consumer.id).await;
            tracing::debug!(consumer = %consumer.id, "Consumer closed (transport removed)");
        }
    }

    /// Number of live consumers
    pub async fn consumer_count(&self) -> usize {
        self.tracks.read().await.consumers.len()
    }
}

fn remove_consumers_where(
    tracks: &mut Tracks,
    predicate: impl Fn(&ConsumerRecord) -> bool,
) -> Vec<ConsumerRecord> {
    let ids: Vec<ConsumerId> = tracks
        .consumers
        .values()
        .filter(|c| predicate(c))
        .map(|c| c.id)
        .collect();
    ids.iter()
        .filter_map(|id| tracks.consumers.remove(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WebRtcTransportOptions;
    use crate::engine::testing::{FakeEngine, FakeRouter};
    use crate::engine::MediaEngine;
    use crate::transport::{Direction, TransportRegistry};

    struct Fixture {
        fake: Arc<FakeRouter>,
        transports: TransportRegistry,
        tracks: TrackRegistry,
    }

    async fn fixture() -> Fixture {
        let engine = FakeEngine::new();
        let router = engine.create_router(&[]).await.unwrap();
        Fixture {
            fake: engine.router(),
            transports: TransportRegistry::new(
                Arc::clone(&router),
                WebRtcTransportOptions::default(),
            ),
            tracks: TrackRegistry::new(router),
        }
    }

    async fn send_transport(fx: &Fixture, peer: PeerId) -> TransportRecord {
        let info = fx.transports.create(peer, Direction::Send).await.unwrap();
        fx.transports.get(info.id).await.unwrap()
    }

    async fn recv_transport(fx: &Fixture, peer: PeerId) -> TransportRecord {
        let info = fx
            .transports
            .create(peer, Direction::Receive)
            .await
            .unwrap();
        fx.transports.get(info.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_publish_and_get() {
        let fx = fixture().await;
        let peer = PeerId::new();
        let transport = send_transport(&fx, peer).await;

        let id = fx
            .tracks
            .publish(
                &transport,
                MediaKind::Video,
                RtpParameters::default(),
                serde_json::json!({"source": "camera"}),
            )
            .await
            .unwrap();

        let producer = fx.tracks.get_producer(MediaKind::Video).await.unwrap();
        assert_eq!(producer.id, id);
        assert_eq!(producer.peer_id, peer);
        assert!(!producer.paused);
        assert_eq!(producer.app_data["source"], "camera");

        assert!(fx.tracks.get_producer(MediaKind::Audio).await.is_none());
    }

    #[tokio::test]
    async fn test_replacement_closes_old_producer() {
        let fx = fixture().await;
        let transport = send_transport(&fx, PeerId::new()).await;

        let first = fx
            .tracks
            .publish(
                &transport,
                MediaKind::Video,
                RtpParameters::default(),
                serde_json::Value::Null,
            )
            .await
            .unwrap();
        let second = fx
            .tracks
            .publish(
                &transport,
                MediaKind::Video,
                RtpParameters::default(),
                serde_json::Value::Null,
            )
            .await
            .unwrap();

        // Only the second producer remains reachable
        let current = fx.tracks.get_producer(MediaKind::Video).await.unwrap();
        assert_eq!(current.id, second);
        assert!(fx.tracks.producer_by_id(first).await.is_none());

        // The old producer's engine resources were released
        assert_eq!(fx.fake.closed_producers(), vec![first]);
    }

    #[tokio::test]
    async fn test_racing_publishes_close_every_displaced_producer() {
        let fx = fixture().await;
        let transport = send_transport(&fx, PeerId::new()).await;

        let seed = fx
            .tracks
            .publish(
                &transport,
                MediaKind::Video,
                RtpParameters::default(),
                serde_json::Value::Null,
            )
            .await
            .unwrap();

        // Two publishes interleaving at the engine await must between them
        // displace (and close) the seed and one of the pair
        let (a, b) = tokio::join!(
            fx.tracks.publish(
                &transport,
                MediaKind::Video,
                RtpParameters::default(),
                serde_json::Value::Null,
            ),
            fx.tracks.publish(
                &transport,
                MediaKind::Video,
                RtpParameters::default(),
                serde_json::Value::Null,
            ),
        );
        let a = a.unwrap();
        let b = b.unwrap();

        let current = fx.tracks.get_producer(MediaKind::Video).await.unwrap();
        assert!(current.id == a || current.id == b);

        let closed = fx.fake.closed_producers();
        assert_eq!(closed.len(), 2);
        assert!(closed.contains(&seed));
        assert!(!closed.contains(&current.id));
    }

    #[tokio::test]
    async fn test_consumer_for_displaced_producer_is_discarded() {
        let fx = fixture().await;
        let sender = send_transport(&fx, PeerId::new()).await;
        let receiver = recv_transport(&fx, PeerId::new()).await;

        fx.tracks
            .publish(
                &sender,
                MediaKind::Video,
                RtpParameters::default(),
                serde_json::Value::Null,
            )
            .await
            .unwrap();
        let stale = fx.tracks.get_producer(MediaKind::Video).await.unwrap();

        // Producer goes away after the caller's lookup but before the
        // consumer record lands
        fx.tracks.remove_for_peer(stale.peer_id).await;

        let result = fx
            .tracks
            .create_consumer(
                &receiver,
                &stale,
                RtpParameters::default(),
                ConsumerType::Simple,
            )
            .await;
        assert!(matches!(
            result,
            Err(SfuError::NotFound(NotFound::Producer(MediaKind::Video)))
        ));

        // No dangling record, and the engine-side consumer was released
        assert_eq!(fx.tracks.consumer_count().await, 0);
        assert_eq!(fx.fake.closed_consumers().len(), 1);
    }

    #[tokio::test]
    async fn test_replacement_drops_stale_consumers() {
        let fx = fixture().await;
        let sender = send_transport(&fx, PeerId::new()).await;
        let receiver = recv_transport(&fx, PeerId::new()).await;

        fx.tracks
            .publish(
                &sender,
                MediaKind::Video,
                RtpParameters::default(),
                serde_json::Value::Null,
            )
            .await
            .unwrap();
        let producer = fx.tracks.get_producer(MediaKind::Video).await.unwrap();

        let descriptor = fx
            .tracks
            .create_consumer(
                &receiver,
                &producer,
                RtpParameters::default(),
                ConsumerType::Simple,
            )
            .await
            .unwrap();
        assert_eq!(fx.tracks.consumer_count().await, 1);

        // Replacing the producer removes consumers bound to it
        fx.tracks
            .publish(
                &sender,
                MediaKind::Video,
                RtpParameters::default(),
                serde_json::Value::Null,
            )
            .await
            .unwrap();

        assert_eq!(fx.tracks.consumer_count().await, 0);
        assert_eq!(fx.fake.closed_consumers(), vec![descriptor.id]);
    }

    #[tokio::test]
    async fn test_remove_for_peer_cascades() {
        let fx = fixture().await;
        let publisher = PeerId::new();
        let viewer = PeerId::new();
        let sender = send_transport(&fx, publisher).await;
        let receiver = recv_transport(&fx, viewer).await;

        fx.tracks
            .publish(
                &sender,
                MediaKind::Audio,
                RtpParameters::default(),
                serde_json::Value::Null,
            )
            .await
            .unwrap();
        let producer = fx.tracks.get_producer(MediaKind::Audio).await.unwrap();
        fx.tracks
            .create_consumer(
                &receiver,
                &producer,
                RtpParameters::default(),
                ConsumerType::Simple,
            )
            .await
            .unwrap();

        fx.tracks.remove_for_peer(publisher).await;

        assert!(fx.tracks.get_producer(MediaKind::Audio).await.is_none());
        assert_eq!(fx.tracks.consumer_count().await, 0);
        assert_eq!(fx.fake.closed_producers().len(), 1);
        assert_eq!(fx.fake.closed_consumers().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_consumers_on_transports() {
        let fx = fixture().await;
        let sender = send_transport(&fx, PeerId::new()).await;
        let receiver = recv_transport(&fx, PeerId::new()).await;

        fx.tracks
            .publish(
                &sender,
                MediaKind::Video,
                RtpParameters::default(),
                serde_json::Value::Null,
            )
            .await
            .unwrap();
        let producer = fx.tracks.get_producer(MediaKind::Video).await.unwrap();
        fx.tracks
            .create_consumer(
                &receiver,
                &producer,
                RtpParameters::default(),
                ConsumerType::Simple,
            )
            .await
            .unwrap();

        fx.tracks
            .remove_consumers_on_transports(&[receiver.id])
            .await;
        assert_eq!(fx.tracks.consumer_count().await, 0);
        // Producer untouched
        assert!(fx.tracks.get_producer(MediaKind::Video).await.is_some());
    }
}
