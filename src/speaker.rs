//! Active speaker tracking
//!
//! A spawned task consumes the audio-level observer's event stream and
//! maintains the room's "who is talking" record. Two states: silent
//! (no record) and speaking (producer, peer and volume all populated);
//! the record is never partially filled. Readers take snapshots or watch
//! for changes; nothing else mutates the state.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::engine::AudioLevelEvent;
use crate::ids::{PeerId, ProducerId};
use crate::track::TrackRegistry;

/// The current speaker, fully populated or absent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSpeaker {
    /// Audio producer the level was measured on
    pub producer_id: ProducerId,
    /// Peer that owns the producer
    pub peer_id: PeerId,
    /// Measured volume in dBvo
    pub volume: i32,
}

/// Background tracker owning the speaker record
pub struct SpeakerTracker {
    rx: watch::Receiver<Option<ActiveSpeaker>>,
    task: JoinHandle<()>,
}

impl SpeakerTracker {
    /// Spawn the tracker over an observer event stream
    ///
    /// `tracks` resolves producer ownership; volume samples for producers
    /// no longer registered are dropped.
    pub fn spawn(events: mpsc::Receiver<AudioLevelEvent>, tracks: Arc<TrackRegistry>) -> Self {
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(run(events, tracks, tx));
        Self { rx, task }
    }

    /// Snapshot of the current speaker
    pub fn current(&self) -> Option<ActiveSpeaker> {
        self.rx.borrow().clone()
    }

    /// Watch for speaker changes (for notification fan-out)
    pub fn subscribe(&self) -> watch::Receiver<Option<ActiveSpeaker>> {
        self.rx.clone()
    }
}

impl Drop for SpeakerTracker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut events: mpsc::Receiver<AudioLevelEvent>,
    tracks: Arc<TrackRegistry>,
    tx: watch::Sender<Option<ActiveSpeaker>>,
) {
    while let Some(event) = events.recv().await {
        match event {
            AudioLevelEvent::Volumes(samples) => {
                // The observer orders entries loudest first
                let Some(loudest) = samples.first() else {
                    continue;
                };

                match tracks.producer_owner(loudest.producer_id).await {
                    Some(peer_id) => {
                        tracing::debug!(
                            producer = %loudest.producer_id,
                            peer = %peer_id,
                            volume = loudest.volume,
                            "Active speaker updated"
                        );
                        tx.send_replace(Some(ActiveSpeaker {
                            producer_id: loudest.producer_id,
                            peer_id,
                            volume: loudest.volume,
                        }));
                    }
                    None => {
                        // Sample raced a producer replacement or teardown
                        tracing::debug!(
                            producer = %loudest.producer_id,
                            "Volume sample for unregistered producer dropped"
                        );
                    }
                }
            }
            AudioLevelEvent::Silence => {
                tracing::debug!("Audio level silence");
                tx.send_replace(None);
            }
        }
    }
}
