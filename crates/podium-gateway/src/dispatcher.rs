use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use podium_types::events::NavigatePayload;

/// Capacity of each per-ranking broadcast channel. Navigation events are tiny
/// and a lagged viewer just resynchronizes on the next message.
const CHANNEL_CAPACITY: usize = 64;

/// Routes navigation broadcasts between the viewers of each ranking.
///
/// One broadcast channel per ranking, created on first subscribe and pruned
/// when the last viewer disconnects. Delivery is best-effort and unordered
/// with respect to other viewers' concurrent sends; there is no sequencing
/// or reconciliation.
#[derive(Clone)]
pub struct Dispatcher {
    channels: Arc<RwLock<HashMap<Uuid, broadcast::Sender<NavigatePayload>>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Join the channel for a ranking, creating it if this is the first viewer.
    pub async fn subscribe(&self, ranking_id: Uuid) -> broadcast::Receiver<NavigatePayload> {
        let mut channels = self.channels.write().await;
        channels
            .entry(ranking_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Broadcast a navigation payload to every viewer of the ranking,
    /// including the sender (receivers filter their own id).
    pub async fn send(&self, ranking_id: Uuid, payload: NavigatePayload) {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(&ranking_id) {
            // Err means no live receivers; nothing to deliver.
            let _ = tx.send(payload);
        }
    }

    /// Drop the channel once its last receiver is gone. Called by each
    /// connection on teardown.
    pub async fn prune(&self, ranking_id: Uuid) {
        let mut channels = self.channels.write().await;
        if let Some(tx) = channels.get(&ranking_id) {
            if tx.receiver_count() == 0 {
                channels.remove(&ranking_id);
            }
        }
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
