use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::models::event::Event;
use crate::processor::trip_engine::{Outcome, TripEngine};

/// Fans events out to a fixed set of workers. A device always hashes to the
/// same worker and each worker drains its queue in order, so events for one
/// device are applied in arrival order while devices on different workers
/// run in parallel.
pub struct Dispatcher {
    shards: Vec<mpsc::Sender<Event>>,
    handles: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn spawn(engine: Arc<TripEngine>, workers: usize, queue_capacity: usize) -> Self {
        let workers = workers.max(1);
        let mut shards = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for shard in 0..workers {
            let (tx, rx) = mpsc::channel(queue_capacity.max(1));
            shards.push(tx);
            handles.push(tokio::spawn(run_worker(shard, engine.clone(), rx)));
        }

        info!("Started {} trip workers", workers);
        Self { shards, handles }
    }

    fn shard_for(&self, device_id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        device_id.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    /// Queues an event, waiting for room when the worker is behind.
    pub async fn dispatch(&self, event: Event) -> anyhow::Result<()> {
        let shard = self.shard_for(event.device_id());
        self.shards[shard]
            .send(event)
            .await
            .map_err(|e| anyhow::anyhow!("trip worker {} is gone, dropped {}", shard, e.0))
    }

    /// Closes the queues and waits for workers to drain them.
    pub async fn shutdown(self) {
        drop(self.shards);
        for result in futures::future::join_all(self.handles).await {
            if let Err(e) = result {
                error!("Trip worker panicked: {}", e);
            }
        }
    }
}

async fn run_worker(shard: usize, engine: Arc<TripEngine>, mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match engine.handle(&event).await {
            Ok(Outcome::Ignored(reason)) => debug!("Worker {} ignored {}: {}", shard, event, reason),
            Ok(outcome) => debug!("Worker {} applied {}: {:?}", shard, event, outcome),
            Err(e) => error!("Error processing {}: {}", event, e),
        }
    }
    debug!("Trip worker {} stopped", shard);
}
