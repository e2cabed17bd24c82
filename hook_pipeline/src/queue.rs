//! Job queue — bounded FIFO of repository names with a single worker.
//!
//! The worker awaits each pipeline to completion before taking the next
//! name, so at most one build runs at any instant across all repositories.
//! Producers wait when the buffer is full; triggers are delayed, never dropped.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::pipeline::JobPipeline;
use crate::registry::Registry;

/// Buffer slots per registered repository.
pub const DEFAULT_CAPACITY_FACTOR: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("job worker has stopped")]
    Closed,
}

/// Producer handle. Cheap to clone; the worker stops once every handle is dropped.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<String>,
}

impl JobQueue {
    /// Spawn the worker on the current runtime.
    pub fn start(
        registry: Arc<Registry>,
        pipeline: Arc<JobPipeline>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (queue, rx) = Self::bounded(capacity);
        tracing::info!(capacity = queue.tx.max_capacity(), "Job worker started");
        let worker = tokio::spawn(run_worker(rx, registry, pipeline));
        (queue, worker)
    }

    /// A queue without a worker; the caller drains the receiver, usually
    /// with [`run_worker`].
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Capacity for a registry: a small multiple of its size.
    pub fn capacity_for(registry: &Registry, factor: usize) -> usize {
        registry.len().saturating_mul(factor).max(1)
    }

    /// Append a job, waiting for space if the buffer is full.
    pub async fn enqueue(&self, name: &str) -> Result<(), QueueError> {
        self.tx
            .send(name.to_string())
            .await
            .map_err(|_| QueueError::Closed)?;
        crate::metrics::queue_depth(self.pending());
        tracing::debug!(repository = name, "Job enqueued");
        Ok(())
    }

    /// Jobs buffered and not yet picked up by the worker.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// Consume names until every producer handle is dropped, one job at a time.
pub async fn run_worker(
    mut rx: mpsc::Receiver<String>,
    registry: Arc<Registry>,
    pipeline: Arc<JobPipeline>,
) {
    while let Some(name) = rx.recv().await {
        crate::metrics::queue_depth(rx.len());

        let Some(repo) = registry.get(&name) else {
            tracing::warn!(repository = %name, "Dropping job for unknown repository");
            continue;
        };

        // A panicking job surfaces as a JoinError here instead of killing the loop.
        let pipeline = pipeline.clone();
        let job = tokio::spawn(async move { pipeline.run(&repo).await });
        match job.await {
            Ok(report) => tracing::debug!(
                repository = %name,
                job_id = %report.job_id,
                "Job complete"
            ),
            Err(e) => tracing::error!(repository = %name, "Job crashed: {e}"),
        }
    }
    tracing::info!("Job worker stopped");
}
