//! Background cache write-back
//!
//! Cache population runs off the request path on a bounded queue drained by
//! a fixed pool of workers. Enqueue never waits: a full queue drops the job.
//! Shutdown closes the queue and lets workers finish what is buffered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::cache::ResponseCache;
use crate::infrastructure::observability::record_write_back;

/// A captured upstream response waiting to populate the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBackJob {
    pub prompt: String,
    pub response: String,
}

impl WriteBackJob {
    pub fn new(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response: response.into(),
        }
    }
}

/// Configuration for the write-back queue
#[derive(Debug, Clone)]
pub struct WriteBackConfig {
    /// Number of worker tasks
    pub workers: usize,
    /// Jobs buffered before new ones are dropped
    pub queue_capacity: usize,
    /// Upper bound on the shutdown drain
    pub drain_timeout: Duration,
}

impl Default for WriteBackConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
            drain_timeout: Duration::from_secs(10),
        }
    }
}

/// Counters for queue activity
#[derive(Debug, Default)]
pub struct WriteBackStats {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
}

impl WriteBackStats {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}

/// Bounded write-back queue with a fixed worker pool
#[derive(Debug)]
pub struct WriteBackQueue {
    sender: RwLock<Option<mpsc::Sender<WriteBackJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<WriteBackStats>,
    drain_timeout: Duration,
}

impl WriteBackQueue {
    /// Spawn the worker pool on the current runtime
    pub fn start(cache: Arc<dyn ResponseCache>, config: WriteBackConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let stats = Arc::new(WriteBackStats::default());

        let workers = (0..config.workers.max(1))
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    receiver.clone(),
                    cache.clone(),
                    stats.clone(),
                ))
            })
            .collect();

        info!(
            workers = config.workers.max(1),
            capacity = config.queue_capacity.max(1),
            "Cache write-back queue started"
        );

        Self {
            sender: RwLock::new(Some(sender)),
            workers: Mutex::new(workers),
            stats,
            drain_timeout: config.drain_timeout,
        }
    }

    pub fn stats(&self) -> &WriteBackStats {
        &self.stats
    }

    /// Hand a job to the workers without waiting
    ///
    /// Returns `false` when the job was dropped (queue full or closed).
    pub async fn enqueue(&self, job: WriteBackJob) -> bool {
        let sender = self.sender.read().await;

        let Some(sender) = sender.as_ref() else {
            warn!("Write-back queue is closed, dropping job");
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            record_write_back("dropped");
            return false;
        };

        match sender.try_send(job) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Write-back queue is full, dropping job");
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                record_write_back("dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Write-back workers have stopped, dropping job");
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                record_write_back("dropped");
                false
            }
        }
    }

    /// Close the queue and wait for buffered jobs to finish
    ///
    /// Returns `true` when every worker exited within the drain timeout.
    pub async fn shutdown(&self) -> bool {
        // Dropping the sender lets workers drain the buffer and then exit
        self.sender.write().await.take();

        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock().await);
        if workers.is_empty() {
            return true;
        }

        info!(workers = workers.len(), "Draining cache write-back queue");

        let aborts: Vec<_> = workers.iter().map(|w| w.abort_handle()).collect();

        match tokio::time::timeout(self.drain_timeout, futures::future::join_all(workers)).await {
            Ok(_) => {
                info!(completed = self.stats.completed(), "Cache write-back queue drained");
                true
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.drain_timeout.as_secs(),
                    "Write-back drain timed out, abandoning remaining jobs"
                );
                aborts.iter().for_each(|handle| handle.abort());
                false
            }
        }
    }
}

async fn run_worker(
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<WriteBackJob>>>,
    cache: Arc<dyn ResponseCache>,
    stats: Arc<WriteBackStats>,
) {
    loop {
        let job = receiver.lock().await.recv().await;

        let Some(job) = job else {
            debug!(worker = id, "Write-back worker stopping");
            break;
        };

        let population = cache.set_response(&job.prompt, &job.response).await;
        stats.completed.fetch_add(1, Ordering::Relaxed);

        let outcome = match (population.exact_written, population.vector_written) {
            (true, true) => "completed",
            (false, false) => "failed",
            _ => "partial",
        };
        record_write_back(outcome);

        debug!(
            worker = id,
            exact_written = population.exact_written,
            vector_written = population.vector_written,
            "Write-back job finished"
        );
    }
}
