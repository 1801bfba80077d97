//! Background worker pool that runs engine turns.

use crate::controller::SessionController;
use crate::error::SessionError;
use crate::session::SessionId;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// A pending engine turn for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineJob {
    /// Session waiting for the engine.
    pub session_id: SessionId,
    /// Session generation when the job was queued.
    pub generation: u64,
}

/// Sending half of the engine job queue.
#[derive(Debug, Clone)]
pub struct EngineDispatcher {
    sender: mpsc::Sender<EngineJob>,
}

/// Receiving half of the engine job queue, shared by the workers.
#[derive(Debug)]
pub struct JobQueue {
    receiver: Arc<Mutex<mpsc::Receiver<EngineJob>>>,
}

impl EngineDispatcher {
    /// Creates a bounded queue.
    pub fn channel(capacity: usize) -> (Self, JobQueue) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self { sender },
            JobQueue {
                receiver: Arc::new(Mutex::new(receiver)),
            },
        )
    }

    /// Queues a job without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EngineUnavailable`] if the queue is full or
    /// no worker is left to drain it.
    #[instrument(skip(self), fields(session_id = %job.session_id))]
    pub fn enqueue(&self, job: EngineJob) -> Result<(), SessionError> {
        self.sender.try_send(job).map_err(|e| {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "engine queue is full",
                mpsc::error::TrySendError::Closed(_) => "engine workers have stopped",
            };
            warn!(reason, "Failed to queue engine turn");
            SessionError::EngineUnavailable(reason.to_string())
        })?;
        debug!("Engine turn queued");
        Ok(())
    }
}

impl JobQueue {
    /// Spawns `workers` tasks that run queued engine turns until `cancel`
    /// fires. The engine itself still serializes the searches.
    #[instrument(skip(self, controller, cancel))]
    pub fn spawn_workers(
        self,
        controller: Arc<SessionController>,
        workers: usize,
        cancel: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        info!(workers, "Starting engine workers");
        (0..workers.max(1))
            .map(|worker| {
                let receiver = Arc::clone(&self.receiver);
                let controller = Arc::clone(&controller);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    loop {
                        let job = tokio::select! {
                            _ = cancel.cancelled() => break,
                            job = async { receiver.lock().await.recv().await } => job,
                        };
                        match job {
                            Some(job) => controller.run_engine_turn(job).await,
                            None => break,
                        }
                    }
                    debug!(worker, "Engine worker stopped");
                })
            })
            .collect()
    }
}
