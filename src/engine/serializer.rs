//! Exclusive, FIFO access to the single engine handle.

use super::{EngineLauncher, SearchEngine};
use crate::chess::GamePosition;
use crate::error::{EngineError, EngineErrorKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Serializes searches on one engine handle.
///
/// Callers queue on a fair mutex, so searches run one at a time in arrival
/// order. A failed search triggers one re-initialization of the handle.
pub struct EngineSerializer {
    launcher: Arc<dyn EngineLauncher>,
    handle: Mutex<Option<Box<dyn SearchEngine>>>,
    time_limit: Duration,
    available: AtomicBool,
    searches: AtomicU64,
    failures: AtomicU64,
}

impl std::fmt::Debug for EngineSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSerializer")
            .field("engine", &self.launcher.describe())
            .field("time_limit", &self.time_limit)
            .field("available", &self.is_available())
            .field("searches", &self.searches_completed())
            .finish()
    }
}

impl EngineSerializer {
    /// Creates a serializer with no handle started yet.
    pub fn new(launcher: Arc<dyn EngineLauncher>, time_limit: Duration) -> Self {
        Self {
            launcher,
            handle: Mutex::new(None),
            time_limit,
            available: AtomicBool::new(false),
            searches: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Starts the handle eagerly.
    ///
    /// # Errors
    ///
    /// Returns an unavailable error if the engine cannot be started. The
    /// serializer stays usable and retries on the next request.
    #[instrument(skip(self), fields(engine = %self.launcher.describe()))]
    pub async fn start(&self) -> Result<(), EngineError> {
        let mut guard = self.handle.lock().await;
        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        Ok(())
    }

    /// Asks the engine for a move in `position`.
    ///
    /// # Errors
    ///
    /// - Unavailable if no handle can be started.
    /// - Failure if the search broke down. The handle has been restarted
    ///   once by the time this returns; if that restart also failed the
    ///   error is unavailable instead.
    #[instrument(skip(self, position), fields(ply = position.ply()))]
    pub async fn request_move(&self, position: &GamePosition) -> Result<Option<String>, EngineError> {
        let mut guard = self.handle.lock().await;

        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        let Some(engine) = (*guard).as_mut() else {
            return Err(EngineError::unavailable("Engine handle missing after start"));
        };

        match engine.compute_move(position, self.time_limit).await {
            Ok(best) => {
                self.searches.fetch_add(1, Ordering::Relaxed);
                Ok(best)
            }
            Err(mut e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Search failed, restarting engine");

                if let Some(mut broken) = guard.take() {
                    broken.shutdown().await;
                }

                match self.launch().await {
                    Ok(fresh) => {
                        *guard = Some(fresh);
                        e.kind = EngineErrorKind::Failure;
                        Err(e)
                    }
                    Err(mut restart) => {
                        restart.message = format!("{} (restart after: {})", restart.message, e.message);
                        Err(restart)
                    }
                }
            }
        }
    }

    /// Replaces the handle with a freshly started one.
    ///
    /// # Errors
    ///
    /// Returns an unavailable error if the new handle cannot be started.
    #[instrument(skip(self), fields(engine = %self.launcher.describe()))]
    pub async fn restart(&self) -> Result<(), EngineError> {
        let mut guard = self.handle.lock().await;
        if let Some(mut old) = guard.take() {
            old.shutdown().await;
        }
        *guard = Some(self.launch().await?);
        Ok(())
    }

    /// Stops the handle. Later requests start a new one.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let mut guard = self.handle.lock().await;
        if let Some(mut engine) = guard.take() {
            engine.shutdown().await;
        }
        self.available.store(false, Ordering::Relaxed);
        info!("Engine handle released");
    }

    /// Whether the last start attempt succeeded.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    /// Searches that returned a result.
    pub fn searches_completed(&self) -> u64 {
        self.searches.load(Ordering::Relaxed)
    }

    /// Searches that failed.
    pub fn search_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Description of the engine being launched.
    pub fn describe(&self) -> String {
        self.launcher.describe()
    }

    async fn launch(&self) -> Result<Box<dyn SearchEngine>, EngineError> {
        match self.launcher.launch().await {
            Ok(engine) => {
                self.available.store(true, Ordering::Relaxed);
                info!("Engine handle started");
                Ok(engine)
            }
            Err(mut e) => {
                self.available.store(false, Ordering::Relaxed);
                warn!(error = %e, "Engine handle failed to start");
                e.kind = EngineErrorKind::Unavailable;
                Err(e)
            }
        }
    }
}
