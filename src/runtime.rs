//! Assembly and teardown of the background machinery.

use crate::config::ServerConfig;
use crate::controller::SessionController;
use crate::dispatch::EngineDispatcher;
use crate::engine::{EngineLauncher, EngineSerializer};
use crate::session::SessionStore;
use crate::sweeper::ExpirySweeper;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// A running controller with its engine, workers and sweeper.
#[derive(Debug)]
pub struct ChessRuntime {
    controller: Arc<SessionController>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ChessRuntime {
    /// Starts the engine, the worker pool and the sweeper.
    ///
    /// An engine that fails to start leaves the runtime up in degraded
    /// mode; the first engine turn retries the launch.
    #[instrument(skip(config, launcher), fields(engine = %launcher.describe()))]
    pub async fn start(config: &ServerConfig, launcher: Arc<dyn EngineLauncher>) -> Self {
        let store = Arc::new(SessionStore::new(
            *config.max_sessions(),
            *config.soft_session_limit(),
        ));

        let engine = Arc::new(EngineSerializer::new(launcher, config.move_time()));
        if let Err(e) = engine.start().await {
            warn!(error = %e, "Engine unavailable at startup, continuing degraded");
        }

        let (dispatcher, queue) = EngineDispatcher::channel(*config.max_sessions());
        let controller = Arc::new(SessionController::new(
            Arc::clone(&store),
            engine,
            dispatcher,
            config.engine_reply_delay(),
        ));

        let cancel = CancellationToken::new();
        let mut tasks = queue.spawn_workers(
            Arc::clone(&controller),
            *config.engine_workers(),
            cancel.clone(),
        );
        tasks.push(
            ExpirySweeper::new(store, config.sweep_interval(), config.session_max_age())
                .spawn(cancel.clone()),
        );

        info!(tasks = tasks.len(), "Runtime started");
        Self {
            controller,
            cancel,
            tasks,
        }
    }

    /// The controller commands go through.
    pub fn controller(&self) -> &Arc<SessionController> {
        &self.controller
    }

    /// Stops background tasks and the engine.
    #[instrument(skip(self))]
    pub async fn shutdown(self) {
        info!("Shutting down runtime");
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        self.controller.engine().shutdown().await;
        info!("Runtime stopped");
    }
}
