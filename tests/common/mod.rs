//! Scripted engine fakes and controller builders shared by the tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use strictly_chess::{
    ChessRuntime, EngineDispatcher, EngineError, EngineLauncher, EngineSerializer, GamePosition,
    JobQueue, SearchEngine, ServerConfig, SessionController, SessionStatus, SessionStore,
    SessionView,
};

/// What the fake engine does on its next search.
#[derive(Debug, Clone)]
pub enum Reply {
    Move(&'static str),
    NoMove,
    Fail,
}

/// Shared counters and script, visible to the test after launch.
#[derive(Debug, Default)]
pub struct EngineProbe {
    script: Mutex<VecDeque<Reply>>,
    pub launches: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub searches: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub refuse_launch: AtomicBool,
}

impl EngineProbe {
    pub fn push(&self, reply: Reply) {
        self.script.lock().push_back(reply);
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

/// Launcher handing out fakes that follow a shared script. An empty script
/// plays the first legal move.
#[derive(Debug, Clone)]
pub struct ScriptedLauncher {
    pub probe: Arc<EngineProbe>,
    pub search_time: Duration,
}

impl ScriptedLauncher {
    pub fn new(script: impl IntoIterator<Item = Reply>) -> Self {
        let probe = EngineProbe::default();
        probe.script.lock().extend(script);
        Self {
            probe: Arc::new(probe),
            search_time: Duration::ZERO,
        }
    }

    pub fn refusing() -> Self {
        let launcher = Self::new([]);
        launcher.probe.refuse_launch.store(true, Ordering::SeqCst);
        launcher
    }

    pub fn with_search_time(mut self, search_time: Duration) -> Self {
        self.search_time = search_time;
        self
    }
}

#[async_trait]
impl EngineLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Box<dyn SearchEngine>, EngineError> {
        if self.probe.refuse_launch.load(Ordering::SeqCst) {
            return Err(EngineError::unavailable("scripted launch refusal"));
        }
        self.probe.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedEngine {
            probe: Arc::clone(&self.probe),
            search_time: self.search_time,
        }))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

struct ScriptedEngine {
    probe: Arc<EngineProbe>,
    search_time: Duration,
}

#[async_trait]
impl SearchEngine for ScriptedEngine {
    async fn compute_move(
        &mut self,
        position: &GamePosition,
        _time_limit: Duration,
    ) -> Result<Option<String>, EngineError> {
        let active = self.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_active.fetch_max(active, Ordering::SeqCst);
        if !self.search_time.is_zero() {
            tokio::time::sleep(self.search_time).await;
        }
        self.probe.active.fetch_sub(1, Ordering::SeqCst);
        self.probe.searches.fetch_add(1, Ordering::SeqCst);

        let next = self.probe.script.lock().pop_front();
        match next {
            Some(Reply::Move(token)) => Ok(Some(token.to_string())),
            Some(Reply::NoMove) => Ok(None),
            Some(Reply::Fail) => Err(EngineError::failure("scripted crash")),
            None => Ok(position.legal_moves().first().map(|m| m.to_string())),
        }
    }

    async fn shutdown(&mut self) {
        self.probe.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig::default()
        .with_engine_reply_delay_ms(0)
        .with_session_limits(100, 80)
}

/// A full runtime with workers running engine turns.
pub async fn runtime(launcher: ScriptedLauncher) -> ChessRuntime {
    ChessRuntime::start(&test_config(), Arc::new(launcher)).await
}

/// A controller whose queued engine turns are never picked up. Keep the
/// queue alive for as long as the controller is used.
pub fn idle_controller(
    launcher: ScriptedLauncher,
    max_sessions: usize,
) -> (Arc<SessionController>, JobQueue) {
    idle_controller_with_limits(launcher, max_sessions, max_sessions)
}

pub fn idle_controller_with_limits(
    launcher: ScriptedLauncher,
    max_sessions: usize,
    soft_limit: usize,
) -> (Arc<SessionController>, JobQueue) {
    let store = Arc::new(SessionStore::new(max_sessions, soft_limit));
    let engine = Arc::new(EngineSerializer::new(
        Arc::new(launcher),
        Duration::from_millis(10),
    ));
    let (dispatcher, queue) = EngineDispatcher::channel(max_sessions);
    let controller = Arc::new(SessionController::new(
        store,
        engine,
        dispatcher,
        Duration::ZERO,
    ));
    (controller, queue)
}

/// Polls until the engine has answered.
pub async fn wait_for_human(controller: &SessionController, session_id: &str) -> SessionView {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let view = controller.get_state(session_id).unwrap();
            if view.status != SessionStatus::EngineThinking {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("engine turn did not complete")
}
