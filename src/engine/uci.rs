//! UCI engine process handle.

use super::{EngineLauncher, SearchEngine};
use crate::chess::GamePosition;
use crate::config::ServerConfig;
use crate::error::EngineError;
use async_trait::async_trait;
use derive_new::new;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, instrument, warn};

/// Launches UCI engines from an executable path.
#[derive(Debug, Clone, new)]
pub struct UciLauncher {
    path: String,
    hash_mb: u32,
    threads: u32,
    skill_level: Option<u8>,
    grace: Duration,
}

impl UciLauncher {
    /// Launcher configured from server settings.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.engine_path().clone(),
            *config.engine_hash_mb(),
            *config.engine_threads(),
            *config.engine_skill_level(),
            config.engine_grace(),
        )
    }
}

#[async_trait]
impl EngineLauncher for UciLauncher {
    #[instrument(skip(self), fields(path = %self.path))]
    async fn launch(&self) -> Result<Box<dyn SearchEngine>, EngineError> {
        let engine = UciEngine::spawn(self).await?;
        Ok(Box::new(engine))
    }

    fn describe(&self) -> String {
        self.path.clone()
    }
}

/// A running UCI engine process.
#[derive(Debug)]
pub struct UciEngine {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    grace: Duration,
}

impl UciEngine {
    /// Spawns the engine and completes the UCI handshake.
    ///
    /// The process runs from the executable's directory so engines that
    /// load network files by relative path find them.
    #[instrument(skip(launcher), fields(path = %launcher.path))]
    pub async fn spawn(launcher: &UciLauncher) -> Result<Self, EngineError> {
        info!("Starting engine process");

        let mut command = Command::new(&launcher.path);
        if let Some(dir) = Path::new(&launcher.path).parent().filter(|d| !d.as_os_str().is_empty()) {
            command.current_dir(dir);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::unavailable(format!("Failed to start '{}': {}", launcher.path, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::unavailable("Failed to capture engine stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::unavailable("Failed to capture engine stdout"))?;

        let mut engine = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            grace: launcher.grace,
        };

        engine
            .handshake(launcher)
            .await
            .map_err(|e| EngineError::unavailable(format!("Handshake failed: {}", e.message)))?;

        info!("Engine ready");
        Ok(engine)
    }

    async fn handshake(&mut self, launcher: &UciLauncher) -> Result<(), EngineError> {
        self.send("uci").await?;
        self.read_until("uciok", self.grace).await?;

        self.send(&format!("setoption name Hash value {}", launcher.hash_mb)).await?;
        self.send(&format!("setoption name Threads value {}", launcher.threads)).await?;
        if let Some(level) = launcher.skill_level {
            self.send(&format!("setoption name Skill Level value {}", level)).await?;
        }

        self.send("ucinewgame").await?;
        self.send("isready").await?;
        self.read_until("readyok", self.grace).await?;
        Ok(())
    }

    async fn send(&mut self, command: &str) -> Result<(), EngineError> {
        debug!(command, "-> engine");
        self.stdin
            .write_all(format!("{}\n", command).as_bytes())
            .await
            .map_err(|e| EngineError::failure(format!("Write to engine failed: {}", e)))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| EngineError::failure(format!("Flush to engine failed: {}", e)))
    }

    /// Reads lines until one starts with `prefix`, within `limit`.
    async fn read_until(&mut self, prefix: &str, limit: Duration) -> Result<String, EngineError> {
        let read = async {
            loop {
                match self.stdout.next_line().await {
                    Ok(Some(line)) => {
                        if line.starts_with(prefix) {
                            return Ok(line);
                        }
                    }
                    Ok(None) => return Err(EngineError::failure("Engine closed its output")),
                    Err(e) => return Err(EngineError::failure(format!("Read from engine failed: {}", e))),
                }
            }
        };

        tokio::time::timeout(limit, read).await.map_err(|_| {
            EngineError::failure(format!("No '{}' from engine within {:?}", prefix, limit))
        })?
    }
}

/// Extracts the move from a `bestmove` line; `(none)` and `0000` mean none.
fn parse_bestmove(line: &str) -> Option<String> {
    let mv = line.split_whitespace().nth(1)?;
    match mv {
        "(none)" | "0000" => None,
        mv => Some(mv.to_string()),
    }
}

#[async_trait]
impl SearchEngine for UciEngine {
    #[instrument(skip(self, position), fields(ply = position.ply()))]
    async fn compute_move(
        &mut self,
        position: &GamePosition,
        time_limit: Duration,
    ) -> Result<Option<String>, EngineError> {
        let mut command = String::from("position startpos");
        if !position.played().is_empty() {
            command.push_str(" moves");
            for applied in position.played() {
                command.push(' ');
                command.push_str(applied.token.as_str());
            }
        }

        self.send(&command).await?;
        self.send(&format!("go movetime {}", time_limit.as_millis())).await?;

        let line = self.read_until("bestmove", time_limit + self.grace).await?;
        let best = parse_bestmove(&line);
        debug!(?best, "<- engine bestmove");
        Ok(best)
    }

    #[instrument(skip(self))]
    async fn shutdown(&mut self) {
        if let Err(e) = self.send("quit").await {
            debug!(error = %e, "Engine already gone");
        }
        match tokio::time::timeout(Duration::from_secs(1), self.child.wait()).await {
            Ok(Ok(status)) => info!(%status, "Engine exited"),
            Ok(Err(e)) => warn!(error = %e, "Failed waiting for engine"),
            Err(_) => {
                warn!("Engine did not exit, killing it");
                if let Err(e) = self.child.kill().await {
                    warn!(error = %e, "Failed to kill engine");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bestmove() {
        assert_eq!(parse_bestmove("bestmove e7e5 ponder g1f3"), Some("e7e5".to_string()));
        assert_eq!(parse_bestmove("bestmove e7e8q"), Some("e7e8q".to_string()));
        assert_eq!(parse_bestmove("bestmove (none)"), None);
        assert_eq!(parse_bestmove("bestmove 0000"), None);
        assert_eq!(parse_bestmove("bestmove"), None);
    }
}
