//! Interactive terminal game against the engine.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use strictly_chess::{SessionController, SessionError, SessionStatus, SessionView};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, instrument};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One line of player input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Quit,
    Moves,
    Help,
    Move(String),
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(match line.to_ascii_lowercase().as_str() {
        "quit" | "resign" => Input::Quit,
        "moves" => Input::Moves,
        "help" | "?" => Input::Help,
        _ => Input::Move(line.to_string()),
    })
}

fn print_help() {
    println!("Enter moves in coordinate notation, e.g. e2e4 or e7e8q.");
    println!("  moves  list legal moves");
    println!("  quit   resign and exit");
}

fn print_board(view: &SessionView) {
    println!();
    println!("{}", view.board.diagram());
    if view.board.check && view.result.is_none() {
        println!("Check!");
    }
}

/// Waits until the engine has answered.
async fn await_engine(controller: &SessionController, session_id: &str) -> Result<SessionView, SessionError> {
    loop {
        let view = controller.get_state(session_id)?;
        if view.status != SessionStatus::EngineThinking {
            return Ok(view);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Plays one game on stdin/stdout, then optionally writes its PGN.
#[instrument(skip(controller))]
pub async fn play(controller: Arc<SessionController>, pgn_out: Option<PathBuf>) -> Result<()> {
    let mut view = controller.create_session()?;
    let session_id = view.session_id.clone();
    info!(%session_id, "Terminal game started");

    println!("You play white against {}.", controller.engine().describe());
    print_help();
    print_board(&view);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while view.status != SessionStatus::Finished {
        println!("Your move:");
        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            debug!("Input closed, resigning");
            view = controller.resign(&session_id)?;
            break;
        };

        match parse_input(&line) {
            None => continue,
            Some(Input::Help) => print_help(),
            Some(Input::Moves) => {
                let moves = controller.list_legal_moves(&session_id)?;
                let moves: Vec<String> = moves.into_iter().map(String::from).collect();
                println!("{}", moves.join(" "));
            }
            Some(Input::Quit) => {
                view = controller.resign(&session_id)?;
            }
            Some(Input::Move(token)) => match controller.submit_move(&session_id, &token) {
                Ok(updated) => {
                    view = updated;
                    if view.status == SessionStatus::EngineThinking {
                        println!("Engine is thinking...");
                        view = await_engine(&controller, &session_id).await?;
                        if let Some(last) = view.history.last() {
                            println!("Engine: {}", last.notation());
                        }
                    }
                    print_board(&view);
                }
                Err(SessionError::IllegalMove { token, legal_moves }) => {
                    println!("Illegal move '{}'. Legal moves: {}", token, legal_moves.join(" "));
                }
                Err(e @ (SessionError::MalformedMove(_) | SessionError::EngineUnavailable(_))) => {
                    println!("{}", e);
                }
                Err(e) => return Err(e.into()),
            },
        }
    }

    match (view.result, view.termination) {
        (Some(result), Some(termination)) => println!("Game over: {} ({})", result, termination),
        (Some(result), None) => println!("Game over: {}", result),
        _ => println!("Game over"),
    }

    if let Some(path) = pgn_out {
        let pgn = controller.export_pgn(&session_id)?;
        tokio::fs::write(&path, pgn)
            .await
            .with_context(|| format!("Failed to write PGN to {}", path.display()))?;
        println!("PGN written to {}", path.display());
    }

    controller.delete(&session_id);
    Ok(())
}
