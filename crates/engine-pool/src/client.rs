//! UCI engine conversation over a piped subprocess (async I/O).
//!
//! Every call spawns its own engine process and tears it down again;
//! nothing is shared or cached between calls.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;

/// Depth requests at or above this threshold fall back to the time budget.
pub const FAST_SEARCH_DEPTH: u32 = 12;

/// Search budget for one analysis call. Time-bounded search is the
/// default; an explicit depth below [`FAST_SEARCH_DEPTH`] switches to a
/// depth search instead.
#[derive(Debug, Clone, Copy)]
pub struct SearchLimit {
    pub movetime_ms: u64,
    pub depth: Option<u32>,
}

impl SearchLimit {
    pub fn movetime(ms: u64) -> SearchLimit {
        SearchLimit {
            movetime_ms: ms,
            depth: None,
        }
    }

    pub fn depth(depth: u32, movetime_ms: u64) -> SearchLimit {
        SearchLimit {
            movetime_ms,
            depth: Some(depth),
        }
    }

    fn go_command(&self) -> String {
        match self.depth {
            Some(depth) if depth < FAST_SEARCH_DEPTH => format!("go depth {depth}"),
            _ => format!("go movetime {}", self.movetime_ms),
        }
    }
}

/// Outcome of one engine call: best move in coordinate form plus the last
/// score seen before `bestmove`. Centipawns and mate count are mutually
/// exclusive, both from the side to move's perspective.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub fen: String,
    pub best_move: String,
    pub cp: Option<i32>,
    pub mate: Option<i32>,
}

/// Spawns one subprocess per `analyze` call and kills it on timeout.
#[derive(Clone, Debug)]
pub struct EngineClient {
    binary_path: String,
    threads: u32,
    hash_mb: u32,
    grace_ms: u64,
}

impl EngineClient {
    pub fn new(config: &EngineConfig) -> EngineClient {
        EngineClient {
            binary_path: config.engine_path.clone(),
            threads: config.threads,
            hash_mb: config.hash_mb,
            grace_ms: config.timeout_grace_ms,
        }
    }

    /// Run one full engine conversation for the given position. Fails with
    /// `Timeout` when no `bestmove` arrives within the search budget plus
    /// grace, and with `Process` if the subprocess dies first.
    pub async fn analyze(
        &self,
        fen: &str,
        limit: SearchLimit,
    ) -> Result<AnalysisResult, EngineError> {
        let budget_ms = limit.movetime_ms + self.grace_ms;
        let mut process = EngineProcess::spawn(&self.binary_path).await?;
        let outcome = timeout(
            Duration::from_millis(budget_ms),
            self.converse(&mut process, fen, limit),
        )
        .await;
        match outcome {
            Ok(result) => {
                process.quit().await;
                result
            }
            Err(_) => {
                warn!(fen, budget_ms, "engine timed out, killing subprocess");
                process.kill().await;
                Err(EngineError::Timeout(budget_ms))
            }
        }
    }

    async fn converse(
        &self,
        process: &mut EngineProcess,
        fen: &str,
        limit: SearchLimit,
    ) -> Result<AnalysisResult, EngineError> {
        process.send("uci").await?;
        process.wait_for("uciok").await?;
        process
            .send(&format!("setoption name Threads value {}", self.threads))
            .await?;
        process
            .send(&format!("setoption name Hash value {}", self.hash_mb))
            .await?;
        process.send("isready").await?;
        process.wait_for("readyok").await?;
        process.send(&format!("position fen {fen}")).await?;
        process.send(&limit.go_command()).await?;

        let mut cp = None;
        let mut mate = None;
        let mut line = String::new();
        loop {
            line.clear();
            let n = process.stdout.read_line(&mut line).await?;
            if n == 0 {
                return Err(EngineError::Process(
                    "engine exited before bestmove".to_string(),
                ));
            }
            let trimmed = line.trim();
            debug!(line = trimmed, "engine >");

            if trimmed.starts_with("info") && trimmed.contains(" score ") {
                if let Some(value) = parse_cp(trimmed) {
                    cp = Some(value);
                    mate = None;
                }
                if let Some(value) = parse_mate(trimmed) {
                    mate = Some(value);
                    cp = None;
                }
            } else if trimmed.starts_with("bestmove") {
                let best = trimmed.split_whitespace().nth(1);
                return match best {
                    Some(mv) if mv != "(none)" && mv != "0000" => Ok(AnalysisResult {
                        fen: fen.to_string(),
                        best_move: mv.to_string(),
                        cp,
                        mate,
                    }),
                    _ => Err(EngineError::Protocol(format!(
                        "no playable bestmove in {trimmed:?}"
                    ))),
                };
            }
        }
    }
}

struct EngineProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl EngineProcess {
    async fn spawn(path: &str) -> Result<EngineProcess, EngineError> {
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| EngineError::Process(format!("failed to spawn {path}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Process("engine stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| EngineError::Process("engine stdout not captured".to_string()))?;

        Ok(EngineProcess {
            child,
            stdin,
            stdout,
        })
    }

    async fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        debug!(cmd, "engine <");
        self.stdin.write_all(format!("{cmd}\n").as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn wait_for(&mut self, expected: &str) -> Result<(), EngineError> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self.stdout.read_line(&mut line).await?;
            if n == 0 {
                return Err(EngineError::Process(format!(
                    "engine exited while awaiting {expected}"
                )));
            }
            if line.trim() == expected {
                return Ok(());
            }
        }
    }

    /// Polite shutdown after a completed conversation; the drop guard
    /// still covers an engine that ignores `quit`.
    async fn quit(&mut self) {
        let _ = self.send("quit").await;
        let _ = timeout(Duration::from_millis(500), self.child.wait()).await;
    }

    async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        // Best-effort synchronous kill so no call path leaks a subprocess.
        let _ = self.child.start_kill();
    }
}

/// Parse centipawn score from an info line.
fn parse_cp(line: &str) -> Option<i32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "cp" && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

/// Parse mate score from an info line.
fn parse_mate(line: &str) -> Option<i32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "mate" && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}
