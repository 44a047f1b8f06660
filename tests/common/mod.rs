//! Shared helpers for the integration tests: scripted UCI engines and
//! sessions wired to them.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use engine_pool::{EngineConfig, EnginePool, SearchLimit};
use game_session::{SessionConfig, SessionRegistry};
use tempfile::TempDir;

/// Minimal UCI responder: fixed score, fixed best move, every position.
pub fn canned_engine(best: &str) -> String {
    format!(
        r#"#!/bin/sh
while read line; do
  case "$line" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    go*) echo "info depth 10 score cp 20 pv {best}"; echo "bestmove {best}" ;;
    quit) exit 0 ;;
  esac
done
"#
    )
}

pub fn write_engine_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, body).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

pub fn pool_for(path: &Path, size: usize) -> Arc<EnginePool> {
    Arc::new(EnginePool::new(&EngineConfig {
        engine_path: path.to_string_lossy().into_owned(),
        pool_size: size,
        movetime_ms: 200,
        timeout_grace_ms: 2_000,
        threads: 1,
        hash_mb: 16,
    }))
}

pub fn registry_for(path: &Path) -> SessionRegistry {
    SessionRegistry::new(
        pool_for(path, 2),
        SearchLimit::movetime(200),
        None,
        SessionConfig::default(),
    )
}

pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}
