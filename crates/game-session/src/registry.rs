//! Owned session registry: channel-keyed games, pair-keyed correspondence
//! games, idle eviction, and the deadline sweep.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex as SessionLock;
use tracing::{debug, info, warn};

use chess_rules::Variant;
use engine_pool::{EnginePool, SearchLimit};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::modes::ModeKind;
use crate::rating::RatingStore;
use crate::session::{GameSession, SeatKind, SessionOptions, SessionState, SweepNotice};

type SessionMap = HashMap<String, Arc<SessionLock<GameSession>>>;

/// A correspondence deadline finding, tagged with the session's key.
#[derive(Debug)]
pub struct SweepEvent {
    pub key: String,
    pub notice: SweepNotice,
}

/// Holds every live session. At most one session per channel;
/// correspondence games are keyed by player pair instead and coexist
/// with channel-bound games.
pub struct SessionRegistry {
    channels: Mutex<SessionMap>,
    pairs: Mutex<SessionMap>,
    pool: Arc<EnginePool>,
    limit: SearchLimit,
    ratings: Option<Arc<dyn RatingStore>>,
    config: SessionConfig,
}

impl SessionRegistry {
    pub fn new(
        pool: Arc<EnginePool>,
        limit: SearchLimit,
        ratings: Option<Arc<dyn RatingStore>>,
        config: SessionConfig,
    ) -> SessionRegistry {
        SessionRegistry {
            channels: Mutex::new(HashMap::new()),
            pairs: Mutex::new(HashMap::new()),
            pool,
            limit,
            ratings,
            config,
        }
    }

    /// Start a channel-bound game.
    pub fn create(
        &self,
        channel: &str,
        options: SessionOptions,
        now: DateTime<Utc>,
    ) -> Result<Arc<SessionLock<GameSession>>, SessionError> {
        if options.mode == ModeKind::Correspondence {
            return Err(SessionError::NotAllowed(
                "correspondence games are keyed by player pair",
            ));
        }
        let mut channels = lock_map(&self.channels)?;
        if channels.contains_key(channel) {
            return Err(SessionError::SessionExists(channel.to_string()));
        }
        let session = GameSession::new(
            channel,
            options,
            self.pool.clone(),
            self.limit,
            self.ratings.clone(),
            self.config.clone(),
            now,
        )?;
        let handle = Arc::new(SessionLock::new(session));
        channels.insert(channel.to_string(), handle.clone());
        info!(channel = %channel, "session created");
        Ok(handle)
    }

    /// Start a correspondence game between two players.
    pub fn create_correspondence(
        &self,
        a: &str,
        b: &str,
        variant: Variant,
        now: DateTime<Utc>,
    ) -> Result<Arc<SessionLock<GameSession>>, SessionError> {
        let key = pair_key(a, b);
        let mut pairs = lock_map(&self.pairs)?;
        if pairs.contains_key(&key) {
            return Err(SessionError::SessionExists(key));
        }
        let options = SessionOptions {
            variant,
            mode: ModeKind::Correspondence,
            white: SeatKind::Human { id: a.to_string() },
            black: Some(SeatKind::Human { id: b.to_string() }),
        };
        let session = GameSession::new(
            &key,
            options,
            self.pool.clone(),
            self.limit,
            self.ratings.clone(),
            self.config.clone(),
            now,
        )?;
        let handle = Arc::new(SessionLock::new(session));
        pairs.insert(key.clone(), handle.clone());
        info!(key = %key, "correspondence session created");
        Ok(handle)
    }

    pub fn get(&self, channel: &str) -> Result<Arc<SessionLock<GameSession>>, SessionError> {
        let channels = lock_map(&self.channels)?;
        channels
            .get(channel)
            .cloned()
            .ok_or_else(|| SessionError::SessionNotFound(channel.to_string()))
    }

    pub fn get_correspondence(
        &self,
        a: &str,
        b: &str,
    ) -> Result<Arc<SessionLock<GameSession>>, SessionError> {
        let key = pair_key(a, b);
        let pairs = lock_map(&self.pairs)?;
        pairs
            .get(&key)
            .cloned()
            .ok_or(SessionError::SessionNotFound(key))
    }

    /// Drop a channel session outright.
    pub fn remove(&self, channel: &str) -> Result<(), SessionError> {
        let mut channels = lock_map(&self.channels)?;
        match channels.remove(channel) {
            Some(_) => Ok(()),
            None => Err(SessionError::SessionNotFound(channel.to_string())),
        }
    }

    /// Evict finished sessions and sessions idle past the timeout. A
    /// session currently locked by a caller counts as live.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let idle_after = Duration::minutes(self.config.idle_timeout_minutes);
        let mut evicted = 0;
        for lock in [&self.channels, &self.pairs] {
            if let Ok(mut map) = lock.lock() {
                map.retain(|key, handle| {
                    let keep = match handle.try_lock() {
                        Ok(session) => {
                            !matches!(session.state(), SessionState::Finished(_))
                                && now - session.last_activity() < idle_after
                        }
                        Err(_) => true,
                    };
                    if !keep {
                        debug!(key = %key, "evicting session");
                        evicted += 1;
                    }
                    keep
                });
            }
        }
        evicted
    }

    /// Run the correspondence deadline sweep across every pair session.
    pub async fn sweep_correspondence(&self, now: DateTime<Utc>) -> Vec<SweepEvent> {
        let sessions: Vec<(String, Arc<SessionLock<GameSession>>)> = match self.pairs.lock() {
            Ok(pairs) => pairs.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Err(_) => {
                warn!("session registry unavailable, skipping sweep");
                return Vec::new();
            }
        };
        let mut events = Vec::new();
        for (key, handle) in sessions {
            let mut session = handle.lock().await;
            if let Some(notice) = session.sweep_deadline(now) {
                events.push(SweepEvent { key, notice });
            }
        }
        events
    }
}

fn lock_map<'a>(map: &'a Mutex<SessionMap>) -> Result<MutexGuard<'a, SessionMap>, SessionError> {
    map.lock()
        .map_err(|_| SessionError::NotAllowed("session registry unavailable"))
}

/// Order-insensitive, case-insensitive key for a player pair.
fn pair_key(a: &str, b: &str) -> String {
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    if a <= b {
        format!("{a}:{b}")
    } else {
        format!("{b}:{a}")
    }
}
