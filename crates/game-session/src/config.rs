//! Session timing knobs from environment variables.

use std::env;

/// Timing configuration for the coordination modes and the registry.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Simultaneous-mode collection window, measured from the first
    /// queued move, in milliseconds.
    pub simultaneous_window_ms: i64,

    /// Voting deadline, measured from the first cast, in seconds.
    pub vote_deadline_secs: i64,

    /// Delay before a deliberate reaction move applies, in milliseconds.
    pub reaction_delay_ms: i64,

    /// Per-move deadline for correspondence games, in hours.
    pub correspondence_deadline_hours: i64,

    /// How close to the deadline the one-time warning fires, in hours.
    pub correspondence_warning_hours: i64,

    /// Sessions with no activity for this long are evicted, in minutes.
    pub idle_timeout_minutes: i64,
}

impl SessionConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparseable.
    pub fn load() -> SessionConfig {
        let defaults = SessionConfig::default();
        SessionConfig {
            simultaneous_window_ms: env::var("SESSION_SIMUL_WINDOW_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.simultaneous_window_ms),
            vote_deadline_secs: env::var("SESSION_VOTE_DEADLINE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.vote_deadline_secs),
            reaction_delay_ms: env::var("SESSION_REACTION_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.reaction_delay_ms),
            correspondence_deadline_hours: env::var("SESSION_MOVE_DEADLINE_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.correspondence_deadline_hours),
            correspondence_warning_hours: env::var("SESSION_WARNING_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.correspondence_warning_hours),
            idle_timeout_minutes: env::var("SESSION_IDLE_TIMEOUT_MIN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.idle_timeout_minutes),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        SessionConfig {
            simultaneous_window_ms: 4_000,
            vote_deadline_secs: 90,
            reaction_delay_ms: 3_000,
            correspondence_deadline_hours: 24,
            correspondence_warning_hours: 2,
            idle_timeout_minutes: 30,
        }
    }
}
