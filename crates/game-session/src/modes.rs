//! Coordination-mode sub-state. Everything here is pure bookkeeping;
//! the session decides when to consult it and applies the results.

use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Coordination rule chosen at session creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    Alternating,
    Simultaneous,
    Voting,
    Reaction,
    Correspondence,
}

/// Speed tag on a reaction-mode submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    Instant,
    Deliberate,
    Normal,
}

impl Speed {
    pub fn from_tag(tag: &str) -> Option<Speed> {
        match tag.to_ascii_lowercase().as_str() {
            "instant" => Some(Speed::Instant),
            "deliberate" => Some(Speed::Deliberate),
            "normal" => Some(Speed::Normal),
            _ => None,
        }
    }
}

/// A move waiting in the simultaneous buffer. The raw input is kept
/// as submitted; legality is decided only when the window closes.
#[derive(Debug, Clone)]
pub struct PendingMove {
    pub seat: usize,
    pub input: String,
    pub at: DateTime<Utc>,
}

/// Simultaneous collection window. Armed by the first submission,
/// cleared when the window is taken.
#[derive(Debug, Clone, Default)]
pub struct SimultaneousState {
    pending: Vec<PendingMove>,
    window_closes_at: Option<DateTime<Utc>>,
}

impl SimultaneousState {
    /// One pending move per seat; a resubmission replaces the move and
    /// its timestamp. Returns when the window closes.
    pub fn queue(&mut self, seat: usize, input: &str, at: DateTime<Utc>, window_ms: i64) -> DateTime<Utc> {
        match self.pending.iter_mut().find(|p| p.seat == seat) {
            Some(existing) => {
                existing.input = input.to_string();
                existing.at = at;
            }
            None => self.pending.push(PendingMove {
                seat,
                input: input.to_string(),
                at,
            }),
        }
        match self.window_closes_at {
            Some(closes) => closes,
            None => {
                let closes = at + Duration::milliseconds(window_ms);
                self.window_closes_at = Some(closes);
                closes
            }
        }
    }

    pub fn is_armed(&self) -> bool {
        self.window_closes_at.is_some()
    }

    pub fn due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.window_closes_at, Some(closes) if now >= closes)
    }

    /// Drain the buffer in submission-timestamp order and disarm the
    /// window.
    pub fn take(&mut self) -> Vec<PendingMove> {
        self.window_closes_at = None;
        let mut drained = std::mem::take(&mut self.pending);
        drained.sort_by_key(|p| p.at);
        drained
    }
}

/// Ballot for the crowd seat. Votes are keyed by voter (one live vote
/// each); `casts` counts every cast, including overwrites, and drives
/// the early-closure rules.
#[derive(Debug, Clone, Default)]
pub struct VotingState {
    votes: HashMap<String, String>,
    /// Per move: current tally and the cast index at which it reached it.
    reached: HashMap<String, (u32, u32)>,
    casts: u32,
    pub deadline: Option<DateTime<Utc>>,
}

impl VotingState {
    /// Record one cast, replacing the voter's previous vote if any.
    pub fn cast(&mut self, voter: &str, uci: &str, now: DateTime<Utc>, deadline_secs: i64) {
        if self.deadline.is_none() {
            self.deadline = Some(now + Duration::seconds(deadline_secs));
        }
        self.casts += 1;
        let previous = self.votes.insert(voter.to_string(), uci.to_string());
        if let Some(old) = previous {
            if old == uci {
                return;
            }
            if let Some(entry) = self.reached.get_mut(&old) {
                entry.0 = entry.0.saturating_sub(1);
            }
        }
        let count = self.votes.values().filter(|v| v.as_str() == uci).count() as u32;
        self.reached.insert(uci.to_string(), (count, self.casts));
    }

    pub fn casts(&self) -> u32 {
        self.casts
    }

    pub fn votes_held(&self) -> u32 {
        self.votes.len() as u32
    }

    /// Current plurality move; ties go to the move that reached the
    /// winning count first.
    pub fn leader(&self) -> Option<(&str, u32)> {
        self.reached
            .iter()
            .filter(|(_, (count, _))| *count > 0)
            .min_by_key(|(_, (count, reached_at))| (Reverse(*count), *reached_at))
            .map(|(uci, (count, _))| (uci.as_str(), *count))
    }

    /// Early closure: an absolute majority of held votes once at least
    /// 3 casts are in, or 10 casts total.
    pub fn should_close_early(&self) -> bool {
        if self.casts >= 10 {
            return true;
        }
        if self.casts < 3 {
            return false;
        }
        match self.leader() {
            Some((_, count)) => count * 2 > self.votes_held(),
            None => false,
        }
    }

    pub fn due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.deadline, Some(deadline) if now >= deadline)
    }

    pub fn clear(&mut self) {
        self.votes.clear();
        self.reached.clear();
        self.casts = 0;
        self.deadline = None;
    }
}

/// A deliberate reaction move waiting out its delay. The coordinate
/// form is resolved at submission; only the active seat can react, so
/// the position cannot shift underneath it.
#[derive(Debug, Clone)]
pub struct PendingReaction {
    pub seat: usize,
    pub uci: String,
    pub applies_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ReactionState {
    pub pending: Option<PendingReaction>,
}

impl ReactionState {
    /// Queue or supersede the deliberate move. The delay window runs
    /// from the first submission; later ones replace the move only.
    pub fn queue(&mut self, seat: usize, uci: &str, now: DateTime<Utc>, delay_ms: i64) -> DateTime<Utc> {
        let applies_at = match &self.pending {
            Some(pending) => pending.applies_at,
            None => now + Duration::milliseconds(delay_ms),
        };
        self.pending = Some(PendingReaction {
            seat,
            uci: uci.to_string(),
            applies_at,
        });
        applies_at
    }

    pub fn due(&self, now: DateTime<Utc>) -> bool {
        matches!(&self.pending, Some(pending) if now >= pending.applies_at)
    }
}

/// Per-move deadline tracking for correspondence play.
#[derive(Debug, Clone)]
pub struct CorrespondenceState {
    pub deadline: DateTime<Utc>,
    pub warned: bool,
}

impl CorrespondenceState {
    pub fn new(now: DateTime<Utc>, deadline_hours: i64) -> CorrespondenceState {
        CorrespondenceState {
            deadline: now + Duration::hours(deadline_hours),
            warned: false,
        }
    }

    /// Re-arm after an accepted move.
    pub fn reset(&mut self, now: DateTime<Utc>, deadline_hours: i64) {
        self.deadline = now + Duration::hours(deadline_hours);
        self.warned = false;
    }

    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    pub fn in_warning_band(&self, now: DateTime<Utc>, warning_hours: i64) -> bool {
        !self.warned && now >= self.deadline - Duration::hours(warning_hours)
    }
}

/// Mode tag plus its live sub-state.
#[derive(Debug, Clone)]
pub enum Mode {
    Alternating,
    Simultaneous(SimultaneousState),
    Voting(VotingState),
    Reaction(ReactionState),
    Correspondence(CorrespondenceState),
}

impl Mode {
    pub fn kind(&self) -> ModeKind {
        match self {
            Mode::Alternating => ModeKind::Alternating,
            Mode::Simultaneous(_) => ModeKind::Simultaneous,
            Mode::Voting(_) => ModeKind::Voting,
            Mode::Reaction(_) => ModeKind::Reaction,
            Mode::Correspondence(_) => ModeKind::Correspondence,
        }
    }

}
