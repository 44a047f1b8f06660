//! One game from creation to finish: seat gating per coordination mode,
//! automated replies, terminal bookkeeping, and notation export.
//!
//! Seats are color-bound (index 0 plays White, index 1 plays Black), so
//! whose turn it is follows from the position's side to move. Simultaneous
//! play ignores turn gating entirely; voting keeps the collective seat
//! driving while the opposing seat moves on its own turns.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{debug, info, warn};

use chess_notation::{write_movetext, PlayedMove};
use chess_rules::{Color, Move, MoveRecord, Terminal, Variant, VariantPosition};
use engine_pool::{EnginePool, SearchLimit};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::modes::{
    CorrespondenceState, Mode, ModeKind, PendingMove, ReactionState, SimultaneousState, Speed,
    VotingState,
};
use crate::rating::{RatingDelta, RatingStore};

/// Occupant of one of the two seats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatKind {
    Human { id: String },
    /// Engine-suggested moves, random fallback on engine failure.
    EngineBacked,
    /// Uniformly random legal moves.
    RandomMover,
    /// Crowd-voted moves; only valid in voting games.
    Crowd,
}

impl SeatKind {
    pub fn label(&self) -> &str {
        match self {
            SeatKind::Human { id } => id,
            SeatKind::EngineBacked => "automated-strong",
            SeatKind::RandomMover => "automated-random",
            SeatKind::Crowd => "collective",
        }
    }

    pub fn is_automated(&self) -> bool {
        matches!(self, SeatKind::EngineBacked | SeatKind::RandomMover)
    }
}

/// Why a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Checkmate { winner: Color },
    VariantEnd { winner: Color },
    Stalemate,
    InsufficientMaterial,
    Draw,
    Resignation { winner: Color },
    Timeout { winner: Color },
}

impl FinishReason {
    fn from_terminal(terminal: Terminal) -> FinishReason {
        match terminal {
            Terminal::Checkmate { winner } => FinishReason::Checkmate { winner },
            Terminal::VariantWin { winner } => FinishReason::VariantEnd { winner },
            Terminal::Stalemate => FinishReason::Stalemate,
            Terminal::InsufficientMaterial => FinishReason::InsufficientMaterial,
            Terminal::Draw => FinishReason::Draw,
        }
    }

    pub fn winner(&self) -> Option<Color> {
        match *self {
            FinishReason::Checkmate { winner }
            | FinishReason::VariantEnd { winner }
            | FinishReason::Resignation { winner }
            | FinishReason::Timeout { winner } => Some(winner),
            FinishReason::Stalemate | FinishReason::InsufficientMaterial | FinishReason::Draw => {
                None
            }
        }
    }

    pub fn result_marker(&self) -> &'static str {
        match self.winner() {
            Some(Color::White) => "1-0",
            Some(Color::Black) => "0-1",
            None => "1/2-1/2",
        }
    }

    pub fn describe(&self) -> String {
        match *self {
            FinishReason::Checkmate { winner } => {
                format!("checkmate, {} wins", color_name(winner))
            }
            FinishReason::VariantEnd { winner } => {
                format!("{} wins by the variant rule", color_name(winner))
            }
            FinishReason::Stalemate => "stalemate".to_string(),
            FinishReason::InsufficientMaterial => "draw by insufficient material".to_string(),
            FinishReason::Draw => "draw".to_string(),
            FinishReason::Resignation { winner } => {
                format!("{} wins by resignation", color_name(winner))
            }
            FinishReason::Timeout { winner } => format!("{} wins on time", color_name(winner)),
        }
    }
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingSecondPlayer,
    Active,
    Finished(FinishReason),
}

/// One accepted move in a session's history.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub seat: usize,
    pub record: MoveRecord,
    pub at: DateTime<Utc>,
}

/// One move applied during a single session call.
#[derive(Debug, Clone)]
pub struct AppliedMove {
    pub seat: usize,
    pub record: MoveRecord,
}

/// Everything that happened as a result of one accepted submission,
/// including any automated reply and any terminal transition.
#[derive(Debug)]
pub struct MoveOutcome {
    pub applied: Vec<AppliedMove>,
    pub finished: Option<FinishReason>,
    pub rating: Option<RatingDelta>,
}

impl MoveOutcome {
    fn empty() -> MoveOutcome {
        MoveOutcome {
            applied: Vec::new(),
            finished: None,
            rating: None,
        }
    }
}

/// Result of casting one vote.
#[derive(Debug)]
pub enum VoteStatus {
    Recorded {
        votes_held: u32,
        casts: u32,
        deadline: DateTime<Utc>,
    },
    Closed(MoveOutcome),
}

/// Result of a reaction-mode submission.
#[derive(Debug)]
pub enum ReactionOutcome {
    Applied(MoveOutcome),
    Queued { applies_at: DateTime<Utc> },
}

/// What a correspondence deadline sweep found.
#[derive(Debug)]
pub enum SweepNotice {
    Warning {
        deadline: DateTime<Utc>,
    },
    TimedOut {
        winner: Color,
        rating: Option<RatingDelta>,
    },
}

/// Creation parameters. A `black` of `None` opens the session as a
/// challenge waiting for a second player.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub variant: Variant,
    pub mode: ModeKind,
    pub white: SeatKind,
    pub black: Option<SeatKind>,
}

/// Serializable snapshot for the presentation layer.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub channel: String,
    pub variant: Variant,
    pub mode: ModeKind,
    pub status: String,
    pub fen: String,
    pub white: String,
    pub black: String,
    pub to_move: Option<String>,
    pub moves: usize,
    pub last_activity: DateTime<Utc>,
}

/// One live game. All mutation goes through the session's own methods;
/// the registry serializes callers behind an async lock.
pub struct GameSession {
    channel: String,
    position: VariantPosition,
    seats: [Option<SeatKind>; 2],
    state: SessionState,
    mode: Mode,
    history: Vec<HistoryEntry>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    pool: Arc<EnginePool>,
    limit: SearchLimit,
    ratings: Option<Arc<dyn RatingStore>>,
    config: SessionConfig,
}

impl GameSession {
    pub fn new(
        channel: &str,
        options: SessionOptions,
        pool: Arc<EnginePool>,
        limit: SearchLimit,
        ratings: Option<Arc<dyn RatingStore>>,
        config: SessionConfig,
        now: DateTime<Utc>,
    ) -> Result<GameSession, SessionError> {
        let seats = [Some(options.white), options.black];
        let crowd_seats = seats
            .iter()
            .flatten()
            .filter(|seat| matches!(seat, SeatKind::Crowd))
            .count();
        match options.mode {
            ModeKind::Voting if crowd_seats != 1 => {
                return Err(SessionError::NotAllowed(
                    "voting games need exactly one collective seat",
                ));
            }
            ModeKind::Voting => {}
            _ if crowd_seats != 0 => {
                return Err(SessionError::NotAllowed(
                    "only voting games seat the collective",
                ));
            }
            _ => {}
        }
        if options.mode == ModeKind::Simultaneous
            && seats.iter().flatten().any(|seat| seat.is_automated())
        {
            return Err(SessionError::NotAllowed(
                "simultaneous games need two direct players",
            ));
        }
        let state = if seats[1].is_some() {
            SessionState::Active
        } else {
            SessionState::AwaitingSecondPlayer
        };
        let mode = match options.mode {
            ModeKind::Alternating => Mode::Alternating,
            ModeKind::Simultaneous => Mode::Simultaneous(SimultaneousState::default()),
            ModeKind::Voting => Mode::Voting(VotingState::default()),
            ModeKind::Reaction => Mode::Reaction(ReactionState::default()),
            ModeKind::Correspondence => Mode::Correspondence(CorrespondenceState::new(
                now,
                config.correspondence_deadline_hours,
            )),
        };
        Ok(GameSession {
            channel: channel.to_string(),
            position: VariantPosition::new(options.variant),
            seats,
            state,
            mode,
            history: Vec::new(),
            created_at: now,
            last_activity: now,
            pool,
            limit,
            ratings,
            config,
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn variant(&self) -> Variant {
        self.position.variant()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode_kind(&self) -> ModeKind {
        self.mode.kind()
    }

    pub fn position(&self) -> &VariantPosition {
        &self.position
    }

    pub fn fen(&self) -> String {
        self.position.fen()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Fill the open seat and start the game.
    pub fn join(&mut self, actor: &str, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.state {
            SessionState::Finished(_) => return Err(SessionError::GameFinished),
            SessionState::Active => {
                return Err(SessionError::NotAllowed("both seats are already taken"));
            }
            SessionState::AwaitingSecondPlayer => {}
        }
        if self.seat_of(actor).is_some() {
            return Err(SessionError::NotAllowed("you are already seated in this game"));
        }
        self.seats[1] = Some(SeatKind::Human {
            id: actor.to_string(),
        });
        self.state = SessionState::Active;
        self.last_activity = now;
        info!(channel = %self.channel, actor = %actor, "second seat filled");
        Ok(())
    }

    /// Submit a move in coordinate or algebraic form. Applies immediately
    /// in every mode except simultaneous, which collects through
    /// [`GameSession::queue_move`]. In reaction games a plain submission
    /// behaves like a `normal`-speed one.
    pub async fn submit_move(
        &mut self,
        actor: &str,
        input: &str,
        now: DateTime<Utc>,
    ) -> Result<MoveOutcome, SessionError> {
        self.ensure_active()?;
        if matches!(self.mode, Mode::Simultaneous(_)) {
            return Err(SessionError::NotAllowed(
                "simultaneous games collect moves through queue_move",
            ));
        }
        let seat = self
            .seat_of(actor)
            .ok_or_else(|| SessionError::NotAParticipant(actor.to_string()))?;
        if seat != self.seat_to_move() {
            return Err(SessionError::NotYourTurn);
        }
        let mv = self.parse_move(input)?;
        if let Mode::Reaction(pending) = &mut self.mode {
            pending.pending = None;
        }
        self.advance(seat, &mv, now).await
    }

    /// Queue a simultaneous-mode submission. Legality is judged when the
    /// window closes, not here. Returns the window close time.
    pub fn queue_move(
        &mut self,
        actor: &str,
        input: &str,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, SessionError> {
        self.ensure_active()?;
        let seat = self
            .seat_of(actor)
            .ok_or_else(|| SessionError::NotAParticipant(actor.to_string()))?;
        let window_ms = self.config.simultaneous_window_ms;
        let closes = match &mut self.mode {
            Mode::Simultaneous(buffer) => buffer.queue(seat, input, now, window_ms),
            _ => {
                return Err(SessionError::NotAllowed(
                    "only simultaneous games queue moves",
                ));
            }
        };
        self.last_activity = now;
        debug!(channel = %self.channel, seat, input = %input, "simultaneous move queued");
        Ok(closes)
    }

    /// Close the simultaneous window if it is due, applying the buffered
    /// submissions in timestamp order. Invalid submissions are dropped
    /// silently; a submission sharing a square with an already-applied one
    /// is dropped as the later of a conflicting pair.
    pub fn close_window_if_due(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Option<MoveOutcome>, SessionError> {
        if !matches!(self.state, SessionState::Active) {
            return Ok(None);
        }
        let pending = match &mut self.mode {
            Mode::Simultaneous(buffer) => {
                if !buffer.due(now) {
                    return Ok(None);
                }
                buffer.take()
            }
            _ => {
                return Err(SessionError::NotAllowed(
                    "only simultaneous games queue moves",
                ));
            }
        };
        let mut outcome = MoveOutcome::empty();
        let mut applied_squares: Vec<(String, String)> = Vec::new();
        // A submission that is not yet legal may become so once the other
        // seat's move lands, so it gets one retry pass.
        let mut retries = Vec::new();
        for submission in pending {
            if outcome.finished.is_some() {
                break;
            }
            if !self.apply_submission(&submission, &mut outcome, &mut applied_squares, now) {
                retries.push(submission);
            }
        }
        for submission in retries {
            if outcome.finished.is_some() {
                break;
            }
            self.apply_submission(&submission, &mut outcome, &mut applied_squares, now);
        }
        Ok(Some(outcome))
    }

    /// Cast a vote for the collective seat's next move. Voters are
    /// outsiders by definition; seated players move directly.
    pub async fn cast_vote(
        &mut self,
        voter: &str,
        input: &str,
        now: DateTime<Utc>,
    ) -> Result<VoteStatus, SessionError> {
        self.ensure_active()?;
        let crowd = self
            .crowd_seat()
            .ok_or(SessionError::NotAllowed("this game has no voting seat"))?;
        if self.seat_of(voter).is_some() {
            return Err(SessionError::NotAllowed("seated players move directly"));
        }
        if crowd != self.seat_to_move() {
            return Err(SessionError::NotYourTurn);
        }
        let mv = self.parse_move(input)?;
        let uci = self.position.to_coordinate(&mv);
        let deadline_secs = self.config.vote_deadline_secs;
        let (closes, votes_held, casts, deadline) = match &mut self.mode {
            Mode::Voting(ballot) => {
                ballot.cast(voter, &uci, now, deadline_secs);
                (
                    ballot.should_close_early(),
                    ballot.votes_held(),
                    ballot.casts(),
                    ballot.deadline,
                )
            }
            _ => return Err(SessionError::NotAllowed("this game has no voting seat")),
        };
        self.last_activity = now;
        debug!(channel = %self.channel, voter = %voter, mv = %uci, casts, "vote recorded");
        if closes {
            let outcome = self.close_voting(now).await?;
            return Ok(VoteStatus::Closed(outcome));
        }
        Ok(VoteStatus::Recorded {
            votes_held,
            casts,
            deadline: deadline.unwrap_or(now),
        })
    }

    /// Close voting at the wall-clock deadline.
    pub async fn close_voting_if_due(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Option<MoveOutcome>, SessionError> {
        if !matches!(self.state, SessionState::Active) {
            return Ok(None);
        }
        let due = match &self.mode {
            Mode::Voting(ballot) => ballot.due(now),
            _ => return Err(SessionError::NotAllowed("this game has no voting seat")),
        };
        if !due {
            return Ok(None);
        }
        self.close_voting(now).await.map(Some)
    }

    /// Submit a reaction-mode move. `instant` and `normal` apply at once
    /// (superseding any pending deliberate move); `deliberate` waits out
    /// the configured delay, and resubmitting within the delay replaces
    /// the move without extending it.
    pub async fn react(
        &mut self,
        actor: &str,
        input: &str,
        speed: Speed,
        now: DateTime<Utc>,
    ) -> Result<ReactionOutcome, SessionError> {
        self.ensure_active()?;
        if !matches!(self.mode, Mode::Reaction(_)) {
            return Err(SessionError::NotAllowed(
                "speed tags only apply to reaction games",
            ));
        }
        let seat = self
            .seat_of(actor)
            .ok_or_else(|| SessionError::NotAParticipant(actor.to_string()))?;
        if seat != self.seat_to_move() {
            return Err(SessionError::NotYourTurn);
        }
        let mv = self.parse_move(input)?;
        match speed {
            Speed::Deliberate => {
                let uci = self.position.to_coordinate(&mv);
                let delay_ms = self.config.reaction_delay_ms;
                let applies_at = match &mut self.mode {
                    Mode::Reaction(pending) => pending.queue(seat, &uci, now, delay_ms),
                    _ => {
                        return Err(SessionError::NotAllowed(
                            "speed tags only apply to reaction games",
                        ));
                    }
                };
                self.last_activity = now;
                debug!(channel = %self.channel, seat, mv = %uci, "deliberate move queued");
                Ok(ReactionOutcome::Queued { applies_at })
            }
            Speed::Instant | Speed::Normal => {
                if let Mode::Reaction(pending) = &mut self.mode {
                    pending.pending = None;
                }
                self.advance(seat, &mv, now).await.map(ReactionOutcome::Applied)
            }
        }
    }

    /// Apply a pending deliberate move whose delay has elapsed.
    pub async fn flush_reaction_if_due(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Option<MoveOutcome>, SessionError> {
        if !matches!(self.state, SessionState::Active) {
            return Ok(None);
        }
        let pending = match &mut self.mode {
            Mode::Reaction(state) => {
                if !state.due(now) {
                    return Ok(None);
                }
                state.pending.take()
            }
            _ => {
                return Err(SessionError::NotAllowed(
                    "speed tags only apply to reaction games",
                ));
            }
        };
        let reaction = match pending {
            Some(reaction) => reaction,
            None => return Ok(None),
        };
        let mv = self.position.parse_coordinate(&reaction.uci)?;
        self.advance(reaction.seat, &mv, now).await.map(Some)
    }

    /// Resign, crediting the opposing seat with the win.
    pub fn resign(&mut self, actor: &str, now: DateTime<Utc>) -> Result<MoveOutcome, SessionError> {
        self.ensure_active()?;
        let seat = self
            .seat_of(actor)
            .ok_or_else(|| SessionError::NotAParticipant(actor.to_string()))?;
        let winner = seat_color(1 - seat);
        let reason = FinishReason::Resignation { winner };
        let rating = self.finish(reason, now);
        Ok(MoveOutcome {
            applied: Vec::new(),
            finished: Some(reason),
            rating,
        })
    }

    /// Check the correspondence deadline. Past the deadline the seat on
    /// move forfeits; inside the warning band a one-time warning fires.
    pub fn sweep_deadline(&mut self, now: DateTime<Utc>) -> Option<SweepNotice> {
        if !matches!(self.state, SessionState::Active) {
            return None;
        }
        let warning_hours = self.config.correspondence_warning_hours;
        let (expired, deadline) = match &mut self.mode {
            Mode::Correspondence(state) => {
                if state.expired(now) {
                    (true, state.deadline)
                } else if state.in_warning_band(now, warning_hours) {
                    state.warned = true;
                    (false, state.deadline)
                } else {
                    return None;
                }
            }
            _ => return None,
        };
        if expired {
            let winner = !self.position.turn();
            warn!(channel = %self.channel, "correspondence deadline expired");
            let rating = self.finish(FinishReason::Timeout { winner }, now);
            Some(SweepNotice::TimedOut { winner, rating })
        } else {
            debug!(channel = %self.channel, %deadline, "correspondence deadline near");
            Some(SweepNotice::Warning { deadline })
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let status = match &self.state {
            SessionState::AwaitingSecondPlayer => "awaiting-second-player".to_string(),
            SessionState::Active => "active".to_string(),
            SessionState::Finished(reason) => reason.describe(),
        };
        let to_move = match self.state {
            SessionState::Active => Some(color_name(self.position.turn()).to_string()),
            _ => None,
        };
        SessionSummary {
            channel: self.channel.clone(),
            variant: self.position.variant(),
            mode: self.mode.kind(),
            status,
            fen: self.position.fen(),
            white: seat_label(&self.seats[0]),
            black: seat_label(&self.seats[1]),
            to_move,
            moves: self.history.len(),
            last_activity: self.last_activity,
        }
    }

    /// Move text of the history, with a result marker once finished.
    pub fn notation(&self) -> String {
        let moves: Vec<PlayedMove> = self
            .history
            .iter()
            .map(|entry| PlayedMove::from_record(entry.record.clone()))
            .collect();
        let text = write_movetext(&moves);
        match &self.state {
            SessionState::Finished(reason) if text.is_empty() => {
                reason.result_marker().to_string()
            }
            SessionState::Finished(reason) => format!("{} {}", text, reason.result_marker()),
            _ => text,
        }
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Active => Ok(()),
            SessionState::AwaitingSecondPlayer => Err(SessionError::NotStarted),
            SessionState::Finished(_) => Err(SessionError::GameFinished),
        }
    }

    fn seat_of(&self, actor: &str) -> Option<usize> {
        self.seats
            .iter()
            .position(|seat| matches!(seat, Some(SeatKind::Human { id }) if id == actor))
    }

    fn crowd_seat(&self) -> Option<usize> {
        self.seats
            .iter()
            .position(|seat| matches!(seat, Some(SeatKind::Crowd)))
    }

    fn seat_to_move(&self) -> usize {
        match self.position.turn() {
            Color::White => 0,
            Color::Black => 1,
        }
    }

    fn parse_move(&self, input: &str) -> Result<Move, chess_rules::RulesError> {
        let bare = input.trim();
        if looks_coordinate(bare) {
            self.position.parse_coordinate(bare)
        } else {
            self.position.parse_algebraic(bare)
        }
    }

    /// Resolve the ballot and play the winner for the collective seat.
    /// A closure with no votes held just resets the ballot.
    async fn close_voting(&mut self, now: DateTime<Utc>) -> Result<MoveOutcome, SessionError> {
        let winner = match &mut self.mode {
            Mode::Voting(ballot) => {
                let winner = ballot.leader().map(|(uci, count)| (uci.to_string(), count));
                ballot.clear();
                winner
            }
            _ => return Err(SessionError::NotAllowed("this game has no voting seat")),
        };
        let (uci, count) = match winner {
            Some(winner) => winner,
            None => {
                debug!(channel = %self.channel, "voting closed with no votes held");
                return Ok(MoveOutcome::empty());
            }
        };
        let seat = self
            .crowd_seat()
            .ok_or(SessionError::NotAllowed("this game has no voting seat"))?;
        // Votes were normalized to coordinate form when cast.
        let mv = self.position.parse_coordinate(&uci)?;
        info!(channel = %self.channel, mv = %uci, count, "ballot resolved");
        self.advance(seat, &mv, now).await
    }

    /// Apply one external move, then any automated reply, then settle
    /// terminal state.
    async fn advance(
        &mut self,
        seat: usize,
        mv: &Move,
        now: DateTime<Utc>,
    ) -> Result<MoveOutcome, SessionError> {
        let mut outcome = MoveOutcome::empty();
        let applied = self.apply_move(seat, mv, now)?;
        outcome.applied.push(applied);
        if self.check_terminal(now, &mut outcome) {
            return Ok(outcome);
        }
        self.auto_reply(now, &mut outcome).await;
        Ok(outcome)
    }

    fn apply_move(
        &mut self,
        seat: usize,
        mv: &Move,
        now: DateTime<Utc>,
    ) -> Result<AppliedMove, SessionError> {
        let (next, record) = self.position.apply(mv)?;
        self.position = next;
        self.history.push(HistoryEntry {
            seat,
            record: record.clone(),
            at: now,
        });
        self.last_activity = now;
        if let Mode::Correspondence(state) = &mut self.mode {
            state.reset(now, self.config.correspondence_deadline_hours);
        }
        debug!(channel = %self.channel, seat, mv = %record.uci, "move applied");
        Ok(AppliedMove { seat, record })
    }

    fn check_terminal(&mut self, now: DateTime<Utc>, outcome: &mut MoveOutcome) -> bool {
        let terminal = match self.position.terminal() {
            Some(terminal) => terminal,
            None => return false,
        };
        let reason = FinishReason::from_terminal(terminal);
        outcome.rating = self.finish(reason, now);
        outcome.finished = Some(reason);
        true
    }

    /// If the seat now on move is automated, produce and apply its reply.
    async fn auto_reply(&mut self, now: DateTime<Utc>, outcome: &mut MoveOutcome) {
        let seat = self.seat_to_move();
        let mv = match &self.seats[seat] {
            Some(SeatKind::EngineBacked) => match self.engine_move().await {
                Some(mv) => Some(mv),
                None => self.random_move(),
            },
            Some(SeatKind::RandomMover) => self.random_move(),
            _ => return,
        };
        let mv = match mv {
            Some(mv) => mv,
            None => return,
        };
        match self.apply_move(seat, &mv, now) {
            Ok(applied) => {
                outcome.applied.push(applied);
                self.check_terminal(now, outcome);
            }
            Err(err) => warn!(channel = %self.channel, %err, "automated reply rejected"),
        }
    }

    async fn engine_move(&self) -> Option<Move> {
        let fen = self.position.fen();
        match self.pool.analyze(&fen, self.limit).await {
            Ok(analysis) => match self.position.parse_coordinate(&analysis.best_move) {
                Ok(mv) => Some(mv),
                Err(err) => {
                    warn!(
                        channel = %self.channel,
                        best = %analysis.best_move,
                        %err,
                        "engine suggestion unusable, falling back to random"
                    );
                    None
                }
            },
            Err(err) => {
                warn!(channel = %self.channel, %err, "engine analysis failed, falling back to random");
                None
            }
        }
    }

    fn random_move(&self) -> Option<Move> {
        let moves = self.position.legal_moves();
        moves.choose(&mut rand::thread_rng()).cloned()
    }

    /// Settle a finished game: clear coordination buffers and report the
    /// result for rating when both seats are human.
    fn finish(&mut self, reason: FinishReason, now: DateTime<Utc>) -> Option<RatingDelta> {
        self.state = SessionState::Finished(reason);
        self.last_activity = now;
        match &mut self.mode {
            Mode::Simultaneous(buffer) => {
                buffer.take();
            }
            Mode::Voting(ballot) => ballot.clear(),
            Mode::Reaction(pending) => pending.pending = None,
            _ => {}
        }
        info!(channel = %self.channel, result = %reason.describe(), "game finished");
        let (white, black) = match (&self.seats[0], &self.seats[1]) {
            (Some(SeatKind::Human { id: white }), Some(SeatKind::Human { id: black })) => {
                (white.clone(), black.clone())
            }
            _ => return None,
        };
        self.ratings
            .as_ref()
            .map(|store| store.record_result(&white, &black, reason.winner()))
    }

    /// Returns false when the submission should be retried after the
    /// other seat's move has landed.
    fn apply_submission(
        &mut self,
        submission: &PendingMove,
        outcome: &mut MoveOutcome,
        applied_squares: &mut Vec<(String, String)>,
        now: DateTime<Utc>,
    ) -> bool {
        let mv = match self.parse_move(&submission.input) {
            Ok(mv) => mv,
            Err(err) => {
                debug!(
                    channel = %self.channel,
                    seat = submission.seat,
                    input = %submission.input,
                    %err,
                    "dropping simultaneous submission"
                );
                return false;
            }
        };
        let uci = self.position.to_coordinate(&mv);
        let from = uci[..2].to_string();
        let to = uci[2..4].to_string();
        let clashes = applied_squares.iter().any(|(applied_from, applied_to)| {
            from == *applied_from || from == *applied_to || to == *applied_from || to == *applied_to
        });
        if clashes {
            debug!(
                channel = %self.channel,
                seat = submission.seat,
                mv = %uci,
                "dropping conflicting simultaneous submission"
            );
            return true;
        }
        match self.apply_move(submission.seat, &mv, now) {
            Ok(applied) => {
                outcome.applied.push(applied);
                applied_squares.push((from, to));
                self.check_terminal(now, outcome);
                true
            }
            Err(err) => {
                debug!(
                    channel = %self.channel,
                    seat = submission.seat,
                    %err,
                    "dropping simultaneous submission"
                );
                false
            }
        }
    }
}

fn seat_color(seat: usize) -> Color {
    if seat == 0 {
        Color::White
    } else {
        Color::Black
    }
}

fn seat_label(seat: &Option<SeatKind>) -> String {
    match seat {
        Some(kind) => kind.label().to_string(),
        None => "open".to_string(),
    }
}

fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

fn looks_coordinate(input: &str) -> bool {
    let bytes = input.as_bytes();
    matches!(bytes.len(), 4 | 5)
        && matches!(bytes[0], b'a'..=b'h')
        && bytes[1].is_ascii_digit()
        && matches!(bytes[2], b'a'..=b'h')
        && bytes[3].is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chess_rules::{Role, Square};
    use engine_pool::EngineConfig;

    #[derive(Default)]
    struct FakeRatings {
        calls: Mutex<Vec<(String, String, Option<Color>)>>,
    }

    impl RatingStore for FakeRatings {
        fn lookup_rating(&self, _identity: &str) -> Option<u32> {
            Some(1_500)
        }

        fn record_result(&self, white: &str, black: &str, winner: Option<Color>) -> RatingDelta {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((white.to_string(), black.to_string(), winner));
            }
            RatingDelta {
                white: 8,
                black: -8,
            }
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn test_pool() -> Arc<EnginePool> {
        // No test here should ever reach a real engine.
        Arc::new(EnginePool::new(&EngineConfig {
            engine_path: "/nonexistent/engine".to_string(),
            pool_size: 1,
            movetime_ms: 50,
            timeout_grace_ms: 200,
            threads: 1,
            hash_mb: 16,
        }))
    }

    fn human(id: &str) -> SeatKind {
        SeatKind::Human { id: id.to_string() }
    }

    fn session_with(
        mode: ModeKind,
        white: SeatKind,
        black: Option<SeatKind>,
        ratings: Option<Arc<dyn RatingStore>>,
    ) -> GameSession {
        GameSession::new(
            "games",
            SessionOptions {
                variant: Variant::Standard,
                mode,
                white,
                black,
            },
            test_pool(),
            SearchLimit::movetime(50),
            ratings,
            SessionConfig::default(),
            at(0),
        )
        .unwrap()
    }

    fn session(mode: ModeKind, white: SeatKind, black: Option<SeatKind>) -> GameSession {
        session_with(mode, white, black, None)
    }

    #[tokio::test]
    async fn test_alternating_turn_order() {
        let mut game = session(ModeKind::Alternating, human("ann"), Some(human("ben")));
        let outcome = game.submit_move("ann", "e4", at(1)).await.unwrap();
        assert_eq!(outcome.applied.len(), 1);
        assert_eq!(outcome.applied[0].record.uci, "e2e4");
        assert!(outcome.finished.is_none());

        let err = game.submit_move("ann", "d4", at(2)).await.unwrap_err();
        assert!(matches!(err, SessionError::NotYourTurn));
        let err = game.submit_move("cam", "e5", at(2)).await.unwrap_err();
        assert!(matches!(err, SessionError::NotAParticipant(_)));

        let outcome = game.submit_move("ben", "e7e5", at(3)).await.unwrap();
        assert_eq!(outcome.applied[0].record.san, "e5");
        assert_eq!(game.history().len(), 2);
        assert_eq!(game.history()[1].at, at(3));
    }

    #[tokio::test]
    async fn test_illegal_move_leaves_state_intact() {
        let mut game = session(ModeKind::Alternating, human("ann"), Some(human("ben")));
        let err = game.submit_move("ann", "e2e5", at(1)).await.unwrap_err();
        assert!(matches!(err, SessionError::IllegalMove(_)));
        assert!(game.history().is_empty());
        assert_eq!(game.fen(), chess_rules::STANDARD_START_FEN);
    }

    #[tokio::test]
    async fn test_random_opponent_replies_inline() {
        let mut game = session(ModeKind::Alternating, human("ann"), Some(SeatKind::RandomMover));
        let outcome = game.submit_move("ann", "e4", at(1)).await.unwrap();
        assert_eq!(outcome.applied.len(), 2);
        assert_eq!(outcome.applied[1].seat, 1);
        assert_eq!(game.history().len(), 2);
        // Both half-moves landed, so it is the human's turn again.
        assert_eq!(game.position().turn(), Color::White);
    }

    #[tokio::test]
    async fn test_engine_opponent_falls_back_to_random() {
        // The pool points at a binary that cannot spawn, so the engine
        // path fails and the random fallback must carry the reply.
        let mut game = session(ModeKind::Alternating, human("ann"), Some(SeatKind::EngineBacked));
        let outcome = game.submit_move("ann", "e4", at(1)).await.unwrap();
        assert_eq!(outcome.applied.len(), 2);
        assert!(outcome.finished.is_none());
    }

    #[tokio::test]
    async fn test_checkmate_finishes_and_reports_rating() {
        let store = Arc::new(FakeRatings::default());
        let mut game = session_with(
            ModeKind::Alternating,
            human("ann"),
            Some(human("ben")),
            Some(store.clone()),
        );
        for (actor, mv) in [("ann", "f3"), ("ben", "e5"), ("ann", "g4")] {
            game.submit_move(actor, mv, at(1)).await.unwrap();
        }
        let outcome = game.submit_move("ben", "Qh4", at(2)).await.unwrap();
        assert_eq!(
            outcome.finished,
            Some(FinishReason::Checkmate {
                winner: Color::Black
            })
        );
        assert_eq!(outcome.rating, Some(RatingDelta { white: 8, black: -8 }));
        let calls = store.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], ("ann".to_string(), "ben".to_string(), Some(Color::Black)));
        drop(calls);

        let err = game.submit_move("ann", "e4", at(3)).await.unwrap_err();
        assert!(matches!(err, SessionError::GameFinished));
    }

    #[test]
    fn test_resignation_credits_opponent() {
        let store = Arc::new(FakeRatings::default());
        let mut game = session_with(
            ModeKind::Alternating,
            human("ann"),
            Some(human("ben")),
            Some(store.clone()),
        );
        let outcome = game.resign("ann", at(5)).unwrap();
        assert_eq!(
            outcome.finished,
            Some(FinishReason::Resignation {
                winner: Color::Black
            })
        );
        assert!(outcome.rating.is_some());
        assert!(matches!(game.state(), SessionState::Finished(_)));
        assert!(matches!(
            game.resign("ben", at(6)),
            Err(SessionError::GameFinished)
        ));
    }

    #[tokio::test]
    async fn test_join_fills_open_seat() {
        let mut game = session(ModeKind::Alternating, human("ann"), None);
        assert_eq!(game.state(), SessionState::AwaitingSecondPlayer);
        let err = game.submit_move("ann", "e4", at(1)).await.unwrap_err();
        assert!(matches!(err, SessionError::NotStarted));
        assert!(matches!(
            game.join("ann", at(1)),
            Err(SessionError::NotAllowed(_))
        ));

        game.join("ben", at(2)).unwrap();
        assert_eq!(game.state(), SessionState::Active);
        assert!(matches!(
            game.join("cam", at(3)),
            Err(SessionError::NotAllowed(_))
        ));
        game.submit_move("ann", "e4", at(4)).await.unwrap();
    }

    #[test]
    fn test_simultaneous_applies_both_in_timestamp_order() {
        let mut game = session(ModeKind::Simultaneous, human("ann"), Some(human("ben")));
        let closes = game.queue_move("ann", "e2e4", at(1)).unwrap();
        assert_eq!(closes, at(5));
        game.queue_move("ben", "e7e5", at(2)).unwrap();

        assert!(game.close_window_if_due(at(4)).unwrap().is_none());
        let outcome = game.close_window_if_due(at(5)).unwrap().unwrap();
        assert_eq!(outcome.applied.len(), 2);
        assert_eq!(outcome.applied[0].record.uci, "e2e4");
        assert_eq!(outcome.applied[1].record.uci, "e7e5");
        assert_eq!(game.history().len(), 2);
    }

    #[test]
    fn test_simultaneous_conflict_drops_later_submission() {
        let mut game = session(ModeKind::Simultaneous, human("ann"), Some(human("ben")));
        game.queue_move("ann", "e2e4", at(1)).unwrap();
        game.queue_move("ben", "d7d5", at(2)).unwrap();
        game.close_window_if_due(at(5)).unwrap().unwrap();

        // Both moves now target d5: the capture lands first, the queen
        // recapture shares its destination and is dropped.
        game.queue_move("ann", "e4d5", at(6)).unwrap();
        game.queue_move("ben", "d8d5", at(7)).unwrap();
        let outcome = game.close_window_if_due(at(10)).unwrap().unwrap();
        assert_eq!(outcome.applied.len(), 1);
        assert_eq!(outcome.applied[0].record.uci, "e4d5");
        assert_eq!(game.history().len(), 3);
        assert_eq!(
            game.position().board().piece_at(Square::D8).map(|p| p.role),
            Some(Role::Queen)
        );
    }

    #[test]
    fn test_simultaneous_drops_invalid_silently() {
        let mut game = session(ModeKind::Simultaneous, human("ann"), Some(human("ben")));
        game.queue_move("ann", "e2e4", at(1)).unwrap();
        game.queue_move("ben", "d7d9", at(2)).unwrap();
        let outcome = game.close_window_if_due(at(5)).unwrap().unwrap();
        assert_eq!(outcome.applied.len(), 1);
        assert_eq!(outcome.applied[0].record.uci, "e2e4");
        assert_eq!(game.history().len(), 1);
    }

    #[test]
    fn test_simultaneous_off_turn_submission_lands_via_retry() {
        let mut game = session(ModeKind::Simultaneous, human("ann"), Some(human("ben")));
        game.queue_move("ben", "e7e5", at(1)).unwrap();
        game.queue_move("ann", "e2e4", at(2)).unwrap();
        let outcome = game.close_window_if_due(at(5)).unwrap().unwrap();
        // Black's earlier submission can only land once White's move
        // exists, so board order overrides the timestamps here.
        assert_eq!(outcome.applied.len(), 2);
        assert_eq!(outcome.applied[0].record.uci, "e2e4");
        assert_eq!(outcome.applied[1].record.uci, "e7e5");
    }

    #[tokio::test]
    async fn test_simultaneous_rejects_submit_move() {
        let mut game = session(ModeKind::Simultaneous, human("ann"), Some(human("ben")));
        let err = game.submit_move("ann", "e4", at(1)).await.unwrap_err();
        assert!(matches!(err, SessionError::NotAllowed(_)));
    }

    #[tokio::test]
    async fn test_voting_majority_closes_and_applies() {
        let mut game = session(ModeKind::Voting, SeatKind::Crowd, Some(human("ben")));
        let status = game.cast_vote("ann", "e2e4", at(1)).await.unwrap();
        assert!(matches!(status, VoteStatus::Recorded { casts: 1, .. }));
        game.cast_vote("cam", "e2e4", at(2)).await.unwrap();
        let status = game.cast_vote("dee", "e2e4", at(3)).await.unwrap();
        let outcome = match status {
            VoteStatus::Closed(outcome) => outcome,
            other => panic!("expected closure, got {other:?}"),
        };
        assert_eq!(outcome.applied[0].record.uci, "e2e4");
        assert_eq!(game.position().turn(), Color::Black);

        // The collective is no longer on move, so new votes wait.
        let err = game.cast_vote("ann", "d2d4", at(4)).await.unwrap_err();
        assert!(matches!(err, SessionError::NotYourTurn));
        game.submit_move("ben", "e5", at(5)).await.unwrap();
        game.cast_vote("ann", "g1f3", at(6)).await.unwrap();
    }

    #[tokio::test]
    async fn test_voting_rejects_seated_players_and_garbage() {
        let mut game = session(ModeKind::Voting, SeatKind::Crowd, Some(human("ben")));
        let err = game.cast_vote("ben", "e2e4", at(1)).await.unwrap_err();
        assert!(matches!(err, SessionError::NotAllowed(_)));
        let err = game.cast_vote("ann", "e9e4", at(1)).await.unwrap_err();
        assert!(matches!(err, SessionError::IllegalMove(_)));
    }

    #[tokio::test]
    async fn test_voting_deadline_closure() {
        let mut game = session(ModeKind::Voting, SeatKind::Crowd, Some(human("ben")));
        game.cast_vote("ann", "Nf3", at(0)).await.unwrap();
        assert!(game.close_voting_if_due(at(89)).await.unwrap().is_none());
        let outcome = game.close_voting_if_due(at(90)).await.unwrap().unwrap();
        assert_eq!(outcome.applied[0].record.uci, "g1f3");
        // Votes are normalized to coordinate form when cast.
        assert_eq!(outcome.applied[0].record.san, "Nf3");
    }

    #[tokio::test]
    async fn test_reaction_deliberate_waits_and_supersedes() {
        let mut game = session(ModeKind::Reaction, human("ann"), Some(human("ben")));
        let queued = game.react("ann", "e4", Speed::Deliberate, at(0)).await.unwrap();
        let first_applies_at = match queued {
            ReactionOutcome::Queued { applies_at } => applies_at,
            other => panic!("expected queued, got {other:?}"),
        };
        assert_eq!(first_applies_at, at(3));

        // Change of mind inside the delay keeps the original deadline.
        let queued = game.react("ann", "d4", Speed::Deliberate, at(1)).await.unwrap();
        assert!(matches!(
            queued,
            ReactionOutcome::Queued { applies_at } if applies_at == first_applies_at
        ));

        assert!(game.flush_reaction_if_due(at(2)).await.unwrap().is_none());
        let outcome = game.flush_reaction_if_due(at(3)).await.unwrap().unwrap();
        assert_eq!(outcome.applied[0].record.uci, "d2d4");
        assert_eq!(game.history().len(), 1);
    }

    #[tokio::test]
    async fn test_reaction_instant_supersedes_pending() {
        let mut game = session(ModeKind::Reaction, human("ann"), Some(human("ben")));
        game.react("ann", "e4", Speed::Deliberate, at(0)).await.unwrap();
        let outcome = game.react("ann", "Nf3", Speed::Instant, at(1)).await.unwrap();
        assert!(matches!(
            &outcome,
            ReactionOutcome::Applied(applied) if applied.applied[0].record.uci == "g1f3"
        ));
        // The deliberate move was dropped, nothing left to flush.
        assert!(game.flush_reaction_if_due(at(10)).await.unwrap().is_none());
        assert_eq!(game.history().len(), 1);
    }

    #[test]
    fn test_correspondence_warning_then_timeout() {
        let store = Arc::new(FakeRatings::default());
        let mut game = session_with(
            ModeKind::Correspondence,
            human("ann"),
            Some(human("ben")),
            Some(store),
        );
        assert!(game.sweep_deadline(at(3_600)).is_none());
        let notice = game.sweep_deadline(at(22 * 3_600 + 1)).unwrap();
        assert!(matches!(notice, SweepNotice::Warning { .. }));
        // The warning is one-time until the deadline re-arms.
        assert!(game.sweep_deadline(at(22 * 3_600 + 2)).is_none());

        let notice = game.sweep_deadline(at(24 * 3_600)).unwrap();
        match notice {
            SweepNotice::TimedOut { winner, rating } => {
                // Nobody moved, so White forfeits on time.
                assert_eq!(winner, Color::Black);
                assert!(rating.is_some());
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(
            game.state(),
            SessionState::Finished(FinishReason::Timeout {
                winner: Color::Black
            })
        );
        assert!(game.sweep_deadline(at(25 * 3_600)).is_none());
    }

    #[tokio::test]
    async fn test_correspondence_move_rearms_deadline() {
        let mut game = session(ModeKind::Correspondence, human("ann"), Some(human("ben")));
        game.submit_move("ann", "e4", at(3_600)).await.unwrap();
        // Old deadline would have been 24h from creation; the move pushed
        // it out to 24h from the move.
        assert!(game.sweep_deadline(at(24 * 3_600)).is_none());
        let notice = game.sweep_deadline(at(3_600 + 22 * 3_600 + 1)).unwrap();
        assert!(matches!(notice, SweepNotice::Warning { .. }));
        let notice = game.sweep_deadline(at(3_600 + 24 * 3_600)).unwrap();
        // Black was on move and forfeits.
        assert!(matches!(
            notice,
            SweepNotice::TimedOut {
                winner: Color::White,
                ..
            }
        ));
    }

    #[test]
    fn test_seat_validation_at_creation() {
        let crowd_outside_voting = GameSession::new(
            "games",
            SessionOptions {
                variant: Variant::Standard,
                mode: ModeKind::Alternating,
                white: SeatKind::Crowd,
                black: Some(human("ben")),
            },
            test_pool(),
            SearchLimit::movetime(50),
            None,
            SessionConfig::default(),
            at(0),
        );
        assert!(matches!(
            crowd_outside_voting,
            Err(SessionError::NotAllowed(_))
        ));

        let voting_without_crowd = GameSession::new(
            "games",
            SessionOptions {
                variant: Variant::Standard,
                mode: ModeKind::Voting,
                white: human("ann"),
                black: Some(human("ben")),
            },
            test_pool(),
            SearchLimit::movetime(50),
            None,
            SessionConfig::default(),
            at(0),
        );
        assert!(matches!(
            voting_without_crowd,
            Err(SessionError::NotAllowed(_))
        ));

        let simultaneous_with_bot = GameSession::new(
            "games",
            SessionOptions {
                variant: Variant::Standard,
                mode: ModeKind::Simultaneous,
                white: human("ann"),
                black: Some(SeatKind::RandomMover),
            },
            test_pool(),
            SearchLimit::movetime(50),
            None,
            SessionConfig::default(),
            at(0),
        );
        assert!(matches!(
            simultaneous_with_bot,
            Err(SessionError::NotAllowed(_))
        ));
    }

    #[tokio::test]
    async fn test_summary_and_notation() {
        let mut game = session(ModeKind::Alternating, human("ann"), Some(human("ben")));
        game.submit_move("ann", "e4", at(1)).await.unwrap();
        game.submit_move("ben", "e5", at(2)).await.unwrap();

        let summary = game.summary();
        assert_eq!(summary.status, "active");
        assert_eq!(summary.white, "ann");
        assert_eq!(summary.black, "ben");
        assert_eq!(summary.to_move.as_deref(), Some("white"));
        assert_eq!(summary.moves, 2);
        assert_eq!(game.notation(), "1. e4 e5");

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["variant"], "standard");
        assert_eq!(value["mode"], "alternating");

        game.resign("ben", at(3)).unwrap();
        assert_eq!(game.notation(), "1. e4 e5 1-0");
        let summary = game.summary();
        assert_eq!(summary.status, "white wins by resignation");
        assert!(summary.to_move.is_none());
    }
}
