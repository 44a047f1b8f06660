//! Tagged dispatch over the per-variant rule sets.
//!
//! The variant is chosen once at session creation and travels with the
//! position; every legality decision goes through it, because a FEN alone
//! does not determine which moves are legal.

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::san::{San, SanPlus};
use shakmaty::uci::UciMove;
use shakmaty::variant::{Antichess, Atomic, Horde};
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Outcome, Position, Square};

use crate::error::RulesError;

/// Rule set tag, selectable at session creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Standard,
    Antichess,
    Atomic,
    Horde,
}

impl Variant {
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Standard => "standard",
            Variant::Antichess => "antichess",
            Variant::Atomic => "atomic",
            Variant::Horde => "horde",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Variant> {
        match tag.to_ascii_lowercase().as_str() {
            "standard" | "chess" => Some(Variant::Standard),
            "antichess" | "giveaway" => Some(Variant::Antichess),
            "atomic" => Some(Variant::Atomic),
            "horde" => Some(Variant::Horde),
            _ => None,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a position is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Checkmate { winner: Color },
    Stalemate,
    InsufficientMaterial,
    VariantWin { winner: Color },
    Draw,
}

impl Terminal {
    pub fn winner(self) -> Option<Color> {
        match self {
            Terminal::Checkmate { winner } | Terminal::VariantWin { winner } => Some(winner),
            _ => None,
        }
    }
}

/// A validated move with both wire encodings, as stored in session
/// histories and notation output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub uci: String,
    pub san: String,
    pub from: String,
    pub to: String,
    pub promotion: Option<char>,
    pub is_capture: bool,
}

/// One position under a concrete rule set.
#[derive(Debug, Clone)]
pub enum VariantPosition {
    Standard(Chess),
    Antichess(Antichess),
    Atomic(Atomic),
    Horde(Horde),
}

macro_rules! with_position {
    ($self:expr, $pos:ident => $body:expr) => {
        match $self {
            VariantPosition::Standard($pos) => $body,
            VariantPosition::Antichess($pos) => $body,
            VariantPosition::Atomic($pos) => $body,
            VariantPosition::Horde($pos) => $body,
        }
    };
}

impl VariantPosition {
    /// Default setup for the given rule set.
    pub fn new(variant: Variant) -> VariantPosition {
        match variant {
            Variant::Standard => VariantPosition::Standard(Chess::default()),
            Variant::Antichess => VariantPosition::Antichess(Antichess::default()),
            Variant::Atomic => VariantPosition::Atomic(Atomic::default()),
            Variant::Horde => VariantPosition::Horde(Horde::default()),
        }
    }

    pub fn from_fen(variant: Variant, fen: &str) -> Result<VariantPosition, RulesError> {
        let parsed: Fen = fen
            .parse()
            .map_err(|_| RulesError::ParseFen(fen.to_string()))?;
        Ok(match variant {
            Variant::Standard => VariantPosition::Standard(
                parsed
                    .into_position(CastlingMode::Standard)
                    .map_err(|_| RulesError::ParseFen(fen.to_string()))?,
            ),
            Variant::Antichess => VariantPosition::Antichess(
                parsed
                    .into_position(CastlingMode::Standard)
                    .map_err(|_| RulesError::ParseFen(fen.to_string()))?,
            ),
            Variant::Atomic => VariantPosition::Atomic(
                parsed
                    .into_position(CastlingMode::Standard)
                    .map_err(|_| RulesError::ParseFen(fen.to_string()))?,
            ),
            Variant::Horde => VariantPosition::Horde(
                parsed
                    .into_position(CastlingMode::Standard)
                    .map_err(|_| RulesError::ParseFen(fen.to_string()))?,
            ),
        })
    }

    pub fn variant(&self) -> Variant {
        match self {
            VariantPosition::Standard(_) => Variant::Standard,
            VariantPosition::Antichess(_) => Variant::Antichess,
            VariantPosition::Atomic(_) => Variant::Atomic,
            VariantPosition::Horde(_) => Variant::Horde,
        }
    }

    pub fn fen(&self) -> String {
        with_position!(self, pos => {
            Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string()
        })
    }

    pub fn turn(&self) -> Color {
        with_position!(self, pos => pos.turn())
    }

    pub fn is_check(&self) -> bool {
        with_position!(self, pos => pos.is_check())
    }

    /// Square of the first piece giving check, if any.
    pub fn checker_square(&self) -> Option<Square> {
        with_position!(self, pos => pos.checkers().into_iter().next())
    }

    pub fn board(&self) -> &shakmaty::Board {
        with_position!(self, pos => pos.board())
    }

    pub fn halfmoves(&self) -> u32 {
        with_position!(self, pos => pos.halfmoves())
    }

    pub fn fullmoves(&self) -> u32 {
        with_position!(self, pos => pos.fullmoves().get())
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        with_position!(self, pos => pos.legal_moves().into_iter().collect())
    }

    pub fn is_legal(&self, mv: &Move) -> bool {
        with_position!(self, pos => pos.legal_moves().iter().any(|m| m == mv))
    }

    /// Parse a coordinate-form move (`e2e4`, `e7e8q`) and validate it
    /// against this position.
    pub fn parse_coordinate(&self, uci: &str) -> Result<Move, RulesError> {
        let parsed: UciMove = uci
            .parse()
            .map_err(|_| RulesError::ParseMove(uci.to_string()))?;
        with_position!(self, pos => parsed.to_move(pos)).map_err(|_| RulesError::IllegalMove {
            mv: uci.to_string(),
            fen: self.fen(),
        })
    }

    /// Parse an algebraic-form move (`Nf3`, `exd5`, `O-O`); trailing
    /// check/annotation glyphs are tolerated.
    pub fn parse_algebraic(&self, san: &str) -> Result<Move, RulesError> {
        let bare = san.trim_end_matches(|c| matches!(c, '+' | '#' | '!' | '?'));
        let parsed: San = bare
            .parse()
            .map_err(|_| RulesError::ParseMove(san.to_string()))?;
        with_position!(self, pos => parsed.to_move(pos)).map_err(|_| RulesError::IllegalMove {
            mv: san.to_string(),
            fen: self.fen(),
        })
    }

    pub fn to_coordinate(&self, mv: &Move) -> String {
        mv.to_uci(CastlingMode::Standard).to_string()
    }

    /// Algebraic form including any check/checkmate suffix.
    pub fn to_algebraic(&self, mv: &Move) -> String {
        with_position!(self, pos => {
            let mut next = pos.clone();
            SanPlus::from_move_and_play_unchecked(&mut next, mv).to_string()
        })
    }

    /// Apply a move, producing the successor position and a record carrying
    /// both encodings. Rejects anything not in `legal_moves`.
    pub fn apply(&self, mv: &Move) -> Result<(VariantPosition, MoveRecord), RulesError> {
        if !self.is_legal(mv) {
            return Err(RulesError::IllegalMove {
                mv: self.to_coordinate(mv),
                fen: self.fen(),
            });
        }
        let uci = self.to_coordinate(mv);
        Ok(match self {
            VariantPosition::Standard(pos) => {
                let (next, san) = play_recorded(pos, mv);
                (VariantPosition::Standard(next), move_record(uci, san, mv))
            }
            VariantPosition::Antichess(pos) => {
                let (next, san) = play_recorded(pos, mv);
                (VariantPosition::Antichess(next), move_record(uci, san, mv))
            }
            VariantPosition::Atomic(pos) => {
                let (next, san) = play_recorded(pos, mv);
                (VariantPosition::Atomic(next), move_record(uci, san, mv))
            }
            VariantPosition::Horde(pos) => {
                let (next, san) = play_recorded(pos, mv);
                (VariantPosition::Horde(next), move_record(uci, san, mv))
            }
        })
    }

    pub fn terminal(&self) -> Option<Terminal> {
        with_position!(self, pos => terminal_of(pos))
    }
}

fn play_recorded<P: Position + Clone>(pos: &P, mv: &Move) -> (P, String) {
    let mut next = pos.clone();
    let san = SanPlus::from_move_and_play_unchecked(&mut next, mv).to_string();
    (next, san)
}

fn move_record(uci: String, san: String, mv: &Move) -> MoveRecord {
    MoveRecord {
        from: uci[..2].to_string(),
        to: uci[2..4].to_string(),
        promotion: mv.promotion().map(|r| r.char()),
        is_capture: mv.is_capture(),
        uci,
        san,
    }
}

fn terminal_of<P: Position>(pos: &P) -> Option<Terminal> {
    if pos.is_checkmate() {
        return Some(Terminal::Checkmate {
            winner: !pos.turn(),
        });
    }
    // Variant ends (atomic king loss, horde elimination, antichess piece
    // loss or stalemate-win) take precedence over the standard draws.
    if let Some(outcome) = pos.variant_outcome() {
        return Some(match outcome {
            Outcome::Decisive { winner } => Terminal::VariantWin { winner },
            Outcome::Draw => Terminal::Draw,
        });
    }
    if pos.is_stalemate() {
        return Some(Terminal::Stalemate);
    }
    if pos.is_insufficient_material() {
        return Some(Terminal::InsufficientMaterial);
    }
    None
}
