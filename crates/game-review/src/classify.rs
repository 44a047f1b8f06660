//! Pure move-judgment rules: evaluation normalization, thresholds,
//! accuracy penalties, and the sacrifice test behind `Brilliant`.

use chess_rules::{Move, Role, VariantPosition};

use crate::report::Judgment;

/// Centipawn stand-in for a delivered mate; mate-in-N scores approach it
/// from below so nearer mates rank higher.
pub const MATE_CP: i32 = 10_000;

/// Collapse an engine score to centipawns from White's perspective.
/// Engine scores are reported from the side to move.
pub fn eval_to_white_cp(cp: Option<i32>, mate: Option<i32>, white_to_move: bool) -> i32 {
    let side_cp = match (cp, mate) {
        (_, Some(m)) if m > 0 => MATE_CP - m * 10,
        (_, Some(m)) => -MATE_CP - m * 10,
        (Some(c), None) => c,
        (None, None) => 0,
    };
    if white_to_move {
        side_cp
    } else {
        -side_cp
    }
}

/// Judge one move from its evaluation delta (mover's perspective,
/// negative = lost ground) and its relation to the engine's top choice.
pub fn classify(delta: i32, matches_best: bool, offered_material: bool) -> Judgment {
    if matches_best && offered_material && delta >= 0 {
        return Judgment::Brilliant;
    }
    if delta <= -200 {
        return Judgment::Blunder;
    }
    if delta <= -100 {
        return Judgment::Mistake;
    }
    if delta <= -50 {
        return Judgment::Inaccuracy;
    }
    if matches_best {
        return Judgment::Good;
    }
    if delta >= 50 {
        return Judgment::Excellent;
    }
    Judgment::Good
}

/// Accuracy penalty per judgment; negative values are bonuses.
pub fn penalty(judgment: Judgment) -> f64 {
    match judgment {
        Judgment::Blunder => 10.0,
        Judgment::Mistake => 5.0,
        Judgment::Inaccuracy => 2.0,
        Judgment::Good => -0.5,
        Judgment::Excellent => -1.0,
        Judgment::Brilliant => -2.0,
    }
}

/// 0-100 accuracy for one side: 100 minus the mean penalty over its
/// judged moves.
pub fn accuracy(judgments: &[Judgment]) -> f64 {
    if judgments.is_empty() {
        return 100.0;
    }
    let total: f64 = judgments.iter().map(|j| penalty(*j)).sum();
    let accuracy = 100.0 - total / judgments.len() as f64;
    accuracy.max(0.0).min(100.0)
}

/// True when the move leaves a minor piece or better capturable on its
/// destination for less than its own value. Pawn offers do not count.
pub fn offers_material(before: &VariantPosition, mv: &Move) -> bool {
    let from = match mv.from() {
        Some(square) => square,
        None => return false,
    };
    let moved = match before.board().piece_at(from) {
        Some(piece) => piece_points(piece.role),
        None => return false,
    };
    let taken = before
        .board()
        .piece_at(mv.to())
        .map(|piece| piece_points(piece.role))
        .unwrap_or(0);
    if moved < 3 || taken >= moved {
        return false;
    }
    let after = match before.apply(mv) {
        Ok((next, _)) => next,
        Err(_) => return false,
    };
    // Legal replies only, so pinned attackers do not count.
    after
        .legal_moves()
        .iter()
        .any(|reply| reply.is_capture() && reply.to() == mv.to())
}

/// One-line explanation attached to each judged move.
pub fn rationale(judgment: Judgment, delta: i32, matches_best: bool) -> String {
    match judgment {
        Judgment::Brilliant => "offers material and still holds the engine's line".to_string(),
        Judgment::Excellent => format!("gains {} centipawns", delta),
        Judgment::Good if matches_best => "engine's top choice".to_string(),
        Judgment::Good => "keeps the position level".to_string(),
        Judgment::Inaccuracy | Judgment::Mistake | Judgment::Blunder => {
            format!("gives up {} centipawns", -delta)
        }
    }
}

fn piece_points(role: Role) -> i32 {
    match role {
        Role::Pawn => 1,
        Role::Knight | Role::Bishop => 3,
        Role::Rook => 5,
        Role::Queen => 9,
        Role::King => 0,
    }
}
