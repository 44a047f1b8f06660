//! Review driver: picks the positions worth judging, evaluates them in
//! pool-sized batches, and turns the evals into per-move judgments.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future;
use tracing::debug;

use chess_notation::ParsedGame;
use chess_rules::{Terminal, Variant, VariantPosition};
use engine_pool::{EnginePool, SearchLimit};

use crate::classify::{self, MATE_CP};
use crate::error::ReviewError;
use crate::report::{AnnotatedMove, GameReview, Judgment, JudgmentCounts, SideSummary};

/// Leading-ply cap on the opening skip.
const OPENING_SKIP_CAP: usize = 6;

/// Judges finished games against the engine, one evaluation per position.
/// Each evaluated position serves as the after-state of one move and the
/// before-state of the next, so a game costs positions-minus-skip calls.
pub struct ReviewEngine {
    pool: Arc<EnginePool>,
    limit: SearchLimit,
}

impl ReviewEngine {
    pub fn new(pool: Arc<EnginePool>, limit: SearchLimit) -> ReviewEngine {
        ReviewEngine { pool, limit }
    }

    /// Parse notation and review the replayed game. A halted replay
    /// reviews the valid prefix.
    pub async fn review_game(&self, notation: &str) -> Result<GameReview, ReviewError> {
        let game = chess_notation::parse(notation);
        self.review_parsed(&game).await
    }

    pub async fn review_parsed(&self, game: &ParsedGame) -> Result<GameReview, ReviewError> {
        let total_moves = game.moves.len();
        let skip = opening_skip(game.positions.len());
        debug!(total_moves, skip, "reviewing game");

        if total_moves <= skip {
            return Ok(GameReview {
                moves: Vec::new(),
                white: Tally::default().summary(),
                black: Tally::default().summary(),
                opening_skip: skip,
                total_moves,
            });
        }

        let (evals, best) = self.evaluate_positions(game, skip).await?;

        let mut moves = Vec::with_capacity(total_moves - skip);
        let mut white = Tally::default();
        let mut black = Tally::default();

        for (index, played) in game.moves.iter().enumerate().skip(skip) {
            let before_fen = &game.positions[index].fen;
            let eval_before = match evals.get(&index) {
                Some(cp) => *cp,
                None => continue,
            };
            let eval_after = match evals.get(&(index + 1)) {
                Some(cp) => *cp,
                None => continue,
            };
            let mover_is_white = white_to_move(before_fen);
            let delta = if mover_is_white {
                eval_after - eval_before
            } else {
                eval_before - eval_after
            };
            let best_move = best.get(&index).map(String::as_str).unwrap_or("");
            let matches_best = !best_move.is_empty() && played.record.uci == best_move;
            let offered = matches_best
                && delta >= 0
                && offers_material_for(before_fen, &played.record.uci);
            let judgment = classify::classify(delta, matches_best, offered);

            if mover_is_white {
                white.add(judgment, delta);
            } else {
                black.add(judgment, delta);
            }
            moves.push(AnnotatedMove {
                index,
                uci: played.record.uci.clone(),
                san: played.record.san.clone(),
                eval_before,
                eval_after,
                best_move: best_move.to_string(),
                delta,
                judgment,
                rationale: classify::rationale(judgment, delta, matches_best),
            });
        }

        Ok(GameReview {
            moves,
            white: white.summary(),
            black: black.summary(),
            opening_skip: skip,
            total_moves,
        })
    }

    /// One White-perspective eval per position from the skip point on,
    /// plus the engine's best move per position. Terminal positions are
    /// scored locally; the engine has no best move to give there.
    async fn evaluate_positions(
        &self,
        game: &ParsedGame,
        skip: usize,
    ) -> Result<(HashMap<usize, i32>, HashMap<usize, String>), ReviewError> {
        let mut evals = HashMap::new();
        let mut best = HashMap::new();
        let mut pending: Vec<(usize, String)> = Vec::new();

        let last = game.positions.len() - 1;
        for (index, info) in game.positions.iter().enumerate().skip(skip) {
            if info.is_checkmate {
                let mated_is_white = white_to_move(&info.fen);
                evals.insert(index, if mated_is_white { -MATE_CP } else { MATE_CP });
                continue;
            }
            if index == last && is_dead_position(&info.fen) {
                evals.insert(index, 0);
                continue;
            }
            pending.push((index, info.fen.clone()));
        }

        let batch_size = self.pool.size().max(1);
        for batch in pending.chunks(batch_size) {
            let calls = batch
                .iter()
                .map(|(_, fen)| self.pool.analyze(fen, self.limit));
            let results = future::join_all(calls).await;
            for ((index, fen), outcome) in batch.iter().zip(results) {
                let analysis = outcome?;
                let white_cp =
                    classify::eval_to_white_cp(analysis.cp, analysis.mate, white_to_move(fen));
                evals.insert(*index, white_cp);
                best.insert(*index, analysis.best_move);
            }
            debug!(evaluated = evals.len(), "review batch done");
        }

        Ok((evals, best))
    }
}

#[derive(Default)]
struct Tally {
    judgments: Vec<Judgment>,
    counts: JudgmentCounts,
    cp_loss: i64,
}

impl Tally {
    fn add(&mut self, judgment: Judgment, delta: i32) {
        self.judgments.push(judgment);
        self.counts.bump(judgment);
        if delta < 0 {
            self.cp_loss += i64::from(-delta);
        }
    }

    fn summary(self) -> SideSummary {
        let judged = self.judgments.len() as u32;
        let avg_cp_loss = if judged > 0 {
            self.cp_loss as f64 / judged as f64
        } else {
            0.0
        };
        SideSummary {
            judged,
            counts: self.counts,
            avg_cp_loss,
            accuracy: classify::accuracy(&self.judgments),
        }
    }
}

fn opening_skip(total_positions: usize) -> usize {
    OPENING_SKIP_CAP.min(total_positions / 4)
}

fn white_to_move(fen: &str) -> bool {
    fen.split(' ').nth(1).unwrap_or("w") == "w"
}

fn is_dead_position(fen: &str) -> bool {
    match VariantPosition::from_fen(Variant::Standard, fen) {
        Ok(position) => matches!(
            position.terminal(),
            Some(Terminal::Stalemate) | Some(Terminal::InsufficientMaterial) | Some(Terminal::Draw)
        ),
        Err(_) => false,
    }
}

fn offers_material_for(fen: &str, uci: &str) -> bool {
    let position = match VariantPosition::from_fen(Variant::Standard, fen) {
        Ok(position) => position,
        Err(_) => return false,
    };
    let mv = match position.parse_coordinate(uci) {
        Ok(mv) => mv,
        Err(_) => return false,
    };
    classify::offers_material(&position, &mv)
}
