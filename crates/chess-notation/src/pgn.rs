//! Notation parsing: header split, move-text tokenizer, and replay through
//! the rules adapter. Malformed input degrades to a partial result and
//! never panics or errors out of `parse`.

use chess_rules::{Color, Terminal, Variant, VariantPosition};
use regex::Regex;

use crate::game::{EvalTag, ParsedGame, PlayedMove, PositionInfo, ReplayHalt};

struct MoveToken {
    san: String,
    annotation: Option<String>,
    comment: Option<String>,
    eval: Option<EvalTag>,
    clock: Option<u32>,
}

/// Parse notation text into headers, moves, and the replayed position
/// sequence. Replay stops at the first unplayable token, keeping
/// everything accumulated up to that point.
pub fn parse(text: &str) -> ParsedGame {
    let (headers, movetext) = split_headers(text);
    let (tokens, result) = tokenize(&movetext);

    let start = headers
        .iter()
        .find(|(k, _)| k == "FEN")
        .and_then(|(_, fen)| VariantPosition::from_fen(Variant::Standard, fen).ok())
        .unwrap_or_else(|| VariantPosition::new(Variant::Standard));

    let mut positions = vec![position_info(&start, None, None, None, None)];
    let mut moves = Vec::new();
    let mut halted = None;
    let mut pos = start;
    let mut white_clock = None;
    let mut black_clock = None;

    for (index, token) in tokens.into_iter().enumerate() {
        let applied = pos
            .parse_algebraic(&token.san)
            .and_then(|mv| pos.apply(&mv));
        let (next, record) = match applied {
            Ok(applied) => applied,
            Err(err) => {
                halted = Some(ReplayHalt {
                    move_index: index,
                    token: token.san,
                    reason: err.to_string(),
                });
                break;
            }
        };
        if let Some(clock) = token.clock {
            match pos.turn() {
                Color::White => white_clock = Some(clock),
                Color::Black => black_clock = Some(clock),
            }
        }
        positions.push(position_info(
            &next,
            white_clock,
            black_clock,
            token.eval,
            token.comment.clone(),
        ));
        moves.push(PlayedMove {
            record,
            annotation: token.annotation,
            comment: token.comment,
            eval: token.eval,
            clock: token.clock,
        });
        pos = next;
    }

    ParsedGame {
        headers,
        moves,
        positions,
        result,
        halted,
    }
}

fn position_info(
    pos: &VariantPosition,
    white_clock: Option<u32>,
    black_clock: Option<u32>,
    eval: Option<EvalTag>,
    comment: Option<String>,
) -> PositionInfo {
    let is_check = pos.is_check();
    PositionInfo {
        fen: pos.fen(),
        is_check,
        is_checkmate: matches!(pos.terminal(), Some(Terminal::Checkmate { .. })),
        checker_square: if is_check {
            pos.checker_square().map(|sq| sq.to_string())
        } else {
            None
        },
        white_clock,
        black_clock,
        eval,
        comment,
    }
}

/// Header lines are consumed until the first non-header, non-blank line;
/// everything after that is move text, even if it looks bracketed.
fn split_headers(text: &str) -> (Vec<(String, String)>, String) {
    let header_re = Regex::new(r#"^\[(\w+)\s+"([^"]*)"\]\s*$"#).unwrap();
    let mut headers = Vec::new();
    let mut movetext = String::new();
    let mut in_moves = false;
    for line in text.lines() {
        if !in_moves {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(cap) = header_re.captures(trimmed) {
                headers.push((cap[1].to_string(), cap[2].to_string()));
                continue;
            }
            in_moves = true;
        }
        movetext.push_str(line);
        movetext.push('\n');
    }
    (headers, movetext)
}

fn tokenize(movetext: &str) -> (Vec<MoveToken>, Option<String>) {
    let mut tokens = Vec::new();
    let mut result = None;
    let mut word = String::new();
    let mut chars = movetext.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                flush_word(&mut word, &mut tokens, &mut result);
                let mut comment = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    comment.push(c);
                }
                attach_comment(&mut tokens, &comment);
            }
            '(' => {
                flush_word(&mut word, &mut tokens, &mut result);
                let mut depth = 1usize;
                for c in chars.by_ref() {
                    match c {
                        '(' => depth += 1,
                        ')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
            }
            ';' => {
                flush_word(&mut word, &mut tokens, &mut result);
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => flush_word(&mut word, &mut tokens, &mut result),
            _ => word.push(c),
        }
    }
    flush_word(&mut word, &mut tokens, &mut result);

    (tokens, result)
}

fn flush_word(word: &mut String, tokens: &mut Vec<MoveToken>, result: &mut Option<String>) {
    if word.is_empty() {
        return;
    }
    let w = std::mem::take(word);
    if matches!(w.as_str(), "1-0" | "0-1" | "1/2-1/2" | "*") {
        *result = Some(w);
        return;
    }
    if w.starts_with('$') {
        return;
    }
    // Move-number labels, including glued forms like "2...Nc6".
    let body = w.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.');
    if body.is_empty() {
        return;
    }
    let bare = body.trim_end_matches(|c| matches!(c, '!' | '?'));
    if bare.is_empty() {
        return;
    }
    let annotation = if bare.len() < body.len() {
        Some(body[bare.len()..].to_string())
    } else {
        None
    };
    tokens.push(MoveToken {
        san: bare.to_string(),
        annotation,
        comment: None,
        eval: None,
        clock: None,
    });
}

/// Comments attach to the immediately preceding move; a comment before the
/// first move has nothing to attach to and is dropped.
fn attach_comment(tokens: &mut Vec<MoveToken>, raw: &str) {
    let (cleaned, eval, clock) = extract_tags(raw);
    let last = match tokens.last_mut() {
        Some(last) => last,
        None => return,
    };
    if eval.is_some() {
        last.eval = eval;
    }
    if clock.is_some() {
        last.clock = clock;
    }
    if !cleaned.is_empty() {
        match &mut last.comment {
            Some(existing) => {
                existing.push(' ');
                existing.push_str(&cleaned);
            }
            None => last.comment = Some(cleaned),
        }
    }
}

fn extract_tags(raw: &str) -> (String, Option<EvalTag>, Option<u32>) {
    let eval_re = Regex::new(r"\[%eval\s+([^\]\s]+)\]").unwrap();
    let clk_re = Regex::new(r"\[%clk\s+(\d+):(\d{1,2}):(\d{1,2})(?:\.\d+)?\]").unwrap();
    let tag_re = Regex::new(r"\[%[^\]]*\]").unwrap();

    let eval = eval_re.captures(raw).and_then(|cap| parse_eval(&cap[1]));
    let clock = clk_re.captures(raw).map(|cap| {
        let h: u32 = cap[1].parse().unwrap_or(0);
        let m: u32 = cap[2].parse().unwrap_or(0);
        let s: u32 = cap[3].parse().unwrap_or(0);
        h * 3600 + m * 60 + s
    });
    let cleaned = tag_re.replace_all(raw, "");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    (cleaned, eval, clock)
}

fn parse_eval(value: &str) -> Option<EvalTag> {
    if let Some(mate) = value.strip_prefix('#') {
        return mate.parse::<i32>().ok().map(EvalTag::Mate);
    }
    value
        .parse::<f64>()
        .ok()
        .map(|pawns| EvalTag::Cp((pawns * 100.0).round() as i32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_rules::STANDARD_START_FEN;

    #[test]
    fn test_parse_basic_with_comment() {
        let parsed = parse("1. e4 e5 2. Nf3 {developing} Nc6");
        assert!(parsed.halted.is_none());
        assert_eq!(parsed.positions.len(), 5);
        assert_eq!(parsed.moves.len(), 4);
        assert_eq!(parsed.positions[0].fen, STANDARD_START_FEN);
        assert_eq!(parsed.moves[2].record.san, "Nf3");
        assert_eq!(parsed.moves[2].comment.as_deref(), Some("developing"));
        assert_eq!(parsed.positions[3].comment.as_deref(), Some("developing"));
    }

    #[test]
    fn test_headers_in_order() {
        let text = r#"[Event "Club Match"]
[White "Player1"]
[Black "Player2"]
[Result "1-0"]

1. d4 d5 1-0"#;
        let parsed = parse(text);
        assert_eq!(parsed.headers[0].0, "Event");
        assert_eq!(parsed.header("White"), Some("Player1"));
        assert_eq!(parsed.header("Missing"), None);
        assert_eq!(parsed.result.as_deref(), Some("1-0"));
        assert_eq!(parsed.moves.len(), 2);
    }

    #[test]
    fn test_annotation_glyphs_split() {
        let parsed = parse("1. e4 c5 2. Ne2!? d6 3. g3??");
        assert_eq!(parsed.moves[2].record.san, "Ne2");
        assert_eq!(parsed.moves[2].annotation.as_deref(), Some("!?"));
        assert_eq!(parsed.moves[4].annotation.as_deref(), Some("??"));
        assert!(parsed.moves[0].annotation.is_none());
    }

    #[test]
    fn test_variations_discarded() {
        let parsed = parse("1. e4 e5 (1... c5 2. Nf3 (2. Nc3 Nc6)) 2. Nf3 Nc6");
        assert!(parsed.halted.is_none());
        assert_eq!(parsed.moves.len(), 4);
        assert_eq!(parsed.moves[3].record.san, "Nc6");
    }

    #[test]
    fn test_glued_move_numbers() {
        let parsed = parse("1.e4 e5 2.Nf3 Nc6");
        assert_eq!(parsed.moves.len(), 4);
        assert_eq!(parsed.moves[2].record.san, "Nf3");
    }

    #[test]
    fn test_eval_and_clock_tags() {
        let text = "1. e4 {[%eval 0.3] [%clk 0:03:00]} e5 {[%clk 0:02:58] solid} 2. Nf3 {[%eval #3]}";
        let parsed = parse(text);
        assert_eq!(parsed.moves[0].eval, Some(EvalTag::Cp(30)));
        assert_eq!(parsed.moves[0].clock, Some(180));
        assert_eq!(parsed.moves[1].clock, Some(178));
        assert_eq!(parsed.moves[1].comment.as_deref(), Some("solid"));
        assert_eq!(parsed.moves[2].eval, Some(EvalTag::Mate(3)));
        // Clocks persist per side until overwritten.
        assert_eq!(parsed.positions[1].white_clock, Some(180));
        assert!(parsed.positions[1].black_clock.is_none());
        assert_eq!(parsed.positions[3].white_clock, Some(180));
        assert_eq!(parsed.positions[3].black_clock, Some(178));
    }

    #[test]
    fn test_negative_eval() {
        let parsed = parse("1. e4 {[%eval -1.50]} e5 {[%eval #-2]}");
        assert_eq!(parsed.moves[0].eval, Some(EvalTag::Cp(-150)));
        assert_eq!(parsed.moves[1].eval, Some(EvalTag::Mate(-2)));
    }

    #[test]
    fn test_halt_on_unparseable_token() {
        let parsed = parse("1. e4 e5 2. Zz9 Nc6");
        assert_eq!(parsed.moves.len(), 2);
        assert_eq!(parsed.positions.len(), 3);
        let halt = parsed.halted.unwrap();
        assert_eq!(halt.move_index, 2);
        assert_eq!(halt.token, "Zz9");
    }

    #[test]
    fn test_halt_on_illegal_move() {
        let parsed = parse("1. e4 e4 2. Nf3");
        assert_eq!(parsed.moves.len(), 1);
        assert_eq!(parsed.positions.len(), 2);
        assert_eq!(parsed.halted.unwrap().move_index, 1);
    }

    #[test]
    fn test_empty_and_garbage_input() {
        let parsed = parse("");
        assert_eq!(parsed.positions.len(), 1);
        assert!(parsed.moves.is_empty());
        assert!(parsed.halted.is_none());

        let parsed = parse("{just a comment} (an orphan line");
        assert_eq!(parsed.positions.len(), 1);
        assert!(parsed.moves.is_empty());
    }

    #[test]
    fn test_checkmate_metadata() {
        let parsed = parse("1. f3 e5 2. g4 Qh4# 0-1");
        let last = parsed.positions.last().unwrap();
        assert!(last.is_check);
        assert!(last.is_checkmate);
        assert_eq!(last.checker_square.as_deref(), Some("h4"));
        assert_eq!(parsed.moves[3].record.san, "Qh4#");
        assert_eq!(parsed.result.as_deref(), Some("0-1"));
    }

    #[test]
    fn test_fen_header_start() {
        let text = r#"[FEN "8/P7/8/8/8/8/7k/K7 w - - 0 1"]

1. a8=Q Kh3"#;
        let parsed = parse(text);
        assert_eq!(parsed.positions[0].fen, "8/P7/8/8/8/8/7k/K7 w - - 0 1");
        assert_eq!(parsed.moves.len(), 2);
        assert_eq!(parsed.moves[0].record.promotion, Some('q'));
    }

    #[test]
    fn test_multiple_comments_join() {
        let parsed = parse("1. e4 {first} {second} e5");
        assert_eq!(parsed.moves[0].comment.as_deref(), Some("first second"));
    }
}
