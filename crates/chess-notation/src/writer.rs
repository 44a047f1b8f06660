//! Serializing a move history back to notation text.

use crate::game::{EvalTag, PlayedMove};

/// Move text only: numbered pairs, annotations inline, comments and tags
/// re-embedded in braces.
pub fn write_movetext(moves: &[PlayedMove]) -> String {
    let mut out = String::new();
    for (i, mv) in moves.iter().enumerate() {
        if i % 2 == 0 {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&format!("{}.", i / 2 + 1));
        }
        out.push(' ');
        out.push_str(&mv.record.san);
        if let Some(annotation) = &mv.annotation {
            out.push_str(annotation);
        }
        if let Some(comment) = format_comment(mv) {
            out.push(' ');
            out.push_str(&comment);
        }
    }
    out
}

/// Full notation: header lines, blank separator, move text, result marker.
pub fn write_game(
    headers: &[(String, String)],
    moves: &[PlayedMove],
    result: Option<&str>,
) -> String {
    let mut out = String::new();
    for (key, value) in headers {
        out.push_str(&format!("[{} \"{}\"]\n", key, value));
    }
    if !headers.is_empty() {
        out.push('\n');
    }
    out.push_str(&write_movetext(moves));
    if !moves.is_empty() {
        out.push(' ');
    }
    out.push_str(result.unwrap_or("*"));
    out.push('\n');
    out
}

fn format_comment(mv: &PlayedMove) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    if let Some(eval) = mv.eval {
        parts.push(match eval {
            EvalTag::Cp(cp) => format!("[%eval {:.2}]", f64::from(cp) / 100.0),
            EvalTag::Mate(n) => format!("[%eval #{}]", n),
        });
    }
    if let Some(clock) = mv.clock {
        parts.push(format!(
            "[%clk {}:{:02}:{:02}]",
            clock / 3600,
            (clock % 3600) / 60,
            clock % 60
        ));
    }
    if let Some(comment) = &mv.comment {
        parts.push(comment.clone());
    }
    if parts.is_empty() {
        None
    } else {
        Some(format!("{{{}}}", parts.join(" ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pgn::parse;

    #[test]
    fn test_movetext_numbering() {
        let parsed = parse("1. d4 Nf6 2. c4 e6 3. Nc3");
        assert_eq!(write_movetext(&parsed.moves), "1. d4 Nf6 2. c4 e6 3. Nc3");
    }

    #[test]
    fn test_round_trip_preserves_positions() {
        let original = parse("1. e4 e5 2. Nf3 {developing} Nc6 3. Bb5!? a6 *");
        let text = write_game(&original.headers, &original.moves, original.result.as_deref());
        let reparsed = parse(&text);
        let fens: Vec<&str> = original.positions.iter().map(|p| p.fen.as_str()).collect();
        let refens: Vec<&str> = reparsed.positions.iter().map(|p| p.fen.as_str()).collect();
        assert_eq!(fens, refens);
        assert_eq!(reparsed.moves[2].comment.as_deref(), Some("developing"));
        assert_eq!(reparsed.moves[4].annotation.as_deref(), Some("!?"));
        assert_eq!(reparsed.result.as_deref(), Some("*"));
    }

    #[test]
    fn test_headers_written() {
        let parsed = parse("[White \"A\"]\n[Black \"B\"]\n\n1. e4 e5 1-0");
        let text = write_game(&parsed.headers, &parsed.moves, parsed.result.as_deref());
        assert!(text.starts_with("[White \"A\"]\n[Black \"B\"]\n\n1. e4 e5 1-0"));
    }

    #[test]
    fn test_tags_reembedded() {
        let parsed = parse("1. e4 {[%eval 0.30] [%clk 0:03:00]} e5");
        let text = write_movetext(&parsed.moves);
        assert!(text.contains("[%eval 0.30]"));
        assert!(text.contains("[%clk 0:03:00]"));
        let again = parse(&text);
        assert_eq!(again.moves[0].eval, parsed.moves[0].eval);
        assert_eq!(again.moves[0].clock, Some(180));
    }
}
