//! Decoding of engine reply lines
//!
//! Only two kinds of line matter for a fixed-depth search: `info` lines,
//! which carry the running score and principal variation, and the final
//! `bestmove` line. Everything else (`id`, `uciok`, `readyok`, `option`)
//! is skipped.

use super::result::{AnalysisResult, Score};

/// Marker preceding the principal variation inside an `info` line
const PV_MARKER: &str = " pv ";

/// Shortest printable coordinate move (from-square + to-square)
const MIN_MOVE_LEN: usize = 4;

/// What the engine sends when it has no legal move
const NO_MOVE: &str = "(none)";

/// Whether `line` ends the reply to a `go` command
pub fn is_terminal(line: &str) -> bool {
    line.starts_with("bestmove")
}

/// Decode the reply to one search
///
/// Later `info` lines overwrite earlier ones. Decoding stops at the first
/// `bestmove` line. A reply without one decodes to an empty result.
pub fn decode<S: AsRef<str>>(lines: &[S]) -> AnalysisResult {
    let mut score = None;
    let mut pv = Vec::new();

    for line in lines {
        let line = line.as_ref().trim_end_matches('\r');

        if line.starts_with("info") {
            if let Some(s) = parse_score(line) {
                score = Some(s);
            }
            if let Some(moves) = parse_pv(line) {
                pv = moves;
            }
        } else if is_terminal(line) {
            let best_move = line
                .split_whitespace()
                .nth(1)
                .filter(|m| *m != NO_MOVE)
                .map(str::to_string);
            return AnalysisResult {
                score,
                best_move,
                pv,
            };
        }
    }

    AnalysisResult::default()
}

/// Extract `score cp <n>` or `score mate <n>` from an `info` line
fn parse_score(line: &str) -> Option<Score> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    tokens.windows(3).find_map(|w| match w {
        ["score", "cp", n] => n.parse().ok().map(Score::Cp),
        ["score", "mate", n] => n.parse().ok().map(Score::Mate),
        _ => None,
    })
}

/// Extract the move list following ` pv `, dropping anything too short to be a move
fn parse_pv(line: &str) -> Option<Vec<String>> {
    let start = line.find(PV_MARKER)? + PV_MARKER.len();
    Some(
        line[start..]
            .split_whitespace()
            .filter(|token| token.len() >= MIN_MOVE_LEN)
            .map(str::to_string)
            .collect(),
    )
}
