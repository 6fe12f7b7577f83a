//! UCI output formatting: moves, `info` lines, and the WDL model.

use crate::board::{CastleSide, Move, Square};
use crate::search::SearchInfo;

/// Format a move in coordinate notation.
///
/// Internally castling is king-takes-rook; standard GUIs expect the king's
/// destination square instead, while Chess960 GUIs take the rook square.
#[must_use]
pub fn format_move(mv: Move, chess960: bool) -> String {
    if mv.is_castling() && !chess960 {
        let side = if mv.to().file() > mv.from().file() {
            CastleSide::King
        } else {
            CastleSide::Queen
        };
        let target = Square::new(mv.from().rank(), side.king_target_file());
        return format!("{}{}", mv.from(), target);
    }
    mv.to_string()
}

/// Win/draw/loss estimate in per-mille from a centipawn score.
///
/// Uses a logistic model with a 400-centipawn scale; the draw share shrinks
/// as the score moves away from zero.
#[must_use]
pub fn wdl_model(score: i32) -> (u32, u32, u32) {
    let win_rate = |s: i32| -> f64 { 1.0 / (1.0 + 10f64.powf(-f64::from(s) / 400.0)) };
    let w = win_rate(score - 50);
    let l = 1.0 - win_rate(score + 50);
    let w_mille = (w * 1000.0) as u32;
    let l_mille = (l * 1000.0) as u32;
    let d_mille = 1000u32.saturating_sub(w_mille).saturating_sub(l_mille);
    (w_mille, d_mille, l_mille)
}

/// Format one `info` line.
#[must_use]
pub fn format_info(info: &SearchInfo, chess960: bool, show_wdl: bool) -> String {
    let mut line = format!(
        "info depth {} seldepth {} multipv {}",
        info.depth, info.seldepth, info.multipv
    );

    match info.mate {
        Some(mate) => line.push_str(&format!(" score mate {mate}")),
        None => line.push_str(&format!(" score cp {}", info.score)),
    }
    if show_wdl {
        let (w, d, l) = wdl_model(info.score);
        line.push_str(&format!(" wdl {w} {d} {l}"));
    }

    line.push_str(&format!(
        " nodes {} nps {} hashfull {} tbhits {} time {}",
        info.nodes, info.nps, info.hashfull, info.tb_hits, info.time_ms
    ));

    if !info.pv.is_empty() {
        line.push_str(" pv");
        for &mv in &info.pv {
            line.push(' ');
            line.push_str(&format_move(mv, chess960));
        }
    }
    line
}

/// Format the final `bestmove` line.
#[must_use]
pub fn format_bestmove(best: Option<Move>, ponder: Option<Move>, chess960: bool) -> String {
    let Some(best) = best else {
        // No legal move: the protocol still demands a bestmove token.
        return "bestmove 0000".to_string();
    };
    let mut line = format!("bestmove {}", format_move(best, chess960));
    if let Some(ponder) = ponder {
        line.push_str(&format!(" ponder {}", format_move(ponder, chess960)));
    }
    line
}
