//! Iterative deepening at the root: aspiration windows, MultiPV, info
//! reporting, and the ponder-move handoff.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::constants::{mate_in_moves, SCORE_INFINITE, SCORE_TB_WIN};
use super::{InfoCallback, SearchContext, SearchLimits, SearchState};
use crate::board::{Board, Move, MAX_PLY};
use crate::eval::Evaluator;
use crate::tb::Tablebases;
use crate::tt::{Bound, TranspositionTable};

/// One `info` report: everything a protocol layer needs to print a line.
#[derive(Clone, Debug)]
pub struct SearchInfo {
    pub depth: i32,
    pub seldepth: u32,
    pub multipv: u32,
    pub score: i32,
    pub mate: Option<i32>,
    pub nodes: u64,
    pub nps: u64,
    pub hashfull: u32,
    pub tb_hits: u64,
    pub time_ms: u64,
    pub pv: Vec<Move>,
}

/// Final outcome of one search call.
#[derive(Clone, Debug)]
pub struct SearchResult {
    pub best_move: Option<Move>,
    pub ponder: Option<Move>,
    pub score: i32,
    pub depth: i32,
}

/// Run iterative deepening on this thread. `depth_offset` lets lazy-SMP
/// helpers explore slightly deeper horizons than the main thread.
#[allow(clippy::too_many_arguments)]
pub fn search_root(
    board: &mut Board,
    state: &mut SearchState,
    tt: &TranspositionTable,
    evaluator: &dyn Evaluator,
    tb: &dyn Tablebases,
    stop: &AtomicBool,
    global_nodes: &AtomicU64,
    limits: &SearchLimits,
    is_main: bool,
    depth_offset: i32,
    callback: Option<InfoCallback>,
) -> SearchResult {
    let mut ctx = SearchContext::new(
        board,
        state,
        tt,
        evaluator,
        tb,
        stop,
        global_nodes,
        limits,
        is_main,
    );
    ctx.state.aspiration.new_search();

    // Decisive tablebase hit at the root ends the search outright.
    if ctx.tb.can_probe(ctx.board) {
        if let Some(probe) = ctx.tb.probe_root(ctx.board) {
            let score = match probe.wdl {
                crate::tb::Wdl::Win => SCORE_TB_WIN,
                crate::tb::Wdl::Draw => 0,
                crate::tb::Wdl::Loss => -SCORE_TB_WIN,
            };
            if let Some(cb) = &callback {
                cb(&SearchInfo {
                    depth: 1,
                    seldepth: 1,
                    multipv: 1,
                    score,
                    mate: None,
                    nodes: 0,
                    nps: 0,
                    hashfull: ctx.tt.hashfull(),
                    tb_hits: 1,
                    time_ms: 0,
                    pv: vec![probe.best_move],
                });
            }
            return SearchResult {
                best_move: Some(probe.best_move),
                ponder: None,
                score,
                depth: 1,
            };
        }
    }

    // Root move set, optionally restricted by `searchmoves`.
    let all_moves = ctx.board.generate_moves();
    let root_moves: Vec<Move> = all_moves
        .iter()
        .copied()
        .filter(|mv| limits.searchmoves.is_empty() || limits.searchmoves.contains(mv))
        .collect();
    if root_moves.is_empty() {
        // Checkmated or stalemated at the root.
        let score = if ctx.board.is_in_check(ctx.board.side_to_move()) {
            -super::constants::SCORE_MATE
        } else {
            0
        };
        return SearchResult {
            best_move: None,
            ponder: None,
            score,
            depth: 0,
        };
    }

    // The game may already be over by rule at the root.
    if ctx.board.halfmove_clock() >= 100 || ctx.board.is_insufficient_material() {
        return SearchResult {
            best_move: Some(root_moves[0]),
            ponder: None,
            score: 0,
            depth: 0,
        };
    }

    let mut best_move = root_moves[0];
    let mut best_score = 0i32;
    let mut completed_depth = 0i32;

    let max_depth = limits
        .depth
        .unwrap_or(MAX_PLY as i32 - 1)
        .clamp(1, MAX_PLY as i32 - 1);
    let multipv = limits.multipv.max(1).min(root_moves.len() as u32);

    for depth in 1..=max_depth {
        if ctx.should_stop() {
            break;
        }
        // Soft time limit: do not start an iteration we cannot finish.
        if is_main && depth > 1 && limits.clock.past_soft() {
            break;
        }

        let target_depth = (depth + depth_offset).clamp(1, MAX_PLY as i32 - 1);
        if depth > 1 {
            ctx.state.history.decay();
        }

        let mut chosen: Vec<Move> = Vec::new();
        let mut iteration_complete = true;

        for line in 1..=multipv {
            let candidates: Vec<Move> = root_moves
                .iter()
                .copied()
                .filter(|mv| !chosen.contains(mv))
                .collect();
            if candidates.is_empty() {
                break;
            }

            let (line_move, line_score) = if line == 1 {
                search_root_line_aspirated(&mut ctx, target_depth, &candidates)
            } else {
                search_root_line(
                    &mut ctx,
                    target_depth,
                    -SCORE_INFINITE,
                    SCORE_INFINITE,
                    &candidates,
                )
            };

            if ctx.should_stop() {
                iteration_complete = false;
                break;
            }

            chosen.push(line_move);
            if line == 1 {
                best_move = line_move;
                best_score = line_score;
                completed_depth = depth;
                ctx.state.aspiration.succeed(line_score);
                ctx.tt.store(
                    ctx.board.zobrist(),
                    line_score,
                    line_move,
                    target_depth,
                    Bound::Exact,
                    0,
                );
            }

            if let Some(cb) = &callback {
                let elapsed = ctx.start.elapsed().as_millis() as u64;
                let nodes = ctx.global_nodes.load(Ordering::Relaxed);
                let nps = if elapsed > 0 { nodes * 1000 / elapsed } else { 0 };
                cb(&SearchInfo {
                    depth,
                    seldepth: ctx.seldepth,
                    multipv: line,
                    score: line_score,
                    mate: mate_in_moves(line_score),
                    nodes,
                    nps,
                    hashfull: ctx.tt.hashfull(),
                    tb_hits: ctx.tb_hits,
                    time_ms: elapsed,
                    pv: extract_pv(&mut ctx, line_move, target_depth as usize),
                });
            }
        }

        if !iteration_complete {
            break;
        }
    }

    let ponder = extract_ponder(&mut ctx, best_move);
    SearchResult {
        best_move: Some(best_move),
        ponder,
        score: best_score,
        depth: completed_depth,
    }
}

/// First MultiPV line: aspiration window with widening retries.
fn search_root_line_aspirated(
    ctx: &mut SearchContext<'_>,
    depth: i32,
    candidates: &[Move],
) -> (Move, i32) {
    loop {
        let (alpha, beta) = ctx.state.aspiration.window(depth);
        let (mv, score) = search_root_line(ctx, depth, alpha, beta, candidates);
        if ctx.should_stop() {
            return (mv, score);
        }
        if score <= alpha || score >= beta {
            ctx.state.aspiration.fail();
            continue;
        }
        return (mv, score);
    }
}

/// Search every candidate root move once at `depth` and return the best.
fn search_root_line(
    ctx: &mut SearchContext<'_>,
    depth: i32,
    mut alpha: i32,
    beta: i32,
    candidates: &[Move],
) -> (Move, i32) {
    let mut best_move = candidates[0];
    let mut best_score = -SCORE_INFINITE;

    for (i, &mv) in candidates.iter().enumerate() {
        let moved_piece = ctx.board.piece_on(mv.from());
        let Some(undo) = ctx.board.make_move(mv) else {
            continue;
        };
        ctx.state.ply_info[0].last_move = mv;
        ctx.state.ply_info[0].moved_piece = moved_piece;
        ctx.push_repetition(ctx.board.zobrist());

        let mut score;
        if i == 0 {
            score = -ctx.search(depth - 1, -beta, -alpha, 1, true, true);
        } else {
            score = -ctx.search(depth - 1, -alpha - 1, -alpha, 1, false, true);
            if score > alpha && score < beta {
                score = -ctx.search(depth - 1, -beta, -alpha, 1, true, true);
            }
        }

        ctx.pop_repetition();
        ctx.board.unmake_move(undo);

        if ctx.should_stop() {
            if best_score == -SCORE_INFINITE {
                best_score = score;
                best_move = mv;
            }
            break;
        }

        if score > best_score {
            best_score = score;
            best_move = mv;
            if score > alpha {
                alpha = score;
                if alpha >= beta {
                    break;
                }
            }
        }
    }

    (best_move, best_score)
}

/// Walk the transposition table from the root to recover the PV.
fn extract_pv(ctx: &mut SearchContext<'_>, first: Move, max_len: usize) -> Vec<Move> {
    let mut pv = Vec::with_capacity(max_len.min(MAX_PLY));
    let mut undos = Vec::new();
    let mut seen = Vec::new();

    let mut mv = first;
    while pv.len() < max_len.min(MAX_PLY - 1) {
        if mv.is_none() || !ctx.board.is_pseudo_legal(mv) || !ctx.board.is_legal(mv) {
            break;
        }
        let key = ctx.board.zobrist();
        if seen.contains(&key) {
            break;
        }
        seen.push(key);

        let Some(undo) = ctx.board.make_move(mv) else {
            break;
        };
        pv.push(mv);
        undos.push(undo);
        mv = ctx.tt.best_move(ctx.board.zobrist());
    }

    for undo in undos.into_iter().rev() {
        ctx.board.unmake_move(undo);
    }
    pv
}

/// Expected reply after the best move, for `bestmove ... ponder`.
fn extract_ponder(ctx: &mut SearchContext<'_>, best_move: Move) -> Option<Move> {
    if best_move.is_none() || !ctx.board.is_legal(best_move) {
        return None;
    }
    let undo = ctx.board.make_move(best_move)?;
    let reply = ctx.tt.best_move(ctx.board.zobrist());
    let ponder = (!reply.is_none()
        && ctx.board.is_pseudo_legal(reply)
        && ctx.board.is_legal(reply))
    .then_some(reply);
    ctx.board.unmake_move(undo);
    ponder
}
