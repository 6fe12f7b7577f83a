//! The alpha-beta node: PVS with transposition table, null move, ProbCut,
//! razoring, reverse futility, LMR/LMP, futility and SEE pruning, and
//! check/singular/recapture/pawn-push extensions.

use super::constants::{
    CHECK_EXT_MAX_DEPTH, FUTILITY_MAX_DEPTH, LMP_MAX_DEPTH, MATE_BOUND, NULL_MIN_DEPTH,
    PROBCUT_MIN_DEPTH, RECAPTURE_EXT_MAX_DEPTH, SCORE_INFINITE, SCORE_MATE, SCORE_TB_WIN,
    SEE_PRUNE_MARGIN, SEE_PRUNE_MAX_DEPTH, SINGULAR_MIN_DEPTH,
};
use super::history::history_bonus;
use super::lmr::{self, LmrAdjustments};
use super::picker::{MovePicker, PickerContext};
use super::SearchContext;
use crate::board::{Move, Piece, MAX_PLY, MOVE_NONE};
use crate::tb::Wdl;
use crate::tt::Bound;

/// Futility margin, widened in endgames and narrowed in heavy middlegames.
fn futility_margin(depth: i32, phase: i32) -> i32 {
    let base = 100 + 150 * depth;
    if phase < 64 {
        base * 12 / 10
    } else if phase > 200 {
        base * 8 / 10
    } else {
        base
    }
}

impl SearchContext<'_> {
    /// Negamax alpha-beta. Returns a score from the side to move's
    /// perspective; only called below the root (`ply >= 1`).
    #[allow(clippy::too_many_lines)]
    pub fn search(
        &mut self,
        depth: i32,
        mut alpha: i32,
        mut beta: i32,
        ply: usize,
        is_pv: bool,
        allow_null: bool,
    ) -> i32 {
        debug_assert!(-SCORE_INFINITE <= alpha && alpha < beta && beta <= SCORE_INFINITE);

        // Terminal guards: depth ceiling and cooperative stop both fall back
        // to the static evaluation.
        if ply >= MAX_PLY - 1 || self.should_stop() {
            return self
                .state
                .eval_cache
                .probe_or_eval(self.board, self.evaluator)
                .score;
        }

        // Draw detection before anything touches the table.
        if self.is_repetition() {
            return self.draw_score();
        }
        if self.board.halfmove_clock() >= 100 {
            return self.draw_score();
        }
        if self.board.is_insufficient_material() {
            return self.draw_score();
        }

        let excluded = self.state.ply_info[ply].excluded;
        let excluded_active = !excluded.is_none();

        // Tablebase probe: exact result for few-piece positions.
        if !excluded_active && self.tb.can_probe(self.board) {
            if let Some(wdl) = self.tb.probe_wdl(self.board) {
                self.tb_hits += 1;
                match wdl {
                    Wdl::Win => {
                        let score = SCORE_TB_WIN - ply as i32;
                        self.tt
                            .store(self.board.zobrist(), score, MOVE_NONE, depth, Bound::Exact, ply);
                        return score;
                    }
                    Wdl::Loss => {
                        let score = -SCORE_TB_WIN + ply as i32;
                        self.tt
                            .store(self.board.zobrist(), score, MOVE_NONE, depth, Bound::Exact, ply);
                        return score;
                    }
                    Wdl::Draw => {
                        if depth <= 4 {
                            return 0;
                        }
                    }
                }
            }
        }

        // Mate distance pruning: no line from here can beat an already
        // proven faster mate.
        alpha = alpha.max(-SCORE_MATE + ply as i32);
        beta = beta.min(SCORE_MATE - ply as i32 - 1);
        if alpha >= beta {
            return alpha;
        }

        let key = self.board.zobrist();
        let mut tt_move = MOVE_NONE;
        let mut tt_entry = None;
        if let Some(entry) = self.tt.probe(key, ply) {
            tt_move = entry.best_move;
            if !excluded_active && !is_pv && entry.depth >= depth {
                let cutoff = match entry.bound {
                    Bound::Exact => true,
                    Bound::Lower => entry.score >= beta,
                    Bound::Upper => entry.score <= alpha,
                    Bound::None => false,
                };
                if cutoff {
                    return entry.score;
                }
            }
            tt_entry = Some(entry);
        }

        if depth <= 0 {
            return self.qsearch(alpha, beta, ply);
        }

        self.count_node();
        if ply as u32 > self.seldepth {
            self.seldepth = ply as u32;
        }

        let in_check = self.board.is_in_check(self.board.side_to_move());

        // Internal iterative deepening: a PV-ish node with no table move
        // searches shallower first purely to seed move ordering.
        let iid_depth = if is_pv { 6 } else { 8 };
        if tt_move.is_none() && depth >= iid_depth && !excluded_active {
            self.search(depth - 2, alpha, beta, ply, is_pv, allow_null);
            if let Some(entry) = self.tt.probe(key, ply) {
                tt_move = entry.best_move;
                tt_entry = Some(entry);
            }
        }

        // Check extension for every child of this node.
        let base_extension =
            i32::from(in_check && depth < CHECK_EXT_MAX_DEPTH && ply < MAX_PLY / 2);

        let eval_result = self
            .state
            .eval_cache
            .probe_or_eval(self.board, self.evaluator);
        let static_eval = if in_check {
            -SCORE_INFINITE
        } else {
            eval_result.score
        };
        let phase = eval_result.phase;
        self.state.ply_info[ply].static_eval = static_eval;

        // ====================================================================
        // Node-level pruning
        // ====================================================================

        if !is_pv && !in_check && !excluded_active {
            if let Some(score) = self.reverse_futility(depth, beta, static_eval) {
                return score;
            }
            if let Some(score) = self.razor(depth, alpha, static_eval, ply) {
                return score;
            }
            if depth >= PROBCUT_MIN_DEPTH {
                if let Some(score) = self.probcut(depth, beta, ply) {
                    return score;
                }
            }
            if allow_null
                && depth >= NULL_MIN_DEPTH
                && static_eval >= beta
                && self.board.non_pawn_material_count(self.board.side_to_move()) >= 2
            {
                if let Some(score) = self.null_move(depth, beta, static_eval, phase, ply) {
                    return score;
                }
            }
        }

        // ====================================================================
        // Singular extension probe
        // ====================================================================

        let mut singular_extension = 0i32;
        if !excluded_active && depth >= SINGULAR_MIN_DEPTH && !tt_move.is_none() {
            if let Some(entry) = tt_entry {
                if matches!(entry.bound, Bound::Lower | Bound::Exact)
                    && entry.depth >= depth - 3
                    && entry.score.abs() < MATE_BOUND
                {
                    let singular_beta = entry.score - 2 * depth;
                    self.state.ply_info[ply].excluded = tt_move;
                    let score =
                        self.search(depth - 3, singular_beta - 1, singular_beta, ply, false, false);
                    self.state.ply_info[ply].excluded = MOVE_NONE;
                    if score < singular_beta {
                        singular_extension = 1;
                    }
                }
            }
        }

        // ====================================================================
        // Move loop
        // ====================================================================

        let us = self.board.side_to_move();
        let context = self.picker_context(ply);
        let killers = self.state.history.killers.get(ply);
        let counter = match context.prev {
            Some((piece, to)) => self.state.history.counter.get(piece, to),
            None => MOVE_NONE,
        };

        let original_alpha = alpha;
        let mut best_score = -SCORE_INFINITE;
        let mut best_move = MOVE_NONE;
        let mut legal_moves = 0usize;

        let mut quiets_tried: [Move; 64] = [MOVE_NONE; 64];
        let mut quiets_count = 0usize;
        let mut captures_tried: [Move; 32] = [MOVE_NONE; 32];
        let mut captures_count = 0usize;

        let mut picker = MovePicker::new(tt_move, killers, counter, context);
        while let Some(mv) = picker.next(self.board, &self.state.history) {
            if mv == excluded {
                continue;
            }

            let is_quiet = mv.is_quiet();
            let moved_piece = self.board.piece_on(mv.from());

            // --------------------------------------------------------------
            // Move-loop pruning (needs one legal move banked already)
            // --------------------------------------------------------------
            if legal_moves > 0 && !is_pv && !in_check && best_score > -MATE_BOUND {
                // Futility: the static eval plus a depth margin cannot reach
                // alpha, so a quiet move will not either.
                if is_quiet
                    && depth <= FUTILITY_MAX_DEPTH
                    && static_eval + futility_margin(depth, phase) <= alpha
                {
                    continue;
                }
                // Late move pruning.
                if is_quiet && depth <= LMP_MAX_DEPTH && legal_moves > (3 + 2 * depth * depth) as usize
                {
                    continue;
                }
                // SEE pruning of quiets that hang material.
                if is_quiet
                    && depth <= SEE_PRUNE_MAX_DEPTH
                    && self.board.see(mv) < -SEE_PRUNE_MARGIN * depth
                {
                    continue;
                }
            }

            let Some(undo) = self.board.make_move(mv) else {
                continue;
            };
            if self.board.is_in_check(us) {
                self.board.unmake_move(undo);
                continue;
            }
            legal_moves += 1;
            self.tt.prefetch(self.board.zobrist());

            let gives_check = self.board.is_in_check(self.board.side_to_move());

            // --------------------------------------------------------------
            // Extensions
            // --------------------------------------------------------------
            let mut extension = base_extension;
            if mv == tt_move && singular_extension > 0 {
                extension += singular_extension;
            }
            if let Some((_, prev_to)) = context.prev {
                let prev_was_capture = self.state.ply_info[ply - 1].last_move.is_capture();
                if mv.is_capture()
                    && prev_was_capture
                    && mv.to().index() == prev_to
                    && depth < RECAPTURE_EXT_MAX_DEPTH
                {
                    extension += 1;
                }
            }
            if moved_piece == Some(Piece::Pawn) {
                let push_rank = if us.is_white() { 6 } else { 1 };
                if mv.to().rank() == push_rank {
                    extension += 1;
                }
            }
            let extension = extension.min(2);

            self.state.ply_info[ply].last_move = mv;
            self.state.ply_info[ply].moved_piece = moved_piece;
            self.push_repetition(self.board.zobrist());

            let new_depth = depth - 1 + extension;
            let mut score;

            if legal_moves == 1 {
                score = -self.search(new_depth, -beta, -alpha, ply + 1, is_pv, true);
            } else {
                let adjustments = LmrAdjustments {
                    is_pv,
                    is_capture: mv.is_capture(),
                    gives_check,
                    history: self
                        .state
                        .history
                        .butterfly
                        .get(us, moved_piece.unwrap_or(Piece::Pawn), mv),
                    continuation: match context.prev {
                        Some((piece, to)) => self.state.history.continuation.get(
                            piece,
                            to,
                            moved_piece.unwrap_or(Piece::Pawn),
                            mv,
                        ),
                        None => 0,
                    },
                };
                let red = if in_check {
                    0
                } else {
                    lmr::reduction(depth, legal_moves, adjustments)
                };

                score = -self.search(new_depth - red, -alpha - 1, -alpha, ply + 1, false, true);
                if score > alpha && red > 0 {
                    score = -self.search(new_depth, -alpha - 1, -alpha, ply + 1, false, true);
                }
                if is_pv && score > alpha && score < beta {
                    score = -self.search(new_depth, -beta, -alpha, ply + 1, true, true);
                }
            }

            self.pop_repetition();
            self.board.unmake_move(undo);

            if self.should_stop() {
                return best_score.max(-SCORE_INFINITE);
            }

            if is_quiet && quiets_count < quiets_tried.len() {
                quiets_tried[quiets_count] = mv;
                quiets_count += 1;
            } else if mv.is_capture() && captures_count < captures_tried.len() {
                captures_tried[captures_count] = mv;
                captures_count += 1;
            }

            if score > best_score {
                best_score = score;
                best_move = mv;
                if score > alpha {
                    alpha = score;
                    if alpha >= beta {
                        self.update_cutoff_histories(
                            mv,
                            ply,
                            depth,
                            &quiets_tried[..quiets_count],
                            &captures_tried[..captures_count],
                        );
                        break;
                    }
                }
            }
        }

        // ====================================================================
        // Post-loop
        // ====================================================================

        if legal_moves == 0 {
            if excluded_active {
                // The excluded move was the only option: fail low.
                return alpha;
            }
            return if in_check {
                -SCORE_MATE + ply as i32
            } else {
                self.draw_score()
            };
        }

        if !self.should_stop() && !excluded_active {
            let bound = if best_score >= beta {
                Bound::Lower
            } else if best_score <= original_alpha {
                Bound::Upper
            } else {
                Bound::Exact
            };
            self.tt.store(key, best_score, best_move, depth, bound, ply);
        }

        best_score
    }

    /// Previous-move context used for ordering and continuation histories.
    pub(crate) fn picker_context(&self, ply: usize) -> PickerContext {
        let prev = if ply >= 1 {
            let info = &self.state.ply_info[ply - 1];
            info.moved_piece
                .map(|piece| (piece, info.last_move.to().index()))
        } else {
            None
        };
        let prev2 = if ply >= 2 {
            let info = &self.state.ply_info[ply - 2];
            info.moved_piece
                .map(|piece| (piece, info.last_move.to().index()))
        } else {
            None
        };
        let opp_last_to = if ply >= 1 {
            let last = self.state.ply_info[ply - 1].last_move;
            (!last.is_none()).then(|| last.to())
        } else {
            None
        };
        PickerContext {
            prev,
            prev2,
            opp_last_to,
        }
    }

    /// Beta-cutoff bookkeeping: reward the cutoff move, punish the moves
    /// tried before it with a bonus of equal magnitude.
    pub(crate) fn update_cutoff_histories(
        &mut self,
        mv: Move,
        ply: usize,
        depth: i32,
        earlier_quiets: &[Move],
        earlier_captures: &[Move],
    ) {
        let us = self.board.side_to_move();
        let bonus = history_bonus(depth);
        let context = self.picker_context(ply);

        if mv.is_quiet() {
            self.state.history.killers.update(ply, mv);
            let piece = self.board.piece_on(mv.from()).unwrap_or(Piece::Pawn);
            self.state.history.butterfly.update(us, piece, mv, bonus);
            if let Some((prev_piece, prev_to)) = context.prev {
                self.state.history.counter.set(prev_piece, prev_to, mv);
                self.state
                    .history
                    .continuation
                    .update(prev_piece, prev_to, piece, mv, bonus);
            }
            if let Some((prev_piece, prev_to)) = context.prev2 {
                self.state
                    .history
                    .followup
                    .update(prev_piece, prev_to, piece, mv, bonus);
            }
        } else if mv.is_capture() {
            let attacker = self.board.piece_on(mv.from()).unwrap_or(Piece::Pawn);
            let victim = self.board.piece_on(mv.to()).unwrap_or(Piece::Pawn);
            self.state.history.capture.update(attacker, mv, victim, bonus);
        }

        // Maluses for everything that failed to cut.
        for &quiet in earlier_quiets {
            if quiet == mv {
                continue;
            }
            let piece = self.board.piece_on(quiet.from()).unwrap_or(Piece::Pawn);
            self.state.history.butterfly.update(us, piece, quiet, -bonus);
            if let Some((prev_piece, prev_to)) = context.prev {
                self.state
                    .history
                    .continuation
                    .update(prev_piece, prev_to, piece, quiet, -bonus);
            }
            if let Some((prev_piece, prev_to)) = context.prev2 {
                self.state
                    .history
                    .followup
                    .update(prev_piece, prev_to, piece, quiet, -bonus);
            }
        }
        for &capture in earlier_captures {
            if capture == mv {
                continue;
            }
            let attacker = self.board.piece_on(capture.from()).unwrap_or(Piece::Pawn);
            let victim = self.board.piece_on(capture.to()).unwrap_or(Piece::Pawn);
            self.state
                .history
                .capture
                .update(attacker, capture, victim, -bonus);
        }
    }
}
