//! Node-level pruning: reverse futility, razoring, ProbCut, and null move.
//!
//! Every helper here runs only in non-PV nodes with the side to move not in
//! check; the caller enforces those gates.

use super::constants::{
    MATE_BOUND, NULL_VERIFY_DEPTH, PROBCUT_MARGIN, RAZOR_BASE, RAZOR_MAX_DEPTH, RAZOR_PER_DEPTH,
    RFP_MARGIN, RFP_MAX_DEPTH,
};
use super::SearchContext;
use crate::board::{GenKind, MoveList};

impl SearchContext<'_> {
    /// Reverse futility: a static eval comfortably above beta at shallow
    /// depth fails high without a move loop.
    pub(crate) fn reverse_futility(&self, depth: i32, beta: i32, eval: i32) -> Option<i32> {
        if depth <= RFP_MAX_DEPTH && eval - RFP_MARGIN * depth >= beta && beta.abs() < MATE_BOUND {
            return Some(eval);
        }
        None
    }

    /// Razoring: hopeless static eval at shallow depth drops straight into
    /// quiescence; a confirming fail-low is returned as the node's score.
    pub(crate) fn razor(&mut self, depth: i32, alpha: i32, eval: i32, ply: usize) -> Option<i32> {
        if depth <= RAZOR_MAX_DEPTH && eval + RAZOR_BASE + RAZOR_PER_DEPTH * depth < alpha {
            let score = self.qsearch(alpha - 1, alpha, ply);
            if score <= alpha {
                return Some(score);
            }
        }
        None
    }

    /// Null move: hand the opponent a free tempo; if a reduced search still
    /// fails high, the real position is good enough to cut.
    pub(crate) fn null_move(
        &mut self,
        depth: i32,
        beta: i32,
        eval: i32,
        phase: i32,
        ply: usize,
    ) -> Option<i32> {
        let mut reduction = 3
            + depth / 6
            + i32::from(eval - beta > 200)
            + i32::from(eval - beta > 400)
            - i32::from(phase < 64);
        reduction = reduction.clamp(1, (depth - 2).max(1));

        let undo = self.board.make_null_move();
        let saved_info = self.state.ply_info[ply];
        self.state.ply_info[ply] = Default::default();
        self.push_repetition(self.board.zobrist());
        let score = -self.search(
            depth - reduction - 1,
            -beta,
            -beta + 1,
            ply + 1,
            false,
            false,
        );
        self.pop_repetition();
        self.state.ply_info[ply] = saved_info;
        self.board.unmake_null_move(undo);

        if self.should_stop() || score < beta {
            return None;
        }

        // Zugzwang insurance at depth: re-verify without the null move.
        if depth > NULL_VERIFY_DEPTH {
            let verified = self.search(depth - reduction - 1, beta - 1, beta, ply, false, false);
            if verified < beta {
                return None;
            }
        }
        Some(beta)
    }

    /// ProbCut: a good capture that beats `beta + margin` in a shallow
    /// verification search almost certainly beats beta at full depth.
    pub(crate) fn probcut(&mut self, depth: i32, beta: i32, ply: usize) -> Option<i32> {
        if beta.abs() >= MATE_BOUND {
            return None;
        }
        let probcut_beta = beta + PROBCUT_MARGIN;

        let mut captures = MoveList::new();
        self.board.generate_pseudo_legal(GenKind::Captures, &mut captures);

        for &mv in &captures {
            if self.board.see(mv) < 0 {
                continue;
            }
            let moved_piece = self.board.piece_on(mv.from());
            let Some(undo) = self.board.make_move(mv) else {
                continue;
            };
            if self.board.is_in_check(self.board.side_to_move().opponent()) {
                self.board.unmake_move(undo);
                continue;
            }
            self.state.ply_info[ply].last_move = mv;
            self.state.ply_info[ply].moved_piece = moved_piece;
            self.push_repetition(self.board.zobrist());

            // Cheap qualifier first, then the reduced confirmation search.
            let mut score = -self.qsearch(-probcut_beta, -probcut_beta + 1, ply + 1);
            if score >= probcut_beta {
                score = -self.search(
                    depth - 4,
                    -probcut_beta,
                    -probcut_beta + 1,
                    ply + 1,
                    false,
                    true,
                );
            }

            self.pop_repetition();
            self.board.unmake_move(undo);

            if self.should_stop() {
                return None;
            }
            if score >= probcut_beta {
                return Some(score);
            }
        }
        None
    }
}
