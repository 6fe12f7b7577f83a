//! Staged, lazy move ordering.
//!
//! Moves are generated in stages so that a cutoff from an early move never
//! pays for generating and scoring the rest:
//!
//! TT move -> good captures -> killers -> counter move -> quiets -> bad
//! captures. Quiescence mode stops after the good captures.
//!
//! No move is ever yielded twice: the table-driven stages are checked for
//! pseudo-legality, and the generated stages skip everything already
//! emitted.

use super::constants::HMAX;
use super::history::HistoryTables;
use crate::board::{Board, GenKind, Move, MoveList, Piece, Square, MOVE_NONE, SEE_VALUES};

/// Ordering-score tiers for captures.
const TIER_WINNING_CAPTURE: i32 = 30000;
const TIER_EQUAL_CAPTURE: i32 = 15000;

/// Bonus for a quiet move that lands on the opponent's last-move square.
const DEFENSIVE_BONUS: i32 = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    TtMove,
    GenerateCaptures,
    GoodCaptures,
    Killer1,
    Killer2,
    Counter,
    GenerateQuiets,
    Quiets,
    BadCaptures,
    Done,
}

/// Previous-move context for continuation/followup scoring.
#[derive(Clone, Copy, Debug, Default)]
pub struct PickerContext {
    /// Piece and target square of the move one ply back.
    pub prev: Option<(Piece, usize)>,
    /// Piece and target square of the move two plies back.
    pub prev2: Option<(Piece, usize)>,
    /// Target square of the opponent's last move.
    pub opp_last_to: Option<Square>,
}

/// Fixed-capacity scored list with incremental best-first selection.
struct ScoredList<const N: usize> {
    moves: [(Move, i32); N],
    len: usize,
    next: usize,
}

impl<const N: usize> ScoredList<N> {
    fn new() -> Self {
        ScoredList {
            moves: [(MOVE_NONE, 0); N],
            len: 0,
            next: 0,
        }
    }

    fn push(&mut self, mv: Move, score: i32) {
        debug_assert!(self.len < N);
        if self.len < N {
            self.moves[self.len] = (mv, score);
            self.len += 1;
        }
    }

    /// Selection sort one step: swap the best remaining entry forward.
    fn pick_best(&mut self) -> Option<Move> {
        if self.next >= self.len {
            return None;
        }
        let mut best = self.next;
        for i in (self.next + 1)..self.len {
            if self.moves[i].1 > self.moves[best].1 {
                best = i;
            }
        }
        self.moves.swap(self.next, best);
        let mv = self.moves[self.next].0;
        self.next += 1;
        Some(mv)
    }
}

/// The staged move picker.
pub struct MovePicker {
    stage: Stage,
    tt_move: Move,
    killers: [Move; 2],
    counter: Move,
    context: PickerContext,
    captures_only: bool,
    good_captures: ScoredList<64>,
    bad_captures: ScoredList<64>,
    quiets: ScoredList<256>,
}

impl MovePicker {
    /// Picker for a main-search node.
    #[must_use]
    pub fn new(tt_move: Move, killers: [Move; 2], counter: Move, context: PickerContext) -> Self {
        MovePicker {
            stage: Stage::TtMove,
            tt_move,
            killers,
            counter,
            context,
            captures_only: false,
            good_captures: ScoredList::new(),
            bad_captures: ScoredList::new(),
            quiets: ScoredList::new(),
        }
    }

    /// Picker for quiescence: TT move then good captures, nothing else.
    #[must_use]
    pub fn quiescence(tt_move: Move) -> Self {
        MovePicker {
            stage: Stage::TtMove,
            tt_move,
            killers: [MOVE_NONE; 2],
            counter: MOVE_NONE,
            context: PickerContext::default(),
            captures_only: true,
            good_captures: ScoredList::new(),
            bad_captures: ScoredList::new(),
            quiets: ScoredList::new(),
        }
    }

    /// Next candidate move, pseudo-legal. The caller still runs the final
    /// make-and-verify legality filter.
    pub fn next(&mut self, board: &Board, tables: &HistoryTables) -> Option<Move> {
        loop {
            match self.stage {
                Stage::TtMove => {
                    self.stage = Stage::GenerateCaptures;
                    let mv = self.tt_move;
                    if !mv.is_none() && board.is_pseudo_legal(mv) && board.is_legal(mv) {
                        return Some(mv);
                    }
                }

                Stage::GenerateCaptures => {
                    self.score_captures(board, tables);
                    self.stage = Stage::GoodCaptures;
                }

                Stage::GoodCaptures => {
                    if let Some(mv) = self.good_captures.pick_best() {
                        return Some(mv);
                    }
                    self.stage = if self.captures_only {
                        Stage::Done
                    } else {
                        Stage::Killer1
                    };
                }

                Stage::Killer1 => {
                    self.stage = Stage::Killer2;
                    let mv = self.killers[0];
                    if self.killer_is_playable(board, mv) {
                        return Some(mv);
                    }
                }

                Stage::Killer2 => {
                    self.stage = Stage::Counter;
                    let mv = self.killers[1];
                    if mv != self.killers[0] && self.killer_is_playable(board, mv) {
                        return Some(mv);
                    }
                }

                Stage::Counter => {
                    self.stage = Stage::GenerateQuiets;
                    let mv = self.counter;
                    if mv != self.killers[0]
                        && mv != self.killers[1]
                        && self.killer_is_playable(board, mv)
                    {
                        return Some(mv);
                    }
                }

                Stage::GenerateQuiets => {
                    self.score_quiets(board, tables);
                    self.stage = Stage::Quiets;
                }

                Stage::Quiets => {
                    if let Some(mv) = self.quiets.pick_best() {
                        return Some(mv);
                    }
                    self.stage = Stage::BadCaptures;
                }

                Stage::BadCaptures => {
                    if let Some(mv) = self.bad_captures.pick_best() {
                        return Some(mv);
                    }
                    self.stage = Stage::Done;
                }

                Stage::Done => return None,
            }
        }
    }

    /// Quiet table moves must be distinct from the TT move, non-capturing,
    /// and playable right now.
    fn killer_is_playable(&self, board: &Board, mv: Move) -> bool {
        !mv.is_none()
            && mv != self.tt_move
            && !mv.is_capture()
            && board.is_pseudo_legal(mv)
            && board.is_legal(mv)
    }

    fn score_captures(&mut self, board: &Board, tables: &HistoryTables) {
        let mut captures = MoveList::new();
        board.generate_pseudo_legal(GenKind::Captures, &mut captures);

        for &mv in &captures {
            if mv == self.tt_move {
                continue;
            }
            let attacker = board.piece_on(mv.from()).unwrap_or(Piece::Pawn);
            let victim = if board.en_passant_square() == Some(mv.to()) && attacker == Piece::Pawn {
                Piece::Pawn
            } else {
                board.piece_on(mv.to()).unwrap_or(Piece::Pawn)
            };

            let mvv_lva =
                10 * SEE_VALUES[victim.index()] - SEE_VALUES[attacker.index()] / 10;
            let hist = tables.capture.get(attacker, mv, victim) / 100;
            let see = board.see(mv);

            if see > 0 {
                self.good_captures
                    .push(mv, TIER_WINNING_CAPTURE + mvv_lva + hist);
            } else if see == 0 {
                self.good_captures
                    .push(mv, TIER_EQUAL_CAPTURE + mvv_lva + hist);
            } else {
                self.bad_captures.push(mv, mvv_lva + hist + see);
            }
        }
    }

    fn score_quiets(&mut self, board: &Board, tables: &HistoryTables) {
        let mut quiets = MoveList::new();
        board.generate_pseudo_legal(GenKind::Quiets, &mut quiets);
        let us = board.side_to_move();

        for &mv in &quiets {
            if mv == self.tt_move
                || mv == self.killers[0]
                || mv == self.killers[1]
                || mv == self.counter
            {
                continue;
            }
            let piece = board.piece_on(mv.from()).unwrap_or(Piece::Pawn);

            let mut score = tables.butterfly.get(us, piece, mv);
            if let Some((prev_piece, prev_to)) = self.context.prev {
                score += tables.continuation.get(prev_piece, prev_to, piece, mv) / 3;
            }
            if let Some((prev_piece, prev_to)) = self.context.prev2 {
                score += tables.followup.get(prev_piece, prev_to, piece, mv) / 3;
            }
            if self.context.opp_last_to == Some(mv.to()) {
                score += DEFENSIVE_BONUS;
            }
            // Keep quiets strictly below the capture tiers.
            self.quiets.push(mv, score.min(HMAX));
        }
    }
}
