//! Search: iterative-deepening alpha-beta with a transposition table.
//!
//! Layout mirrors the phases of the algorithm:
//! - `alphabeta`: the node loop with its pruning and extensions
//! - `quiescence`: tactical-only leaf search
//! - `pruning`: node-level pruning helpers (RFP, razoring, ProbCut, null move)
//! - `lmr`: the late-move-reduction table and adjustments
//! - `picker`: staged move ordering
//! - `history`: the ordering tables and their gravity updates
//! - `aspiration`: window sizing around the previous iteration's score
//! - `iterative`: the root loop, MultiPV, and info reporting
//! - `smp`: the lazy-SMP worker pool

mod alphabeta;
pub mod aspiration;
pub mod constants;
pub mod history;
mod iterative;
mod lmr;
pub mod picker;
mod pruning;
mod quiescence;
pub mod smp;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::board::{Board, Color, Move, Piece, MAX_PLY, MOVE_NONE};
use crate::eval::{EvalCache, Evaluator};
use crate::tb::Tablebases;
use crate::time::SearchClock;
use crate::tt::TranspositionTable;

use aspiration::AspirationState;
use history::HistoryTables;

pub use iterative::{search_root, SearchInfo, SearchResult};

/// Callback for per-iteration `info` reporting.
pub type InfoCallback = Arc<dyn Fn(&SearchInfo) + Send + Sync>;

/// Per-`go` limits.
#[derive(Clone)]
pub struct SearchLimits {
    pub depth: Option<i32>,
    pub nodes: Option<u64>,
    /// Shared deadline clock. The protocol thread may re-arm it while the
    /// search runs (`ponderhit`), so it is consulted live, never copied.
    pub clock: Arc<SearchClock>,
    pub infinite: bool,
    /// Root move restriction (`go searchmoves`); empty means all moves.
    pub searchmoves: Vec<Move>,
    pub multipv: u32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits {
            depth: None,
            nodes: None,
            clock: Arc::new(SearchClock::infinite()),
            infinite: false,
            searchmoves: Vec::new(),
            multipv: 1,
        }
    }
}

impl SearchLimits {
    #[must_use]
    pub fn depth(depth: i32) -> Self {
        SearchLimits {
            depth: Some(depth),
            ..Default::default()
        }
    }
}

/// Per-ply bookkeeping the search threads through the tree.
#[derive(Clone, Copy)]
pub(crate) struct PlyInfo {
    pub last_move: Move,
    pub moved_piece: Option<Piece>,
    pub excluded: Move,
    pub static_eval: i32,
}

impl Default for PlyInfo {
    fn default() -> Self {
        PlyInfo {
            last_move: MOVE_NONE,
            moved_piece: None,
            excluded: MOVE_NONE,
            static_eval: 0,
        }
    }
}

/// Thread-local search state. Histories persist across searches within a
/// game; the repetition stack is reseeded from the game history per `go`.
pub struct SearchState {
    pub history: HistoryTables,
    pub eval_cache: EvalCache,
    pub aspiration: AspirationState,
    /// Zobrist keys from game start through the current search path. The
    /// last entry is always the present position.
    pub repetition: Vec<u64>,
    pub(crate) ply_info: [PlyInfo; MAX_PLY],
    /// Signed centipawn contempt from the UCI option, before dynamic scaling.
    pub contempt: i32,
}

impl SearchState {
    #[must_use]
    pub fn new() -> Self {
        SearchState {
            history: HistoryTables::new(),
            eval_cache: EvalCache::new(),
            aspiration: AspirationState::new(),
            repetition: Vec::with_capacity(256),
            ply_info: [PlyInfo::default(); MAX_PLY],
            contempt: 0,
        }
    }

    /// Reset everything that must not leak across games.
    pub fn new_game(&mut self) {
        self.history.clear();
        self.eval_cache.clear();
        self.aspiration = AspirationState::new();
        self.repetition.clear();
    }

    /// Seed the repetition stack with the game history (keys in order,
    /// ending with the root position).
    pub fn set_game_history(&mut self, keys: &[u64]) {
        self.repetition.clear();
        self.repetition.extend_from_slice(keys);
    }
}

impl Default for SearchState {
    fn default() -> Self {
        SearchState::new()
    }
}

/// Borrowed environment for one search call on one thread.
pub struct SearchContext<'a> {
    pub board: &'a mut Board,
    pub state: &'a mut SearchState,
    pub tt: &'a TranspositionTable,
    pub evaluator: &'a dyn Evaluator,
    pub tb: &'a dyn Tablebases,
    pub stop: &'a AtomicBool,
    /// Fleet-wide node counter, for `info nodes`/`nps`.
    pub global_nodes: &'a AtomicU64,
    pub limits: &'a SearchLimits,
    pub start: Instant,
    /// Whether this thread owns time polling (main thread only).
    pub is_main: bool,

    pub(crate) nodes: u64,
    pub(crate) seldepth: u32,
    pub(crate) tb_hits: u64,
    pub(crate) root_side: Color,
    /// Contempt after dynamic scaling, fixed at the root of each search.
    pub(crate) effective_contempt: i32,
    /// Root game phase, for time- and margin-scaling.
    pub(crate) root_phase: i32,
}

impl<'a> SearchContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        board: &'a mut Board,
        state: &'a mut SearchState,
        tt: &'a TranspositionTable,
        evaluator: &'a dyn Evaluator,
        tb: &'a dyn Tablebases,
        stop: &'a AtomicBool,
        global_nodes: &'a AtomicU64,
        limits: &'a SearchLimits,
        is_main: bool,
    ) -> Self {
        let root_side = board.side_to_move();
        let root_eval = evaluator.evaluate(board);
        let effective_contempt = scale_contempt(state.contempt, root_eval.score, root_eval.phase);
        SearchContext {
            board,
            state,
            tt,
            evaluator,
            tb,
            stop,
            global_nodes,
            limits,
            start: Instant::now(),
            is_main,
            nodes: 0,
            seldepth: 0,
            tb_hits: 0,
            root_side,
            effective_contempt,
            root_phase: root_eval.phase,
        }
    }

    /// Count a node, mirror it into the shared counter, and poll the clock
    /// at the configured cadence.
    #[inline]
    pub(crate) fn count_node(&mut self) {
        self.nodes += 1;
        self.global_nodes.fetch_add(1, Ordering::Relaxed);
        if self.nodes & (constants::NODES_PER_TIME_CHECK - 1) == 0 {
            self.poll_limits();
        }
    }

    fn poll_limits(&mut self) {
        if let Some(max_nodes) = self.limits.nodes {
            if self.global_nodes.load(Ordering::Relaxed) >= max_nodes {
                self.stop.store(true, Ordering::Relaxed);
                return;
            }
        }
        // Only the main thread owns time; the clock may have been armed
        // mid-search by a ponderhit.
        if self.is_main && self.limits.clock.past_hard() {
            self.stop.store(true, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Draw score with contempt: the engine's own side dislikes draws by
    /// `contempt` centipawns, the opponent's side likes them as much.
    #[inline]
    pub(crate) fn draw_score(&self) -> i32 {
        if self.board.side_to_move() == self.root_side {
            -self.effective_contempt
        } else {
            self.effective_contempt
        }
    }

    /// Has the current position occurred earlier on the game + search path?
    #[must_use]
    pub(crate) fn is_repetition(&self) -> bool {
        let key = self.board.zobrist();
        let stack = &self.state.repetition;
        if stack.len() < 2 {
            return false;
        }
        // Only positions since the last irreversible move can repeat.
        let lookback = (self.board.halfmove_clock() as usize + 1).min(stack.len() - 1);
        stack[stack.len() - 1 - lookback..stack.len() - 1]
            .iter()
            .any(|&k| k == key)
    }

    #[inline]
    pub(crate) fn push_repetition(&mut self, key: u64) {
        self.state.repetition.push(key);
    }

    #[inline]
    pub(crate) fn pop_repetition(&mut self) {
        self.state.repetition.pop();
    }
}

/// Dynamic contempt: scaled up when ahead, down when behind, stretched in
/// endgames, clamped to `[-50, 100]`.
fn scale_contempt(base: i32, root_score: i32, phase: i32) -> i32 {
    let mut contempt = base;
    if root_score > 200 {
        contempt = contempt * 3 / 2;
    } else if root_score < -200 {
        contempt /= 2;
    }
    if phase < 64 {
        contempt = contempt * 4 / 3;
    }
    contempt.clamp(-50, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_contempt_clamps() {
        assert_eq!(scale_contempt(100, 500, 128), 100);
        assert_eq!(scale_contempt(-100, 0, 128), -50);
        assert_eq!(scale_contempt(0, 0, 128), 0);
    }

    #[test]
    fn test_scale_contempt_ahead_behind() {
        assert_eq!(scale_contempt(20, 500, 128), 30);
        assert_eq!(scale_contempt(20, -500, 128), 10);
        assert_eq!(scale_contempt(30, 0, 32), 40);
    }

    #[test]
    fn test_state_game_history() {
        let mut state = SearchState::new();
        state.set_game_history(&[1, 2, 3]);
        assert_eq!(state.repetition, vec![1, 2, 3]);
        state.new_game();
        assert!(state.repetition.is_empty());
    }
}
