//! Universal Chess Interface front end.
//!
//! Line-oriented protocol on stdin/stdout. Searches run on their own thread
//! so the loop stays responsive to `stop`; all engine-side diagnostics go to
//! the log facade, never to stdout.

pub mod options;
pub mod report;

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::board::{Board, CastleSide, Move, MoveParseError, Piece, Square};
use crate::eval::{Evaluator, MaterialEvaluator};
use crate::search::smp::{smp_search, ThreadPool};
use crate::search::{InfoCallback, SearchLimits, SearchState};
use crate::tb::{NoTablebases, Tablebases};
use crate::time::{allocate, SearchClock, TimeAllocation, TimeConfig, TimeControl};
use crate::tt::TranspositionTable;

use options::{OptionAction, UciOptions};

/// Stack size for the thread driving the main search.
const SEARCH_STACK_SIZE: usize = 32 * 1024 * 1024;

/// Parse a coordinate-notation move against the current position.
///
/// Accepts standard castling notation (`e1g1`) with the translation to the
/// internal king-takes-rook encoding, and rook-square castling directly when
/// `chess960` is on (or whenever it matches a legal castling move).
pub fn parse_uci_move(board: &Board, token: &str, chess960: bool) -> Result<Move, MoveParseError> {
    let bytes = token.as_bytes();
    if !token.is_ascii() || bytes.len() < 4 || bytes.len() > 5 {
        return Err(MoveParseError::BadSyntax {
            token: token.to_string(),
        });
    }
    let from: Square = token[0..2].parse().map_err(|_| MoveParseError::BadSyntax {
        token: token.to_string(),
    })?;
    let to: Square = token[2..4].parse().map_err(|_| MoveParseError::BadSyntax {
        token: token.to_string(),
    })?;
    let promotion = match bytes.get(4) {
        None => None,
        Some(&c) => match Piece::from_char(c as char) {
            Some(p @ (Piece::Knight | Piece::Bishop | Piece::Rook | Piece::Queen)) => Some(p),
            _ => {
                return Err(MoveParseError::BadSyntax {
                    token: token.to_string(),
                })
            }
        },
    };

    for &mv in &board.generate_moves() {
        if mv.is_castling() {
            if mv.from() != from || promotion.is_some() {
                continue;
            }
            // Rook-square form (Chess960 and king-takes-rook GUIs).
            if mv.to() == to {
                return Ok(mv);
            }
            // King-destination form used by standard GUIs.
            if !chess960 {
                let side = if mv.to().file() > mv.from().file() {
                    CastleSide::King
                } else {
                    CastleSide::Queen
                };
                let king_target = Square::new(mv.from().rank(), side.king_target_file());
                if to == king_target {
                    return Ok(mv);
                }
            }
        } else if mv.from() == from && mv.to() == to && mv.promotion() == promotion {
            return Ok(mv);
        }
    }

    Err(MoveParseError::Illegal {
        token: token.to_string(),
    })
}

/// The engine: position, shared tables, worker pool, and the option set.
pub struct Engine {
    board: Board,
    /// Zobrist keys from game start through the current position.
    game_history: Vec<u64>,
    options: UciOptions,
    tt: Arc<TranspositionTable>,
    pool: Arc<ThreadPool>,
    state: Arc<Mutex<SearchState>>,
    evaluator: Arc<dyn Evaluator>,
    tb: Arc<dyn Tablebases>,
    stop: Arc<AtomicBool>,
    search_thread: Option<JoinHandle<()>>,
    /// Deadline clock of the running (or last) search.
    search_clock: Arc<SearchClock>,
    /// Budget computed at `go ponder` time, armed on `ponderhit`.
    pending_allocation: Option<TimeAllocation>,
    /// Score of the last completed search, feeding time management.
    previous_score: Arc<Mutex<i32>>,
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        crate::board::attack_tables::init();
        let options = UciOptions::default();
        let board = Board::startpos();
        let game_history = vec![board.zobrist()];
        Engine {
            board,
            game_history,
            tt: Arc::new(TranspositionTable::new(options.hash_mb)),
            pool: Arc::new(ThreadPool::new(options.threads)),
            state: Arc::new(Mutex::new(SearchState::new())),
            evaluator: Arc::new(MaterialEvaluator),
            tb: Arc::new(NoTablebases),
            stop: Arc::new(AtomicBool::new(false)),
            search_thread: None,
            search_clock: Arc::new(SearchClock::infinite()),
            pending_allocation: None,
            previous_score: Arc::new(Mutex::new(0)),
            options,
        }
    }

    /// Block until any running search has printed its bestmove.
    fn join_search(&mut self) {
        if let Some(handle) = self.search_thread.take() {
            let _ = handle.join();
        }
    }

    fn stop_search(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.join_search();
        self.pending_allocation = None;
    }

    fn handle_setoption(&mut self, name: &str, value: Option<&str>) {
        match self.options.apply(name, value) {
            Some(OptionAction::ResizeHash(mb)) => {
                self.stop_search();
                self.tt = Arc::new(TranspositionTable::new(mb));
                log::info!("hash resized to {mb} MB");
            }
            Some(OptionAction::SetThreads(threads)) => {
                self.stop_search();
                self.pool = Arc::new(ThreadPool::new(threads));
                log::info!("thread count set to {threads}");
            }
            None => {}
        }
    }

    /// Transition from pondering to a real search: arm the planned budget
    /// from this instant and let the running search keep going on it.
    fn handle_ponderhit(&mut self) {
        if let Some(allocation) = self.pending_allocation.take() {
            self.search_clock.arm(Some(allocation));
        }
    }

    fn handle_ucinewgame(&mut self) {
        self.stop_search();
        self.tt.clear();
        self.state.lock().new_game();
        self.board = Board::startpos();
        self.game_history = vec![self.board.zobrist()];
        *self.previous_score.lock() = 0;
    }

    /// `position [fen <FEN> | startpos] [moves ...]`. A bad FEN leaves the
    /// previous position untouched; an illegal move drops itself and the
    /// rest of the batch.
    fn handle_position(&mut self, parts: &[&str]) {
        let mut i = 0;
        let mut board = if parts.first() == Some(&"startpos") {
            i += 1;
            Board::startpos()
        } else if parts.first() == Some(&"fen") {
            let end = parts
                .iter()
                .position(|&p| p == "moves")
                .unwrap_or(parts.len());
            if end < 7 {
                println!("info string error: incomplete FEN in position command");
                return;
            }
            let fen = parts[1..end].join(" ");
            i = end;
            match Board::from_fen(&fen) {
                Ok(board) => board,
                Err(e) => {
                    println!("info string error: {e}");
                    return;
                }
            }
        } else {
            println!("info string error: position needs 'startpos' or 'fen'");
            return;
        };

        let mut history = vec![board.zobrist()];
        if parts.get(i) == Some(&"moves") {
            for token in &parts[i + 1..] {
                match parse_uci_move(&board, token, self.options.chess960) {
                    Ok(mv) => {
                        if board.make_move(mv).is_none() {
                            println!("info string error: move {token} could not be applied");
                            break;
                        }
                        history.push(board.zobrist());
                    }
                    Err(e) => {
                        println!("info string error: {e}");
                        break;
                    }
                }
            }
        }

        self.board = board;
        self.game_history = history;
    }

    #[allow(clippy::too_many_lines)]
    fn handle_go(&mut self, parts: &[&str]) {
        self.stop_search();
        self.stop.store(false, Ordering::Relaxed);

        let mut depth = None;
        let mut nodes = None;
        let mut movetime = None;
        let mut wtime = None;
        let mut btime = None;
        let mut winc = 0u64;
        let mut binc = 0u64;
        let mut movestogo = None;
        let mut infinite = false;
        let mut ponder = false;
        let mut searchmoves = Vec::new();

        let mut i = 0;
        while i < parts.len() {
            match parts[i] {
                "depth" => {
                    depth = parts.get(i + 1).and_then(|v| v.parse::<i32>().ok());
                    i += 2;
                }
                "nodes" => {
                    nodes = parts.get(i + 1).and_then(|v| v.parse::<u64>().ok());
                    i += 2;
                }
                "movetime" => {
                    movetime = parts.get(i + 1).and_then(|v| v.parse::<u64>().ok());
                    i += 2;
                }
                "wtime" => {
                    wtime = parts.get(i + 1).and_then(|v| v.parse::<u64>().ok());
                    i += 2;
                }
                "btime" => {
                    btime = parts.get(i + 1).and_then(|v| v.parse::<u64>().ok());
                    i += 2;
                }
                "winc" => {
                    winc = parts
                        .get(i + 1)
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(0);
                    i += 2;
                }
                "binc" => {
                    binc = parts
                        .get(i + 1)
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(0);
                    i += 2;
                }
                "movestogo" => {
                    movestogo = parts.get(i + 1).and_then(|v| v.parse::<u64>().ok());
                    i += 2;
                }
                "infinite" => {
                    infinite = true;
                    i += 1;
                }
                "ponder" => {
                    ponder = true;
                    i += 1;
                }
                "searchmoves" => {
                    i += 1;
                    while i < parts.len() {
                        match parse_uci_move(&self.board, parts[i], self.options.chess960) {
                            Ok(mv) => searchmoves.push(mv),
                            Err(_) => break,
                        }
                        i += 1;
                    }
                }
                _ => i += 1,
            }
        }

        let control = if infinite {
            TimeControl::Infinite
        } else if let Some(ms) = movetime {
            TimeControl::MoveTime { time_ms: ms }
        } else {
            let (remaining, increment) = if self.board.side_to_move().is_white() {
                (wtime, winc)
            } else {
                (btime, binc)
            };
            match remaining {
                Some(remaining_ms) => TimeControl::Incremental {
                    remaining_ms,
                    increment_ms: increment,
                    moves_to_go: movestogo,
                },
                None => TimeControl::Infinite,
            }
        };

        let config = TimeConfig {
            move_overhead_ms: self.options.move_overhead_ms,
        };
        let phase = self.evaluator.evaluate(&self.board).phase;
        let allocation = allocate(control, &config, *self.previous_score.lock(), phase);

        // A pondering search runs without deadlines; the planned budget is
        // held back and armed when the ponderhit arrives.
        let clock = Arc::new(SearchClock::infinite());
        if ponder {
            self.pending_allocation = allocation;
        } else {
            clock.arm(allocation);
            self.pending_allocation = None;
        }
        self.search_clock = Arc::clone(&clock);

        let limits = SearchLimits {
            depth,
            nodes,
            clock,
            infinite,
            searchmoves,
            multipv: self.options.multipv,
        };

        // Hand everything the search needs to its own thread.
        let mut board = self.board.clone();
        let game_history = self.game_history.clone();
        let tt = Arc::clone(&self.tt);
        let pool = Arc::clone(&self.pool);
        let state = Arc::clone(&self.state);
        let evaluator = Arc::clone(&self.evaluator);
        let tb = Arc::clone(&self.tb);
        let stop = Arc::clone(&self.stop);
        let previous_score = Arc::clone(&self.previous_score);
        let chess960 = self.options.chess960;
        let show_wdl = self.options.show_wdl;
        let contempt = self.options.contempt;

        let callback: InfoCallback = Arc::new(move |info| {
            println!("{}", report::format_info(info, chess960, show_wdl));
        });

        let handle = std::thread::Builder::new()
            .name("search-main".to_string())
            .stack_size(SEARCH_STACK_SIZE)
            .spawn(move || {
                let mut state = state.lock();
                state.contempt = contempt;
                let result = smp_search(
                    &pool,
                    &mut board,
                    &mut state,
                    &tt,
                    &evaluator,
                    &tb,
                    &stop,
                    &limits,
                    &game_history,
                    Some(callback),
                );
                *previous_score.lock() = result.score;
                println!(
                    "{}",
                    report::format_bestmove(result.best_move, result.ponder, chess960)
                );
            })
            .expect("failed to spawn search thread");
        self.search_thread = Some(handle);
    }

    /// Drive the protocol until `quit`.
    pub fn run(&mut self) {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let parts: Vec<&str> = line.split_whitespace().collect();
            let Some(&command) = parts.first() else {
                continue;
            };

            match command {
                "uci" => self.options.print(),
                "isready" => println!("readyok"),
                "setoption" => {
                    // setoption name <name...> [value <value...>]
                    let rest = &parts[1..];
                    let name_start = rest.iter().position(|&p| p == "name").map(|p| p + 1);
                    let value_pos = rest.iter().position(|&p| p == "value");
                    if let Some(start) = name_start {
                        let name_end = value_pos.unwrap_or(rest.len());
                        let name = rest[start..name_end].join(" ");
                        let value = value_pos.map(|p| rest[p + 1..].join(" "));
                        self.handle_setoption(&name, value.as_deref());
                    }
                }
                "ucinewgame" => self.handle_ucinewgame(),
                "position" => {
                    self.join_search();
                    self.handle_position(&parts[1..]);
                }
                "go" => self.handle_go(&parts[1..]),
                "stop" => self.stop_search(),
                "ponderhit" => self.handle_ponderhit(),
                "quit" => {
                    self.stop_search();
                    break;
                }
                _ => log::debug!("ignoring unknown command '{line}'"),
            }
        }
        // Give any in-flight output a moment to flush on abrupt EOF.
        std::thread::sleep(Duration::from_millis(1));
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

/// Entry point used by the binary.
pub fn run_uci_loop() {
    let mut engine = Engine::new();
    engine.run();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_move() {
        let board = Board::startpos();
        let mv = parse_uci_move(&board, "e2e4", false).unwrap();
        assert_eq!(mv.from(), "e2".parse().unwrap());
        assert_eq!(mv.to(), "e4".parse().unwrap());
    }

    #[test]
    fn test_parse_promotion_move() {
        let board: Board = "8/4P3/8/8/8/8/2k5/K7 w - - 0 1".parse().unwrap();
        let mv = parse_uci_move(&board, "e7e8q", false).unwrap();
        assert_eq!(mv.promotion(), Some(Piece::Queen));
        assert!(parse_uci_move(&board, "e7e8x", false).is_err());
    }

    #[test]
    fn test_parse_rejects_illegal() {
        let board = Board::startpos();
        assert!(matches!(
            parse_uci_move(&board, "e2e5", false),
            Err(MoveParseError::Illegal { .. })
        ));
        assert!(matches!(
            parse_uci_move(&board, "zz9", false),
            Err(MoveParseError::BadSyntax { .. })
        ));
    }

    #[test]
    fn test_parse_standard_castling() {
        let board: Board = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1".parse().unwrap();
        let mv = parse_uci_move(&board, "e1g1", false).unwrap();
        assert!(mv.is_castling());
        assert_eq!(mv.to(), "h1".parse().unwrap());

        let mv = parse_uci_move(&board, "e1c1", false).unwrap();
        assert!(mv.is_castling());
        assert_eq!(mv.to(), "a1".parse().unwrap());
    }

    #[test]
    fn test_parse_rook_square_castling() {
        let board: Board = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1".parse().unwrap();
        // King-takes-rook form is accepted in both modes.
        let mv = parse_uci_move(&board, "e1h1", true).unwrap();
        assert!(mv.is_castling());
        let mv = parse_uci_move(&board, "e1h1", false).unwrap();
        assert!(mv.is_castling());
    }
}
