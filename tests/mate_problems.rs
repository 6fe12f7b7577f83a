//! Mate problem suite driven by the JSON fixture in `tests/data/`.

use std::sync::atomic::{AtomicBool, AtomicU64};

use serde::Deserialize;

use sable::board::{Board, Move};
use sable::eval::MaterialEvaluator;
use sable::search::constants::SCORE_MATE;
use sable::search::{search_root, SearchLimits, SearchState};
use sable::tb::NoTablebases;
use sable::tt::TranspositionTable;

#[derive(Deserialize)]
struct ProblemSet {
    problems: Vec<Problem>,
}

#[derive(Deserialize)]
struct Problem {
    #[serde(rename = "type")]
    kind: String,
    fen: String,
    moves: String,
}

/// The fixture writes moves as `d1-d8`; coordinate notation drops the dash.
fn uci_from_problem_moves(moves: &str) -> String {
    moves.replace('-', "")
}

fn load_problems() -> ProblemSet {
    let data = include_str!("data/problems.json");
    serde_json::from_str(data).expect("invalid problems.json")
}

fn best_move_at_depth(fen: &str, depth: i32) -> (Option<Move>, i32) {
    let mut board: Board = fen.parse().expect("valid problem fen");
    let mut state = SearchState::new();
    state.set_game_history(&[board.zobrist()]);
    let tt = TranspositionTable::new(16);
    let stop = AtomicBool::new(false);
    let nodes = AtomicU64::new(0);
    let limits = SearchLimits::depth(depth);
    let result = search_root(
        &mut board,
        &mut state,
        &tt,
        &MaterialEvaluator,
        &NoTablebases,
        &stop,
        &nodes,
        &limits,
        true,
        0,
        None,
    );
    (result.best_move, result.score)
}

#[test]
fn mate_in_one_suite() {
    // Some positions admit more than one mate, so judge the engine's move
    // by whether it checkmates, not by string equality with the fixture.
    let set = load_problems();
    for problem in set.problems.iter().filter(|p| p.kind == "Mate in One") {
        let (best, score) = best_move_at_depth(&problem.fen, 4);
        assert_eq!(score, SCORE_MATE - 1, "wrong score for fen: {}", problem.fen);

        let mv = best.expect("a mating move exists");
        let mut board: Board = problem.fen.parse().expect("valid problem fen");
        board.make_move(mv).expect("engine move applies");
        assert!(
            board.is_checkmate(),
            "move {} does not mate for fen: {}",
            mv,
            problem.fen
        );
    }
}

#[test]
fn mate_in_one_solutions_checkmate() {
    // The fixture's own solution moves must deliver mate on the board.
    let set = load_problems();
    for problem in set.problems.iter().filter(|p| p.kind == "Mate in One") {
        let board: Board = problem.fen.parse().expect("valid problem fen");
        let mv = sable::uci::parse_uci_move(&board, &uci_from_problem_moves(&problem.moves), false)
            .expect("solution move is legal");
        let mut after = board.clone();
        after.make_move(mv).expect("solution move applies");
        assert!(
            after.is_checkmate(),
            "solution is not mate for fen: {} move: {}",
            problem.fen,
            problem.moves
        );
    }
}

#[test]
fn mate_in_two_suite() {
    let set = load_problems();
    for problem in set.problems.iter().filter(|p| p.kind == "Mate in Two") {
        let expected = uci_from_problem_moves(&problem.moves);
        let (best, score) = best_move_at_depth(&problem.fen, 6);
        assert_eq!(
            best.map(|m| m.to_string()).as_deref(),
            Some(expected.as_str()),
            "wrong key move for fen: {}",
            problem.fen
        );
        // Mate in two moves is three plies out.
        assert_eq!(score, SCORE_MATE - 3, "wrong score for fen: {}", problem.fen);
    }
}
