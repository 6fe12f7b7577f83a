//! Criterion benchmarks over the hot kernels: move generation, perft,
//! static exchange evaluation, and a fixed-depth search.

use std::sync::atomic::{AtomicBool, AtomicU64};

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sable::board::{Board, GenKind, Move, MoveList};
use sable::eval::MaterialEvaluator;
use sable::search::{search_root, SearchLimits, SearchState};
use sable::tb::NoTablebases;
use sable::tt::TranspositionTable;

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

fn bench_movegen(c: &mut Criterion) {
    let board: Board = KIWIPETE.parse().unwrap();
    c.bench_function("movegen_kiwipete", |b| {
        b.iter(|| {
            let mut list = MoveList::new();
            board.generate_pseudo_legal(GenKind::All, &mut list);
            black_box(list.len())
        })
    });
    c.bench_function("movegen_legal_kiwipete", |b| {
        b.iter(|| black_box(board.generate_moves().len()))
    });
}

fn bench_perft(c: &mut Criterion) {
    c.bench_function("perft3_startpos", |b| {
        let mut board = Board::startpos();
        b.iter(|| black_box(board.perft(3)))
    });
}

fn bench_see(c: &mut Criterion) {
    let board: Board = KIWIPETE.parse().unwrap();
    let mut captures = MoveList::new();
    board.generate_pseudo_legal(GenKind::Captures, &mut captures);
    let moves: Vec<Move> = captures.iter().copied().collect();
    c.bench_function("see_kiwipete_captures", |b| {
        b.iter(|| {
            let mut total = 0i32;
            for &mv in &moves {
                total += board.see(mv);
            }
            black_box(total)
        })
    });
}

fn bench_search(c: &mut Criterion) {
    c.bench_function("search_depth5_startpos", |b| {
        b.iter(|| {
            let mut board = Board::startpos();
            let mut state = SearchState::new();
            state.set_game_history(&[board.zobrist()]);
            let tt = TranspositionTable::new(16);
            let stop = AtomicBool::new(false);
            let nodes = AtomicU64::new(0);
            let limits = SearchLimits::depth(5);
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
            black_box(result.best_move)
        })
    });
}

criterion_group!(benches, bench_movegen, bench_perft, bench_see, bench_search);
criterion_main!(benches);
