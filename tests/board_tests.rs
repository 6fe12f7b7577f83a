//! Position-level integration tests: make/unmake identity, hashing, FEN,
//! en passant, and Chess960 castling.

use proptest::prelude::*;

use sable::board::{Board, CastleSide, Color, Move, Piece, Square};

fn board(fen: &str) -> Board {
    fen.parse().expect("valid test fen")
}

#[test]
fn make_unmake_restores_position_for_every_legal_move() {
    let fens = [
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2",
        "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    ];
    for fen in fens {
        let mut b = board(fen);
        let before = b.clone();
        for &mv in &b.generate_moves() {
            let undo = b.make_move(mv).expect("legal move applies");
            b.unmake_move(undo);
            assert_eq!(b, before, "{fen} after {mv}");
            assert_eq!(b.zobrist(), b.compute_zobrist(), "{fen} after {mv}");
        }
    }
}

#[test]
fn zobrist_stays_incremental_along_a_line() {
    let mut b = Board::startpos();
    let line = ["e2e4", "e7e5", "g1f3", "b8c6", "f1b5", "g8f6", "e1g1"];
    for token in line {
        let mv = find_move(&b, token);
        b.make_move(mv).expect("line is legal");
        assert_eq!(b.zobrist(), b.compute_zobrist(), "after {token}");
    }
}

#[test]
fn en_passant_capture_roundtrip() {
    // The move e5d6 is legal and reversible.
    let mut b = board("rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2");
    let before = b.clone();
    let ep = Move::capture(
        "e5".parse().unwrap(),
        "d6".parse().unwrap(),
    );
    assert!(b.generate_moves().contains(ep));
    let undo = b.make_move(ep).unwrap();
    // The d5 pawn is gone, the capturing pawn sits on d6.
    assert_eq!(b.piece_at("d6".parse().unwrap()), Some((Color::White, Piece::Pawn)));
    assert_eq!(b.piece_at("d5".parse().unwrap()), None);
    b.unmake_move(undo);
    assert_eq!(b, before);
}

#[test]
fn standard_castling_moves_both_pieces() {
    let mut b = board("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
    let castle = Move::castle("e1".parse().unwrap(), "h1".parse().unwrap());
    assert!(b.generate_moves().contains(castle));
    let undo = b.make_move(castle).unwrap();
    assert_eq!(b.piece_at("g1".parse().unwrap()), Some((Color::White, Piece::King)));
    assert_eq!(b.piece_at("f1".parse().unwrap()), Some((Color::White, Piece::Rook)));
    assert!(!b.castling_rights().has(Color::White, CastleSide::King));
    b.unmake_move(undo);
    assert_eq!(b.castling_rights().mask(), 0b1111);
}

#[test]
fn frc_castling_king_on_c_file() {
    // Shredder-FEN: white king c1, rook a1, queenside right 'A'.
    let b = board("4k3/8/8/8/8/8/8/R1K5 w A - 0 1");
    let castle = Move::castle("c1".parse().unwrap(), "a1".parse().unwrap());
    assert!(
        b.generate_moves().contains(castle),
        "expected c1a1 castling in {:?}",
        b.generate_moves()
    );

    let mut b2 = b.clone();
    let undo = b2.make_move(castle).unwrap();
    // FRC queenside targets: king to c1 (stays), rook to d1.
    assert_eq!(b2.piece_at("c1".parse().unwrap()), Some((Color::White, Piece::King)));
    assert_eq!(b2.piece_at("d1".parse().unwrap()), Some((Color::White, Piece::Rook)));
    assert_eq!(b2.piece_at("a1".parse().unwrap()), None);
    b2.unmake_move(undo);
    assert_eq!(b2, b);
}

#[test]
fn castling_blocked_by_attack_is_not_generated() {
    // Black rook on f8 covers f1: white may not castle kingside.
    let b = board("5rk1/8/8/8/8/8/8/R3K2R w KQ - 0 1");
    let kingside = Move::castle("e1".parse().unwrap(), "h1".parse().unwrap());
    let queenside = Move::castle("e1".parse().unwrap(), "a1".parse().unwrap());
    let moves = b.generate_moves();
    assert!(!moves.contains(kingside));
    assert!(moves.contains(queenside));
}

#[test]
fn legal_move_filter_matches_definition() {
    // Pinned knight: every pseudo-legal knight move must be rejected.
    let b = board("4r1k1/8/8/8/8/4N3/8/4K3 w - - 0 1");
    for &mv in &b.generate_moves() {
        assert_ne!(
            mv.from(),
            "e3".parse::<Square>().unwrap(),
            "pinned knight moved: {mv}"
        );
    }
}

fn find_move(b: &Board, token: &str) -> Move {
    sable::uci::parse_uci_move(b, token, false).expect("legal test move")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Random playouts keep the hash incremental and unmake exact.
    #[test]
    fn random_playout_roundtrips(choices in prop::collection::vec(0usize..512, 1..40)) {
        let mut b = Board::startpos();
        let mut undos = Vec::new();
        let snapshots: Vec<Board> = {
            let mut snaps = vec![b.clone()];
            for &choice in &choices {
                let moves = b.generate_moves();
                if moves.is_empty() {
                    break;
                }
                let mv = moves.as_slice()[choice % moves.len()];
                match b.make_move(mv) {
                    Some(undo) => {
                        prop_assert_eq!(b.zobrist(), b.compute_zobrist());
                        undos.push(undo);
                        snaps.push(b.clone());
                    }
                    None => break,
                }
            }
            snaps
        };

        for (undo, expected) in undos.into_iter().rev().zip(snapshots.into_iter().rev().skip(1)) {
            b.unmake_move(undo);
            prop_assert_eq!(&b, &expected);
        }
    }
}

#[test]
fn missing_black_king_is_rejected() {
    assert!("8/8/8/8/8/8/8/4K3 w - - 0 1".parse::<Board>().is_err());
}
