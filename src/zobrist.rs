//! Zobrist hashing for chess positions.
//!
//! Provides incrementally-updatable 64-bit position hashes for the
//! transposition table. Keys come from a fixed-seed RNG so they are stable
//! across runs of the same build.

use once_cell::sync::Lazy;
use rand::prelude::*;

use crate::board::{Color, Piece, Square};

pub(crate) struct ZobristKeys {
    /// `piece_square[color][piece][square]`
    pub(crate) piece_square: [[[u64; 64]; 6]; 2],
    /// One key per 4-bit castling-rights mask.
    pub(crate) castling: [u64; 16],
    /// One key per en passant file.
    pub(crate) en_passant: [u64; 8],
    /// XORed in when Black is to move.
    pub(crate) side_to_move: u64,
}

impl ZobristKeys {
    fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(0x9E37_79B9_7F4A_7C15);
        let mut piece_square = [[[0u64; 64]; 6]; 2];
        for color in &mut piece_square {
            for piece in color.iter_mut() {
                for key in piece.iter_mut() {
                    *key = rng.gen();
                }
            }
        }

        let mut castling = [0u64; 16];
        // The empty-rights mask contributes nothing to the fold.
        for key in castling.iter_mut().skip(1) {
            *key = rng.gen();
        }

        let mut en_passant = [0u64; 8];
        for key in &mut en_passant {
            *key = rng.gen();
        }

        ZobristKeys {
            piece_square,
            castling,
            en_passant,
            side_to_move: rng.gen(),
        }
    }
}

pub(crate) static ZOBRIST: Lazy<ZobristKeys> = Lazy::new(ZobristKeys::new);

#[inline]
pub(crate) fn piece_key(color: Color, piece: Piece, sq: Square) -> u64 {
    ZOBRIST.piece_square[color.index()][piece.index()][sq.index()]
}

#[inline]
pub(crate) fn castling_key(mask: u8) -> u64 {
    ZOBRIST.castling[(mask & 0xF) as usize]
}

#[inline]
pub(crate) fn en_passant_key(file: usize) -> u64 {
    ZOBRIST.en_passant[file]
}

#[inline]
pub(crate) fn side_key() -> u64 {
    ZOBRIST.side_to_move
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_stable_within_process() {
        let a = piece_key(Color::White, Piece::Knight, Square::new(0, 1));
        let b = piece_key(Color::White, Piece::Knight, Square::new(0, 1));
        assert_eq!(a, b);
    }

    #[test]
    fn test_keys_distinct() {
        let mut seen = std::collections::HashSet::new();
        for color in [Color::White, Color::Black] {
            for piece in crate::board::ALL_PIECES {
                for sq in 0..64 {
                    assert!(seen.insert(piece_key(color, piece, Square::from_index(sq))));
                }
            }
        }
        for mask in 1..16u8 {
            assert!(seen.insert(castling_key(mask)));
        }
        for file in 0..8 {
            assert!(seen.insert(en_passant_key(file)));
        }
        assert!(seen.insert(side_key()));
    }

    #[test]
    fn test_empty_castling_mask_is_zero() {
        assert_eq!(castling_key(0), 0);
    }
}
