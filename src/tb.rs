//! Endgame tablebase probe interface.
//!
//! The search only needs win/draw/loss (plus a distance hint) for
//! few-piece positions without castling rights. The backend is a narrow
//! capability; file decoding lives outside the engine core. The default
//! backend reports every probe as unavailable, which degrades gracefully to
//! ordinary search.

use crate::board::{Board, Move};

/// Probe outcome from the side to move's perspective.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wdl {
    Loss,
    Draw,
    Win,
}

/// A decisive root probe: the move to play and the outcome behind it.
#[derive(Clone, Copy, Debug)]
pub struct RootProbe {
    pub best_move: Move,
    pub wdl: Wdl,
    /// Distance-to-zero in plies, when the backend knows it.
    pub dtz: Option<u32>,
}

/// Tablebase backend capability.
pub trait Tablebases: Send + Sync {
    /// Largest piece count the backend can answer for (0 = nothing).
    fn max_pieces(&self) -> u32;

    /// Win/draw/loss for the position, or `None` when unknown or on any
    /// probe failure.
    fn probe_wdl(&self, board: &Board) -> Option<Wdl>;

    /// Best move at the root, or `None` when unknown.
    fn probe_root(&self, board: &Board) -> Option<RootProbe>;

    /// Whether a position qualifies for probing at all.
    fn can_probe(&self, board: &Board) -> bool {
        self.max_pieces() > 0
            && board.occupied().count() <= self.max_pieces()
            && !board.castling_rights().any()
    }
}

/// Backend used when no tablebase path is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTablebases;

impl Tablebases for NoTablebases {
    fn max_pieces(&self) -> u32 {
        0
    }

    fn probe_wdl(&self, _board: &Board) -> Option<Wdl> {
        None
    }

    fn probe_root(&self, _board: &Board) -> Option<RootProbe> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_backend_never_probes() {
        let board = Board::startpos();
        let tb = NoTablebases;
        assert!(!tb.can_probe(&board));
        assert!(tb.probe_wdl(&board).is_none());
        assert!(tb.probe_root(&board).is_none());
    }

    #[test]
    fn test_can_probe_gates() {
        struct FakeTb;
        impl Tablebases for FakeTb {
            fn max_pieces(&self) -> u32 {
                5
            }
            fn probe_wdl(&self, _board: &Board) -> Option<Wdl> {
                Some(Wdl::Draw)
            }
            fn probe_root(&self, _board: &Board) -> Option<RootProbe> {
                None
            }
        }

        let tb = FakeTb;
        // Start position: too many pieces and castling rights present.
        assert!(!tb.can_probe(&Board::startpos()));
        let kk: Board = "8/8/4k3/8/8/4K3/8/8 w - - 0 1".parse().unwrap();
        assert!(tb.can_probe(&kk));
    }
}
