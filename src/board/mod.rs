//! Chess board representation and game logic.
//!
//! Bitboard-based position with reversible make/unmake, pseudo-legal move
//! generation plus a legality predicate, static exchange evaluation, and
//! FEN I/O (Shredder-FEN aware).

pub mod attack_tables;
mod error;
mod fen;
mod make_unmake;
mod movegen;
mod see;
mod state;
mod types;

pub use error::{FenError, MoveParseError, SquareError};
pub use movegen::GenKind;
pub use state::{Board, NullUndoInfo, UndoInfo};
pub use types::{
    Bitboard, CastleSide, CastlingRights, Color, Move, MoveList, Piece, Square, ALL_PIECES,
    MAX_PLY, MOVE_NONE, PROMOTION_PIECES,
};

pub(crate) use see::SEE_VALUES;
