//! FEN parsing and formatting.
//!
//! Accepts the standard 6-field form. The castling field takes both `KQkq`
//! and Shredder-FEN file letters; `K`/`Q`/`k`/`q` require the rook on its
//! conventional corner file, file letters name the rook square directly.
//! The writer emits `KQkq` whenever every rook sits on a corner file.

use std::fmt;
use std::str::FromStr;

use super::error::FenError;
use super::state::Board;
use super::types::{CastleSide, Color, Piece, Square};

impl Board {
    /// Parse a FEN string into a new position.
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(FenError::FieldCount {
                found: fields.len(),
            });
        }

        let mut board = Board::empty();
        parse_placement(&mut board, fields[0])?;

        board.side = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => {
                return Err(FenError::BadSideToMove {
                    token: other.to_string(),
                })
            }
        };

        parse_castling(&mut board, fields[2])?;
        parse_en_passant(&mut board, fields[3])?;

        board.halfmove = fields[4].parse().map_err(|_| FenError::BadCounter {
            token: fields[4].to_string(),
        })?;
        board.fullmove = fields[5].parse().map_err(|_| FenError::BadCounter {
            token: fields[5].to_string(),
        })?;
        if board.fullmove == 0 {
            board.fullmove = 1;
        }

        board.zobrist = board.compute_zobrist();
        Ok(board)
    }

    /// Format the position as a FEN string.
    #[must_use]
    pub fn to_fen(&self) -> String {
        let mut fen = String::with_capacity(90);

        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.piece_at(Square::new(rank, file)) {
                    Some((color, piece)) => {
                        if empty > 0 {
                            fen.push(char::from_digit(empty, 10).unwrap_or('0'));
                            empty = 0;
                        }
                        let c = piece.to_char();
                        fen.push(if color.is_white() {
                            c.to_ascii_uppercase()
                        } else {
                            c
                        });
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                fen.push(char::from_digit(empty, 10).unwrap_or('0'));
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(if self.side.is_white() { 'w' } else { 'b' });
        fen.push(' ');
        fen.push_str(&self.castling_field());
        fen.push(' ');
        match self.en_passant {
            Some(sq) => fen.push_str(&sq.to_string()),
            None => fen.push('-'),
        }
        fen.push_str(&format!(" {} {}", self.halfmove, self.fullmove));
        fen
    }

    fn castling_field(&self) -> String {
        if !self.castling.any() {
            return "-".to_string();
        }
        let mut out = String::new();
        let standard = self.castling.is_standard_layout();
        for (color, sides) in [
            (Color::White, [CastleSide::King, CastleSide::Queen]),
            (Color::Black, [CastleSide::King, CastleSide::Queen]),
        ] {
            for side in sides {
                if let Some(rook) = self.castling.rook(color, side) {
                    let c = if standard {
                        match side {
                            CastleSide::King => 'k',
                            CastleSide::Queen => 'q',
                        }
                    } else {
                        (b'a' + rook.file() as u8) as char
                    };
                    out.push(if color.is_white() {
                        c.to_ascii_uppercase()
                    } else {
                        c
                    });
                }
            }
        }
        out
    }
}

fn parse_placement(board: &mut Board, field: &str) -> Result<(), FenError> {
    let ranks: Vec<&str> = field.split('/').collect();
    if ranks.len() != 8 {
        return Err(FenError::BadPlacement {
            reason: format!("expected 8 ranks, found {}", ranks.len()),
        });
    }

    for (i, rank_str) in ranks.iter().enumerate() {
        let rank = 7 - i;
        let mut file = 0usize;
        for c in rank_str.chars() {
            if let Some(skip) = c.to_digit(10) {
                file += skip as usize;
                continue;
            }
            let Some(piece) = Piece::from_char(c) else {
                return Err(FenError::BadPlacement {
                    reason: format!("unknown piece character '{c}'"),
                });
            };
            if file >= 8 {
                return Err(FenError::BadPlacement {
                    reason: format!("rank {} overflows", rank + 1),
                });
            }
            let color = if c.is_ascii_uppercase() {
                Color::White
            } else {
                Color::Black
            };
            board.set_piece(Square::new(rank, file), color, piece);
            file += 1;
        }
        if file != 8 {
            return Err(FenError::BadPlacement {
                reason: format!("rank {} has {file} files", rank + 1),
            });
        }
    }

    for color in [Color::White, Color::Black] {
        if board.pieces_of(color, Piece::King).count() != 1 {
            return Err(FenError::InvariantViolation {
                reason: "exactly one king per side required".to_string(),
            });
        }
    }
    Ok(())
}

fn parse_castling(board: &mut Board, field: &str) -> Result<(), FenError> {
    if field == "-" {
        return Ok(());
    }
    let err = || FenError::BadCastling {
        token: field.to_string(),
    };

    for c in field.chars() {
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        let back = if color.is_white() { 0 } else { 7 };
        let king = board.pieces_of(color, Piece::King);
        let king_sq = Square::from_index(king.lsb());
        if king_sq.rank() != back {
            return Err(err());
        }

        let rook_sq = match c.to_ascii_lowercase() {
            // Conventional letters demand the conventional corner rook.
            'k' => Square::new(back, 7),
            'q' => Square::new(back, 0),
            // Shredder-FEN file letter names the rook square outright.
            f @ 'a'..='h' => Square::new(back, f as usize - 'a' as usize),
            _ => return Err(err()),
        };

        if !board.pieces_of(color, Piece::Rook).contains(rook_sq) {
            return Err(err());
        }

        let side = if rook_sq.file() > king_sq.file() {
            CastleSide::King
        } else if rook_sq.file() < king_sq.file() {
            CastleSide::Queen
        } else {
            return Err(err());
        };
        board.castling.grant(color, side, rook_sq);
    }
    Ok(())
}

fn parse_en_passant(board: &mut Board, field: &str) -> Result<(), FenError> {
    if field == "-" {
        return Ok(());
    }
    let err = || FenError::BadEnPassant {
        token: field.to_string(),
    };
    let sq = Square::from_str(field).map_err(|_| err())?;

    // The ep square sits behind the enemy pawn that just double-pushed.
    let (ep_rank, pawn_rank, pusher) = if board.side.is_white() {
        (5, 4, Color::Black)
    } else {
        (2, 3, Color::White)
    };
    if sq.rank() != ep_rank {
        return Err(err());
    }
    let pawn_sq = Square::new(pawn_rank, sq.file());
    if !board.pieces_of(pusher, Piece::Pawn).contains(pawn_sq) {
        return Err(err());
    }
    board.en_passant = Some(sq);
    Ok(())
}

impl FromStr for Board {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Board::from_fen(s)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0..8).rev() {
            for file in 0..8 {
                let c = match self.piece_at(Square::new(rank, file)) {
                    Some((color, piece)) => {
                        let c = piece.to_char();
                        if color.is_white() {
                            c.to_ascii_uppercase()
                        } else {
                            c
                        }
                    }
                    None => '.',
                };
                write!(f, "{c} ")?;
            }
            writeln!(f)?;
        }
        write!(f, "fen: {}", self.to_fen())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_startpos_roundtrip() {
        let board: Board = STARTPOS_FEN.parse().unwrap();
        assert_eq!(board, Board::startpos());
        assert_eq!(board.to_fen(), STARTPOS_FEN);
    }

    #[test]
    fn test_kiwipete_parses() {
        let board: Board =
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1"
                .parse()
                .unwrap();
        assert_eq!(board.occupied().count(), 32);
        assert_eq!(board.castling_rights().mask(), 0b1111);
        assert_eq!(board.zobrist(), board.compute_zobrist());
    }

    #[test]
    fn test_en_passant_field() {
        let board: Board = "rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2"
            .parse()
            .unwrap();
        assert_eq!(board.en_passant_square(), Some(Square::new(5, 3)));
    }

    #[test]
    fn test_en_passant_without_pusher_rejected() {
        let result: Result<Board, _> =
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq d6 0 1".parse();
        assert!(matches!(result, Err(FenError::BadEnPassant { .. })));
    }

    #[test]
    fn test_bad_field_count() {
        let result: Result<Board, _> = "8/8/8/8/8/8/8/8 w - -".parse();
        assert!(matches!(result, Err(FenError::FieldCount { .. })));
    }

    #[test]
    fn test_missing_king_rejected() {
        let result: Result<Board, _> = "8/8/8/8/8/8/8/4K3 w - - 0 1".parse();
        assert!(matches!(result, Err(FenError::InvariantViolation { .. })));
    }

    #[test]
    fn test_conventional_castling_requires_corner_rook() {
        // White king e1 but the h-rook is missing: 'K' must be rejected.
        let result: Result<Board, _> = "4k3/8/8/8/8/8/8/4K3 w K - 0 1".parse();
        assert!(matches!(result, Err(FenError::BadCastling { .. })));
    }

    #[test]
    fn test_shredder_fen_castling() {
        // Chess960-style: king on c1, rook on a1 - queenside right via 'A'.
        let board: Board = "2r1k3/8/8/8/8/8/8/R1K5 w A - 0 1".parse().unwrap();
        assert_eq!(
            board
                .castling_rights()
                .rook(Color::White, CastleSide::Queen),
            Some(Square::new(0, 0))
        );
        // The rook sits on its conventional corner, so the writer may use
        // the plain letter.
        assert!(board.to_fen().contains(" Q "));
    }

    #[test]
    fn test_shredder_fen_noncorner_rook() {
        // Rook on b1: only the file-letter form can express this right.
        let board: Board = "4k3/8/8/8/8/8/8/1R1K4 w B - 0 1".parse().unwrap();
        assert_eq!(
            board
                .castling_rights()
                .rook(Color::White, CastleSide::Queen),
            Some(Square::new(0, 1))
        );
        assert!(board.to_fen().contains(" B "));
    }

    #[test]
    fn test_fen_roundtrip_preserves_position() {
        let fens = [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2",
            "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1",
        ];
        for fen in fens {
            let board: Board = fen.parse().unwrap();
            assert_eq!(board.to_fen(), fen, "roundtrip for {fen}");
        }
    }
}
