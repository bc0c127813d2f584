//! Adapter over the chess rules. The session never inspects a position; it
//! hands positions and move descriptors to a [`RulesEngine`] and stores what
//! comes back.

use std::{fmt, str::FromStr};

use chess::{BitBoard, Board, BoardStatus, ChessMove, Piece, Rank, Square, EMPTY};
use shared::domain::{Color, DrawReason, GameStatus, MoveDescriptor, Position};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Accepted(Position),
    Rejected(String),
}

pub trait RulesEngine: Send + 'static {
    fn initial_position(&self) -> Position;

    fn apply(&self, position: &Position, mv: &MoveDescriptor) -> MoveOutcome;

    fn side_to_move(&self, position: &Position) -> Color;

    /// Status of `position`, given every position that occurred before it
    /// in the live line (oldest first, starting position included).
    fn status(&self, position: &Position, earlier: &[Position]) -> GameStatus;
}

pub const STANDARD_START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// A board plus the two move counters, which `chess::Board` does not keep.
#[derive(Debug, Clone, Copy)]
struct Fen {
    board: Board,
    halfmove: u32,
    fullmove: u32,
}

impl Default for Fen {
    fn default() -> Self {
        Self {
            board: Board::default(),
            halfmove: 0,
            fullmove: 1,
        }
    }
}

impl FromStr for Fen {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = text.split_whitespace().collect();
        if !(4..=6).contains(&fields.len()) {
            return Err(format!("expected 4 to 6 FEN fields, got {}", fields.len()));
        }
        let board = Board::from_str(&format!("{} 0 1", fields[..4].join(" ")))
            .map_err(|e| format!("{e:?}"))?;
        Ok(Self {
            board,
            halfmove: counter(fields.get(4).copied(), 0)?,
            fullmove: counter(fields.get(5).copied(), 1)?.max(1),
        })
    }
}

impl fmt::Display for Fen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let board = self.board.to_string();
        let fields: Vec<&str> = board.split_whitespace().take(4).collect();
        write!(f, "{} {} {}", fields.join(" "), self.halfmove, self.fullmove)
    }
}

impl Fen {
    fn after(&self, chess_move: ChessMove) -> Self {
        let pawn_move = self.board.piece_on(chess_move.get_source()) == Some(Piece::Pawn);
        let capture = self.board.piece_on(chess_move.get_dest()).is_some();
        Self {
            board: self.board.make_move_new(chess_move),
            halfmove: if pawn_move || capture { 0 } else { self.halfmove + 1 },
            fullmove: match self.board.side_to_move() {
                chess::Color::White => self.fullmove,
                chess::Color::Black => self.fullmove + 1,
            },
        }
    }

    fn position(&self) -> Position {
        Position(self.to_string())
    }
}

fn counter(field: Option<&str>, default: u32) -> Result<u32, String> {
    field.map_or(Ok(default), |v| {
        v.parse().map_err(|_| format!("bad move counter: {v}"))
    })
}

#[derive(Debug, Clone, Default)]
pub struct ChessRules {
    start: Fen,
}

impl ChessRules {
    pub fn from_fen(fen: &str) -> Result<Self, String> {
        let start = fen
            .parse()
            .map_err(|e| format!("invalid starting position: {e}"))?;
        Ok(Self { start })
    }
}

impl RulesEngine for ChessRules {
    fn initial_position(&self) -> Position {
        self.start.position()
    }

    fn apply(&self, position: &Position, mv: &MoveDescriptor) -> MoveOutcome {
        let Ok(fen) = position.as_str().parse::<Fen>() else {
            return MoveOutcome::Rejected("position cannot be parsed".into());
        };
        let chess_move = match parse_move(&fen.board, mv) {
            Ok(m) => m,
            Err(reason) => return MoveOutcome::Rejected(reason),
        };
        if !fen.board.legal(chess_move) {
            return MoveOutcome::Rejected(format!("illegal move: {mv}"));
        }
        MoveOutcome::Accepted(fen.after(chess_move).position())
    }

    fn side_to_move(&self, position: &Position) -> Color {
        // An unreadable position cannot come out of `apply`; treat it as the
        // starting side so nobody is handed a phantom turn.
        let fen = position.as_str().parse::<Fen>().unwrap_or(self.start);
        from_chess_color(fen.board.side_to_move())
    }

    fn status(&self, position: &Position, earlier: &[Position]) -> GameStatus {
        let Ok(Fen { board, halfmove, .. }) = position.as_str().parse::<Fen>() else {
            return GameStatus::Ongoing;
        };
        match board.status() {
            BoardStatus::Checkmate => {
                return GameStatus::Checkmate {
                    winner: from_chess_color(board.side_to_move()).opponent(),
                }
            }
            BoardStatus::Stalemate => return GameStatus::Stalemate,
            BoardStatus::Ongoing => {}
        }

        if halfmove >= 100 {
            return GameStatus::Draw {
                reason: DrawReason::FiftyMoveRule,
            };
        }

        let hash = board.get_hash();
        let repetitions = 1 + earlier
            .iter()
            .filter_map(|p| p.as_str().parse::<Fen>().ok())
            .filter(|fen| fen.board.get_hash() == hash)
            .count();
        if repetitions >= 3 {
            return GameStatus::Draw {
                reason: DrawReason::ThreefoldRepetition,
            };
        }

        if insufficient_material(&board) {
            return GameStatus::Draw {
                reason: DrawReason::InsufficientMaterial,
            };
        }

        GameStatus::Ongoing
    }
}

fn from_chess_color(color: chess::Color) -> Color {
    match color {
        chess::Color::White => Color::White,
        chess::Color::Black => Color::Black,
    }
}

/// The promotion letter only counts for a pawn reaching the last rank.
/// Browser boards send `"q"` with every move.
fn parse_move(board: &Board, mv: &MoveDescriptor) -> Result<ChessMove, String> {
    let from = Square::from_str(mv.from.trim()).map_err(|_| format!("bad square: {}", mv.from))?;
    let to = Square::from_str(mv.to.trim()).map_err(|_| format!("bad square: {}", mv.to))?;

    let promotes = board.piece_on(from) == Some(Piece::Pawn)
        && matches!(to.get_rank(), Rank::First | Rank::Eighth);
    if !promotes {
        return Ok(ChessMove::new(from, to, None));
    }

    let piece = match mv.promotion.as_deref().map(str::trim) {
        None | Some("") => Piece::Queen,
        Some(letter) => match letter.to_ascii_lowercase().as_str() {
            "q" => Piece::Queen,
            "r" => Piece::Rook,
            "b" => Piece::Bishop,
            "n" => Piece::Knight,
            other => return Err(format!("bad promotion piece: {other}")),
        },
    };
    Ok(ChessMove::new(from, to, Some(piece)))
}

const LIGHT_SQUARES: BitBoard = BitBoard(0x55AA_55AA_55AA_55AA);

/// Bare kings, a single minor piece, or only bishops all standing on one
/// square colour.
fn insufficient_material(board: &Board) -> bool {
    let heavy = *board.pieces(Piece::Pawn) | *board.pieces(Piece::Rook) | *board.pieces(Piece::Queen);
    if heavy != EMPTY {
        return false;
    }
    let knights = *board.pieces(Piece::Knight);
    let bishops = *board.pieces(Piece::Bishop);
    if (knights | bishops).popcnt() <= 1 {
        return true;
    }
    knights == EMPTY && ((bishops & LIGHT_SQUARES) == EMPTY || (bishops & !LIGHT_SQUARES) == EMPTY)
}

#[cfg(test)]
#[path = "tests/rules_tests.rs"]
mod tests;
