//! Failure taxonomy surfaced by board operations.

use thiserror::Error;

/// Errors returned by [`crate::board::Board`] operations.
///
/// Two families share this enum. Validation failures (`OutOfBounds`,
/// `BadPlayerId`, `BadValue`) are detected before any state is mutated.
/// Game-rule failures (`NoCard`, `Contended`, `SameCard`) can occur mid-turn;
/// the board performs its own compensating bookkeeping (relinquishing the
/// first card) before surfacing them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// The target position holds no card (it was removed from the board).
    #[error("no card at ({row},{col})")]
    NoCard { row: usize, col: usize },

    /// A second-card flip targeted a card that is currently controlled.
    #[error("card at ({row},{col}) is already controlled")]
    Contended { row: usize, col: usize },

    /// A second-card flip targeted the player's own first card.
    #[error("card at ({row},{col}) is already this player's first card")]
    SameCard { row: usize, col: usize },

    /// The position lies outside the grid.
    #[error("position ({row},{col}) is outside the {rows}x{cols} board")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// The player identifier is not a non-empty `[A-Za-z0-9_]+` string.
    #[error("invalid player id {0:?}")]
    BadPlayerId(String),

    /// A card value is empty or contains whitespace.
    #[error("invalid card value {0:?}")]
    BadValue(String),
}

impl BoardError {
    /// True for game-rule failures, which the transport reports as a
    /// conflict rather than a bad request.
    pub fn is_rule_violation(&self) -> bool {
        matches!(
            self,
            BoardError::NoCard { .. } | BoardError::Contended { .. } | BoardError::SameCard { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BoardError>;
