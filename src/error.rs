//! Error types shared by the rules engine, the map loader, and the game manager.

use crate::action::Action;

use thiserror::Error;

/// Everything that can go wrong while loading a map or driving a game.
///
/// Note that an exhausted deck is *not* an error from the point of view of the rules engine:
/// it simply removes the corresponding draw from the legal actions. [`GameError::DeckEmpty`]
/// only surfaces when the [`crate::card::CardDealer`] is called directly on an empty pile.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GameError {
    /// The action is not part of the legal actions of the state it was applied to.
    /// The state is left untouched, and the caller may ask again.
    #[error("Illegal action: {action}.")]
    IllegalAction { action: Action },

    /// The map description could not be parsed. The game cannot start.
    #[error("Malformed map data (line {line}): {reason}")]
    MalformedMapData { line: usize, reason: String },

    #[error("Cannot create a game with {0} players: one must have at least two, and at most 5 players.")]
    InvalidPlayerCount(usize),

    /// A route was claimed twice. This is always a caller bug (e.g. a stale action).
    #[error("Route {route} is already owned by player {owner}.")]
    AlreadyOwned { route: usize, owner: usize },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("There is no cards left in this deck.")]
    DeckEmpty,

    #[error("The game is over, no more actions can be taken.")]
    GameOver,

    /// An actor kept answering with illegal actions.
    #[error("Player {player} did not choose a legal action after {attempts} attempts.")]
    ActorExhausted { player: usize, attempts: usize },
}

pub type Result<T> = std::result::Result<T, GameError>;
