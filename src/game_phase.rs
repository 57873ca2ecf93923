use crate::card::DestinationDeal;

use serde::{Deserialize, Serialize};

/// Where the game is at, as a whole.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Every player, in turn order, selects their initial destination cards.
    Setup,
    Playing,
    /// A player is down to less than three cars: everyone else plays one last turn.
    LastRound,
    Done,
}

/// Context of a turn that spans more than one action.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingSubAction {
    /// The active player starts a new turn.
    #[default]
    None,
    /// The active player drew a first train card, and must draw a second one.
    ///
    /// A wild card taken face up ends the turn right away, so `picked_wild` is always false
    /// in practice: a pending second draw after a wild card allows no action at all.
    AwaitingSecondDraw { picked_wild: bool },
    /// The active player was dealt destination cards, and must keep some of them.
    AwaitingDestinationSelection { dealt: DestinationDeal },
}

impl PendingSubAction {
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, PendingSubAction::None)
    }
}
