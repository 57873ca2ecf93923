use crate::card::TrainColor;
use crate::card::TrainColor::Wild;
use crate::map::{Map, Route};
use crate::player::{PlayerState, TrainCards};

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use smallvec::SmallVec;
use std::fmt;
use std::iter::repeat;
use strum_macros::{EnumCount, EnumIter};

/// Cards used to claim a route, non-wild cards first.
pub type Payment = SmallVec<[TrainColor; 6]>;

/// Indices, within the three dealt destination cards, of the ones to keep.
pub type DestinationSelection = SmallVec<[usize; 3]>;

/// Everything a player can do, one step at a time.
///
/// Drawing two train cards, or drawing then selecting destination cards, takes two actions
/// from the same player. See [`crate::game_phase::PendingSubAction`].
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Claims a route, by paying exactly `cards` from the hand.
    PlaceRoute { route: usize, cards: Payment },
    /// Takes a face-up train card of the given color.
    DrawFaceUp { color: TrainColor },
    /// Draws the top card of the close train card deck.
    DrawBlind,
    /// Asks for three destination cards, to be selected with [`Action::SelectDestinations`].
    DrawDestinations,
    /// Keeps a non-empty subset of the dealt destination cards.
    SelectDestinations { keep: DestinationSelection },
}

/// The four families of actions, as seen by an evaluator.
#[derive(
    Clone, Copy, Debug, Deserialize_repr, EnumCount, EnumIter, Eq, Hash, PartialEq, Serialize_repr,
)]
#[repr(u8)]
pub enum ActionKind {
    PlaceRoute = 0,
    DrawFaceUp = 1,
    DrawBlind = 2,
    Destinations = 3,
}

impl ActionKind {
    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::PlaceRoute { .. } => ActionKind::PlaceRoute,
            Action::DrawFaceUp { .. } => ActionKind::DrawFaceUp,
            Action::DrawBlind => ActionKind::DrawBlind,
            Action::DrawDestinations | Action::SelectDestinations { .. } => {
                ActionKind::Destinations
            }
        }
    }

    /// Whether this action draws a train card.
    pub fn is_train_card_draw(&self) -> bool {
        matches!(self, Action::DrawFaceUp { .. } | Action::DrawBlind)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::PlaceRoute { route, cards } => {
                write!(f, "claim route {} with [", route)?;
                for (i, card) in cards.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", card)?;
                }
                write!(f, "]")
            }
            Action::DrawFaceUp { color } => write!(f, "draw a face-up {} card", color),
            Action::DrawBlind => write!(f, "draw from the close deck"),
            Action::DrawDestinations => write!(f, "draw destination cards"),
            Action::SelectDestinations { keep } => {
                write!(f, "keep destination cards {:?}", keep.as_slice())
            }
        }
    }
}

/// Every way to pay for a route with the given hand, ignoring ownership and cars.
///
/// A route of length `L` is paid with `L` cards of its color, with `L` wild cards, or with any mix of
/// both adding up to `L`. A gray route applies the same rule to every non-wild color held.
/// Two different non-wild colors are never mixed.
///
/// Payments list the colored cards first, then the wild cards.
///
/// # Example
/// ```
/// use smallvec::smallvec;
/// use ticket_to_ride_mcts::action::{payments_for_route, Payment};
/// use ticket_to_ride_mcts::card::TrainColor::{Blue, Wild};
/// use ticket_to_ride_mcts::loader::MapData;
/// use ticket_to_ride_mcts::map::Map;
/// use ticket_to_ride_mcts::player::TrainCards;
///
/// let map_data = MapData::parse("Omaha 3 BLUE Chicago\n", "").unwrap();
/// let map = Map::new(&map_data, 2).unwrap();
/// let hand: TrainCards = [Blue, Blue, Wild, Wild].into_iter().collect();
///
/// let expected: Vec<Payment> = vec![smallvec![Blue, Blue, Wild], smallvec![Blue, Wild, Wild]];
/// assert_eq!(payments_for_route(&map.routes()[0], &hand), expected);
/// ```
pub fn payments_for_route(route: &Route, hand: &TrainCards) -> Vec<Payment> {
    let length = route.length as usize;
    let num_wild_cards = hand.count(Wild) as usize;
    let mut payments = Vec::new();

    let colors: SmallVec<[TrainColor; 8]> = if route.is_gray() {
        TrainColor::non_wild()
            .filter(|color| hand.count(*color) > 0)
            .collect()
    } else {
        smallvec![route.train_color]
    };

    for color in colors {
        let num_color_cards = hand.count(color) as usize;

        for num_non_wild in (1..=length).rev() {
            let num_wild = length - num_non_wild;
            if num_color_cards >= num_non_wild && num_wild_cards >= num_wild {
                payments.push(
                    repeat(color)
                        .take(num_non_wild)
                        .chain(repeat(Wild).take(num_wild))
                        .collect(),
                );
            }
        }
    }

    if num_wild_cards >= length {
        payments.push(smallvec![Wild; length]);
    }

    payments
}

/// Whether `cards` has the shape of a payment listed by [`payments_for_route`]:
/// the right length, a single non-wild color matching the route, colored cards before wild cards.
///
/// Whether the cards are in hand is up to the caller.
pub fn is_valid_payment(route: &Route, cards: &[TrainColor]) -> bool {
    if cards.len() != route.length as usize {
        return false;
    }

    let num_non_wild = cards.iter().take_while(|card| card.is_not_wild()).count();
    let (colored, wild) = cards.split_at(num_non_wild);
    if !wild.iter().all(TrainColor::is_wild) {
        return false;
    }

    match colored.first() {
        Some(color) => {
            colored.iter().all(|card| card == color)
                && (route.is_gray() || route.train_color == *color)
        }
        None => true,
    }
}

/// Appends a [`Action::PlaceRoute`] for every route the player can claim right now,
/// and every way they can pay for it.
pub fn place_route_actions(map: &Map, player: &PlayerState, actions: &mut Vec<Action>) {
    for route in map.routes() {
        if route.length > player.trains_left() || !map.is_claimable(route.index, player.id()) {
            continue;
        }

        actions.extend(
            payments_for_route(route, player.hand())
                .into_iter()
                .map(|cards| Action::PlaceRoute {
                    route: route.index,
                    cards,
                }),
        );
    }
}

/// Every non-empty subset of `{0, .., num_dealt - 1}`, smallest subsets first.
pub fn destination_selections(num_dealt: usize) -> Vec<DestinationSelection> {
    let mut selections: Vec<DestinationSelection> = (1..(1usize << num_dealt))
        .map(|mask| (0..num_dealt).filter(|i| mask & (1 << i) != 0).collect())
        .collect();
    selections.sort_by_key(|selection: &DestinationSelection| selection.len());
    selections
}
