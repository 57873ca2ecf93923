use crate::card::{DestinationCard, TrainColor, NUM_DRAWN_INITIAL_TRAIN_CARDS, NUM_TRAIN_COLORS};
use crate::error::{GameError, Result};
use crate::map::{Map, MAX_PLAYERS};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use strum::IntoEnumIterator;

// Every player starts the game with 45 cars.
pub const NUM_OF_CARS: u8 = 45;

/// Position of the unknown bucket in a [`CardEstimateRow`].
pub const UNKNOWN_CARDS: usize = NUM_TRAIN_COLORS;

/// A multiset of train cards: how many cards of each color, wild included.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct TrainCards([u8; NUM_TRAIN_COLORS]);

impl TrainCards {
    #[inline]
    pub fn count(&self, color: TrainColor) -> u8 {
        self.0[color.index()]
    }

    #[inline]
    pub fn add(&mut self, color: TrainColor) {
        self.0[color.index()] += 1;
    }

    /// Total number of cards.
    pub fn len(&self) -> usize {
        self.0.iter().map(|count| *count as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every card of `cards` can be taken from this multiset at once.
    pub fn contains_all(&self, cards: &[TrainColor]) -> bool {
        let needed: TrainCards = cards.iter().copied().collect();
        TrainColor::iter().all(|color| self.count(color) >= needed.count(color))
    }

    /// Removes `cards` from this multiset.
    /// Nothing is removed if one of the cards is missing.
    pub fn remove_all(&mut self, cards: &[TrainColor]) -> Result<()> {
        if !self.contains_all(cards) {
            return Err(GameError::InvariantViolation(format!(
                "Cannot spend {:?} from a hand of {}.",
                cards, self
            )));
        }

        for card in cards {
            self.0[card.index()] -= 1;
        }
        Ok(())
    }

    /// Colors with at least one card, alongside their count, in index order.
    pub fn iter(&self) -> impl Iterator<Item = (TrainColor, u8)> + '_ {
        TrainColor::iter()
            .map(|color| (color, self.count(color)))
            .filter(|(_, count)| *count > 0)
    }

    /// Raw counts, indexed by [`TrainColor::index`].
    #[inline]
    pub fn counts(&self) -> &[u8; NUM_TRAIN_COLORS] {
        &self.0
    }
}

impl FromIterator<TrainColor> for TrainCards {
    fn from_iter<I: IntoIterator<Item = TrainColor>>(iter: I) -> Self {
        let mut train_cards = TrainCards::default();
        for color in iter {
            train_cards.add(color);
        }
        train_cards
    }
}

impl fmt::Display for TrainCards {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (color, count)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", color, count)?;
        }
        write!(f, "}}")
    }
}

/// One row of a [`CardEstimate`]: a count per color, followed by the number of cards of unknown color.
pub type CardEstimateRow = [u8; NUM_TRAIN_COLORS + 1];

/// What a player can deduce about the train cards held by every player.
///
/// Cards taken from the open deck are seen by everyone, so their color is known.
/// Cards drawn from the close deck by someone else are only known to exist.
/// When a player spends cards on a route, those are taken from the known colors first,
/// then from the unknown bucket.
///
/// This is a deduction aid, never authoritative game state.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CardEstimate {
    rows: SmallVec<[CardEstimateRow; MAX_PLAYERS]>,
}

impl CardEstimate {
    /// Every player starts with their initial train cards, unseen by others.
    pub fn new(num_players: usize) -> Self {
        let mut row = [0; NUM_TRAIN_COLORS + 1];
        row[UNKNOWN_CARDS] = NUM_DRAWN_INITIAL_TRAIN_CARDS as u8;

        Self {
            rows: smallvec![row; num_players],
        }
    }

    #[inline]
    pub fn row(&self, player_id: usize) -> Option<&CardEstimateRow> {
        self.rows.get(player_id)
    }

    #[inline]
    pub fn rows(&self) -> &[CardEstimateRow] {
        &self.rows
    }

    /// Number of cards a player is known to hold, of any color, unknown ones included.
    pub fn num_cards(&self, player_id: usize) -> usize {
        self.row(player_id)
            .map_or(0, |row| row.iter().map(|count| *count as usize).sum())
    }

    /// `player_id` took a card whose color everyone saw.
    pub fn record_known_draw(&mut self, player_id: usize, color: TrainColor) {
        if let Some(row) = self.rows.get_mut(player_id) {
            row[color.index()] += 1;
        }
    }

    /// `player_id` drew a card whose color was not revealed.
    pub fn record_unknown_draw(&mut self, player_id: usize) {
        if let Some(row) = self.rows.get_mut(player_id) {
            row[UNKNOWN_CARDS] += 1;
        }
    }

    /// `player_id` spent the given cards on a route.
    pub fn record_spent_cards(&mut self, player_id: usize, cards: &[TrainColor]) {
        if let Some(row) = self.rows.get_mut(player_id) {
            for card in cards {
                if row[card.index()] > 0 {
                    row[card.index()] -= 1;
                } else {
                    row[UNKNOWN_CARDS] = row[UNKNOWN_CARDS].saturating_sub(1);
                }
            }
        }
    }

    /// Replaces a row by exact knowledge of a hand.
    pub fn mirror_hand(&mut self, player_id: usize, hand: &TrainCards) {
        if let Some(row) = self.rows.get_mut(player_id) {
            row[..NUM_TRAIN_COLORS].copy_from_slice(hand.counts());
            row[UNKNOWN_CARDS] = 0;
        }
    }
}

/// Information about a player's state that is visible to all players.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PublicPlayerState {
    pub id: usize,
    pub turn_order: usize,
    /// The number of cars the player has left.
    /// This is the currency used, alongside train cards, to claim routes.
    pub trains_left: u8,
    /// How many points the player has so far, destination holding costs included.
    pub score: i32,
    pub num_train_cards: usize,
    pub num_destination_cards: usize,
}

/// Everything about a player: their cards, their destinations, and their deductions about others.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlayerState {
    id: usize,
    turn_order: usize,
    hand: TrainCards,
    destination_hand: Vec<DestinationCard>,
    trains_left: u8,
    /// Points gained by claiming routes, minus the points of destination cards held.
    /// At the end of the game, the points of fulfilled destination cards are granted back.
    score: i32,
    card_estimate: CardEstimate,
}

impl PlayerState {
    pub fn new(id: usize, turn_order: usize, num_players: usize, trains_left: u8) -> Self {
        Self {
            id,
            turn_order,
            hand: TrainCards::default(),
            destination_hand: Vec::new(),
            trains_left,
            score: 0,
            card_estimate: CardEstimate::new(num_players),
        }
    }

    /// Hands the initial train cards to the player.
    pub fn initialize_when_game_starts(&mut self, train_cards: &[TrainColor]) {
        for card in train_cards {
            self.hand.add(*card);
        }
        self.card_estimate.mirror_hand(self.id, &self.hand);
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn turn_order(&self) -> usize {
        self.turn_order
    }

    #[inline]
    pub fn hand(&self) -> &TrainCards {
        &self.hand
    }

    #[inline]
    pub fn destination_hand(&self) -> &[DestinationCard] {
        &self.destination_hand
    }

    #[inline]
    pub fn trains_left(&self) -> u8 {
        self.trains_left
    }

    #[inline]
    pub fn score(&self) -> i32 {
        self.score
    }

    #[inline]
    pub fn card_estimate(&self) -> &CardEstimate {
        &self.card_estimate
    }

    /// Adds a train card to the player's hand.
    pub fn draw_train_card(&mut self, card: TrainColor) {
        self.hand.add(card);
        self.card_estimate.mirror_hand(self.id, &self.hand);
    }

    /// Pays for a route of the given length with `cards`, and grants the corresponding points.
    ///
    /// The caller is in charge of checking that the payment matches the route.
    ///
    /// # Example
    /// ```
    /// use ticket_to_ride_mcts::card::TrainColor;
    /// use ticket_to_ride_mcts::player::PlayerState;
    ///
    /// let mut player = PlayerState::new(0, 0, 2, 45);
    /// player.initialize_when_game_starts(&[TrainColor::Red, TrainColor::Red, TrainColor::Wild]);
    ///
    /// assert!(player.claim_route(3, &[TrainColor::Red, TrainColor::Red, TrainColor::Wild]).is_ok());
    /// assert_eq!(player.trains_left(), 42);
    /// assert_eq!(player.score(), 4);
    /// assert!(player.hand().is_empty());
    /// ```
    pub fn claim_route(&mut self, length: u8, cards: &[TrainColor]) -> Result<()> {
        if self.trains_left < length {
            return Err(GameError::InvariantViolation(format!(
                "Player {} has {} cars left, and cannot claim a route of length {}.",
                self.id, self.trains_left, length
            )));
        }

        if cards.len() != length as usize {
            return Err(GameError::InvariantViolation(format!(
                "A route of length {} needs {} cards, but {} were provided.",
                length,
                length,
                cards.len()
            )));
        }

        self.hand.remove_all(cards)?;
        self.card_estimate.mirror_hand(self.id, &self.hand);
        self.trains_left -= length;
        self.score += Map::calculate_points_for_claimed_route(length);

        Ok(())
    }

    /// Adds the selected destination cards to the player's hand of destinations.
    /// Their points are withheld until the end of the game.
    pub fn select_destination_cards(&mut self, destination_cards: &[DestinationCard]) {
        for destination_card in destination_cards {
            self.score -= destination_card.points as i32;
            self.destination_hand.push(*destination_card);
        }
    }

    /// Grants points, e.g. for a fulfilled destination card, or a bonus.
    pub fn add_points(&mut self, points: i32) {
        self.score += points;
    }

    /// Another player took a face-up card.
    pub fn observe_known_draw(&mut self, player_id: usize, card: TrainColor) {
        if player_id != self.id {
            self.card_estimate.record_known_draw(player_id, card);
        }
    }

    /// Another player drew from the close deck.
    pub fn observe_unknown_draw(&mut self, player_id: usize) {
        if player_id != self.id {
            self.card_estimate.record_unknown_draw(player_id);
        }
    }

    /// Another player spent cards on a route.
    pub fn observe_spent_cards(&mut self, player_id: usize, cards: &[TrainColor]) {
        if player_id != self.id {
            self.card_estimate.record_spent_cards(player_id, cards);
        }
    }

    pub fn get_public_state(&self) -> PublicPlayerState {
        PublicPlayerState {
            id: self.id,
            turn_order: self.turn_order,
            trains_left: self.trains_left,
            score: self.score,
            num_train_cards: self.hand.len(),
            num_destination_cards: self.destination_hand.len(),
        }
    }

    /// Mutable accessor to the player's hand of train cards.
    /// The card estimate is not kept in sync.
    ///
    /// Should only be used for testing!
    pub fn get_mut_hand(&mut self) -> &mut TrainCards {
        &mut self.hand
    }

    /// Mutable accessor to the number of cars left.
    ///
    /// Should only be used for testing!
    pub fn get_mut_trains_left(&mut self) -> &mut u8 {
        &mut self.trains_left
    }

    /// Mutable accessor to the player's destination cards.
    ///
    /// Should only be used for testing!
    pub fn get_mut_destination_hand(&mut self) -> &mut Vec<DestinationCard> {
        &mut self.destination_hand
    }
}
