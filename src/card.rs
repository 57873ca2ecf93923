use crate::city::CityToCity;
use crate::error::{GameError, Result};

use array_init::try_array_init;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::iter::repeat;
use strum::{EnumCount, IntoEnumIterator};
use strum_macros::{Display, EnumCount as EnumCountMacro, EnumIter, EnumString};

pub const NUM_OPEN_TRAIN_CARDS: usize = 5;
pub const NUM_DRAWN_DESTINATION_CARDS: usize = 3;
pub const NUM_DRAWN_INITIAL_TRAIN_CARDS: usize = 4;
pub const NUM_WILD_CARDS: usize = 14;
pub const NUM_NON_WILD_CARDS: usize = 12;
/// 12 cards for each of the 8 colors, and 14 wild cards.
pub const NUM_TRAIN_CARDS: usize = 110;
/// Number of distinct train card variants, wild included.
pub const NUM_TRAIN_COLORS: usize = TrainColor::COUNT;

/// Represents the different variants of train cards.
///
/// The declaration order is meaningful: [`TrainColor::index`] is used to lay out
/// per-color vectors, e.g. a hand of cards, or an evaluator's color desire.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    EnumCountMacro,
    EnumIter,
    EnumString,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[repr(u8)]
pub enum TrainColor {
    /// Also known as the *Hopper train*.
    Black,
    /// Also known as the *Tanker train*.
    Blue,
    /// Also known as the *Caboose train*.
    Green,
    /// Also known as the *Freight train*.
    Orange,
    /// Also known as the *Box train*.
    Pink,
    /// Also known as the *Coal train*.
    Red,
    /// Also known as the *Passenger train*.
    White,
    /// Also known as the *Reefer train*.
    Yellow,
    /// Also known as the *Locomotive*.
    /// This is a special train that matches with any color.
    ///
    /// On a [`crate::map::Route`], it denotes a gray route, which accepts any single color.
    Wild,
}

impl TrainColor {
    /// Whether the current color is wild, i.e. matches with any color.
    ///
    /// # Examples:
    /// ```
    /// use ticket_to_ride_mcts::card::TrainColor;
    ///
    /// let color = TrainColor::Black;
    /// assert!(!color.is_wild());
    ///
    /// let wild_color = TrainColor::Wild;
    /// assert!(wild_color.is_wild());
    /// ```
    #[inline]
    pub fn is_wild(&self) -> bool {
        *self == TrainColor::Wild
    }

    /// The opposite of `is_wild`.
    #[inline]
    pub fn is_not_wild(&self) -> bool {
        !self.is_wild()
    }

    /// Position of this color in per-color vectors.
    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// All eight non-wild colors, in index order.
    pub fn non_wild() -> impl Iterator<Item = TrainColor> {
        TrainColor::iter().filter(TrainColor::is_not_wild)
    }
}

/// Encapsulates information about a destination card.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct DestinationCard {
    /// The two cities that must be connected to fulfill the destination card.
    pub destination: CityToCity,
    /// How many points are granted once this card is fulfilled.
    /// If not fulfilled, the same amount is rather substracted.
    pub points: u8,
    /// Stable position of the card in the map's destination list.
    pub index: usize,
}

/// Up to three destination cards dealt at once.
pub type DestinationDeal = SmallVec<[DestinationCard; NUM_DRAWN_DESTINATION_CARDS]>;

/// Public information about the decks, visible to every player.
#[derive(Debug, PartialEq, Serialize)]
pub struct CardDealerState<'a> {
    pub open_train_card_deck: &'a [TrainColor],
    pub close_train_card_deck_size: usize,
    pub destination_card_deck_size: usize,
}

/// Entity in charge of dealing train and destination cards.
///
/// Both piles are queues: cards are drawn from the front, and returned cards go to the back.
/// Spent train cards leave the game, so a pile that runs out stays empty for the rest of the game.
///
/// Cloning a `CardDealer` copies every pile, so clones never observe each other's draws.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CardDealer {
    open_train_card_deck: SmallVec<[TrainColor; NUM_OPEN_TRAIN_CARDS]>,
    close_train_card_deck: VecDeque<TrainColor>,
    destination_card_deck: VecDeque<DestinationCard>,
}

impl CardDealer {
    /// Creates a new `CardDealer` with all 110 train cards and the given destination cards shuffled,
    /// and five train cards already face up.
    ///
    /// # Example
    /// ```
    /// use rand::SeedableRng;
    /// use rand_chacha::ChaCha8Rng;
    /// use ticket_to_ride_mcts::card::CardDealer;
    ///
    /// let mut rng = ChaCha8Rng::seed_from_u64(7);
    /// let card_dealer = CardDealer::new(&[], &mut rng);
    ///
    /// assert_eq!(card_dealer.open_train_cards().len(), 5);
    /// assert_eq!(card_dealer.close_train_card_deck_len(), 105);
    /// ```
    pub fn new<R: Rng + ?Sized>(destination_cards: &[DestinationCard], rng: &mut R) -> Self {
        let mut all_train_cards = Vec::with_capacity(NUM_TRAIN_CARDS);

        for color in TrainColor::iter() {
            let num_of_train_cards_per_color = if color.is_wild() {
                NUM_WILD_CARDS
            } else {
                NUM_NON_WILD_CARDS
            };
            all_train_cards.extend(repeat(color).take(num_of_train_cards_per_color));
        }

        all_train_cards.shuffle(rng);

        let mut destination_cards = destination_cards.to_vec();
        destination_cards.shuffle(rng);

        let mut close_train_card_deck = VecDeque::from(all_train_cards);
        let open_train_card_deck = close_train_card_deck
            .drain(..NUM_OPEN_TRAIN_CARDS)
            .collect();

        Self {
            open_train_card_deck,
            close_train_card_deck,
            destination_card_deck: VecDeque::from(destination_cards),
        }
    }

    /// Builds a `CardDealer` from explicit piles, front of each queue first.
    /// Useful to set up specific scenarios.
    pub fn from_parts(
        open_train_cards: impl IntoIterator<Item = TrainColor>,
        close_train_cards: impl IntoIterator<Item = TrainColor>,
        destination_cards: impl IntoIterator<Item = DestinationCard>,
    ) -> Self {
        Self {
            open_train_card_deck: open_train_cards.into_iter().collect(),
            close_train_card_deck: close_train_cards.into_iter().collect(),
            destination_card_deck: destination_cards.into_iter().collect(),
        }
    }

    /// Draws from the front of the close train card deck, and returns the card.
    ///
    /// If there are no more cards left in that deck, returns [`GameError::DeckEmpty`].
    pub fn draw_from_close_train_card_deck(&mut self) -> Result<TrainColor> {
        self.close_train_card_deck
            .pop_front()
            .ok_or(GameError::DeckEmpty)
    }

    /// Takes a face-up train card of the given color, then refills the open deck.
    ///
    /// If several face-up cards share that color, the first one is taken.
    pub fn draw_from_open_train_card_deck(&mut self, color: TrainColor) -> Result<TrainColor> {
        let position = self
            .open_train_card_deck
            .iter()
            .position(|card| *card == color)
            .ok_or_else(|| {
                GameError::InvariantViolation(format!("No {} train card is face up.", color))
            })?;

        let card = self.open_train_card_deck.remove(position);
        self.refill_open_train_card_deck();

        Ok(card)
    }

    /// Appends the top card of the close deck to the open deck, if there is one.
    /// Once the close deck is empty, the open deck simply shrinks.
    pub fn refill_open_train_card_deck(&mut self) {
        if let Some(card) = self.close_train_card_deck.pop_front() {
            self.open_train_card_deck.push(card);
        }
    }

    /// Deals three destination cards from the front of the destination deck.
    ///
    /// If fewer than three cards are left, nothing is dealt and [`GameError::DeckEmpty`] is returned:
    /// drawing destination cards is then unavailable for the rest of the game.
    pub fn draw_from_destination_card_deck(&mut self) -> Result<DestinationDeal> {
        if !self.can_draw_destination_cards() {
            return Err(GameError::DeckEmpty);
        }

        Ok(self
            .destination_card_deck
            .drain(..NUM_DRAWN_DESTINATION_CARDS)
            .collect())
    }

    /// The first draw of a player, when the game starts, returns four train cards.
    pub fn initial_draw(&mut self) -> Result<[TrainColor; NUM_DRAWN_INITIAL_TRAIN_CARDS]> {
        try_array_init(|_| self.draw_from_close_train_card_deck())
    }

    /// Adds the given destination cards to the bottom of the destination cards deck.
    ///
    /// # Example
    /// ```
    /// use rand::SeedableRng;
    /// use rand_chacha::ChaCha8Rng;
    /// use ticket_to_ride_mcts::card::{CardDealer, DestinationCard};
    /// use ticket_to_ride_mcts::city::City;
    ///
    /// let mut card_dealer = CardDealer::new(&[], &mut ChaCha8Rng::seed_from_u64(0));
    /// let returned = DestinationCard {
    ///     destination: (City(0), City(1)),
    ///     points: 9,
    ///     index: 0,
    /// };
    ///
    /// card_dealer.discard_destination_cards([returned]);
    /// assert_eq!(card_dealer.destination_card_deck_len(), 1);
    /// ```
    pub fn discard_destination_cards(
        &mut self,
        destination_cards: impl IntoIterator<Item = DestinationCard>,
    ) {
        self.destination_card_deck.extend(destination_cards);
    }

    #[inline]
    pub fn open_train_cards(&self) -> &[TrainColor] {
        &self.open_train_card_deck
    }

    #[inline]
    pub fn close_train_card_deck_len(&self) -> usize {
        self.close_train_card_deck.len()
    }

    #[inline]
    pub fn destination_card_deck_len(&self) -> usize {
        self.destination_card_deck.len()
    }

    #[inline]
    pub fn can_draw_from_close_train_card_deck(&self) -> bool {
        !self.close_train_card_deck.is_empty()
    }

    #[inline]
    pub fn can_draw_destination_cards(&self) -> bool {
        self.destination_card_deck.len() >= NUM_DRAWN_DESTINATION_CARDS
    }

    /// Distinct colors currently face up, in index order.
    pub fn open_train_card_colors(&self) -> SmallVec<[TrainColor; NUM_OPEN_TRAIN_CARDS]> {
        let mut colors: SmallVec<[TrainColor; NUM_OPEN_TRAIN_CARDS]> =
            self.open_train_card_deck.iter().copied().collect();
        colors.sort_unstable();
        colors.dedup();
        colors
    }

    /// Predicate that determines whether a player could draw a second train card this turn.
    ///
    /// A wild card is never allowed as the second draw, so if the close deck is empty and
    /// the only cards left face up are wild cards, the player cannot draw again.
    #[inline]
    pub fn can_player_draw_again_this_turn(&self) -> bool {
        self.can_draw_from_close_train_card_deck()
            || self.open_train_card_deck.iter().any(TrainColor::is_not_wild)
    }

    /// Mutable accessor to the open train card deck.
    ///
    /// Should only be used for testing!
    pub fn get_mut_open_train_card_deck(
        &mut self,
    ) -> &mut SmallVec<[TrainColor; NUM_OPEN_TRAIN_CARDS]> {
        &mut self.open_train_card_deck
    }

    /// Mutable accessor to the close train card deck.
    ///
    /// Should only be used for testing!
    pub fn get_mut_close_train_card_deck(&mut self) -> &mut VecDeque<TrainColor> {
        &mut self.close_train_card_deck
    }

    /// Mutable accessor to the destination card deck.
    ///
    /// Should only be used for testing!
    pub fn get_mut_destination_card_deck(&mut self) -> &mut VecDeque<DestinationCard> {
        &mut self.destination_card_deck
    }

    pub fn get_state(&self) -> CardDealerState {
        CardDealerState {
            open_train_card_deck: &self.open_train_card_deck,
            close_train_card_deck_size: self.close_train_card_deck.len(),
            destination_card_deck_size: self.destination_card_deck.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::city::City;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    fn destination_card(start: u16, end: u16, points: u8, index: usize) -> DestinationCard {
        DestinationCard {
            destination: (City(start), City(end)),
            points,
            index,
        }
    }

    fn destination_cards(n: usize) -> Vec<DestinationCard> {
        (0..n)
            .map(|i| destination_card(i as u16, i as u16 + 1, i as u8 + 1, i))
            .collect()
    }

    // Tests for `TrainColor`.

    #[test]
    fn train_color_to_string() {
        assert_eq!(TrainColor::Orange.to_string(), "orange");
        assert_eq!(TrainColor::Pink.to_string(), "pink");
    }

    #[test]
    fn train_color_from_str() {
        assert_eq!("BLUE".parse::<TrainColor>(), Ok(TrainColor::Blue));
        assert_eq!("wild".parse::<TrainColor>(), Ok(TrainColor::Wild));
        assert!("GRAY".parse::<TrainColor>().is_err());
    }

    #[test]
    fn train_color_to_json() -> serde_json::Result<()> {
        assert_eq!(serde_json::to_string(&TrainColor::Blue)?, r#""blue""#);
        assert_eq!(serde_json::to_string(&TrainColor::Red)?, r#""red""#);
        Ok(())
    }

    #[test]
    fn json_to_train_color() -> serde_json::Result<()> {
        assert_eq!(
            serde_json::from_str::<TrainColor>(r#""wild""#)?,
            TrainColor::Wild
        );
        assert_eq!(
            serde_json::from_str::<TrainColor>(r#""green""#)?,
            TrainColor::Green
        );

        Ok(())
    }

    #[test]
    fn invalid_json_to_train_color() {
        assert!(serde_json::from_str::<TrainColor>(r#""turquoise""#).is_err());
    }

    #[test]
    fn train_color_indices() {
        assert_eq!(NUM_TRAIN_COLORS, 9);
        for (i, color) in TrainColor::iter().enumerate() {
            assert_eq!(color.index(), i);
        }
        assert_eq!(TrainColor::Wild.index(), 8);
        assert_eq!(TrainColor::non_wild().count(), 8);
    }

    // Tests for `CardDealer`.

    #[test]
    fn new_card_dealer() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let card_dealer = CardDealer::new(&destination_cards(30), &mut rng);

        assert_eq!(card_dealer.open_train_card_deck.len(), NUM_OPEN_TRAIN_CARDS);
        // 110 cards total, minus 5 in the open train card deck.
        assert_eq!(card_dealer.close_train_card_deck.len(), 105);
        assert_eq!(card_dealer.destination_card_deck.len(), 30);

        let mut num_train_cards_per_color = HashMap::new();
        for train_card in card_dealer
            .open_train_card_deck
            .iter()
            .chain(card_dealer.close_train_card_deck.iter())
        {
            *num_train_cards_per_color.entry(*train_card).or_insert(0) += 1;
        }

        for color in TrainColor::iter() {
            let expected_num = if color.is_wild() {
                NUM_WILD_CARDS
            } else {
                NUM_NON_WILD_CARDS
            };
            assert_eq!(num_train_cards_per_color[&color], expected_num);
        }
    }

    #[test]
    fn new_card_dealer_is_reproducible() {
        let first = CardDealer::new(&destination_cards(30), &mut ChaCha8Rng::seed_from_u64(3));
        let second = CardDealer::new(&destination_cards(30), &mut ChaCha8Rng::seed_from_u64(3));
        let third = CardDealer::new(&destination_cards(30), &mut ChaCha8Rng::seed_from_u64(4));

        assert_eq!(first, second);
        assert_ne!(first.close_train_card_deck, third.close_train_card_deck);
    }

    #[test]
    fn card_dealer_draw_from_close_deck() {
        let mut card_dealer =
            CardDealer::from_parts([], [TrainColor::Blue, TrainColor::Red], []);

        assert_eq!(
            card_dealer.draw_from_close_train_card_deck(),
            Ok(TrainColor::Blue)
        );
        assert_eq!(
            card_dealer.draw_from_close_train_card_deck(),
            Ok(TrainColor::Red)
        );
        assert_eq!(
            card_dealer.draw_from_close_train_card_deck(),
            Err(GameError::DeckEmpty)
        );
    }

    #[test]
    fn card_dealer_draw_from_open_deck_refills() {
        let mut card_dealer = CardDealer::from_parts(
            [TrainColor::White, TrainColor::Wild, TrainColor::White],
            [TrainColor::Green],
            [],
        );

        assert_eq!(
            card_dealer.draw_from_open_train_card_deck(TrainColor::White),
            Ok(TrainColor::White)
        );
        assert_eq!(
            card_dealer.open_train_cards(),
            &[TrainColor::Wild, TrainColor::White, TrainColor::Green]
        );
        assert!(!card_dealer.can_draw_from_close_train_card_deck());
    }

    #[test]
    fn card_dealer_draw_from_open_deck_empty_close_deck() {
        let mut card_dealer =
            CardDealer::from_parts([TrainColor::White, TrainColor::Black], [], []);

        assert_eq!(
            card_dealer.draw_from_open_train_card_deck(TrainColor::Black),
            Ok(TrainColor::Black)
        );
        assert_eq!(card_dealer.open_train_cards(), &[TrainColor::White]);
    }

    #[test]
    fn card_dealer_draw_from_open_deck_missing_color() {
        let mut card_dealer = CardDealer::from_parts([TrainColor::White], [], []);

        assert!(card_dealer
            .draw_from_open_train_card_deck(TrainColor::Red)
            .is_err());
        assert_eq!(card_dealer.open_train_cards(), &[TrainColor::White]);
    }

    #[test]
    fn card_dealer_open_train_card_colors() {
        let card_dealer = CardDealer::from_parts(
            [
                TrainColor::Wild,
                TrainColor::Red,
                TrainColor::Black,
                TrainColor::Red,
                TrainColor::Wild,
            ],
            [],
            [],
        );

        assert_eq!(
            card_dealer.open_train_card_colors().as_slice(),
            &[TrainColor::Black, TrainColor::Red, TrainColor::Wild]
        );
    }

    #[test]
    fn card_dealer_can_draw_again() {
        let mut card_dealer = CardDealer::from_parts([TrainColor::Wild], [], []);
        assert!(!card_dealer.can_player_draw_again_this_turn());

        card_dealer.get_mut_open_train_card_deck().push(TrainColor::Pink);
        assert!(card_dealer.can_player_draw_again_this_turn());

        card_dealer.get_mut_open_train_card_deck().clear();
        card_dealer
            .get_mut_close_train_card_deck()
            .push_back(TrainColor::Wild);
        assert!(card_dealer.can_player_draw_again_this_turn());
    }

    #[test]
    fn card_dealer_draw_destination_cards() {
        let cards = destination_cards(4);
        let mut card_dealer = CardDealer::from_parts([], [], cards.clone());

        let expected: DestinationDeal = cards[..3].iter().copied().collect();
        assert_eq!(card_dealer.draw_from_destination_card_deck(), Ok(expected));
        assert_eq!(card_dealer.destination_card_deck_len(), 1);
        assert!(!card_dealer.can_draw_destination_cards());
        assert_eq!(
            card_dealer.draw_from_destination_card_deck(),
            Err(GameError::DeckEmpty)
        );
        // Nothing was dealt.
        assert_eq!(card_dealer.destination_card_deck_len(), 1);
    }

    #[test]
    fn card_dealer_discarded_destination_cards_go_to_the_bottom() {
        let cards = destination_cards(5);
        let mut card_dealer = CardDealer::from_parts([], [], cards[..3].to_vec());

        card_dealer.discard_destination_cards([cards[3], cards[4]]);

        assert_eq!(
            card_dealer.get_mut_destination_card_deck().back(),
            Some(&cards[4])
        );
        assert_eq!(
            card_dealer.get_mut_destination_card_deck().front(),
            Some(&cards[0])
        );
    }

    #[test]
    fn card_dealer_initial_draw() {
        let mut card_dealer = CardDealer::new(&[], &mut ChaCha8Rng::seed_from_u64(11));
        let expected: Vec<_> = card_dealer
            .close_train_card_deck
            .iter()
            .take(NUM_DRAWN_INITIAL_TRAIN_CARDS)
            .copied()
            .collect();

        let drawn = card_dealer.initial_draw().unwrap();
        assert_eq!(drawn.to_vec(), expected);
        assert_eq!(card_dealer.close_train_card_deck_len(), 101);
    }

    #[test]
    fn card_dealer_initial_draw_not_enough_cards() {
        let mut card_dealer = CardDealer::from_parts([], [TrainColor::Red; 3], []);
        assert_eq!(card_dealer.initial_draw(), Err(GameError::DeckEmpty));
    }

    #[test]
    fn card_dealer_state() {
        let card_dealer = CardDealer::from_parts(
            [TrainColor::Red],
            [TrainColor::Blue, TrainColor::Blue],
            destination_cards(3),
        );

        assert_eq!(
            card_dealer.get_state(),
            CardDealerState {
                open_train_card_deck: &[TrainColor::Red],
                close_train_card_deck_size: 2,
                destination_card_deck_size: 3,
            }
        );
    }
}
