use crate::action::{
    destination_selections, is_valid_payment, place_route_actions, Action,
    DestinationSelection,
};
use crate::card::{CardDealer, DestinationCard, TrainColor, NUM_DRAWN_DESTINATION_CARDS};
use crate::error::{GameError, Result};
use crate::game_phase::{GamePhase, PendingSubAction};
use crate::loader::MapData;
use crate::map::{Map, MAX_PLAYERS};
use crate::player::{PlayerState, NUM_OF_CARS};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::mem;
use std::sync::Arc;

/// Tunable rules of a game.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct GameConfig {
    /// Cars each player starts with.
    pub trains_per_player: u8,
    /// Smallest number of destination cards kept during setup.
    pub min_initial_destinations: usize,
    /// Smallest number of destination cards kept after drawing some during the game.
    pub min_destinations: usize,
    /// Once a player has strictly less cars than this, the last round starts.
    pub last_round_threshold: u8,
    /// Points granted to the player(s) with the longest continuous path, if any.
    pub longest_route_bonus: Option<i32>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            trains_per_player: NUM_OF_CARS,
            min_initial_destinations: 1,
            min_destinations: 1,
            last_round_threshold: 3,
            longest_route_bonus: None,
        }
    }
}

impl GameConfig {
    fn validate(&self) -> Result<()> {
        let valid_range = 1..=NUM_DRAWN_DESTINATION_CARDS;
        if !valid_range.contains(&self.min_initial_destinations)
            || !valid_range.contains(&self.min_destinations)
        {
            return Err(GameError::InvariantViolation(format!(
                "Players must keep between 1 and {} destination cards.",
                NUM_DRAWN_DESTINATION_CARDS
            )));
        }

        Ok(())
    }
}

/// The whole state of a game: board, decks, players, and whose turn it is.
///
/// A `GameState` only changes through [`GameState::apply`], which returns a new state.
/// Cloning a `GameState` deep-copies the board ownership, every deck and every hand,
/// so a clone never observes changes made to another one.
#[derive(Clone, Debug, PartialEq)]
pub struct GameState {
    map: Map,
    card_dealer: CardDealer,
    players: SmallVec<[PlayerState; MAX_PLAYERS]>,
    /// Number of completed turns since setup ended.
    turn: u32,
    active_player: usize,
    phase: GamePhase,
    pending: PendingSubAction,
    last_round_triggered_by: Option<usize>,
    /// Once the last round started, how many turns are left to play after the current one.
    final_turns_remaining: Option<usize>,
    is_over: bool,
    /// Every destination card of the map, dealt or not, by index.
    destination_cards: Arc<[DestinationCard]>,
    config: GameConfig,
}

impl GameState {
    /// Creates a new game: shuffles the decks, deals four train cards to every player,
    /// then deals three destination cards to the first player.
    ///
    /// Every player, in turn order, must then select their initial destination cards,
    /// before player 0 starts the first turn.
    ///
    /// # Example
    /// ```
    /// use rand::SeedableRng;
    /// use rand_chacha::ChaCha8Rng;
    /// use ticket_to_ride_mcts::game_phase::GamePhase;
    /// use ticket_to_ride_mcts::game_state::{GameConfig, GameState};
    /// use ticket_to_ride_mcts::loader::MapData;
    ///
    /// let mut rng = ChaCha8Rng::seed_from_u64(42);
    /// let state = GameState::new(MapData::usa().unwrap(), 2, GameConfig::default(), &mut rng).unwrap();
    ///
    /// assert_eq!(state.phase(), GamePhase::Setup);
    /// assert_eq!(state.active_player(), 0);
    /// // Seven ways to keep at least one of the three dealt destination cards.
    /// assert_eq!(state.legal_actions().len(), 7);
    /// ```
    pub fn new<R: Rng + ?Sized>(
        map_data: &MapData,
        num_players: usize,
        config: GameConfig,
        rng: &mut R,
    ) -> Result<Self> {
        config.validate()?;
        let map = Map::new(map_data, num_players)?;

        let destination_cards = map_data.destination_cards();
        if destination_cards.len() < NUM_DRAWN_DESTINATION_CARDS * num_players {
            return Err(GameError::MalformedMapData {
                line: 0,
                reason: format!(
                    "{} destination cards are not enough for {} players.",
                    destination_cards.len(),
                    num_players
                ),
            });
        }

        let mut card_dealer = CardDealer::new(&destination_cards, rng);

        let mut players = SmallVec::new();
        for id in 0..num_players {
            let mut player = PlayerState::new(id, id, num_players, config.trains_per_player);
            player.initialize_when_game_starts(&card_dealer.initial_draw()?);
            players.push(player);
        }

        let mut state = Self {
            map,
            card_dealer,
            players,
            turn: 0,
            active_player: 0,
            phase: GamePhase::Setup,
            pending: PendingSubAction::None,
            last_round_triggered_by: None,
            final_turns_remaining: None,
            is_over: false,
            destination_cards: destination_cards.into(),
            config,
        };
        state.deal_destination_cards()?;

        debug!("Created a new game with {} players.", num_players);
        Ok(state)
    }

    /// Same as [`GameState::new`], with all shuffles driven by a `ChaCha8Rng` seeded from `seed`.
    pub fn from_seed(
        map_data: &MapData,
        num_players: usize,
        config: GameConfig,
        seed: u64,
    ) -> Result<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Self::new(map_data, num_players, config, &mut rng)
    }

    /// Rebuilds a game from its seed and the ordered list of actions that were applied to it.
    pub fn replay<'a>(
        map_data: &MapData,
        num_players: usize,
        config: GameConfig,
        seed: u64,
        actions: impl IntoIterator<Item = &'a Action>,
    ) -> Result<Self> {
        actions.into_iter().try_fold(
            Self::from_seed(map_data, num_players, config, seed)?,
            |state, action| state.apply(action),
        )
    }

    #[inline]
    pub fn map(&self) -> &Map {
        &self.map
    }

    #[inline]
    pub fn card_dealer(&self) -> &CardDealer {
        &self.card_dealer
    }

    #[inline]
    pub fn players(&self) -> &[PlayerState] {
        &self.players
    }

    #[inline]
    pub fn player(&self, player_id: usize) -> Option<&PlayerState> {
        self.players.get(player_id)
    }

    #[inline]
    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    #[inline]
    pub fn active_player(&self) -> usize {
        self.active_player
    }

    #[inline]
    pub fn turn(&self) -> u32 {
        self.turn
    }

    #[inline]
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    #[inline]
    pub fn pending(&self) -> &PendingSubAction {
        &self.pending
    }

    #[inline]
    pub fn last_round_triggered_by(&self) -> Option<usize> {
        self.last_round_triggered_by
    }

    #[inline]
    pub fn is_over(&self) -> bool {
        self.is_over
    }

    #[inline]
    pub fn num_destination_cards(&self) -> usize {
        self.destination_cards.len()
    }

    #[inline]
    pub fn destination_card(&self, index: usize) -> Option<&DestinationCard> {
        self.destination_cards.get(index)
    }

    #[inline]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    fn active_player_state(&self) -> &PlayerState {
        &self.players[self.active_player]
    }

    fn min_destinations_to_keep(&self) -> usize {
        if self.phase == GamePhase::Setup {
            self.config.min_initial_destinations
        } else {
            self.config.min_destinations
        }
    }

    /// Every action the active player may take right now.
    ///
    /// Empty once the game is over. Drawing from an exhausted deck is simply not offered.
    pub fn legal_actions(&self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.is_over {
            return actions;
        }

        match &self.pending {
            PendingSubAction::None => {
                place_route_actions(&self.map, self.active_player_state(), &mut actions);

                actions.extend(
                    self.card_dealer
                        .open_train_card_colors()
                        .into_iter()
                        .map(|color| Action::DrawFaceUp { color }),
                );

                if self.card_dealer.can_draw_from_close_train_card_deck() {
                    actions.push(Action::DrawBlind);
                }

                if self.card_dealer.can_draw_destination_cards() {
                    actions.push(Action::DrawDestinations);
                }
            }
            PendingSubAction::AwaitingSecondDraw { picked_wild: false } => {
                actions.extend(
                    self.card_dealer
                        .open_train_card_colors()
                        .into_iter()
                        .filter(TrainColor::is_not_wild)
                        .map(|color| Action::DrawFaceUp { color }),
                );

                if self.card_dealer.can_draw_from_close_train_card_deck() {
                    actions.push(Action::DrawBlind);
                }
            }
            PendingSubAction::AwaitingSecondDraw { picked_wild: true } => {}
            PendingSubAction::AwaitingDestinationSelection { dealt } => {
                let min_destinations = self.min_destinations_to_keep();
                actions.extend(
                    destination_selections(dealt.len())
                        .into_iter()
                        .filter(|keep| keep.len() >= min_destinations)
                        .map(|keep| Action::SelectDestinations { keep }),
                );
            }
        }

        actions
    }

    /// Whether `action` is one of [`GameState::legal_actions`], without enumerating them all.
    pub fn is_legal(&self, action: &Action) -> bool {
        if self.is_over {
            return false;
        }

        match (&self.pending, action) {
            (PendingSubAction::None, Action::PlaceRoute { route, cards }) => {
                let player = self.active_player_state();
                match self.map.route(*route) {
                    Some(claimed_route) => {
                        claimed_route.length <= player.trains_left()
                            && self.map.is_claimable(*route, player.id())
                            && is_valid_payment(claimed_route, cards)
                            && player.hand().contains_all(cards)
                    }
                    None => false,
                }
            }
            (PendingSubAction::None, Action::DrawFaceUp { color }) => {
                self.card_dealer.open_train_cards().contains(color)
            }
            (
                PendingSubAction::AwaitingSecondDraw { picked_wild: false },
                Action::DrawFaceUp { color },
            ) => color.is_not_wild() && self.card_dealer.open_train_cards().contains(color),
            (
                PendingSubAction::None
                | PendingSubAction::AwaitingSecondDraw { picked_wild: false },
                Action::DrawBlind,
            ) => self.card_dealer.can_draw_from_close_train_card_deck(),
            (PendingSubAction::None, Action::DrawDestinations) => {
                self.card_dealer.can_draw_destination_cards()
            }
            (
                PendingSubAction::AwaitingDestinationSelection { dealt },
                Action::SelectDestinations { keep },
            ) => {
                keep.len() >= self.min_destinations_to_keep()
                    && destination_selections(dealt.len()).contains(keep)
            }
            _ => false,
        }
    }

    /// Applies an action of the active player, and returns the resulting state.
    ///
    /// `self` is never modified: if the action is not legal, [`GameError::IllegalAction`] is returned,
    /// and the caller may pick another action.
    ///
    /// # Example
    /// ```
    /// use ticket_to_ride_mcts::action::Action;
    /// use ticket_to_ride_mcts::error::GameError;
    /// use ticket_to_ride_mcts::game_state::{GameConfig, GameState};
    /// use ticket_to_ride_mcts::loader::MapData;
    ///
    /// let state = GameState::from_seed(MapData::usa().unwrap(), 2, GameConfig::default(), 7).unwrap();
    ///
    /// // During setup, only destination cards can be selected.
    /// assert_eq!(
    ///     state.apply(&Action::DrawBlind),
    ///     Err(GameError::IllegalAction { action: Action::DrawBlind })
    /// );
    ///
    /// let next_state = state.apply(&state.legal_actions()[0]).unwrap();
    /// assert_eq!(next_state.active_player(), 1);
    /// assert_eq!(state.active_player(), 0);
    /// ```
    pub fn apply(&self, action: &Action) -> Result<GameState> {
        if self.is_over {
            return Err(GameError::GameOver);
        }

        if !self.is_legal(action) {
            return Err(GameError::IllegalAction {
                action: action.clone(),
            });
        }

        let mut next_state = self.clone();
        next_state.perform(action)?;
        Ok(next_state)
    }

    fn perform(&mut self, action: &Action) -> Result<()> {
        let player_id = self.active_player;
        trace!("Player {} performs: {}.", player_id, action);

        match action {
            Action::PlaceRoute { route, cards } => {
                let claimed_route = self.map.claim(*route, player_id)?;
                self.players[player_id].claim_route(claimed_route.length, cards)?;
                for player in self.players.iter_mut() {
                    player.observe_spent_cards(player_id, cards);
                }

                if self.players[player_id].trains_left() < self.config.last_round_threshold
                    && self.last_round_triggered_by.is_none()
                {
                    self.trigger_last_round(player_id);
                }

                self.end_turn();
            }
            Action::DrawFaceUp { color } => {
                let card = self.card_dealer.draw_from_open_train_card_deck(*color)?;
                self.players[player_id].draw_train_card(card);
                for player in self.players.iter_mut() {
                    player.observe_known_draw(player_id, card);
                }

                self.after_train_card_draw(card.is_wild());
            }
            Action::DrawBlind => {
                let card = self.card_dealer.draw_from_close_train_card_deck()?;
                self.players[player_id].draw_train_card(card);
                for player in self.players.iter_mut() {
                    player.observe_unknown_draw(player_id);
                }

                self.after_train_card_draw(false);
            }
            Action::DrawDestinations => {
                self.deal_destination_cards()?;
            }
            Action::SelectDestinations { keep } => {
                let dealt = match mem::take(&mut self.pending) {
                    PendingSubAction::AwaitingDestinationSelection { dealt } => dealt,
                    other => {
                        return Err(GameError::InvariantViolation(format!(
                            "Cannot select destination cards while {:?}.",
                            other
                        )))
                    }
                };

                let (kept, returned) = Self::split_destination_cards(&dealt, keep);
                self.players[player_id].select_destination_cards(&kept);
                self.card_dealer.discard_destination_cards(returned);

                if self.phase == GamePhase::Setup {
                    self.next_setup_player()?;
                } else {
                    self.end_turn();
                }
            }
        }

        Ok(())
    }

    fn split_destination_cards(
        dealt: &[DestinationCard],
        keep: &DestinationSelection,
    ) -> (Vec<DestinationCard>, Vec<DestinationCard>) {
        let (kept, returned): (Vec<_>, Vec<_>) = dealt
            .iter()
            .enumerate()
            .partition(|(i, _)| keep.contains(i));

        (
            kept.into_iter().map(|(_, card)| *card).collect(),
            returned.into_iter().map(|(_, card)| *card).collect(),
        )
    }

    fn deal_destination_cards(&mut self) -> Result<()> {
        let dealt = self.card_dealer.draw_from_destination_card_deck()?;
        self.pending = PendingSubAction::AwaitingDestinationSelection { dealt };
        Ok(())
    }

    /// After a first draw, the player draws again, unless they took a face-up wild card,
    /// or there is nothing left that they could draw.
    fn after_train_card_draw(&mut self, picked_wild: bool) {
        match self.pending {
            PendingSubAction::None
                if !picked_wild && self.card_dealer.can_player_draw_again_this_turn() =>
            {
                self.pending = PendingSubAction::AwaitingSecondDraw { picked_wild: false };
            }
            _ => self.end_turn(),
        }
    }

    fn next_setup_player(&mut self) -> Result<()> {
        if self.active_player + 1 < self.players.len() {
            self.active_player += 1;
            return self.deal_destination_cards();
        }

        self.active_player = 0;
        self.phase = GamePhase::Playing;
        debug!("Setup is over, player 0 starts.");

        if self.legal_actions().is_empty() {
            self.finish();
        }
        Ok(())
    }

    fn trigger_last_round(&mut self, player_id: usize) {
        debug!(
            "Player {} has {} cars left, the last round starts.",
            player_id,
            self.players[player_id].trains_left()
        );

        self.last_round_triggered_by = Some(player_id);
        self.final_turns_remaining = Some(self.players.len() - 1);
        self.phase = GamePhase::LastRound;
    }

    fn end_turn(&mut self) {
        self.pending = PendingSubAction::None;
        self.turn += 1;

        match self.final_turns_remaining {
            Some(0) => {
                self.finish();
                return;
            }
            Some(remaining) => self.final_turns_remaining = Some(remaining - 1),
            None => {}
        }

        self.active_player = (self.active_player + 1) % self.players.len();

        // A player with nothing left to do ends the game.
        if self.legal_actions().is_empty() {
            debug!(
                "Player {} has no legal action left, the game ends.",
                self.active_player
            );
            self.finish();
        }
    }

    /// Final scoring: fulfilled destination cards give their points back,
    /// and the longest route bonus is granted if enabled.
    fn finish(&mut self) {
        for player in self.players.iter_mut() {
            let fulfilled_points: i32 = player
                .destination_hand()
                .iter()
                .filter(|card| {
                    self.map
                        .has_player_fulfilled_destination(card.destination, player.id())
                })
                .map(|card| card.points as i32)
                .sum();
            player.add_points(fulfilled_points);
        }

        if let Some(bonus) = self.config.longest_route_bonus {
            let longest_routes: SmallVec<[u16; MAX_PLAYERS]> = self
                .players
                .iter()
                .map(|player| Map::get_longest_route(&self.map.claimed_routes(player.id())))
                .collect();
            let longest_route = longest_routes.iter().copied().max().unwrap_or(0);

            if longest_route > 0 {
                for (player, length) in self.players.iter_mut().zip(longest_routes) {
                    if length == longest_route {
                        player.add_points(bonus);
                    }
                }
            }
        }

        self.pending = PendingSubAction::None;
        self.phase = GamePhase::Done;
        self.final_turns_remaining = None;
        self.is_over = true;
        debug!("Game over, final scores: {:?}.", self.scores());
    }

    /// Current score of every player, by player id.
    /// Once the game is over, these are the final scores.
    pub fn scores(&self) -> SmallVec<[i32; MAX_PLAYERS]> {
        self.players.iter().map(PlayerState::score).collect()
    }

    /// Players sharing the highest score.
    pub fn leaders(&self) -> SmallVec<[usize; MAX_PLAYERS]> {
        let scores = self.scores();
        let best = scores.iter().copied().max().unwrap_or(0);
        scores
            .iter()
            .enumerate()
            .filter(|(_, score)| **score == best)
            .map(|(player_id, _)| player_id)
            .collect()
    }

    /// Mutable accessor to a player.
    ///
    /// Should only be used for testing!
    pub fn get_mut_player(&mut self, player_id: usize) -> Option<&mut PlayerState> {
        self.players.get_mut(player_id)
    }

    /// Mutable accessor to the card dealer.
    ///
    /// Should only be used for testing!
    pub fn get_mut_card_dealer(&mut self) -> &mut CardDealer {
        &mut self.card_dealer
    }

    /// Mutable accessor to the map.
    ///
    /// Should only be used for testing!
    pub fn get_mut_map(&mut self) -> &mut Map {
        &mut self.map
    }
}
