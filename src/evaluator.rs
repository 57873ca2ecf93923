use crate::action::ActionKind;
use crate::card::{TrainColor, NUM_TRAIN_COLORS};
use crate::city::City;
use crate::game_state::GameState;
use crate::map::Map;
use crate::player::PlayerState;

use std::collections::HashSet;
use strum::EnumCount;

/// What an evaluator thinks of a state, from the point of view of its active player.
///
/// Every desire is a non-negative weight. The search multiplies the weights of the parts of an
/// action together to score it, so a weight of `1.0` is neutral.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    /// Indexed by [`ActionKind::index`].
    pub action_type: [f32; ActionKind::COUNT],
    /// Indexed by [`TrainColor::index`].
    pub color_desire: [f32; NUM_TRAIN_COLORS],
    /// Indexed by [`crate::card::DestinationCard::index`].
    pub destination_desire: Vec<f32>,
    /// Indexed by route index.
    pub route_desire: Vec<f32>,
    /// Probability, in `[0, 1]`, that the active player wins the game.
    pub win_probability: f32,
}

impl Evaluation {
    /// An evaluation with no opinion: every weight is `1.0`, and the game is a coin toss.
    pub fn uniform(num_destination_cards: usize, num_routes: usize) -> Self {
        Self {
            action_type: [1.0; ActionKind::COUNT],
            color_desire: [1.0; NUM_TRAIN_COLORS],
            destination_desire: vec![1.0; num_destination_cards],
            route_desire: vec![1.0; num_routes],
            win_probability: 0.5,
        }
    }

    #[inline]
    pub fn action_type_weight(&self, kind: ActionKind) -> f32 {
        self.action_type[kind.index()]
    }

    #[inline]
    pub fn color_weight(&self, color: TrainColor) -> f32 {
        self.color_desire[color.index()]
    }

    /// Weights outside of the evaluated vector are neutral.
    #[inline]
    pub fn destination_weight(&self, destination_index: usize) -> f32 {
        self.destination_desire
            .get(destination_index)
            .copied()
            .unwrap_or(1.0)
    }

    /// Weights outside of the evaluated vector are neutral.
    #[inline]
    pub fn route_weight(&self, route_index: usize) -> f32 {
        self.route_desire.get(route_index).copied().unwrap_or(1.0)
    }
}

/// Scores game states for the search.
///
/// Implementations must be pure: evaluating a state twice gives the same evaluation,
/// and the state is never modified.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, state: &GameState) -> Evaluation;
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn evaluate(&self, state: &GameState) -> Evaluation {
        (**self).evaluate(state)
    }
}

/// Baseline evaluator: no preference at all, which turns the search into plain UCT.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformEvaluator;

impl Evaluator for UniformEvaluator {
    fn evaluate(&self, state: &GameState) -> Evaluation {
        Evaluation::uniform(state.num_destination_cards(), state.map().num_routes())
    }
}

/// Hand-written heuristic standing in for a learned model.
///
/// - The win probability is a logistic function of the score lead of the active player.
/// - Routes are worth their points per car, more so when they touch a city of an unfulfilled
///   destination card.
/// - Colors already in hand are wanted more, and wild cards more than any color.
/// - Drawing destination cards is discouraged while some held ones are still unfulfilled.
/// - Colored routes are contested when the active player's card estimate shows that an opponent
///   holds enough cards of that color to claim them.
#[derive(Clone, Copy, Debug)]
pub struct ScoreEvaluator {
    /// Score lead giving a win probability of about 73%.
    pub score_scale: f32,
    /// Extra route desire for routes touching an unfulfilled destination.
    pub destination_route_bonus: f32,
    /// Extra route desire for unowned colored routes an opponent is known to afford.
    pub contested_route_bonus: f32,
}

impl Default for ScoreEvaluator {
    fn default() -> Self {
        Self {
            score_scale: 10.0,
            destination_route_bonus: 1.0,
            contested_route_bonus: 0.5,
        }
    }
}

impl ScoreEvaluator {
    fn win_probability(&self, state: &GameState) -> f32 {
        let active_player = state.active_player();
        let scores = state.scores();
        let own_score = scores[active_player];
        let best_opponent_score = scores
            .iter()
            .enumerate()
            .filter(|(player_id, _)| *player_id != active_player)
            .map(|(_, score)| *score)
            .max()
            .unwrap_or(own_score);

        let lead = (own_score - best_opponent_score) as f32;
        1.0 / (1.0 + (-lead / self.score_scale).exp())
    }

    /// For every color, the most cards of it any opponent is known to hold,
    /// according to `player`'s card estimate.
    fn opponents_known_cards(player: &PlayerState, num_players: usize) -> [u8; NUM_TRAIN_COLORS] {
        let mut known_cards = [0; NUM_TRAIN_COLORS];
        let opponent_rows = (0..num_players)
            .filter(|player_id| *player_id != player.id())
            .filter_map(|player_id| player.card_estimate().row(player_id));

        for row in opponent_rows {
            for (known, count) in known_cards.iter_mut().zip(row.iter()) {
                *known = (*known).max(*count);
            }
        }
        known_cards
    }
}

impl Evaluator for ScoreEvaluator {
    fn evaluate(&self, state: &GameState) -> Evaluation {
        let map = state.map();
        let mut evaluation = Evaluation::uniform(state.num_destination_cards(), map.num_routes());
        evaluation.win_probability = self.win_probability(state);

        let player = match state.player(state.active_player()) {
            Some(player) => player,
            None => return evaluation,
        };

        for (color, count) in player.hand().iter() {
            let base = if color.is_wild() { 2.0 } else { 1.0 };
            evaluation.color_desire[color.index()] = base + f32::from(count);
        }

        let unfulfilled_cities: HashSet<City> = player
            .destination_hand()
            .iter()
            .filter(|card| !map.has_player_fulfilled_destination(card.destination, player.id()))
            .flat_map(|card| [card.destination.0, card.destination.1])
            .collect();

        for route in map.routes() {
            let points_per_car =
                Map::calculate_points_for_claimed_route(route.length) as f32 / f32::from(route.length);
            let bonus = if unfulfilled_cities.contains(&route.endpoints.0)
                || unfulfilled_cities.contains(&route.endpoints.1)
            {
                self.destination_route_bonus
            } else {
                0.0
            };
            evaluation.route_desire[route.index] = points_per_car + bonus;
        }

        let opponents_known_cards = Self::opponents_known_cards(player, state.num_players());
        for route in map.routes() {
            if route.is_gray() || route.owner().is_some() {
                continue;
            }
            if opponents_known_cards[route.train_color.index()] >= route.length {
                evaluation.route_desire[route.index] += self.contested_route_bonus;
            }
        }

        // Destinations are easier when the network already reaches their cities.
        let network_cities: HashSet<City> = map
            .claimed_routes(player.id())
            .iter()
            .filter_map(|claimed_route| map.route(claimed_route.index))
            .flat_map(|route| [route.endpoints.0, route.endpoints.1])
            .collect();
        for (index, desire) in evaluation.destination_desire.iter_mut().enumerate() {
            *desire = 1.0;
            if let Some(card) = state.destination_card(index) {
                let reached = [card.destination.0, card.destination.1]
                    .iter()
                    .filter(|city| network_cities.contains(*city))
                    .count();
                *desire += 0.5 * reached as f32;
            }
        }

        evaluation.action_type[ActionKind::Destinations.index()] = if unfulfilled_cities.is_empty() {
            0.5
        } else {
            0.1
        };

        evaluation
    }
}
