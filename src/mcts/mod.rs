//! PUCT Monte-Carlo tree search over [`GameState`], guided by an [`Evaluator`].
//!
//! Every node holds the state reached by applying its incoming action to its parent's state,
//! through [`GameState::apply`]. The search never alters a state in place.

mod arena;
mod node;

pub use arena::Arena;
pub use node::{Node, NodeId};

use crate::action::Action;
use crate::error::GameError;
use crate::evaluator::{Evaluation, Evaluator};
use crate::game_phase::PendingSubAction;
use crate::game_state::GameState;
use crate::map::MAX_PLAYERS;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

/// Value of a node for every player, by player id.
type PlayerValues = SmallVec<[f32; MAX_PLAYERS]>;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct MctsConfig {
    /// Simulations run by [`Mcts::run`].
    pub simulations: u32,
    /// Visit count at which the exploration rate starts growing.
    pub c_base: f32,
    /// Exploration rate of a node with few visits.
    pub c_init: f32,
    /// Root Dirichlet alpha.
    pub dirichlet_alpha: f32,
    /// Root Dirichlet mix-in fraction. `0` disables the noise.
    pub dirichlet_epsilon: f32,
    pub seed: u64,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            simulations: 200,
            c_base: 19652.0,
            c_init: 1.25,
            dirichlet_alpha: 0.2,
            dirichlet_epsilon: 0.25,
            seed: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum MctsError {
    #[error("invalid config: {msg}")]
    InvalidConfig { msg: &'static str },
    #[error("the search has no root state")]
    NoRoot,
    #[error(transparent)]
    Game(#[from] GameError),
}

/// Search statistics of one action available at the root.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChildStats {
    pub action: Action,
    pub visit_count: u32,
    /// Mean value, from the point of view of the player choosing the action.
    pub mean_value: f32,
    pub prior: f32,
}

pub struct Mcts {
    config: MctsConfig,
    arena: Arena,
    root: Option<NodeId>,
    rng: ChaCha8Rng,
}

impl Mcts {
    pub fn new(config: MctsConfig) -> Result<Self, MctsError> {
        if config.simulations == 0 {
            return Err(MctsError::InvalidConfig {
                msg: "simulations must be > 0",
            });
        }
        if !(config.c_base.is_finite() && config.c_base > 0.0) {
            return Err(MctsError::InvalidConfig {
                msg: "c_base must be finite and > 0",
            });
        }
        if !(config.c_init.is_finite() && config.c_init >= 0.0) {
            return Err(MctsError::InvalidConfig {
                msg: "c_init must be finite and >= 0",
            });
        }
        if !(config.dirichlet_alpha.is_finite() && config.dirichlet_alpha > 0.0) {
            return Err(MctsError::InvalidConfig {
                msg: "dirichlet_alpha must be finite and > 0",
            });
        }
        if !(0.0..=1.0).contains(&config.dirichlet_epsilon) {
            return Err(MctsError::InvalidConfig {
                msg: "dirichlet_epsilon must be in [0, 1]",
            });
        }

        Ok(Self {
            config,
            arena: Arena::new(),
            root: None,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
        })
    }

    #[inline]
    pub fn config(&self) -> &MctsConfig {
        &self.config
    }

    /// Discards the current tree, and starts a new one from `state`.
    pub fn set_root(&mut self, state: GameState) {
        self.arena.clear();
        let player = state.active_player();
        self.root = Some(self.arena.push(Node::new(state, None, 1.0, None, player)));
    }

    pub fn root_state(&self) -> Option<&GameState> {
        self.root.map(|root| &self.arena.get(root).state)
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.arena.len()
    }

    /// Runs one simulation: selection down to a leaf, expansion and evaluation of the leaf,
    /// then backpropagation of its value up to the root.
    pub fn simulate_once<E: Evaluator + ?Sized>(&mut self, evaluator: &E) -> Result<(), MctsError> {
        let root = self.root.ok_or(MctsError::NoRoot)?;

        let mut node_id = root;
        let mut depth = 0;
        while self.arena.get(node_id).is_expanded {
            match self.select_child(node_id) {
                Some(child_id) => {
                    node_id = child_id;
                    depth += 1;
                }
                None => break,
            }
        }

        let values = if self.arena.get(node_id).is_terminal() {
            terminal_values(&self.arena.get(node_id).state)
        } else {
            let node = self.arena.get(node_id);
            let evaluation = evaluator.evaluate(&node.state);
            let values = evaluation_values(&node.state, evaluation.win_probability);
            if !node.is_expanded {
                self.expand(node_id, &evaluation)?;
                if node_id == root {
                    self.add_root_noise();
                }
            }
            values
        };

        trace!(
            "Simulation reached node {} at depth {}, values {:?}.",
            node_id,
            depth,
            values
        );
        self.backup(node_id, &values);
        Ok(())
    }

    /// Runs the configured number of simulations, and returns the statistics of the root's children.
    pub fn run<E: Evaluator + ?Sized>(&mut self, evaluator: &E) -> Result<Vec<ChildStats>, MctsError> {
        for _ in 0..self.config.simulations {
            self.simulate_once(evaluator)?;
        }

        let stats = self.root_stats();
        if let Some(best) = stats.iter().max_by_key(|child| child.visit_count) {
            debug!(
                "Searched {} nodes, most visited action is to {} ({} visits, value {:.3}).",
                self.arena.len(),
                best.action,
                best.visit_count,
                best.mean_value
            );
        }
        Ok(stats)
    }

    /// Statistics of every child of the root, in legal action order. Empty until the root is expanded.
    pub fn root_stats(&self) -> Vec<ChildStats> {
        let root = match self.root {
            Some(root) => self.arena.get(root),
            None => return Vec::new(),
        };

        root.children
            .iter()
            .filter_map(|child_id| {
                let child = self.arena.get(*child_id);
                child.incoming_action.clone().map(|action| ChildStats {
                    action,
                    visit_count: child.visit_count,
                    mean_value: child.q(),
                    prior: child.prior,
                })
            })
            .collect()
    }

    /// Moves the root to the child reached by `action`, keeping its subtree.
    ///
    /// Returns false, and discards the whole tree, if the root has no such child.
    pub fn advance(&mut self, action: &Action) -> bool {
        let root = match self.root {
            Some(root) => root,
            None => return false,
        };

        let child = self
            .arena
            .get(root)
            .children
            .iter()
            .copied()
            .find(|child_id| self.arena.get(*child_id).incoming_action.as_ref() == Some(action));

        match child {
            Some(child_id) => {
                let new_root = self.arena.retain_subtree(child_id);
                self.root = Some(new_root);
                if self.arena.get(new_root).is_expanded {
                    self.add_root_noise();
                }
                true
            }
            None => {
                self.arena.clear();
                self.root = None;
                false
            }
        }
    }

    fn select_child(&self, node_id: NodeId) -> Option<NodeId> {
        let node = self.arena.get(node_id);
        let parent_visits = node.visit_count as f32;
        let exploration_rate = ((parent_visits + self.config.c_base + 1.0) / self.config.c_base).ln()
            + self.config.c_init;
        let sqrt_parent_visits = parent_visits.sqrt();

        let mut best: Option<(NodeId, f32)> = None;
        for &child_id in &node.children {
            let child = self.arena.get(child_id);
            let u = exploration_rate * child.prior * sqrt_parent_visits
                / (1.0 + child.visit_count as f32);
            let score = child.q() + u;

            // Ties go to the first child.
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((child_id, score)),
            }
        }

        best.map(|(child_id, _)| child_id)
    }

    fn expand(&mut self, node_id: NodeId, evaluation: &Evaluation) -> Result<(), MctsError> {
        let node = self.arena.get(node_id);
        let player = node.to_play();
        let actions = node.state.legal_actions();
        let priors = prior_probabilities(&node.state, &actions, evaluation);

        let children = actions
            .into_iter()
            .zip(priors)
            .map(|(action, prior)| Ok((node.state.apply(&action)?, action, prior)))
            .collect::<Result<Vec<_>, GameError>>()?;

        for (state, action, prior) in children {
            let child_id = self
                .arena
                .push(Node::new(state, Some(action), prior, Some(node_id), player));
            self.arena.get_mut(node_id).children.push(child_id);
        }
        self.arena.get_mut(node_id).is_expanded = true;

        Ok(())
    }

    /// Mixes Dirichlet noise into the priors of the root's children.
    fn add_root_noise(&mut self) {
        let epsilon = self.config.dirichlet_epsilon;
        let root = match self.root {
            Some(root) if epsilon > 0.0 => root,
            _ => return,
        };

        let children = self.arena.get(root).children.clone();
        if children.is_empty() {
            return;
        }

        let gamma = match Gamma::new(f64::from(self.config.dirichlet_alpha), 1.0) {
            Ok(gamma) => gamma,
            Err(_) => return,
        };
        let eta: Vec<f64> = children
            .iter()
            .map(|_| gamma.sample(&mut self.rng))
            .collect();
        let sum: f64 = eta.iter().sum();
        if !(sum.is_finite() && sum > 0.0) {
            return;
        }

        for (child_id, eta) in children.into_iter().zip(eta) {
            let child = self.arena.get_mut(child_id);
            child.prior = (1.0 - epsilon) * child.prior + epsilon * (eta / sum) as f32;
        }
    }

    fn backup(&mut self, leaf: NodeId, values: &[f32]) {
        let mut current = Some(leaf);
        while let Some(node_id) = current {
            let node = self.arena.get_mut(node_id);
            node.visit_count += 1;
            node.value_sum += values.get(node.player).copied().unwrap_or(0.0);

            current = if Some(node_id) == self.root {
                None
            } else {
                node.parent
            };
        }
    }
}

/// Unnormalized score of an action, as the product of the evaluator's weights for its parts.
fn action_score(state: &GameState, action: &Action, evaluation: &Evaluation) -> f32 {
    let weight = evaluation.action_type_weight(action.kind());
    match action {
        Action::PlaceRoute { route, cards } => {
            weight
                * cards
                    .iter()
                    .map(|color| evaluation.color_weight(*color))
                    .product::<f32>()
                * evaluation.route_weight(*route)
        }
        Action::DrawFaceUp { color } => weight * evaluation.color_weight(*color),
        Action::DrawBlind | Action::DrawDestinations => weight,
        Action::SelectDestinations { keep } => match state.pending() {
            PendingSubAction::AwaitingDestinationSelection { dealt } => {
                weight
                    * keep
                        .iter()
                        .filter_map(|i| dealt.get(*i))
                        .map(|card| evaluation.destination_weight(card.index))
                        .product::<f32>()
            }
            _ => weight,
        },
    }
}

/// Prior probability of every action: squared scores, normalized to sum to one.
///
/// Falls back to a uniform distribution when no action has a positive score.
pub fn prior_probabilities(
    state: &GameState,
    actions: &[Action],
    evaluation: &Evaluation,
) -> Vec<f32> {
    let squared_scores: Vec<f32> = actions
        .iter()
        .map(|action| {
            let score = action_score(state, action, evaluation).max(0.0);
            score * score
        })
        .collect();

    let sum: f32 = squared_scores.iter().sum();
    if !(sum.is_finite() && sum > 0.0) {
        return vec![1.0 / actions.len() as f32; actions.len()];
    }

    squared_scores.into_iter().map(|score| score / sum).collect()
}

/// Values of a non-terminal state, given the win probability of its active player.
fn evaluation_values(state: &GameState, win_probability: f32) -> PlayerValues {
    let win_probability = if win_probability.is_finite() {
        win_probability.clamp(0.0, 1.0)
    } else {
        0.5
    };

    (0..state.num_players())
        .map(|player_id| {
            if player_id == state.active_player() {
                win_probability
            } else {
                1.0 - win_probability
            }
        })
        .collect()
}

/// Exact values of a finished game: leaders share the win, everyone else lost.
fn terminal_values(state: &GameState) -> PlayerValues {
    let leaders = state.leaders();
    let share = 1.0 / leaders.len().max(1) as f32;

    (0..state.num_players())
        .map(|player_id| {
            if leaders.contains(&player_id) {
                share
            } else {
                0.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{ScoreEvaluator, UniformEvaluator};
    use crate::game_state::GameConfig;
    use crate::loader::MapData;
    use rand::seq::SliceRandom;

    fn new_game(seed: u64) -> GameState {
        GameState::from_seed(
            MapData::usa().expect("bundled map"),
            2,
            GameConfig::default(),
            seed,
        )
        .expect("valid game")
    }

    fn playing_game(seed: u64) -> GameState {
        let mut state = new_game(seed);
        while state.phase() == crate::game_phase::GamePhase::Setup {
            let keep_all = state
                .legal_actions()
                .pop()
                .expect("setup always offers a selection");
            state = state.apply(&keep_all).expect("legal action");
        }
        state
    }

    fn finished_game(seed: u64) -> GameState {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut state = new_game(seed);
        while !state.is_over() {
            let action = state
                .legal_actions()
                .choose(&mut rng)
                .cloned()
                .expect("an unfinished game has legal actions");
            state = state.apply(&action).expect("legal action");
        }
        state
    }

    fn config(simulations: u32) -> MctsConfig {
        MctsConfig {
            simulations,
            ..MctsConfig::default()
        }
    }

    struct BlindDrawEvaluator;

    impl Evaluator for BlindDrawEvaluator {
        fn evaluate(&self, state: &GameState) -> Evaluation {
            let mut evaluation = Evaluation::uniform(state.num_destination_cards(), state.map().num_routes());
            evaluation.action_type = [0.0, 0.0, 1.0, 0.0];
            evaluation
        }
    }

    // Tests for `Mcts::new`.

    #[test]
    fn new_rejects_invalid_configs() {
        assert!(matches!(
            Mcts::new(config(0)),
            Err(MctsError::InvalidConfig { .. })
        ));
        assert!(matches!(
            Mcts::new(MctsConfig {
                c_base: 0.0,
                ..MctsConfig::default()
            }),
            Err(MctsError::InvalidConfig { .. })
        ));
        assert!(matches!(
            Mcts::new(MctsConfig {
                dirichlet_alpha: f32::NAN,
                ..MctsConfig::default()
            }),
            Err(MctsError::InvalidConfig { .. })
        ));
        assert!(matches!(
            Mcts::new(MctsConfig {
                dirichlet_epsilon: 1.5,
                ..MctsConfig::default()
            }),
            Err(MctsError::InvalidConfig { .. })
        ));
        assert!(Mcts::new(MctsConfig::default()).is_ok());
    }

    // Tests for `Mcts::simulate_once`.

    #[test]
    fn simulate_without_root() {
        let mut mcts = Mcts::new(config(10)).expect("valid config");
        assert!(matches!(
            mcts.simulate_once(&UniformEvaluator),
            Err(MctsError::NoRoot)
        ));
        assert!(mcts.root_stats().is_empty());
    }

    #[test]
    fn first_simulation_expands_root() {
        let state = playing_game(1);
        let num_legal_actions = state.legal_actions().len();

        let mut mcts = Mcts::new(config(10)).expect("valid config");
        mcts.set_root(state);
        assert!(mcts.simulate_once(&UniformEvaluator).is_ok());

        assert_eq!(mcts.num_nodes(), 1 + num_legal_actions);
        assert_eq!(mcts.root_stats().len(), num_legal_actions);
        assert!(mcts.root_stats().iter().all(|child| child.visit_count == 0));
    }

    #[test]
    fn search_does_not_alter_root_state() {
        let state = playing_game(2);
        let snapshot = state.clone();

        let mut mcts = Mcts::new(config(50)).expect("valid config");
        mcts.set_root(state);
        assert!(mcts.run(&ScoreEvaluator::default()).is_ok());

        assert_eq!(mcts.root_state(), Some(&snapshot));
    }

    // Tests for `Mcts::run`.

    #[test]
    fn visits_add_up() {
        let mut mcts = Mcts::new(config(64)).expect("valid config");
        mcts.set_root(playing_game(3));
        let stats = mcts.run(&UniformEvaluator).expect("search succeeds");

        let total_visits: u32 = stats.iter().map(|child| child.visit_count).sum();
        assert_eq!(total_visits, 63);
        assert!(stats.iter().all(|child| (0.0..=1.0).contains(&child.mean_value)));
    }

    #[test]
    fn priors_are_a_distribution() {
        let mut mcts = Mcts::new(config(16)).expect("valid config");
        mcts.set_root(playing_game(4));
        let stats = mcts.run(&ScoreEvaluator::default()).expect("search succeeds");

        let sum: f32 = stats.iter().map(|child| child.prior).sum();
        assert!((sum - 1.0).abs() < 1e-4, "sum={}", sum);
        assert!(stats.iter().all(|child| child.prior >= 0.0));
    }

    #[test]
    fn search_is_deterministic() {
        let state = playing_game(5);

        let mut m1 = Mcts::new(config(48)).expect("valid config");
        m1.set_root(state.clone());
        let r1 = m1.run(&ScoreEvaluator::default()).expect("search succeeds");

        let mut m2 = Mcts::new(config(48)).expect("valid config");
        m2.set_root(state);
        let r2 = m2.run(&ScoreEvaluator::default()).expect("search succeeds");

        assert_eq!(r1, r2);
    }

    #[test]
    fn priors_follow_evaluator() {
        let mut mcts = Mcts::new(MctsConfig {
            simulations: 20,
            dirichlet_epsilon: 0.0,
            ..MctsConfig::default()
        })
        .expect("valid config");
        mcts.set_root(playing_game(6));
        let stats = mcts.run(&BlindDrawEvaluator).expect("search succeeds");

        for child in &stats {
            if child.action == Action::DrawBlind {
                assert_eq!(child.prior, 1.0);
                assert_eq!(child.visit_count, 19);
            } else {
                assert_eq!(child.prior, 0.0);
                assert_eq!(child.visit_count, 0);
            }
        }
    }

    #[test]
    fn terminal_root_is_valued_exactly() {
        let state = finished_game(7);
        let leaders = state.leaders();
        let root_player = state.active_player();

        let mut mcts = Mcts::new(config(5)).expect("valid config");
        mcts.set_root(state);
        let stats = mcts.run(&UniformEvaluator).expect("search succeeds");

        assert!(stats.is_empty());
        let root = mcts.arena.get(0);
        assert_eq!(root.visit_count, 5);
        let expected = if leaders.contains(&root_player) {
            1.0 / leaders.len() as f32
        } else {
            0.0
        };
        assert!((root.q() - expected).abs() < 1e-6);
    }

    // Tests for `prior_probabilities`.

    #[test]
    fn priors_are_squared_and_normalized() {
        let state = playing_game(8);
        let actions = vec![Action::DrawBlind, Action::DrawDestinations];

        let mut evaluation = Evaluation::uniform(state.num_destination_cards(), state.map().num_routes());
        evaluation.action_type = [1.0, 1.0, 1.0, 2.0];

        let priors = prior_probabilities(&state, &actions, &evaluation);
        assert!((priors[0] - 0.2).abs() < 1e-6);
        assert!((priors[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn priors_fall_back_to_uniform() {
        let state = playing_game(9);
        let actions = state.legal_actions();

        let mut evaluation = Evaluation::uniform(state.num_destination_cards(), state.map().num_routes());
        evaluation.action_type = [0.0; 4];

        let priors = prior_probabilities(&state, &actions, &evaluation);
        let expected = 1.0 / actions.len() as f32;
        assert!(priors.iter().all(|prior| (prior - expected).abs() < 1e-6));
    }

    // Tests for `Mcts::advance`.

    #[test]
    fn advance_keeps_subtree() {
        let mut mcts = Mcts::new(config(100)).expect("valid config");
        mcts.set_root(playing_game(10));
        let stats = mcts.run(&UniformEvaluator).expect("search succeeds");

        let best = stats
            .iter()
            .max_by_key(|child| child.visit_count)
            .expect("root has children");
        let expected_state = mcts
            .root_state()
            .and_then(|state| state.apply(&best.action).ok());

        assert!(mcts.advance(&best.action));
        assert_eq!(mcts.root_state(), expected_state.as_ref());
        assert_eq!(mcts.arena.get(0).visit_count, best.visit_count);
        assert_eq!(mcts.arena.get(0).parent, None);
    }

    #[test]
    fn advance_on_unknown_action_discards_tree() {
        let mut mcts = Mcts::new(config(10)).expect("valid config");
        mcts.set_root(playing_game(11));
        assert!(mcts.run(&UniformEvaluator).is_ok());

        let unknown = Action::SelectDestinations { keep: smallvec![0] };
        assert!(!mcts.advance(&unknown));
        assert_eq!(mcts.root_state(), None);
        assert_eq!(mcts.num_nodes(), 0);
    }
}
