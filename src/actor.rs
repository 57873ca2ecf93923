use crate::action::{destination_selections, Action, DestinationSelection};
use crate::card::{CardDealerState, DestinationCard};
use crate::evaluator::Evaluator;
use crate::game_phase::{GamePhase, PendingSubAction};
use crate::game_state::GameState;
use crate::map::Map;
use crate::mcts::{ChildStats, Mcts, MctsConfig, MctsError};
use crate::player::{PlayerState, PublicPlayerState};

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;

/// What a player is allowed to see of the game when making a decision.
pub struct PlayerView<'a> {
    state: &'a GameState,
    player_id: usize,
}

impl<'a> PlayerView<'a> {
    pub fn new(state: &'a GameState, player_id: usize) -> Self {
        Self { state, player_id }
    }

    #[inline]
    pub fn player_id(&self) -> usize {
        self.player_id
    }

    /// The private state of the viewing player: hand, destination cards, card estimates.
    pub fn own_state(&self) -> Option<&'a PlayerState> {
        self.state.player(self.player_id)
    }

    /// The public state of every player, the viewer included.
    pub fn public_states(&self) -> Vec<PublicPlayerState> {
        self.state
            .players()
            .iter()
            .map(PlayerState::get_public_state)
            .collect()
    }

    pub fn card_dealer_state(&self) -> CardDealerState<'a> {
        self.state.card_dealer().get_state()
    }

    #[inline]
    pub fn map(&self) -> &'a Map {
        self.state.map()
    }

    #[inline]
    pub fn phase(&self) -> GamePhase {
        self.state.phase()
    }

    #[inline]
    pub fn pending(&self) -> &'a PendingSubAction {
        self.state.pending()
    }

    #[inline]
    pub fn turn(&self) -> u32 {
        self.state.turn()
    }

    /// The whole game state, hidden cards included.
    ///
    /// Only meant for actors that simulate the game, like [`MctsActor`].
    #[inline]
    pub fn full_state(&self) -> &'a GameState {
        self.state
    }
}

/// Decision maker of a player: a human behind some interface, or an AI.
///
/// An actor may answer with an action that is not legal, or with no action at all:
/// the caller then asks again.
pub trait Actor: Send {
    fn name(&self) -> &str;

    /// Picks which of the three destination cards dealt during setup to keep.
    fn choose_initial_destinations(
        &mut self,
        dealt: &[DestinationCard],
        view: &PlayerView,
    ) -> Option<DestinationSelection>;

    fn choose_action(&mut self, legal_actions: &[Action], view: &PlayerView) -> Option<Action>;

    /// Called after any player, this actor included, performed `action`.
    fn observe(&mut self, _player_id: usize, _action: &Action, _state: &GameState) {}
}

/// Plays uniformly at random among legal actions. Keeps at least two initial destination cards.
pub struct RandomActor {
    name: String,
    rng: ChaCha8Rng,
}

impl RandomActor {
    pub fn new(name: impl Into<String>, seed: u64) -> Self {
        Self {
            name: name.into(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Actor for RandomActor {
    fn name(&self) -> &str {
        &self.name
    }

    fn choose_initial_destinations(
        &mut self,
        dealt: &[DestinationCard],
        _view: &PlayerView,
    ) -> Option<DestinationSelection> {
        let min_kept = dealt.len().min(2);
        destination_selections(dealt.len())
            .into_iter()
            .filter(|keep| keep.len() >= min_kept)
            .choose(&mut self.rng)
    }

    fn choose_action(&mut self, legal_actions: &[Action], _view: &PlayerView) -> Option<Action> {
        legal_actions.choose(&mut self.rng).cloned()
    }
}

/// Follows a fixed script of answers, then always picks the first legal action.
///
/// Scripted answers are returned as is, legal or not.
#[derive(Clone, Debug, Default)]
pub struct ScriptedActor {
    name: String,
    initial_destinations: VecDeque<DestinationSelection>,
    actions: VecDeque<Action>,
}

impl ScriptedActor {
    pub fn new(
        name: impl Into<String>,
        initial_destinations: impl IntoIterator<Item = DestinationSelection>,
        actions: impl IntoIterator<Item = Action>,
    ) -> Self {
        Self {
            name: name.into(),
            initial_destinations: initial_destinations.into_iter().collect(),
            actions: actions.into_iter().collect(),
        }
    }

    /// Scripted actions not yet played.
    pub fn remaining_actions(&self) -> usize {
        self.actions.len()
    }
}

impl Actor for ScriptedActor {
    fn name(&self) -> &str {
        &self.name
    }

    fn choose_initial_destinations(
        &mut self,
        dealt: &[DestinationCard],
        _view: &PlayerView,
    ) -> Option<DestinationSelection> {
        self.initial_destinations
            .pop_front()
            .or_else(|| Some((0..dealt.len()).collect()))
    }

    fn choose_action(&mut self, legal_actions: &[Action], _view: &PlayerView) -> Option<Action> {
        self.actions
            .pop_front()
            .or_else(|| legal_actions.first().cloned())
    }
}

/// How to turn the visit counts of a search into an action.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SelectionPolicy {
    /// Most visited action. Ties go to the best mean value, then to the first action.
    Greedy,
    /// Action sampled with a probability proportional to its visit count.
    Proportional,
    /// Action sampled with a probability proportional to `visits^(1/t)`.
    /// A non-positive temperature is the same as [`SelectionPolicy::Greedy`].
    Temperature(f32),
}

impl SelectionPolicy {
    pub fn select<'a, R: Rng + ?Sized>(
        &self,
        stats: &'a [ChildStats],
        rng: &mut R,
    ) -> Option<&'a ChildStats> {
        let temperature = match *self {
            SelectionPolicy::Greedy => return Self::most_visited(stats),
            SelectionPolicy::Proportional => 1.0,
            SelectionPolicy::Temperature(t) if t.is_finite() && t > 0.0 => t,
            SelectionPolicy::Temperature(_) => return Self::most_visited(stats),
        };

        let weights = stats
            .iter()
            .map(|child| (child.visit_count as f64).powf(1.0 / f64::from(temperature)));
        match WeightedIndex::new(weights) {
            Ok(distribution) => stats.get(distribution.sample(rng)),
            // No visits at all, or overflowing weights.
            Err(_) => Self::most_visited(stats),
        }
    }

    fn most_visited(stats: &[ChildStats]) -> Option<&ChildStats> {
        stats.iter().fold(None, |best, child| match best {
            Some(best)
                if (best.visit_count, best.mean_value) >= (child.visit_count, child.mean_value) =>
            {
                Some(best)
            }
            _ => Some(child),
        })
    }
}

/// Picks actions by running a tree search from the current state, and reuses the tree across turns.
pub struct MctsActor {
    name: String,
    mcts: Mcts,
    evaluator: Box<dyn Evaluator>,
    policy: SelectionPolicy,
    rng: ChaCha8Rng,
}

impl MctsActor {
    pub fn new(
        name: impl Into<String>,
        config: MctsConfig,
        evaluator: Box<dyn Evaluator>,
        policy: SelectionPolicy,
    ) -> Result<Self, MctsError> {
        Ok(Self {
            name: name.into(),
            mcts: Mcts::new(config)?,
            evaluator,
            policy,
            rng: ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(1)),
        })
    }

    fn search(&mut self, state: &GameState) -> Option<Action> {
        if self.mcts.root_state() != Some(state) {
            self.mcts.set_root(state.clone());
        }

        let stats = match self.mcts.run(&self.evaluator) {
            Ok(stats) => stats,
            Err(err) => {
                warn!("{} could not search: {}", self.name, err);
                return None;
            }
        };

        self.policy
            .select(&stats, &mut self.rng)
            .map(|child| child.action.clone())
    }
}

impl Actor for MctsActor {
    fn name(&self) -> &str {
        &self.name
    }

    fn choose_initial_destinations(
        &mut self,
        _dealt: &[DestinationCard],
        view: &PlayerView,
    ) -> Option<DestinationSelection> {
        match self.search(view.full_state())? {
            Action::SelectDestinations { keep } => Some(keep),
            _ => None,
        }
    }

    fn choose_action(&mut self, _legal_actions: &[Action], view: &PlayerView) -> Option<Action> {
        self.search(view.full_state())
    }

    fn observe(&mut self, _player_id: usize, action: &Action, _state: &GameState) {
        self.mcts.advance(action);
    }
}
