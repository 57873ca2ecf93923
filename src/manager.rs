use crate::action::Action;
use crate::actor::{Actor, PlayerView};
use crate::error::{GameError, Result};
use crate::game_phase::{GamePhase, PendingSubAction};
use crate::game_state::{GameConfig, GameState};
use crate::loader::MapData;
use crate::map::MAX_PLAYERS;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// How many times an actor is asked again after answering with an illegal action.
pub const MAX_REQUERIES: usize = 16;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub game: GameConfig,
    pub max_requeries: usize,
    /// Drives both the seating of actors and every shuffle of the game.
    pub seed: u64,
    /// When false, actors sit in the order they were given.
    pub shuffle_seats: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            max_requeries: MAX_REQUERIES,
            seed: 0,
            shuffle_seats: true,
        }
    }
}

/// Final standing of an actor.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GameResult {
    pub actor: String,
    /// Position of the actor in the list given to [`Manager::new`].
    pub actor_index: usize,
    /// Player id of the actor in the game, which is also their turn order.
    pub seat: usize,
    pub score: i32,
    pub is_winner: bool,
}

/// Runs a real game: asks the actor of the active player for an action, checks it,
/// applies it, and lets every actor know about it.
///
/// Every applied action is logged, so the game can be replayed from its seed.
pub struct Manager<'a> {
    map_data: &'a MapData,
    state: GameState,
    actors: Vec<Box<dyn Actor>>,
    /// Maps a seat (player id) to the index of its actor in `actors`.
    ///
    /// Actors are seated randomly when the game starts.
    seats: SmallVec<[usize; MAX_PLAYERS]>,
    action_log: Vec<Action>,
    config: ManagerConfig,
}

impl<'a> Manager<'a> {
    /// Seats the actors, and deals a new game.
    ///
    /// Fails with [`GameError::InvalidPlayerCount`] unless there are between 2 and 5 actors.
    pub fn new(
        map_data: &'a MapData,
        actors: Vec<Box<dyn Actor>>,
        config: ManagerConfig,
    ) -> Result<Self> {
        let state =
            GameState::from_seed(map_data, actors.len(), config.game.clone(), config.seed)?;

        let mut seats: SmallVec<[usize; MAX_PLAYERS]> = (0..actors.len()).collect();
        if config.shuffle_seats {
            seats.shuffle(&mut ChaCha8Rng::seed_from_u64(config.seed));
        }

        let manager = Self {
            map_data,
            state,
            actors,
            seats,
            action_log: Vec::new(),
            config,
        };
        info!(
            "Starting a game with {} players, in turn order: {}.",
            manager.num_players(),
            (0..manager.num_players())
                .map(|seat| manager.actor_name(seat))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(manager)
    }

    #[inline]
    pub fn state(&self) -> &GameState {
        &self.state
    }

    #[inline]
    pub fn num_players(&self) -> usize {
        self.actors.len()
    }

    #[inline]
    pub fn action_log(&self) -> &[Action] {
        &self.action_log
    }

    /// The action log, as a JSON array.
    pub fn action_log_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.action_log)
    }

    /// Name of the actor sitting at `seat`.
    pub fn actor_name(&self, seat: usize) -> &str {
        self.seats
            .get(seat)
            .and_then(|actor_index| self.actors.get(*actor_index))
            .map_or("<nobody>", |actor| actor.name())
    }

    /// Seat of the actor given at `actor_index` to [`Manager::new`].
    pub fn seat_of(&self, actor_index: usize) -> Option<usize> {
        self.seats.iter().position(|index| *index == actor_index)
    }

    /// Plays a single action of the active player, and returns it.
    ///
    /// The actor is asked again whenever its answer is not a legal action, up to
    /// `max_requeries` times, after which [`GameError::ActorExhausted`] is returned.
    pub fn step(&mut self) -> Result<Action> {
        if self.state.is_over() {
            return Err(GameError::GameOver);
        }

        let seat = self.state.active_player();
        let actor_index = self.seats.get(seat).copied().ok_or_else(|| {
            GameError::InvariantViolation(format!("No actor sits at seat {}.", seat))
        })?;
        let legal_actions = self.state.legal_actions();

        let mut action = None;
        for attempt in 1..=self.config.max_requeries {
            let view = PlayerView::new(&self.state, seat);
            let actor = &mut self.actors[actor_index];

            let answer = match self.state.pending() {
                PendingSubAction::AwaitingDestinationSelection { dealt }
                    if self.state.phase() == GamePhase::Setup =>
                {
                    actor
                        .choose_initial_destinations(dealt, &view)
                        .map(|keep| Action::SelectDestinations { keep })
                }
                _ => actor.choose_action(&legal_actions, &view),
            };

            match answer {
                Some(answer) if self.state.is_legal(&answer) => {
                    action = Some(answer);
                    break;
                }
                Some(answer) => warn!(
                    "{} tried to {}, which is not allowed (attempt {}).",
                    actor.name(),
                    answer,
                    attempt
                ),
                None => warn!(
                    "{} did not pick any action (attempt {}).",
                    actor.name(),
                    attempt
                ),
            }
        }

        let action = action.ok_or(GameError::ActorExhausted {
            player: seat,
            attempts: self.config.max_requeries,
        })?;

        let previous_phase = self.state.phase();
        self.state = self.state.apply(&action)?;
        debug!(
            "Turn {}: {} chose to {}.",
            self.state.turn(),
            self.actor_name(seat),
            self.describe_action(&action)
        );
        for actor in &mut self.actors {
            actor.observe(seat, &action, &self.state);
        }
        self.action_log.push(action.clone());

        if previous_phase != GamePhase::LastRound && self.state.phase() == GamePhase::LastRound {
            info!(
                "{} has less than {} cars left: everyone plays one last turn.",
                self.actor_name(seat),
                self.state.config().last_round_threshold
            );
        }
        if self.state.is_over() {
            info!(
                "Game over after {} turns, final scores: {:?}.",
                self.state.turn(),
                self.state.scores()
            );
        }

        Ok(action)
    }

    /// Describes `action` for logs, with the names of the cities a claimed route connects.
    pub fn describe_action(&self, action: &Action) -> String {
        let map = self.state.map();
        let route = match action {
            Action::PlaceRoute { route, .. } => map.route(*route),
            _ => None,
        };

        match route {
            Some(route) => format!(
                "{} ({} - {})",
                action,
                map.city_name(route.endpoints.0).unwrap_or("?"),
                map.city_name(route.endpoints.1).unwrap_or("?")
            ),
            None => action.to_string(),
        }
    }

    /// Plays until the game is over, and returns the final standings.
    pub fn run(&mut self) -> Result<Vec<GameResult>> {
        while !self.state.is_over() {
            self.step()?;
        }

        Ok(self.results())
    }

    /// Current standing of every actor, in the order they were given to [`Manager::new`].
    pub fn results(&self) -> Vec<GameResult> {
        let leaders = self.state.leaders();
        let scores = self.state.scores();

        let mut results: Vec<GameResult> = self
            .seats
            .iter()
            .enumerate()
            .map(|(seat, actor_index)| GameResult {
                actor: self.actors[*actor_index].name().to_owned(),
                actor_index: *actor_index,
                seat,
                score: scores[seat],
                is_winner: self.state.is_over() && leaders.contains(&seat),
            })
            .collect();
        results.sort_by_key(|result| result.actor_index);
        results
    }

    /// Rebuilds the current state from the seed and the action log.
    pub fn replay(&self) -> Result<GameState> {
        GameState::replay(
            self.map_data,
            self.num_players(),
            self.config.game.clone(),
            self.config.seed,
            &self.action_log,
        )
    }
}
