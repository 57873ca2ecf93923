use crate::card::TrainColor;
use crate::city::{City, CityToCity};
use crate::error::{GameError, Result};
use crate::loader::MapData;

use serde::Serialize;
use smallvec::SmallVec;
use std::cmp::max;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::ops::RangeInclusive;
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use threadpool::ThreadPool;

lazy_static! {
    static ref THREAD_POOL: Mutex<ThreadPool> = Mutex::new(ThreadPool::default());
}

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 5;

// Helena has the highest number of neighbors on the USA map, which is 7 adjacent cities.
const MAX_ROUTES_PER_CITY: usize = 7;

/// A claimable connection between two cities.
///
/// There can be multiple "parallel" routes between two cities, each of them being a separate `Route`
/// with its own index.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Route {
    /// The two cities connected by this route, in the order given by the map data.
    pub endpoints: CityToCity,
    /// The distance between two cities. This is analogous to the number of train cards needed to claim the route.
    pub length: u8,
    /// The color of this specific route.
    /// The `Wild` color means that any single color matches.
    pub train_color: TrainColor,
    /// Position of the route in the map data. Stable for the whole game.
    pub index: usize,
    /// By whom this route is claimed, if any.
    owner: Option<usize>,
}

impl Route {
    /// The player ID claiming this route, if any.
    #[inline]
    pub fn owner(&self) -> Option<usize> {
        self.owner
    }

    /// Whether the route accepts cards of any single color.
    #[inline]
    pub fn is_gray(&self) -> bool {
        self.train_color.is_wild()
    }

    /// Given one endpoint of the route, returns the other one.
    #[inline]
    pub fn other_end(&self, city: City) -> City {
        if self.endpoints.0 == city {
            self.endpoints.1
        } else {
            self.endpoints.0
        }
    }
}

/// Indices of all routes connecting two adjacent cities.
type ParallelRoutes = SmallVec<[usize; 2]>;

/// Holds the information about a route successfully claimed by a player.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClaimedRoute {
    pub route: CityToCity,
    pub index: usize,
    pub length: u8,
}

/// The authoritative state of the map, per game.
/// This can be mutated as players claim routes throughout the game.
///
/// Only route ownership is mutable. The adjacency and the city names never change once the map
/// is built, so clones share them, while each clone owns its routes.
#[derive(Clone, Debug, PartialEq)]
pub struct Map {
    routes: Vec<Route>,
    /// Maps the concept of two cities being adjacent to the underlying parallel routes between the two.
    /// Holds both directions, i.e. from City A to City B and from City B to City A.
    all_parallel_routes: Arc<BTreeMap<CityToCity, ParallelRoutes>>,
    city_names: Arc<[String]>,
    /// Depending on the number of players (>3), parallel routes might be claimed simultaneously.
    /// In all cases, parallel routes cannot be claimed by the same player.
    parallel_routes_allowed: bool,
}

impl Map {
    fn get_range_of_routes_starting_at_city(city: City) -> RangeInclusive<CityToCity> {
        (city, City::MIN)..=(city, City::MAX)
    }

    /// Creates a new map from the given map data, with all routes unclaimed.
    ///
    /// Returns an error if the number of players is not supported.
    ///
    /// # Example
    /// ```
    /// use ticket_to_ride_mcts::loader::MapData;
    /// use ticket_to_ride_mcts::map::Map;
    ///
    /// let map_data = MapData::usa().unwrap();
    ///
    /// let map = Map::new(map_data, 2);
    /// assert!(map.is_ok());
    ///
    /// let map = Map::new(map_data, 1);
    /// assert!(map.is_err());
    /// ```
    pub fn new(map_data: &MapData, num_players: usize) -> Result<Self> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&num_players) {
            return Err(GameError::InvalidPlayerCount(num_players));
        }

        let routes: Vec<Route> = map_data
            .routes()
            .iter()
            .enumerate()
            .map(|(index, spec)| Route {
                endpoints: spec.endpoints,
                length: spec.length,
                train_color: spec.train_color,
                index,
                owner: None,
            })
            .collect();

        let mut all_parallel_routes: BTreeMap<CityToCity, ParallelRoutes> = BTreeMap::new();
        for route in &routes {
            let (start, end) = route.endpoints;
            all_parallel_routes
                .entry((start, end))
                .or_default()
                .push(route.index);
            all_parallel_routes
                .entry((end, start))
                .or_default()
                .push(route.index);
        }

        Ok(Self {
            routes,
            all_parallel_routes: Arc::new(all_parallel_routes),
            city_names: map_data.city_names().into(),
            // Parallel routes can be claimed iff there is more than three players.
            // Otherwise, only one of the routes connecting two cities can be claimed.
            parallel_routes_allowed: num_players > 3,
        })
    }

    /// How many points are granted when claiming a route of a given length.
    ///
    /// # Example
    /// ```
    /// use ticket_to_ride_mcts::map::Map;
    ///
    /// assert_eq!(Map::calculate_points_for_claimed_route(3), 4);
    /// assert_eq!(Map::calculate_points_for_claimed_route(6), 15);
    /// ```
    pub fn calculate_points_for_claimed_route(length: u8) -> i32 {
        match length {
            1 => 1,
            2 => 2,
            3 => 4,
            4 => 7,
            5 => 10,
            6 => 15,
            _ => 0,
        }
    }

    #[inline]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[inline]
    pub fn route(&self, index: usize) -> Option<&Route> {
        self.routes.get(index)
    }

    #[inline]
    pub fn num_routes(&self) -> usize {
        self.routes.len()
    }

    #[inline]
    pub fn num_cities(&self) -> usize {
        self.city_names.len()
    }

    #[inline]
    pub fn parallel_routes_allowed(&self) -> bool {
        self.parallel_routes_allowed
    }

    /// Human-readable name of a city, as found in the map data.
    pub fn city_name(&self, city: City) -> Option<&str> {
        self.city_names.get(city.index()).map(String::as_str)
    }

    /// All routes having `city` as one of their endpoints, owned or not.
    pub fn routes_at(&self, city: City) -> impl Iterator<Item = &Route> + '_ {
        self.all_parallel_routes
            .range(Self::get_range_of_routes_starting_at_city(city))
            .flat_map(|(_, parallel_routes)| parallel_routes.iter())
            .map(|index| &self.routes[*index])
    }

    /// Indices of every route between the same two cities as the given route, itself included.
    pub fn parallel_routes(&self, index: usize) -> &[usize] {
        self.routes
            .get(index)
            .and_then(|route| self.all_parallel_routes.get(&route.endpoints))
            .map(|parallel_routes| parallel_routes.as_slice())
            .unwrap_or(&[])
    }

    /// Predicate that determines whether a player could claim the given route, regardless of their cards.
    ///
    /// A route cannot be claimed if it is owned already, if the same player owns one of its parallel routes,
    /// or if someone else owns one of its parallel routes and parallel routes are not allowed in this game.
    ///
    /// # Example
    /// ```
    /// use ticket_to_ride_mcts::loader::MapData;
    /// use ticket_to_ride_mcts::map::Map;
    ///
    /// let map_data = MapData::parse(
    ///     "Raleigh 2 WHITE Washington\nRaleigh 2 BLACK Washington\n",
    ///     "",
    /// )
    /// .unwrap();
    /// let mut map = Map::new(&map_data, 2).unwrap();
    ///
    /// assert!(map.is_claimable(0, 0));
    /// assert!(map.claim(0, 0).is_ok());
    ///
    /// // Owned routes, and their parallel routes in a 2-player game, are no longer claimable.
    /// assert!(!map.is_claimable(0, 1));
    /// assert!(!map.is_claimable(1, 1));
    /// ```
    pub fn is_claimable(&self, index: usize, player_id: usize) -> bool {
        match self.routes.get(index) {
            Some(route) if route.owner.is_none() => {}
            _ => return false,
        }

        self.parallel_routes(index)
            .iter()
            .filter(|other| **other != index)
            .all(|other| match self.routes[*other].owner {
                Some(claimer) if claimer == player_id => false,
                Some(_) => self.parallel_routes_allowed,
                None => true,
            })
    }

    /// Marks the given route as claimed by `player_id`.
    ///
    /// Ownership is set exactly once: claiming an owned route fails with [`GameError::AlreadyOwned`],
    /// and the route keeps its owner. Claiming a route that is blocked by a parallel route is an
    /// [`GameError::InvariantViolation`]. Callers are expected to check [`Map::is_claimable`] first.
    pub fn claim(&mut self, index: usize, player_id: usize) -> Result<ClaimedRoute> {
        let route = self.routes.get(index).ok_or_else(|| {
            GameError::InvariantViolation(format!("Route {} does not exist.", index))
        })?;

        if let Some(owner) = route.owner {
            return Err(GameError::AlreadyOwned {
                route: index,
                owner,
            });
        }

        if !self.is_claimable(index, player_id) {
            return Err(GameError::InvariantViolation(format!(
                "Player {} cannot claim route {}, as a parallel route is already claimed.",
                player_id, index
            )));
        }

        // Due diligence is done, the player can rightfully claim the route.
        let route = &mut self.routes[index];
        route.owner = Some(player_id);

        Ok(ClaimedRoute {
            route: route.endpoints,
            index,
            length: route.length,
        })
    }

    /// All routes claimed by a given player, in index order.
    pub fn claimed_routes(&self, player_id: usize) -> Vec<ClaimedRoute> {
        self.routes
            .iter()
            .filter(|route| route.owner == Some(player_id))
            .map(|route| ClaimedRoute {
                route: route.endpoints,
                index: route.index,
                length: route.length,
            })
            .collect()
    }

    /// Predicate that assess whether a given player has connected two cities on the map, based on their claimed routes.
    ///
    /// Returns true if that is the case, false otherwise.
    ///
    /// # Example
    /// ```
    /// use ticket_to_ride_mcts::city::City;
    /// use ticket_to_ride_mcts::loader::MapData;
    /// use ticket_to_ride_mcts::map::Map;
    ///
    /// let map_data = MapData::parse(
    ///     "Raleigh 2 WHITE Washington\nWashington 2 BLACK New York\n",
    ///     "",
    /// )
    /// .unwrap();
    /// let mut map = Map::new(&map_data, 2).unwrap();
    ///
    /// let destination = (City(0), City(2));
    /// let player_id = 0;
    ///
    /// // Player has not claimed any route.
    /// assert_eq!(map.has_player_fulfilled_destination(destination, player_id), false);
    ///
    /// // Player has partially fulfilled the destination.
    /// assert!(map.claim(0, player_id).is_ok());
    /// assert_eq!(map.has_player_fulfilled_destination(destination, player_id), false);
    ///
    /// // Player has fully fulfilled the destination.
    /// assert!(map.claim(1, player_id).is_ok());
    /// assert!(map.has_player_fulfilled_destination(destination, player_id));
    /// ```
    pub fn has_player_fulfilled_destination(
        &self,
        (destination_start, destination_end): CityToCity,
        player_id: usize,
    ) -> bool {
        let num_cities = self.num_cities();
        if destination_start.index() >= num_cities || destination_end.index() >= num_cities {
            return false;
        }

        let mut cities_visited = vec![false; num_cities];
        let mut cities_to_visit = VecDeque::with_capacity(num_cities);

        cities_visited[destination_start.index()] = true;
        cities_to_visit.push_back(destination_start);

        while let Some(city) = cities_to_visit.pop_front() {
            if city == destination_end {
                return true;
            }

            self.extend_neighboring_cities_to_visit_claimed_by_player(
                city,
                player_id,
                &mut cities_visited,
                &mut cities_to_visit,
            );
        }

        false
    }

    fn extend_neighboring_cities_to_visit_claimed_by_player(
        &self,
        city: City,
        player_id: usize,
        cities_visited: &mut [bool],
        cities_to_visit: &mut VecDeque<City>,
    ) {
        cities_to_visit.extend(
            self.all_parallel_routes
                .range(Self::get_range_of_routes_starting_at_city(city))
                .filter_map(|((_, end), parallel_routes)| {
                    if cities_visited[end.index()] {
                        return None;
                    }

                    if parallel_routes
                        .iter()
                        .any(|index| self.routes[*index].owner == Some(player_id))
                    {
                        cities_visited[end.index()] = true;
                        Some(*end)
                    } else {
                        None
                    }
                }),
        );
    }

    /// Returns the longest continuous path spanned from the claimed routes.
    ///
    /// Note that a continous path may visit a city multiple times, but may not repeat a path
    /// through a route.
    ///
    /// # Example
    /// ```
    /// use ticket_to_ride_mcts::city::City;
    /// use ticket_to_ride_mcts::map::{ClaimedRoute, Map};
    ///
    /// let claimed_routes = vec![
    ///     ClaimedRoute {
    ///         route: (City(0), City(1)),
    ///         index: 0,
    ///         length: 3,
    ///     },
    ///     ClaimedRoute {
    ///         route: (City(2), City(1)),
    ///         index: 1,
    ///         length: 5,
    ///     },
    /// ];
    ///
    /// // Route 0 -> 1 is of length 3.
    /// // Route 1 -> 2 is of length 5.
    /// assert_eq!(Map::get_longest_route(&claimed_routes), 8);
    /// ```
    pub fn get_longest_route(claimed_routes: &[ClaimedRoute]) -> u16 {
        let mut cities_to_visit = HashSet::new();

        // Maps each city to a list of adjacent cities, including the length and the index
        // of the route connecting the two.
        let mut all_routes: HashMap<City, SmallVec<[(City, u8, usize); MAX_ROUTES_PER_CITY]>> =
            HashMap::new();

        // Deduplicate the cities that will be explored.
        for claimed_route in claimed_routes {
            let (start, end) = claimed_route.route;

            cities_to_visit.insert(start);
            cities_to_visit.insert(end);

            all_routes.entry(start).or_default().push((
                end,
                claimed_route.length,
                claimed_route.index,
            ));
            all_routes.entry(end).or_default().push((
                start,
                claimed_route.length,
                claimed_route.index,
            ));
        }

        // Prepare multi-threading.
        let all_routes = Arc::new(all_routes);
        let (tx, rx) = mpsc::channel();
        let num_cities_to_visit = cities_to_visit.len();
        let thread_pool = THREAD_POOL
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Each city will spawn a separate job on the pool, and compute the longest route
        // starting at that city.
        for city in cities_to_visit {
            let all_routes = all_routes.clone();
            let tx = tx.clone();

            thread_pool.execute(move || {
                let _ = tx.send(Self::get_longest_route_from_city(
                    city,
                    &all_routes,
                    HashSet::new(),
                    0,
                ));
            });
        }
        drop(tx);

        rx.iter().take(num_cities_to_visit).fold(0, max)
    }

    fn get_longest_route_from_city(
        start: City,
        all_routes: &HashMap<City, SmallVec<[(City, u8, usize); MAX_ROUTES_PER_CITY]>>,
        routes_visited: HashSet<usize>,
        current_length: u16,
    ) -> u16 {
        let mut longest_route_from_city = current_length;

        for (end, length, index) in all_routes.get(&start).into_iter().flatten() {
            if routes_visited.contains(index) {
                continue;
            }

            let mut routes_visited = routes_visited.clone();
            routes_visited.insert(*index);

            longest_route_from_city = max(
                longest_route_from_city,
                Self::get_longest_route_from_city(
                    *end,
                    all_routes,
                    routes_visited,
                    current_length + *length as u16,
                ),
            );
        }

        longest_route_from_city
    }

    /// Mutable accessor to the routes, e.g. to set up ownership directly.
    ///
    /// Should only be used for testing!
    pub fn get_mut_route_owner(&mut self, index: usize) -> Option<&mut Option<usize>> {
        self.routes.get_mut(index).map(|route| &mut route.owner)
    }
}
