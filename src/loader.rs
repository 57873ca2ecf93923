//! Parser for the flat text description of a map.
//!
//! Routes are described one per line, as `<City A> <length> <COLOR> <City B>`,
//! where `COLOR` is one of the eight train colors, or `GRAY` for a route accepting any single color.
//! Destinations are described one per line, as `<City A> <points> <City B>`.
//! Blank lines and lines starting with `#` are skipped.

use crate::card::{DestinationCard, TrainColor};
use crate::city::{City, CityToCity};
use crate::error::{GameError, Result};

use regex::Regex;
use std::collections::HashMap;

const USA_ROUTES: &str = include_str!("../data/usa_routes.txt");
const USA_DESTINATIONS: &str = include_str!("../data/usa_destinations.txt");

const GRAY: &str = "GRAY";
const MAX_ROUTE_LENGTH: u8 = 6;

lazy_static! {
    static ref ROUTE_LINE: Regex =
        Regex::new(r"^(\D+?)\s+(\d+)\s+([A-Za-z]+)\s+(\D+?)$").unwrap();
    static ref DESTINATION_LINE: Regex = Regex::new(r"^(\D+?)\s+(\d+)\s+(\D+?)$").unwrap();
    static ref USA_MAP: Result<MapData> = MapData::parse(USA_ROUTES, USA_DESTINATIONS);
}

/// A route as described by the map data, before any game is created.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteSpec {
    pub endpoints: CityToCity,
    pub length: u8,
    /// `Wild` denotes a gray route.
    pub train_color: TrainColor,
}

/// A destination card as described by the map data.
#[derive(Clone, Debug, PartialEq)]
pub struct DestinationSpec {
    pub destination: CityToCity,
    pub points: u8,
}

/// Well-formed map data: interned city names, routes and destinations, in file order.
///
/// Route indices and destination indices are positions in these lists,
/// so they are stable for as long as the same data is used.
#[derive(Clone, Debug, PartialEq)]
pub struct MapData {
    city_names: Vec<String>,
    routes: Vec<RouteSpec>,
    destinations: Vec<DestinationSpec>,
}

/// Interns city names in first-seen order.
#[derive(Default)]
struct CityInterner {
    names: Vec<String>,
    cities: HashMap<String, City>,
}

impl CityInterner {
    fn intern(&mut self, name: &str, line: usize) -> Result<City> {
        if let Some(city) = self.cities.get(name) {
            return Ok(*city);
        }

        let city = u16::try_from(self.names.len())
            .map(City)
            .map_err(|_| malformed(line, "Too many cities on this map."))?;

        self.names.push(name.to_string());
        self.cities.insert(name.to_string(), city);
        Ok(city)
    }

    fn get(&self, name: &str) -> Option<City> {
        self.cities.get(name).copied()
    }
}

fn malformed(line: usize, reason: impl Into<String>) -> GameError {
    GameError::MalformedMapData {
        line,
        reason: reason.into(),
    }
}

/// Lines holding a record, along with their 1-based line number.
fn records(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

fn parse_route_color(token: &str, line: usize) -> Result<TrainColor> {
    if token.eq_ignore_ascii_case(GRAY) {
        return Ok(TrainColor::Wild);
    }

    match token.parse::<TrainColor>() {
        Ok(color) if color.is_not_wild() => Ok(color),
        _ => Err(malformed(line, format!("Unknown route color {}.", token))),
    }
}

impl MapData {
    /// Parses routes and destinations.
    ///
    /// Cities are interned from the routes; destinations may only name cities that appear in a route.
    ///
    /// # Example
    /// ```
    /// use ticket_to_ride_mcts::card::TrainColor;
    /// use ticket_to_ride_mcts::city::City;
    /// use ticket_to_ride_mcts::loader::MapData;
    ///
    /// let map_data = MapData::parse(
    ///     "Denver 4 ORANGE Kansas City\nKansas City 2 GRAY Saint Louis\n",
    ///     "Denver 6 Saint Louis\n",
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(map_data.num_cities(), 3);
    /// assert_eq!(map_data.routes()[0].train_color, TrainColor::Orange);
    /// assert_eq!(map_data.routes()[1].train_color, TrainColor::Wild);
    /// assert_eq!(map_data.destinations()[0].destination, (City(0), City(2)));
    /// assert_eq!(map_data.city_name(City(1)), Some("Kansas City"));
    /// ```
    pub fn parse(routes: &str, destinations: &str) -> Result<Self> {
        let mut interner = CityInterner::default();

        let mut route_specs = Vec::new();
        for (line, record) in records(routes) {
            let captures = ROUTE_LINE.captures(record).ok_or_else(|| {
                malformed(
                    line,
                    format!(
                        "Expected `<City A> <length> <COLOR> <City B>`, got `{}`.",
                        record
                    ),
                )
            })?;

            let length = captures[2]
                .parse::<u8>()
                .ok()
                .filter(|length| (1..=MAX_ROUTE_LENGTH).contains(length))
                .ok_or_else(|| {
                    malformed(
                        line,
                        format!(
                            "A route must have a length between 1 and {}, got {}.",
                            MAX_ROUTE_LENGTH, &captures[2]
                        ),
                    )
                })?;
            let train_color = parse_route_color(&captures[3], line)?;

            let (start_name, end_name) = (captures[1].trim(), captures[4].trim());
            if start_name == end_name {
                return Err(malformed(
                    line,
                    format!("A route cannot connect {} to itself.", start_name),
                ));
            }

            let start = interner.intern(start_name, line)?;
            let end = interner.intern(end_name, line)?;

            route_specs.push(RouteSpec {
                endpoints: (start, end),
                length,
                train_color,
            });
        }

        if route_specs.is_empty() {
            return Err(malformed(0, "A map must have at least one route."));
        }

        let mut destination_specs = Vec::new();
        for (line, record) in records(destinations) {
            let captures = DESTINATION_LINE.captures(record).ok_or_else(|| {
                malformed(
                    line,
                    format!("Expected `<City A> <points> <City B>`, got `{}`.", record),
                )
            })?;

            let points = captures[2].parse::<u8>().map_err(|_| {
                malformed(
                    line,
                    format!("Invalid destination points {}.", &captures[2]),
                )
            })?;

            let lookup = |name: &str| {
                interner.get(name).ok_or_else(|| {
                    malformed(
                        line,
                        format!("Destination city {} is not connected to any route.", name),
                    )
                })
            };
            let start = lookup(captures[1].trim())?;
            let end = lookup(captures[3].trim())?;

            if start == end {
                return Err(malformed(
                    line,
                    "A destination must connect two different cities.",
                ));
            }

            destination_specs.push(DestinationSpec {
                destination: (start, end),
                points,
            });
        }

        Ok(Self {
            city_names: interner.names,
            routes: route_specs,
            destinations: destination_specs,
        })
    }

    /// The bundled USA map: 100 routes between 36 cities, and 30 destination cards.
    /// Parsed once, then shared.
    pub fn usa() -> Result<&'static MapData> {
        USA_MAP.as_ref().map_err(Clone::clone)
    }

    #[inline]
    pub fn routes(&self) -> &[RouteSpec] {
        &self.routes
    }

    #[inline]
    pub fn destinations(&self) -> &[DestinationSpec] {
        &self.destinations
    }

    #[inline]
    pub fn city_names(&self) -> &[String] {
        &self.city_names
    }

    #[inline]
    pub fn num_cities(&self) -> usize {
        self.city_names.len()
    }

    pub fn city_name(&self, city: City) -> Option<&str> {
        self.city_names.get(city.index()).map(String::as_str)
    }

    /// Destination cards, indexed in file order.
    pub fn destination_cards(&self) -> Vec<DestinationCard> {
        self.destinations
            .iter()
            .enumerate()
            .map(|(index, spec)| DestinationCard {
                destination: spec.destination,
                points: spec.points,
                index,
            })
            .collect()
    }
}
