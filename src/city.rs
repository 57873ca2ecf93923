use serde::{Deserialize, Serialize};
use std::fmt;

/// A city on the map.
///
/// Cities are opaque: the [`crate::loader`] interns every city name it reads into a `City`,
/// in first-seen order. Human-readable names are kept by the [`crate::map::Map`].
///
/// # JSON
/// Cities are serialized as their 16-bit unsigned index.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize,
)]
#[serde(transparent)]
pub struct City(pub u16);

impl City {
    /// Smallest possible city, used to build range queries over city pairs.
    pub const MIN: City = City(0);
    /// Largest possible city, used to build range queries over city pairs.
    pub const MAX: City = City(u16::MAX);

    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "city #{}", self.0)
    }
}

/// Top-level representation of a connection between two cities.
pub type CityToCity = (City, City);
