use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

/// One of the physical restaurant / food-truck sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Malmo,
    Trelleborg,
    Ystad,
}

impl Location {
    pub const ALL: [Location; 3] = [Location::Malmo, Location::Trelleborg, Location::Ystad];

    pub fn code(&self) -> &'static str {
        match self {
            Location::Malmo => "malmo",
            Location::Trelleborg => "trelleborg",
            Location::Ystad => "ystad",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Location::Malmo => "Malmö",
            Location::Trelleborg => "Trelleborg",
            Location::Ystad => "Ystad",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown location: {0}")]
pub struct UnknownLocation(pub String);

impl FromStr for Location {
    type Err = UnknownLocation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "malmo" => Ok(Location::Malmo),
            "trelleborg" => Ok(Location::Trelleborg),
            "ystad" => Ok(Location::Ystad),
            other => Err(UnknownLocation(other.to_string())),
        }
    }
}

/// Either a single location or the privileged "all" value.
///
/// Used for staff assignments, the terminal's list filter and change-feed subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LocationScope {
    #[default]
    All,
    Only(Location),
}

impl LocationScope {
    pub fn matches(&self, location: Location) -> bool {
        match self {
            LocationScope::All => true,
            LocationScope::Only(own) => *own == location,
        }
    }

    /// Matches a raw location code read from a loosely typed row or metadata blob.
    pub fn matches_code(&self, code: &str) -> bool {
        match self {
            LocationScope::All => true,
            LocationScope::Only(own) => code.parse::<Location>().is_ok_and(|loc| loc == *own),
        }
    }

    pub fn location(&self) -> Option<Location> {
        match self {
            LocationScope::All => None,
            LocationScope::Only(location) => Some(*location),
        }
    }
}

impl fmt::Display for LocationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationScope::All => f.write_str("all"),
            LocationScope::Only(location) => location.fmt(f),
        }
    }
}

impl FromStr for LocationScope {
    type Err = UnknownLocation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(LocationScope::All);
        }
        s.parse().map(LocationScope::Only)
    }
}

impl From<Location> for LocationScope {
    fn from(location: Location) -> Self {
        LocationScope::Only(location)
    }
}

impl Serialize for LocationScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LocationScope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scope_values() {
        assert_eq!("all".parse::<LocationScope>().unwrap(), LocationScope::All);
        assert_eq!(
            "Malmo".parse::<LocationScope>().unwrap(),
            LocationScope::Only(Location::Malmo)
        );
        assert!("lund".parse::<LocationScope>().is_err());
    }

    #[test]
    fn scope_matching() {
        let malmo = LocationScope::Only(Location::Malmo);
        assert!(malmo.matches(Location::Malmo));
        assert!(!malmo.matches(Location::Trelleborg));
        assert!(LocationScope::All.matches(Location::Ystad));
        assert!(malmo.matches_code("malmo"));
        assert!(!malmo.matches_code("garbage"));
    }

    #[test]
    fn scope_serializes_as_plain_string() {
        let json = serde_json::to_string(&LocationScope::Only(Location::Ystad)).unwrap();
        assert_eq!(json, "\"ystad\"");
        let scope: LocationScope = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(scope, LocationScope::All);
    }
}
