// crates/types/src/player.rs
//! Playback surfaces known to the exclusivity arbiter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::job::UnknownName;

/// One media playback surface. At most one is ever active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerId {
    /// The primary episode player.
    Main,
    Debate,
    Director,
    Supercut,
    Digest,
    /// The network-search result player.
    Nebula,
}

impl PlayerId {
    pub const ALL: [PlayerId; 6] = [
        PlayerId::Main,
        PlayerId::Debate,
        PlayerId::Director,
        PlayerId::Supercut,
        PlayerId::Digest,
        PlayerId::Nebula,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerId::Main => "main",
            PlayerId::Debate => "debate",
            PlayerId::Director => "director",
            PlayerId::Supercut => "supercut",
            PlayerId::Digest => "digest",
            PlayerId::Nebula => "nebula",
        }
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayerId {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlayerId::ALL
            .iter()
            .copied()
            .find(|player| player.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_names_round_trip() {
        for player in PlayerId::ALL {
            assert_eq!(player.as_str().parse::<PlayerId>().unwrap(), player);
        }
        assert!("tv".parse::<PlayerId>().is_err());
    }

    #[test]
    fn test_player_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&PlayerId::Nebula).unwrap(),
            "\"nebula\""
        );
    }
}
