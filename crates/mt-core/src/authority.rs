//! User privilege ordering.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub type UserId = String;

/// Ordinal privilege rank. Declaration order is the total order.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AuthorityLevel {
    None,
    #[default]
    Player,
    Trusted,
    Assistant,
    Gamemaster,
}

impl AuthorityLevel {
    /// Assistant and above see every participant's tracker state.
    pub fn is_privileged(self) -> bool {
        self >= AuthorityLevel::Assistant
    }

    /// Whether a holder of `self` may override something owned at `other`.
    /// Every override decision in the protocol goes through here.
    pub fn can_override(self, other: Self) -> bool {
        self >= other
    }

    pub fn outranks(self, other: Self) -> bool {
        self > other
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuthorityLevel::None => "none",
            AuthorityLevel::Player => "player",
            AuthorityLevel::Trusted => "trusted",
            AuthorityLevel::Assistant => "assistant",
            AuthorityLevel::Gamemaster => "gamemaster",
        }
    }
}

impl fmt::Display for AuthorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(AuthorityLevel::None),
            "player" => Ok(AuthorityLevel::Player),
            "trusted" => Ok(AuthorityLevel::Trusted),
            "assistant" => Ok(AuthorityLevel::Assistant),
            "gamemaster" | "gm" => Ok(AuthorityLevel::Gamemaster),
            other => Err(format!("unknown authority level '{other}'")),
        }
    }
}

/// Known users and their ranks. Unknown users rank as [`AuthorityLevel::None`].
#[derive(Clone, Debug, Default)]
pub struct Roster {
    users: BTreeMap<UserId, AuthorityLevel>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, user: &str, level: AuthorityLevel) {
        self.users.insert(user.to_string(), level);
    }

    pub fn authority_of(&self, user: &str) -> AuthorityLevel {
        self.users.get(user).copied().unwrap_or(AuthorityLevel::None)
    }
}

impl<S: AsRef<str>> FromIterator<(S, AuthorityLevel)> for Roster {
    fn from_iter<I: IntoIterator<Item = (S, AuthorityLevel)>>(iter: I) -> Self {
        let mut roster = Roster::new();
        for (user, level) in iter {
            roster.insert(user.as_ref(), level);
        }
        roster
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_order() {
        use AuthorityLevel::*;
        assert!(None < Player);
        assert!(Player < Trusted);
        assert!(Trusted < Assistant);
        assert!(Assistant < Gamemaster);
    }

    #[test]
    fn test_privilege_threshold() {
        assert!(!AuthorityLevel::Trusted.is_privileged());
        assert!(AuthorityLevel::Assistant.is_privileged());
        assert!(AuthorityLevel::Gamemaster.is_privileged());
    }

    #[test]
    fn test_override_is_reflexive() {
        assert!(AuthorityLevel::Player.can_override(AuthorityLevel::Player));
        assert!(!AuthorityLevel::Player.outranks(AuthorityLevel::Player));
        assert!(!AuthorityLevel::Player.can_override(AuthorityLevel::Gamemaster));
    }

    #[test]
    fn test_parse() {
        assert_eq!("GM".parse::<AuthorityLevel>(), Ok(AuthorityLevel::Gamemaster));
        assert_eq!("trusted".parse::<AuthorityLevel>(), Ok(AuthorityLevel::Trusted));
        assert!("admiral".parse::<AuthorityLevel>().is_err());
    }

    #[test]
    fn test_unknown_user_has_no_rank() {
        let roster: Roster = [("gm", AuthorityLevel::Gamemaster)].into_iter().collect();
        assert_eq!(roster.authority_of("gm"), AuthorityLevel::Gamemaster);
        assert_eq!(roster.authority_of("ghost"), AuthorityLevel::None);
    }
}
