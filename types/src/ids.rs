//! Identifiers for members, activities, and verification requests.

use crate::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A member's identity: their unique username.
///
/// Usernames are non-empty, at most [`MemberId::MAX_LEN`] characters, and may
/// not contain `:` (the dedupe-key separator) or control characters.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemberId(String);

impl MemberId {
    pub const MAX_LEN: usize = 64;

    /// Validate and wrap a username.
    pub fn parse(raw: impl Into<String>) -> Result<Self, TypesError> {
        let s = raw.into();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(TypesError::InvalidMemberId("username is empty".into()));
        }
        if trimmed.chars().count() > Self::MAX_LEN {
            return Err(TypesError::InvalidMemberId(format!(
                "username longer than {} characters",
                Self::MAX_LEN
            )));
        }
        if trimmed.chars().any(|c| c == ':' || c.is_control()) {
            return Err(TypesError::InvalidMemberId(format!(
                "username {trimmed:?} contains a forbidden character"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MemberId {
    type Err = TypesError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MemberId {
    type Error = TypesError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<MemberId> for String {
    fn from(id: MemberId) -> Self {
        id.0
    }
}

macro_rules! sequential_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub fn get(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = TypesError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|e| TypesError::InvalidId(format!("{s:?}: {e}")))
            }
        }
    };
}

sequential_id!(
    /// Server-assigned activity identity, starting at 1 in creation order.
    ActivityId
);

sequential_id!(
    /// Server-assigned verification request identity, starting at 1.
    RequestId
);
