//! Deduplication keys for side-effecting ledger calls.
//!
//! Every ledger mutation carries a key; the ledger applies at most one
//! transaction per key. Components are joined with `:` (which member ids may
//! not contain), so distinct inputs never produce the same key.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ActivityId, MemberId, RequestId};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupeKey(String);

impl DedupeKey {
    /// An arbitrary caller-supplied key.
    pub fn custom(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Key for the debit of the `attempt`-th join of `member` to `activity`.
    ///
    /// The first attempt has no suffix; later attempts (only possible after a
    /// compensated join) are suffixed with `#n`.
    pub fn join_attempt(member: &MemberId, activity: ActivityId, attempt: u32) -> Self {
        Self(with_attempt(format!("join:{member}:{activity}"), attempt))
    }

    pub fn join(member: &MemberId, activity: ActivityId) -> Self {
        Self::join_attempt(member, activity, 1)
    }

    /// Key for the compensating credit that reverses a join debit.
    pub fn join_reversal_attempt(member: &MemberId, activity: ActivityId, attempt: u32) -> Self {
        Self(with_attempt(format!("join-reversal:{member}:{activity}"), attempt))
    }

    pub fn join_reversal(member: &MemberId, activity: ActivityId) -> Self {
        Self::join_reversal_attempt(member, activity, 1)
    }

    /// Key for the credit triggered by approving a verification request.
    pub fn verification(request: RequestId) -> Self {
        Self(format!("verification:{request}"))
    }

    /// Key for the starting balance granted at registration.
    pub fn signup(member: &MemberId) -> Self {
        Self(format!("signup:{member}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn with_attempt(base: String, attempt: u32) -> String {
    if attempt <= 1 {
        base
    } else {
        format!("{base}#{attempt}")
    }
}

impl fmt::Display for DedupeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str) -> MemberId {
        MemberId::parse(name).unwrap()
    }

    #[test]
    fn join_keys_do_not_collide_across_boundaries() {
        // "ab" + 1 vs "a" + "b1" would collide under naive concatenation.
        let a = DedupeKey::join(&member("ab"), ActivityId::new(1));
        let b = DedupeKey::join(&member("a"), ActivityId::new(11));
        assert_ne!(a, b);
    }

    #[test]
    fn first_attempt_has_no_suffix() {
        let m = member("hana");
        assert_eq!(DedupeKey::join(&m, ActivityId::new(3)).as_str(), "join:hana:3");
        assert_eq!(
            DedupeKey::join_attempt(&m, ActivityId::new(3), 2).as_str(),
            "join:hana:3#2"
        );
        assert_eq!(
            DedupeKey::join_reversal(&m, ActivityId::new(3)).as_str(),
            "join-reversal:hana:3"
        );
    }

    #[test]
    fn verification_key_is_request_scoped() {
        assert_eq!(
            DedupeKey::verification(RequestId::new(42)).as_str(),
            "verification:42"
        );
    }
}
