//! Point amounts.
//!
//! Balances and costs are whole, non-negative points. Ledger entries carry a
//! signed delta (`i64`); a `Points` value converts to and from that delta.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// A non-negative quantity of points.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Points(u64);

impl Points {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// The amount as a positive ledger delta, or `None` if it exceeds `i64::MAX`.
    pub fn as_credit(&self) -> Option<i64> {
        i64::try_from(self.0).ok()
    }

    /// The amount as a negative ledger delta, or `None` if it exceeds `i64::MAX`.
    pub fn as_debit(&self) -> Option<i64> {
        self.as_credit().map(|d| -d)
    }

    /// Apply a signed delta, returning `None` on underflow below zero or overflow.
    pub fn apply_delta(self, delta: i64) -> Option<Self> {
        if delta >= 0 {
            self.0.checked_add(delta.unsigned_abs()).map(Self)
        } else {
            self.0.checked_sub(delta.unsigned_abs()).map(Self)
        }
    }
}

impl Add for Points {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Points {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl From<u64> for Points {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pt", self.0)
    }
}
