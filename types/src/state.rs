//! State enums for verification requests and ledger transactions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// What a verification request is confirming.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationKind {
    /// The member attended; approval awards a fixed number of points.
    Attendance,
    /// The member could not attend; approval refunds the join cost.
    Absence,
}

impl VerificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attendance => "attendance",
            Self::Absence => "absence",
        }
    }

    /// Whether a free-text reason must accompany the request.
    pub fn requires_reason(&self) -> bool {
        matches!(self, Self::Absence)
    }

    /// Whether the request must name the activity it concerns.
    pub fn requires_activity(&self) -> bool {
        matches!(self, Self::Absence)
    }
}

impl FromStr for VerificationKind {
    type Err = TypesError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attendance" => Ok(Self::Attendance),
            "absence" => Ok(Self::Absence),
            other => Err(TypesError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for VerificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a verification request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationStatus {
    /// Awaiting a decision.
    Pending,
    /// Terminal: points were credited.
    Approved,
    /// Terminal: no points moved.
    Rejected,
}

impl VerificationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for VerificationStatus {
    type Err = TypesError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(TypesError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Decision Service verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Approved,
    Rejected,
}

impl Outcome {
    /// The terminal status this outcome moves a request into.
    pub fn status(&self) -> VerificationStatus {
        match self {
            Self::Approved => VerificationStatus::Approved,
            Self::Rejected => VerificationStatus::Rejected,
        }
    }
}

impl FromStr for Outcome {
    type Err = TypesError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approved" | "approve" => Ok(Self::Approved),
            "rejected" | "reject" => Ok(Self::Rejected),
            other => Err(TypesError::UnknownOutcome(other.to_string())),
        }
    }
}

/// Why a ledger transaction moved points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionReason {
    /// Cost charged when joining an activity.
    JoinDebit,
    /// Compensation for a join debit whose join could not complete.
    JoinReversal,
    /// Award for approved attendance.
    AttendanceCredit,
    /// Refund of the join cost for approved absence.
    AbsenceRefund,
    /// Starting balance granted at registration.
    SignupGrant,
}

impl TransactionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JoinDebit => "join-debit",
            Self::JoinReversal => "join-reversal",
            Self::AttendanceCredit => "attendance-credit",
            Self::AbsenceRefund => "absence-refund",
            Self::SignupGrant => "signup-grant",
        }
    }

    /// Whether transactions with this reason take points away.
    pub fn is_debit(&self) -> bool {
        matches!(self, Self::JoinDebit)
    }
}

impl From<VerificationKind> for TransactionReason {
    fn from(kind: VerificationKind) -> Self {
        match kind {
            VerificationKind::Attendance => Self::AttendanceCredit,
            VerificationKind::Absence => Self::AbsenceRefund,
        }
    }
}

impl fmt::Display for TransactionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
