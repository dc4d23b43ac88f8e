use sanka_catalog::CatalogError;
use sanka_ledger::LedgerError;
use sanka_participation::ParticipationError;
use sanka_store::StoreError;
use sanka_types::TypesError;
use sanka_verification::{DecisionError, VerificationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("participation error: {0}")]
    Participation(#[from] ParticipationError),

    #[error("verification error: {0}")]
    Verification(#[from] VerificationError),

    #[error("decision service error: {0}")]
    Decision(#[from] DecisionError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    InvalidMember(#[from] TypesError),

    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification callers use to decide how to react to an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The input was malformed; retrying unchanged will fail again.
    Validation,
    /// The operation clashes with existing state.
    Conflict,
    /// A limited resource (points, seats, a prior join) is missing.
    Resource,
    NotFound,
    /// Retrying later may succeed.
    Transient,
    Internal,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::Resource => "resource",
            Self::NotFound => "not_found",
            Self::Transient => "transient",
            Self::Internal => "internal",
        }
    }
}

impl ServiceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Ledger(e) => ledger_class(e),
            Self::Catalog(e) => catalog_class(e),
            Self::Participation(e) => participation_class(e),
            Self::Verification(e) => verification_class(e),
            Self::Decision(_) | Self::Timeout { .. } => ErrorClass::Transient,
            Self::Store(e) => store_class(e),
            Self::InvalidMember(_) => ErrorClass::Validation,
            Self::Config(_) | Self::Internal(_) | Self::Io(_) => ErrorClass::Internal,
        }
    }

    /// Stable machine-readable identifier, used as the `error` field of API
    /// responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Ledger(e) => ledger_code(e),
            Self::Catalog(e) => catalog_code(e),
            Self::Participation(e) => match e {
                ParticipationError::ActivityNotFound(_) => "activity_not_found",
                ParticipationError::ActivityFull(_) => "activity_full",
                ParticipationError::AlreadyJoined { .. } => "already_joined",
                ParticipationError::InsufficientBalance { .. } => "insufficient_balance",
                ParticipationError::MemberNotFound(_) => "member_not_found",
                ParticipationError::CompensationFailed { .. } => "compensation_failed",
                ParticipationError::Ledger(e) => ledger_code(e),
                ParticipationError::Catalog(e) => catalog_code(e),
                ParticipationError::Storage(e) => store_code(e),
            },
            Self::Verification(e) => match e {
                VerificationError::MemberNotFound(_) => "member_not_found",
                VerificationError::MissingReason => "missing_reason",
                VerificationError::MissingActivity => "missing_activity",
                VerificationError::MissingEvidence => "missing_evidence",
                VerificationError::InvalidEvidence(_) => "invalid_evidence",
                VerificationError::ActivityNotFound(_) => "activity_not_found",
                VerificationError::NotJoined { .. } => "not_joined",
                VerificationError::AlreadySubmitted { .. } => "already_submitted",
                VerificationError::RequestNotFound(_) => "request_not_found",
                VerificationError::AlreadyResolved { .. } => "already_resolved",
                VerificationError::Ledger(e) => ledger_code(e),
                VerificationError::Storage(e) => store_code(e),
            },
            Self::Decision(_) => "decision_unavailable",
            Self::Store(e) => store_code(e),
            Self::InvalidMember(_) => "invalid_member",
            Self::Timeout { .. } => "timeout",
            Self::Config(_) => "config",
            Self::Internal(_) | Self::Io(_) => "internal",
        }
    }
}

fn ledger_class(e: &LedgerError) -> ErrorClass {
    match e {
        LedgerError::MemberNotFound(_) => ErrorClass::NotFound,
        LedgerError::MemberExists(_) | LedgerError::KeyConflict { .. } => ErrorClass::Conflict,
        LedgerError::InsufficientBalance { .. } => ErrorClass::Resource,
        LedgerError::AmountTooLarge(_) => ErrorClass::Validation,
        LedgerError::Storage(e) => store_class(e),
    }
}

fn catalog_class(e: &CatalogError) -> ErrorClass {
    match e {
        CatalogError::InvalidActivity { .. } => ErrorClass::Validation,
        CatalogError::ActivityNotFound(_) => ErrorClass::NotFound,
        CatalogError::ActivityFull(_) => ErrorClass::Resource,
        CatalogError::Storage(e) => store_class(e),
    }
}

fn participation_class(e: &ParticipationError) -> ErrorClass {
    match e {
        ParticipationError::ActivityNotFound(_) | ParticipationError::MemberNotFound(_) => {
            ErrorClass::NotFound
        }
        ParticipationError::ActivityFull(_) | ParticipationError::InsufficientBalance { .. } => {
            ErrorClass::Resource
        }
        ParticipationError::AlreadyJoined { .. } => ErrorClass::Conflict,
        ParticipationError::CompensationFailed { .. } => ErrorClass::Internal,
        ParticipationError::Ledger(e) => ledger_class(e),
        ParticipationError::Catalog(e) => catalog_class(e),
        ParticipationError::Storage(e) => store_class(e),
    }
}

fn verification_class(e: &VerificationError) -> ErrorClass {
    match e {
        VerificationError::MissingReason
        | VerificationError::MissingActivity
        | VerificationError::MissingEvidence
        | VerificationError::InvalidEvidence(_) => ErrorClass::Validation,
        VerificationError::MemberNotFound(_)
        | VerificationError::ActivityNotFound(_)
        | VerificationError::RequestNotFound(_) => ErrorClass::NotFound,
        VerificationError::NotJoined { .. } => ErrorClass::Resource,
        VerificationError::AlreadySubmitted { .. } | VerificationError::AlreadyResolved { .. } => {
            ErrorClass::Conflict
        }
        VerificationError::Ledger(e) => ledger_class(e),
        VerificationError::Storage(e) => store_class(e),
    }
}

fn store_class(e: &StoreError) -> ErrorClass {
    match e {
        StoreError::NotFound(_) => ErrorClass::NotFound,
        StoreError::Duplicate(_) => ErrorClass::Conflict,
        _ => ErrorClass::Internal,
    }
}

fn ledger_code(e: &LedgerError) -> &'static str {
    match e {
        LedgerError::MemberNotFound(_) => "member_not_found",
        LedgerError::MemberExists(_) => "member_exists",
        LedgerError::InsufficientBalance { .. } => "insufficient_balance",
        LedgerError::KeyConflict { .. } => "key_conflict",
        LedgerError::AmountTooLarge(_) => "amount_too_large",
        LedgerError::Storage(e) => store_code(e),
    }
}

fn catalog_code(e: &CatalogError) -> &'static str {
    match e {
        CatalogError::InvalidActivity { .. } => "invalid_activity",
        CatalogError::ActivityNotFound(_) => "activity_not_found",
        CatalogError::ActivityFull(_) => "activity_full",
        CatalogError::Storage(e) => store_code(e),
    }
}

fn store_code(e: &StoreError) -> &'static str {
    match e {
        StoreError::NotFound(_) => "not_found",
        StoreError::Duplicate(_) => "duplicate",
        _ => "storage",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sanka_types::{ActivityId, MemberId, Points, RequestId, VerificationStatus};

    fn hana() -> MemberId {
        MemberId::parse("hana").unwrap()
    }

    #[test]
    fn errors_map_to_their_class() {
        let cases: Vec<(ServiceError, ErrorClass, &str)> = vec![
            (
                CatalogError::InvalidActivity {
                    field: "cost",
                    reason: "negative".into(),
                }
                .into(),
                ErrorClass::Validation,
                "invalid_activity",
            ),
            (
                ParticipationError::AlreadyJoined {
                    member: hana(),
                    activity: ActivityId::new(1),
                }
                .into(),
                ErrorClass::Conflict,
                "already_joined",
            ),
            (
                ParticipationError::InsufficientBalance {
                    needed: Points::new(30),
                    available: Points::new(10),
                }
                .into(),
                ErrorClass::Resource,
                "insufficient_balance",
            ),
            (
                ParticipationError::ActivityFull(ActivityId::new(2)).into(),
                ErrorClass::Resource,
                "activity_full",
            ),
            (
                VerificationError::MissingReason.into(),
                ErrorClass::Validation,
                "missing_reason",
            ),
            (
                VerificationError::AlreadyResolved {
                    id: RequestId::new(1),
                    status: VerificationStatus::Approved,
                }
                .into(),
                ErrorClass::Conflict,
                "already_resolved",
            ),
            (
                LedgerError::MemberNotFound(hana()).into(),
                ErrorClass::NotFound,
                "member_not_found",
            ),
            (
                ServiceError::Timeout { operation: "join" },
                ErrorClass::Transient,
                "timeout",
            ),
            (
                DecisionError::Unreachable("down".into()).into(),
                ErrorClass::Transient,
                "decision_unavailable",
            ),
            (
                StoreError::Backend("disk".into()).into(),
                ErrorClass::Internal,
                "storage",
            ),
        ];
        for (err, class, code) in cases {
            assert_eq!(err.class(), class, "{err}");
            assert_eq!(err.code(), code, "{err}");
        }
    }

    #[test]
    fn nested_storage_errors_stay_internal() {
        let err: ServiceError =
            ParticipationError::Ledger(LedgerError::Storage(StoreError::Corruption("x".into())))
                .into();
        assert_eq!(err.class(), ErrorClass::Internal);
        assert_eq!(err.code(), "storage");
    }
}
