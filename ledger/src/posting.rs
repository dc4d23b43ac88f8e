//! Result of a ledger call.

use sanka_store::Transaction;
use sanka_types::Points;

/// What a debit or credit did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Posting {
    /// A new transaction was appended; `balance` is the member's balance after it.
    Applied {
        transaction: Transaction,
        balance: Points,
    },
    /// The dedupe key had already been applied. Nothing changed; `transaction`
    /// is the entry committed the first time.
    Duplicate { transaction: Transaction },
}

impl Posting {
    pub fn transaction(&self) -> &Transaction {
        match self {
            Self::Applied { transaction, .. } | Self::Duplicate { transaction } => transaction,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}
