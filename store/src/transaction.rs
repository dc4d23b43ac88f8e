//! Transaction log storage trait.

use crate::StoreError;
use sanka_types::{DedupeKey, MemberId, Points, Timestamp, TransactionReason, TxId};
use serde::{Deserialize, Serialize};

/// An immutable ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    /// Position in the global log, starting at 1.
    pub sequence: u64,
    pub member: MemberId,
    /// Signed point change.
    pub delta: i64,
    pub reason: TransactionReason,
    pub dedupe_key: DedupeKey,
    pub timestamp: Timestamp,
}

/// Trait for the append-only transaction log.
pub trait TransactionStore {
    /// Append `tx` and apply its delta to the member's cached balance as one
    /// atomic step, returning the new balance.
    ///
    /// Fails with `Duplicate` if the dedupe key was already applied, `NotFound`
    /// if the member does not exist, and `Constraint` if the delta would take
    /// the balance below zero. Nothing is written on failure. The store assigns
    /// `tx.sequence`; the caller's value is ignored.
    fn append_posting(&self, tx: &Transaction) -> Result<(Transaction, Points), StoreError>;

    fn get_by_dedupe_key(&self, key: &DedupeKey) -> Result<Option<Transaction>, StoreError>;

    /// A member's transactions in commit order.
    fn transactions_of_member(&self, member: &MemberId) -> Result<Vec<Transaction>, StoreError>;

    fn transaction_count(&self) -> Result<u64, StoreError>;
}
