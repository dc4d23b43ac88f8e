//! The points ledger over an abstract store.

use std::sync::{Arc, Mutex, MutexGuard};

use sanka_store::{MemberRecord, Store, StoreError, Transaction};
use sanka_types::{Clock, DedupeKey, MemberId, Points, TransactionReason, TxId};
use tracing::{debug, info};

use crate::{AuditReport, LedgerError, Posting};

/// Dedupe-keyed debits and credits.
///
/// Commits are serialized by an internal lock: the duplicate check, the
/// balance check and the append happen as one step, so two concurrent calls
/// with the same key cannot both apply and a debit can never overdraw.
pub struct PointsLedger {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    commit: Mutex<()>,
}

impl PointsLedger {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            commit: Mutex::new(()),
        }
    }

    fn commit_lock(&self) -> MutexGuard<'_, ()> {
        // The lock guards no data, so a poisoned lock is still usable.
        self.commit.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `member` and post their starting balance as a `signup-grant`.
    ///
    /// Registration that was interrupted between the two writes is completed
    /// by calling again; a fully registered member yields `MemberExists`.
    pub fn open_account(
        &self,
        member: &MemberId,
        starting_balance: Points,
    ) -> Result<Posting, LedgerError> {
        let _guard = self.commit_lock();
        let key = DedupeKey::signup(member);
        match self
            .store
            .insert_member(&MemberRecord::new(member.clone(), self.clock.now()))
        {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                if self.store.get_by_dedupe_key(&key)?.is_some() {
                    return Err(LedgerError::MemberExists(member.clone()));
                }
                debug!(%member, "completing interrupted registration");
            }
            Err(e) => return Err(e.into()),
        }
        let posting = self.post_locked(
            member,
            credit_delta(starting_balance)?,
            key,
            TransactionReason::SignupGrant,
        )?;
        info!(%member, balance = %starting_balance, "opened account");
        Ok(posting)
    }

    /// Take `amount` from `member`.
    ///
    /// A key that was already applied returns [`Posting::Duplicate`] without
    /// checking the balance again.
    pub fn debit(
        &self,
        member: &MemberId,
        amount: Points,
        key: DedupeKey,
        reason: TransactionReason,
    ) -> Result<Posting, LedgerError> {
        let delta = amount
            .as_debit()
            .ok_or(LedgerError::AmountTooLarge(amount))?;
        let _guard = self.commit_lock();
        self.post_locked(member, delta, key, reason)
    }

    /// Give `amount` to `member`.
    pub fn credit(
        &self,
        member: &MemberId,
        amount: Points,
        key: DedupeKey,
        reason: TransactionReason,
    ) -> Result<Posting, LedgerError> {
        let delta = credit_delta(amount)?;
        let _guard = self.commit_lock();
        self.post_locked(member, delta, key, reason)
    }

    fn post_locked(
        &self,
        member: &MemberId,
        delta: i64,
        key: DedupeKey,
        reason: TransactionReason,
    ) -> Result<Posting, LedgerError> {
        if let Some(existing) = self.store.get_by_dedupe_key(&key)? {
            return duplicate_of(existing, member, delta, reason);
        }

        let record = self.member_record(member)?;
        if delta < 0 && record.balance.apply_delta(delta).is_none() {
            return Err(LedgerError::InsufficientBalance {
                member: member.clone(),
                needed: Points::new(delta.unsigned_abs()),
                available: record.balance,
            });
        }

        let tx = Transaction {
            id: TxId::for_key(&key),
            sequence: 0,
            member: member.clone(),
            delta,
            reason,
            dedupe_key: key,
            timestamp: self.clock.now(),
        };
        match self.store.append_posting(&tx) {
            Ok((transaction, balance)) => {
                debug!(
                    %member,
                    delta,
                    reason = %reason,
                    key = %transaction.dedupe_key,
                    %balance,
                    "posted"
                );
                Ok(Posting::Applied {
                    transaction,
                    balance,
                })
            }
            Err(StoreError::Duplicate(_)) => match self.store.get_by_dedupe_key(&tx.dedupe_key)? {
                Some(existing) => duplicate_of(existing, member, delta, reason),
                None => Err(StoreError::Corruption(format!(
                    "dedupe key {} reported as duplicate but not found",
                    tx.dedupe_key
                ))
                .into()),
            },
            Err(StoreError::NotFound(_)) => Err(LedgerError::MemberNotFound(member.clone())),
            Err(StoreError::Constraint(_)) => Err(LedgerError::InsufficientBalance {
                member: member.clone(),
                needed: Points::new(delta.unsigned_abs()),
                available: self.balance_of(member)?,
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn member_record(&self, member: &MemberId) -> Result<MemberRecord, LedgerError> {
        self.store.get_member(member).map_err(|e| match e {
            StoreError::NotFound(_) => LedgerError::MemberNotFound(member.clone()),
            other => other.into(),
        })
    }

    pub fn balance_of(&self, member: &MemberId) -> Result<Points, LedgerError> {
        Ok(self.member_record(member)?.balance)
    }

    /// Whether a transaction with `key` has been applied.
    pub fn is_applied(&self, key: &DedupeKey) -> Result<bool, LedgerError> {
        Ok(self.store.get_by_dedupe_key(key)?.is_some())
    }

    /// The member's transactions in commit order.
    pub fn history(&self, member: &MemberId) -> Result<Vec<Transaction>, LedgerError> {
        self.member_record(member)?;
        Ok(self.store.transactions_of_member(member)?)
    }

    /// Re-derive the member's balance from the log and compare it with the cache.
    pub fn audit(&self, member: &MemberId) -> Result<AuditReport, LedgerError> {
        let _guard = self.commit_lock();
        let record = self.member_record(member)?;
        let log = self.store.transactions_of_member(member)?;
        Ok(AuditReport {
            member: member.clone(),
            cached: record.balance,
            derived: log.iter().map(|t| t.delta as i128).sum(),
            transactions: log.len(),
        })
    }

    /// Audit every member.
    pub fn audit_all(&self) -> Result<Vec<AuditReport>, LedgerError> {
        let members = self.store.iter_members()?;
        members.iter().map(|m| self.audit(&m.id)).collect()
    }
}

fn credit_delta(amount: Points) -> Result<i64, LedgerError> {
    amount.as_credit().ok_or(LedgerError::AmountTooLarge(amount))
}

fn duplicate_of(
    existing: Transaction,
    member: &MemberId,
    delta: i64,
    reason: TransactionReason,
) -> Result<Posting, LedgerError> {
    if &existing.member != member || existing.delta != delta || existing.reason != reason {
        return Err(LedgerError::KeyConflict {
            key: existing.dedupe_key,
        });
    }
    debug!(%member, key = %existing.dedupe_key, "duplicate posting ignored");
    Ok(Posting::Duplicate {
        transaction: existing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sanka_nullables::{NullClock, NullStore};
    use sanka_store::TransactionStore;

    fn ledger() -> (PointsLedger, Arc<NullStore>) {
        let store = Arc::new(NullStore::new());
        let ledger = PointsLedger::new(store.clone(), Arc::new(NullClock::new(1_000)));
        (ledger, store)
    }

    fn member(name: &str) -> MemberId {
        MemberId::parse(name).unwrap()
    }

    #[test]
    fn open_account_posts_signup_grant() {
        let (ledger, _) = ledger();
        let m = member("ada");
        let posting = ledger.open_account(&m, Points::new(20)).unwrap();
        assert_eq!(posting.transaction().reason, TransactionReason::SignupGrant);
        assert_eq!(ledger.balance_of(&m).unwrap(), Points::new(20));
        assert!(matches!(
            ledger.open_account(&m, Points::new(20)),
            Err(LedgerError::MemberExists(_))
        ));
        assert_eq!(ledger.history(&m).unwrap().len(), 1);
    }

    #[test]
    fn interrupted_registration_is_completed() {
        let (ledger, store) = ledger();
        let m = member("ada");
        store.fail_next_posting();
        assert!(ledger.open_account(&m, Points::new(20)).is_err());
        assert_eq!(ledger.balance_of(&m).unwrap(), Points::ZERO);

        ledger.open_account(&m, Points::new(20)).unwrap();
        assert_eq!(ledger.balance_of(&m).unwrap(), Points::new(20));
    }

    #[test]
    fn debit_reduces_balance() {
        let (ledger, _) = ledger();
        let m = member("ada");
        ledger.open_account(&m, Points::new(50)).unwrap();
        let posting = ledger
            .debit(
                &m,
                Points::new(30),
                DedupeKey::custom("join:ada:1"),
                TransactionReason::JoinDebit,
            )
            .unwrap();
        match posting {
            Posting::Applied {
                transaction,
                balance,
            } => {
                assert_eq!(balance, Points::new(20));
                assert_eq!(transaction.delta, -30);
            }
            Posting::Duplicate { .. } => panic!("expected a new posting"),
        }
    }

    #[test]
    fn insufficient_balance_writes_nothing() {
        let (ledger, store) = ledger();
        let m = member("ada");
        ledger.open_account(&m, Points::new(10)).unwrap();
        let err = ledger
            .debit(
                &m,
                Points::new(30),
                DedupeKey::custom("join:ada:1"),
                TransactionReason::JoinDebit,
            )
            .unwrap_err();
        match err {
            LedgerError::InsufficientBalance {
                needed, available, ..
            } => {
                assert_eq!(needed, Points::new(30));
                assert_eq!(available, Points::new(10));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ledger.balance_of(&m).unwrap(), Points::new(10));
        assert_eq!(store.transaction_count().unwrap(), 1);
    }

    #[test]
    fn same_key_applies_once() {
        let (ledger, store) = ledger();
        let m = member("ada");
        ledger.open_account(&m, Points::new(0)).unwrap();
        let key = DedupeKey::custom("verification:1");
        let first = ledger
            .credit(&m, Points::new(10), key.clone(), TransactionReason::AttendanceCredit)
            .unwrap();
        let second = ledger
            .credit(&m, Points::new(10), key, TransactionReason::AttendanceCredit)
            .unwrap();
        assert!(!first.is_duplicate());
        assert!(second.is_duplicate());
        assert_eq!(first.transaction(), second.transaction());
        assert_eq!(ledger.balance_of(&m).unwrap(), Points::new(10));
        assert_eq!(store.transaction_count().unwrap(), 2);
    }

    #[test]
    fn duplicate_debit_skips_balance_check() {
        let (ledger, _) = ledger();
        let m = member("ada");
        ledger.open_account(&m, Points::new(30)).unwrap();
        let key = DedupeKey::custom("join:ada:1");
        ledger
            .debit(&m, Points::new(30), key.clone(), TransactionReason::JoinDebit)
            .unwrap();
        let again = ledger
            .debit(&m, Points::new(30), key, TransactionReason::JoinDebit)
            .unwrap();
        assert!(again.is_duplicate());
        assert_eq!(ledger.balance_of(&m).unwrap(), Points::ZERO);
    }

    #[test]
    fn reused_key_with_different_posting_is_rejected() {
        let (ledger, _) = ledger();
        let m = member("ada");
        ledger.open_account(&m, Points::new(30)).unwrap();
        let key = DedupeKey::custom("k");
        ledger
            .credit(&m, Points::new(1), key.clone(), TransactionReason::AttendanceCredit)
            .unwrap();
        assert!(matches!(
            ledger.credit(&m, Points::new(2), key, TransactionReason::AttendanceCredit),
            Err(LedgerError::KeyConflict { .. })
        ));
    }

    #[test]
    fn unknown_member() {
        let (ledger, _) = ledger();
        let ghost = member("ghost");
        assert!(matches!(
            ledger.balance_of(&ghost),
            Err(LedgerError::MemberNotFound(_))
        ));
        assert!(matches!(
            ledger.credit(
                &ghost,
                Points::new(1),
                DedupeKey::custom("x"),
                TransactionReason::AttendanceCredit
            ),
            Err(LedgerError::MemberNotFound(_))
        ));
    }

    #[test]
    fn audit_matches_log() {
        let (ledger, _) = ledger();
        let m = member("ada");
        ledger.open_account(&m, Points::new(20)).unwrap();
        ledger
            .debit(&m, Points::new(5), DedupeKey::custom("a"), TransactionReason::JoinDebit)
            .unwrap();
        let report = ledger.audit(&m).unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.derived, 15);
        assert_eq!(report.transactions, 2);
        assert_eq!(ledger.audit_all().unwrap().len(), 1);
    }
}
