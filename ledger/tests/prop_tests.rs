use std::sync::Arc;

use proptest::prelude::*;

use sanka_ledger::{LedgerError, PointsLedger};
use sanka_nullables::{NullClock, NullStore};
use sanka_store::TransactionStore;
use sanka_types::{DedupeKey, MemberId, Points, TransactionReason};

#[derive(Clone, Debug)]
enum Op {
    Debit { member: usize, amount: u64, key: u8 },
    Credit { member: usize, amount: u64, key: u8 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..3, 0u64..60, 0u8..20).prop_map(|(member, amount, key)| Op::Debit {
            member,
            amount,
            key
        }),
        (0usize..3, 0u64..60, 0u8..20).prop_map(|(member, amount, key)| Op::Credit {
            member,
            amount,
            key
        }),
    ]
}

fn members() -> Vec<MemberId> {
    ["ana", "bo", "cy"]
        .iter()
        .map(|n| MemberId::parse(*n).unwrap())
        .collect()
}

proptest! {
    /// Balances always equal the sum of committed deltas and never go negative,
    /// whatever sequence of (possibly repeated) postings is attempted.
    #[test]
    fn balance_is_sum_of_deltas(start in 0u64..100, ops in proptest::collection::vec(op(), 0..60)) {
        let store = Arc::new(NullStore::new());
        let ledger = PointsLedger::new(store.clone(), Arc::new(NullClock::new(0)));
        let members = members();
        for m in &members {
            ledger.open_account(m, Points::new(start)).unwrap();
        }

        for op in ops {
            // Keys are scoped per member and direction so a repeated key always
            // describes the same posting.
            let result = match op {
                Op::Debit { member, amount, key } => ledger.debit(
                    &members[member],
                    Points::new(amount),
                    DedupeKey::custom(format!("d:{member}:{key}:{amount}")),
                    TransactionReason::JoinDebit,
                ),
                Op::Credit { member, amount, key } => ledger.credit(
                    &members[member],
                    Points::new(amount),
                    DedupeKey::custom(format!("c:{member}:{key}:{amount}")),
                    TransactionReason::AttendanceCredit,
                ),
            };
            match result {
                Ok(_) | Err(LedgerError::InsufficientBalance { .. }) => {}
                Err(e) => prop_assert!(false, "unexpected error: {e}"),
            }
        }

        for m in &members {
            let report = ledger.audit(m).unwrap();
            prop_assert!(report.is_consistent());
            prop_assert!(report.derived >= 0);
        }
    }

    /// Replaying the same posting any number of times applies it once.
    #[test]
    fn repeated_key_applies_once(amount in 0u64..1_000, repeats in 1usize..10) {
        let store = Arc::new(NullStore::new());
        let ledger = PointsLedger::new(store.clone(), Arc::new(NullClock::new(0)));
        let m = MemberId::parse("ana").unwrap();
        ledger.open_account(&m, Points::ZERO).unwrap();

        for _ in 0..repeats {
            ledger
                .credit(&m, Points::new(amount), DedupeKey::custom("verification:7"), TransactionReason::AttendanceCredit)
                .unwrap();
        }
        prop_assert_eq!(ledger.balance_of(&m).unwrap(), Points::new(amount));
        prop_assert_eq!(store.transaction_count().unwrap(), 2);
    }
}
