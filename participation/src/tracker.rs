//! The join protocol.

use std::sync::Arc;

use sanka_catalog::{ActivityCatalog, CatalogError};
use sanka_ledger::PointsLedger;
use sanka_store::{Activity, Participation, Store, StoreError};
use sanka_types::{ActivityId, Clock, DedupeKey, MemberId, MemberView, TransactionReason};
use tracing::{debug, error, info, warn};

use crate::ParticipationError;

pub struct ParticipationTracker {
    store: Arc<dyn Store>,
    ledger: Arc<PointsLedger>,
    catalog: Arc<ActivityCatalog>,
    clock: Arc<dyn Clock>,
}

impl ParticipationTracker {
    pub fn new(
        store: Arc<dyn Store>,
        ledger: Arc<PointsLedger>,
        catalog: Arc<ActivityCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            ledger,
            catalog,
            clock,
        }
    }

    /// Join `member` to `activity`, charging the activity's cost.
    ///
    /// Callers must not run two joins for the same member concurrently; the
    /// service layer serializes them. On success the member has exactly one
    /// participation and one applied join debit for the activity. On failure
    /// after the debit, the seat is released and the debit reversed before the
    /// error is returned.
    ///
    /// A join whose debit was applied but whose participation was never
    /// written (the process stopped in between) is completed by calling
    /// again, without charging twice. If the activity filled up meanwhile,
    /// the orphaned debit is reversed and `ActivityFull` returned.
    pub fn join(
        &self,
        member: &MemberId,
        activity_id: ActivityId,
    ) -> Result<MemberView, ParticipationError> {
        let activity = self.catalog.get(activity_id)?;
        if self
            .store
            .get_participation(member, activity_id)?
            .is_some()
        {
            return Err(ParticipationError::AlreadyJoined {
                member: member.clone(),
                activity: activity_id,
            });
        }

        let attempt = self.current_attempt(member, activity_id)?;
        let debit_key = DedupeKey::join_attempt(member, activity_id, attempt);
        let resuming = self.ledger.is_applied(&debit_key)?;
        if !resuming {
            if activity.is_full() {
                debug!(%member, activity = %activity_id, "join refused: full");
                return Err(ParticipationError::ActivityFull(activity_id));
            }
            let available = self.ledger.balance_of(member)?;
            if available < activity.cost {
                return Err(ParticipationError::InsufficientBalance {
                    needed: activity.cost,
                    available,
                });
            }
        } else {
            info!(%member, activity = %activity_id, "resuming interrupted join");
        }

        self.ledger
            .debit(member, activity.cost, debit_key, TransactionReason::JoinDebit)?;

        match self.catalog.increment_participants(activity_id) {
            Ok(_) => {}
            Err(CatalogError::ActivityFull(_)) => {
                warn!(%member, activity = %activity_id, "lost race for last seat, reversing debit");
                self.reverse(member, &activity, attempt)?;
                return Err(ParticipationError::ActivityFull(activity_id));
            }
            Err(e) => {
                warn!(%member, activity = %activity_id, error = %e, "seat update failed, reversing debit");
                self.reverse(member, &activity, attempt)?;
                return Err(e.into());
            }
        }

        let participation = Participation {
            member: member.clone(),
            activity: activity_id,
            cost: activity.cost,
            joined_at: self.clock.now(),
        };
        if let Err(e) = self.store.insert_participation(&participation) {
            warn!(%member, activity = %activity_id, error = %e, "participation write failed, compensating");
            if let Err(release) = self.catalog.release_participant(activity_id) {
                error!(activity = %activity_id, error = %release, "could not release seat");
            }
            self.reverse(member, &activity, attempt)?;
            return Err(e.into());
        }

        let view = self.member_view(member)?;
        info!(
            %member,
            activity = %activity_id,
            cost = %activity.cost,
            balance = %view.balance,
            "joined activity"
        );
        Ok(view)
    }

    /// Joins of a pair are numbered from 1; each reversal moves to the next.
    fn current_attempt(
        &self,
        member: &MemberId,
        activity: ActivityId,
    ) -> Result<u32, ParticipationError> {
        let mut attempt = 1;
        while self
            .ledger
            .is_applied(&DedupeKey::join_reversal_attempt(member, activity, attempt))?
        {
            attempt += 1;
        }
        Ok(attempt)
    }

    fn reverse(
        &self,
        member: &MemberId,
        activity: &Activity,
        attempt: u32,
    ) -> Result<(), ParticipationError> {
        let key = DedupeKey::join_reversal_attempt(member, activity.id, attempt);
        self.ledger
            .credit(member, activity.cost, key, TransactionReason::JoinReversal)
            .map(|_| ())
            .map_err(|e| {
                error!(%member, activity = %activity.id, error = %e, "join reversal failed");
                ParticipationError::CompensationFailed {
                    member: member.clone(),
                    activity: activity.id,
                    reason: e.to_string(),
                }
            })
    }

    pub fn member_view(&self, member: &MemberId) -> Result<MemberView, ParticipationError> {
        match self.store.get_member(member) {
            Ok(record) => Ok(record.into()),
            Err(StoreError::NotFound(_)) => Err(ParticipationError::MemberNotFound(member.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// The participation of `member` in `activity`, if any.
    pub fn participation(
        &self,
        member: &MemberId,
        activity: ActivityId,
    ) -> Result<Option<Participation>, ParticipationError> {
        Ok(self.store.get_participation(member, activity)?)
    }

    pub fn participants(&self, activity: ActivityId) -> Result<Vec<Participation>, ParticipationError> {
        self.catalog.get(activity)?;
        Ok(self.store.participants_of_activity(activity)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sanka_catalog::ActivitySpec;
    use sanka_nullables::{NullClock, NullStore};
    use sanka_store::{ActivityStore, ParticipationStore, TransactionStore};
    use sanka_types::Points;

    struct Fixture {
        store: Arc<NullStore>,
        ledger: Arc<PointsLedger>,
        catalog: Arc<ActivityCatalog>,
        tracker: ParticipationTracker,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(NullStore::new());
        let clock: Arc<dyn Clock> = Arc::new(NullClock::new(10_000));
        let ledger = Arc::new(PointsLedger::new(store.clone(), clock.clone()));
        let catalog = Arc::new(ActivityCatalog::new(store.clone(), clock.clone()));
        let tracker =
            ParticipationTracker::new(store.clone(), ledger.clone(), catalog.clone(), clock);
        Fixture {
            store,
            ledger,
            catalog,
            tracker,
        }
    }

    fn member(f: &Fixture, name: &str, balance: u64) -> MemberId {
        let id = MemberId::parse(name).unwrap();
        f.ledger.open_account(&id, Points::new(balance)).unwrap();
        id
    }

    fn activity(f: &Fixture, cost: i64, capacity: i64) -> ActivityId {
        f.catalog
            .create(&ActivitySpec {
                name: format!("Hike {cost}/{capacity}"),
                cost,
                date: "2025-06-01".into(),
                time: "08:00".into(),
                location: "Trailhead".into(),
                description: "Morning hike".into(),
                required_participants: capacity,
                organizer: None,
            })
            .unwrap()
            .id
    }

    #[test]
    fn join_debits_and_records() {
        let f = fixture();
        let m = member(&f, "rin", 50);
        let a = activity(&f, 30, 5);

        let view = f.tracker.join(&m, a).unwrap();
        assert_eq!(view.balance, Points::new(20));
        assert!(view.has_joined(a));
        assert_eq!(f.store.participation_count().unwrap(), 1);
        assert_eq!(f.store.get_activity(a).unwrap().current_participants, 1);

        let history = f.ledger.history(&m).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].delta, -30);
        assert_eq!(history[1].reason, TransactionReason::JoinDebit);
        assert_eq!(history[1].dedupe_key, DedupeKey::join(&m, a));
    }

    #[test]
    fn insufficient_balance_changes_nothing() {
        let f = fixture();
        let m = member(&f, "rin", 10);
        let a = activity(&f, 30, 5);

        assert!(matches!(
            f.tracker.join(&m, a),
            Err(ParticipationError::InsufficientBalance { .. })
        ));
        assert_eq!(f.ledger.balance_of(&m).unwrap(), Points::new(10));
        assert_eq!(f.store.participation_count().unwrap(), 0);
        assert_eq!(f.store.transaction_count().unwrap(), 1);
    }

    #[test]
    fn second_join_is_already_joined() {
        let f = fixture();
        let m = member(&f, "rin", 50);
        let a = activity(&f, 10, 5);
        f.tracker.join(&m, a).unwrap();
        assert!(matches!(
            f.tracker.join(&m, a),
            Err(ParticipationError::AlreadyJoined { .. })
        ));
        assert_eq!(f.ledger.balance_of(&m).unwrap(), Points::new(40));
        assert_eq!(f.store.transaction_count().unwrap(), 2);
    }

    #[test]
    fn full_activity_is_refused_before_charging() {
        let f = fixture();
        let a = activity(&f, 10, 1);
        let first = member(&f, "rin", 50);
        let second = member(&f, "sol", 50);
        f.tracker.join(&first, a).unwrap();
        assert!(matches!(
            f.tracker.join(&second, a),
            Err(ParticipationError::ActivityFull(_))
        ));
        assert_eq!(f.ledger.history(&second).unwrap().len(), 1);
    }

    #[test]
    fn lost_seat_race_reverses_debit() {
        let f = fixture();
        let m = member(&f, "rin", 50);
        let a = activity(&f, 30, 2);

        f.store.force_full_on_next_increment();
        assert!(matches!(
            f.tracker.join(&m, a),
            Err(ParticipationError::ActivityFull(_))
        ));
        assert_eq!(f.ledger.balance_of(&m).unwrap(), Points::new(50));
        assert_eq!(f.store.participation_count().unwrap(), 0);
        assert_eq!(f.store.get_activity(a).unwrap().current_participants, 0);
        let reasons: Vec<_> = f.ledger.history(&m).unwrap().iter().map(|t| t.reason).collect();
        assert_eq!(
            reasons,
            vec![
                TransactionReason::SignupGrant,
                TransactionReason::JoinDebit,
                TransactionReason::JoinReversal
            ]
        );
        assert!(f.ledger.audit(&m).unwrap().is_consistent());
    }

    #[test]
    fn failed_participation_write_releases_seat_and_refunds() {
        let f = fixture();
        let m = member(&f, "rin", 50);
        let a = activity(&f, 30, 2);

        f.store.fail_next_participation_insert();
        assert!(matches!(
            f.tracker.join(&m, a),
            Err(ParticipationError::Storage(_))
        ));
        assert_eq!(f.ledger.balance_of(&m).unwrap(), Points::new(50));
        assert_eq!(f.store.get_activity(a).unwrap().current_participants, 0);
        assert!(f.tracker.participation(&m, a).unwrap().is_none());
    }

    #[test]
    fn rejoin_after_reversal_uses_next_attempt_key() {
        let f = fixture();
        let m = member(&f, "rin", 50);
        let a = activity(&f, 30, 2);

        f.store.force_full_on_next_increment();
        assert!(f.tracker.join(&m, a).is_err());

        let view = f.tracker.join(&m, a).unwrap();
        assert_eq!(view.balance, Points::new(20));
        let last = f.ledger.history(&m).unwrap().pop().unwrap();
        assert_eq!(last.dedupe_key, DedupeKey::join_attempt(&m, a, 2));
        assert_eq!(last.dedupe_key.as_str(), "join:rin:1#2");
    }

    #[test]
    fn interrupted_join_is_completed_without_second_charge() {
        let f = fixture();
        let m = member(&f, "rin", 30);
        let a = activity(&f, 30, 2);

        // Debit applied, then the process stopped before the seat and record.
        f.ledger
            .debit(&m, Points::new(30), DedupeKey::join(&m, a), TransactionReason::JoinDebit)
            .unwrap();

        let view = f.tracker.join(&m, a).unwrap();
        assert_eq!(view.balance, Points::ZERO);
        assert!(view.has_joined(a));
        assert_eq!(f.ledger.history(&m).unwrap().len(), 2);
    }

    #[test]
    fn retry_by_holder_of_last_seat_is_already_joined() {
        let f = fixture();
        let m = member(&f, "rin", 50);
        let a = activity(&f, 30, 1);
        f.tracker.join(&m, a).unwrap();

        assert!(matches!(
            f.tracker.join(&m, a),
            Err(ParticipationError::AlreadyJoined { .. })
        ));
        assert_eq!(f.ledger.balance_of(&m).unwrap(), Points::new(20));
        assert_eq!(f.ledger.history(&m).unwrap().len(), 2);
    }

    #[test]
    fn interrupted_join_on_filled_activity_is_reversed() {
        let f = fixture();
        let m = member(&f, "rin", 50);
        let other = member(&f, "sol", 50);
        let a = activity(&f, 30, 1);

        f.ledger
            .debit(&m, Points::new(30), DedupeKey::join(&m, a), TransactionReason::JoinDebit)
            .unwrap();
        f.tracker.join(&other, a).unwrap();

        assert!(matches!(
            f.tracker.join(&m, a),
            Err(ParticipationError::ActivityFull(_))
        ));
        assert_eq!(f.ledger.balance_of(&m).unwrap(), Points::new(50));
        assert!(f.tracker.participation(&m, a).unwrap().is_none());
        assert_eq!(f.store.get_activity(a).unwrap().current_participants, 1);
        let last = f.ledger.history(&m).unwrap().pop().unwrap();
        assert_eq!(last.reason, TransactionReason::JoinReversal);
        assert_eq!(
            last.dedupe_key,
            DedupeKey::join_reversal_attempt(&m, a, 1)
        );
        assert!(f.ledger.audit(&m).unwrap().is_consistent());

        // A later join starts a fresh attempt and is refused before charging.
        assert!(matches!(
            f.tracker.join(&m, a),
            Err(ParticipationError::ActivityFull(_))
        ));
        assert_eq!(f.ledger.balance_of(&m).unwrap(), Points::new(50));
    }

    #[test]
    fn unknown_member_and_activity() {
        let f = fixture();
        let a = activity(&f, 1, 2);
        let ghost = MemberId::parse("ghost").unwrap();
        assert!(matches!(
            f.tracker.join(&ghost, a),
            Err(ParticipationError::MemberNotFound(_))
        ));
        let m = member(&f, "rin", 5);
        assert!(matches!(
            f.tracker.join(&m, ActivityId::new(99)),
            Err(ParticipationError::ActivityNotFound(_))
        ));
    }
}
