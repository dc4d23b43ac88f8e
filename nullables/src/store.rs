//! Nullable store — thread-safe in-memory storage for testing.

use sanka_store::{
    evidence_file_name, Activity, ActivityStore, EvidenceRef, EvidenceStore, EvidenceUpload,
    MemberRecord, MemberStore, NewActivity, Participation, ParticipationStore, SeatUpdate,
    StoreError, Tables, Transaction, TransactionStore, VerificationRequest, VerificationStore,
};
use sanka_types::{
    ActivityId, DedupeKey, MemberId, Points, RequestId, Timestamp, VerificationKind,
    VerificationStatus,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// An in-memory store for testing.
/// Thread-safe for use with tokio's multi-threaded runtime.
///
/// Faults can be armed to make the next call of a given operation fail (or
/// report a full activity), which lets tests drive compensation paths.
#[derive(Default)]
pub struct NullStore {
    tables: Mutex<Tables>,
    evidence: Mutex<HashMap<String, Vec<u8>>>,
    full_on_next_increment: AtomicBool,
    fail_next_participation: AtomicBool,
    fail_next_posting: AtomicBool,
    fail_next_finalize: AtomicBool,
    fail_next_evidence: AtomicBool,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `increment_participants` reports `Full` regardless of the count,
    /// as if another member took the last seat first.
    pub fn force_full_on_next_increment(&self) {
        self.full_on_next_increment.store(true, Ordering::SeqCst);
    }

    /// The next `insert_participation` fails with a backend error.
    pub fn fail_next_participation_insert(&self) {
        self.fail_next_participation.store(true, Ordering::SeqCst);
    }

    /// The next `append_posting` fails with a backend error.
    pub fn fail_next_posting(&self) {
        self.fail_next_posting.store(true, Ordering::SeqCst);
    }

    /// The next `finalize_request` fails with a backend error.
    pub fn fail_next_finalize(&self) {
        self.fail_next_finalize.store(true, Ordering::SeqCst);
    }

    /// The next `save_evidence` fails with a backend error.
    pub fn fail_next_evidence_write(&self) {
        self.fail_next_evidence.store(true, Ordering::SeqCst);
    }

    /// Number of stored evidence attachments.
    pub fn evidence_count(&self) -> usize {
        self.evidence.lock().unwrap().len()
    }

    fn injected(flag: &AtomicBool, op: &str) -> Result<(), StoreError> {
        if flag.swap(false, Ordering::SeqCst) {
            Err(StoreError::Backend(format!("injected fault in {op}")))
        } else {
            Ok(())
        }
    }
}

impl MemberStore for NullStore {
    fn get_member(&self, id: &MemberId) -> Result<MemberRecord, StoreError> {
        self.tables.lock().unwrap().get_member(id)
    }

    fn insert_member(&self, record: &MemberRecord) -> Result<(), StoreError> {
        self.tables.lock().unwrap().insert_member(record)
    }

    fn member_exists(&self, id: &MemberId) -> Result<bool, StoreError> {
        Ok(self.tables.lock().unwrap().member_exists(id))
    }

    fn member_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables.lock().unwrap().member_count())
    }

    fn iter_members(&self) -> Result<Vec<MemberRecord>, StoreError> {
        Ok(self.tables.lock().unwrap().iter_members())
    }
}

impl ActivityStore for NullStore {
    fn insert_activity(
        &self,
        activity: NewActivity,
        created_at: Timestamp,
    ) -> Result<Activity, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .insert_activity(activity, created_at))
    }

    fn get_activity(&self, id: ActivityId) -> Result<Activity, StoreError> {
        self.tables.lock().unwrap().get_activity(id)
    }

    fn iter_activities(&self) -> Result<Vec<Activity>, StoreError> {
        Ok(self.tables.lock().unwrap().iter_activities())
    }

    fn increment_participants(&self, id: ActivityId) -> Result<SeatUpdate, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        tables.get_activity(id)?;
        if self.full_on_next_increment.swap(false, Ordering::SeqCst) {
            return Ok(SeatUpdate::Full);
        }
        tables.increment_participants(id)
    }

    fn release_participant(&self, id: ActivityId) -> Result<u32, StoreError> {
        self.tables.lock().unwrap().release_participant(id)
    }
}

impl ParticipationStore for NullStore {
    fn insert_participation(&self, participation: &Participation) -> Result<(), StoreError> {
        Self::injected(&self.fail_next_participation, "insert_participation")?;
        self.tables.lock().unwrap().insert_participation(participation)
    }

    fn get_participation(
        &self,
        member: &MemberId,
        activity: ActivityId,
    ) -> Result<Option<Participation>, StoreError> {
        Ok(self.tables.lock().unwrap().get_participation(member, activity))
    }

    fn participations_of_member(&self, member: &MemberId) -> Result<Vec<Participation>, StoreError> {
        Ok(self.tables.lock().unwrap().participations_of_member(member))
    }

    fn participants_of_activity(
        &self,
        activity: ActivityId,
    ) -> Result<Vec<Participation>, StoreError> {
        Ok(self.tables.lock().unwrap().participants_of_activity(activity))
    }

    fn participation_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables.lock().unwrap().participation_count())
    }
}

impl TransactionStore for NullStore {
    fn append_posting(&self, tx: &Transaction) -> Result<(Transaction, Points), StoreError> {
        Self::injected(&self.fail_next_posting, "append_posting")?;
        self.tables.lock().unwrap().append_posting(tx)
    }

    fn get_by_dedupe_key(&self, key: &DedupeKey) -> Result<Option<Transaction>, StoreError> {
        Ok(self.tables.lock().unwrap().get_by_dedupe_key(key))
    }

    fn transactions_of_member(&self, member: &MemberId) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.tables.lock().unwrap().transactions_of_member(member))
    }

    fn transaction_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables.lock().unwrap().transaction_count())
    }
}

impl VerificationStore for NullStore {
    fn next_request_id(&self) -> Result<RequestId, StoreError> {
        Ok(self.tables.lock().unwrap().next_request_id())
    }

    fn insert_request(&self, request: &VerificationRequest) -> Result<(), StoreError> {
        self.tables.lock().unwrap().insert_request(request)
    }

    fn get_request(&self, id: RequestId) -> Result<VerificationRequest, StoreError> {
        self.tables.lock().unwrap().get_request(id)
    }

    fn finalize_request(
        &self,
        id: RequestId,
        status: VerificationStatus,
        points_awarded: Option<Points>,
        resolved_at: Timestamp,
    ) -> Result<VerificationRequest, StoreError> {
        Self::injected(&self.fail_next_finalize, "finalize_request")?;
        self.tables
            .lock()
            .unwrap()
            .finalize_request(id, status, points_awarded, resolved_at)
    }

    fn find_by_client_token(
        &self,
        member: &MemberId,
        token: &str,
    ) -> Result<Option<VerificationRequest>, StoreError> {
        Ok(self.tables.lock().unwrap().find_by_client_token(member, token))
    }

    fn requests_for_subject(
        &self,
        member: &MemberId,
        kind: VerificationKind,
        activity: ActivityId,
    ) -> Result<Vec<VerificationRequest>, StoreError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .requests_for_subject(member, kind, activity))
    }

    fn iter_requests(
        &self,
        status: Option<VerificationStatus>,
    ) -> Result<Vec<VerificationRequest>, StoreError> {
        Ok(self.tables.lock().unwrap().iter_requests(status))
    }
}

impl EvidenceStore for NullStore {
    fn save_evidence(
        &self,
        member: &MemberId,
        upload: &EvidenceUpload,
        at: Timestamp,
    ) -> Result<EvidenceRef, StoreError> {
        Self::injected(&self.fail_next_evidence, "save_evidence")?;
        let mut evidence = self.evidence.lock().unwrap();
        let base = evidence_file_name(member, &upload.file_name, at);
        let mut name = base.clone();
        let mut n = 1;
        while evidence.contains_key(&name) {
            n += 1;
            name = format!("{n}-{base}");
        }
        evidence.insert(name.clone(), upload.bytes.clone());
        Ok(EvidenceRef::for_upload(upload, name))
    }

    fn load_evidence(&self, stored_name: &str) -> Result<Vec<u8>, StoreError> {
        self.evidence
            .lock()
            .unwrap()
            .get(stored_name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("evidence {stored_name:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn activity(capacity: u32) -> NewActivity {
        NewActivity {
            name: "Chess".into(),
            cost: Points::new(5),
            required_participants: capacity,
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            location: "Library".into(),
            description: "Rapid".into(),
            organizer: "admin".into(),
        }
    }

    #[test]
    fn forced_full_applies_once() {
        let store = NullStore::new();
        let a = store.insert_activity(activity(3), Timestamp::new(0)).unwrap();
        store.force_full_on_next_increment();
        assert_eq!(store.increment_participants(a.id).unwrap(), SeatUpdate::Full);
        assert_eq!(
            store.increment_participants(a.id).unwrap(),
            SeatUpdate::Taken(1)
        );
    }

    #[test]
    fn injected_participation_fault_leaves_no_record() {
        let store = NullStore::new();
        let m = MemberId::parse("jun").unwrap();
        store
            .insert_member(&MemberRecord::new(m.clone(), Timestamp::new(0)))
            .unwrap();
        let p = Participation {
            member: m.clone(),
            activity: ActivityId::new(1),
            cost: Points::new(5),
            joined_at: Timestamp::new(0),
        };
        store.fail_next_participation_insert();
        assert!(matches!(
            store.insert_participation(&p),
            Err(StoreError::Backend(_))
        ));
        assert_eq!(store.participation_count().unwrap(), 0);
        store.insert_participation(&p).unwrap();
        assert_eq!(store.participation_count().unwrap(), 1);
    }

    #[test]
    fn evidence_round_trips() {
        let store = NullStore::new();
        let m = MemberId::parse("jun").unwrap();
        let upload = EvidenceUpload {
            file_name: "a.png".into(),
            content_type: "image/png".into(),
            bytes: vec![9; 8],
        };
        let r = store.save_evidence(&m, &upload, Timestamp::new(0)).unwrap();
        assert_eq!(store.load_evidence(&r.stored_name).unwrap(), vec![9; 8]);
        assert_eq!(store.evidence_count(), 1);
    }
}
