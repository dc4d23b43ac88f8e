//! Storage trait implementations for [`JsonFileStore`].

use std::fs;

use sanka_store::{
    evidence_file_name, Activity, ActivityStore, EvidenceRef, EvidenceStore, EvidenceUpload,
    MemberRecord, MemberStore, NewActivity, Participation, ParticipationStore, SeatUpdate,
    StoreError, Transaction, TransactionStore, VerificationRequest, VerificationStore,
};
use sanka_types::{
    ActivityId, DedupeKey, MemberId, Points, RequestId, Timestamp, VerificationKind,
    VerificationStatus,
};
use tracing::warn;

use crate::log::append_entry;
use crate::{JsonFileStore, JsonStoreError};

impl MemberStore for JsonFileStore {
    fn get_member(&self, id: &MemberId) -> Result<MemberRecord, StoreError> {
        self.lock()?.get_member(id)
    }

    fn insert_member(&self, record: &MemberRecord) -> Result<(), StoreError> {
        self.mutate(|t| t.insert_member(record))
    }

    fn member_exists(&self, id: &MemberId) -> Result<bool, StoreError> {
        Ok(self.lock()?.member_exists(id))
    }

    fn member_count(&self) -> Result<u64, StoreError> {
        Ok(self.lock()?.member_count())
    }

    fn iter_members(&self) -> Result<Vec<MemberRecord>, StoreError> {
        Ok(self.lock()?.iter_members())
    }
}

impl ActivityStore for JsonFileStore {
    fn insert_activity(
        &self,
        activity: NewActivity,
        created_at: Timestamp,
    ) -> Result<Activity, StoreError> {
        self.mutate(|t| Ok(t.insert_activity(activity, created_at)))
    }

    fn get_activity(&self, id: ActivityId) -> Result<Activity, StoreError> {
        self.lock()?.get_activity(id)
    }

    fn iter_activities(&self) -> Result<Vec<Activity>, StoreError> {
        Ok(self.lock()?.iter_activities())
    }

    fn increment_participants(&self, id: ActivityId) -> Result<SeatUpdate, StoreError> {
        self.mutate(|t| t.increment_participants(id))
    }

    fn release_participant(&self, id: ActivityId) -> Result<u32, StoreError> {
        self.mutate(|t| t.release_participant(id))
    }
}

impl ParticipationStore for JsonFileStore {
    fn insert_participation(&self, participation: &Participation) -> Result<(), StoreError> {
        self.mutate(|t| t.insert_participation(participation))
    }

    fn get_participation(
        &self,
        member: &MemberId,
        activity: ActivityId,
    ) -> Result<Option<Participation>, StoreError> {
        Ok(self.lock()?.get_participation(member, activity))
    }

    fn participations_of_member(&self, member: &MemberId) -> Result<Vec<Participation>, StoreError> {
        Ok(self.lock()?.participations_of_member(member))
    }

    fn participants_of_activity(
        &self,
        activity: ActivityId,
    ) -> Result<Vec<Participation>, StoreError> {
        Ok(self.lock()?.participants_of_activity(activity))
    }

    fn participation_count(&self) -> Result<u64, StoreError> {
        Ok(self.lock()?.participation_count())
    }
}

impl TransactionStore for JsonFileStore {
    /// The log line is the commit point. A failed snapshot write afterwards
    /// only leaves a stale cached balance, which the next open re-derives.
    fn append_posting(&self, tx: &Transaction) -> Result<(Transaction, Points), StoreError> {
        let mut tables = self.lock()?;
        let (committed, balance) = tables.append_posting(tx)?;
        if let Err(e) = append_entry(&self.log_path(), &committed) {
            tables.pop_posting(&committed)?;
            return Err(e.into());
        }
        if let Err(e) = self.write_snapshot(&tables) {
            warn!(error = %e, key = %committed.dedupe_key, "snapshot write failed after log append");
        }
        Ok((committed, balance))
    }

    fn get_by_dedupe_key(&self, key: &DedupeKey) -> Result<Option<Transaction>, StoreError> {
        Ok(self.lock()?.get_by_dedupe_key(key))
    }

    fn transactions_of_member(&self, member: &MemberId) -> Result<Vec<Transaction>, StoreError> {
        Ok(self.lock()?.transactions_of_member(member))
    }

    fn transaction_count(&self) -> Result<u64, StoreError> {
        Ok(self.lock()?.transaction_count())
    }
}

impl VerificationStore for JsonFileStore {
    fn next_request_id(&self) -> Result<RequestId, StoreError> {
        self.mutate(|t| Ok(t.next_request_id()))
    }

    fn insert_request(&self, request: &VerificationRequest) -> Result<(), StoreError> {
        self.mutate(|t| t.insert_request(request))
    }

    fn get_request(&self, id: RequestId) -> Result<VerificationRequest, StoreError> {
        self.lock()?.get_request(id)
    }

    fn finalize_request(
        &self,
        id: RequestId,
        status: VerificationStatus,
        points_awarded: Option<Points>,
        resolved_at: Timestamp,
    ) -> Result<VerificationRequest, StoreError> {
        self.mutate(|t| t.finalize_request(id, status, points_awarded, resolved_at))
    }

    fn find_by_client_token(
        &self,
        member: &MemberId,
        token: &str,
    ) -> Result<Option<VerificationRequest>, StoreError> {
        Ok(self.lock()?.find_by_client_token(member, token))
    }

    fn requests_for_subject(
        &self,
        member: &MemberId,
        kind: VerificationKind,
        activity: ActivityId,
    ) -> Result<Vec<VerificationRequest>, StoreError> {
        Ok(self.lock()?.requests_for_subject(member, kind, activity))
    }

    fn iter_requests(
        &self,
        status: Option<VerificationStatus>,
    ) -> Result<Vec<VerificationRequest>, StoreError> {
        Ok(self.lock()?.iter_requests(status))
    }
}

impl EvidenceStore for JsonFileStore {
    fn save_evidence(
        &self,
        member: &MemberId,
        upload: &EvidenceUpload,
        at: Timestamp,
    ) -> Result<EvidenceRef, StoreError> {
        let dir = self.uploads_dir();
        let base = evidence_file_name(member, &upload.file_name, at);
        let mut name = base.clone();
        let mut n = 1;
        while dir.join(&name).exists() {
            n += 1;
            name = format!("{n}-{base}");
        }
        let path = dir.join(&name);
        fs::write(&path, &upload.bytes).map_err(|e| JsonStoreError::io(&path, e))?;
        Ok(EvidenceRef::for_upload(upload, name))
    }

    fn load_evidence(&self, stored_name: &str) -> Result<Vec<u8>, StoreError> {
        if stored_name.is_empty()
            || stored_name.contains(['/', '\\'])
            || stored_name.starts_with('.')
        {
            return Err(StoreError::NotFound(format!("evidence {stored_name:?}")));
        }
        let path = self.uploads_dir().join(stored_name);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(format!("evidence {stored_name:?}")))
            }
            Err(e) => Err(JsonStoreError::io(&path, e).into()),
        }
    }
}
