//! In-memory tables shared by the storage backends.
//!
//! `Tables` holds every record and implements the store semantics on plain
//! `&mut self` methods. Backends wrap it in a lock (making each method one
//! atomic step) and decide how, or whether, to persist it.

use std::collections::{BTreeMap, HashMap};

use sanka_types::{
    ActivityId, DedupeKey, MemberId, Points, RequestId, Timestamp, VerificationKind,
    VerificationStatus,
};
use serde::{Deserialize, Serialize};

use crate::{
    Activity, MemberRecord, NewActivity, Participation, SeatUpdate, StoreError, Transaction,
    VerificationRequest,
};

/// Every non-log record, in a form that serializes to plain JSON arrays.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub members: Vec<MemberRecord>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub participations: Vec<Participation>,
    #[serde(default)]
    pub requests: Vec<VerificationRequest>,
    #[serde(default)]
    pub last_activity_id: u64,
    #[serde(default)]
    pub last_request_id: u64,
}

#[derive(Debug, Default)]
pub struct Tables {
    members: BTreeMap<MemberId, MemberRecord>,
    activities: BTreeMap<ActivityId, Activity>,
    participations: BTreeMap<(MemberId, ActivityId), Participation>,
    transactions: Vec<Transaction>,
    tx_by_key: HashMap<DedupeKey, usize>,
    requests: BTreeMap<RequestId, VerificationRequest>,
    last_activity_id: u64,
    last_request_id: u64,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild tables from a snapshot and the transaction log.
    ///
    /// Cached balances are recomputed from the log. Every disagreement between
    /// the snapshot and the log is returned as a human-readable finding.
    pub fn restore(snapshot: Snapshot, log: Vec<Transaction>) -> (Self, Vec<String>) {
        let mut findings = Vec::new();
        let mut tables = Self {
            last_activity_id: snapshot.last_activity_id,
            last_request_id: snapshot.last_request_id,
            ..Self::default()
        };

        for member in snapshot.members {
            tables.members.insert(member.id.clone(), member);
        }
        for activity in snapshot.activities {
            tables.last_activity_id = tables.last_activity_id.max(activity.id.get());
            tables.activities.insert(activity.id, activity);
        }
        for p in snapshot.participations {
            tables
                .participations
                .insert((p.member.clone(), p.activity), p);
        }
        // A seat taken without its participation record (stopped mid-join)
        // is given back here.
        let mut seats: BTreeMap<ActivityId, u32> = BTreeMap::new();
        for (_, activity) in tables.participations.keys() {
            *seats.entry(*activity).or_default() += 1;
        }
        for (id, activity) in tables.activities.iter_mut() {
            let held = seats.get(id).copied().unwrap_or(0);
            if activity.current_participants != held {
                findings.push(format!(
                    "activity {id}: seat count {} disagrees with {held} participations",
                    activity.current_participants
                ));
                activity.current_participants = held;
            }
        }

        for r in snapshot.requests {
            tables.last_request_id = tables.last_request_id.max(r.id.get());
            tables.requests.insert(r.id, r);
        }

        let mut derived: BTreeMap<MemberId, i128> = BTreeMap::new();
        for tx in log {
            if tables.tx_by_key.contains_key(&tx.dedupe_key) {
                findings.push(format!(
                    "duplicate dedupe key {} in transaction log (sequence {})",
                    tx.dedupe_key, tx.sequence
                ));
                continue;
            }
            *derived.entry(tx.member.clone()).or_default() += tx.delta as i128;
            tables
                .tx_by_key
                .insert(tx.dedupe_key.clone(), tables.transactions.len());
            tables.transactions.push(tx);
        }

        for (id, member) in tables.members.iter_mut() {
            let sum = derived.remove(id).unwrap_or(0);
            let sum = match u64::try_from(sum) {
                Ok(v) => Points::new(v),
                Err(_) => {
                    findings.push(format!("member {id} has a negative derived balance {sum}"));
                    Points::ZERO
                }
            };
            if member.balance != sum {
                findings.push(format!(
                    "member {id}: cached balance {} disagrees with log sum {}",
                    member.balance, sum
                ));
                member.balance = sum;
            }
        }
        for id in derived.keys() {
            findings.push(format!("transaction log references unknown member {id}"));
        }

        (tables, findings)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            members: self.members.values().cloned().collect(),
            activities: self.activities.values().cloned().collect(),
            participations: self.participations.values().cloned().collect(),
            requests: self.requests.values().cloned().collect(),
            last_activity_id: self.last_activity_id,
            last_request_id: self.last_request_id,
        }
    }

    // ── Members ─────────────────────────────────────────────────────────

    pub fn get_member(&self, id: &MemberId) -> Result<MemberRecord, StoreError> {
        self.members
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("member {id}")))
    }

    pub fn insert_member(&mut self, record: &MemberRecord) -> Result<(), StoreError> {
        if self.members.contains_key(&record.id) {
            return Err(StoreError::Duplicate(format!("member {}", record.id)));
        }
        self.members.insert(record.id.clone(), record.clone());
        Ok(())
    }

    pub fn member_exists(&self, id: &MemberId) -> bool {
        self.members.contains_key(id)
    }

    pub fn member_count(&self) -> u64 {
        self.members.len() as u64
    }

    pub fn iter_members(&self) -> Vec<MemberRecord> {
        self.members.values().cloned().collect()
    }

    // ── Activities ──────────────────────────────────────────────────────

    pub fn insert_activity(&mut self, new: NewActivity, created_at: Timestamp) -> Activity {
        self.last_activity_id += 1;
        let activity = Activity {
            id: ActivityId::new(self.last_activity_id),
            name: new.name,
            cost: new.cost,
            required_participants: new.required_participants,
            current_participants: 0,
            date: new.date,
            time: new.time,
            location: new.location,
            description: new.description,
            organizer: new.organizer,
            created_at,
        };
        self.activities.insert(activity.id, activity.clone());
        activity
    }

    pub fn get_activity(&self, id: ActivityId) -> Result<Activity, StoreError> {
        self.activities
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("activity {id}")))
    }

    pub fn iter_activities(&self) -> Vec<Activity> {
        self.activities.values().cloned().collect()
    }

    pub fn increment_participants(&mut self, id: ActivityId) -> Result<SeatUpdate, StoreError> {
        let activity = self
            .activities
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("activity {id}")))?;
        if activity.is_full() {
            return Ok(SeatUpdate::Full);
        }
        activity.current_participants += 1;
        Ok(SeatUpdate::Taken(activity.current_participants))
    }

    pub fn release_participant(&mut self, id: ActivityId) -> Result<u32, StoreError> {
        let activity = self
            .activities
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("activity {id}")))?;
        if activity.current_participants == 0 {
            return Err(StoreError::Constraint(format!(
                "activity {id} has no participant to release"
            )));
        }
        activity.current_participants -= 1;
        Ok(activity.current_participants)
    }

    // ── Participations ──────────────────────────────────────────────────

    pub fn insert_participation(&mut self, p: &Participation) -> Result<(), StoreError> {
        let key = (p.member.clone(), p.activity);
        if self.participations.contains_key(&key) {
            return Err(StoreError::Duplicate(format!(
                "participation {}:{}",
                p.member, p.activity
            )));
        }
        let member = self
            .members
            .get_mut(&p.member)
            .ok_or_else(|| StoreError::NotFound(format!("member {}", p.member)))?;
        member.joined.insert(p.activity);
        self.participations.insert(key, p.clone());
        Ok(())
    }

    pub fn get_participation(&self, member: &MemberId, activity: ActivityId) -> Option<Participation> {
        self.participations
            .get(&(member.clone(), activity))
            .cloned()
    }

    pub fn participations_of_member(&self, member: &MemberId) -> Vec<Participation> {
        self.participations
            .values()
            .filter(|p| &p.member == member)
            .cloned()
            .collect()
    }

    pub fn participants_of_activity(&self, activity: ActivityId) -> Vec<Participation> {
        self.participations
            .values()
            .filter(|p| p.activity == activity)
            .cloned()
            .collect()
    }

    pub fn participation_count(&self) -> u64 {
        self.participations.len() as u64
    }

    // ── Transactions ────────────────────────────────────────────────────

    pub fn append_posting(&mut self, tx: &Transaction) -> Result<(Transaction, Points), StoreError> {
        if self.tx_by_key.contains_key(&tx.dedupe_key) {
            return Err(StoreError::Duplicate(format!("dedupe key {}", tx.dedupe_key)));
        }
        let member = self
            .members
            .get_mut(&tx.member)
            .ok_or_else(|| StoreError::NotFound(format!("member {}", tx.member)))?;
        let balance = member.balance.apply_delta(tx.delta).ok_or_else(|| {
            StoreError::Constraint(format!(
                "delta {} would take member {} below zero (balance {})",
                tx.delta, tx.member, member.balance
            ))
        })?;
        member.balance = balance;

        let mut committed = tx.clone();
        committed.sequence = self.transactions.len() as u64 + 1;
        self.tx_by_key
            .insert(committed.dedupe_key.clone(), self.transactions.len());
        self.transactions.push(committed.clone());
        Ok((committed, balance))
    }

    pub fn get_by_dedupe_key(&self, key: &DedupeKey) -> Option<Transaction> {
        self.tx_by_key
            .get(key)
            .map(|&idx| self.transactions[idx].clone())
    }

    pub fn transactions_of_member(&self, member: &MemberId) -> Vec<Transaction> {
        self.transactions
            .iter()
            .filter(|t| &t.member == member)
            .cloned()
            .collect()
    }

    pub fn transaction_count(&self) -> u64 {
        self.transactions.len() as u64
    }

    /// The most recently appended transaction.
    pub fn last_transaction(&self) -> Option<&Transaction> {
        self.transactions.last()
    }

    /// Undo the most recent append. Only for backends whose durable write of
    /// that append failed; the removed entry must be the one just appended.
    pub fn pop_posting(&mut self, expected: &Transaction) -> Result<(), StoreError> {
        match self.transactions.last() {
            Some(last) if last.id == expected.id => {}
            _ => {
                return Err(StoreError::Corruption(format!(
                    "cannot roll back {}: not the latest entry",
                    expected.dedupe_key
                )))
            }
        }
        self.transactions.pop();
        self.tx_by_key.remove(&expected.dedupe_key);
        if let Some(member) = self.members.get_mut(&expected.member) {
            member.balance = member
                .balance
                .apply_delta(-expected.delta)
                .unwrap_or(Points::ZERO);
        }
        Ok(())
    }

    // ── Verification requests ───────────────────────────────────────────

    pub fn next_request_id(&mut self) -> RequestId {
        self.last_request_id += 1;
        RequestId::new(self.last_request_id)
    }

    pub fn insert_request(&mut self, request: &VerificationRequest) -> Result<(), StoreError> {
        if self.requests.contains_key(&request.id) {
            return Err(StoreError::Duplicate(format!("request {}", request.id)));
        }
        self.last_request_id = self.last_request_id.max(request.id.get());
        self.requests.insert(request.id, request.clone());
        Ok(())
    }

    pub fn get_request(&self, id: RequestId) -> Result<VerificationRequest, StoreError> {
        self.requests
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("request {id}")))
    }

    pub fn finalize_request(
        &mut self,
        id: RequestId,
        status: VerificationStatus,
        points_awarded: Option<Points>,
        resolved_at: Timestamp,
    ) -> Result<VerificationRequest, StoreError> {
        let request = self
            .requests
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("request {id}")))?;
        if request.status.is_terminal() {
            return Err(StoreError::Constraint(format!(
                "request {id} is already {}",
                request.status
            )));
        }
        if !status.is_terminal() {
            return Err(StoreError::Constraint(format!(
                "request {id} cannot be finalized as {status}"
            )));
        }
        request.status = status;
        request.points_awarded = points_awarded;
        request.resolved_at = Some(resolved_at);
        Ok(request.clone())
    }

    /// Put a request back to pending. Only for backends undoing a
    /// `finalize_request` whose durable write failed.
    pub fn reopen_request(&mut self, id: RequestId) {
        if let Some(request) = self.requests.get_mut(&id) {
            request.status = VerificationStatus::Pending;
            request.points_awarded = None;
            request.resolved_at = None;
        }
    }

    pub fn find_by_client_token(&self, member: &MemberId, token: &str) -> Option<VerificationRequest> {
        self.requests
            .values()
            .find(|r| &r.member == member && r.client_token.as_deref() == Some(token))
            .cloned()
    }

    pub fn requests_for_subject(
        &self,
        member: &MemberId,
        kind: VerificationKind,
        activity: ActivityId,
    ) -> Vec<VerificationRequest> {
        self.requests
            .values()
            .filter(|r| &r.member == member && r.kind == kind && r.activity == Some(activity))
            .cloned()
            .collect()
    }

    pub fn iter_requests(&self, status: Option<VerificationStatus>) -> Vec<VerificationRequest> {
        self.requests
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect()
    }
}
