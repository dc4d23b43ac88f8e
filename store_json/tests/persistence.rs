use std::fs;
use std::io::Write;

use chrono::{NaiveDate, NaiveTime};
use sanka_store::{
    ActivityStore, EvidenceStore, EvidenceUpload, MemberRecord, MemberStore, NewActivity,
    Participation, ParticipationStore, SeatUpdate, StoreError, Transaction, TransactionStore,
};
use sanka_store_json::JsonFileStore;
use sanka_types::{ActivityId, DedupeKey, MemberId, Points, Timestamp, TransactionReason, TxId};

fn hana() -> MemberId {
    MemberId::parse("hana").unwrap()
}

fn posting(member: &MemberId, key: &str, delta: i64, reason: TransactionReason) -> Transaction {
    let key = DedupeKey::custom(key);
    Transaction {
        id: TxId::for_key(&key),
        sequence: 0,
        member: member.clone(),
        delta,
        reason,
        dedupe_key: key,
        timestamp: Timestamp::new(100),
    }
}

fn futsal() -> NewActivity {
    NewActivity {
        name: "Futsal".into(),
        cost: Points::new(10),
        required_participants: 2,
        date: NaiveDate::from_ymd_opt(2025, 3, 12).unwrap(),
        time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        location: "Gym".into(),
        description: String::new(),
        organizer: "admin".into(),
    }
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let activity_id;
    {
        let store = JsonFileStore::open(dir.path()).unwrap();
        store
            .insert_member(&MemberRecord::new(hana(), Timestamp::new(1)))
            .unwrap();
        store
            .append_posting(&posting(&hana(), "signup:hana", 20, TransactionReason::SignupGrant))
            .unwrap();
        let activity = store.insert_activity(futsal(), Timestamp::new(2)).unwrap();
        activity_id = activity.id;
        assert_eq!(
            store.increment_participants(activity.id).unwrap(),
            SeatUpdate::Taken(1)
        );
        store
            .append_posting(&posting(&hana(), "join:hana:1", -10, TransactionReason::JoinDebit))
            .unwrap();
        store
            .insert_participation(&Participation {
                member: hana(),
                activity: activity.id,
                cost: Points::new(10),
                joined_at: Timestamp::new(3),
            })
            .unwrap();
    }

    let store = JsonFileStore::open(dir.path()).unwrap();
    assert!(store.integrity().is_healthy());
    let member = store.get_member(&hana()).unwrap();
    assert_eq!(member.balance, Points::new(10));
    assert!(member.joined.contains(&activity_id));
    assert_eq!(store.get_activity(activity_id).unwrap().current_participants, 1);
    assert_eq!(store.transaction_count().unwrap(), 2);
    assert!(store
        .get_by_dedupe_key(&DedupeKey::custom("join:hana:1"))
        .unwrap()
        .is_some());

    // Ids keep counting after a reopen.
    let next = store.insert_activity(futsal(), Timestamp::new(4)).unwrap();
    assert_eq!(next.id, ActivityId::new(2));
}

#[test]
fn duplicate_posting_is_not_logged_twice() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path()).unwrap();
    store
        .insert_member(&MemberRecord::new(hana(), Timestamp::new(1)))
        .unwrap();
    let tx = posting(&hana(), "signup:hana", 20, TransactionReason::SignupGrant);
    store.append_posting(&tx).unwrap();
    assert!(matches!(
        store.append_posting(&tx),
        Err(StoreError::Duplicate(_))
    ));

    let log = fs::read_to_string(dir.path().join("transactions.jsonl")).unwrap();
    assert_eq!(log.lines().count(), 1);
}

#[test]
fn stale_cached_balance_is_repaired_on_open() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = JsonFileStore::open(dir.path()).unwrap();
        store
            .insert_member(&MemberRecord::new(hana(), Timestamp::new(1)))
            .unwrap();
        store
            .append_posting(&posting(&hana(), "signup:hana", 20, TransactionReason::SignupGrant))
            .unwrap();
    }
    let state_path = dir.path().join("state.json");
    let state = fs::read_to_string(&state_path).unwrap();
    fs::write(&state_path, state.replace("\"balance\": 20", "\"balance\": 500")).unwrap();

    let store = JsonFileStore::open(dir.path()).unwrap();
    assert!(!store.integrity().is_healthy());
    assert_eq!(store.get_member(&hana()).unwrap().balance, Points::new(20));

    // The repair was written back.
    drop(store);
    let store = JsonFileStore::open(dir.path()).unwrap();
    assert!(store.integrity().is_healthy());
}

#[test]
fn torn_log_tail_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = JsonFileStore::open(dir.path()).unwrap();
        store
            .insert_member(&MemberRecord::new(hana(), Timestamp::new(1)))
            .unwrap();
        store
            .append_posting(&posting(&hana(), "signup:hana", 20, TransactionReason::SignupGrant))
            .unwrap();
    }
    let mut log = fs::OpenOptions::new()
        .append(true)
        .open(dir.path().join("transactions.jsonl"))
        .unwrap();
    log.write_all(b"{\"id\":\"ab").unwrap();
    drop(log);

    let store = JsonFileStore::open(dir.path()).unwrap();
    assert_eq!(store.integrity().findings.len(), 1);
    assert_eq!(store.transaction_count().unwrap(), 1);

    store
        .append_posting(&posting(&hana(), "join:hana:1", -5, TransactionReason::JoinDebit))
        .unwrap();
    drop(store);
    let store = JsonFileStore::open(dir.path()).unwrap();
    assert!(store.integrity().is_healthy());
    assert_eq!(store.get_member(&hana()).unwrap().balance, Points::new(15));
}

#[test]
fn evidence_is_written_under_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path()).unwrap();
    let upload = EvidenceUpload {
        file_name: "photo.jpg".into(),
        content_type: "image/jpeg".into(),
        bytes: vec![0xff, 0xd8, 0xff],
    };
    let first = store
        .save_evidence(&hana(), &upload, Timestamp::new(0))
        .unwrap();
    let second = store
        .save_evidence(&hana(), &upload, Timestamp::new(0))
        .unwrap();
    assert_eq!(first.stored_name, "hana_19700101000000_photo.jpg");
    assert_ne!(first.stored_name, second.stored_name);
    assert_eq!(first.digest, second.digest);
    assert_eq!(store.load_evidence(&first.stored_name).unwrap(), upload.bytes);
    assert!(dir.path().join("uploads").join(&second.stored_name).exists());
    assert!(matches!(
        store.load_evidence("../state.json"),
        Err(StoreError::NotFound(_))
    ));
}
