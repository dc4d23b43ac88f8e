//! The session client against a live HTTP server on a loopback port.

use std::sync::Arc;

use sanka_catalog::ActivitySpec;
use sanka_client::{ClientError, HttpPointsApi, SessionClient, VerificationForm};
use sanka_node::{PointsService, ServiceConfig, ShutdownController};
use sanka_nullables::{NullClock, NullStore};
use sanka_rpc::RpcServer;
use sanka_store::EvidenceUpload;
use sanka_types::{MemberId, Outcome, Points, VerificationKind, VerificationStatus};
use sanka_verification::{Decision, NullDecisionService};

struct Running {
    service: Arc<PointsService>,
    base_url: String,
    shutdown: ShutdownController,
}

async fn start(starting_balance: u64, decisions: NullDecisionService) -> Running {
    let config = ServiceConfig {
        starting_balance,
        ..ServiceConfig::default()
    };
    let service = Arc::new(
        PointsService::new(
            Arc::new(NullStore::new()),
            Arc::new(NullClock::new(1_741_804_205)),
            Arc::new(decisions),
            &config,
        )
        .unwrap(),
    );
    let server = RpcServer::bind("127.0.0.1:0", service.clone()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = ShutdownController::new();
    tokio::spawn(server.serve(shutdown.signalled()));
    Running {
        service,
        base_url: format!("http://{addr}"),
        shutdown,
    }
}

fn spec(cost: i64, seats: i64) -> ActivitySpec {
    ActivitySpec {
        name: "Beach cleanup".into(),
        cost,
        date: "2025-07-12".into(),
        time: "09:30".into(),
        location: "North beach".into(),
        description: "Bring gloves".into(),
        required_participants: seats,
        organizer: None,
    }
}

fn photo() -> EvidenceUpload {
    EvidenceUpload {
        file_name: "selfie.jpg".into(),
        content_type: "image/jpeg".into(),
        bytes: b"\xFF\xD8\xFF\xE0fake-jpeg".to_vec(),
    }
}

#[tokio::test]
async fn join_over_http_settles_to_the_server_view() {
    let running = start(50, NullDecisionService::new()).await;
    running.service.create_activity(spec(30, 2)).await.unwrap();

    let client = SessionClient::new(HttpPointsApi::new(&running.base_url).unwrap());
    client.register("hana").await.unwrap();
    let activities = client.activities().await.unwrap();
    assert_eq!(activities.len(), 1);

    let view = client.join(&activities[0]).await.unwrap();
    assert_eq!(view.balance, Points::new(20));
    assert_eq!(client.view().unwrap(), view);
    assert_eq!(client.pending(), 0);

    // Joining again charges nothing; the server's record stays on screen.
    let again = client.join(&activities[0]).await.unwrap();
    assert_eq!(again, view);
    assert_eq!(client.view().unwrap().balance, Points::new(20));
    assert_eq!(client.pending(), 0);

    let member = MemberId::parse("hana").unwrap();
    assert_eq!(
        running.service.get_balance(&member).await.unwrap(),
        Points::new(20)
    );
    running.shutdown.shutdown();
}

#[tokio::test]
async fn insufficient_balance_rolls_back() {
    let running = start(10, NullDecisionService::new()).await;
    running.service.create_activity(spec(30, 2)).await.unwrap();

    let client = SessionClient::new(HttpPointsApi::new(&running.base_url).unwrap());
    client.register("hana").await.unwrap();
    let activity = client.activities().await.unwrap().remove(0);

    match client.join(&activity).await {
        Err(ClientError::Api { status, code, .. }) => {
            assert_eq!(status, 422);
            assert_eq!(code, "insufficient_balance");
        }
        other => panic!("expected an API error, got {other:?}"),
    }
    let view = client.view().unwrap();
    assert_eq!(view.balance, Points::new(10));
    assert!(view.joined.is_empty());
    running.shutdown.shutdown();
}

#[tokio::test]
async fn immediate_approval_refreshes_the_balance() {
    let running = start(
        20,
        NullDecisionService::answering(Decision::Immediate(Outcome::Approved)),
    )
    .await;
    let client = SessionClient::new(HttpPointsApi::new(&running.base_url).unwrap());
    client.register("hana").await.unwrap();

    let form = VerificationForm {
        kind: VerificationKind::Attendance,
        activity: None,
        reason: None,
        client_token: Some("tok-1".into()),
        photo: Some(photo()),
    };
    let submitted = client.submit_verification(&form).await.unwrap();
    assert!(submitted.created);
    assert_eq!(submitted.request.status, VerificationStatus::Approved);
    assert_eq!(client.view().unwrap().balance, Points::new(30));

    let again = client.submit_verification(&form).await.unwrap();
    assert!(!again.created);
    assert_eq!(again.request.id, submitted.request.id);
    assert_eq!(client.view().unwrap().balance, Points::new(30));
    running.shutdown.shutdown();
}

#[tokio::test]
async fn missing_evidence_comes_back_as_a_code() {
    let running = start(20, NullDecisionService::new()).await;
    let client = SessionClient::new(HttpPointsApi::new(&running.base_url).unwrap());
    client.register("hana").await.unwrap();

    let form = VerificationForm {
        kind: VerificationKind::Attendance,
        activity: None,
        reason: None,
        client_token: None,
        photo: None,
    };
    let err = client.submit_verification(&form).await.unwrap_err();
    assert_eq!(err.code(), Some("missing_evidence"));
    assert!(!err.is_transient());
    running.shutdown.shutdown();
}

#[tokio::test]
async fn unreachable_server_is_transient() {
    let api = HttpPointsApi::new("http://127.0.0.1:1").unwrap();
    let client = SessionClient::new(api);
    let err = client.register("hana").await.unwrap_err();
    assert!(err.is_transient());
    assert!(!client.is_signed_in());
}
