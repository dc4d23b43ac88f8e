//! The sanka service: every logical operation, ready to be served.
//!
//! `PointsService` wires the ledger, catalog, tracker, and verification
//! workflow over one store and adds what the components leave to their
//! caller:
//!
//! - mutations for one member are serialized (per-member locks); a request's
//!   resolution is serialized per request id;
//! - a semaphore bounds how many operations execute at once;
//! - store work runs on the blocking pool under `operation_timeout`;
//! - new verification requests are handed to the [`DecisionService`] under
//!   `decision_timeout`, and an immediate verdict resolves the request;
//! - every outcome is reported on the [`EventBus`], which feeds
//!   [`ServiceMetrics`].
//!
//! A timed-out operation keeps its lock until its blocking work actually
//! finishes, so a retry never overlaps the original attempt.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sanka_catalog::{ActivityCatalog, ActivitySpec};
use sanka_ledger::{AuditReport, PointsLedger};
use sanka_participation::ParticipationTracker;
use sanka_store::{Activity, Participation, Store, StoreError, Transaction, VerificationRequest};
use sanka_store_json::JsonFileStore;
use sanka_types::{
    ActivityId, Clock, MemberId, MemberView, Outcome, Points, PointsParams, RequestId,
    SystemClock, VerificationStatus,
};
use sanka_verification::{
    Decision, DecisionService, LogDecisionService, Resolution, Submission, SubmitRequest,
    VerificationError, VerificationWorkflow, WebhookDecisionService,
};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn, Instrument};

use crate::tracing_spans::{join_span, member_op_span, resolve_span, submit_span};
use crate::{ErrorClass, EventBus, KeyedLocks, ServiceConfig, ServiceError, ServiceEvent, ServiceMetrics};

/// What an operation must hold exclusively while it runs.
#[derive(Clone, Debug)]
enum LockKey {
    None,
    Member(MemberId),
    Request(RequestId),
}

pub struct PointsService {
    store: Arc<dyn Store>,
    ledger: Arc<PointsLedger>,
    catalog: Arc<ActivityCatalog>,
    tracker: Arc<ParticipationTracker>,
    workflow: Arc<VerificationWorkflow>,
    decisions: Arc<dyn DecisionService>,
    params: PointsParams,
    member_locks: KeyedLocks<MemberId>,
    request_locks: KeyedLocks<RequestId>,
    permits: Arc<Semaphore>,
    operation_timeout: Duration,
    decision_timeout: Duration,
    events: Arc<EventBus>,
    metrics: Arc<ServiceMetrics>,
}

impl PointsService {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        decisions: Arc<dyn DecisionService>,
        config: &ServiceConfig,
    ) -> Result<Self, ServiceError> {
        config.validate()?;
        let params = config.params();
        let ledger = Arc::new(PointsLedger::new(store.clone(), clock.clone()));
        let catalog = Arc::new(ActivityCatalog::new(store.clone(), clock.clone()));
        let tracker = Arc::new(ParticipationTracker::new(
            store.clone(),
            ledger.clone(),
            catalog.clone(),
            clock.clone(),
        ));
        let workflow = Arc::new(VerificationWorkflow::new(
            store.clone(),
            ledger.clone(),
            clock,
            params.clone(),
        ));

        let metrics = Arc::new(
            ServiceMetrics::new().map_err(|e| ServiceError::Internal(format!("metrics: {e}")))?,
        );
        metrics.member_count.set(store.member_count()? as i64);
        let events = Arc::new(EventBus::new());
        let sink = metrics.clone();
        events.subscribe(Box::new(move |event| sink.observe(event)));

        info!(
            decision_service = decisions.name(),
            starting_balance = %params.starting_balance,
            attendance_award = %params.attendance_award,
            max_concurrent = config.max_concurrent,
            "points service ready"
        );

        Ok(Self {
            store,
            ledger,
            catalog,
            tracker,
            workflow,
            decisions,
            params,
            member_locks: KeyedLocks::new(),
            request_locks: KeyedLocks::new(),
            permits: Arc::new(Semaphore::new(config.max_concurrent)),
            operation_timeout: config.operation_timeout(),
            decision_timeout: config.decision_timeout(),
            events,
            metrics,
        })
    }

    /// Open the JSON store under `config.data_dir` and pick the decision
    /// service: the webhook when a URL is configured, otherwise the log.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let store = JsonFileStore::open(&config.data_dir).map_err(StoreError::from)?;
        let integrity = store.integrity();
        if integrity.is_healthy() {
            info!(
                path = %config.data_dir.display(),
                members = integrity.members,
                transactions = integrity.transactions,
                "store opened"
            );
        } else {
            warn!(
                path = %config.data_dir.display(),
                repaired = integrity.findings.len(),
                "store opened with repairs"
            );
        }

        let decisions: Arc<dyn DecisionService> = match &config.decision_webhook_url {
            Some(url) => Arc::new(WebhookDecisionService::with_timeout(
                url.clone(),
                config.decision_timeout(),
            )),
            None => Arc::new(LogDecisionService),
        };
        Self::new(Arc::new(store), Arc::new(SystemClock), decisions, config)
    }

    pub fn params(&self) -> &PointsParams {
        &self.params
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn metrics(&self) -> &ServiceMetrics {
        &self.metrics
    }

    /// Prometheus text for the `/metrics` endpoint.
    pub fn render_metrics(&self) -> Result<String, ServiceError> {
        self.metrics
            .encode_text()
            .map_err(|e| ServiceError::Internal(format!("metrics: {e}")))
    }

    pub fn decision_service(&self) -> &str {
        self.decisions.name()
    }

    /// Drop lock entries for members and requests nobody is using.
    pub async fn reclaim_idle_locks(&self) -> usize {
        self.member_locks.cleanup().await + self.request_locks.cleanup().await
    }

    // ── Activities ─────────────────────────────────────────────────────

    pub async fn list_activities(&self) -> Result<Vec<Activity>, ServiceError> {
        let catalog = self.catalog.clone();
        self.run("list_activities", LockKey::None, move || Ok(catalog.list()?))
            .await
    }

    pub async fn get_activity(&self, id: ActivityId) -> Result<Activity, ServiceError> {
        let catalog = self.catalog.clone();
        self.run("get_activity", LockKey::None, move || Ok(catalog.get(id)?))
            .await
    }

    pub async fn create_activity(&self, spec: ActivitySpec) -> Result<Activity, ServiceError> {
        let catalog = self.catalog.clone();
        let activity = self
            .run("create_activity", LockKey::None, move || {
                Ok(catalog.create(&spec)?)
            })
            .await?;
        self.events.emit(&ServiceEvent::ActivityCreated {
            activity: activity.id,
        });
        Ok(activity)
    }

    pub async fn participants(&self, id: ActivityId) -> Result<Vec<Participation>, ServiceError> {
        let tracker = self.tracker.clone();
        self.run("participants", LockKey::None, move || {
            Ok(tracker.participants(id)?)
        })
        .await
    }

    // ── Members ────────────────────────────────────────────────────────

    /// Register `username` with the configured starting balance.
    pub async fn register_member(&self, username: &str) -> Result<MemberView, ServiceError> {
        let member = MemberId::parse(username)?;
        let ledger = self.ledger.clone();
        let tracker = self.tracker.clone();
        let starting = self.params.starting_balance;
        let id = member.clone();
        let view = self
            .run("register_member", LockKey::Member(member.clone()), move || {
                ledger.open_account(&id, starting)?;
                Ok(tracker.member_view(&id)?)
            })
            .instrument(member_op_span("register", member.as_str()))
            .await?;
        self.events.emit(&ServiceEvent::MemberRegistered {
            member,
            balance: view.balance,
        });
        Ok(view)
    }

    pub async fn get_member(&self, member: &MemberId) -> Result<MemberView, ServiceError> {
        let tracker = self.tracker.clone();
        let id = member.clone();
        self.run("get_member", LockKey::None, move || {
            Ok(tracker.member_view(&id)?)
        })
        .await
    }

    pub async fn get_balance(&self, member: &MemberId) -> Result<Points, ServiceError> {
        let ledger = self.ledger.clone();
        let id = member.clone();
        self.run("get_balance", LockKey::None, move || {
            Ok(ledger.balance_of(&id)?)
        })
        .await
    }

    /// The member's ledger entries in commit order.
    pub async fn transactions(&self, member: &MemberId) -> Result<Vec<Transaction>, ServiceError> {
        let ledger = self.ledger.clone();
        let id = member.clone();
        self.run("transactions", LockKey::None, move || Ok(ledger.history(&id)?))
            .await
    }

    /// Compare every cached balance with its transaction log.
    pub async fn audit(&self) -> Result<Vec<AuditReport>, ServiceError> {
        let ledger = self.ledger.clone();
        let reports = self
            .run("audit", LockKey::None, move || Ok(ledger.audit_all()?))
            .await?;
        for report in reports.iter().filter(|r| !r.is_consistent()) {
            warn!(
                member = %report.member,
                cached = %report.cached,
                derived = %report.derived,
                "balance disagrees with transaction log"
            );
        }
        Ok(reports)
    }

    // ── Join ───────────────────────────────────────────────────────────

    /// Charge `member` the activity's cost and take a seat.
    pub async fn join_activity(
        &self,
        member: &MemberId,
        activity: ActivityId,
    ) -> Result<MemberView, ServiceError> {
        let tracker = self.tracker.clone();
        let id = member.clone();
        let result = self
            .run("join", LockKey::Member(member.clone()), move || {
                Ok(tracker.join(&id, activity)?)
            })
            .instrument(join_span(member.as_str(), activity.get()))
            .await;

        match &result {
            Ok(view) => self.events.emit(&ServiceEvent::Joined {
                member: member.clone(),
                activity,
                balance: view.balance,
            }),
            Err(e) if matches!(
                e.class(),
                ErrorClass::Resource | ErrorClass::Conflict | ErrorClass::NotFound
            ) =>
            {
                self.events.emit(&ServiceEvent::JoinRefused {
                    member: member.clone(),
                    activity,
                    code: e.code(),
                })
            }
            Err(_) => {}
        }
        result
    }

    // ── Verification ───────────────────────────────────────────────────

    /// Store a verification request and hand it to the decision service.
    ///
    /// A retried submission (same client token) returns the stored request;
    /// if that request is still pending it is handed over again, so a
    /// submission whose decision call failed can be completed by retrying.
    pub async fn submit_verification(
        &self,
        req: SubmitRequest,
    ) -> Result<Submission, ServiceError> {
        let span = submit_span(req.member.as_str(), req.kind.as_str());
        let workflow = self.workflow.clone();
        let lock = LockKey::Member(req.member.clone());
        let submission = self
            .run("submit_verification", lock, move || Ok(workflow.submit(req)?))
            .instrument(span.clone())
            .await?;

        if submission.created {
            self.events.emit(&ServiceEvent::VerificationSubmitted {
                request: submission.request.id,
                member: submission.request.member.clone(),
                kind: submission.request.kind,
            });
        }
        if submission.request.status != VerificationStatus::Pending {
            return Ok(submission);
        }

        let decided = self.dispatch(&submission.request).instrument(span).await?;
        Ok(match decided {
            Some(request) => Submission {
                request,
                created: submission.created,
            },
            None => submission,
        })
    }

    /// Ask the decision service about `request`; resolve it on an immediate
    /// verdict. Returns the resolved request, or `None` if deferred.
    async fn dispatch(
        &self,
        request: &VerificationRequest,
    ) -> Result<Option<VerificationRequest>, ServiceError> {
        let started = Instant::now();
        let decision = match tokio::time::timeout(
            self.decision_timeout,
            self.decisions.request_decision(request),
        )
        .await
        {
            Ok(Ok(decision)) => Ok(decision),
            Ok(Err(e)) => Err(ServiceError::Decision(e)),
            Err(_) => Err(ServiceError::Timeout {
                operation: "decision",
            }),
        };
        self.record("decision", started, &decision);

        match decision? {
            Decision::Deferred => {
                debug!(request = %request.id, service = self.decisions.name(), "decision deferred");
                Ok(None)
            }
            Decision::Immediate(outcome) => match self.resolve_verification(request.id, outcome).await
            {
                Ok(resolution) => Ok(Some(resolution.request)),
                Err(ServiceError::Verification(VerificationError::AlreadyResolved { .. })) => {
                    // Someone resolved it first; report what they decided.
                    let workflow = self.workflow.clone();
                    let id = request.id;
                    let current = self
                        .run("get_verification", LockKey::None, move || {
                            Ok(workflow.request(id)?)
                        })
                        .await?;
                    Ok(Some(current))
                }
                Err(e) => Err(e),
            },
        }
    }

    /// Move a pending request to `approved` or `rejected`.
    pub async fn resolve_verification(
        &self,
        id: RequestId,
        outcome: Outcome,
    ) -> Result<Resolution, ServiceError> {
        let workflow = self.workflow.clone();
        let outcome_label = match outcome {
            Outcome::Approved => "approved",
            Outcome::Rejected => "rejected",
        };
        let resolution = self
            .run("resolve_verification", LockKey::Request(id), move || {
                Ok(workflow.resolve(id, outcome)?)
            })
            .instrument(resolve_span(id.get(), outcome_label))
            .await?;
        self.events.emit(&ServiceEvent::VerificationResolved {
            request: id,
            status: resolution.request.status,
            awarded: resolution.request.points_awarded,
        });
        Ok(resolution)
    }

    pub async fn get_verification(&self, id: RequestId) -> Result<VerificationRequest, ServiceError> {
        let workflow = self.workflow.clone();
        self.run("get_verification", LockKey::None, move || {
            Ok(workflow.request(id)?)
        })
        .await
    }

    pub async fn list_verifications(
        &self,
        status: Option<VerificationStatus>,
    ) -> Result<Vec<VerificationRequest>, ServiceError> {
        let workflow = self.workflow.clone();
        self.run("list_verifications", LockKey::None, move || {
            Ok(workflow.list(status)?)
        })
        .await
    }

    /// Evidence bytes stored under `name`.
    pub async fn evidence(&self, name: &str) -> Result<Vec<u8>, ServiceError> {
        let store = self.store.clone();
        let name = name.to_string();
        self.run("evidence", LockKey::None, move || {
            Ok(store.load_evidence(&name)?)
        })
        .await
    }

    // ── Execution ──────────────────────────────────────────────────────

    /// Run `work` on the blocking pool while holding `key` and a permit,
    /// all under the operation timeout.
    async fn run<T, F>(&self, operation: &'static str, key: LockKey, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
        T: Send + 'static,
    {
        let started = Instant::now();
        let result = match tokio::time::timeout(
            self.operation_timeout,
            self.run_locked(operation, key, work),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout { operation }),
        };
        self.record(operation, started, &result);
        result
    }

    async fn run_locked<T, F>(
        &self,
        operation: &'static str,
        key: LockKey,
        work: F,
    ) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
        T: Send + 'static,
    {
        let guard = match &key {
            LockKey::None => None,
            LockKey::Member(member) => Some(self.member_locks.lock(member).await),
            LockKey::Request(id) => Some(self.request_locks.lock(id).await),
        };
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ServiceError::Internal("service is shutting down".into()))?;

        // Guard and permit move into the task: they are released when the
        // work finishes, even if the caller has stopped waiting.
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _guard = guard;
            work()
        })
        .await
        .map_err(|e| ServiceError::Internal(format!("{operation} task failed: {e}")))?
    }

    fn record<T>(&self, operation: &'static str, started: Instant, result: &Result<T, ServiceError>) {
        match result {
            Ok(_) => self.events.emit(&ServiceEvent::OperationCompleted {
                operation,
                elapsed: started.elapsed(),
            }),
            Err(e) => {
                let class = e.class();
                match class {
                    ErrorClass::Conflict | ErrorClass::NotFound => {
                        debug!(operation, code = e.code(), error = %e, "operation refused")
                    }
                    ErrorClass::Validation | ErrorClass::Resource => {
                        warn!(operation, code = e.code(), error = %e, "operation refused")
                    }
                    ErrorClass::Transient | ErrorClass::Internal => {
                        warn!(operation, code = e.code(), error = %e, "operation failed")
                    }
                }
                self.events
                    .emit(&ServiceEvent::OperationFailed { operation, class });
            }
        }
    }
}
