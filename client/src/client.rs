//! Session-aware client: every mutating call is shown provisionally,
//! then confirmed with the server's answer or rolled back.

use std::sync::{Mutex, MutexGuard, PoisonError};

use sanka_store::Activity;
use sanka_types::{MemberId, MemberView, VerificationStatus};

use crate::api::{PointsApi, Submitted, VerificationForm};
use crate::reconciler::{Change, TicketId};
use crate::{ClientError, Session};

pub struct SessionClient<A> {
    api: A,
    session: Mutex<Session>,
}

impl<A: PointsApi> SessionClient<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            session: Mutex::new(Session::new()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    // The session is never held across an await, so a poisoned lock only
    // means a panic elsewhere; the data is still consistent.
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create the member on the server and sign in as them.
    pub async fn register(&self, username: &str) -> Result<MemberView, ClientError> {
        let view = self.api.register(username).await?;
        self.session().login(view.clone());
        Ok(view)
    }

    /// Sign in as an existing member.
    pub async fn login(&self, member: &MemberId) -> Result<MemberView, ClientError> {
        let view = self.api.member(member).await?;
        self.session().login(view.clone());
        Ok(view)
    }

    pub fn logout(&self) {
        self.session().logout();
    }

    pub fn is_signed_in(&self) -> bool {
        self.session().is_present()
    }

    /// The view to display, including changes still in flight.
    pub fn view(&self) -> Option<MemberView> {
        self.session().view()
    }

    pub fn pending(&self) -> usize {
        self.session()
            .reconciler()
            .map(|r| r.pending_count())
            .unwrap_or(0)
    }

    pub async fn activities(&self) -> Result<Vec<Activity>, ClientError> {
        self.api.activities().await
    }

    fn current_member(&self) -> Result<MemberId, ClientError> {
        self.session()
            .member()
            .cloned()
            .ok_or(ClientError::NoSession)
    }

    /// Join `activity`, showing the debit and membership immediately.
    pub async fn join(&self, activity: &Activity) -> Result<MemberView, ClientError> {
        let (member, ticket) = {
            let mut session = self.session();
            let member = session.member().cloned().ok_or(ClientError::NoSession)?;
            let ticket = session
                .reconciler_mut()?
                .provisional(Change::join(activity.id, activity.cost));
            (member, ticket)
        };
        tracing::debug!(%member, activity = %activity.id, %ticket, "provisional join");

        let result = self.api.join(&member, activity.id).await;
        if matches!(&result, Err(e) if e.code() == Some("already_joined")) {
            // Nothing was charged; show the server's record of the member.
            self.discard(ticket);
            tracing::debug!(%member, activity = %activity.id, "already joined, refreshing");
            return self.refresh().await;
        }
        self.settle(ticket, result)
    }

    /// Drop `ticket` if its session is still current.
    fn discard(&self, ticket: TicketId) {
        if let Ok(reconciler) = self.session().reconciler_mut() {
            if let Err(unknown) = reconciler.rollback(ticket) {
                tracing::debug!(%ticket, error = %unknown, "ticket already gone");
            }
        }
    }

    fn settle(
        &self,
        ticket: TicketId,
        result: Result<MemberView, ClientError>,
    ) -> Result<MemberView, ClientError> {
        match result {
            Ok(view) => {
                // Signed out (or switched member) while the call ran: the
                // ticket went with the old session.
                if let Ok(reconciler) = self.session().reconciler_mut() {
                    if reconciler.confirmed().member == view.member {
                        reconciler.confirm(ticket, view.clone())?;
                    }
                }
                Ok(view)
            }
            Err(e) => {
                self.discard(ticket);
                tracing::debug!(%ticket, error = %e, "rolled back");
                Err(e)
            }
        }
    }

    /// Submit an attendance or absence request for the signed-in member.
    /// If the decision service approved it on the spot, the member view is
    /// refreshed so the award shows.
    pub async fn submit_verification(
        &self,
        form: &VerificationForm,
    ) -> Result<Submitted, ClientError> {
        let member = self.current_member()?;
        let submitted = self.api.submit_verification(&member, form).await?;
        if submitted.request.status == VerificationStatus::Approved {
            self.refresh().await?;
        }
        Ok(submitted)
    }

    /// Replace the confirmed view with the server's current record.
    pub async fn refresh(&self) -> Result<MemberView, ClientError> {
        let member = self.current_member()?;
        let view = self.api.member(&member).await?;
        let mut session = self.session();
        if session.member() == Some(&view.member) {
            session.reconciler_mut()?.replace(view.clone())?;
        }
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use sanka_store::VerificationRequest;
    use sanka_types::{ActivityId, Points, RequestId};
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use tokio::sync::{oneshot, Notify};

    /// Answers joins only after the test releases it.
    struct GatedApi {
        entered: Arc<Notify>,
        release: Mutex<Option<oneshot::Receiver<Result<MemberView, ClientError>>>>,
        /// What `member` returns.
        record: MemberView,
    }

    fn view(balance: u64, joined: &[u64]) -> MemberView {
        MemberView {
            member: MemberId::parse("hana").unwrap(),
            balance: Points::new(balance),
            joined: joined.iter().copied().map(ActivityId::new).collect::<BTreeSet<_>>(),
        }
    }

    fn unsupported<T>() -> Result<T, ClientError> {
        Err(ClientError::Transport("unsupported".into()))
    }

    impl PointsApi for GatedApi {
        fn register<'a>(&'a self, _: &'a str) -> BoxFuture<'a, Result<MemberView, ClientError>> {
            async { Ok(view(50, &[])) }.boxed()
        }

        fn member<'a>(&'a self, _: &'a MemberId) -> BoxFuture<'a, Result<MemberView, ClientError>> {
            async move { Ok(self.record.clone()) }.boxed()
        }

        fn activities(&self) -> BoxFuture<'_, Result<Vec<Activity>, ClientError>> {
            async { Ok(Vec::new()) }.boxed()
        }

        fn join<'a>(
            &'a self,
            _: &'a MemberId,
            _: ActivityId,
        ) -> BoxFuture<'a, Result<MemberView, ClientError>> {
            async move {
                let rx = self.release.lock().unwrap().take();
                self.entered.notify_one();
                match rx {
                    Some(rx) => rx
                        .await
                        .unwrap_or_else(|_| Err(ClientError::Transport("dropped".into()))),
                    None => unsupported(),
                }
            }
            .boxed()
        }

        fn submit_verification<'a>(
            &'a self,
            _: &'a MemberId,
            _: &'a VerificationForm,
        ) -> BoxFuture<'a, Result<Submitted, ClientError>> {
            async { unsupported() }.boxed()
        }

        fn verification(
            &self,
            _: RequestId,
        ) -> BoxFuture<'_, Result<VerificationRequest, ClientError>> {
            async { unsupported() }.boxed()
        }
    }

    fn activity(id: u64, cost: u64) -> Activity {
        Activity {
            id: ActivityId::new(id),
            name: "Beach cleanup".into(),
            cost: Points::new(cost),
            required_participants: 5,
            current_participants: 0,
            date: "2025-07-12".parse().unwrap(),
            time: "09:30:00".parse().unwrap(),
            location: "North beach".into(),
            description: String::new(),
            organizer: String::new(),
            created_at: sanka_types::Timestamp::new(0),
        }
    }

    async fn gated() -> (
        Arc<SessionClient<GatedApi>>,
        Arc<Notify>,
        oneshot::Sender<Result<MemberView, ClientError>>,
    ) {
        gated_with(view(50, &[])).await
    }

    async fn gated_with(
        record: MemberView,
    ) -> (
        Arc<SessionClient<GatedApi>>,
        Arc<Notify>,
        oneshot::Sender<Result<MemberView, ClientError>>,
    ) {
        let (tx, rx) = oneshot::channel();
        let entered = Arc::new(Notify::new());
        let client = Arc::new(SessionClient::new(GatedApi {
            entered: entered.clone(),
            release: Mutex::new(Some(rx)),
            record,
        }));
        client.register("hana").await.unwrap();
        (client, entered, tx)
    }

    #[tokio::test]
    async fn join_is_visible_while_in_flight_then_confirmed() {
        let (client, entered, release) = gated().await;
        let task = {
            let client = client.clone();
            tokio::spawn(async move { client.join(&activity(3, 30)).await })
        };
        entered.notified().await;
        assert_eq!(client.view().unwrap(), view(20, &[3]));
        assert_eq!(client.pending(), 1);

        release.send(Ok(view(20, &[3]))).unwrap();
        task.await.unwrap().unwrap();
        assert_eq!(client.view().unwrap(), view(20, &[3]));
        assert_eq!(client.pending(), 0);
    }

    #[tokio::test]
    async fn refused_join_restores_the_previous_view() {
        let (client, entered, release) = gated().await;
        let task = {
            let client = client.clone();
            tokio::spawn(async move { client.join(&activity(3, 30)).await })
        };
        entered.notified().await;
        assert_eq!(client.view().unwrap().balance, Points::new(20));

        release
            .send(Err(ClientError::Api {
                status: 422,
                code: "activity_full".into(),
                message: "activity 3 is full".into(),
            }))
            .unwrap();
        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err.code(), Some("activity_full"));
        assert_eq!(client.view().unwrap(), view(50, &[]));
        assert_eq!(client.pending(), 0);
    }

    #[tokio::test]
    async fn already_joined_installs_the_server_record() {
        // The server already has the join from an earlier attempt.
        let (client, entered, release) = gated_with(view(20, &[3])).await;
        assert_eq!(client.view().unwrap(), view(50, &[]));
        let task = {
            let client = client.clone();
            tokio::spawn(async move { client.join(&activity(3, 30)).await })
        };
        entered.notified().await;

        release
            .send(Err(ClientError::Api {
                status: 409,
                code: "already_joined".into(),
                message: "hana already joined activity 3".into(),
            }))
            .unwrap();
        assert_eq!(task.await.unwrap().unwrap(), view(20, &[3]));
        assert_eq!(client.view().unwrap(), view(20, &[3]));
        assert_eq!(client.pending(), 0);
    }

    #[tokio::test]
    async fn logout_mid_call_discards_the_ticket() {
        let (client, entered, release) = gated().await;
        let task = {
            let client = client.clone();
            tokio::spawn(async move { client.join(&activity(3, 30)).await })
        };
        entered.notified().await;
        client.logout();

        release.send(Ok(view(20, &[3]))).unwrap();
        assert_eq!(task.await.unwrap().unwrap(), view(20, &[3]));
        assert!(client.view().is_none());
    }

    #[tokio::test]
    async fn calls_need_a_session() {
        let client = SessionClient::new(GatedApi {
            entered: Arc::new(Notify::new()),
            release: Mutex::new(None),
            record: view(50, &[]),
        });
        assert!(matches!(
            client.join(&activity(1, 5)).await,
            Err(ClientError::NoSession)
        ));
        assert!(matches!(client.refresh().await, Err(ClientError::NoSession)));
        assert_eq!(client.pending(), 0);
    }
}
