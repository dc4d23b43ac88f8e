//! Signed-in state.

use sanka_types::{MemberId, MemberView};

use crate::{ClientError, Reconciler};

/// Whether a member is signed in, and their reconciled view if so.
#[derive(Debug, Default)]
pub struct Session {
    current: Option<Reconciler>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session from the member record the server returned.
    /// Any previous session is discarded along with its pending tickets.
    pub fn login(&mut self, view: MemberView) {
        if let Some(previous) = self.current.replace(Reconciler::new(view)) {
            if previous.pending_count() > 0 {
                tracing::debug!(
                    member = %previous.confirmed().member,
                    pending = previous.pending_count(),
                    "dropping unsettled tickets at login"
                );
            }
        }
    }

    pub fn logout(&mut self) {
        self.current = None;
    }

    pub fn is_present(&self) -> bool {
        self.current.is_some()
    }

    pub fn member(&self) -> Option<&MemberId> {
        self.current.as_ref().map(|r| &r.confirmed().member)
    }

    /// The displayed view, provisional changes included.
    pub fn view(&self) -> Option<MemberView> {
        self.current.as_ref().map(Reconciler::view)
    }

    pub fn reconciler(&self) -> Result<&Reconciler, ClientError> {
        self.current.as_ref().ok_or(ClientError::NoSession)
    }

    pub fn reconciler_mut(&mut self) -> Result<&mut Reconciler, ClientError> {
        self.current.as_mut().ok_or(ClientError::NoSession)
    }
}
