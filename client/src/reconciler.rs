//! Confirmed server state plus provisional local changes.
//!
//! The displayed member view is the last view the server confirmed with every
//! still-pending ticket applied on top. A ticket is settled exactly once:
//! `confirm` installs the server's response as the new confirmed view,
//! `rollback` discards the ticket so the view returns to what it was before
//! the call. Nothing else writes confirmed state.

use std::collections::BTreeMap;
use std::fmt;

use sanka_types::{ActivityId, MemberView, Points};

use crate::ClientError;

/// Handle for one provisional change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TicketId(u64);

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a pending call is expected to do to the member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    /// Signed point change.
    pub balance_delta: i64,
    /// Activity the member is expected to have joined.
    pub joins: Option<ActivityId>,
}

impl Change {
    /// Joining `activity` at `cost`.
    pub fn join(activity: ActivityId, cost: Points) -> Self {
        Self {
            balance_delta: cost.as_debit().unwrap_or(-i64::MAX),
            joins: Some(activity),
        }
    }

    pub fn credit(amount: Points) -> Self {
        Self {
            balance_delta: amount.as_credit().unwrap_or(i64::MAX),
            joins: None,
        }
    }

    fn apply(&self, view: &mut MemberView) {
        // A projection never shows a negative balance.
        view.balance = view
            .balance
            .apply_delta(self.balance_delta)
            .unwrap_or(Points::ZERO);
        if let Some(activity) = self.joins {
            view.joined.insert(activity);
        }
    }
}

#[derive(Debug)]
pub struct Reconciler {
    confirmed: MemberView,
    pending: BTreeMap<TicketId, Change>,
    next_ticket: u64,
}

impl Reconciler {
    pub fn new(confirmed: MemberView) -> Self {
        Self {
            confirmed,
            pending: BTreeMap::new(),
            next_ticket: 1,
        }
    }

    /// The last server-confirmed view.
    pub fn confirmed(&self) -> &MemberView {
        &self.confirmed
    }

    /// What to display: confirmed state with pending tickets applied in
    /// the order they were opened.
    pub fn view(&self) -> MemberView {
        let mut view = self.confirmed.clone();
        for change in self.pending.values() {
            change.apply(&mut view);
        }
        view
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Record `change` as provisional until its call completes.
    pub fn provisional(&mut self, change: Change) -> TicketId {
        let ticket = TicketId(self.next_ticket);
        self.next_ticket += 1;
        self.pending.insert(ticket, change);
        ticket
    }

    /// The call behind `ticket` succeeded and the server returned
    /// `server_view`; it becomes the confirmed state.
    pub fn confirm(&mut self, ticket: TicketId, server_view: MemberView) -> Result<(), ClientError> {
        self.check_member(&server_view)?;
        self.pending
            .remove(&ticket)
            .ok_or(ClientError::UnknownTicket(ticket))?;
        self.confirmed = server_view;
        Ok(())
    }

    /// The call behind `ticket` failed; drop its change.
    pub fn rollback(&mut self, ticket: TicketId) -> Result<(), ClientError> {
        self.pending
            .remove(&ticket)
            .map(|_| ())
            .ok_or(ClientError::UnknownTicket(ticket))
    }

    /// Install an authoritative refresh. Pending tickets stay layered on top.
    pub fn replace(&mut self, server_view: MemberView) -> Result<(), ClientError> {
        self.check_member(&server_view)?;
        self.confirmed = server_view;
        Ok(())
    }

    fn check_member(&self, view: &MemberView) -> Result<(), ClientError> {
        if view.member != self.confirmed.member {
            return Err(ClientError::MemberMismatch {
                expected: self.confirmed.member.clone(),
                got: view.member.clone(),
            });
        }
        Ok(())
    }
}
