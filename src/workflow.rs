//! The fixed transition graph of a leave request
//!
//! ```text
//! pending --manager approve--> manager_approved --hr approve--> hr_approved
//!    |                               |
//!    +--manager reject--> manager_rejected   +--hr reject--> hr_rejected
//!    |                               |
//!    +------------cancel------------+--> cancelled
//! ```
//!
//! Lookups are keyed on (current status, actor role, requested action). Anything
//! absent from the table is refused rather than falling through.
use crate::audit::AuditAction;
use crate::error::{LeaveError, LeaveResult};
use crate::types::{LeaveStatus, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaveAction {
    Approve,
    Reject,
    Cancel,
}

impl LeaveAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveAction::Approve => "approve",
            LeaveAction::Reject => "reject",
            LeaveAction::Cancel => "cancel",
        }
    }
}

/// A row of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    ManagerApprove,
    ManagerReject,
    HrApprove,
    HrReject,
    Cancel,
}

impl Transition {
    pub fn target(&self) -> LeaveStatus {
        match self {
            Transition::ManagerApprove => LeaveStatus::ManagerApproved,
            Transition::ManagerReject => LeaveStatus::ManagerRejected,
            Transition::HrApprove => LeaveStatus::HrApproved,
            Transition::HrReject => LeaveStatus::HrRejected,
            Transition::Cancel => LeaveStatus::Cancelled,
        }
    }

    pub fn audit_action(&self) -> AuditAction {
        match self {
            Transition::ManagerApprove => AuditAction::ApprovedByManager,
            Transition::ManagerReject => AuditAction::RejectedByManager,
            Transition::HrApprove => AuditAction::ApprovedByHr,
            Transition::HrReject => AuditAction::RejectedByHr,
            Transition::Cancel => AuditAction::Cancelled,
        }
    }

    /// Whether the request leaves the workflow without being granted.
    pub fn withdraws(&self) -> bool {
        matches!(
            self,
            Transition::ManagerReject | Transition::HrReject | Transition::Cancel
        )
    }
}

pub fn lookup(status: LeaveStatus, role: Role, action: LeaveAction) -> Option<Transition> {
    use LeaveAction as A;
    use LeaveStatus as S;

    match (status, role, action) {
        (S::Pending, Role::Manager, A::Approve) => Some(Transition::ManagerApprove),
        (S::Pending, Role::Manager, A::Reject) => Some(Transition::ManagerReject),
        (S::ManagerApproved, Role::Hr, A::Approve) => Some(Transition::HrApprove),
        (S::ManagerApproved, Role::Hr, A::Reject) => Some(Transition::HrReject),
        (S::Pending | S::ManagerApproved, Role::Employee | Role::Manager | Role::Hr, A::Cancel) => {
            Some(Transition::Cancel)
        }
        _ => None,
    }
}

/// Like [`lookup`], with the refusal categorised: roles that can never take
/// the action are `FORBIDDEN`, everything else is `INVALID_TRANSITION`.
pub fn resolve(status: LeaveStatus, role: Role, action: LeaveAction) -> LeaveResult<Transition> {
    if let Some(transition) = lookup(status, role, action) {
        return Ok(transition);
    }

    let role_can_act = match action {
        LeaveAction::Approve | LeaveAction::Reject => matches!(role, Role::Manager | Role::Hr),
        LeaveAction::Cancel => role != Role::Service,
    };
    if !role_can_act {
        return Err(LeaveError::forbidden(format!(
            "{role} may not {} leave requests",
            action.as_str()
        )));
    }
    Err(LeaveError::invalid_transition(format!(
        "{role} cannot {} a request that is {status}",
        action.as_str()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn manager_only_acts_on_pending() {
        assert_eq!(
            lookup(LeaveStatus::Pending, Role::Manager, LeaveAction::Approve),
            Some(Transition::ManagerApprove)
        );
        assert_eq!(
            lookup(LeaveStatus::ManagerApproved, Role::Manager, LeaveAction::Approve),
            None
        );
    }

    #[test]
    fn hr_only_acts_on_manager_approved() {
        assert_eq!(
            lookup(LeaveStatus::ManagerApproved, Role::Hr, LeaveAction::Reject),
            Some(Transition::HrReject)
        );
        let err = resolve(LeaveStatus::Pending, Role::Hr, LeaveAction::Approve).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn employees_cannot_approve() {
        let err = resolve(LeaveStatus::Pending, Role::Employee, LeaveAction::Approve).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn terminal_states_refuse_cancel() {
        for status in [
            LeaveStatus::ManagerRejected,
            LeaveStatus::HrApproved,
            LeaveStatus::HrRejected,
            LeaveStatus::Cancelled,
        ] {
            let err = resolve(status, Role::Employee, LeaveAction::Cancel).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        }
    }
}
