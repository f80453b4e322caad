//! Outbound notifications, fired after a transition has committed
use crate::request::LeaveRequest;
use crate::types::{Actor, Employee};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaveEvent {
    Submitted,
    ApprovedByManager,
    RejectedByManager,
    ApprovedByHr,
    RejectedByHr,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct Notification<'a> {
    pub event: LeaveEvent,
    pub request: &'a LeaveRequest,
    pub employee: &'a Employee,
    pub actor: Option<&'a Actor>,
}

/// Delivery sink. Errors are logged by the caller and never undo the transition.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification<'_>) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _: &Notification<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}
