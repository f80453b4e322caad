//! Append-only, hash-chained audit trail of request transitions
use chrono::Utc;
use tracing::debug;

use crate::error::{LeaveError, LeaveResult};
use crate::store::{LedgerTx, TxResult, abort_on, encode};
use crate::types::{LeaveStatus, TimeStamp};
use crate::utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum AuditAction {
    #[n(0)]
    Created,
    #[n(1)]
    ApprovedByManager,
    #[n(2)]
    RejectedByManager,
    #[n(3)]
    ApprovedByHr,
    #[n(4)]
    RejectedByHr,
    #[n(5)]
    Cancelled,
    #[n(6)]
    Updated,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::ApprovedByManager => "approved_by_manager",
            AuditAction::RejectedByManager => "rejected_by_manager",
            AuditAction::ApprovedByHr => "approved_by_hr",
            AuditAction::RejectedByHr => "rejected_by_hr",
            AuditAction::Cancelled => "cancelled",
            AuditAction::Updated => "updated",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, minicbor::Encode, minicbor::Decode)]
pub struct AuditEntry {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub leave_request_id: String,
    #[n(2)]
    pub action: AuditAction,
    #[n(3)]
    pub performed_by_id: String,
    #[n(4)]
    pub details: String,
    #[n(5)]
    pub previous_status: Option<LeaveStatus>, // None for `created`
    #[n(6)]
    pub new_status: LeaveStatus,
    #[n(7)]
    pub timestamp: TimeStamp<Utc>,
    #[n(8)]
    pub antecedent: Option<String>, // digest of the previous entry for this request
    #[n(9)]
    pub digest: String,
}

impl AuditEntry {
    pub fn new(
        leave_request_id: &str,
        action: AuditAction,
        performed_by_id: &str,
        details: impl Into<String>,
        previous_status: Option<LeaveStatus>,
        new_status: LeaveStatus,
    ) -> LeaveResult<Self> {
        Ok(Self {
            id: utils::new_id("audit_")?,
            leave_request_id: leave_request_id.to_string(),
            action,
            performed_by_id: performed_by_id.to_string(),
            details: details.into(),
            previous_status,
            new_status,
            timestamp: TimeStamp::new(),
            antecedent: None,
            digest: String::new(),
        })
    }

    /// sha256 over the CBOR of this entry with the digest field blanked.
    pub fn compute_digest(&self) -> LeaveResult<String> {
        let mut body = self.clone();
        body.digest = String::new();
        let encoded = encode(&body)?;
        Ok(sha256::digest(&encoded))
    }
}

/// Links `entry` onto the request's chain and writes it inside `tx`.
pub(crate) fn append(tx: &LedgerTx<'_>, mut entry: AuditEntry) -> TxResult<AuditEntry> {
    entry.antecedent = tx.audit_head(&entry.leave_request_id)?;
    entry.digest = abort_on(entry.compute_digest())?;

    tx.put_audit(&utils::sort_key(), &entry)?;
    debug!(
        request_id = %entry.leave_request_id,
        action = entry.action.as_str(),
        digest = %entry.digest,
        "audit entry appended"
    );
    Ok(entry)
}

/// Outcome of re-walking a request's chain, oldest entry first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainCheck {
    Intact { entries: usize },
    Broken { index: usize, entry_id: String },
}

pub fn verify_chain(entries: &[AuditEntry]) -> LeaveResult<ChainCheck> {
    let mut previous: Option<&str> = None;
    for (index, entry) in entries.iter().enumerate() {
        let linked = entry.antecedent.as_deref() == previous;
        if !linked || entry.compute_digest()? != entry.digest {
            return Ok(ChainCheck::Broken {
                index,
                entry_id: entry.id.clone(),
            });
        }
        previous = Some(&entry.digest);
    }
    Ok(ChainCheck::Intact {
        entries: entries.len(),
    })
}

pub(crate) fn newest_first(mut entries: Vec<AuditEntry>) -> Vec<AuditEntry> {
    entries.reverse();
    entries
}

pub(crate) fn require_trail_access(
    owner_id: &str,
    actor: &crate::types::Actor,
) -> LeaveResult<()> {
    use crate::types::Role;
    match actor.role {
        Role::Manager | Role::Hr => Ok(()),
        _ if actor.id == owner_id => Ok(()),
        _ => Err(LeaveError::forbidden(
            "audit trail is visible to the owner, managers and HR only",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chained(n: usize) -> Vec<AuditEntry> {
        let mut previous: Option<String> = None;
        (0..n)
            .map(|i| {
                let mut entry = AuditEntry::new(
                    "leave_test",
                    AuditAction::Created,
                    "emp_1",
                    format!("step {i}"),
                    None,
                    LeaveStatus::Pending,
                )
                .unwrap();
                entry.antecedent = previous.clone();
                entry.digest = entry.compute_digest().unwrap();
                previous = Some(entry.digest.clone());
                entry
            })
            .collect()
    }

    #[test]
    fn intact_chain_verifies() {
        let entries = chained(3);
        assert_eq!(
            verify_chain(&entries).unwrap(),
            ChainCheck::Intact { entries: 3 }
        );
    }

    #[test]
    fn tampered_details_break_the_chain() {
        let mut entries = chained(3);
        entries[1].details = "rewritten".into();
        assert_eq!(
            verify_chain(&entries).unwrap(),
            ChainCheck::Broken {
                index: 1,
                entry_id: entries[1].id.clone()
            }
        );
    }

    #[test]
    fn removed_entry_breaks_the_link() {
        let mut entries = chained(3);
        entries.remove(1);
        assert!(matches!(
            verify_chain(&entries).unwrap(),
            ChainCheck::Broken { index: 1, .. }
        ));
    }
}
