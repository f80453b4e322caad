//! All-or-nothing creation of single-day requests against one leave type
use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::info;

use crate::audit::{self, AuditAction, AuditEntry};
use crate::error::{LeaveError, LeaveResult};
use crate::ledger::{BalanceLedger, LedgerKey};
use crate::notify::LeaveEvent;
use crate::request::{LeaveRequest, NewLeaveRequest, ValidDraft};
use crate::service::LeaveService;
use crate::store::abort_on;
use crate::types::{Actor, Days, Employee, LeaveStatus, LeaveType, Role};
use crate::utils;

/// Who the batch is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchTarget {
    Employee(String),
    /// Resolved by email; only a service principal may use this.
    Email(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchDay {
    pub date: NaiveDate,
    pub half_day: bool,
}

impl BatchDay {
    pub fn full(date: NaiveDate) -> Self {
        Self {
            date,
            half_day: false,
        }
    }
    pub fn half(date: NaiveDate) -> Self {
        Self {
            date,
            half_day: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveBatch {
    pub target: BatchTarget,
    /// Falls back to the active type whose name contains "annual".
    pub leave_type_name: Option<String>,
    pub days: Vec<BatchDay>,
    pub year: i32,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub requests: Vec<LeaveRequest>,
    pub total_days: Days,
    pub remaining_balance: Days,
}

impl LeaveService {
    /// Validates the whole set against the balance, then writes every request,
    /// its audit entry and one aggregate debit in a single transaction.
    ///
    /// Unlike single requests, a batch debits the ledger at creation; the rows are
    /// record what was `prepaid` so HR approval does not debit them again.
    pub fn create_leave_batch(&self, actor: &Actor, batch: LeaveBatch) -> LeaveResult<BatchOutcome> {
        if batch.days.is_empty() {
            return Err(LeaveError::bad_input("a batch needs at least one date"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = batch.days.iter().find(|d| !seen.insert(d.date)) {
            return Err(LeaveError::bad_input(format!(
                "date {} appears more than once",
                dup.date
            )));
        }

        let employee = self.resolve_batch_target(actor, &batch.target)?;
        let leave_type = self.resolve_batch_leave_type(batch.leave_type_name.as_deref())?;

        let drafts = batch
            .days
            .iter()
            .map(|day| {
                let mut draft = NewLeaveRequest::new()
                    .set_employee(&employee.id)
                    .set_leave_type(&leave_type.id)
                    .set_dates(day.date, day.date)
                    .set_half_day(day.half_day)
                    .set_year(batch.year);
                if let Some(reason) = &batch.reason {
                    draft = draft.set_reason(reason);
                }
                draft.validate_and_finalise()
            })
            .collect::<LeaveResult<Vec<ValidDraft>>>()?;
        let total_days: Days = drafts.iter().map(|d| d.days).sum();
        let ids = drafts
            .iter()
            .map(|_| utils::new_id("leave_"))
            .collect::<LeaveResult<Vec<_>>>()?;

        let (requests, remaining_balance) = self.store.transaction(|tx| {
            let key = LedgerKey::new(&employee.id, &leave_type.id, batch.year);
            let balance = self.ledger.require(tx, key)?;
            abort_on(BalanceLedger::ensure_available(&balance, total_days))?;

            let mut requests = Vec::with_capacity(drafts.len());
            for (draft, id) in drafts.iter().zip(&ids) {
                let request = draft.clone().into_request(id.clone(), Days::ZERO, Some(draft.days));
                tx.put_request(&request)?;
                audit::append(
                    tx,
                    abort_on(AuditEntry::new(
                        &request.id,
                        AuditAction::Created,
                        &actor.id,
                        format!(
                            "Batch request for {} ({} day(s), pre-debited)",
                            request.start_date, draft.days
                        ),
                        None,
                        LeaveStatus::Pending,
                    ))?,
                )?;
                requests.push(request);
            }

            self.ledger.checked_debit(tx, key, total_days)?;
            Ok((requests, balance.available() - total_days))
        })?;

        info!(
            employee_id = %employee.id,
            leave_type = %leave_type.name,
            count = requests.len(),
            total_days = %total_days,
            remaining = %remaining_balance,
            "leave batch created"
        );
        for request in &requests {
            self.notify(LeaveEvent::Submitted, request, Some(actor));
        }

        Ok(BatchOutcome {
            requests,
            total_days,
            remaining_balance,
        })
    }

    fn resolve_batch_target(&self, actor: &Actor, target: &BatchTarget) -> LeaveResult<Employee> {
        match target {
            BatchTarget::Employee(id) => {
                if !actor.may_act_for(id) {
                    return Err(LeaveError::forbidden(
                        "employees may only request leave for themselves",
                    ));
                }
                self.employee(id)
            }
            BatchTarget::Email(email) => {
                if actor.role != Role::Service {
                    return Err(LeaveError::forbidden(
                        "only a service principal may resolve employees by email",
                    ));
                }
                self.store
                    .employee_by_email(email)?
                    .ok_or_else(|| LeaveError::not_found(format!("employee with email {email}")))
            }
        }
    }

    fn resolve_batch_leave_type(&self, name: Option<&str>) -> LeaveResult<LeaveType> {
        match name {
            Some(name) => self
                .store
                .leave_type_by_name(name)?
                .ok_or_else(|| LeaveError::not_found(format!("leave type '{name}'"))),
            None => self
                .active_leave_types()?
                .into_iter()
                .find(|t| t.name.to_lowercase().contains("annual"))
                .ok_or_else(|| LeaveError::not_found("active annual leave type")),
        }
    }
}
