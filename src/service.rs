//! Service layer API for leave workflow operations
use std::sync::Arc;

use chrono::{Datelike, Utc};
use tracing::{info, warn};

use crate::audit::{self, AuditAction, AuditEntry, ChainCheck};
use crate::config::LeaveConfig;
use crate::error::{LeaveError, LeaveResult};
use crate::ledger::{BalanceLedger, LedgerKey};
use crate::notify::{LeaveEvent, NoopNotifier, Notification, Notifier};
use crate::request::{LeaveRequest, LeaveRequestPatch, NewLeaveRequest};
use crate::store::{LeaveStore, abort_on};
use crate::types::{Actor, Days, Employee, LeaveBalance, LeaveStatus, LeaveType, Role, TimeStamp};
use crate::utils;
use crate::workflow::{self, LeaveAction, Transition};

pub struct LeaveService {
    pub(crate) store: LeaveStore,
    pub(crate) ledger: BalanceLedger,
    pub(crate) config: LeaveConfig,
    notifier: Box<dyn Notifier>,
}

/// Result of seeding an employee's balances for a year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutcome {
    pub success: bool,
    pub message: String,
    pub balances: Vec<LeaveBalance>,
}

impl LeaveService {
    pub fn new(instance: Arc<sled::Db>, config: LeaveConfig) -> LeaveResult<Self> {
        Ok(Self {
            store: LeaveStore::new(instance)?,
            ledger: BalanceLedger::new(config.missing_balance),
            config,
            notifier: Box::new(NoopNotifier),
        })
    }

    /// Opens the database at `config.db_path`.
    pub fn open(config: LeaveConfig) -> LeaveResult<Self> {
        info!(path = %config.db_path, "opening leave database");
        let db = sled::open(&config.db_path)?;
        Self::new(Arc::new(db), config)
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn store(&self) -> &LeaveStore {
        &self.store
    }

    pub fn config(&self) -> &LeaveConfig {
        &self.config
    }

    pub fn register_employee(&self, name: &str, email: &str) -> LeaveResult<Employee> {
        let email = email.trim();
        if name.trim().is_empty() || !email.contains('@') {
            return Err(LeaveError::bad_input("employee needs a name and a valid email"));
        }
        let employee = Employee {
            id: utils::new_id("emp_")?,
            name: name.trim().to_string(),
            email: email.to_string(),
        };
        self.store.insert_employee(&employee)?;
        info!(employee_id = %employee.id, "employee registered");
        Ok(employee)
    }

    pub fn employee(&self, id: &str) -> LeaveResult<Employee> {
        self.store
            .employee(id)?
            .ok_or_else(|| LeaveError::not_found(format!("employee {id}")))
    }

    pub fn create_leave_type(
        &self,
        name: &str,
        description: Option<&str>,
        color: Option<&str>,
    ) -> LeaveResult<LeaveType> {
        if name.trim().is_empty() {
            return Err(LeaveError::bad_input("leave type name is empty"));
        }
        let leave_type = LeaveType {
            id: utils::new_id("ltype_")?,
            name: name.trim().to_string(),
            description: description.map(str::to_string),
            color: color.map(str::to_string),
            active: true,
        };
        self.store.insert_leave_type(&leave_type)?;
        info!(leave_type_id = %leave_type.id, name = %leave_type.name, "leave type created");
        Ok(leave_type)
    }

    pub fn set_leave_type_active(&self, id: &str, active: bool) -> LeaveResult<LeaveType> {
        let mut leave_type = self.leave_type(id)?;
        leave_type.active = active;
        self.store.put_leave_type(&leave_type)?;
        Ok(leave_type)
    }

    pub fn leave_type(&self, id: &str) -> LeaveResult<LeaveType> {
        self.store
            .leave_type(id)?
            .ok_or_else(|| LeaveError::not_found(format!("leave type {id}")))
    }

    pub fn leave_types(&self) -> LeaveResult<Vec<LeaveType>> {
        self.store.leave_types()
    }

    pub fn active_leave_types(&self) -> LeaveResult<Vec<LeaveType>> {
        Ok(self
            .store
            .leave_types()?
            .into_iter()
            .filter(|t| t.active)
            .collect())
    }

    /// Seeds one balance per active leave type. Existing rows keep `used`.
    pub fn initialize_balances(
        &self,
        employee_id: &str,
        year: Option<i32>,
        default_allocation: Option<Days>,
    ) -> LeaveResult<InitOutcome> {
        self.employee(employee_id)?;

        let allocation = default_allocation.unwrap_or(self.config.default_allocation);
        if allocation.is_negative() {
            return Err(LeaveError::bad_input("allocation cannot be negative"));
        }
        let year = year.unwrap_or_else(|| Utc::now().year());

        let active = self.active_leave_types()?;
        if active.is_empty() {
            return Ok(InitOutcome {
                success: false,
                message: "No active leave types found".to_string(),
                balances: vec![],
            });
        }

        let balances = self.store.transaction(|tx| {
            active
                .iter()
                .map(|leave_type| {
                    self.ledger.initialize(
                        tx,
                        LedgerKey::new(employee_id, &leave_type.id, year),
                        allocation,
                    )
                })
                .collect::<Result<Vec<_>, _>>()
        })?;

        info!(employee_id, year, count = balances.len(), allocation = %allocation, "balances initialized");
        Ok(InitOutcome {
            success: true,
            message: format!("Initialized {} leave balance(s) for {year}", balances.len()),
            balances,
        })
    }

    pub fn balances_for(&self, employee_id: &str, year: i32) -> LeaveResult<Vec<LeaveBalance>> {
        self.store.balances_for(employee_id, year)
    }

    pub fn available_for(&self, employee_id: &str, leave_type_id: &str, year: i32) -> LeaveResult<Days> {
        self.store.transaction(|tx| {
            self.ledger
                .available_for(tx, LedgerKey::new(employee_id, leave_type_id, year))
        })
    }

    /// Creates a `pending` request. The ledger is only reserved, not debited.
    pub fn create_leave_request(
        &self,
        actor: &Actor,
        draft: NewLeaveRequest,
    ) -> LeaveResult<LeaveRequest> {
        let draft = draft.validate_and_finalise()?;
        if !actor.may_act_for(&draft.employee_id) {
            return Err(LeaveError::forbidden(
                "employees may only request leave for themselves",
            ));
        }
        self.employee(&draft.employee_id)?;
        self.leave_type(&draft.leave_type_id)?;

        let id = utils::new_id("leave_")?;
        let days = draft.days;

        let request = self.store.transaction(|tx| {
            let key = LedgerKey::new(&draft.employee_id, &draft.leave_type_id, draft.year);
            let balance = self.ledger.require(tx, key)?;
            abort_on(BalanceLedger::ensure_available(&balance, days))?;

            let request = draft.clone().into_request(id.clone(), days, None);
            tx.put_request(&request)?;
            self.ledger.reserve(tx, key, days)?;
            audit::append(
                tx,
                abort_on(AuditEntry::new(
                    &request.id,
                    AuditAction::Created,
                    &actor.id,
                    format!(
                        "Requested {days} day(s) from {} to {}",
                        request.start_date, request.end_date
                    ),
                    None,
                    LeaveStatus::Pending,
                ))?,
            )?;
            Ok(request)
        })?;

        info!(request_id = %request.id, employee_id = %request.employee_id, days = %days, "leave request created");
        self.notify(LeaveEvent::Submitted, &request, Some(actor));
        Ok(request)
    }

    /// Owner-only edit of a pending request. Balance is not re-priced.
    pub fn update_leave_request(
        &self,
        actor: &Actor,
        request_id: &str,
        patch: LeaveRequestPatch,
    ) -> LeaveResult<LeaveRequest> {
        if patch.is_empty() {
            return Err(LeaveError::bad_input("nothing to update"));
        }

        self.store.transaction(|tx| {
            let mut request = tx.request(request_id)?;
            if actor.role != Role::Employee || actor.id != request.employee_id {
                return abort_on(Err(LeaveError::forbidden(
                    "only the requesting employee may edit a leave request",
                )));
            }
            if request.status != LeaveStatus::Pending {
                return abort_on(Err(LeaveError::forbidden(format!(
                    "a {} request can no longer be edited",
                    request.status
                ))));
            }
            if request.prepaid.is_some() && patch.touches_days() {
                return abort_on(Err(LeaveError::forbidden(
                    "batch requests were debited up front, their days cannot be edited",
                )));
            }

            let changed = abort_on(patch.apply_to(&mut request))?;
            if changed.is_empty() {
                return Ok(request);
            }
            tx.put_request(&request)?;
            audit::append(
                tx,
                abort_on(AuditEntry::new(
                    &request.id,
                    AuditAction::Updated,
                    &actor.id,
                    format!("Updated {}", changed.join(", ")),
                    Some(request.status),
                    request.status,
                ))?,
            )?;
            Ok(request)
        })
    }

    /// Applies whichever approval row the actor's role selects.
    pub fn approve(
        &self,
        request_id: &str,
        actor: &Actor,
        comment: Option<&str>,
    ) -> LeaveResult<LeaveRequest> {
        self.transition(request_id, actor, LeaveAction::Approve, comment)
    }

    /// Applies whichever rejection row the actor's role selects. A comment is mandatory.
    pub fn reject(&self, request_id: &str, actor: &Actor, comment: &str) -> LeaveResult<LeaveRequest> {
        self.transition(request_id, actor, LeaveAction::Reject, Some(comment))
    }

    pub fn manager_approve(
        &self,
        request_id: &str,
        actor: &Actor,
        comment: Option<&str>,
    ) -> LeaveResult<LeaveRequest> {
        require_role(actor, Role::Manager)?;
        self.approve(request_id, actor, comment)
    }

    pub fn manager_reject(&self, request_id: &str, actor: &Actor, comment: &str) -> LeaveResult<LeaveRequest> {
        require_comment(Some(comment))?;
        require_role(actor, Role::Manager)?;
        self.reject(request_id, actor, comment)
    }

    pub fn hr_approve(
        &self,
        request_id: &str,
        actor: &Actor,
        comment: Option<&str>,
    ) -> LeaveResult<LeaveRequest> {
        require_role(actor, Role::Hr)?;
        self.approve(request_id, actor, comment)
    }

    pub fn hr_reject(&self, request_id: &str, actor: &Actor, comment: &str) -> LeaveResult<LeaveRequest> {
        require_comment(Some(comment))?;
        require_role(actor, Role::Hr)?;
        self.reject(request_id, actor, comment)
    }

    pub fn cancel(&self, request_id: &str, actor: &Actor) -> LeaveResult<LeaveRequest> {
        self.transition(request_id, actor, LeaveAction::Cancel, None)
    }

    fn transition(
        &self,
        request_id: &str,
        actor: &Actor,
        action: LeaveAction,
        comment: Option<&str>,
    ) -> LeaveResult<LeaveRequest> {
        let comment = match action {
            LeaveAction::Reject => Some(require_comment(comment)?),
            _ => comment.map(str::trim).filter(|c| !c.is_empty()),
        };

        let (request, transition) = self.store.transaction(|tx| {
            let mut request = tx.request(request_id)?;
            let previous = request.status;
            let transition = abort_on(workflow::resolve(previous, actor.role, action))?;

            if transition == Transition::Cancel && !actor.may_act_for(&request.employee_id) {
                return abort_on(Err(LeaveError::forbidden(
                    "employees may only cancel their own requests",
                )));
            }

            let key = LedgerKey::new(&request.employee_id, &request.leave_type_id, request.year);
            let now = TimeStamp::new();
            match transition {
                Transition::ManagerApprove | Transition::ManagerReject => {
                    request.manager_id = Some(actor.id.clone());
                    request.manager_comment = comment.map(str::to_string);
                    request.manager_action_at = Some(now);
                }
                Transition::HrApprove | Transition::HrReject => {
                    request.hr_id = Some(actor.id.clone());
                    request.hr_comment = comment.map(str::to_string);
                    request.hr_action_at = Some(now);
                }
                Transition::Cancel => {}
            }

            // The reservation ends once the request is granted or withdrawn.
            let settles = transition == Transition::HrApprove || transition.withdraws();
            if settles && request.reserved > Days::ZERO {
                self.ledger.release(tx, key, request.reserved)?;
                request.reserved = Days::ZERO;
            }

            let mut details = String::new();
            if transition == Transition::HrApprove && request.prepaid.is_none() {
                let days = request.consumed_days();
                details = match self.ledger.checked_debit(tx, key, days)? {
                    Some(balance) => {
                        format!("Debited {days} day(s), {} remaining", balance.available())
                    }
                    None => format!("No balance row, {days} day(s) not debited"),
                };
            } else if transition.withdraws() {
                if let Some(days) = request.prepaid.take() {
                    self.ledger.credit(tx, key, days)?;
                    details = format!("Credited back {days} pre-debited day(s)");
                }
            }

            request.status = transition.target();
            tx.put_request(&request)?;

            let summary = match comment {
                Some(comment) if details.is_empty() => comment.to_string(),
                Some(comment) => format!("{details}; {comment}"),
                None => details,
            };
            audit::append(
                tx,
                abort_on(AuditEntry::new(
                    &request.id,
                    transition.audit_action(),
                    &actor.id,
                    summary,
                    Some(previous),
                    request.status,
                ))?,
            )?;
            Ok((request, transition))
        })?;

        info!(
            request_id = %request.id,
            actor_id = %actor.id,
            role = %actor.role,
            status = %request.status,
            "leave request transitioned"
        );
        self.notify(event_for(transition), &request, Some(actor));
        Ok(request)
    }

    /// Audit entries for a request, newest first.
    pub fn audit_trail(&self, request_id: &str, actor: &Actor) -> LeaveResult<Vec<AuditEntry>> {
        let request = self
            .store
            .request(request_id)?
            .ok_or_else(|| LeaveError::not_found(format!("leave request {request_id}")))?;
        audit::require_trail_access(&request.employee_id, actor)?;
        Ok(audit::newest_first(self.store.audit_entries(request_id)?))
    }

    pub fn verify_trail(&self, request_id: &str) -> LeaveResult<ChainCheck> {
        let check = audit::verify_chain(&self.store.audit_entries(request_id)?)?;
        if let ChainCheck::Broken { index, ref entry_id } = check {
            warn!(request_id, index, entry_id = %entry_id, "audit chain broken");
        }
        Ok(check)
    }

    /// Best effort: a failed delivery is logged and otherwise ignored.
    pub(crate) fn notify(&self, event: LeaveEvent, request: &LeaveRequest, actor: Option<&Actor>) {
        let employee = match self.store.employee(&request.employee_id) {
            Ok(Some(employee)) => employee,
            Ok(None) => {
                warn!(request_id = %request.id, "notification skipped, employee missing");
                return;
            }
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "notification skipped");
                return;
            }
        };
        let notification = Notification {
            event,
            request,
            employee: &employee,
            actor,
        };
        if let Err(e) = self.notifier.notify(&notification) {
            warn!(request_id = %request.id, ?event, error = %e, "notification delivery failed");
        }
    }
}

fn event_for(transition: Transition) -> LeaveEvent {
    match transition {
        Transition::ManagerApprove => LeaveEvent::ApprovedByManager,
        Transition::ManagerReject => LeaveEvent::RejectedByManager,
        Transition::HrApprove => LeaveEvent::ApprovedByHr,
        Transition::HrReject => LeaveEvent::RejectedByHr,
        Transition::Cancel => LeaveEvent::Cancelled,
    }
}

fn require_role(actor: &Actor, role: Role) -> LeaveResult<()> {
    if actor.role != role {
        return Err(LeaveError::forbidden(format!("{role} only")));
    }
    Ok(())
}

fn require_comment(comment: Option<&str>) -> LeaveResult<&str> {
    comment
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| LeaveError::bad_input("a rejection comment is required"))
}
