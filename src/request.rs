//! Leave request records and the draft used to create them
use chrono::{NaiveDate, Utc};

use crate::error::{LeaveError, LeaveResult};
use crate::types::{Days, LeaveStatus, TimeStamp};
use crate::working_days::consumed_days;

// Stored under its id in the `requests` tree. Only the workflow mutates it.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct LeaveRequest {
    #[n(0)]
    pub id: String, // bech32 "leave_" id
    #[n(1)]
    pub employee_id: String,
    #[n(2)]
    pub leave_type_id: String,
    #[n(3)]
    #[cbor(with = "crate::types::cbor_date")]
    pub start_date: NaiveDate,
    #[n(4)]
    #[cbor(with = "crate::types::cbor_date")]
    pub end_date: NaiveDate,
    #[n(5)]
    pub half_day: bool,
    #[n(6)]
    pub reason: Option<String>,
    #[n(7)]
    pub status: LeaveStatus,
    #[n(8)]
    pub manager_id: Option<String>,
    #[n(9)]
    pub manager_comment: Option<String>,
    #[n(10)]
    pub manager_action_at: Option<TimeStamp<Utc>>,
    #[n(11)]
    pub hr_id: Option<String>,
    #[n(12)]
    pub hr_comment: Option<String>,
    #[n(13)]
    pub hr_action_at: Option<TimeStamp<Utc>>,
    #[n(14)]
    pub created_at: TimeStamp<Utc>,
    #[n(15)]
    pub year: i32, // ledger year this request draws from
    #[n(16)]
    pub reserved: Days, // held in the balance's `pending` counter
    #[n(17)]
    pub prepaid: Option<Days>, // debited at creation on the batch path
}

impl LeaveRequest {
    pub fn consumed_days(&self) -> Days {
        consumed_days(self.start_date, self.end_date, self.half_day)
    }
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// A request as submitted, before it has an id or a status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewLeaveRequest {
    employee_id: Option<String>,
    leave_type_id: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    half_day: bool,
    reason: Option<String>,
    year: Option<i32>,
}

/// A validated draft, ready to be checked against the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDraft {
    pub employee_id: String,
    pub leave_type_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub half_day: bool,
    pub reason: Option<String>,
    pub year: i32,
    pub days: Days,
}

impl NewLeaveRequest {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_employee(mut self, employee_id: impl Into<String>) -> Self {
        self.employee_id = Some(employee_id.into());
        self
    }
    pub fn set_leave_type(mut self, leave_type_id: impl Into<String>) -> Self {
        self.leave_type_id = Some(leave_type_id.into());
        self
    }
    pub fn set_dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }
    pub fn set_half_day(mut self, half_day: bool) -> Self {
        self.half_day = half_day;
        self
    }
    pub fn set_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
    /// Ledger year to draw from. Required so tests and callers can pin it.
    pub fn set_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }
    pub fn employee_id(&self) -> Option<&str> {
        self.employee_id.as_deref()
    }

    /// Checks required fields and date ordering, and prices the range.
    pub fn validate_and_finalise(self) -> LeaveResult<ValidDraft> {
        let employee_id = self
            .employee_id
            .ok_or_else(|| LeaveError::bad_input("employee is not set"))?;
        let leave_type_id = self
            .leave_type_id
            .ok_or_else(|| LeaveError::bad_input("leave type is not set"))?;
        let (start_date, end_date) = match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => (start, end),
            _ => return Err(LeaveError::bad_input("start and end dates are required")),
        };
        if start_date > end_date {
            return Err(LeaveError::bad_input(format!(
                "start date {start_date} is after end date {end_date}"
            )));
        }
        let year = self
            .year
            .ok_or_else(|| LeaveError::bad_input("ledger year is not set"))?;

        let reason = self
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        Ok(ValidDraft {
            days: consumed_days(start_date, end_date, self.half_day),
            employee_id,
            leave_type_id,
            start_date,
            end_date,
            half_day: self.half_day,
            reason,
            year,
        })
    }
}

impl ValidDraft {
    pub fn into_request(self, id: String, reserved: Days, prepaid: Option<Days>) -> LeaveRequest {
        LeaveRequest {
            id,
            employee_id: self.employee_id,
            leave_type_id: self.leave_type_id,
            start_date: self.start_date,
            end_date: self.end_date,
            half_day: self.half_day,
            reason: self.reason,
            status: LeaveStatus::Pending,
            manager_id: None,
            manager_comment: None,
            manager_action_at: None,
            hr_id: None,
            hr_comment: None,
            hr_action_at: None,
            created_at: TimeStamp::new(),
            year: self.year,
            reserved,
            prepaid,
        }
    }
}

/// Fields an employee may edit while their request is still pending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaveRequestPatch {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub half_day: Option<bool>,
    pub reason: Option<String>,
}

impl LeaveRequestPatch {
    /// Dates or the half-day flag, anything that re-prices the request.
    pub fn touches_days(&self) -> bool {
        self.start_date.is_some() || self.end_date.is_some() || self.half_day.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.start_date.is_none()
            && self.end_date.is_none()
            && self.half_day.is_none()
            && self.reason.is_none()
    }

    /// Applies the patch, keeping `start_date <= end_date`.
    pub fn apply_to(&self, request: &mut LeaveRequest) -> LeaveResult<Vec<&'static str>> {
        let start = self.start_date.unwrap_or(request.start_date);
        let end = self.end_date.unwrap_or(request.end_date);
        if start > end {
            return Err(LeaveError::bad_input(format!(
                "start date {start} is after end date {end}"
            )));
        }

        let mut changed = vec![];
        if start != request.start_date {
            request.start_date = start;
            changed.push("start_date");
        }
        if end != request.end_date {
            request.end_date = end;
            changed.push("end_date");
        }
        if let Some(half_day) = self.half_day {
            if half_day != request.half_day {
                request.half_day = half_day;
                changed.push("half_day");
            }
        }
        if let Some(reason) = &self.reason {
            let reason = Some(reason.trim().to_string()).filter(|r| !r.is_empty());
            if reason != request.reason {
                request.reason = reason;
                changed.push("reason");
            }
        }
        Ok(changed)
    }
}
