//! Read-side filtering, sorting and pagination over persisted requests
use std::cmp::Ordering;

use crate::error::{LeaveError, LeaveResult};
use crate::request::LeaveRequest;
use crate::service::LeaveService;
use crate::types::{Actor, DateWindow, LeaveStatus, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    StartDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub employee_id: Option<String>,
    pub status: Option<LeaveStatus>,
    pub leave_type_id: Option<String>,
    /// Keeps requests whose range overlaps the window.
    pub window: Option<DateWindow>,
    pub sort: SortField,
    pub order: SortOrder,
    pub page: Option<u32>,     // 1-based
    pub per_page: Option<u32>, // clamped to the configured maximum
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: usize,
}

impl RequestFilter {
    fn matches(&self, request: &LeaveRequest) -> bool {
        self.employee_id
            .as_deref()
            .is_none_or(|id| request.employee_id == id)
            && self.status.is_none_or(|s| request.status == s)
            && self
                .leave_type_id
                .as_deref()
                .is_none_or(|id| request.leave_type_id == id)
            && self
                .window
                .is_none_or(|w| w.overlaps(request.start_date, request.end_date))
    }

    fn compare(&self, a: &LeaveRequest, b: &LeaveRequest) -> Ordering {
        let ordering = match self.sort {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::StartDate => a
                .start_date
                .cmp(&b.start_date)
                .then_with(|| a.created_at.cmp(&b.created_at)),
        };
        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

impl LeaveService {
    /// Employees only ever see their own requests.
    pub fn list_requests(&self, actor: &Actor, mut filter: RequestFilter) -> LeaveResult<Page<LeaveRequest>> {
        if actor.role == Role::Employee {
            match filter.employee_id.as_deref() {
                Some(id) if id != actor.id => {
                    return Err(LeaveError::forbidden(
                        "employees may only list their own requests",
                    ));
                }
                _ => filter.employee_id = Some(actor.id.clone()),
            }
        }

        let per_page = filter
            .per_page
            .unwrap_or(self.config.page_size)
            .clamp(1, self.config.max_page_size.max(1));
        let page = filter.page.unwrap_or(1).max(1);
        let offset = (page as usize - 1) * per_page as usize;

        let mut matching: Vec<LeaveRequest> = self
            .store
            .requests()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        matching.sort_by(|a, b| filter.compare(a, b));

        let total = matching.len();
        let data = matching
            .into_iter()
            .skip(offset)
            .take(per_page as usize)
            .collect();

        Ok(Page {
            data,
            page,
            per_page,
            total,
        })
    }

    pub fn request(&self, actor: &Actor, request_id: &str) -> LeaveResult<LeaveRequest> {
        let request = self
            .store
            .request(request_id)?
            .ok_or_else(|| LeaveError::not_found(format!("leave request {request_id}")))?;
        if !actor.may_act_for(&request.employee_id) {
            return Err(LeaveError::forbidden("not your leave request"));
        }
        Ok(request)
    }
}
