//! Listing, filtering and pagination of leave history.

use std::sync::Arc;

use chrono::NaiveDate;
use leave_ledger::{
    ErrorKind, LeaveService,
    config::LeaveConfig,
    history::{RequestFilter, SortField, SortOrder},
    request::{LeaveRequest, NewLeaveRequest},
    types::{Actor, DateWindow, Days, LeaveStatus},
};

const YEAR: i32 = 2025;

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(YEAR, m, d).unwrap()
}

struct Office {
    service: LeaveService,
    ada: String,
    grace: String,
    annual: String,
    sick: String,
}

fn office() -> Office {
    let db = sled::Config::new().temporary(true).open().unwrap();
    let config = LeaveConfig {
        page_size: 2,
        max_page_size: 3,
        ..LeaveConfig::default()
    };
    let service = LeaveService::new(Arc::new(db), config).unwrap();
    let ada = service.register_employee("Ada", "ada@example.com").unwrap().id;
    let grace = service.register_employee("Grace", "grace@example.com").unwrap().id;
    let annual = service.create_leave_type("Annual", None, None).unwrap().id;
    let sick = service.create_leave_type("Sick", None, None).unwrap().id;
    for employee in [&ada, &grace] {
        service
            .initialize_balances(employee, Some(YEAR), Some(Days::whole(30)))
            .unwrap();
    }
    Office {
        service,
        ada,
        grace,
        annual,
        sick,
    }
}

impl Office {
    fn file(&self, employee: &str, leave_type: &str, start: NaiveDate, end: NaiveDate) -> LeaveRequest {
        let draft = NewLeaveRequest::new()
            .set_employee(employee)
            .set_leave_type(leave_type)
            .set_dates(start, end)
            .set_year(YEAR);
        self.service
            .create_leave_request(&Actor::employee(employee), draft)
            .unwrap()
    }
}

fn ids(requests: &[LeaveRequest]) -> Vec<&str> {
    requests.iter().map(|r| r.id.as_str()).collect()
}

#[test]
fn employees_are_confined_to_their_own_history() {
    let office = office();
    let mine = office.file(&office.ada, &office.annual, date(3, 3), date(3, 4));
    office.file(&office.grace, &office.annual, date(3, 3), date(3, 4));

    let ada = Actor::employee(office.ada.clone());
    let page = office
        .service
        .list_requests(&ada, RequestFilter::default())
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(ids(&page.data), vec![mine.id.as_str()]);

    let snooping = RequestFilter {
        employee_id: Some(office.grace.clone()),
        ..RequestFilter::default()
    };
    let err = office.service.list_requests(&ada, snooping).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let everyone = office
        .service
        .list_requests(&Actor::hr("emp_hr"), RequestFilter::default())
        .unwrap();
    assert_eq!(everyone.total, 2);

    let err = office.service.request(&Actor::employee(office.grace.clone()), &mine.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(office.service.request(&ada, &mine.id).unwrap(), mine);
}

#[test]
fn filters_combine() {
    let office = office();
    let march = office.file(&office.ada, &office.annual, date(3, 3), date(3, 5));
    let april = office.file(&office.ada, &office.annual, date(4, 7), date(4, 8));
    let sick = office.file(&office.ada, &office.sick, date(3, 10), date(3, 10));
    office
        .service
        .approve(&march.id, &Actor::manager("emp_manager"), None)
        .unwrap();

    let hr = Actor::hr("emp_hr");
    let by_status = RequestFilter {
        status: Some(LeaveStatus::Pending),
        sort: SortField::StartDate,
        order: SortOrder::Asc,
        ..RequestFilter::default()
    };
    let page = office.service.list_requests(&hr, by_status).unwrap();
    assert_eq!(ids(&page.data), vec![sick.id.as_str(), april.id.as_str()]);
    assert_eq!(page.total, 2);

    let by_type_and_window = RequestFilter {
        leave_type_id: Some(office.annual.clone()),
        window: Some(DateWindow {
            from: date(3, 5),
            to: date(3, 31),
        }),
        ..RequestFilter::default()
    };
    let page = office.service.list_requests(&hr, by_type_and_window).unwrap();
    assert_eq!(ids(&page.data), vec![march.id.as_str()]);

    let april_only = RequestFilter {
        window: Some(DateWindow {
            from: date(4, 1),
            to: date(4, 30),
        }),
        ..RequestFilter::default()
    };
    let page = office.service.list_requests(&hr, april_only).unwrap();
    assert_eq!(ids(&page.data), vec![april.id.as_str()]);
}

#[test]
fn pages_use_configured_size_and_clamp() {
    let office = office();
    let mut filed = Vec::new();
    for day in [3, 4, 5, 6, 7] {
        filed.push(office.file(&office.ada, &office.annual, date(3, day), date(3, day)));
    }
    let hr = Actor::hr("emp_hr");

    // default page size, newest first
    let first = office
        .service
        .list_requests(&hr, RequestFilter::default())
        .unwrap();
    assert_eq!(first.per_page, 2);
    assert_eq!(first.total, 5);
    assert_eq!(ids(&first.data), vec![filed[4].id.as_str(), filed[3].id.as_str()]);

    let last = RequestFilter {
        page: Some(3),
        ..RequestFilter::default()
    };
    let page = office.service.list_requests(&hr, last).unwrap();
    assert_eq!(ids(&page.data), vec![filed[0].id.as_str()]);

    let oversized = RequestFilter {
        per_page: Some(50),
        page: Some(0),
        ..RequestFilter::default()
    };
    let page = office.service.list_requests(&hr, oversized).unwrap();
    assert_eq!(page.per_page, 3);
    assert_eq!(page.page, 1);
    assert_eq!(page.data.len(), 3);

    let beyond = RequestFilter {
        page: Some(9),
        ..RequestFilter::default()
    };
    let page = office.service.list_requests(&hr, beyond).unwrap();
    assert!(page.data.is_empty());
    assert_eq!(page.total, 5);
}
