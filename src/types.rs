//! Core value types: time, quantities, roles and the reference entities
use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Sub, SubAssign},
    str::FromStr,
};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::error::{LeaveError, LeaveResult};

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

// `Utc` itself is not `Ord`, so the ordering is spelled out on the instant.
impl PartialOrd for TimeStamp<Utc> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeStamp<Utc> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// Calendar dates travel as days since the common era.
pub mod cbor_date {
    use chrono::{Datelike, NaiveDate};
    use minicbor::{Decoder, Encoder};

    pub fn encode<Ctx, W: minicbor::encode::Write>(
        date: &NaiveDate,
        e: &mut Encoder<W>,
        _: &mut Ctx,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.i32(date.num_days_from_ce())?.ok()
    }

    pub fn decode<'b, Ctx>(
        d: &mut Decoder<'b>,
        _: &mut Ctx,
    ) -> Result<NaiveDate, minicbor::decode::Error> {
        let days = d.i32()?;

        NaiveDate::from_num_days_from_ce_opt(days)
            .ok_or(minicbor::decode::Error::message("calendar date out of range"))
    }
}

/// An exact quantity of leave, counted in half days.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Days(i64);

impl Days {
    pub const ZERO: Days = Days(0);
    pub const HALF: Days = Days(1);

    pub fn whole(days: i64) -> Self {
        Days(days * 2)
    }
    pub fn from_halves(halves: i64) -> Self {
        Days(halves)
    }
    pub fn halves(&self) -> i64 {
        self.0
    }
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 2.0
    }
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
    /// Accepts any finite value that is a multiple of 0.5.
    pub fn from_f64(value: f64) -> LeaveResult<Self> {
        let halves = value * 2.0;
        if !halves.is_finite() || halves.fract() != 0.0 {
            return Err(LeaveError::bad_input(format!(
                "{value} is not a multiple of half a day"
            )));
        }
        Ok(Days(halves as i64))
    }
}

impl FromStr for Days {
    type Err = LeaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| LeaveError::bad_input(format!("'{s}' is not a number of days")))?;
        Days::from_f64(value)
    }
}

impl fmt::Display for Days {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        if abs % 2 == 0 {
            write!(f, "{sign}{}", abs / 2)
        } else {
            write!(f, "{sign}{}.5", abs / 2)
        }
    }
}

impl Add for Days {
    type Output = Days;
    fn add(self, rhs: Days) -> Days {
        Days(self.0 + rhs.0)
    }
}

impl Sub for Days {
    type Output = Days;
    fn sub(self, rhs: Days) -> Days {
        Days(self.0 - rhs.0)
    }
}

impl AddAssign for Days {
    fn add_assign(&mut self, rhs: Days) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Days {
    fn sub_assign(&mut self, rhs: Days) {
        self.0 -= rhs.0;
    }
}

impl Sum for Days {
    fn sum<I: Iterator<Item = Days>>(iter: I) -> Days {
        iter.fold(Days::ZERO, Add::add)
    }
}

impl<C> minicbor::Encode<C> for Days {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.i64(self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Days {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(Days(d.i64()?))
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Role {
    Employee,
    Manager,
    Hr,
    /// A trusted integration allowed to act on behalf of employees resolved by email.
    Service,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Manager => "manager",
            Role::Hr => "hr",
            Role::Service => "service",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated caller as handed over by the identity layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
    pub fn employee(id: impl Into<String>) -> Self {
        Self::new(id, Role::Employee)
    }
    pub fn manager(id: impl Into<String>) -> Self {
        Self::new(id, Role::Manager)
    }
    pub fn hr(id: impl Into<String>) -> Self {
        Self::new(id, Role::Hr)
    }
    pub fn service(id: impl Into<String>) -> Self {
        Self::new(id, Role::Service)
    }
    /// Employees may only see and touch their own requests.
    pub fn may_act_for(&self, employee_id: &str) -> bool {
        self.role != Role::Employee || self.id == employee_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum LeaveStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    ManagerApproved,
    #[n(2)]
    ManagerRejected,
    #[n(3)]
    HrApproved,
    #[n(4)]
    HrRejected,
    #[n(5)]
    Cancelled,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::ManagerApproved => "manager_approved",
            LeaveStatus::ManagerRejected => "manager_rejected",
            LeaveStatus::HrApproved => "hr_approved",
            LeaveStatus::HrRejected => "hr_rejected",
            LeaveStatus::Cancelled => "cancelled",
        }
    }
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LeaveStatus::Pending | LeaveStatus::ManagerApproved)
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaveStatus {
    type Err = LeaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(LeaveStatus::Pending),
            "manager_approved" => Ok(LeaveStatus::ManagerApproved),
            "manager_rejected" => Ok(LeaveStatus::ManagerRejected),
            "hr_approved" => Ok(LeaveStatus::HrApproved),
            "hr_rejected" => Ok(LeaveStatus::HrRejected),
            "cancelled" => Ok(LeaveStatus::Cancelled),
            other => Err(LeaveError::bad_input(format!("unknown status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Employee {
    #[n(0)]
    pub id: String, // bech32 "emp_" id
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct LeaveType {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub description: Option<String>,
    #[n(3)]
    pub color: Option<String>, // display only
    #[n(4)]
    pub active: bool,
}

/// One ledger row per (employee, leave type, year).
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct LeaveBalance {
    #[n(0)]
    pub employee_id: String,
    #[n(1)]
    pub leave_type_id: String,
    #[n(2)]
    pub year: i32,
    #[n(3)]
    pub allocated: Days,
    #[n(4)]
    pub used: Days,
    #[n(5)]
    pub pending: Days,
}

impl LeaveBalance {
    pub fn new(employee_id: &str, leave_type_id: &str, year: i32, allocated: Days) -> Self {
        Self {
            employee_id: employee_id.to_string(),
            leave_type_id: leave_type_id.to_string(),
            year,
            allocated,
            used: Days::ZERO,
            pending: Days::ZERO,
        }
    }
    /// The only balance figure ever compared against requested days.
    pub fn available(&self) -> Days {
        self.allocated - self.used
    }
    pub fn key(&self) -> String {
        balance_key(&self.employee_id, &self.leave_type_id, self.year)
    }
}

pub fn balance_key(employee_id: &str, leave_type_id: &str, year: i32) -> String {
    format!("{employee_id}/{leave_type_id}/{year:04}")
}

/// Inclusive date window used by read-side filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateWindow {
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.to && end >= self.from
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn days_display_half_units() {
        assert_eq!(Days::whole(3).to_string(), "3");
        assert_eq!(Days::from_halves(5).to_string(), "2.5");
        assert_eq!(Days::from_halves(-1).to_string(), "-0.5");
    }

    #[test]
    fn timestamps_order_by_instant() {
        let earlier = TimeStamp::from(DateTime::from_timestamp_nanos(1_000));
        let later = TimeStamp::from(DateTime::from_timestamp_nanos(2_000));
        assert!(earlier < later);
        assert_eq!(later.cmp(&earlier), std::cmp::Ordering::Greater);
        assert_eq!(earlier.clone().max(later.clone()), later);
    }

    #[test]
    fn calendar_dates_survive_cbor() {
        #[derive(minicbor::Encode, minicbor::Decode, Debug, PartialEq)]
        struct Dated {
            #[n(0)]
            #[cbor(with = "crate::types::cbor_date")]
            on: NaiveDate,
        }
        let dated = Dated {
            on: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
        };
        let bytes = minicbor::to_vec(&dated).unwrap();
        assert_eq!(minicbor::decode::<Dated>(&bytes).unwrap(), dated);
    }

    #[test]
    fn days_parse_rejects_quarter_days() {
        assert_eq!("7.5".parse::<Days>().unwrap(), Days::from_halves(15));
        assert!("1.25".parse::<Days>().is_err());
        assert!("abc".parse::<Days>().is_err());
        assert_eq!(Days::from_halves(-1).as_f64(), -0.5);
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            LeaveStatus::Pending,
            LeaveStatus::ManagerApproved,
            LeaveStatus::ManagerRejected,
            LeaveStatus::HrApproved,
            LeaveStatus::HrRejected,
            LeaveStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<LeaveStatus>().unwrap(), status);
        }
    }

    #[test]
    fn employees_may_only_act_for_themselves() {
        assert!(Actor::employee("emp_a").may_act_for("emp_a"));
        assert!(!Actor::employee("emp_a").may_act_for("emp_b"));
        assert!(Actor::hr("emp_h").may_act_for("emp_b"));
    }
}
