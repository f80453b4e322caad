//! Allocated / used / pending counters per (employee, leave type, year)
//!
//! Every mutation here runs inside a [`LedgerTx`], so writes to one balance row
//! are serialized by the store's transaction retry.
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{LeaveError, LeaveResult};
use crate::store::{LedgerTx, TxResult, abort_on};
use crate::types::{Days, LeaveBalance};

/// What a debit or credit does when the balance row does not exist.
///
/// Request creation and batch creation both require the row, and rows are
/// never deleted, so through [`crate::LeaveService`] a missing row only shows
/// up for data written outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingBalancePolicy {
    /// Fail with `NOT_FOUND`.
    #[default]
    Fail,
    /// Update nothing and carry on.
    Ignore,
}

impl FromStr for MissingBalancePolicy {
    type Err = LeaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(MissingBalancePolicy::Fail),
            "ignore" => Ok(MissingBalancePolicy::Ignore),
            other => Err(LeaveError::bad_input(format!(
                "unknown missing-balance policy '{other}', expected fail or ignore"
            ))),
        }
    }
}

/// Identifies the balance row a ledger operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerKey<'a> {
    pub employee_id: &'a str,
    pub leave_type_id: &'a str,
    pub year: i32,
}

impl<'a> LedgerKey<'a> {
    pub fn new(employee_id: &'a str, leave_type_id: &'a str, year: i32) -> Self {
        Self {
            employee_id,
            leave_type_id,
            year,
        }
    }

    fn missing(&self) -> LeaveError {
        LeaveError::not_found(format!(
            "leave balance for {} / {} / {}",
            self.employee_id, self.leave_type_id, self.year
        ))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BalanceLedger {
    policy: MissingBalancePolicy,
}

impl BalanceLedger {
    pub fn new(policy: MissingBalancePolicy) -> Self {
        Self { policy }
    }

    /// Loads a row that must exist, whatever the policy.
    pub fn require(&self, tx: &LedgerTx<'_>, key: LedgerKey<'_>) -> TxResult<LeaveBalance> {
        match tx.get_balance(key.employee_id, key.leave_type_id, key.year)? {
            Some(balance) => Ok(balance),
            None => abort_on(Err(key.missing())),
        }
    }

    /// `allocated - used`, the figure compared against requested days.
    pub fn available_for(&self, tx: &LedgerTx<'_>, key: LedgerKey<'_>) -> TxResult<Days> {
        Ok(self.require(tx, key)?.available())
    }

    /// Fails with `INSUFFICIENT_BALANCE` when `days` exceeds what is available.
    pub fn ensure_available(balance: &LeaveBalance, days: Days) -> LeaveResult<()> {
        let available = balance.available();
        if days > available {
            return Err(LeaveError::InsufficientBalance {
                requested: days.to_string(),
                available: available.to_string(),
            });
        }
        Ok(())
    }

    /// Creates the row, or resets `allocated` on an existing one. `used` survives.
    pub fn initialize(
        &self,
        tx: &LedgerTx<'_>,
        key: LedgerKey<'_>,
        allocation: Days,
    ) -> TxResult<LeaveBalance> {
        let balance = match tx.get_balance(key.employee_id, key.leave_type_id, key.year)? {
            Some(mut existing) => {
                existing.allocated = allocation;
                existing
            }
            None => LeaveBalance::new(key.employee_id, key.leave_type_id, key.year, allocation),
        };
        tx.put_balance(&balance)?;
        Ok(balance)
    }

    /// Increments `used` by `days`. Does not check availability.
    pub fn debit(
        &self,
        tx: &LedgerTx<'_>,
        key: LedgerKey<'_>,
        days: Days,
    ) -> TxResult<Option<LeaveBalance>> {
        self.adjust(tx, key, "debit", |balance| balance.used += days)
    }

    /// Increments `used` only if the row can cover `days`, in the same step.
    ///
    /// A missing row follows the policy like every other adjustment.
    pub fn checked_debit(
        &self,
        tx: &LedgerTx<'_>,
        key: LedgerKey<'_>,
        days: Days,
    ) -> TxResult<Option<LeaveBalance>> {
        if let Some(balance) = tx.get_balance(key.employee_id, key.leave_type_id, key.year)? {
            abort_on(Self::ensure_available(&balance, days))?;
        }
        let debited = self.adjust(tx, key, "debit", |balance| balance.used += days)?;
        if let Some(balance) = &debited {
            debug!(
                employee_id = key.employee_id,
                leave_type_id = key.leave_type_id,
                year = key.year,
                days = %days,
                used = %balance.used,
                "ledger debited"
            );
        }
        Ok(debited)
    }

    /// Gives back days previously debited.
    pub fn credit(
        &self,
        tx: &LedgerTx<'_>,
        key: LedgerKey<'_>,
        days: Days,
    ) -> TxResult<Option<LeaveBalance>> {
        self.adjust(tx, key, "credit", |balance| {
            balance.used = if balance.used > days {
                balance.used - days
            } else {
                Days::ZERO
            }
        })
    }

    /// Holds days against an in-flight request. Informational only.
    pub fn reserve(
        &self,
        tx: &LedgerTx<'_>,
        key: LedgerKey<'_>,
        days: Days,
    ) -> TxResult<Option<LeaveBalance>> {
        self.adjust(tx, key, "reserve", |balance| balance.pending += days)
    }

    pub fn release(
        &self,
        tx: &LedgerTx<'_>,
        key: LedgerKey<'_>,
        days: Days,
    ) -> TxResult<Option<LeaveBalance>> {
        self.adjust(tx, key, "release", |balance| {
            balance.pending = if balance.pending > days {
                balance.pending - days
            } else {
                Days::ZERO
            }
        })
    }

    fn adjust<F>(
        &self,
        tx: &LedgerTx<'_>,
        key: LedgerKey<'_>,
        op: &'static str,
        apply: F,
    ) -> TxResult<Option<LeaveBalance>>
    where
        F: FnOnce(&mut LeaveBalance),
    {
        let Some(mut balance) = tx.get_balance(key.employee_id, key.leave_type_id, key.year)?
        else {
            return match self.policy {
                MissingBalancePolicy::Fail => abort_on(Err(key.missing())),
                MissingBalancePolicy::Ignore => {
                    warn!(
                        employee_id = key.employee_id,
                        leave_type_id = key.leave_type_id,
                        year = key.year,
                        op,
                        "no balance row, ledger left untouched"
                    );
                    Ok(None)
                }
            };
        };
        apply(&mut balance);
        tx.put_balance(&balance)?;
        debug!(
            employee_id = key.employee_id,
            leave_type_id = key.leave_type_id,
            year = key.year,
            op,
            used = %balance.used,
            pending = %balance.pending,
            "ledger adjusted"
        );
        Ok(Some(balance))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ErrorKind;
    use crate::store::LeaveStore;

    fn temp_store() -> LeaveStore {
        let db = sled::Config::new().temporary(true).open().unwrap();
        LeaveStore::new(Arc::new(db)).unwrap()
    }

    const KEY: LedgerKey<'static> = LedgerKey {
        employee_id: "emp_a",
        leave_type_id: "ltype_annual",
        year: 2025,
    };

    #[test]
    fn initialize_preserves_used() {
        let store = temp_store();
        let ledger = BalanceLedger::new(MissingBalancePolicy::Fail);

        store
            .transaction(|tx| {
                ledger.initialize(tx, KEY, Days::whole(20))?;
                ledger.debit(tx, KEY, Days::whole(4))?;
                ledger.initialize(tx, KEY, Days::whole(25))
            })
            .unwrap();

        let balance = store.balance("emp_a", "ltype_annual", 2025).unwrap().unwrap();
        assert_eq!(balance.allocated, Days::whole(25));
        assert_eq!(balance.used, Days::whole(4));
        assert_eq!(balance.available(), Days::whole(21));
    }

    #[test]
    fn debit_on_missing_row_follows_policy() {
        let store = temp_store();

        let strict = BalanceLedger::new(MissingBalancePolicy::Fail);
        let err = store
            .transaction(|tx| strict.debit(tx, KEY, Days::whole(1)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let lenient = BalanceLedger::new(MissingBalancePolicy::Ignore);
        let touched = store
            .transaction(|tx| lenient.debit(tx, KEY, Days::whole(1)))
            .unwrap();
        assert_eq!(touched, None);
    }

    #[test]
    fn checked_debit_refuses_overdraw_and_leaves_row_alone() {
        let store = temp_store();
        let ledger = BalanceLedger::new(MissingBalancePolicy::Fail);
        store
            .transaction(|tx| ledger.initialize(tx, KEY, Days::whole(2)))
            .unwrap();

        let err = store
            .transaction(|tx| ledger.checked_debit(tx, KEY, Days::whole(3)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);

        let balance = store.balance("emp_a", "ltype_annual", 2025).unwrap().unwrap();
        assert_eq!(balance.used, Days::ZERO);

        let lenient = BalanceLedger::new(MissingBalancePolicy::Ignore);
        let missing = LedgerKey::new("emp_a", "ltype_sick", 2025);
        let touched = store
            .transaction(|tx| lenient.checked_debit(tx, missing, Days::whole(1)))
            .unwrap();
        assert_eq!(touched, None);
        let err = store
            .transaction(|tx| ledger.checked_debit(tx, missing, Days::whole(1)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn credit_and_release_never_go_negative() {
        let store = temp_store();
        let ledger = BalanceLedger::new(MissingBalancePolicy::Fail);
        let balance = store
            .transaction(|tx| {
                ledger.initialize(tx, KEY, Days::whole(5))?;
                ledger.reserve(tx, KEY, Days::whole(1))?;
                ledger.release(tx, KEY, Days::whole(2))?;
                ledger.credit(tx, KEY, Days::whole(3))
            })
            .unwrap()
            .unwrap();
        assert_eq!(balance.used, Days::ZERO);
        assert_eq!(balance.pending, Days::ZERO);
    }

    #[test]
    fn policy_parses_from_config_values() {
        assert_eq!(
            "IGNORE".parse::<MissingBalancePolicy>().unwrap(),
            MissingBalancePolicy::Ignore
        );
        assert!("maybe".parse::<MissingBalancePolicy>().is_err());
    }
}
