//! sled-backed persistence and the scoped transaction used by every multi-step write
use std::sync::Arc;

use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};
use sled::{CompareAndSwapError, Transactional, Tree};

use crate::audit::AuditEntry;
use crate::error::{LeaveError, LeaveResult};
use crate::request::LeaveRequest;
use crate::types::{Employee, LeaveBalance, LeaveType, balance_key};

pub type TxResult<T> = ConflictableTransactionResult<T, LeaveError>;

const ID_PREFIX: &str = "id/";
const EMAIL_PREFIX: &str = "email/";
const NAME_PREFIX: &str = "name/";
const HEAD_PREFIX: &str = "#head/";

pub(crate) fn encode<T: minicbor::Encode<()>>(value: &T) -> LeaveResult<Vec<u8>> {
    Ok(minicbor::to_vec(value)?)
}

pub(crate) fn decode<T: for<'b> minicbor::Decode<'b, ()>>(bytes: &[u8]) -> LeaveResult<T> {
    Ok(minicbor::decode(bytes)?)
}

/// Lifts a categorised error into a transaction abort.
pub(crate) fn abort_on<T>(result: LeaveResult<T>) -> TxResult<T> {
    result.map_err(ConflictableTransactionError::Abort)
}

pub struct LeaveStore {
    employees: Tree,
    leave_types: Tree,
    requests: Tree,
    balances: Tree,
    audit: Tree,
}

impl LeaveStore {
    pub fn new(instance: Arc<sled::Db>) -> LeaveResult<Self> {
        Ok(Self {
            employees: instance.open_tree("employees")?,
            leave_types: instance.open_tree("leave_types")?,
            requests: instance.open_tree("requests")?,
            balances: instance.open_tree("balances")?,
            audit: instance.open_tree("audit")?,
        })
    }

    /// Runs `f` as one serializable unit over requests, balances and audit.
    ///
    /// sled re-runs the closure when a concurrent writer touched the same keys,
    /// so `f` must not have side effects outside the transaction.
    pub fn transaction<T, F>(&self, f: F) -> LeaveResult<T>
    where
        F: Fn(&LedgerTx<'_>) -> TxResult<T>,
    {
        let result = (&self.requests, &self.balances, &self.audit).transaction(
            |(requests, balances, audit)| {
                let tx = LedgerTx {
                    requests,
                    balances,
                    audit,
                };
                f(&tx)
            },
        )?;
        Ok(result)
    }

    pub fn insert_employee(&self, employee: &Employee) -> LeaveResult<()> {
        let email_key = format!("{EMAIL_PREFIX}{}", employee.email.to_lowercase());
        let claimed = self.employees.compare_and_swap(
            email_key.as_bytes(),
            None::<&[u8]>,
            Some(employee.id.as_bytes()),
        )?;
        if let Err(CompareAndSwapError { .. }) = claimed {
            return Err(LeaveError::bad_input(format!(
                "email {} is already registered",
                employee.email
            )));
        }
        self.employees.insert(
            format!("{ID_PREFIX}{}", employee.id).as_bytes(),
            encode(employee)?,
        )?;
        Ok(())
    }

    pub fn employee(&self, id: &str) -> LeaveResult<Option<Employee>> {
        self.employees
            .get(format!("{ID_PREFIX}{id}").as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn employee_by_email(&self, email: &str) -> LeaveResult<Option<Employee>> {
        let key = format!("{EMAIL_PREFIX}{}", email.trim().to_lowercase());
        match self.employees.get(key.as_bytes())? {
            Some(id) => self.employee(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    pub fn insert_leave_type(&self, leave_type: &LeaveType) -> LeaveResult<()> {
        let name_key = format!("{NAME_PREFIX}{}", leave_type.name.to_lowercase());
        let claimed = self.leave_types.compare_and_swap(
            name_key.as_bytes(),
            None::<&[u8]>,
            Some(leave_type.id.as_bytes()),
        )?;
        if claimed.is_err() {
            return Err(LeaveError::bad_input(format!(
                "leave type '{}' already exists",
                leave_type.name
            )));
        }
        self.put_leave_type(leave_type)
    }

    pub fn put_leave_type(&self, leave_type: &LeaveType) -> LeaveResult<()> {
        self.leave_types.insert(
            format!("{ID_PREFIX}{}", leave_type.id).as_bytes(),
            encode(leave_type)?,
        )?;
        Ok(())
    }

    pub fn leave_type(&self, id: &str) -> LeaveResult<Option<LeaveType>> {
        self.leave_types
            .get(format!("{ID_PREFIX}{id}").as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn leave_type_by_name(&self, name: &str) -> LeaveResult<Option<LeaveType>> {
        let key = format!("{NAME_PREFIX}{}", name.trim().to_lowercase());
        match self.leave_types.get(key.as_bytes())? {
            Some(id) => self.leave_type(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    pub fn leave_types(&self) -> LeaveResult<Vec<LeaveType>> {
        self.leave_types
            .scan_prefix(ID_PREFIX.as_bytes())
            .map(|kv| {
                let (_, bytes) = kv?;
                decode(&bytes)
            })
            .collect()
    }

    pub fn request(&self, id: &str) -> LeaveResult<Option<LeaveRequest>> {
        self.requests
            .get(id.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn requests(&self) -> LeaveResult<Vec<LeaveRequest>> {
        self.requests
            .iter()
            .map(|kv| {
                let (_, bytes) = kv?;
                decode(&bytes)
            })
            .collect()
    }

    pub fn balance(
        &self,
        employee_id: &str,
        leave_type_id: &str,
        year: i32,
    ) -> LeaveResult<Option<LeaveBalance>> {
        self.balances
            .get(balance_key(employee_id, leave_type_id, year).as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn balances_for(&self, employee_id: &str, year: i32) -> LeaveResult<Vec<LeaveBalance>> {
        let mut rows = vec![];
        for kv in self.balances.scan_prefix(format!("{employee_id}/").as_bytes()) {
            let (_, bytes) = kv?;
            let balance: LeaveBalance = decode(&bytes)?;
            if balance.year == year {
                rows.push(balance);
            }
        }
        Ok(rows)
    }

    /// Audit entries for one request, oldest first.
    pub fn audit_entries(&self, request_id: &str) -> LeaveResult<Vec<AuditEntry>> {
        self.audit
            .scan_prefix(audit_prefix(request_id))
            .map(|kv| {
                let (_, bytes) = kv?;
                decode(&bytes)
            })
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }
}

fn audit_prefix(request_id: &str) -> Vec<u8> {
    format!("{request_id}/").into_bytes()
}

/// Typed view over the trees taking part in one transaction.
pub struct LedgerTx<'a> {
    requests: &'a TransactionalTree,
    balances: &'a TransactionalTree,
    audit: &'a TransactionalTree,
}

impl LedgerTx<'_> {
    pub fn get_request(&self, id: &str) -> TxResult<Option<LeaveRequest>> {
        match self.requests.get(id.as_bytes())? {
            Some(bytes) => abort_on(decode(&bytes)).map(Some),
            None => Ok(None),
        }
    }

    pub fn request(&self, id: &str) -> TxResult<LeaveRequest> {
        match self.get_request(id)? {
            Some(request) => Ok(request),
            None => abort_on(Err(LeaveError::not_found(format!("leave request {id}")))),
        }
    }

    pub fn put_request(&self, request: &LeaveRequest) -> TxResult<()> {
        let bytes = abort_on(encode(request))?;
        self.requests.insert(request.id.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn get_balance(
        &self,
        employee_id: &str,
        leave_type_id: &str,
        year: i32,
    ) -> TxResult<Option<LeaveBalance>> {
        match self
            .balances
            .get(balance_key(employee_id, leave_type_id, year).as_bytes())?
        {
            Some(bytes) => abort_on(decode(&bytes)).map(Some),
            None => Ok(None),
        }
    }

    pub fn put_balance(&self, balance: &LeaveBalance) -> TxResult<()> {
        let bytes = abort_on(encode(balance))?;
        self.balances.insert(balance.key().as_bytes(), bytes)?;
        Ok(())
    }

    pub(crate) fn audit_head(&self, request_id: &str) -> TxResult<Option<String>> {
        let head = self
            .audit
            .get(format!("{HEAD_PREFIX}{request_id}").as_bytes())?;
        Ok(head.map(|digest| String::from_utf8_lossy(&digest).into_owned()))
    }

    pub(crate) fn put_audit(&self, sort_key: &[u8], entry: &AuditEntry) -> TxResult<()> {
        let mut key = audit_prefix(&entry.leave_request_id);
        key.extend_from_slice(sort_key);

        let bytes = abort_on(encode(entry))?;
        self.audit.insert(key, bytes)?;
        self.audit.insert(
            format!("{HEAD_PREFIX}{}", entry.leave_request_id).as_bytes(),
            entry.digest.as_bytes(),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Days;

    fn temp_store() -> LeaveStore {
        let db = sled::Config::new().temporary(true).open().unwrap();
        LeaveStore::new(Arc::new(db)).unwrap()
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let store = temp_store();
        let a = Employee {
            id: "emp_a".into(),
            name: "A".into(),
            email: "a@example.com".into(),
        };
        let b = Employee {
            id: "emp_b".into(),
            name: "B".into(),
            email: "A@Example.com".into(),
        };
        store.insert_employee(&a).unwrap();
        assert!(store.insert_employee(&b).is_err());
        assert_eq!(store.employee_by_email("A@EXAMPLE.COM").unwrap(), Some(a));
    }

    #[test]
    fn aborted_transaction_leaves_no_writes() {
        let store = temp_store();
        let balance = LeaveBalance::new("emp_a", "ltype_a", 2025, Days::whole(10));

        let result: LeaveResult<()> = store.transaction(|tx| {
            tx.put_balance(&balance)?;
            abort_on(Err(LeaveError::bad_input("stop")))
        });

        assert_eq!(result.unwrap_err(), LeaveError::bad_input("stop"));
        assert_eq!(store.balance("emp_a", "ltype_a", 2025).unwrap(), None);
    }

    #[test]
    fn balances_are_scoped_by_year() {
        let store = temp_store();
        store
            .transaction(|tx| {
                tx.put_balance(&LeaveBalance::new("emp_a", "ltype_a", 2024, Days::whole(5)))?;
                tx.put_balance(&LeaveBalance::new("emp_a", "ltype_a", 2025, Days::whole(7)))
            })
            .unwrap();

        let rows = store.balances_for("emp_a", 2025).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].allocated, Days::whole(7));
    }
}
