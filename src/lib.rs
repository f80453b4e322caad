//! Two-stage (manager, then HR) leave approval over a per-year balance ledger.
//!
//! [`service::LeaveService`] is the entry point. Every transition, the ledger
//! effect it implies and its audit entry commit together in one sled
//! transaction; notifications fire afterwards and never roll anything back.

pub mod audit;
pub mod batch;
pub mod config;
pub mod error;
pub mod history;
pub mod ledger;
pub mod notify;
pub mod request;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;
pub mod workflow;
pub mod working_days;

pub use error::{ErrorKind, LeaveError, LeaveResult};
pub use service::LeaveService;
