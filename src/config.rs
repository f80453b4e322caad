//! Runtime settings, read from the environment and an optional `.env` file
use std::env;

use anyhow::Context;
use dotenvy::dotenv;

use crate::ledger::MissingBalancePolicy;
use crate::types::Days;

#[derive(Debug, Clone)]
pub struct LeaveConfig {
    pub db_path: String,
    pub default_allocation: Days,
    pub missing_balance: MissingBalancePolicy,

    // History paging
    pub page_size: u32,
    pub max_page_size: u32,
}

impl Default for LeaveConfig {
    fn default() -> Self {
        Self {
            db_path: "leave-ledger.db".to_string(),
            default_allocation: Days::whole(20),
            missing_balance: MissingBalancePolicy::Fail,
            page_size: 10,
            max_page_size: 100,
        }
    }
}

impl LeaveConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            db_path: env::var("LEAVE_DB_PATH").unwrap_or(defaults.db_path),
            default_allocation: match env::var("LEAVE_DEFAULT_ALLOCATION") {
                Ok(raw) => raw
                    .parse()
                    .with_context(|| format!("LEAVE_DEFAULT_ALLOCATION={raw}"))?,
                Err(_) => defaults.default_allocation,
            },
            missing_balance: match env::var("LEAVE_MISSING_BALANCE") {
                Ok(raw) => raw
                    .parse()
                    .with_context(|| format!("LEAVE_MISSING_BALANCE={raw}"))?,
                Err(_) => defaults.missing_balance,
            },
            page_size: parse_or("LEAVE_PAGE_SIZE", defaults.page_size)?,
            max_page_size: parse_or("LEAVE_MAX_PAGE_SIZE", defaults.max_page_size)?,
        })
    }
}

fn parse_or(key: &str, default: u32) -> anyhow::Result<u32> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a positive integer, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
