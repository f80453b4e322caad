//! Utility functions for identifiers

use bech32::Bech32m;
use uuid7::uuid7;

use crate::error::{LeaveError, LeaveResult};

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

pub(crate) fn new_id(hrp: &str) -> LeaveResult<String> {
    new_uuid_to_bech32(hrp).map_err(|e| LeaveError::Internal(format!("id generation: {e}")))
}

/// Time-ordered key suffix; uuid7 values are monotonic within the process.
pub(crate) fn sort_key() -> [u8; 16] {
    *uuid7().as_bytes()
}
