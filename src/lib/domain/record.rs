use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use super::commitment::Commitment;
use super::error::ValidationError;
use super::yield_rule::{accrue, YieldClaim};

/// What the holder must keep to claim yield later.
///
/// The ledger never sees the balance or salt, so losing this record makes the
/// deposit's yield unclaimable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRecord {
    pub commitment: Commitment,
    #[serde(with = "super::decimal")]
    pub balance_whole: U256,
    #[serde(with = "super::decimal")]
    pub salt: U256,
    pub deposit_timestamp: u64,
}

impl DepositRecord {
    /// Build a record and compute its commitment.
    pub fn new(
        balance_whole: U256,
        salt: U256,
        deposit_timestamp: u64,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            commitment: Commitment::deposit(balance_whole, salt)?,
            balance_whole,
            salt,
            deposit_timestamp,
        })
    }

    /// Whether the stored commitment still matches the stored opening.
    pub fn is_consistent(&self) -> bool {
        Commitment::deposit(self.balance_whole, self.salt)
            .map(|c| c == self.commitment)
            .unwrap_or(false)
    }

    /// Off-chain estimate of the yield claimable at `now`.
    pub fn accrued(&self, now: u64, rate_bps: u32) -> Result<U256, ValidationError> {
        accrue(self.balance_whole, self.deposit_timestamp, now, rate_bps)
    }

    /// Prepare a claim for everything accrued up to `now`.
    pub fn claim(&self, now: u64, rate_bps: u32) -> Result<YieldClaim, ValidationError> {
        if now < self.deposit_timestamp {
            return Err(ValidationError::TimestampOrder {
                deposit: self.deposit_timestamp,
                current: now,
            });
        }
        Ok(YieldClaim {
            commitment: self.commitment,
            nullifier: self.commitment.nullifier(self.salt, now),
            claimed_yield: self.accrued(now, rate_bps)?,
            deposit_timestamp: self.deposit_timestamp,
            current_timestamp: now,
        })
    }
}
