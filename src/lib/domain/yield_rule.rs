use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use super::commitment::Commitment;
use super::error::ValidationError;
use super::nullifier::Nullifier;

/// 365 days. No leap-year adjustment: the circuit uses the same constant.
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// 10000 basis points = 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Yield a whole-unit balance has earned between two timestamps.
///
/// floor(balance * rate_bps * elapsed / (10000 * SECONDS_PER_YEAR))
///
/// Returns zero when `current_ts < deposit_ts`. Any fractional remainder is
/// dropped and is not carried into a later claim.
pub fn accrue(
    balance_whole: U256,
    deposit_ts: u64,
    current_ts: u64,
    rate_bps: u32,
) -> Result<U256, ValidationError> {
    let elapsed = current_ts.saturating_sub(deposit_ts);
    let numerator = balance_whole
        .checked_mul(U256::from(rate_bps))
        .and_then(|v| v.checked_mul(U256::from(elapsed)))
        .ok_or(ValidationError::Overflow("accrued yield"))?;
    let denominator = U256::from(BPS_DENOMINATOR) * U256::from(SECONDS_PER_YEAR);
    Ok(numerator / denominator)
}

/// Yield for one full year at `rate_bps`.
pub fn annual_yield(balance_whole: U256, rate_bps: u32) -> Result<U256, ValidationError> {
    accrue(balance_whole, 0, SECONDS_PER_YEAR, rate_bps)
}

/// A claim against one registered deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldClaim {
    pub commitment: Commitment,
    pub nullifier: Nullifier,
    /// Whole units
    pub claimed_yield: U256,
    pub deposit_timestamp: u64,
    pub current_timestamp: u64,
}

impl YieldClaim {
    /// Check the claimed amount against the accrual rule.
    pub fn check(&self, balance_whole: U256, rate_bps: u32) -> Result<(), ValidationError> {
        if self.current_timestamp < self.deposit_timestamp {
            return Err(ValidationError::TimestampOrder {
                deposit: self.deposit_timestamp,
                current: self.current_timestamp,
            });
        }
        let expected = accrue(
            balance_whole,
            self.deposit_timestamp,
            self.current_timestamp,
            rate_bps,
        )?;
        if expected != self.claimed_yield {
            return Err(ValidationError::YieldMismatch {
                claimed: self.claimed_yield,
                expected,
            });
        }
        Ok(())
    }
}
