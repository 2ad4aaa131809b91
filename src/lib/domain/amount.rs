//! Conversion between 18-decimal token amounts and the whole-unit integers the
//! commitment hash and circuits operate over.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Decimals of the vault token.
pub const TOKEN_DECIMALS: u8 = 18;

/// 10^18 base units per whole token.
pub const BASE_UNITS_PER_TOKEN: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Result of scaling a base-unit amount down to whole units.
///
/// `remainder` is the part that does not fit in a whole unit; it is never
/// committed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scaled {
    pub whole: U256,
    pub remainder: U256,
}

impl Scaled {
    pub fn is_exact(&self) -> bool {
        self.remainder.is_zero()
    }
}

/// Non-fatal notice that part of a deposit was truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecisionLossWarning {
    pub amount: U256,
    pub whole: U256,
    pub truncated: U256,
}

/// How sub-unit remainders are treated when a deposit is scaled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingPolicy {
    /// Refuse amounts that are not a multiple of one whole token.
    #[default]
    Reject,
    /// Floor to whole units and report the truncated remainder.
    Floor,
}

impl ScalingPolicy {
    /// Scale `amount` according to this policy.
    ///
    /// Returns the whole-unit value and, under `Floor`, a warning when
    /// anything was dropped.
    pub fn apply(
        self,
        amount: U256,
    ) -> Result<(U256, Option<PrecisionLossWarning>), ValidationError> {
        let scaled = to_whole_units(amount);
        if scaled.is_exact() {
            return Ok((scaled.whole, None));
        }
        match self {
            ScalingPolicy::Reject => Err(ValidationError::PrecisionLoss {
                amount,
                remainder: scaled.remainder,
            }),
            ScalingPolicy::Floor => {
                tracing::warn!(
                    %amount,
                    whole = %scaled.whole,
                    truncated = %scaled.remainder,
                    "sub-unit remainder dropped from deposit"
                );
                Ok((
                    scaled.whole,
                    Some(PrecisionLossWarning {
                        amount,
                        whole: scaled.whole,
                        truncated: scaled.remainder,
                    }),
                ))
            }
        }
    }
}

/// Floor-divide a base-unit amount by 10^18.
pub fn to_whole_units(amount: U256) -> Scaled {
    let (whole, remainder) = amount.div_rem(BASE_UNITS_PER_TOKEN);
    Scaled { whole, remainder }
}

/// Multiply whole units back up to base units.
pub fn to_base_units(whole: U256) -> Result<U256, ValidationError> {
    whole
        .checked_mul(BASE_UNITS_PER_TOKEN)
        .ok_or(ValidationError::Overflow("base units"))
}

/// Parse a human decimal token string ("1.5") into base units.
pub fn parse_tokens(value: &str) -> Result<U256, ValidationError> {
    let malformed = || ValidationError::Malformed {
        key: "amount".into(),
        value: value.into(),
    };
    let (int_part, frac_part) = match value.split_once('.') {
        Some((i, f)) => (i, f),
        None => (value, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(malformed());
    }
    if frac_part.len() > TOKEN_DECIMALS as usize
        || !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(malformed());
    }
    let whole = if int_part.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(int_part, 10).map_err(|_| malformed())?
    };
    let mut frac_digits = frac_part.to_string();
    frac_digits.extend(std::iter::repeat('0').take(TOKEN_DECIMALS as usize - frac_part.len()));
    let frac = U256::from_str_radix(&frac_digits, 10).map_err(|_| malformed())?;
    to_base_units(whole)?
        .checked_add(frac)
        .ok_or(ValidationError::Overflow("base units"))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn tokens(n: u64) -> U256 {
        U256::from(n) * BASE_UNITS_PER_TOKEN
    }

    #[test]
    fn test_exact_amount_scales_without_remainder() {
        let scaled = to_whole_units(tokens(100));
        assert_eq!(scaled.whole, U256::from(100u64));
        assert!(scaled.is_exact());
    }

    #[test]
    fn test_fractional_amount_is_floored() {
        // 1.5 tokens commits as 1
        let amount = tokens(1) + BASE_UNITS_PER_TOKEN / U256::from(2u64);
        let scaled = to_whole_units(amount);
        assert_eq!(scaled.whole, U256::from(1u64));
        assert_eq!(scaled.remainder, U256::from(500_000_000_000_000_000u64));
    }

    #[test]
    fn test_reject_policy_refuses_remainder() {
        let amount = tokens(1) + U256::from(1u64);
        let err = ScalingPolicy::Reject.apply(amount).unwrap_err();
        assert_eq!(
            err,
            ValidationError::PrecisionLoss {
                amount,
                remainder: U256::from(1u64)
            }
        );
    }

    #[test]
    fn test_floor_policy_reports_warning() {
        let amount = tokens(3) + U256::from(42u64);
        let (whole, warning) = ScalingPolicy::Floor.apply(amount).unwrap();
        assert_eq!(whole, U256::from(3u64));
        let warning = warning.expect("remainder should be reported");
        assert_eq!(warning.truncated, U256::from(42u64));
    }

    #[test]
    fn test_exact_amount_has_no_warning_under_floor() {
        let (whole, warning) = ScalingPolicy::Floor.apply(tokens(7)).unwrap();
        assert_eq!(whole, U256::from(7u64));
        assert!(warning.is_none());
    }

    #[test]
    fn test_to_base_units_overflow() {
        assert_eq!(
            to_base_units(U256::MAX).unwrap_err(),
            ValidationError::Overflow("base units")
        );
    }

    #[test]
    fn test_parse_tokens() {
        assert_eq!(parse_tokens("100").unwrap(), tokens(100));
        assert_eq!(
            parse_tokens("1.5").unwrap(),
            tokens(1) + U256::from(500_000_000_000_000_000u64)
        );
        assert_eq!(parse_tokens("0.000000000000000001").unwrap(), U256::from(1u64));
        assert!(parse_tokens("1.0000000000000000001").is_err());
        assert!(parse_tokens("abc").is_err());
        assert!(parse_tokens(".").is_err());
        assert!(parse_tokens("-1").is_err());
    }

    proptest! {
        #[test]
        fn prop_scaling_round_trip_never_exceeds_input(raw in any::<[u64; 4]>()) {
            let x = U256::from_limbs(raw);
            let back = to_base_units(to_whole_units(x).whole).unwrap();
            prop_assert!(back <= x);
            prop_assert_eq!(back == x, x % BASE_UNITS_PER_TOKEN == U256::ZERO);
        }
    }
}
