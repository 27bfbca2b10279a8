//! Outstanding transfer amounts, computed entirely in integer cents.

use crate::Decimal;
use rust_decimal::RoundingStrategy;
use rust_decimal::prelude::ToPrimitive;

/// Value of one weighted grant.
pub const DEFAULT_WEIGHTED_GRANT_CENTS: u64 = 85_00;

/// How much of a target budget is still owed.
///
/// At most one of `transfer_amount_cents` and `over_disbursed_cents` is nonzero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferDecision {
    pub target_amount_cents: u64,
    pub already_disbursed_cents: u64,
    pub transfer_amount_cents: u64,
    pub over_disbursed_cents: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Outstanding,
    FullyDisbursed,
    OverDisbursed,
}

pub fn compute_transfer(target_amount_cents: u64, already_disbursed_cents: u64) -> TransferDecision {
    TransferDecision {
        target_amount_cents,
        already_disbursed_cents,
        transfer_amount_cents: target_amount_cents.saturating_sub(already_disbursed_cents),
        over_disbursed_cents: already_disbursed_cents.saturating_sub(target_amount_cents),
    }
}

impl TransferDecision {
    pub fn status(&self) -> TransferStatus {
        if self.transfer_amount_cents > 0 {
            TransferStatus::Outstanding
        } else if self.over_disbursed_cents > 0 {
            TransferStatus::OverDisbursed
        } else {
            TransferStatus::FullyDisbursed
        }
    }
}

/// Converts between cents and weighted grant counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedGrantUnit {
    cents: u64,
}

impl Default for WeightedGrantUnit {
    fn default() -> Self {
        WeightedGrantUnit::new(DEFAULT_WEIGHTED_GRANT_CENTS)
    }
}

impl WeightedGrantUnit {
    pub fn new(cents: u64) -> Self {
        WeightedGrantUnit { cents: cents.max(1) }
    }

    pub fn cents(&self) -> u64 {
        self.cents
    }

    /// Cents for a (possibly fractional) number of weighted grants.
    pub fn to_cents(&self, units: Decimal) -> u64 {
        round_to_u64(units * Decimal::from(self.cents))
    }

    /// Weighted grants covered by `cents`, to one decimal place.
    pub fn units_for(&self, cents: u64) -> Decimal {
        let mut units = (Decimal::from(cents) / Decimal::from(self.cents))
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
        units.rescale(1);
        units
    }
}

/// Convert a dollar amount to cents, rounding half away from zero. Negative amounts are zero.
pub fn dollars_to_cents(dollars: Decimal) -> u64 {
    round_to_u64(dollars * Decimal::ONE_HUNDRED)
}

fn round_to_u64(value: Decimal) -> u64 {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .max(Decimal::ZERO)
        .to_u64()
        .unwrap_or(u64::MAX)
}

/// Render cents as a dollar amount with two decimals, e.g. `1234.50`.
pub fn format_cents(cents: u64) -> String {
    Decimal::from_i128_with_scale(i128::from(cents), 2).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn under_disbursed() {
        let decision = compute_transfer(15000, 10000);
        assert_eq!(decision.transfer_amount_cents, 5000);
        assert_eq!(decision.over_disbursed_cents, 0);
        assert_eq!(decision.status(), TransferStatus::Outstanding);
    }

    #[test]
    fn over_disbursed_is_clamped() {
        let decision = compute_transfer(10000, 15000);
        assert_eq!(decision.transfer_amount_cents, 0);
        assert_eq!(decision.over_disbursed_cents, 5000);
        assert_eq!(decision.status(), TransferStatus::OverDisbursed);
    }

    #[test]
    fn balanced() {
        let decision = compute_transfer(10000, 10000);
        assert_eq!(decision.transfer_amount_cents, 0);
        assert_eq!(decision.over_disbursed_cents, 0);
        assert_eq!(decision.status(), TransferStatus::FullyDisbursed);
    }

    #[test]
    fn at_most_one_side_is_nonzero() {
        for target in [0, 1, 8500, 10000, 99999] {
            for disbursed in [0, 1, 8500, 10000, 99999] {
                let decision = compute_transfer(target, disbursed);
                assert!(decision.transfer_amount_cents == 0 || decision.over_disbursed_cents == 0);
                assert_eq!(
                    target as i128 - disbursed as i128,
                    decision.transfer_amount_cents as i128 - decision.over_disbursed_cents as i128
                );
            }
        }
    }

    #[test]
    fn weighted_units() {
        let unit = WeightedGrantUnit::default();
        assert_eq!(unit.to_cents(Decimal::from(3)), 25500);
        assert_eq!(unit.to_cents(Decimal::from_str("2.5").unwrap()), 21250);
        assert_eq!(unit.units_for(25500).to_string(), "3.0");
        assert_eq!(unit.units_for(10000).to_string(), "1.2");
        assert_eq!(unit.units_for(0).to_string(), "0.0");
    }

    #[test]
    fn dollars() {
        assert_eq!(dollars_to_cents(Decimal::from_str("12.345").unwrap()), 1235);
        assert_eq!(dollars_to_cents(Decimal::from_str("255").unwrap()), 25500);
        assert_eq!(dollars_to_cents(Decimal::from_str("-4").unwrap()), 0);
        assert_eq!(format_cents(123450), "1234.50");
        assert_eq!(format_cents(5), "0.05");
    }
}
