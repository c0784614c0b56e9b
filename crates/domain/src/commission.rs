use std::fmt::{Display, Formatter};

use serde::Serialize;
use tinspace_core::{AppError, AppResult};

/// Monetary value of one performance point before the personal rate applies.
///
/// Every surface showing a commission goes through [`estimate_commission`],
/// so this is the only place the value lives.
pub const POINT_VALUE_FOR_COMMISSION: f64 = 10.0;

/// Rate applied when an account carries no stored commission rate.
pub const DEFAULT_COMMISSION_RATE: f64 = 0.03;

/// Commission estimate in euros.
///
/// [`CommissionEstimate::amount`] is authoritative; rounding only happens
/// through [`CommissionEstimate::rounded`] and `Display`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct CommissionEstimate {
    amount: f64,
}

impl CommissionEstimate {
    /// Returns the unrounded amount.
    #[must_use]
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Returns the amount rounded to cents for display.
    #[must_use]
    pub fn rounded(&self) -> f64 {
        (self.amount * 100.0).round() / 100.0
    }
}

impl Display for CommissionEstimate {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{:.2}", self.rounded())
    }
}

/// Estimates the commission earned by `points` at `commission_rate`.
///
/// Negative points or a rate outside `[0, 1]` are rejected instead of clamped.
pub fn estimate_commission(points: i64, commission_rate: f64) -> AppResult<CommissionEstimate> {
    validate_points(points)?;
    validate_commission_rate(commission_rate)?;

    // i64 -> f64 is exact below 2^53, far beyond any realistic point total.
    let amount = points as f64 * POINT_VALUE_FOR_COMMISSION * normalize_rate(commission_rate);
    Ok(CommissionEstimate { amount })
}

/// Rejects negative point totals.
pub fn validate_points(points: i64) -> AppResult<()> {
    if points < 0 {
        return Err(AppError::InvalidArgument(format!(
            "points must be non-negative, got {points}"
        )));
    }

    Ok(())
}

/// Rejects rates outside `[0, 1]`, including NaN.
pub fn validate_commission_rate(commission_rate: f64) -> AppResult<()> {
    if !(0.0..=1.0).contains(&commission_rate) {
        return Err(AppError::InvalidArgument(format!(
            "commission rate must be within [0, 1], got {commission_rate}"
        )));
    }

    Ok(())
}

/// Folds a negative zero rate into positive zero so it never renders as
/// `-0.00`.
pub(crate) fn normalize_rate(commission_rate: f64) -> f64 {
    commission_rate + 0.0
}
