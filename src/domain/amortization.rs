//! Annuity (equal payment) amortization.
//!
//! Every amount is rounded to the currency's minor unit. Rounding drift is
//! absorbed by the final instalment so the principal column sums exactly to
//! the credit principal.

use crate::error::{LedgerError, Result};
use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// One computed instalment, before it is given an id and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledPayment {
    pub payment_number: u32,
    pub due_date: DateTime<Utc>,
    pub amount: Decimal,
    pub principal: Decimal,
    pub interest: Decimal,
    /// Principal still owed after this instalment.
    pub remaining: Decimal,
}

/// Monthly rate as a fraction from an annual percentage.
pub fn monthly_rate(annual_rate_pct: Decimal) -> Decimal {
    annual_rate_pct / dec!(12) / dec!(100)
}

fn overflow(what: &str) -> LedgerError {
    LedgerError::Validation(format!("{what} is out of the representable range"))
}

/// Fixed monthly payment, unrounded.
///
/// `P * r * (1 + r)^n / ((1 + r)^n - 1)`, falling back to `P / n` when the
/// rate is zero or too small to compound at this precision.
pub fn annuity_payment(
    principal: Decimal,
    monthly_rate: Decimal,
    term_months: u32,
) -> Result<Decimal> {
    if term_months == 0 {
        return Ok(principal);
    }
    let equal_parts = || {
        principal
            .checked_div(Decimal::from(term_months))
            .ok_or_else(|| overflow("monthly payment"))
    };
    if monthly_rate.is_zero() {
        return equal_parts();
    }

    let base = Decimal::ONE + monthly_rate;
    let mut compound = Decimal::ONE;
    for _ in 0..term_months {
        match compound.checked_mul(base) {
            Some(next) => compound = next,
            // (1 + r)^n has outgrown the representable range; the factor
            // below is 1 to within precision.
            None => {
                return principal
                    .checked_mul(monthly_rate)
                    .ok_or_else(|| overflow("monthly payment"))
            }
        }
    }
    if compound == Decimal::ONE {
        return equal_parts();
    }

    let factor = compound
        .checked_div(compound - Decimal::ONE)
        .ok_or_else(|| overflow("annuity factor"))?;
    principal
        .checked_mul(monthly_rate)
        .and_then(|p| p.checked_mul(factor))
        .ok_or_else(|| overflow("monthly payment"))
}

/// Builds the full schedule for a credit issued at `issued_at`.
///
/// Entry `i` is due `i` calendar months after issuance; chrono clamps the day
/// to the end of shorter months. A principal too small to give every entry a
/// non-zero amount at `scale` is rejected.
pub fn annuity_schedule(
    principal: Decimal,
    annual_rate_pct: Decimal,
    term_months: u32,
    issued_at: DateTime<Utc>,
    scale: u32,
) -> Result<Vec<ScheduledPayment>> {
    if principal <= Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "principal must be positive, got {principal}"
        )));
    }
    if term_months == 0 {
        return Err(LedgerError::Validation(
            "term must be at least one month".to_string(),
        ));
    }
    if annual_rate_pct < Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "interest rate must not be negative, got {annual_rate_pct}"
        )));
    }

    let rate = monthly_rate(annual_rate_pct);
    let payment = annuity_payment(principal, rate, term_months)?.round_dp(scale);
    if payment <= Decimal::ZERO {
        return Err(too_small(principal, term_months));
    }

    let mut payments = Vec::with_capacity(term_months as usize);
    let mut remaining = principal;

    for i in 1..=term_months {
        let due_date = issued_at
            .checked_add_months(Months::new(i))
            .ok_or_else(|| LedgerError::Validation(format!("due date of payment {i} out of range")))?;

        let interest = remaining
            .checked_mul(rate)
            .ok_or_else(|| overflow("interest"))?
            .round_dp(scale);
        let principal_part = if i == term_months {
            remaining
        } else {
            (payment - interest).max(Decimal::ZERO).min(remaining)
        };
        remaining -= principal_part;
        let amount = principal_part
            .checked_add(interest)
            .ok_or_else(|| overflow("instalment"))?;
        if amount <= Decimal::ZERO {
            return Err(too_small(principal, term_months));
        }

        payments.push(ScheduledPayment {
            payment_number: i,
            due_date,
            amount,
            principal: principal_part,
            interest,
            remaining,
        });
    }

    Ok(payments)
}

fn too_small(principal: Decimal, term_months: u32) -> LedgerError {
    LedgerError::Validation(format!(
        "principal {principal} is too small to spread over {term_months} months"
    ))
}
