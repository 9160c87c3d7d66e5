use super::account::{AccountId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type CreditId = u64;
pub type PaymentId = u64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum CreditStatus {
    #[default]
    Active,
}

/// A consumer credit issued against a funding account.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Credit {
    pub id: CreditId,
    pub user: UserId,
    /// Account the principal was paid into and repayments are taken from.
    pub account: AccountId,
    pub principal: Decimal,
    /// Annual rate in percent (base rate plus margin).
    pub interest_rate: Decimal,
    pub term_months: u32,
    pub status: CreditStatus,
    pub issued_at: DateTime<Utc>,
}

/// Lifecycle of a schedule entry.
///
/// `Pending` is the only non-terminal state. An entry leaves it at most once.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Overdue,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Overdue => "overdue",
        };
        f.write_str(name)
    }
}

/// One monthly instalment of a credit's amortization schedule.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct ScheduleEntry {
    pub id: PaymentId,
    pub credit: CreditId,
    /// 1-based position in the schedule.
    pub payment_number: u32,
    /// Total due: principal plus interest, plus any late penalty.
    pub amount: Decimal,
    pub principal: Decimal,
    pub interest: Decimal,
    pub due_date: DateTime<Utc>,
    pub status: PaymentStatus,
}

impl ScheduleEntry {
    /// Marks the entry overdue and adds the late penalty to the amount due.
    pub fn mark_overdue(&mut self, penalty_rate: Decimal, scale: u32) {
        self.amount = (self.amount * (Decimal::ONE + penalty_rate)).round_dp(scale);
        self.status = PaymentStatus::Overdue;
    }

    pub fn mark_completed(&mut self) {
        self.status = PaymentStatus::Completed;
    }
}
