use super::bounded;
use super::ledger::LedgerCoordinator;
use crate::domain::account::{AccountId, UserId};
use crate::domain::credit::PaymentStatus;
use crate::domain::ports::{ClockRef, CreditStoreRef};
use crate::domain::transaction::TransactionKind;
use crate::error::{LedgerError, Result};
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// A user's outstanding credit obligations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreditLoad {
    pub active_credits: usize,
    pub total_principal: Decimal,
    /// Sum of the next pending instalment of every credit.
    pub monthly_payments: Decimal,
    /// Principal of all instalments not yet completed, overdue ones included.
    pub remaining_debt: Decimal,
    pub overdue_payments: usize,
    /// `remaining_debt` as a percentage of `total_principal`, two places.
    pub utilization: Decimal,
}

/// Expected end-of-day balance on one forecast day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub planned_expenses: Decimal,
    pub expected_balance: Decimal,
}

/// Day-by-day projection of a user's combined balance against the
/// instalments falling due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceForecast {
    pub start: NaiveDate,
    /// First day past the window.
    pub end: NaiveDate,
    pub initial_balance: Decimal,
    pub days: Vec<ForecastDay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KindTotals {
    pub count: usize,
    pub amount: Decimal,
}

/// Money flow through one account.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionSummary {
    pub inflow: Decimal,
    pub outflow: Decimal,
    pub net: Decimal,
    /// Keyed by kind in declaration order so reports are stable.
    pub by_kind: BTreeMap<TransactionKind, KindTotals>,
}

/// Read-only reporting over credits and the ledger.
pub struct Analytics {
    credits: CreditStoreRef,
    ledger: Arc<LedgerCoordinator>,
    clock: ClockRef,
    store_timeout: Duration,
}

impl Analytics {
    pub fn new(
        credits: CreditStoreRef,
        ledger: Arc<LedgerCoordinator>,
        clock: ClockRef,
        store_timeout: Duration,
    ) -> Self {
        Self {
            credits,
            ledger,
            clock,
            store_timeout,
        }
    }

    pub async fn credit_load(&self, user: UserId) -> Result<CreditLoad> {
        let credits = bounded(
            self.store_timeout,
            "list credits",
            self.credits.credits_for_user(user),
        )
        .await?;

        let mut load = CreditLoad {
            active_credits: credits.len(),
            ..CreditLoad::default()
        };
        for credit in credits {
            load.total_principal += credit.principal;
            let schedule =
                bounded(self.store_timeout, "get schedule", self.credits.schedule(credit.id)).await?;

            if let Some(next) = schedule.iter().find(|e| e.status == PaymentStatus::Pending) {
                load.monthly_payments += next.amount;
            }
            for entry in &schedule {
                match entry.status {
                    PaymentStatus::Completed => {}
                    PaymentStatus::Pending => load.remaining_debt += entry.principal,
                    PaymentStatus::Overdue => {
                        load.remaining_debt += entry.principal;
                        load.overdue_payments += 1;
                    }
                }
            }
        }
        if !load.total_principal.is_zero() {
            load.utilization = (load.remaining_debt / load.total_principal * Decimal::ONE_HUNDRED)
                .round_dp(2);
        }
        Ok(load)
    }

    /// Projects the user's total balance over the next `days` days, starting
    /// today, assuming every pending instalment is paid on its due date.
    pub async fn balance_forecast(&self, user: UserId, days: u32) -> Result<BalanceForecast> {
        if days == 0 {
            return Err(LedgerError::Validation(
                "forecast needs at least one day".to_string(),
            ));
        }
        let start = self.clock.now().date_naive();
        let end = start
            .checked_add_days(Days::new(u64::from(days)))
            .ok_or_else(|| LedgerError::Validation(format!("{days} day forecast is out of range")))?;

        let initial_balance: Decimal = self
            .ledger
            .accounts_for_user(user)
            .await?
            .iter()
            .map(|a| a.balance.value())
            .sum();

        let credits = bounded(
            self.store_timeout,
            "list credits",
            self.credits.credits_for_user(user),
        )
        .await?;
        let mut due: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for credit in credits {
            let schedule =
                bounded(self.store_timeout, "get schedule", self.credits.schedule(credit.id)).await?;
            for entry in schedule {
                let date = entry.due_date.date_naive();
                if entry.status == PaymentStatus::Pending && date >= start && date < end {
                    *due.entry(date).or_default() += entry.amount;
                }
            }
        }

        let mut balance = initial_balance;
        let forecast = start
            .iter_days()
            .take_while(|date| *date < end)
            .map(|date| {
                let planned_expenses = due.get(&date).copied().unwrap_or_default();
                balance -= planned_expenses;
                ForecastDay {
                    date,
                    planned_expenses,
                    expected_balance: balance,
                }
            })
            .collect();

        Ok(BalanceForecast {
            start,
            end,
            initial_balance,
            days: forecast,
        })
    }

    pub async fn transaction_summary(&self, account: AccountId) -> Result<TransactionSummary> {
        let history = self.ledger.history(account).await?;

        let mut summary = TransactionSummary::default();
        for tx in &history {
            let effect = tx.effect_on(account);
            if effect > Decimal::ZERO {
                summary.inflow += effect;
            } else {
                summary.outflow -= effect;
            }
            let totals = summary.by_kind.entry(tx.kind).or_default();
            totals.count += 1;
            totals.amount += tx.amount;
        }
        summary.net = summary.inflow - summary.outflow;
        Ok(summary)
    }
}
