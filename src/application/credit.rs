use super::bounded;
use super::ledger::LedgerCoordinator;
use crate::config::LedgerConfig;
use crate::domain::account::{AccountId, Amount, UserId};
use crate::domain::amortization::annuity_schedule;
use crate::domain::credit::{Credit, CreditId, CreditStatus, PaymentStatus, ScheduleEntry};
use crate::domain::ports::{
    ClockRef, CreditStoreRef, IdGeneratorRef, IdKind, Notification, NotifierRef, RateProviderRef,
};
use crate::domain::transaction::TransactionKind;
use crate::error::{Entity, LedgerError, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

/// A credit together with the schedule generated for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredit {
    pub credit: Credit,
    pub schedule: Vec<ScheduleEntry>,
}

/// Issuance saga steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Step {
    RecordCredit,
    FundAccount,
    PersistSchedule,
}

/// Issues credits: prices them off the base rate, records them, pays the
/// principal out and persists the repayment schedule.
///
/// The three writes form a saga. When a step fails, the effects of the steps
/// before it are compensated in reverse order: the schedule is dropped, the
/// disbursement reversed and the credit record deleted.
pub struct CreditIssuer {
    credits: CreditStoreRef,
    ledger: Arc<LedgerCoordinator>,
    rates: RateProviderRef,
    ids: IdGeneratorRef,
    clock: ClockRef,
    notifier: NotifierRef,
    config: LedgerConfig,
}

impl CreditIssuer {
    pub fn new(
        credits: CreditStoreRef,
        ledger: Arc<LedgerCoordinator>,
        rates: RateProviderRef,
        ids: IdGeneratorRef,
        clock: ClockRef,
        notifier: NotifierRef,
        config: LedgerConfig,
    ) -> Self {
        Self {
            credits,
            ledger,
            rates,
            ids,
            clock,
            notifier,
            config,
        }
    }

    pub async fn issue_credit(
        &self,
        user: UserId,
        account: AccountId,
        principal: Decimal,
        term_months: u32,
    ) -> Result<IssuedCredit> {
        let principal = Amount::new(principal)?.value();
        if term_months == 0 || term_months > self.config.max_term_months {
            return Err(LedgerError::Validation(format!(
                "term must be between 1 and {} months, got {term_months}",
                self.config.max_term_months
            )));
        }
        let funding = self.ledger.get_account(account).await?;
        if funding.user != user {
            return Err(LedgerError::Validation(format!(
                "account {account} does not belong to user {user}"
            )));
        }

        // Nothing is written or locked while waiting on the rate source.
        let base_rate = self.base_rate(user, account).await?;
        let interest_rate = base_rate
            .checked_add(self.config.fixed_margin)
            .ok_or_else(|| LedgerError::Validation(format!("base rate {base_rate} out of range")))?;

        let credit = Credit {
            id: self.ids.next_id(IdKind::Credit),
            user,
            account,
            principal,
            interest_rate,
            term_months,
            status: CreditStatus::Active,
            issued_at: self.clock.now(),
        };
        // Built before any write so an unschedulable credit leaves no trace.
        let schedule = self.build_schedule(&credit)?;

        if let Err(e) = self.record_credit(&credit).await {
            return Err(self.roll_back(&credit, Step::RecordCredit, e).await);
        }

        if let Err(e) = self
            .ledger
            .record_balance_delta(account, principal, TransactionKind::Disbursement)
            .await
        {
            return Err(self.roll_back(&credit, Step::FundAccount, e).await);
        }

        if let Err(e) = self.persist_schedule(&schedule).await {
            return Err(self.roll_back(&credit, Step::PersistSchedule, e).await);
        }

        info!(
            credit = credit.id,
            user,
            account,
            %principal,
            rate = %interest_rate,
            term_months,
            "credit issued"
        );
        if let Some(first) = schedule.first() {
            self.notifier.notify(Notification::CreditIssued {
                user,
                credit: credit.id,
                principal,
                first_due: first.due_date,
            });
        }

        Ok(IssuedCredit { credit, schedule })
    }

    pub async fn get_credit(&self, id: CreditId) -> Result<Credit> {
        bounded(
            self.config.store_timeout(),
            "get credit",
            self.credits.get_credit(id),
        )
        .await?
        .ok_or_else(|| LedgerError::not_found(Entity::Credit, id))
    }

    pub async fn credits_for_user(&self, user: UserId) -> Result<Vec<Credit>> {
        bounded(
            self.config.store_timeout(),
            "list credits",
            self.credits.credits_for_user(user),
        )
        .await
    }

    /// The credit's schedule ordered by payment number.
    pub async fn payment_schedule(&self, credit: CreditId) -> Result<Vec<ScheduleEntry>> {
        self.get_credit(credit).await?;
        bounded(
            self.config.store_timeout(),
            "get schedule",
            self.credits.schedule(credit),
        )
        .await
    }

    async fn base_rate(&self, user: UserId, account: AccountId) -> Result<Decimal> {
        let rate = match self.rates.base_rate().await {
            Ok(rate) => rate,
            Err(e) => {
                warn!(user, account, error = %e, "base rate unavailable, credit not issued");
                return Err(if matches!(e, LedgerError::ExternalServiceUnavailable(_)) {
                    e
                } else {
                    LedgerError::ExternalServiceUnavailable(e.to_string())
                });
            }
        };
        Decimal::try_from(rate)
            .ok()
            .filter(|r| *r >= Decimal::ZERO)
            .map(|r| r.round_dp(4))
            .ok_or_else(|| {
                warn!(user, account, rate, "rate provider returned an unusable rate");
                LedgerError::ExternalServiceUnavailable(format!("unusable base rate {rate}"))
            })
    }

    async fn record_credit(&self, credit: &Credit) -> Result<()> {
        bounded(
            self.config.store_timeout(),
            "put credit",
            self.credits.put_credit(credit.clone()),
        )
        .await
    }

    fn build_schedule(&self, credit: &Credit) -> Result<Vec<ScheduleEntry>> {
        let payments = annuity_schedule(
            credit.principal,
            credit.interest_rate,
            credit.term_months,
            credit.issued_at,
            self.config.minor_unit_scale,
        )?;

        Ok(payments
            .into_iter()
            .map(|p| ScheduleEntry {
                id: self.ids.next_id(IdKind::Payment),
                credit: credit.id,
                payment_number: p.payment_number,
                amount: p.amount,
                principal: p.principal,
                interest: p.interest,
                due_date: p.due_date,
                status: PaymentStatus::Pending,
            })
            .collect())
    }

    async fn persist_schedule(&self, entries: &[ScheduleEntry]) -> Result<()> {
        bounded(
            self.config.store_timeout(),
            "put schedule",
            self.credits.put_schedule(entries.to_vec()),
        )
        .await
    }

    /// Compensates every step up to and including `failed`, newest first.
    ///
    /// Compensations are idempotent, so the failed step's own compensation
    /// also runs in case its write landed before the error. All of them are
    /// attempted even if one fails; any failure turns the outcome into a
    /// `Consistency` error.
    async fn roll_back(&self, credit: &Credit, failed: Step, cause: LedgerError) -> LedgerError {
        warn!(
            credit = credit.id,
            account = credit.account,
            step = ?failed,
            error = %cause,
            "credit issuance failed, compensating"
        );
        let mut failures = Vec::new();
        let timeout = self.config.store_timeout();

        if failed >= Step::PersistSchedule {
            let deleted =
                bounded(timeout, "delete schedule", self.credits.delete_schedule(credit.id)).await;
            if let Err(e) = deleted {
                failures.push(format!("delete schedule: {e}"));
            }
            if let Err(e) = self
                .ledger
                .record_balance_delta(credit.account, -credit.principal, TransactionKind::Reversal)
                .await
            {
                failures.push(format!("reverse disbursement of {}: {e}", credit.principal));
            }
        }
        let deleted = bounded(timeout, "delete credit", self.credits.delete_credit(credit.id)).await;
        if let Err(e) = deleted {
            failures.push(format!("delete credit: {e}"));
        }

        if failures.is_empty() {
            return cause;
        }
        error!(
            credit = credit.id,
            account = credit.account,
            user = credit.user,
            step = ?failed,
            cause = %cause,
            failures = ?failures,
            "credit issuance compensation failed; ledger requires reconciliation"
        );
        LedgerError::Consistency {
            operation: "issue credit",
            details: format!(
                "credit {} after '{cause}': {}",
                credit.id,
                failures.join("; ")
            ),
        }
    }
}
