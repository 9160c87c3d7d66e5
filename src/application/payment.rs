use super::bounded;
use super::ledger::LedgerCoordinator;
use crate::config::LedgerConfig;
use crate::domain::credit::{Credit, CreditId, PaymentId, PaymentStatus, ScheduleEntry};
use crate::domain::ports::{ClockRef, CreditStoreRef, Notification, NotifierRef};
use crate::domain::transaction::TransactionKind;
use crate::error::{Entity, LedgerError, Result};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of processing one entry during a batch run.
#[derive(Debug)]
pub struct DueOutcome {
    pub payment: PaymentId,
    pub result: Result<ScheduleEntry>,
}

/// Moves schedule entries out of `pending`.
///
/// An entry with enough funds behind it is claimed as `completed` and then
/// debited; otherwise the late penalty is added and it becomes `overdue`. Both
/// states are terminal. Every status write is conditional on the status the
/// caller last saw, so of two concurrent runs on one entry exactly one gets
/// to decide, and the debit only happens after that decision is stored.
pub struct PaymentProcessor {
    credits: CreditStoreRef,
    ledger: Arc<LedgerCoordinator>,
    clock: ClockRef,
    notifier: NotifierRef,
    config: LedgerConfig,
}

impl PaymentProcessor {
    pub fn new(
        credits: CreditStoreRef,
        ledger: Arc<LedgerCoordinator>,
        clock: ClockRef,
        notifier: NotifierRef,
        config: LedgerConfig,
    ) -> Self {
        Self {
            credits,
            ledger,
            clock,
            notifier,
            config,
        }
    }

    pub async fn process_payment(&self, credit: CreditId, payment: PaymentId) -> Result<ScheduleEntry> {
        let entry = bounded(
            self.config.store_timeout(),
            "get schedule entry",
            self.credits.get_entry(payment),
        )
        .await?
        .filter(|e| e.credit == credit)
        .ok_or_else(|| LedgerError::not_found(Entity::Payment, payment))?;

        if entry.status != PaymentStatus::Pending {
            debug!(credit, payment, status = %entry.status, "payment already processed");
            return Err(LedgerError::AlreadyProcessed {
                payment,
                status: entry.status,
            });
        }

        let credit = self.credit(credit).await?;
        let account = self.ledger.get_account(credit.account).await?;

        if account.balance.value() >= entry.amount {
            self.complete(&credit, entry).await
        } else {
            self.mark_overdue(&credit, entry, PaymentStatus::Pending).await
        }
    }

    /// Processes every pending entry of `credit` that is due by now, oldest first.
    pub async fn process_due_payments(&self, credit: CreditId) -> Result<Vec<DueOutcome>> {
        self.credit(credit).await?;
        let now = self.clock.now();
        let due: Vec<ScheduleEntry> = bounded(
            self.config.store_timeout(),
            "get schedule",
            self.credits.schedule(credit),
        )
        .await?
        .into_iter()
        .filter(|e| e.status == PaymentStatus::Pending && e.due_date <= now)
        .collect();

        let mut outcomes = Vec::with_capacity(due.len());
        for entry in due {
            let result = self.process_payment(credit, entry.id).await;
            outcomes.push(DueOutcome {
                payment: entry.id,
                result,
            });
        }
        Ok(outcomes)
    }

    async fn credit(&self, id: CreditId) -> Result<Credit> {
        bounded(
            self.config.store_timeout(),
            "get credit",
            self.credits.get_credit(id),
        )
        .await?
        .ok_or_else(|| LedgerError::not_found(Entity::Credit, id))
    }

    /// Claims the entry as completed, then debits the instalment.
    ///
    /// If the debit is refused for lack of funds the claim is turned into an
    /// overdue entry; any other debit failure hands the entry back as pending.
    async fn complete(&self, credit: &Credit, pending: ScheduleEntry) -> Result<ScheduleEntry> {
        let amount = pending.amount;
        let mut entry = pending.clone();
        entry.mark_completed();
        self.write_status(entry.clone(), PaymentStatus::Pending).await?;

        match self
            .ledger
            .record_balance_delta(credit.account, -amount, TransactionKind::Repayment)
            .await
        {
            Ok(_) => {}
            // Balance dropped between the read and the debit.
            Err(LedgerError::InsufficientFunds { .. }) => {
                return self
                    .mark_overdue(credit, pending, PaymentStatus::Completed)
                    .await
                    .map_err(|e| self.stranded(credit, &entry, e));
            }
            // The debit may have stuck; the claim stays for reconciliation.
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(
                    credit = credit.id,
                    payment = entry.id,
                    error = %e,
                    "debit failed after claim, releasing entry"
                );
                if let Err(release) = self.write_status(pending, PaymentStatus::Completed).await {
                    return Err(self.stranded(credit, &entry, release));
                }
                return Err(e);
            }
        }

        info!(credit = credit.id, payment = entry.id, %amount, "payment completed");
        self.notifier.notify(Notification::PaymentCompleted {
            credit: credit.id,
            payment: entry.id,
            amount,
        });
        Ok(entry)
    }

    /// Applies the late penalty and stores the entry as overdue, provided its
    /// status is still `expected`.
    async fn mark_overdue(
        &self,
        credit: &Credit,
        mut entry: ScheduleEntry,
        expected: PaymentStatus,
    ) -> Result<ScheduleEntry> {
        entry.mark_overdue(self.config.late_penalty_rate, self.config.minor_unit_scale);
        self.write_status(entry.clone(), expected).await?;

        info!(
            credit = credit.id,
            payment = entry.id,
            amount = %entry.amount,
            "payment overdue, late penalty applied"
        );
        self.notifier.notify(Notification::PaymentOverdue {
            credit: credit.id,
            payment: entry.id,
            amount: entry.amount,
        });
        Ok(entry)
    }

    async fn write_status(&self, entry: ScheduleEntry, expected: PaymentStatus) -> Result<()> {
        bounded(
            self.config.store_timeout(),
            "update schedule entry",
            self.credits.update_entry(entry, expected),
        )
        .await
    }

    /// An entry claimed as completed whose debit never landed and whose
    /// status could not be corrected.
    fn stranded(&self, credit: &Credit, claimed: &ScheduleEntry, cause: LedgerError) -> LedgerError {
        error!(
            credit = credit.id,
            payment = claimed.id,
            account = credit.account,
            amount = %claimed.amount,
            error = %cause,
            "entry marked completed without a debit; schedule requires reconciliation"
        );
        LedgerError::Consistency {
            operation: "process payment",
            details: format!(
                "payment {} is stored as completed but {} was not debited from account {}: {cause}",
                claimed.id, claimed.amount, credit.account
            ),
        }
    }
}
