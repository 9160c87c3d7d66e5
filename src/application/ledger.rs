use super::bounded;
use crate::domain::account::{Account, AccountId, Amount, Currency, UserId};
use crate::domain::ports::{AccountStoreRef, ClockRef, IdGeneratorRef, IdKind, TransactionStoreRef};
use crate::domain::transaction::{Transaction, TransactionKind, TransactionStatus};
use crate::error::{Entity, LedgerError, Result};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Sole writer of account balances.
///
/// Every balance change goes through the store's atomic `adjust_balance`, so
/// mutations on one account are linearized by the store rather than by any
/// lock held here. Multi-leg operations undo applied legs when a later leg
/// fails; a ledger entry is only appended for deltas that stay applied.
pub struct LedgerCoordinator {
    accounts: AccountStoreRef,
    transactions: TransactionStoreRef,
    ids: IdGeneratorRef,
    clock: ClockRef,
    store_timeout: Duration,
}

impl LedgerCoordinator {
    pub fn new(
        accounts: AccountStoreRef,
        transactions: TransactionStoreRef,
        ids: IdGeneratorRef,
        clock: ClockRef,
        store_timeout: Duration,
    ) -> Self {
        Self {
            accounts,
            transactions,
            ids,
            clock,
            store_timeout,
        }
    }

    /// Opens an empty account with a freshly allocated number.
    pub async fn open_account(&self, user: UserId, currency: &str) -> Result<Account> {
        let currency = Currency::new(currency)?;
        let account = Account::new(
            self.ids.next_id(IdKind::Account),
            user,
            self.ids.next_account_number(),
            currency,
        );
        bounded(
            self.store_timeout,
            "insert account",
            self.accounts.insert(account.clone()),
        )
        .await?;
        info!(account = account.id, user, number = %account.number, "account opened");
        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account> {
        bounded(self.store_timeout, "get account", self.accounts.get(id))
            .await?
            .ok_or_else(|| LedgerError::not_found(Entity::Account, id))
    }

    /// All accounts ordered by id.
    pub async fn accounts(&self) -> Result<Vec<Account>> {
        let mut accounts = bounded(self.store_timeout, "list accounts", self.accounts.all()).await?;
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    /// Accounts owned by `user`, ordered by id.
    pub async fn accounts_for_user(&self, user: UserId) -> Result<Vec<Account>> {
        let mut accounts = self.accounts().await?;
        accounts.retain(|a| a.user == user);
        Ok(accounts)
    }

    pub async fn history(&self, account: AccountId) -> Result<Vec<Transaction>> {
        self.get_account(account).await?;
        bounded(
            self.store_timeout,
            "account history",
            self.transactions.for_account(account),
        )
        .await
    }

    pub async fn deposit(&self, account: AccountId, amount: Decimal) -> Result<Transaction> {
        let amount = Amount::new(amount)?;
        self.record_balance_delta(account, amount.value(), TransactionKind::Deposit)
            .await
    }

    /// Moves `amount` from one account to another.
    ///
    /// Both accounts are checked before anything is written. The debit is
    /// applied first; if the credit leg or the ledger append fails the applied
    /// legs are undone before the error is returned.
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<Transaction> {
        let amount = Amount::new(amount)?.value();
        if from == to {
            return Err(LedgerError::Validation(
                "cannot transfer to the same account".to_string(),
            ));
        }

        let source = self.get_account(from).await?;
        self.get_account(to).await?;
        if source.balance.value() < amount {
            return Err(LedgerError::InsufficientFunds {
                account: from,
                balance: source.balance.value(),
                requested: amount,
            });
        }

        // The store re-checks the balance atomically; the read above is only
        // a fast rejection.
        self.adjust(from, -amount).await?;

        if let Err(e) = self.adjust(to, amount).await {
            warn!(from, to, %amount, error = %e, "credit leg failed, reversing debit");
            self.undo("transfer", from, -amount, &e).await?;
            return Err(e);
        }

        let tx = Transaction {
            id: self.ids.next_id(IdKind::Transaction),
            from: Some(from),
            to: Some(to),
            amount,
            kind: TransactionKind::Transfer,
            status: TransactionStatus::Completed,
            created_at: self.clock.now(),
        };
        if let Err(e) = self.append(tx.clone()).await {
            warn!(from, to, %amount, error = %e, "ledger append failed, reversing transfer");
            self.undo("transfer", to, amount, &e).await?;
            self.undo("transfer", from, -amount, &e).await?;
            return Err(e);
        }

        info!(tx = tx.id, from, to, %amount, "transfer completed");
        Ok(tx)
    }

    /// Applies a signed delta to one account and records it in the ledger.
    pub async fn record_balance_delta(
        &self,
        account: AccountId,
        delta: Decimal,
        kind: TransactionKind,
    ) -> Result<Transaction> {
        if delta.is_zero() {
            return Err(LedgerError::Validation(
                "balance delta must not be zero".to_string(),
            ));
        }

        self.adjust(account, delta).await?;

        let tx = Transaction::for_delta(
            self.ids.next_id(IdKind::Transaction),
            account,
            delta,
            kind,
            self.clock.now(),
        );
        if let Err(e) = self.append(tx.clone()).await {
            warn!(account, %delta, error = %e, "ledger append failed, reversing delta");
            self.undo("balance delta", account, delta, &e).await?;
            return Err(e);
        }

        debug!(tx = tx.id, account, %delta, %kind, "balance delta recorded");
        Ok(tx)
    }

    async fn adjust(&self, account: AccountId, delta: Decimal) -> Result<Account> {
        bounded(
            self.store_timeout,
            "adjust balance",
            self.accounts.adjust_balance(account, delta),
        )
        .await
    }

    async fn append(&self, tx: Transaction) -> Result<()> {
        bounded(
            self.store_timeout,
            "append transaction",
            self.transactions.append(tx),
        )
        .await
    }

    /// Reverts a delta that was applied but must not stay.
    ///
    /// A failure here leaves money created or destroyed, so it is logged at
    /// error level and surfaced as `Consistency`.
    async fn undo(
        &self,
        operation: &'static str,
        account: AccountId,
        applied: Decimal,
        cause: &LedgerError,
    ) -> Result<()> {
        match self.adjust(account, -applied).await {
            Ok(_) => {
                info!(operation, account, reverted = %applied, "compensation applied");
                Ok(())
            }
            Err(e) => {
                error!(
                    operation,
                    account,
                    reverted = %applied,
                    cause = %cause,
                    error = %e,
                    "compensation failed; ledger requires reconciliation"
                );
                Err(LedgerError::Consistency {
                    operation,
                    details: format!(
                        "could not revert {applied} on account {account} after '{cause}': {e}"
                    ),
                })
            }
        }
    }
}
