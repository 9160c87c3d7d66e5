use super::account::{Account, AccountId, UserId};
use super::credit::{Credit, CreditId, PaymentId, PaymentStatus, ScheduleEntry};
use super::transaction::Transaction;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Persists a new account. Fails if the id is taken.
    async fn insert(&self, account: Account) -> Result<()>;
    async fn get(&self, id: AccountId) -> Result<Option<Account>>;
    async fn all(&self) -> Result<Vec<Account>>;
    /// Atomically applies a signed delta and returns the updated account.
    ///
    /// Must reject with `InsufficientFunds` (leaving the balance untouched)
    /// when the result would be negative, and with `NotFound` when the account
    /// does not exist. Concurrent calls on one account must not lose updates.
    async fn adjust_balance(&self, id: AccountId, delta: Decimal) -> Result<Account>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn append(&self, tx: Transaction) -> Result<()>;
    /// Entries touching `account`, oldest first.
    async fn for_account(&self, account: AccountId) -> Result<Vec<Transaction>>;
}

#[async_trait]
pub trait CreditStore: Send + Sync {
    async fn put_credit(&self, credit: Credit) -> Result<()>;
    async fn get_credit(&self, id: CreditId) -> Result<Option<Credit>>;
    /// Removing a missing credit is not an error.
    async fn delete_credit(&self, id: CreditId) -> Result<()>;
    async fn credits_for_user(&self, user: UserId) -> Result<Vec<Credit>>;

    /// Persists all entries of one schedule or none of them.
    async fn put_schedule(&self, entries: Vec<ScheduleEntry>) -> Result<()>;
    /// Removing a missing schedule is not an error.
    async fn delete_schedule(&self, credit: CreditId) -> Result<()>;
    /// Entries of `credit` ordered by payment number.
    async fn schedule(&self, credit: CreditId) -> Result<Vec<ScheduleEntry>>;
    async fn get_entry(&self, id: PaymentId) -> Result<Option<ScheduleEntry>>;
    /// Replaces an entry only if its stored status is still `expected`.
    ///
    /// Fails with `AlreadyProcessed` when another writer got there first.
    async fn update_entry(&self, entry: ScheduleEntry, expected: PaymentStatus) -> Result<()>;
}

/// Source of the base interest rate, in percent.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fails with `ExternalServiceUnavailable`; never blocks indefinitely.
    async fn base_rate(&self) -> Result<f64>;
}

/// Outbound customer notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    CreditIssued {
        user: UserId,
        credit: CreditId,
        principal: Decimal,
        first_due: DateTime<Utc>,
    },
    PaymentCompleted {
        credit: CreditId,
        payment: PaymentId,
        amount: Decimal,
    },
    PaymentOverdue {
        credit: CreditId,
        payment: PaymentId,
        amount: Decimal,
    },
}

/// Fire-and-forget delivery: implementations must return immediately and
/// swallow their own failures.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Account,
    Transaction,
    Credit,
    Payment,
}

pub trait IdGenerator: Send + Sync {
    fn next_id(&self, kind: IdKind) -> u64;
    fn next_account_number(&self) -> String;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type AccountStoreRef = Arc<dyn AccountStore>;
pub type TransactionStoreRef = Arc<dyn TransactionStore>;
pub type CreditStoreRef = Arc<dyn CreditStore>;
pub type RateProviderRef = Arc<dyn RateProvider>;
pub type NotifierRef = Arc<dyn Notifier>;
pub type IdGeneratorRef = Arc<dyn IdGenerator>;
pub type ClockRef = Arc<dyn Clock>;
