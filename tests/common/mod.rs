#![allow(dead_code)]

use async_trait::async_trait;
use bank_ledger::application::engine::{LedgerEngine, Stores};
use bank_ledger::config::LedgerConfig;
use bank_ledger::domain::account::{Account, AccountId, UserId};
use bank_ledger::domain::credit::{Credit, CreditId, PaymentId, PaymentStatus, ScheduleEntry};
use bank_ledger::domain::ports::{
    AccountStore, CreditStore, Notification, RateProvider, TransactionStore,
};
use bank_ledger::domain::transaction::Transaction;
use bank_ledger::error::{LedgerError, Result};
use bank_ledger::infrastructure::clock::FixedClock;
use bank_ledger::infrastructure::ids::SequentialIdGenerator;
use bank_ledger::infrastructure::in_memory::{
    InMemoryAccountStore, InMemoryCreditStore, InMemoryTransactionStore,
};
use bank_ledger::infrastructure::notify::ChannelNotifier;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

type AdjustFault = Box<dyn Fn(AccountId, Decimal) -> bool + Send + Sync>;
type AppendFault = Box<dyn Fn(&Transaction) -> bool + Send + Sync>;
type UpdateFault = Box<dyn Fn(&ScheduleEntry, PaymentStatus) -> bool + Send + Sync>;

fn injected(what: &str) -> LedgerError {
    LedgerError::Storage(format!("injected failure: {what}"))
}

/// Account store that rejects balance adjustments matching a predicate.
#[derive(Default)]
pub struct FaultyAccountStore {
    inner: InMemoryAccountStore,
    fail_adjust: Mutex<Option<AdjustFault>>,
}

impl FaultyAccountStore {
    pub fn fail_adjust_when(&self, fault: impl Fn(AccountId, Decimal) -> bool + Send + Sync + 'static) {
        *self.fail_adjust.lock().unwrap() = Some(Box::new(fault));
    }

    pub fn heal(&self) {
        *self.fail_adjust.lock().unwrap() = None;
    }
}

#[async_trait]
impl AccountStore for FaultyAccountStore {
    async fn insert(&self, account: Account) -> Result<()> {
        self.inner.insert(account).await
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        self.inner.get(id).await
    }

    async fn all(&self) -> Result<Vec<Account>> {
        self.inner.all().await
    }

    async fn adjust_balance(&self, id: AccountId, delta: Decimal) -> Result<Account> {
        let fails = self
            .fail_adjust
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|fault| fault(id, delta));
        if fails {
            return Err(injected("adjust balance"));
        }
        self.inner.adjust_balance(id, delta).await
    }
}

/// Transaction store that rejects appends matching a predicate.
#[derive(Default)]
pub struct FaultyTransactionStore {
    inner: InMemoryTransactionStore,
    fail_append: Mutex<Option<AppendFault>>,
}

impl FaultyTransactionStore {
    pub fn fail_append_when(&self, fault: impl Fn(&Transaction) -> bool + Send + Sync + 'static) {
        *self.fail_append.lock().unwrap() = Some(Box::new(fault));
    }
}

#[async_trait]
impl TransactionStore for FaultyTransactionStore {
    async fn append(&self, tx: Transaction) -> Result<()> {
        let fails = self
            .fail_append
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|fault| fault(&tx));
        if fails {
            return Err(injected("append transaction"));
        }
        self.inner.append(tx).await
    }

    async fn for_account(&self, account: AccountId) -> Result<Vec<Transaction>> {
        self.inner.for_account(account).await
    }
}

/// Credit store with switchable failures per write.
#[derive(Default)]
pub struct FaultyCreditStore {
    inner: InMemoryCreditStore,
    pub fail_put_credit: AtomicBool,
    pub fail_put_schedule: AtomicBool,
    pub fail_delete: AtomicBool,
    fail_update: Mutex<Option<UpdateFault>>,
    slow_update: Mutex<Option<(PaymentStatus, Duration)>>,
}

impl FaultyCreditStore {
    /// Rejects entry updates for which `fault(new_entry, expected_status)` holds.
    pub fn fail_update_when(
        &self,
        fault: impl Fn(&ScheduleEntry, PaymentStatus) -> bool + Send + Sync + 'static,
    ) {
        *self.fail_update.lock().unwrap() = Some(Box::new(fault));
    }

    /// Holds back every update that moves an entry to `status`.
    pub fn delay_updates_to(&self, status: PaymentStatus, delay: Duration) {
        *self.slow_update.lock().unwrap() = Some((status, delay));
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(injected(what));
        }
        Ok(())
    }
}

#[async_trait]
impl CreditStore for FaultyCreditStore {
    async fn put_credit(&self, credit: Credit) -> Result<()> {
        Self::check(&self.fail_put_credit, "put credit")?;
        self.inner.put_credit(credit).await
    }

    async fn get_credit(&self, id: CreditId) -> Result<Option<Credit>> {
        self.inner.get_credit(id).await
    }

    async fn delete_credit(&self, id: CreditId) -> Result<()> {
        Self::check(&self.fail_delete, "delete credit")?;
        self.inner.delete_credit(id).await
    }

    async fn credits_for_user(&self, user: UserId) -> Result<Vec<Credit>> {
        self.inner.credits_for_user(user).await
    }

    async fn put_schedule(&self, entries: Vec<ScheduleEntry>) -> Result<()> {
        Self::check(&self.fail_put_schedule, "put schedule")?;
        self.inner.put_schedule(entries).await
    }

    async fn delete_schedule(&self, credit: CreditId) -> Result<()> {
        Self::check(&self.fail_delete, "delete schedule")?;
        self.inner.delete_schedule(credit).await
    }

    async fn schedule(&self, credit: CreditId) -> Result<Vec<ScheduleEntry>> {
        self.inner.schedule(credit).await
    }

    async fn get_entry(&self, id: PaymentId) -> Result<Option<ScheduleEntry>> {
        self.inner.get_entry(id).await
    }

    async fn update_entry(&self, entry: ScheduleEntry, expected: PaymentStatus) -> Result<()> {
        let delay = *self.slow_update.lock().unwrap();
        if let Some((status, delay)) = delay {
            if entry.status == status {
                tokio::time::sleep(delay).await;
            }
        }
        let fails = self
            .fail_update
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|fault| fault(&entry, expected));
        if fails {
            return Err(injected("update entry"));
        }
        self.inner.update_entry(entry, expected).await
    }
}

/// Rate source that answers only after a delay.
pub struct SlowRateProvider {
    pub delay: Duration,
    pub rate: f64,
}

#[async_trait]
impl RateProvider for SlowRateProvider {
    async fn base_rate(&self) -> Result<f64> {
        tokio::time::sleep(self.delay).await;
        Ok(self.rate)
    }
}

pub fn issue_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
}

/// An engine over fault-injecting stores, a fixed clock and a notification
/// channel.
pub struct Harness {
    pub engine: LedgerEngine,
    pub accounts: Arc<FaultyAccountStore>,
    pub transactions: Arc<FaultyTransactionStore>,
    pub credits: Arc<FaultyCreditStore>,
    pub clock: Arc<FixedClock>,
    pub notifications: UnboundedReceiver<Notification>,
}

impl Harness {
    pub fn new<R: RateProvider + 'static>(rates: R) -> Self {
        Self::with_config(rates, LedgerConfig::default())
    }

    pub fn with_config<R: RateProvider + 'static>(rates: R, config: LedgerConfig) -> Self {
        let accounts = Arc::new(FaultyAccountStore::default());
        let transactions = Arc::new(FaultyTransactionStore::default());
        let credits = Arc::new(FaultyCreditStore::default());
        let clock = Arc::new(FixedClock::new(issue_date()));
        let (notifier, notifications) = ChannelNotifier::new();

        let stores = Stores {
            accounts: accounts.clone(),
            transactions: transactions.clone(),
            credits: credits.clone(),
        };
        let engine = LedgerEngine::new(
            stores,
            rates,
            Arc::new(notifier),
            Arc::new(SequentialIdGenerator::new(config.account_number_prefix.clone())),
            clock.clone(),
            config,
        );

        Self {
            engine,
            accounts,
            transactions,
            credits,
            clock,
            notifications,
        }
    }

    /// Opens an account for `user` and deposits `amount` into it.
    pub async fn open_funded(&self, user: UserId, amount: Decimal) -> AccountId {
        let ledger = self.engine.ledger();
        let account = ledger.open_account(user, "RUB").await.unwrap();
        if !amount.is_zero() {
            ledger.deposit(account.id, amount).await.unwrap();
        }
        account.id
    }

    pub async fn balance(&self, account: AccountId) -> Decimal {
        self.engine
            .ledger()
            .get_account(account)
            .await
            .unwrap()
            .balance
            .value()
    }

    /// Sum of all balances.
    pub async fn total(&self) -> Decimal {
        self.engine
            .ledger()
            .accounts()
            .await
            .unwrap()
            .iter()
            .map(|a| a.balance.value())
            .sum()
    }

    /// Net ledger effect on `account`, which must equal its balance.
    pub async fn ledger_net(&self, account: AccountId) -> Decimal {
        self.engine
            .ledger()
            .history(account)
            .await
            .unwrap()
            .iter()
            .map(|tx| tx.effect_on(account))
            .sum()
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            out.push(n);
        }
        out
    }
}
