use crate::domain::account::{Account, AccountId, UserId};
use crate::domain::credit::{Credit, CreditId, PaymentId, PaymentStatus, ScheduleEntry};
use crate::domain::ports::{AccountStore, CreditStore, TransactionStore};
use crate::domain::transaction::Transaction;
use crate::error::{Entity, LedgerError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for accounts.
///
/// `adjust_balance` checks and applies a delta under one write lock, which
/// makes every balance mutation linearizable.
#[derive(Default, Clone)]
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<BTreeMap<AccountId, Account>>>,
}

impl InMemoryAccountStore {
    /// Creates a new, empty in-memory account store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert(&self, account: Account) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.id) {
            return Err(LedgerError::Storage(format!(
                "account {} already exists",
                account.id
            )));
        }
        accounts.insert(account.id, account);
        Ok(())
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(&id).cloned())
    }

    async fn all(&self) -> Result<Vec<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().cloned().collect())
    }

    async fn adjust_balance(&self, id: AccountId, delta: Decimal) -> Result<Account> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found(Entity::Account, id))?;
        account.apply_delta(delta)?;
        Ok(account.clone())
    }
}

/// Append-only in-memory ledger.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    transactions: Arc<RwLock<Vec<Transaction>>>,
}

impl InMemoryTransactionStore {
    /// Creates a new, empty in-memory transaction store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn append(&self, tx: Transaction) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        transactions.push(tx);
        Ok(())
    }

    async fn for_account(&self, account: AccountId) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .iter()
            .filter(|tx| tx.touches(account))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct CreditTables {
    credits: HashMap<CreditId, Credit>,
    entries: HashMap<PaymentId, ScheduleEntry>,
}

/// In-memory credits and payment schedules.
///
/// Both tables sit behind one lock so schedule batches are all-or-nothing.
#[derive(Default, Clone)]
pub struct InMemoryCreditStore {
    tables: Arc<RwLock<CreditTables>>,
}

impl InMemoryCreditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CreditStore for InMemoryCreditStore {
    async fn put_credit(&self, credit: Credit) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.credits.insert(credit.id, credit);
        Ok(())
    }

    async fn get_credit(&self, id: CreditId) -> Result<Option<Credit>> {
        let tables = self.tables.read().await;
        Ok(tables.credits.get(&id).cloned())
    }

    async fn delete_credit(&self, id: CreditId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.credits.remove(&id);
        Ok(())
    }

    async fn credits_for_user(&self, user: UserId) -> Result<Vec<Credit>> {
        let tables = self.tables.read().await;
        let mut credits: Vec<Credit> = tables
            .credits
            .values()
            .filter(|c| c.user == user)
            .cloned()
            .collect();
        credits.sort_by_key(|c| c.id);
        Ok(credits)
    }

    async fn put_schedule(&self, entries: Vec<ScheduleEntry>) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(taken) = entries.iter().find(|e| tables.entries.contains_key(&e.id)) {
            return Err(LedgerError::Storage(format!(
                "schedule entry {} already exists",
                taken.id
            )));
        }
        for entry in entries {
            tables.entries.insert(entry.id, entry);
        }
        Ok(())
    }

    async fn delete_schedule(&self, credit: CreditId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.entries.retain(|_, e| e.credit != credit);
        Ok(())
    }

    async fn schedule(&self, credit: CreditId) -> Result<Vec<ScheduleEntry>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<ScheduleEntry> = tables
            .entries
            .values()
            .filter(|e| e.credit == credit)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.payment_number);
        Ok(entries)
    }

    async fn get_entry(&self, id: PaymentId) -> Result<Option<ScheduleEntry>> {
        let tables = self.tables.read().await;
        Ok(tables.entries.get(&id).cloned())
    }

    async fn update_entry(&self, entry: ScheduleEntry, expected: PaymentStatus) -> Result<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .entries
            .get_mut(&entry.id)
            .ok_or_else(|| LedgerError::not_found(Entity::Payment, entry.id))?;
        if stored.status != expected {
            return Err(LedgerError::AlreadyProcessed {
                payment: entry.id,
                status: stored.status,
            });
        }
        *stored = entry;
        Ok(())
    }
}
