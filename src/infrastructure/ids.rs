use crate::domain::ports::{IdGenerator, IdKind};
use std::sync::atomic::{AtomicU64, Ordering};

/// Deterministic id source: one monotonically increasing counter per kind,
/// starting at 1.
///
/// Account numbers are the configured prefix followed by the zero-padded
/// account-number sequence, twenty digits in total.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    accounts: AtomicU64,
    transactions: AtomicU64,
    credits: AtomicU64,
    payments: AtomicU64,
    numbers: AtomicU64,
    prefix: String,
}

impl SequentialIdGenerator {
    pub fn new(account_number_prefix: impl Into<String>) -> Self {
        Self {
            accounts: AtomicU64::new(0),
            transactions: AtomicU64::new(0),
            credits: AtomicU64::new(0),
            payments: AtomicU64::new(0),
            numbers: AtomicU64::new(0),
            prefix: account_number_prefix.into(),
        }
    }

    fn counter(&self, kind: IdKind) -> &AtomicU64 {
        match kind {
            IdKind::Account => &self.accounts,
            IdKind::Transaction => &self.transactions,
            IdKind::Credit => &self.credits,
            IdKind::Payment => &self.payments,
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new("")
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self, kind: IdKind) -> u64 {
        self.counter(kind).fetch_add(1, Ordering::Relaxed) + 1
    }

    fn next_account_number(&self) -> String {
        let seq = self.numbers.fetch_add(1, Ordering::Relaxed) + 1;
        let width = 20usize.saturating_sub(self.prefix.len());
        format!("{}{:0width$}", self.prefix, seq, width = width)
    }
}
