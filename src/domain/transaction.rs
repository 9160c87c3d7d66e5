use super::account::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type TransactionId = u64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Transfer,
    Deposit,
    /// Credit principal paid out to the funding account.
    Disbursement,
    /// Scheduled credit payment taken from the funding account.
    Repayment,
    /// Compensating entry written when a multi-step operation is rolled back.
    Reversal,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionKind::Transfer => "transfer",
            TransactionKind::Deposit => "deposit",
            TransactionKind::Disbursement => "disbursement",
            TransactionKind::Repayment => "repayment",
            TransactionKind::Reversal => "reversal",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Completed,
}

/// An immutable ledger entry recording one movement of money.
///
/// `from` is the debited account and `to` the credited one; a movement to or
/// from outside the ledger (deposit, disbursement, repayment) leaves one side
/// empty. `amount` is always positive.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub from: Option<AccountId>,
    pub to: Option<AccountId>,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Builds the entry for a single signed balance delta on `account`.
    pub fn for_delta(
        id: TransactionId,
        account: AccountId,
        delta: Decimal,
        kind: TransactionKind,
        created_at: DateTime<Utc>,
    ) -> Self {
        let (from, to) = if delta.is_sign_negative() {
            (Some(account), None)
        } else {
            (None, Some(account))
        };
        Self {
            id,
            from,
            to,
            amount: delta.abs(),
            kind,
            status: TransactionStatus::Completed,
            created_at,
        }
    }

    /// Signed effect of this entry on `account`'s balance.
    pub fn effect_on(&self, account: AccountId) -> Decimal {
        let mut effect = Decimal::ZERO;
        if self.to == Some(account) {
            effect += self.amount;
        }
        if self.from == Some(account) {
            effect -= self.amount;
        }
        effect
    }

    pub fn touches(&self, account: AccountId) -> bool {
        self.from == Some(account) || self.to == Some(account)
    }
}
