use crate::error::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type AccountId = u64;
pub type UserId = u64;

/// Represents a monetary balance held by an account.
///
/// This is a wrapper around `rust_decimal::Decimal`. Stored balances are never
/// negative; the store rejects any delta that would make them so.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

/// Represents a strictly positive monetary amount moved by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, LedgerError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(LedgerError::Validation(format!(
                "amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Returns the balance after applying `delta`, or `None` if it would go
    /// negative or overflow.
    pub fn checked_apply(self, delta: Decimal) -> Option<Self> {
        self.0
            .checked_add(delta)
            .filter(|next| *next >= Decimal::ZERO)
            .map(Self)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// ISO-4217 style three letter currency code, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Result<Self, LedgerError> {
        let code = code.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(LedgerError::Validation(format!(
                "currency must be a three letter code, got {code:?}"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A customer's bank account.
///
/// The balance is only ever changed through the store's atomic
/// `adjust_balance`, which the ledger coordinator drives.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Account {
    /// The unique identifier of the account.
    pub id: AccountId,
    /// The user owning the account.
    pub user: UserId,
    /// Twenty digit account number.
    pub number: String,
    /// Current funds.
    pub balance: Balance,
    pub currency: Currency,
}

impl Account {
    pub fn new(id: AccountId, user: UserId, number: String, currency: Currency) -> Self {
        Self {
            id,
            user,
            number,
            balance: Balance::ZERO,
            currency,
        }
    }

    /// Applies a signed delta, refusing to take the balance below zero.
    pub fn apply_delta(&mut self, delta: Decimal) -> Result<(), LedgerError> {
        match self.balance.checked_apply(delta) {
            Some(next) => {
                self.balance = next;
                Ok(())
            }
            None if delta > Decimal::ZERO => Err(LedgerError::Validation(format!(
                "crediting {delta} would overflow the balance of account {}",
                self.id
            ))),
            None => Err(LedgerError::InsufficientFunds {
                account: self.id,
                balance: self.balance.value(),
                requested: -delta,
            }),
        }
    }
}
