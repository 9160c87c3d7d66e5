use crate::domain::credit::PaymentStatus;
use miette::Diagnostic;
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// The kind of record a `NotFound` error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Account,
    Credit,
    Payment,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Account => "account",
            Entity::Credit => "credit",
            Entity::Payment => "payment",
        };
        f.write_str(name)
    }
}

#[derive(Error, Diagnostic, Debug)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    #[diagnostic(code(ledger::validation))]
    Validation(String),

    #[error("{entity} {id} not found")]
    #[diagnostic(code(ledger::not_found))]
    NotFound { entity: Entity, id: u64 },

    #[error("insufficient funds in account {account}: balance {balance}, requested {requested}")]
    #[diagnostic(code(ledger::insufficient_funds))]
    InsufficientFunds {
        account: u64,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("external service unavailable: {0}")]
    #[diagnostic(code(ledger::external_service), help("the call can be retried"))]
    ExternalServiceUnavailable(String),

    #[error("payment {payment} already processed (status: {status})")]
    #[diagnostic(code(ledger::already_processed))]
    AlreadyProcessed { payment: u64, status: PaymentStatus },

    #[error("ledger inconsistent after failed compensation in {operation}: {details}")]
    #[diagnostic(
        code(ledger::consistency),
        help("manual reconciliation of the affected accounts is required")
    )]
    Consistency {
        operation: &'static str,
        details: String,
    },

    #[error("operation timed out: {0}")]
    #[diagnostic(code(ledger::timeout))]
    Timeout(&'static str),

    #[error("storage error: {0}")]
    #[diagnostic(code(ledger::storage))]
    Storage(String),

    #[error("configuration error: {0}")]
    #[diagnostic(code(ledger::config))]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    pub fn not_found(entity: Entity, id: u64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Failures a caller may retry unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExternalServiceUnavailable(_) | Self::Timeout(_)
        )
    }

    /// Expected rejections that are not faults of the system.
    pub fn is_business_outcome(&self) -> bool {
        matches!(
            self,
            Self::InsufficientFunds { .. } | Self::AlreadyProcessed { .. }
        )
    }

    /// Errors signalling that money conservation may have been violated.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Consistency { .. })
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
