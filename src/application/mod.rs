//! Application layer orchestrating the domain.
//!
//! `LedgerCoordinator` owns balance mutation, `CreditIssuer` runs the issuance
//! saga and `PaymentProcessor` drives schedule entries through their
//! lifecycle. `LedgerEngine` wires the three together behind one entry point.

pub mod analytics;
pub mod credit;
pub mod engine;
pub mod ledger;
pub mod payment;

use crate::error::{LedgerError, Result};
use std::future::Future;
use std::time::Duration;

/// Runs one store call under a deadline.
///
/// Store adapters commit each call atomically, so a call abandoned at the
/// deadline has either fully applied before the timer fired or not at all.
pub(crate) async fn bounded<T, F>(limit: Duration, what: &'static str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| LedgerError::Timeout(what))?
}
