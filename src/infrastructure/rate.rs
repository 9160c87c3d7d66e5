use crate::domain::ports::RateProvider;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// Always reports the same base rate.
#[derive(Debug, Clone, Copy)]
pub struct FixedRateProvider {
    rate: f64,
}

impl FixedRateProvider {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

#[async_trait]
impl RateProvider for FixedRateProvider {
    async fn base_rate(&self) -> Result<f64> {
        Ok(self.rate)
    }
}

/// Stand-in used when no rate source is configured.
#[derive(Debug, Clone, Default)]
pub struct UnavailableRateProvider {
    reason: String,
}

impl UnavailableRateProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl RateProvider for UnavailableRateProvider {
    async fn base_rate(&self) -> Result<f64> {
        Err(LedgerError::ExternalServiceUnavailable(self.reason.clone()))
    }
}

/// Bounds every call to the inner provider.
///
/// An elapsed deadline is reported as `ExternalServiceUnavailable`, the same
/// as any other provider failure.
pub struct TimeoutRateProvider<P> {
    inner: P,
    timeout: Duration,
}

impl<P: RateProvider> TimeoutRateProvider<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<P: RateProvider> RateProvider for TimeoutRateProvider<P> {
    async fn base_rate(&self) -> Result<f64> {
        match tokio::time::timeout(self.timeout, self.inner.base_rate()).await {
            Ok(Ok(rate)) if rate.is_finite() && rate >= 0.0 => Ok(rate),
            Ok(Ok(rate)) => Err(LedgerError::ExternalServiceUnavailable(format!(
                "rate provider returned an invalid rate: {rate}"
            ))),
            Ok(Err(LedgerError::ExternalServiceUnavailable(reason))) => {
                Err(LedgerError::ExternalServiceUnavailable(reason))
            }
            Ok(Err(e)) => Err(LedgerError::ExternalServiceUnavailable(e.to_string())),
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "rate provider timed out");
                Err(LedgerError::ExternalServiceUnavailable(format!(
                    "rate provider did not answer within {:?}",
                    self.timeout
                )))
            }
        }
    }
}
