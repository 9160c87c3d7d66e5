use super::analytics::Analytics;
use super::credit::{CreditIssuer, IssuedCredit};
use super::ledger::LedgerCoordinator;
use super::payment::{DueOutcome, PaymentProcessor};
use crate::config::LedgerConfig;
use crate::domain::account::{Account, AccountId, UserId};
use crate::domain::credit::{CreditId, PaymentId, ScheduleEntry};
use crate::domain::ports::{
    AccountStoreRef, ClockRef, CreditStoreRef, IdGeneratorRef, NotifierRef, RateProvider,
    TransactionStoreRef,
};
use crate::domain::transaction::Transaction;
use crate::error::Result;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::ids::SequentialIdGenerator;
use crate::infrastructure::in_memory::{
    InMemoryAccountStore, InMemoryCreditStore, InMemoryTransactionStore,
};
use crate::infrastructure::notify::LogNotifier;
use crate::infrastructure::rate::TimeoutRateProvider;
use rust_decimal::Decimal;
use std::sync::Arc;

/// The persistence ports the engine runs on.
#[derive(Clone)]
pub struct Stores {
    pub accounts: AccountStoreRef,
    pub transactions: TransactionStoreRef,
    pub credits: CreditStoreRef,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            accounts: Arc::new(InMemoryAccountStore::new()),
            transactions: Arc::new(InMemoryTransactionStore::new()),
            credits: Arc::new(InMemoryCreditStore::new()),
        }
    }
}

/// One request to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open {
        user: UserId,
        currency: String,
    },
    Deposit {
        account: AccountId,
        amount: Decimal,
    },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    },
    Issue {
        user: UserId,
        account: AccountId,
        principal: Decimal,
        term_months: u32,
    },
    Pay {
        credit: CreditId,
        payment: PaymentId,
    },
    PayDue {
        credit: CreditId,
    },
}

#[derive(Debug)]
pub enum CommandOutcome {
    Opened(Account),
    Recorded(Transaction),
    Issued(IssuedCredit),
    Paid(ScheduleEntry),
    PaidDue(Vec<DueOutcome>),
}

/// Entry point wiring the coordinator, issuer and processor over one set of
/// stores.
pub struct LedgerEngine {
    ledger: Arc<LedgerCoordinator>,
    issuer: CreditIssuer,
    processor: PaymentProcessor,
    analytics: Analytics,
}

impl LedgerEngine {
    /// Creates a new `LedgerEngine`.
    ///
    /// The rate provider is wrapped so every call honours
    /// `config.rate_timeout()`.
    pub fn new<R: RateProvider + 'static>(
        stores: Stores,
        rates: R,
        notifier: NotifierRef,
        ids: IdGeneratorRef,
        clock: ClockRef,
        config: LedgerConfig,
    ) -> Self {
        let ledger = Arc::new(LedgerCoordinator::new(
            stores.accounts,
            stores.transactions,
            ids.clone(),
            clock.clone(),
            config.store_timeout(),
        ));
        let rates = Arc::new(TimeoutRateProvider::new(rates, config.rate_timeout()));
        let issuer = CreditIssuer::new(
            stores.credits.clone(),
            ledger.clone(),
            rates,
            ids,
            clock.clone(),
            notifier.clone(),
            config.clone(),
        );
        let analytics = Analytics::new(
            stores.credits.clone(),
            ledger.clone(),
            clock.clone(),
            config.store_timeout(),
        );
        let processor = PaymentProcessor::new(stores.credits, ledger.clone(), clock, notifier, config);
        Self {
            ledger,
            issuer,
            processor,
            analytics,
        }
    }

    /// In-memory engine with sequential ids, the system clock and log notifications.
    pub fn in_memory<R: RateProvider + 'static>(rates: R, config: LedgerConfig) -> Self {
        let ids = Arc::new(SequentialIdGenerator::new(config.account_number_prefix.clone()));
        Self::new(
            Stores::in_memory(),
            rates,
            Arc::new(LogNotifier),
            ids,
            Arc::new(SystemClock),
            config,
        )
    }

    pub fn ledger(&self) -> &LedgerCoordinator {
        &self.ledger
    }

    pub fn issuer(&self) -> &CreditIssuer {
        &self.issuer
    }

    pub fn processor(&self) -> &PaymentProcessor {
        &self.processor
    }

    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    pub async fn execute(&self, command: Command) -> Result<CommandOutcome> {
        match command {
            Command::Open { user, currency } => self
                .ledger
                .open_account(user, &currency)
                .await
                .map(CommandOutcome::Opened),
            Command::Deposit { account, amount } => self
                .ledger
                .deposit(account, amount)
                .await
                .map(CommandOutcome::Recorded),
            Command::Transfer { from, to, amount } => self
                .ledger
                .transfer(from, to, amount)
                .await
                .map(CommandOutcome::Recorded),
            Command::Issue {
                user,
                account,
                principal,
                term_months,
            } => self
                .issuer
                .issue_credit(user, account, principal, term_months)
                .await
                .map(CommandOutcome::Issued),
            Command::Pay { credit, payment } => self
                .processor
                .process_payment(credit, payment)
                .await
                .map(CommandOutcome::Paid),
            Command::PayDue { credit } => self
                .processor
                .process_due_payments(credit)
                .await
                .map(CommandOutcome::PaidDue),
        }
    }

    /// Consumes the engine and returns the final state of all accounts.
    pub async fn into_results(self) -> Result<Vec<Account>> {
        self.ledger.accounts().await
    }
}
