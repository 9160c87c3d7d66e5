use crate::domain::account::Account;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AccountRow<'a> {
    account: u64,
    user: u64,
    number: &'a str,
    balance: Decimal,
    currency: &'a str,
}

/// Writes final account balances as CSV.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes the header and one row per account, balances without trailing zeros.
    pub fn write_accounts(&mut self, accounts: Vec<Account>) -> Result<()> {
        for account in &accounts {
            self.writer.serialize(AccountRow {
                account: account.id,
                user: account.user,
                number: &account.number,
                balance: account.balance.value().normalize(),
                currency: account.currency.as_str(),
            })?;
        }
        if accounts.is_empty() {
            self.writer
                .write_record(["account", "user", "number", "balance", "currency"])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
