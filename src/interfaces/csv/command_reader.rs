use crate::application::engine::Command;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum Op {
    Open,
    Deposit,
    Transfer,
    Issue,
    Pay,
    #[serde(rename = "pay_due")]
    PayDue,
}

/// One CSV row. Columns irrelevant to an operation are left empty.
#[derive(Debug, Deserialize)]
struct CommandRecord {
    op: Op,
    user: Option<u64>,
    account: Option<u64>,
    target: Option<u64>,
    amount: Option<Decimal>,
    term: Option<u32>,
    currency: Option<String>,
    credit: Option<u64>,
    payment: Option<u64>,
}

fn required<T>(value: Option<T>, field: &str, op: Op) -> Result<T> {
    value.ok_or_else(|| LedgerError::Validation(format!("{op:?} requires '{field}'")))
}

impl TryFrom<CommandRecord> for Command {
    type Error = LedgerError;

    fn try_from(r: CommandRecord) -> Result<Self> {
        let op = r.op;
        let command = match op {
            Op::Open => Command::Open {
                user: required(r.user, "user", op)?,
                currency: required(r.currency, "currency", op)?,
            },
            Op::Deposit => Command::Deposit {
                account: required(r.account, "account", op)?,
                amount: required(r.amount, "amount", op)?,
            },
            Op::Transfer => Command::Transfer {
                from: required(r.account, "account", op)?,
                to: required(r.target, "target", op)?,
                amount: required(r.amount, "amount", op)?,
            },
            Op::Issue => Command::Issue {
                user: required(r.user, "user", op)?,
                account: required(r.account, "account", op)?,
                principal: required(r.amount, "amount", op)?,
                term_months: required(r.term, "term", op)?,
            },
            Op::Pay => Command::Pay {
                credit: required(r.credit, "credit", op)?,
                payment: required(r.payment, "payment", op)?,
            },
            Op::PayDue => Command::PayDue {
                credit: required(r.credit, "credit", op)?,
            },
        };
        Ok(command)
    }
}

/// Reads engine commands from a CSV source.
///
/// Header: `op,user,account,target,amount,term,currency,credit,payment`.
/// Whitespace is trimmed and short rows are accepted.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and converts commands, one result per row.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader
            .into_deserialize::<CommandRecord>()
            .map(|result| result.map_err(LedgerError::from).and_then(Command::try_from))
    }
}
