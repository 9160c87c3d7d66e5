use bank_ledger::application::engine::{CommandOutcome, LedgerEngine};
use bank_ledger::config::LedgerConfig;
use bank_ledger::domain::ports::RateProvider;
use bank_ledger::error::Result as LedgerResult;
use bank_ledger::infrastructure::rate::{FixedRateProvider, UnavailableRateProvider};
use bank_ledger::interfaces::csv::account_writer::AccountWriter;
use bank_ledger::interfaces::csv::command_reader::CommandReader;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// JSON file overriding the default ledger configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base interest rate in percent. Without it credits cannot be issued.
    #[arg(long)]
    base_rate: Option<f64>,

    /// Percentage points added to the base rate (overrides the config file)
    #[arg(long)]
    margin: Option<Decimal>,

    /// Log verbosity written to stderr
    #[arg(long, default_value = "warn")]
    log_level: Level,
}

/// Either rate source, so the engine can take it by value.
enum CliRates {
    Fixed(FixedRateProvider),
    Unavailable(UnavailableRateProvider),
}

#[async_trait::async_trait]
impl RateProvider for CliRates {
    async fn base_rate(&self) -> LedgerResult<f64> {
        match self {
            CliRates::Fixed(p) => p.base_rate().await,
            CliRates::Unavailable(p) => p.base_rate().await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(cli.log_level)
        .init();

    let mut config = match &cli.config {
        Some(path) => LedgerConfig::load(path)?,
        None => LedgerConfig::default(),
    };
    if let Some(margin) = cli.margin {
        config.fixed_margin = margin;
        config.validate()?;
    }

    let rates = match cli.base_rate {
        Some(rate) => CliRates::Fixed(FixedRateProvider::new(rate)),
        None => CliRates::Unavailable(UnavailableRateProvider::new(
            "no base rate configured (use --base-rate)",
        )),
    };
    let engine = LedgerEngine::in_memory(rates, config);

    // Process commands
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command in reader.commands() {
        match command {
            Ok(command) => match engine.execute(command).await {
                Ok(CommandOutcome::PaidDue(outcomes)) => {
                    for outcome in outcomes {
                        if let Err(e) = outcome.result {
                            eprintln!("Error processing payment {}: {}", outcome.payment, e);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error processing command: {}", e);
                }
            },
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    let accounts = engine.into_results().await?;

    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer.write_accounts(accounts)?;

    Ok(())
}
