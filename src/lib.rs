pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;

pub use application::engine::{Command, CommandOutcome, LedgerEngine, Stores};
pub use config::LedgerConfig;
pub use error::{LedgerError, Result};
