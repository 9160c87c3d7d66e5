//! Outer adapters used by the command line driver.

pub mod csv {
    pub mod account_writer;
    pub mod command_reader;
}
