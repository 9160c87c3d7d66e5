//! Adapters for the domain ports.

pub mod clock;
pub mod ids;
pub mod in_memory;
pub mod notify;
pub mod rate;
