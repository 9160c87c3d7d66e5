//! Domain model: value objects, entities, amortization math and the ports the
//! application layer talks to.

pub mod account;
pub mod amortization;
pub mod credit;
pub mod ports;
pub mod transaction;
