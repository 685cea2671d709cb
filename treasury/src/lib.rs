//! Cinder Treasury Operator
//!
//! Command-line front end for the supply engine. Holds the treasury key
//! locally, talks to one ledger gateway over JSON-RPC and runs one
//! operation per invocation, exiting with a status that tells the scheduler
//! which category of failure occurred.

pub mod commands;
pub mod config;
pub mod gateway;
pub mod keys;
pub mod lease;

pub use config::Settings;
pub use gateway::GatewayLedger;
pub use lease::CycleLease;
