//! Cinder Supply Engine
//!
//! Keeps a fee-bearing token's circulating supply in line with its
//! deployment record, talking to the ledger only through signed
//! instructions.
//!
//! ## Operations
//!
//! - [`mint_to_ceiling`]: issue the deficit between supply and the
//!   recorded ceiling, once
//! - [`run_fee_harvest_cycle`]: harvest withheld transfer fees, withdraw
//!   them into the treasury vault and burn exactly the withdrawn delta
//! - [`verify_transfer_fee`]: probe transfer that checks the fee actually
//!   withheld against the configured rate and cap
//!
//! ## Safety Model
//!
//! - Every mutating instruction is signed by an explicit [`Authority`]
//! - Ledger rejections are structured ([`RejectionKind`]); "nothing to do"
//!   is an outcome, not an error
//! - Post-conditions on supply are checked and never corrected silently
//! - Nothing here retries; the scheduler decides

pub mod accounts;
pub mod address;
pub mod amount;
pub mod authority;
pub mod error;
pub mod harvest;
pub mod instruction;
pub mod ledger;
pub mod minter;
pub mod record;
pub mod settlement;
pub mod verifier;

pub use address::Address;
pub use amount::{format_amount, parse_amount, TransferFeeConfig};
pub use authority::{Authority, Keypair, TxSignature};
pub use error::{ConfigError, InvariantViolation, Stage, SupplyError};
pub use harvest::{run_fee_harvest_cycle, sweep_sources, HarvestCycleReport, StageOutcome};
pub use ledger::{EngineOptions, Ledger, MemoryLedger, Rejection, RejectionKind, Submission};
pub use minter::{mint_to_ceiling, MintOutcome};
pub use record::{DeploymentRecord, MintConfig};
pub use settlement::{observe, Probe, SettlementDelta};
pub use verifier::{default_probe_recipient, verify_transfer_fee, VerificationReport};
