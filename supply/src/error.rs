//! Error taxonomy for the settlement engine.
//!
//! Recognized empty states ("nothing to harvest", "nothing to withdraw") are
//! not errors and never appear here; the stages report them as
//! [`StageOutcome::Empty`](crate::harvest::StageOutcome::Empty).

use std::{fmt, path::PathBuf, time::Duration};
use thiserror::Error;

use crate::{
    address::Address,
    amount::AmountError,
    ledger::{LedgerError, Rejection},
};

/// Process exit status for configuration failures.
pub const EXIT_CONFIG: u8 = 2;
/// Process exit status for ledger rejections, timeouts and transport failures.
pub const EXIT_LEDGER: u8 = 3;
/// Process exit status for invariant violations.
pub const EXIT_INVARIANT: u8 = 4;
/// Process exit status for a probe transfer whose fee did not match.
pub const EXIT_VERIFICATION: u8 = 5;

/// The step of an operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading ledger state outside a submission.
    Read,
    CreateAccount,
    Mint,
    Harvest,
    Withdraw,
    Burn,
    ProbeTransfer,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Read => "read",
            Stage::CreateAccount => "create-account",
            Stage::Mint => "mint",
            Stage::Harvest => "harvest",
            Stage::Withdraw => "withdraw",
            Stage::Burn => "burn",
            Stage::ProbeTransfer => "probe-transfer",
        };
        f.write_str(name)
    }
}

/// Missing or unusable configuration. Nothing is attempted on the ledger.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("deployment record not found at {}", .0.display())]
    MissingRecord(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse deployment record {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid deployment record: {0}")]
    Invalid(String),

    #[error("invalid probe transfer: {0}")]
    InvalidProbe(String),

    #[error("treasury key not provided")]
    MissingKey,

    #[error("treasury key is malformed: {0}")]
    MalformedKey(String),

    #[error("treasury key {actual} does not match deployment treasury {expected}")]
    KeyMismatch { expected: Address, actual: Address },

    #[error("mint {mint} has {ledger} decimals on the ledger but the deployment record says {record}")]
    DecimalsMismatch { mint: Address, ledger: u8, record: u8 },

    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// A post-condition that did not hold. Never corrected silently.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("supply after {stage} is {observed}, expected {expected}")]
    SupplyMismatch {
        stage: Stage,
        expected: u64,
        observed: u64,
    },

    #[error("balance of {account} fell from {before} to {after} while measuring {stage}")]
    NegativeDelta {
        stage: Stage,
        account: Address,
        before: u64,
        after: u64,
    },

    #[error("burn of {burn} exceeds vault balance {available}")]
    BurnExceedsDelta { burn: u64, available: u64 },
}

/// Errors surfaced by the minter, the harvest pipeline and the verifier.
#[derive(Debug, Error)]
pub enum SupplyError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{stage} rejected by ledger: {rejection}")]
    Rejected { stage: Stage, rejection: Rejection },

    #[error("{stage} not confirmed within {timeout:?}")]
    Timeout { stage: Stage, timeout: Duration },

    #[error("{stage} failed: {source}")]
    Ledger {
        stage: Stage,
        #[source]
        source: LedgerError,
    },

    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("failed to encode instruction: {0}")]
    Encoding(#[from] bincode::Error),

    /// Fees were withdrawn into the vault but the burn did not complete.
    /// `withdrawn` is what still has to be burned by hand.
    #[error("withdrew {withdrawn} base units into vault {vault} but the burn did not complete")]
    Unburned {
        withdrawn: u64,
        vault: Address,
        #[source]
        source: Box<SupplyError>,
    },
}

impl SupplyError {
    pub fn ledger(stage: Stage, source: LedgerError) -> Self {
        Self::Ledger { stage, source }
    }

    /// Stage the failure belongs to, when it happened on the ledger.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Rejected { stage, .. } | Self::Timeout { stage, .. } | Self::Ledger { stage, .. } => {
                Some(*stage)
            }
            Self::Invariant(InvariantViolation::SupplyMismatch { stage, .. })
            | Self::Invariant(InvariantViolation::NegativeDelta { stage, .. }) => Some(*stage),
            Self::Invariant(InvariantViolation::BurnExceedsDelta { .. }) => Some(Stage::Burn),
            Self::Config(_) | Self::Encoding(_) => None,
            Self::Unburned { source, .. } => source.stage(),
        }
    }

    /// Distinct process exit status for each failure category.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => EXIT_CONFIG,
            Self::Rejected { .. } | Self::Timeout { .. } | Self::Ledger { .. } | Self::Encoding(_) => {
                EXIT_LEDGER
            }
            Self::Invariant(_) => EXIT_INVARIANT,
            Self::Unburned { source, .. } => source.exit_code(),
        }
    }
}
