//! Ledger Accessor boundary.
//!
//! The ledger is an opaque remote service: it answers reads and accepts
//! signed instructions, confirming or rejecting each one. Implementations
//! must not retry on their own; retry policy belongs to whoever schedules
//! the engine.
//!
//! Rejections are structured. A submission that the ledger refuses comes
//! back as [`Submission::Rejected`] with a [`RejectionKind`], so callers
//! branch on the kind and never on the human-readable reason.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use thiserror::Error;
use tracing::debug;

use crate::{
    address::Address,
    amount::TransferFeeConfig,
    authority::{Authority, TxSignature},
    error::{Stage, SupplyError},
    instruction::{Instruction, SignedInstruction},
};

pub use memory::MemoryLedger;

/// Default bound on waiting for a single confirmation.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);

/// State of a holding account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    pub address: Address,
    pub owner: Address,
    pub mint: Address,

    /// Visible balance in base units.
    pub balance: u64,

    /// Withheld fee component, when the ledger is willing to report it.
    #[serde(default)]
    pub withheld_hint: Option<u64>,
}

/// State of a mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintState {
    pub address: Address,
    pub decimals: u8,

    /// Circulating supply in base units.
    pub supply: u64,
    pub mint_authority: Address,
    pub fee_config: TransferFeeConfig,
}

/// Why the ledger refused an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectionKind {
    /// No source account carried a withheld amount.
    NothingToHarvest,
    /// The mint's withheld pool is empty.
    NothingToWithdraw,
    AccountAlreadyExists,
    AccountNotFound,
    InsufficientFunds,
    InvalidSignature,
    Unauthorized,
    Other,
}

impl RejectionKind {
    /// Recognized empty states are successful no-ops, not failures.
    pub fn is_empty_state(self) -> bool {
        matches!(self, Self::NothingToHarvest | Self::NothingToWithdraw)
    }

    /// JSON-RPC error code used on the wire for this kind.
    pub fn code(self) -> i64 {
        match self {
            Self::NothingToHarvest => -32010,
            Self::NothingToWithdraw => -32011,
            Self::AccountAlreadyExists => -32012,
            Self::AccountNotFound => -32013,
            Self::InsufficientFunds => -32014,
            Self::InvalidSignature => -32015,
            Self::Unauthorized => -32016,
            Self::Other => -32019,
        }
    }

    /// Inverse of [`code`](Self::code); `None` for codes outside the
    /// rejection range.
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            -32010 => Self::NothingToHarvest,
            -32011 => Self::NothingToWithdraw,
            -32012 => Self::AccountAlreadyExists,
            -32013 => Self::AccountNotFound,
            -32014 => Self::InsufficientFunds,
            -32015 => Self::InvalidSignature,
            -32016 => Self::Unauthorized,
            -32019..=-32017 => Self::Other,
            _ => return None,
        })
    }
}

/// A structured ledger rejection with the ledger's own wording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub reason: String,
}

impl Rejection {
    pub fn new(kind: RejectionKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Result of submitting one signed instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Confirmed(TxSignature),
    Rejected(Rejection),
}

/// Failure to talk to the ledger at all.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("account {0} not found")]
    AccountNotFound(Address),

    #[error("mint {0} not found")]
    MintNotFound(Address),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed ledger response: {0}")]
    Malformed(String),
}

/// Read/submit access to a remote ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn read_account(&self, address: &Address) -> Result<AccountState, LedgerError>;

    async fn read_mint(&self, address: &Address) -> Result<MintState, LedgerError>;

    async fn account_exists(&self, address: &Address) -> Result<bool, LedgerError>;

    /// Every holding account under `mint`, for production sweeps.
    async fn list_holding_accounts(&self, mint: &Address)
        -> Result<Vec<AccountState>, LedgerError>;

    /// Submit and wait for the ledger to confirm or reject.
    async fn submit(&self, instruction: SignedInstruction) -> Result<Submission, LedgerError>;
}

/// Tunables shared by every engine operation.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Bound on waiting for each confirmation.
    pub confirm_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
        }
    }
}

/// Sign `instruction` with `authority` and submit it under a bounded wait.
///
/// Transport failures and timeouts become errors for `stage`. Rejections
/// are handed back untouched so the caller can decide which kinds count as
/// empty states.
pub async fn submit_signed<L, A>(
    ledger: &L,
    authority: &A,
    instruction: Instruction,
    stage: Stage,
    options: &EngineOptions,
) -> Result<Submission, SupplyError>
where
    L: Ledger + ?Sized,
    A: Authority + ?Sized,
{
    let name = instruction.name();
    let signed = SignedInstruction::sign(instruction, authority)?;

    debug!("Submitting {} for {}", name, stage);
    let submission = tokio::time::timeout(options.confirm_timeout, ledger.submit(signed))
        .await
        .map_err(|_| SupplyError::Timeout {
            stage,
            timeout: options.confirm_timeout,
        })?
        .map_err(|e| SupplyError::ledger(stage, e))?;

    match &submission {
        Submission::Confirmed(sig) => debug!("{} confirmed: {}", name, sig),
        Submission::Rejected(rejection) => {
            debug!("{} rejected ({:?}): {}", name, rejection.kind, rejection)
        }
    }
    Ok(submission)
}

/// Turn a rejection into the fatal error for `stage`.
pub fn fatal(stage: Stage, rejection: Rejection) -> SupplyError {
    SupplyError::Rejected { stage, rejection }
}
