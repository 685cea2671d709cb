//! Capped-Supply Minter.
//!
//! Issues exactly the deficit between circulating supply and the recorded
//! ceiling into the treasury's holding account, in one instruction. Running
//! it again once the ceiling is reached does nothing.

use tracing::{info, warn};

use crate::{
    accounts::ensure_holding_account,
    amount::format_amount,
    authority::{Authority, TxSignature},
    error::{InvariantViolation, Stage, SupplyError},
    instruction::Instruction,
    ledger::{fatal, submit_signed, EngineOptions, Ledger, Submission},
    record::DeploymentRecord,
};

/// What a mint-to-ceiling run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintOutcome {
    /// Supply was already at (or above) the ceiling; nothing submitted.
    CeilingReached { supply: u64, max_supply: u64 },

    /// The deficit was issued and supply now equals the ceiling.
    Minted {
        amount: u64,
        signature: TxSignature,
        supply_after: u64,
    },
}

impl MintOutcome {
    /// Base units issued by this run.
    pub fn minted(&self) -> u64 {
        match self {
            MintOutcome::CeilingReached { .. } => 0,
            MintOutcome::Minted { amount, .. } => *amount,
        }
    }
}

/// Bring circulating supply up to the recorded ceiling.
///
/// Submits at most one mint instruction. A post-mint supply that differs
/// from the ceiling is reported as an invariant violation and never retried.
pub async fn mint_to_ceiling<L, A>(
    ledger: &L,
    authority: &A,
    record: &DeploymentRecord,
    options: &EngineOptions,
) -> Result<MintOutcome, SupplyError>
where
    L: Ledger + ?Sized,
    A: Authority + ?Sized,
{
    record.check_authority(&authority.address())?;
    let decimals = record.config.decimals;
    let max_supply = record
        .config
        .max_supply_base()
        .map_err(crate::error::ConfigError::from)?;

    let mint = record.read_mint(ledger, Stage::Read).await?;
    let supply = mint.supply;

    if supply >= max_supply {
        if supply > max_supply {
            warn!(
                "Supply {} is above the ceiling {}",
                format_amount(supply, decimals),
                format_amount(max_supply, decimals)
            );
        }
        info!("Ceiling already reached: supply {}", format_amount(supply, decimals));
        return Ok(MintOutcome::CeilingReached { supply, max_supply });
    }

    let deficit = max_supply - supply;
    info!(
        "Supply {} below ceiling {}, minting {}",
        format_amount(supply, decimals),
        format_amount(max_supply, decimals),
        format_amount(deficit, decimals)
    );

    let treasury = ensure_holding_account(
        ledger,
        authority,
        &record.treasury_address,
        &record.mint_address,
        options,
    )
    .await?;

    let instruction = Instruction::MintTo {
        mint: record.mint_address,
        destination: treasury,
        amount: deficit,
    };
    let signature = match submit_signed(ledger, authority, instruction, Stage::Mint, options).await? {
        Submission::Confirmed(sig) => sig,
        Submission::Rejected(rejection) => return Err(fatal(Stage::Mint, rejection)),
    };
    info!("Mint confirmed: {}", signature);

    let supply_after = record.read_mint(ledger, Stage::Mint).await?.supply;
    if supply_after != max_supply {
        return Err(InvariantViolation::SupplyMismatch {
            stage: Stage::Mint,
            expected: max_supply,
            observed: supply_after,
        }
        .into());
    }

    Ok(MintOutcome::Minted {
        amount: deficit,
        signature,
        supply_after,
    })
}
