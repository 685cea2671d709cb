//! Fee Harvest Pipeline.
//!
//! Three ordered stages, each idempotent:
//!
//! 1. **Harvest**: move withheld fees from holding accounts into the mint's
//!    withheld pool.
//! 2. **Withdraw**: move the pool into the fee vault (the treasury's holding
//!    account) and measure how much arrived with a before/after delta.
//! 3. **Burn**: destroy exactly that delta from the vault.
//!
//! "Nothing to harvest" and "nothing to withdraw" are [`StageOutcome::Empty`]
//! and the pipeline carries on. Any other rejection stops the run and is
//! returned with its stage; nothing is retried here. A stage confirmed on
//! the ledger stays confirmed even if a later stage fails.
//!
//! Two overlapping runs against the same mint can corrupt the withdraw delta
//! (a transfer into the vault between the two readings would be burned).
//! Callers are expected to serialize runs per mint.

use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::{
    accounts::ensure_holding_account,
    address::Address,
    amount::format_amount,
    authority::{Authority, TxSignature},
    error::{InvariantViolation, Stage, SupplyError},
    instruction::Instruction,
    ledger::{fatal, submit_signed, EngineOptions, Ledger, Submission},
    record::DeploymentRecord,
    settlement::{observe, Probe, SettlementDelta},
};

/// Most source accounts named in one harvest instruction.
pub const MAX_HARVEST_BATCH: usize = 20;

/// Result of a stage that may legitimately have nothing to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome<T> {
    Empty,
    Confirmed(T),
}

impl<T> StageOutcome<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, StageOutcome::Empty)
    }

    pub fn confirmed(&self) -> Option<&T> {
        match self {
            StageOutcome::Empty => None,
            StageOutcome::Confirmed(value) => Some(value),
        }
    }
}

/// Stage A result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Harvested {
    /// One signature per confirmed batch.
    pub signatures: Vec<TxSignature>,
    /// Number of accounts in confirmed batches.
    pub accounts: usize,
}

/// Stage B result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawn {
    pub signature: TxSignature,
    pub fee_amount: u64,
    pub delta: SettlementDelta,
}

/// Stage C result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Burned {
    pub signature: TxSignature,
    pub amount: u64,
    pub supply_before: u64,
    pub supply_after: u64,
}

/// Outcome of one full pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestCycleReport {
    pub harvest: StageOutcome<Harvested>,
    pub withdraw: StageOutcome<Withdrawn>,
    pub burn: StageOutcome<Burned>,
}

impl HarvestCycleReport {
    /// Base units destroyed by this run.
    pub fn burned(&self) -> u64 {
        self.burn.confirmed().map(|b| b.amount).unwrap_or(0)
    }

    /// Whether the run found nothing at all to do.
    pub fn is_noop(&self) -> bool {
        self.harvest.is_empty() && self.withdraw.is_empty() && self.burn.is_empty()
    }
}

/// Holding accounts of the mint that report a nonzero withheld amount.
///
/// Accounts whose ledger does not report the withheld component are
/// included, since only a harvest can tell.
pub async fn sweep_sources<L: Ledger + ?Sized>(
    ledger: &L,
    record: &DeploymentRecord,
) -> Result<Vec<Address>, SupplyError> {
    let accounts = ledger
        .list_holding_accounts(&record.mint_address)
        .await
        .map_err(|e| SupplyError::ledger(Stage::Harvest, e))?;
    Ok(accounts
        .into_iter()
        .filter(|account| account.withheld_hint.map_or(true, |w| w > 0))
        .map(|account| account.address)
        .collect())
}

/// Stage A: harvest withheld fees from `sources` into the mint's pool.
pub async fn harvest_withheld<L, A>(
    ledger: &L,
    authority: &A,
    record: &DeploymentRecord,
    sources: &[Address],
    options: &EngineOptions,
) -> Result<StageOutcome<Harvested>, SupplyError>
where
    L: Ledger + ?Sized,
    A: Authority + ?Sized,
{
    // An account listed twice in a batch must not be counted twice.
    let mut seen = BTreeSet::new();
    let sources: Vec<Address> = sources
        .iter()
        .copied()
        .filter(|source| seen.insert(*source))
        .collect();

    let mut signatures = Vec::new();
    let mut accounts = 0;

    for batch in sources.chunks(MAX_HARVEST_BATCH) {
        let instruction = Instruction::HarvestWithheld {
            mint: record.mint_address,
            sources: batch.to_vec(),
        };
        match submit_signed(ledger, authority, instruction, Stage::Harvest, options).await? {
            Submission::Confirmed(sig) => {
                info!("Harvested withheld fees from {} accounts: {}", batch.len(), sig);
                signatures.push(sig);
                accounts += batch.len();
            }
            Submission::Rejected(rejection) if rejection.kind.is_empty_state() => {
                info!("Nothing to harvest in batch of {} accounts", batch.len());
            }
            Submission::Rejected(rejection) => return Err(fatal(Stage::Harvest, rejection)),
        }
    }

    if signatures.is_empty() {
        return Ok(StageOutcome::Empty);
    }
    Ok(StageOutcome::Confirmed(Harvested {
        signatures,
        accounts,
    }))
}

/// Stage B: withdraw the mint's pool into `vault`, measuring the amount
/// that arrived.
pub async fn withdraw_withheld<L, A>(
    ledger: &L,
    authority: &A,
    record: &DeploymentRecord,
    vault: &Address,
    options: &EngineOptions,
) -> Result<StageOutcome<Withdrawn>, SupplyError>
where
    L: Ledger + ?Sized,
    A: Authority + ?Sized,
{
    let instruction = Instruction::WithdrawWithheld {
        mint: record.mint_address,
        destination: *vault,
    };

    let (submission, delta) = observe(ledger, Probe::Balance(*vault), Stage::Withdraw, || {
        submit_signed(ledger, authority, instruction, Stage::Withdraw, options)
    })
    .await?;

    let signature = match submission {
        Submission::Confirmed(sig) => sig,
        Submission::Rejected(rejection) if rejection.kind.is_empty_state() => {
            info!("Nothing to withdraw from the withheld pool");
            return Ok(StageOutcome::Empty);
        }
        Submission::Rejected(rejection) => return Err(fatal(Stage::Withdraw, rejection)),
    };

    let fee_amount = delta.increase()?;
    if fee_amount == 0 {
        info!("Withdraw confirmed ({}) but the vault balance did not change", signature);
        return Ok(StageOutcome::Empty);
    }

    info!(
        "Withdrew {} into vault {}: {}",
        format_amount(fee_amount, record.config.decimals),
        vault,
        signature
    );
    Ok(StageOutcome::Confirmed(Withdrawn {
        signature,
        fee_amount,
        delta,
    }))
}

/// Stage C: burn exactly `amount` from `vault`.
///
/// `amount` must be the Stage B delta; it is never re-derived from the fee
/// rate or transfer volume.
pub async fn burn_withdrawn<L, A>(
    ledger: &L,
    authority: &A,
    record: &DeploymentRecord,
    vault: &Address,
    amount: u64,
    options: &EngineOptions,
) -> Result<Burned, SupplyError>
where
    L: Ledger + ?Sized,
    A: Authority + ?Sized,
{
    let available = Probe::Balance(*vault).read(ledger, Stage::Burn).await?;
    if available < amount {
        return Err(InvariantViolation::BurnExceedsDelta {
            burn: amount,
            available,
        }
        .into());
    }

    let instruction = Instruction::Burn {
        mint: record.mint_address,
        source: *vault,
        amount,
    };
    let (submission, supply) =
        observe(ledger, Probe::Supply(record.mint_address), Stage::Burn, || {
            submit_signed(ledger, authority, instruction, Stage::Burn, options)
        })
        .await?;
    let signature = match submission {
        Submission::Confirmed(sig) => sig,
        Submission::Rejected(rejection) => return Err(fatal(Stage::Burn, rejection)),
    };

    if supply.decrease() != Some(amount) {
        return Err(InvariantViolation::SupplyMismatch {
            stage: Stage::Burn,
            expected: supply.before.saturating_sub(amount),
            observed: supply.after,
        }
        .into());
    }
    let (supply_before, supply_after) = (supply.before, supply.after);

    info!(
        "Burned {}: supply {} -> {} ({})",
        format_amount(amount, record.config.decimals),
        format_amount(supply_before, record.config.decimals),
        format_amount(supply_after, record.config.decimals),
        signature
    );
    Ok(Burned {
        signature,
        amount,
        supply_before,
        supply_after,
    })
}

/// Run harvest, withdraw and burn in order.
///
/// `sources` are the accounts to harvest from; pass the treasury account for
/// the single-account case or [`sweep_sources`] for a full sweep.
pub async fn run_fee_harvest_cycle<L, A>(
    ledger: &L,
    authority: &A,
    record: &DeploymentRecord,
    sources: &[Address],
    options: &EngineOptions,
) -> Result<HarvestCycleReport, SupplyError>
where
    L: Ledger + ?Sized,
    A: Authority + ?Sized,
{
    record.check_authority(&authority.address())?;
    record.read_mint(ledger, Stage::Read).await?;
    info!("Harvest cycle for mint {} ({} sources)", record.mint_address, sources.len());

    let vault = ensure_holding_account(
        ledger,
        authority,
        &record.treasury_address,
        &record.mint_address,
        options,
    )
    .await?;

    let harvest = harvest_withheld(ledger, authority, record, sources, options).await?;
    let withdraw = withdraw_withheld(ledger, authority, record, &vault, options).await?;

    let burn = match withdraw.confirmed() {
        None => {
            info!("Nothing withdrawn, skipping burn");
            StageOutcome::Empty
        }
        Some(withdrawn) => StageOutcome::Confirmed(
            burn_withdrawn(ledger, authority, record, &vault, withdrawn.fee_amount, options)
                .await
                .map_err(|source| match source {
                    // The burn landed; only its effect on supply was wrong.
                    SupplyError::Invariant(InvariantViolation::SupplyMismatch { .. }) => source,
                    source => SupplyError::Unburned {
                        withdrawn: withdrawn.fee_amount,
                        vault,
                        source: Box::new(source),
                    },
                })?,
        ),
    };

    if harvest.is_empty() && !withdraw.is_empty() {
        warn!("Withdrew fees without harvesting this run; pool held fees from an earlier run");
    }

    Ok(HarvestCycleReport {
        harvest,
        withdraw,
        burn,
    })
}
