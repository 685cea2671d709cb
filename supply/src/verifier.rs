//! Transfer-Fee Verifier.
//!
//! Sends a real probe transfer from the treasury account and checks that
//! the recipient received `amount - min(ceil(amount * bps / 10000), cap)`,
//! using the fee parameters from the deployment record rather than the
//! ledger's. The probe fee stays withheld on the recipient and is picked up
//! by a later harvest.

use tracing::{info, warn};

use crate::{
    accounts::ensure_holding_account,
    address::Address,
    amount::{format_amount, verification_tolerance},
    authority::{Authority, TxSignature},
    error::{ConfigError, Stage, SupplyError},
    instruction::Instruction,
    ledger::{fatal, submit_signed, EngineOptions, Ledger, Submission},
    record::DeploymentRecord,
    settlement::{observe, Probe},
};

/// Owner of the default probe recipient for `mint`.
pub fn default_probe_recipient(mint: &Address) -> Address {
    Address::derive(&[b"cinder-fee-probe", mint.as_bytes()])
}

/// Measurements from one probe transfer. All amounts in base units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub amount: u64,
    pub expected_fee: u64,
    pub expected_received: u64,

    /// Increase of the recipient's visible balance.
    pub received: u64,

    /// `|received - expected_received|`.
    pub deviation: u64,
    pub tolerance: u64,
    pub passed: bool,
    pub signature: TxSignature,
}

impl VerificationReport {
    /// Fee the ledger actually withheld.
    pub fn withheld(&self) -> u64 {
        self.amount.saturating_sub(self.received)
    }
}

/// Transfer `amount` base units from the treasury account to the holding
/// account of `recipient_owner` and compare what arrived with the
/// configured fee.
///
/// A mismatch is reported through [`VerificationReport::passed`], not as
/// an error; errors mean the probe could not be carried out.
pub async fn verify_transfer_fee<L, A>(
    ledger: &L,
    authority: &A,
    record: &DeploymentRecord,
    amount: u64,
    recipient_owner: &Address,
    options: &EngineOptions,
) -> Result<VerificationReport, SupplyError>
where
    L: Ledger + ?Sized,
    A: Authority + ?Sized,
{
    record.check_authority(&authority.address())?;
    if amount == 0 {
        return Err(ConfigError::InvalidProbe("amount must be positive".into()).into());
    }
    let decimals = record.config.decimals;
    let fee_config = record.config.fee_config().map_err(ConfigError::from)?;
    let expected_fee = fee_config.calculate_fee(amount);
    let expected_received = amount - expected_fee;
    let tolerance = verification_tolerance(decimals);
    let source = record.treasury_account();
    if Address::holding_account(recipient_owner, &record.mint_address) == source {
        return Err(
            ConfigError::InvalidProbe("recipient must not be the treasury itself".into()).into(),
        );
    }

    record.read_mint(ledger, Stage::Read).await?;
    let recipient =
        ensure_holding_account(ledger, authority, recipient_owner, &record.mint_address, options)
            .await?;

    info!(
        "Probe transfer of {} to {}, expecting fee {}",
        format_amount(amount, decimals),
        recipient,
        format_amount(expected_fee, decimals)
    );

    let instruction = Instruction::TransferChecked {
        mint: record.mint_address,
        source,
        destination: recipient,
        amount,
        decimals,
    };
    let (submission, delta) =
        observe(ledger, Probe::Balance(recipient), Stage::ProbeTransfer, || {
            submit_signed(ledger, authority, instruction, Stage::ProbeTransfer, options)
        })
        .await?;
    let signature = match submission {
        Submission::Confirmed(sig) => sig,
        Submission::Rejected(rejection) => return Err(fatal(Stage::ProbeTransfer, rejection)),
    };

    let received = delta.increase()?;
    let deviation = received.abs_diff(expected_received);
    let passed = deviation <= tolerance;

    if passed {
        info!(
            "Fee verified: received {} (expected {}, deviation {})",
            format_amount(received, decimals),
            format_amount(expected_received, decimals),
            format_amount(deviation, decimals)
        );
    } else {
        warn!(
            "Fee mismatch: received {}, expected {} (deviation {} > tolerance {})",
            format_amount(received, decimals),
            format_amount(expected_received, decimals),
            format_amount(deviation, decimals),
            format_amount(tolerance, decimals)
        );
    }

    Ok(VerificationReport {
        amount,
        expected_fee,
        expected_received,
        received,
        deviation,
        tolerance,
        passed,
        signature,
    })
}
