//! Transfer-fee verification command

use anyhow::{Context, Result};

use cinder_supply::{
    address::Address,
    amount::{format_amount, parse_amount},
    verifier::{default_probe_recipient, verify_transfer_fee},
};

use super::{print_error, print_success, Invocation, VerificationFailed};

/// Run the verify-transfer-fee command.
///
/// `amount` is in token units. A fee mismatch fails the command with
/// [`VerificationFailed`].
pub async fn run(invocation: &Invocation, amount: &str, recipient: Option<&str>) -> Result<()> {
    let record = invocation.load_record()?;
    let authority = invocation.load_authority(&record)?;
    let decimals = record.config.decimals;

    let amount = parse_amount(amount, decimals)
        .with_context(|| format!("Invalid probe amount {:?}", amount))?;
    let recipient: Address = match recipient {
        Some(text) => text
            .parse()
            .with_context(|| format!("Invalid recipient address {:?}", text))?,
        None => default_probe_recipient(&record.mint_address),
    };

    let ledger = invocation.connect(&record)?;

    println!(
        "Probe transfer of {} to {}",
        format_amount(amount, decimals),
        recipient
    );

    let report = verify_transfer_fee(
        &ledger,
        &authority,
        &record,
        amount,
        &recipient,
        &invocation.options(),
    )
    .await?;

    println!();
    println!("Expected fee:      {}", format_amount(report.expected_fee, decimals));
    println!("Expected received: {}", format_amount(report.expected_received, decimals));
    println!("Received:          {}", format_amount(report.received, decimals));
    println!("Deviation:         {}", format_amount(report.deviation, decimals));
    println!("Signature:         {}", report.signature);
    println!();

    if !report.passed {
        print_error("Transfer fee does not match the configured rate and cap");
        return Err(VerificationFailed {
            deviation: format_amount(report.deviation, decimals),
            tolerance: format_amount(report.tolerance, decimals),
        }
        .into());
    }

    print_success("Transfer fee verified");
    Ok(())
}
