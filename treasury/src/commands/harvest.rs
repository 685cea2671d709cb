//! Fee harvest cycle command

use anyhow::{Context, Result};

use cinder_supply::{
    address::Address,
    amount::format_amount,
    harvest::{run_fee_harvest_cycle, sweep_sources, HarvestCycleReport, StageOutcome},
};

use super::{print_success, print_warning, Invocation};
use crate::lease::CycleLease;

/// Run the fee harvest cycle command.
///
/// Without `--sweep` only the treasury's own account and any `--account`
/// addresses are harvested.
pub async fn run(invocation: &Invocation, sweep: bool, accounts: &[String]) -> Result<()> {
    let record = invocation.load_record()?;
    let authority = invocation.load_authority(&record)?;

    let mut extra = Vec::with_capacity(accounts.len());
    for account in accounts {
        let address: Address = account
            .parse()
            .with_context(|| format!("Invalid account address {:?}", account))?;
        extra.push(address);
    }

    let ledger = invocation.connect(&record)?;
    let _lease = CycleLease::acquire(&invocation.settings.lock_dir(), &record.mint_address)?;

    let mut sources = if sweep {
        println!("Sweeping holding accounts of {}...", record.mint_address);
        sweep_sources(&ledger, &record).await?
    } else {
        vec![record.treasury_account()]
    };
    for address in extra {
        if !sources.contains(&address) {
            sources.push(address);
        }
    }

    let report =
        run_fee_harvest_cycle(&ledger, &authority, &record, &sources, &invocation.options())
            .await?;
    print_report(&report, record.config.decimals);

    Ok(())
}

fn print_report(report: &HarvestCycleReport, decimals: u8) {
    println!();
    match &report.harvest {
        StageOutcome::Empty => println!("Harvest:  nothing to harvest"),
        StageOutcome::Confirmed(harvested) => {
            println!(
                "Harvest:  {} accounts in {} transactions",
                harvested.accounts,
                harvested.signatures.len()
            );
            for signature in &harvested.signatures {
                println!("          {}", signature);
            }
        }
    }

    match &report.withdraw {
        StageOutcome::Empty => println!("Withdraw: nothing to withdraw"),
        StageOutcome::Confirmed(withdrawn) => {
            println!(
                "Withdraw: {} ({})",
                format_amount(withdrawn.fee_amount, decimals),
                withdrawn.signature
            );
        }
    }

    match &report.burn {
        StageOutcome::Empty => {
            println!("Burn:     skipped");
            println!();
            print_success("Nothing to burn");
        }
        StageOutcome::Confirmed(burned) => {
            println!(
                "Burn:     {} ({})",
                format_amount(burned.amount, decimals),
                burned.signature
            );
            println!(
                "Supply:   {} -> {}",
                format_amount(burned.supply_before, decimals),
                format_amount(burned.supply_after, decimals)
            );
            println!();
            print_success(&format!("Burned {}", format_amount(burned.amount, decimals)));
        }
    }

    if report.harvest.is_empty() && !report.withdraw.is_empty() {
        print_warning("withdrew fees harvested by an earlier run");
    }
}
