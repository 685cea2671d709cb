//! Mint-to-ceiling command

use anyhow::Result;

use cinder_supply::{
    amount::format_amount,
    minter::{mint_to_ceiling, MintOutcome},
};

use super::{print_success, Invocation};

/// Run the mint-to-ceiling command
pub async fn run(invocation: &Invocation) -> Result<()> {
    let record = invocation.load_record()?;
    let authority = invocation.load_authority(&record)?;
    let ledger = invocation.connect(&record)?;
    let decimals = record.config.decimals;

    println!("Mint:     {}", record.mint_address);
    println!("Gateway:  {}", ledger.url());
    println!();

    match mint_to_ceiling(&ledger, &authority, &record, &invocation.options()).await? {
        MintOutcome::CeilingReached { supply, max_supply } => {
            print_success("Supply already at ceiling, nothing to mint");
            println!(
                "  Supply: {} / {}",
                format_amount(supply, decimals),
                format_amount(max_supply, decimals)
            );
        }
        MintOutcome::Minted {
            amount,
            signature,
            supply_after,
        } => {
            print_success(&format!("Minted {}", format_amount(amount, decimals)));
            println!("  Supply:    {}", format_amount(supply_after, decimals));
            println!("  Signature: {}", signature);
        }
    }

    Ok(())
}
