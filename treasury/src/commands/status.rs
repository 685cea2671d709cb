//! Status command

use anyhow::Result;

use cinder_supply::{
    amount::format_amount,
    error::{ConfigError, Stage, SupplyError},
    ledger::{Ledger, LedgerError},
};

use super::{print_warning, Invocation};

/// Run the status command. Read-only; no key is needed.
pub async fn run(invocation: &Invocation) -> Result<()> {
    let record = invocation.load_record()?;
    let ledger = invocation.connect(&record)?;
    let config = &record.config;
    let decimals = config.decimals;

    let mint = record.read_mint(&ledger, Stage::Read).await?;
    let max_supply = config.max_supply_base().map_err(ConfigError::from)?;
    let max_fee = config.max_fee_base().map_err(ConfigError::from)?;
    let fee_config = config.fee_config().map_err(ConfigError::from)?;

    println!("Mint:      {}", record.mint_address);
    println!("Treasury:  {}", record.treasury_address);
    println!("Network:   {}", record.network);
    println!("Gateway:   {}", ledger.url());
    println!();
    println!(
        "Supply:    {} / {}",
        format_amount(mint.supply, decimals),
        format_amount(max_supply, decimals)
    );
    println!(
        "Fee:       {} bps, cap {}",
        config.fee_rate_bps,
        format_amount(max_fee, decimals)
    );

    if mint.fee_config != fee_config {
        print_warning(&format!(
            "ledger fee configuration differs: {} bps, cap {}",
            mint.fee_config.fee_rate_bps,
            format_amount(mint.fee_config.maximum_fee, decimals)
        ));
    }
    if mint.supply > max_supply {
        print_warning("supply is above the recorded ceiling");
    }

    let vault = record.treasury_account();
    match ledger.read_account(&vault).await {
        Ok(account) => {
            println!("Vault:     {}", vault);
            println!("Balance:   {}", format_amount(account.balance, decimals));
            match account.withheld_hint {
                Some(withheld) => println!("Withheld:  {}", format_amount(withheld, decimals)),
                None => println!("Withheld:  not reported"),
            }
        }
        Err(LedgerError::AccountNotFound(_)) => {
            println!("Vault:     {} (not created)", vault);
        }
        Err(e) => return Err(SupplyError::ledger(Stage::Read, e).into()),
    }

    Ok(())
}
