//! Idempotent holding-account creation.

use tracing::{debug, info};

use crate::{
    address::Address,
    authority::Authority,
    error::{Stage, SupplyError},
    instruction::Instruction,
    ledger::{fatal, submit_signed, EngineOptions, Ledger, RejectionKind, Submission},
};

/// Make sure `owner` has a holding account under `mint`, paid for by
/// `authority`. Returns its address.
///
/// Check-then-create: an "already exists" rejection from a racing creator
/// counts as success.
pub async fn ensure_holding_account<L, A>(
    ledger: &L,
    authority: &A,
    owner: &Address,
    mint: &Address,
    options: &EngineOptions,
) -> Result<Address, SupplyError>
where
    L: Ledger + ?Sized,
    A: Authority + ?Sized,
{
    let address = Address::holding_account(owner, mint);

    let exists = ledger
        .account_exists(&address)
        .await
        .map_err(|e| SupplyError::ledger(Stage::CreateAccount, e))?;
    if exists {
        debug!("Holding account {} already exists", address);
        return Ok(address);
    }

    let instruction = Instruction::CreateHoldingAccount {
        payer: authority.address(),
        owner: *owner,
        mint: *mint,
    };
    match submit_signed(ledger, authority, instruction, Stage::CreateAccount, options).await? {
        Submission::Confirmed(sig) => {
            info!("Created holding account {} for {} ({})", address, owner, sig);
            Ok(address)
        }
        Submission::Rejected(rejection) if rejection.kind == RejectionKind::AccountAlreadyExists => {
            debug!("Holding account {} created concurrently", address);
            Ok(address)
        }
        Submission::Rejected(rejection) => Err(fatal(Stage::CreateAccount, rejection)),
    }
}
