//! Settlement deltas: snapshot, act, re-read, subtract.
//!
//! The ledger has no query for "amount pending withdrawal", so the engine
//! infers it: read a balance (or the supply) before an action, read it again
//! after, and take the difference. Every stage that needs an inferred amount
//! goes through [`observe`] so the subtraction and its sign checks live in
//! one place.

use std::future::Future;

use crate::{
    address::Address,
    error::{InvariantViolation, Stage, SupplyError},
    ledger::Ledger,
};

/// The quantity a delta is measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Visible balance of a holding account.
    Balance(Address),
    /// Circulating supply of a mint.
    Supply(Address),
}

impl Probe {
    pub async fn read<L: Ledger + ?Sized>(&self, ledger: &L, stage: Stage) -> Result<u64, SupplyError> {
        match self {
            Probe::Balance(account) => ledger
                .read_account(account)
                .await
                .map(|state| state.balance)
                .map_err(|e| SupplyError::ledger(stage, e)),
            Probe::Supply(mint) => ledger
                .read_mint(mint)
                .await
                .map(|state| state.supply)
                .map_err(|e| SupplyError::ledger(stage, e)),
        }
    }

    fn subject(&self) -> Address {
        match self {
            Probe::Balance(address) | Probe::Supply(address) => *address,
        }
    }
}

/// Before/after readings of one [`Probe`] around an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementDelta {
    pub probe: Probe,
    pub stage: Stage,
    pub before: u64,
    pub after: u64,
}

impl SettlementDelta {
    /// Amount the quantity grew by. A shrink is an invariant violation.
    pub fn increase(&self) -> Result<u64, InvariantViolation> {
        self.after
            .checked_sub(self.before)
            .ok_or(InvariantViolation::NegativeDelta {
                stage: self.stage,
                account: self.probe.subject(),
                before: self.before,
                after: self.after,
            })
    }

    /// Amount the quantity shrank by. Growth yields `None`.
    pub fn decrease(&self) -> Option<u64> {
        self.before.checked_sub(self.after)
    }
}

/// Read `probe`, run `action`, read `probe` again.
///
/// The readings bracket the action exactly; nothing else is awaited in
/// between. An action error propagates without the second read.
pub async fn observe<L, F, Fut, T>(
    ledger: &L,
    probe: Probe,
    stage: Stage,
    action: F,
) -> Result<(T, SettlementDelta), SupplyError>
where
    L: Ledger + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, SupplyError>>,
{
    let before = probe.read(ledger, stage).await?;
    let output = action().await?;
    let after = probe.read(ledger, stage).await?;
    Ok((
        output,
        SettlementDelta {
            probe,
            stage,
            before,
            after,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{amount::TransferFeeConfig, ledger::MemoryLedger};

    fn delta(before: u64, after: u64) -> SettlementDelta {
        SettlementDelta {
            probe: Probe::Balance(Address::derive(&[b"vault"])),
            stage: Stage::Withdraw,
            before,
            after,
        }
    }

    #[test]
    fn test_increase_and_decrease() {
        assert_eq!(delta(100, 250).increase(), Ok(150));
        assert_eq!(delta(100, 100).increase(), Ok(0));
        assert_eq!(delta(250, 100).decrease(), Some(150));
        assert_eq!(delta(100, 250).decrease(), None);
    }

    #[test]
    fn test_shrinking_balance_is_a_violation() {
        let err = delta(250, 100).increase().unwrap_err();
        assert!(matches!(
            err,
            InvariantViolation::NegativeDelta {
                before: 250,
                after: 100,
                ..
            }
        ));
    }

    #[test]
    fn test_delta_is_exact_at_full_range() {
        assert_eq!(delta(0, u64::MAX).increase(), Ok(u64::MAX));
        assert_eq!(delta(u64::MAX - 1, u64::MAX).increase(), Ok(1));
    }

    #[tokio::test]
    async fn test_observe_brackets_the_action() {
        let ledger = MemoryLedger::new();
        let mint = Address::derive(&[b"mint"]);
        let owner = Address::derive(&[b"owner"]);
        ledger.add_mint(mint, owner, 9, TransferFeeConfig::new(0, 0));
        let account = ledger.open_account(owner, mint);
        ledger.issue(&account, 40).unwrap();

        let (_, delta) = observe(&ledger, Probe::Balance(account), Stage::Withdraw, || async {
            ledger
                .issue(&account, 2)
                .map_err(|rejection| crate::ledger::fatal(Stage::Withdraw, rejection))
        })
        .await
        .unwrap();

        assert_eq!(delta.before, 40);
        assert_eq!(delta.after, 42);
        assert_eq!(delta.increase(), Ok(2));
    }
}
