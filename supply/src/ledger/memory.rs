//! In-memory ledger with transfer-fee semantics.
//!
//! Mirrors what the remote ledger does with the transfer-fee extension:
//! transfers withhold the fee on the destination account, harvest sweeps
//! withheld amounts into the mint's pool, withdraw empties the pool into a
//! vault, burn destroys vault balance. Every submission is recorded so tests
//! can inspect exact instruction amounts, and `fail_next` queues rejections
//! for failure-path tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::{
    AccountState, Ledger, LedgerError, MintState, Rejection, RejectionKind, Submission,
};
use crate::{
    address::Address,
    amount::TransferFeeConfig,
    instruction::{Instruction, SignedInstruction},
};

#[derive(Debug, Clone)]
struct MintRecord {
    decimals: u8,
    supply: u64,
    authority: Address,
    fee_config: TransferFeeConfig,
    withheld_pool: u64,
}

#[derive(Debug, Clone)]
struct HoldingRecord {
    owner: Address,
    mint: Address,
    balance: u64,
    withheld: u64,
}

#[derive(Debug)]
struct LedgerState {
    mints: BTreeMap<Address, MintRecord>,
    accounts: BTreeMap<Address, HoldingRecord>,
    submitted: Vec<SignedInstruction>,
    faults: VecDeque<Rejection>,
    reports_withheld: bool,
}

/// A ledger held entirely in process memory.
#[derive(Debug)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                mints: BTreeMap::new(),
                accounts: BTreeMap::new(),
                submitted: Vec::new(),
                faults: VecDeque::new(),
                reports_withheld: true,
            }),
        }
    }

    /// Register a mint with zero supply.
    pub fn add_mint(
        &self,
        mint: Address,
        authority: Address,
        decimals: u8,
        fee_config: TransferFeeConfig,
    ) {
        self.state.lock().mints.insert(
            mint,
            MintRecord {
                decimals,
                supply: 0,
                authority,
                fee_config,
                withheld_pool: 0,
            },
        );
    }

    /// Replace a mint's fee parameters.
    pub fn set_fee_config(&self, mint: &Address, fee_config: TransferFeeConfig) {
        if let Some(record) = self.state.lock().mints.get_mut(mint) {
            record.fee_config = fee_config;
        }
    }

    /// Open the holding account of `owner` under `mint` outside of any
    /// instruction. Idempotent.
    pub fn open_account(&self, owner: Address, mint: Address) -> Address {
        let address = Address::holding_account(&owner, &mint);
        self.state
            .lock()
            .accounts
            .entry(address)
            .or_insert(HoldingRecord {
                owner,
                mint,
                balance: 0,
                withheld: 0,
            });
        address
    }

    /// Issue `amount` directly into `account`, raising supply.
    pub fn issue(&self, account: &Address, amount: u64) -> Result<(), Rejection> {
        let mut state = self.state.lock();
        let mint = state
            .accounts
            .get(account)
            .map(|a| a.mint)
            .ok_or_else(|| not_found(account))?;
        let record = state.mints.get_mut(&mint).ok_or_else(|| not_found(&mint))?;
        record.supply = record
            .supply
            .checked_add(amount)
            .ok_or_else(|| Rejection::new(RejectionKind::Other, "supply overflow"))?;
        if let Some(holding) = state.accounts.get_mut(account) {
            holding.balance += amount;
        }
        Ok(())
    }

    /// Unsigned transfer between two holdings, as any third party would
    /// make. Returns the fee withheld on the destination.
    pub fn transfer(
        &self,
        source: &Address,
        destination: &Address,
        amount: u64,
    ) -> Result<u64, Rejection> {
        let mut state = self.state.lock();
        state.apply_transfer(source, destination, amount)
    }

    pub fn balance(&self, account: &Address) -> u64 {
        self.state
            .lock()
            .accounts
            .get(account)
            .map(|a| a.balance)
            .unwrap_or(0)
    }

    pub fn withheld(&self, account: &Address) -> u64 {
        self.state
            .lock()
            .accounts
            .get(account)
            .map(|a| a.withheld)
            .unwrap_or(0)
    }

    pub fn withheld_pool(&self, mint: &Address) -> u64 {
        self.state
            .lock()
            .mints
            .get(mint)
            .map(|m| m.withheld_pool)
            .unwrap_or(0)
    }

    pub fn supply(&self, mint: &Address) -> u64 {
        self.state
            .lock()
            .mints
            .get(mint)
            .map(|m| m.supply)
            .unwrap_or(0)
    }

    /// Whether `read_account` reports the withheld component.
    pub fn set_reports_withheld(&self, reports: bool) {
        self.state.lock().reports_withheld = reports;
    }

    /// Reject the next submission with `rejection`, whatever it is.
    pub fn fail_next(&self, rejection: Rejection) {
        self.state.lock().faults.push_back(rejection);
    }

    /// Every instruction submitted so far, confirmed or not.
    pub fn submitted(&self) -> Vec<SignedInstruction> {
        self.state.lock().submitted.clone()
    }
}

fn not_found(address: &Address) -> Rejection {
    Rejection::new(
        RejectionKind::AccountNotFound,
        format!("account {} not found", address),
    )
}

fn unauthorized(signer: &Address) -> Rejection {
    Rejection::new(
        RejectionKind::Unauthorized,
        format!("{} is not the required authority", signer),
    )
}

fn insufficient(account: &Address, balance: u64, amount: u64) -> Rejection {
    Rejection::new(
        RejectionKind::InsufficientFunds,
        format!(
            "insufficient funds in {}: balance {}, needed {}",
            account, balance, amount
        ),
    )
}

impl LedgerState {
    fn holding(&self, address: &Address, mint: &Address) -> Result<&HoldingRecord, Rejection> {
        let holding = self.accounts.get(address).ok_or_else(|| not_found(address))?;
        if holding.mint != *mint {
            return Err(Rejection::new(
                RejectionKind::Other,
                format!("account {} belongs to mint {}", address, holding.mint),
            ));
        }
        Ok(holding)
    }

    fn mint(&self, mint: &Address) -> Result<&MintRecord, Rejection> {
        self.mints.get(mint).ok_or_else(|| not_found(mint))
    }

    fn apply_transfer(
        &mut self,
        source: &Address,
        destination: &Address,
        amount: u64,
    ) -> Result<u64, Rejection> {
        let from = self.accounts.get(source).ok_or_else(|| not_found(source))?;
        let mint = from.mint;
        if from.balance < amount {
            return Err(insufficient(source, from.balance, amount));
        }
        self.holding(destination, &mint)?;
        let fee = self.mint(&mint)?.fee_config.calculate_fee(amount);

        if let Some(from) = self.accounts.get_mut(source) {
            from.balance -= amount;
        }
        if let Some(to) = self.accounts.get_mut(destination) {
            to.balance += amount - fee;
            to.withheld += fee;
        }
        Ok(fee)
    }

    fn apply(&mut self, signer: &Address, instruction: &Instruction) -> Result<(), Rejection> {
        match instruction {
            Instruction::CreateHoldingAccount { payer, owner, mint } => {
                if signer != payer {
                    return Err(unauthorized(signer));
                }
                self.mint(mint)?;
                let address = Address::holding_account(owner, mint);
                if self.accounts.contains_key(&address) {
                    return Err(Rejection::new(
                        RejectionKind::AccountAlreadyExists,
                        format!("account {} already in use", address),
                    ));
                }
                self.accounts.insert(
                    address,
                    HoldingRecord {
                        owner: *owner,
                        mint: *mint,
                        balance: 0,
                        withheld: 0,
                    },
                );
            }

            Instruction::MintTo {
                mint,
                destination,
                amount,
            } => {
                let record = self.mint(mint)?;
                if record.authority != *signer {
                    return Err(unauthorized(signer));
                }
                let supply = record
                    .supply
                    .checked_add(*amount)
                    .ok_or_else(|| Rejection::new(RejectionKind::Other, "supply overflow"))?;
                self.holding(destination, mint)?;

                if let Some(record) = self.mints.get_mut(mint) {
                    record.supply = supply;
                }
                if let Some(holding) = self.accounts.get_mut(destination) {
                    holding.balance += amount;
                }
            }

            Instruction::HarvestWithheld { mint, sources } => {
                self.mint(mint)?;
                let sources: BTreeSet<&Address> = sources.iter().collect();
                let mut total: u64 = 0;
                for source in &sources {
                    total += self.holding(source, mint)?.withheld;
                }
                if total == 0 {
                    return Err(Rejection::new(
                        RejectionKind::NothingToHarvest,
                        "no withheld amounts to harvest",
                    ));
                }
                for source in sources {
                    if let Some(holding) = self.accounts.get_mut(source) {
                        holding.withheld = 0;
                    }
                }
                if let Some(record) = self.mints.get_mut(mint) {
                    record.withheld_pool += total;
                }
            }

            Instruction::WithdrawWithheld { mint, destination } => {
                let record = self.mint(mint)?;
                if record.authority != *signer {
                    return Err(unauthorized(signer));
                }
                let pool = record.withheld_pool;
                self.holding(destination, mint)?;
                if pool == 0 {
                    return Err(Rejection::new(
                        RejectionKind::NothingToWithdraw,
                        "withheld pool is empty",
                    ));
                }
                if let Some(record) = self.mints.get_mut(mint) {
                    record.withheld_pool = 0;
                }
                if let Some(holding) = self.accounts.get_mut(destination) {
                    holding.balance += pool;
                }
            }

            Instruction::Burn {
                mint,
                source,
                amount,
            } => {
                let holding = self.holding(source, mint)?;
                if holding.owner != *signer {
                    return Err(unauthorized(signer));
                }
                if holding.balance < *amount {
                    return Err(insufficient(source, holding.balance, *amount));
                }
                self.mint(mint)?;

                if let Some(holding) = self.accounts.get_mut(source) {
                    holding.balance -= amount;
                }
                if let Some(record) = self.mints.get_mut(mint) {
                    record.supply -= amount;
                }
            }

            Instruction::TransferChecked {
                mint,
                source,
                destination,
                amount,
                decimals,
            } => {
                let record = self.mint(mint)?;
                if record.decimals != *decimals {
                    return Err(Rejection::new(
                        RejectionKind::Other,
                        format!("mint decimals mismatch: {} != {}", decimals, record.decimals),
                    ));
                }
                if self.holding(source, mint)?.owner != *signer {
                    return Err(unauthorized(signer));
                }
                self.apply_transfer(source, destination, *amount)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn read_account(&self, address: &Address) -> Result<AccountState, LedgerError> {
        let state = self.state.lock();
        let holding = state
            .accounts
            .get(address)
            .ok_or(LedgerError::AccountNotFound(*address))?;
        Ok(AccountState {
            address: *address,
            owner: holding.owner,
            mint: holding.mint,
            balance: holding.balance,
            withheld_hint: state.reports_withheld.then_some(holding.withheld),
        })
    }

    async fn read_mint(&self, address: &Address) -> Result<MintState, LedgerError> {
        let state = self.state.lock();
        let record = state
            .mints
            .get(address)
            .ok_or(LedgerError::MintNotFound(*address))?;
        Ok(MintState {
            address: *address,
            decimals: record.decimals,
            supply: record.supply,
            mint_authority: record.authority,
            fee_config: record.fee_config,
        })
    }

    async fn account_exists(&self, address: &Address) -> Result<bool, LedgerError> {
        Ok(self.state.lock().accounts.contains_key(address))
    }

    async fn list_holding_accounts(
        &self,
        mint: &Address,
    ) -> Result<Vec<AccountState>, LedgerError> {
        let state = self.state.lock();
        if !state.mints.contains_key(mint) {
            return Err(LedgerError::MintNotFound(*mint));
        }
        Ok(state
            .accounts
            .iter()
            .filter(|(_, holding)| holding.mint == *mint)
            .map(|(address, holding)| AccountState {
                address: *address,
                owner: holding.owner,
                mint: holding.mint,
                balance: holding.balance,
                withheld_hint: state.reports_withheld.then_some(holding.withheld),
            })
            .collect())
    }

    async fn submit(&self, instruction: SignedInstruction) -> Result<Submission, LedgerError> {
        let mut state = self.state.lock();
        state.submitted.push(instruction.clone());

        if let Some(rejection) = state.faults.pop_front() {
            return Ok(Submission::Rejected(rejection));
        }
        if !instruction.verify() {
            return Ok(Submission::Rejected(Rejection::new(
                RejectionKind::InvalidSignature,
                "signature verification failed",
            )));
        }

        Ok(match state.apply(&instruction.signer, &instruction.instruction) {
            Ok(()) => Submission::Confirmed(instruction.signature),
            Err(rejection) => Submission::Rejected(rejection),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::{Authority, Keypair};

    const DECIMALS: u8 = 9;

    struct Fixture {
        ledger: MemoryLedger,
        authority: Keypair,
        mint: Address,
        treasury: Address,
    }

    fn fixture() -> Fixture {
        let ledger = MemoryLedger::new();
        let authority = Keypair::from_seed(&[1u8; 32]);
        let mint = Address::derive(&[b"mint"]);
        ledger.add_mint(
            mint,
            authority.address(),
            DECIMALS,
            TransferFeeConfig::new(100, 1_000_000),
        );
        let treasury = ledger.open_account(authority.address(), mint);
        Fixture {
            ledger,
            authority,
            mint,
            treasury,
        }
    }

    async fn submit(f: &Fixture, instruction: Instruction) -> Submission {
        let signed = SignedInstruction::sign(instruction, &f.authority).unwrap();
        f.ledger.submit(signed).await.unwrap()
    }

    #[test]
    fn test_transfer_withholds_fee_on_destination() {
        let f = fixture();
        let other = f.ledger.open_account(Address::derive(&[b"alice"]), f.mint);
        f.ledger.issue(&f.treasury, 10_000).unwrap();

        let fee = f.ledger.transfer(&f.treasury, &other, 10_000).unwrap();

        assert_eq!(fee, 100);
        assert_eq!(f.ledger.balance(&other), 9_900);
        assert_eq!(f.ledger.withheld(&other), 100);
        assert_eq!(f.ledger.supply(&f.mint), 10_000);
    }

    #[tokio::test]
    async fn test_harvest_with_nothing_withheld_is_rejected_as_empty() {
        let f = fixture();
        let result = submit(
            &f,
            Instruction::HarvestWithheld {
                mint: f.mint,
                sources: vec![f.treasury],
            },
        )
        .await;

        match result {
            Submission::Rejected(r) => assert_eq!(r.kind, RejectionKind::NothingToHarvest),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_harvest_counts_a_repeated_source_once() {
        let f = fixture();
        let other = f.ledger.open_account(Address::derive(&[b"alice"]), f.mint);
        f.ledger.issue(&f.treasury, 10_000).unwrap();
        f.ledger.transfer(&f.treasury, &other, 10_000).unwrap();

        let result = submit(
            &f,
            Instruction::HarvestWithheld {
                mint: f.mint,
                sources: vec![other, other, other],
            },
        )
        .await;

        assert!(matches!(result, Submission::Confirmed(_)));
        assert_eq!(f.ledger.withheld(&other), 0);
        assert_eq!(f.ledger.withheld_pool(&f.mint), 100);
    }

    #[tokio::test]
    async fn test_withdraw_requires_mint_authority() {
        let f = fixture();
        let intruder = Keypair::from_seed(&[2u8; 32]);
        let signed = SignedInstruction::sign(
            Instruction::WithdrawWithheld {
                mint: f.mint,
                destination: f.treasury,
            },
            &intruder,
        )
        .unwrap();

        match f.ledger.submit(signed).await.unwrap() {
            Submission::Rejected(r) => assert_eq!(r.kind, RejectionKind::Unauthorized),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tampered_instruction_is_rejected() {
        let f = fixture();
        let mut signed = SignedInstruction::sign(
            Instruction::MintTo {
                mint: f.mint,
                destination: f.treasury,
                amount: 1,
            },
            &f.authority,
        )
        .unwrap();
        signed.instruction = Instruction::MintTo {
            mint: f.mint,
            destination: f.treasury,
            amount: 1_000_000,
        };

        match f.ledger.submit(signed).await.unwrap() {
            Submission::Rejected(r) => assert_eq!(r.kind, RejectionKind::InvalidSignature),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(f.ledger.supply(&f.mint), 0);
    }

    #[tokio::test]
    async fn test_fail_next_consumes_one_fault() {
        let f = fixture();
        f.ledger
            .fail_next(Rejection::new(RejectionKind::Other, "blockhash not found"));

        let mint_to = Instruction::MintTo {
            mint: f.mint,
            destination: f.treasury,
            amount: 5,
        };
        assert!(matches!(
            submit(&f, mint_to.clone()).await,
            Submission::Rejected(_)
        ));
        assert!(matches!(
            submit(&f, mint_to).await,
            Submission::Confirmed(_)
        ));
        assert_eq!(f.ledger.supply(&f.mint), 5);
        assert_eq!(f.ledger.submitted().len(), 2);
    }

    #[tokio::test]
    async fn test_read_account_hides_withheld_when_configured() {
        let f = fixture();
        f.ledger.set_reports_withheld(false);
        let state = f.ledger.read_account(&f.treasury).await.unwrap();
        assert_eq!(state.withheld_hint, None);
    }
}
