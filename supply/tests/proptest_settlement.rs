//! Property-based tests for supply settlement.
//!
//! These check the conservation properties of the engine for arbitrary
//! fee rates, transfer patterns and starting supplies, not just the fixed
//! scenarios of the integration tests.

use cinder_supply::{
    address::Address,
    amount::TransferFeeConfig,
    authority::{Authority, Keypair},
    harvest::{run_fee_harvest_cycle, sweep_sources},
    instruction::Instruction,
    ledger::{EngineOptions, MemoryLedger},
    minter::{mint_to_ceiling, MintOutcome},
    record::{DeploymentRecord, MintConfig},
};
use proptest::prelude::*;

const DECIMALS: u8 = 6;
const MAX_SUPPLY_TOKENS: u64 = 1_000_000_000;

fn setup(fee_rate_bps: u16, max_fee_units: u64) -> (MemoryLedger, Keypair, DeploymentRecord) {
    let treasury = Keypair::from_seed(&[11u8; 32]);
    let record = DeploymentRecord {
        mint_address: Address::derive(&[b"prop-mint"]),
        treasury_address: treasury.address(),
        network: "localnet".to_string(),
        config: MintConfig {
            decimals: DECIMALS,
            max_supply: MAX_SUPPLY_TOKENS,
            fee_rate_bps,
            max_fee_units,
        },
    };
    let ledger = MemoryLedger::new();
    ledger.add_mint(
        record.mint_address,
        treasury.address(),
        DECIMALS,
        record.config.fee_config().unwrap(),
    );
    (ledger, treasury, record)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

// ============================================================================
// Fee Formula Properties
// ============================================================================

proptest! {
    /// Property: the fee never exceeds the cap nor the transferred amount,
    /// and is within one base unit of the exact rate fee when uncapped.
    #[test]
    fn prop_fee_bounded_by_cap_and_rate(
        amount in any::<u64>(),
        bps in 0u16..=10_000,
        cap in any::<u64>(),
    ) {
        let fee = TransferFeeConfig::new(bps, cap).calculate_fee(amount);
        prop_assert!(fee <= cap);
        prop_assert!(fee <= amount);

        let exact = amount as u128 * bps as u128;
        if (fee as u128) < cap as u128 {
            prop_assert!(fee as u128 * 10_000 >= exact);
            prop_assert!((fee as u128) * 10_000 < exact + 10_000);
        }
    }
}

// ============================================================================
// Pipeline Conservation Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: the burn equals the withdraw delta bit for bit, and supply
    /// falls by exactly the fees withheld from the transfers.
    #[test]
    fn prop_burn_equals_withdrawn_delta(
        bps in 1u16..=10_000,
        max_fee_units in 1u64..1_000,
        transfers in prop::collection::vec(1u64..50_000_000_000, 1..8),
    ) {
        let (ledger, treasury, record) = setup(bps, max_fee_units);
        let options = EngineOptions::default();
        let rt = runtime();

        rt.block_on(mint_to_ceiling(&ledger, &treasury, &record, &options)).unwrap();
        let vault = record.treasury_account();

        let mut fees = 0u64;
        for (i, amount) in transfers.iter().enumerate() {
            let holder = ledger.open_account(
                Address::derive(&[b"holder", &(i as u64).to_le_bytes()]),
                record.mint_address,
            );
            fees += ledger.transfer(&vault, &holder, *amount).unwrap();
        }
        let supply_before = ledger.supply(&record.mint_address);

        let report = rt.block_on(async {
            let sources = sweep_sources(&ledger, &record).await?;
            run_fee_harvest_cycle(&ledger, &treasury, &record, &sources, &options).await
        }).unwrap();

        let burns: Vec<u64> = ledger
            .submitted()
            .into_iter()
            .filter_map(|signed| match signed.instruction {
                Instruction::Burn { amount, .. } => Some(amount),
                _ => None,
            })
            .collect();

        match report.withdraw.confirmed() {
            Some(withdrawn) => {
                prop_assert_eq!(&burns, &vec![withdrawn.fee_amount]);
                prop_assert_eq!(withdrawn.fee_amount, fees);
            }
            None => prop_assert_eq!(fees, 0),
        }
        prop_assert_eq!(ledger.supply(&record.mint_address), supply_before - fees);
    }

    /// Property: after a mint run, supply equals the ceiling whenever it
    /// started at or below it, and is untouched otherwise.
    #[test]
    fn prop_minter_postcondition(start in 0u64..=2_000_000_000_000_000) {
        let (ledger, treasury, record) = setup(100, 10);
        let options = EngineOptions::default();
        let max = record.config.max_supply_base().unwrap();

        let vault = ledger.open_account(treasury.address(), record.mint_address);
        ledger.issue(&vault, start).unwrap();

        let outcome = runtime()
            .block_on(mint_to_ceiling(&ledger, &treasury, &record, &options))
            .unwrap();

        let supply = ledger.supply(&record.mint_address);
        if start <= max {
            prop_assert_eq!(supply, max);
            prop_assert_eq!(outcome.minted(), max - start);
        } else {
            prop_assert_eq!(supply, start);
            let reached = matches!(outcome, MintOutcome::CeilingReached { .. });
            prop_assert!(reached);
        }
    }
}
