//! Deployment Record.
//!
//! Written once when the mint is created and only read afterwards. Supply
//! ceiling and fee cap are stored in whole token units; helpers here scale
//! them to base units.

use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path};

use crate::{
    address::Address,
    amount::{to_base_units, AmountError, TransferFeeConfig, MAX_DECIMALS, MAX_FEE_BASIS_POINTS},
    error::{ConfigError, Stage, SupplyError},
    ledger::{Ledger, MintState},
};

/// Mint parameters fixed at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintConfig {
    pub decimals: u8,

    /// Supply ceiling in token units.
    pub max_supply: u64,

    /// Transfer fee rate in basis points.
    pub fee_rate_bps: u16,

    /// Per-transfer fee cap in token units.
    pub max_fee_units: u64,
}

impl MintConfig {
    pub fn max_supply_base(&self) -> Result<u64, AmountError> {
        to_base_units(self.max_supply, self.decimals).ok_or(AmountError::Overflow)
    }

    pub fn max_fee_base(&self) -> Result<u64, AmountError> {
        to_base_units(self.max_fee_units, self.decimals).ok_or(AmountError::Overflow)
    }

    /// Fee parameters in base units.
    pub fn fee_config(&self) -> Result<TransferFeeConfig, AmountError> {
        Ok(TransferFeeConfig::new(self.fee_rate_bps, self.max_fee_base()?))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decimals > MAX_DECIMALS {
            return Err(ConfigError::Invalid(format!(
                "decimals {} exceeds {}",
                self.decimals, MAX_DECIMALS
            )));
        }
        if self.fee_rate_bps > MAX_FEE_BASIS_POINTS {
            return Err(ConfigError::Invalid(format!(
                "feeRateBps {} exceeds {}",
                self.fee_rate_bps, MAX_FEE_BASIS_POINTS
            )));
        }
        self.max_supply_base()?;
        self.max_fee_base()?;
        Ok(())
    }
}

/// Persisted description of one deployed mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub mint_address: Address,

    /// Address of the Treasury Authority.
    pub treasury_address: Address,

    /// Network name or gateway endpoint.
    pub network: String,

    pub config: MintConfig,
}

impl DeploymentRecord {
    /// Load and validate a record from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ConfigError::MissingRecord(path.to_path_buf())
            } else {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let record: Self =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        record.config.validate()?;
        Ok(record)
    }

    /// The treasury's holding account, which doubles as the fee vault.
    pub fn treasury_account(&self) -> Address {
        Address::holding_account(&self.treasury_address, &self.mint_address)
    }

    /// Refuse to operate with a signer other than the recorded treasury.
    pub fn check_authority(&self, signer: &Address) -> Result<(), ConfigError> {
        if *signer != self.treasury_address {
            return Err(ConfigError::KeyMismatch {
                expected: self.treasury_address,
                actual: *signer,
            });
        }
        Ok(())
    }

    /// Read the mint and check it still has the recorded precision.
    pub async fn read_mint<L: Ledger + ?Sized>(
        &self,
        ledger: &L,
        stage: Stage,
    ) -> Result<MintState, SupplyError> {
        let mint = ledger
            .read_mint(&self.mint_address)
            .await
            .map_err(|e| SupplyError::ledger(stage, e))?;
        if mint.decimals != self.config.decimals {
            return Err(ConfigError::DecimalsMismatch {
                mint: self.mint_address,
                ledger: mint.decimals,
                record: self.config.decimals,
            }
            .into());
        }
        Ok(mint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_json() -> String {
        format!(
            r#"{{
                "mintAddress": "{}",
                "treasuryAddress": "{}",
                "network": "localnet",
                "config": {{
                    "decimals": 9,
                    "maxSupply": 1000000000,
                    "feeRateBps": 100,
                    "maxFeeUnits": 1000000
                }}
            }}"#,
            Address::derive(&[b"mint"]),
            Address::derive(&[b"treasury"])
        )
    }

    #[test]
    fn test_load_record() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(sample_json().as_bytes()).unwrap();

        let record = DeploymentRecord::load(file.path()).unwrap();
        assert_eq!(record.network, "localnet");
        assert_eq!(record.config.max_supply_base().unwrap(), 1_000_000_000_000_000_000);
        assert_eq!(
            record.config.fee_config().unwrap(),
            TransferFeeConfig::new(100, 1_000_000_000_000_000)
        );
        assert_eq!(
            record.treasury_account(),
            Address::holding_account(&record.treasury_address, &record.mint_address)
        );
    }

    #[test]
    fn test_missing_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployment-info.json");
        assert!(matches!(
            DeploymentRecord::load(&path),
            Err(ConfigError::MissingRecord(_))
        ));
    }

    #[test]
    fn test_malformed_record() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ \"mintAddress\": 5 }").unwrap();
        assert!(matches!(
            DeploymentRecord::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_check_authority() {
        let record: DeploymentRecord = serde_json::from_str(&sample_json()).unwrap();
        assert!(record.check_authority(&record.treasury_address).is_ok());
        assert!(matches!(
            record.check_authority(&Address::derive(&[b"someone"])),
            Err(ConfigError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let base = MintConfig {
            decimals: 9,
            max_supply: 1_000_000_000,
            fee_rate_bps: 100,
            max_fee_units: 1_000,
        };
        assert!(base.validate().is_ok());

        let too_many_decimals = MintConfig {
            decimals: 19,
            ..base.clone()
        };
        assert!(matches!(too_many_decimals.validate(), Err(ConfigError::Invalid(_))));

        let rate = MintConfig {
            fee_rate_bps: 10_001,
            ..base.clone()
        };
        assert!(matches!(rate.validate(), Err(ConfigError::Invalid(_))));

        let overflow = MintConfig {
            max_supply: u64::MAX,
            ..base
        };
        assert!(matches!(
            overflow.validate(),
            Err(ConfigError::Amount(AmountError::Overflow))
        ));
    }
}
