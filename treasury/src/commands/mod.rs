//! CLI Commands
//!
//! One module per operational entry point.

pub mod harvest;
pub mod mint;
pub mod status;
pub mod verify;

use anyhow::{Context, Result};
use std::path::PathBuf;
use thiserror::Error;

use cinder_supply::{
    authority::Keypair,
    error::{ConfigError, SupplyError, EXIT_CONFIG, EXIT_LEDGER, EXIT_VERIFICATION},
    ledger::{EngineOptions, LedgerError},
    record::DeploymentRecord,
};

use crate::{
    config::{Settings, SettingsError},
    gateway::GatewayLedger,
    keys::load_treasury_key,
};

/// Exit status for failures outside the engine's taxonomy.
pub const EXIT_FAILURE: u8 = 1;

/// The probe transfer completed but the fee did not match.
#[derive(Debug, Error)]
#[error("transfer fee mismatch: deviation {deviation} exceeds tolerance {tolerance}")]
pub struct VerificationFailed {
    pub deviation: String,
    pub tolerance: String,
}

/// Everything a command needs to locate the deployment, the key and the
/// gateway.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub settings: Settings,
    pub deployment: PathBuf,
    pub keypair: Option<PathBuf>,
    pub rpc_url: Option<String>,
}

impl Invocation {
    pub fn load_record(&self) -> Result<DeploymentRecord> {
        let record = DeploymentRecord::load(&self.deployment)?;
        Ok(record)
    }

    pub fn load_authority(&self, record: &DeploymentRecord) -> Result<Keypair> {
        let keypair = load_treasury_key(self.keypair.as_deref(), record)?;
        Ok(keypair)
    }

    pub fn connect(&self, record: &DeploymentRecord) -> Result<GatewayLedger> {
        let url = self.settings.endpoint(self.rpc_url.as_deref(), record)?;
        let ledger = GatewayLedger::new(url.as_str())
            .with_context(|| format!("Failed to set up gateway client for {}", url))?;
        Ok(ledger)
    }

    pub fn options(&self) -> EngineOptions {
        self.settings.engine_options()
    }
}

/// Map a command failure to its process exit status.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<SupplyError>() {
            return e.exit_code();
        }
        if cause.is::<ConfigError>() || cause.is::<SettingsError>() {
            return EXIT_CONFIG;
        }
        if cause.is::<LedgerError>() {
            return EXIT_LEDGER;
        }
        if cause.is::<VerificationFailed>() {
            return EXIT_VERIFICATION;
        }
    }
    EXIT_FAILURE
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("\x1b[31mError:\x1b[0m {}", message);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("\x1b[32m{}\x1b[0m", message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("\x1b[33mWarning:\x1b[0m {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_supply::{
        error::{InvariantViolation, Stage, EXIT_INVARIANT},
        ledger::{Rejection, RejectionKind},
    };

    #[test]
    fn test_exit_codes_by_category() {
        let config = anyhow::Error::new(ConfigError::MissingKey);
        let settings = anyhow::Error::new(SettingsError::UnknownNetwork("mars".into()));
        let rejected = anyhow::Error::new(SupplyError::Rejected {
            stage: Stage::Burn,
            rejection: Rejection::new(RejectionKind::Other, "custom program error: 0x1"),
        });
        let invariant = anyhow::Error::new(SupplyError::from(
            InvariantViolation::BurnExceedsDelta {
                burn: 2,
                available: 1,
            },
        ));
        let mismatch = anyhow::Error::new(VerificationFailed {
            deviation: "100".into(),
            tolerance: "0.001".into(),
        });
        let other = anyhow::anyhow!("something else");

        assert_eq!(exit_code(&config), EXIT_CONFIG);
        assert_eq!(exit_code(&settings), EXIT_CONFIG);
        assert_eq!(exit_code(&rejected), EXIT_LEDGER);
        assert_eq!(exit_code(&invariant), EXIT_INVARIANT);
        assert_eq!(exit_code(&mismatch), EXIT_VERIFICATION);
        assert_eq!(exit_code(&other), EXIT_FAILURE);
    }

    #[test]
    fn test_exit_code_looks_through_context() {
        let err = anyhow::Error::new(ConfigError::MissingKey).context("Failed to start");
        assert_eq!(exit_code(&err), EXIT_CONFIG);
    }
}
