//! Ledger instructions and their signed envelope.

use serde::{Deserialize, Serialize};

use crate::{
    address::Address,
    authority::{Authority, TxSignature},
};

/// A single ledger-mutating instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Instruction {
    /// Create the holding account of `owner` under `mint`, paid by `payer`.
    CreateHoldingAccount {
        payer: Address,
        owner: Address,
        mint: Address,
    },

    /// Issue `amount` base units into `destination`.
    MintTo {
        mint: Address,
        destination: Address,
        amount: u64,
    },

    /// Move the withheld component of each source into the mint's pool.
    HarvestWithheld { mint: Address, sources: Vec<Address> },

    /// Move the mint's withheld pool into `destination`.
    WithdrawWithheld { mint: Address, destination: Address },

    /// Destroy `amount` base units held in `source`.
    Burn {
        mint: Address,
        source: Address,
        amount: u64,
    },

    /// Move `amount` base units; the ledger withholds the transfer fee on
    /// the destination.
    TransferChecked {
        mint: Address,
        source: Address,
        destination: Address,
        amount: u64,
        decimals: u8,
    },
}

impl Instruction {
    /// Canonical bytes covered by the signature.
    pub fn message(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::CreateHoldingAccount { .. } => "create-holding-account",
            Instruction::MintTo { .. } => "mint-to",
            Instruction::HarvestWithheld { .. } => "harvest-withheld",
            Instruction::WithdrawWithheld { .. } => "withdraw-withheld",
            Instruction::Burn { .. } => "burn",
            Instruction::TransferChecked { .. } => "transfer-checked",
        }
    }
}

/// An instruction together with the authority that signed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedInstruction {
    pub instruction: Instruction,
    pub signer: Address,
    pub signature: TxSignature,
}

impl SignedInstruction {
    pub fn sign<A: Authority + ?Sized>(
        instruction: Instruction,
        authority: &A,
    ) -> Result<Self, bincode::Error> {
        let signature = authority.sign(&instruction.message()?);
        Ok(Self {
            instruction,
            signer: authority.address(),
            signature,
        })
    }

    /// Whether the signature covers the instruction for `signer`.
    pub fn verify(&self) -> bool {
        match self.instruction.message() {
            Ok(message) => self.signature.verify(&self.signer, &message),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::Keypair;

    fn burn(amount: u64) -> Instruction {
        Instruction::Burn {
            mint: Address::derive(&[b"mint"]),
            source: Address::derive(&[b"vault"]),
            amount,
        }
    }

    #[test]
    fn test_signed_instruction_verifies() {
        let keypair = Keypair::from_seed(&[5u8; 32]);
        let signed = SignedInstruction::sign(burn(100), &keypair).unwrap();
        assert_eq!(signed.signer, keypair.address());
        assert!(signed.verify());
    }

    #[test]
    fn test_tampered_amount_fails_verification() {
        let keypair = Keypair::from_seed(&[5u8; 32]);
        let mut signed = SignedInstruction::sign(burn(100), &keypair).unwrap();
        signed.instruction = burn(1_000);
        assert!(!signed.verify());
    }

    #[test]
    fn test_json_shape() {
        let keypair = Keypair::from_seed(&[5u8; 32]);
        let signed = SignedInstruction::sign(burn(7), &keypair).unwrap();
        let value = serde_json::to_value(&signed).unwrap();
        assert_eq!(value["instruction"]["burn"]["amount"], 7);
        assert_eq!(value["signer"], keypair.address().to_string());

        let back: SignedInstruction = serde_json::from_value(value).unwrap();
        assert!(back.verify());
    }
}
