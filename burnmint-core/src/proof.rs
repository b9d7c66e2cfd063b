//! Burn proof assembly.
//!
//! A [`BurnProof`] binds a settled burn to its media selection. The record is
//! handed to the verification circuit as-is, and `proof_hash` lets anyone with
//! the record recompute the commitment without touching the ledger.
//!
//! # Commitment
//!
//! `proof_hash = hex(sha256(preimage))`, where the preimage is the compact JSON
//! object
//!
//! ```text
//! {"xrplTxHash":..,"burnAmount":..,"burnerAddress":..,"currency":..,"issuer":..,"ledgerIndex":..,"timestamp":..}
//! ```
//!
//! with keys in exactly that order. `mediaId` is not part of the preimage: it
//! is a function of `xrplTxHash`, which is.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::catalog::{asset_class, AssetClass};
use crate::error::Result;
use crate::ledger::{LedgerHeader, Memo, ResultCode, TransactionRecord};
use crate::selector;

/// Placeholder recipient until the caller supplies a verification-chain key.
pub const DEFAULT_RECIPIENT: &str = "MIDNIGHT_WALLET_ADDRESS_HERE";

/// A burn the ledger settled with the success code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnTransaction {
    pub hash: String,
    pub token: String,
    /// Whole token units burned.
    pub amount: u64,
    pub burner_address: String,
    pub issuer_address: String,
    pub ledger_index: u32,
    pub result_code: ResultCode,
}

/// Ledger facts fetched after settlement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerFacts {
    pub transaction: TransactionRecord,
    pub ledger: LedgerHeader,
}

/// Snapshot of the burn transaction's envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetails {
    pub account: String,
    pub destination: Option<String>,
    pub fee: String,
    pub sequence: u32,
    pub memos: Vec<Memo>,
}

/// Closed-ledger evidence for the burn: the ledger hash and index are the
/// inclusion evidence, the rest is context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerProof {
    pub close_time: u64,
    pub parent_hash: String,
    pub total_coins: String,
}

/// Hash-committed proof of a burn and its media selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnProof {
    pub xrpl_tx_hash: String,
    pub burn_amount: u64,
    pub burner_address: String,
    #[serde(rename = "currency")]
    pub token: String,
    pub issuer: String,
    pub media_id: u32,
    pub media_format: String,
    pub asset_class: AssetClass,
    pub ledger_index: u32,
    pub ledger_hash: String,
    pub timestamp: u64,
    pub transaction_details: TransactionDetails,
    pub transaction_result: ResultCode,
    pub validated: bool,
    pub ledger_proof: LedgerProof,
    pub proof_hash: String,
}

/// Commitment preimage. Field order is part of the format.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitmentPreimage<'a> {
    xrpl_tx_hash: &'a str,
    burn_amount: u64,
    burner_address: &'a str,
    currency: &'a str,
    issuer: &'a str,
    ledger_index: u32,
    timestamp: u64,
}

/// Inputs consumed by the burn-to-mint circuit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitInputs {
    pub xrpl_tx_hash: String,
    pub burn_amount: u64,
    pub media_id: u32,
    pub recipient: String,
}

/// Compute the commitment over the fixed field subset.
pub fn commitment_hash(
    xrpl_tx_hash: &str,
    burn_amount: u64,
    burner_address: &str,
    currency: &str,
    issuer: &str,
    ledger_index: u32,
    timestamp: u64,
) -> String {
    let preimage = CommitmentPreimage {
        xrpl_tx_hash,
        burn_amount,
        burner_address,
        currency,
        issuer,
        ledger_index,
        timestamp,
    };
    // Serializing a struct of strings and integers cannot fail.
    let bytes = serde_json::to_vec(&preimage).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

/// Current wall clock in whole unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Builds [`BurnProof`]s from already-fetched facts.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProofAssembler;

impl ProofAssembler {
    /// Assemble a proof stamped with the current time.
    pub fn assemble(
        tx: &BurnTransaction,
        facts: &LedgerFacts,
        media_id: u32,
        media_format: &str,
    ) -> BurnProof {
        Self::assemble_at(tx, facts, media_id, media_format, unix_now())
    }

    /// Assemble a proof with an explicit timestamp.
    pub fn assemble_at(
        tx: &BurnTransaction,
        facts: &LedgerFacts,
        media_id: u32,
        media_format: &str,
        timestamp: u64,
    ) -> BurnProof {
        let record = &facts.transaction;
        let proof_hash = commitment_hash(
            &tx.hash,
            tx.amount,
            &tx.burner_address,
            &tx.token,
            &tx.issuer_address,
            tx.ledger_index,
            timestamp,
        );

        BurnProof {
            xrpl_tx_hash: tx.hash.clone(),
            burn_amount: tx.amount,
            burner_address: tx.burner_address.clone(),
            token: tx.token.clone(),
            issuer: tx.issuer_address.clone(),
            media_id,
            media_format: media_format.to_string(),
            asset_class: asset_class(media_format),
            ledger_index: tx.ledger_index,
            ledger_hash: facts.ledger.ledger_hash.clone(),
            timestamp,
            transaction_details: TransactionDetails {
                account: record.account.clone(),
                destination: record.destination.clone(),
                fee: record.fee.clone(),
                sequence: record.sequence,
                memos: record.memos.clone(),
            },
            transaction_result: tx.result_code.clone(),
            validated: record.validated,
            ledger_proof: LedgerProof {
                close_time: facts.ledger.close_time,
                parent_hash: facts.ledger.parent_hash.clone(),
                total_coins: facts.ledger.total_coins.clone(),
            },
            proof_hash,
        }
    }

    /// Rebuild a proof from its own stored facts, keeping the original timestamp.
    pub fn replay(proof: &BurnProof) -> BurnProof {
        let tx = BurnTransaction {
            hash: proof.xrpl_tx_hash.clone(),
            token: proof.token.clone(),
            amount: proof.burn_amount,
            burner_address: proof.burner_address.clone(),
            issuer_address: proof.issuer.clone(),
            ledger_index: proof.ledger_index,
            result_code: proof.transaction_result.clone(),
        };
        let details = &proof.transaction_details;
        let facts = LedgerFacts {
            transaction: TransactionRecord {
                hash: proof.xrpl_tx_hash.clone(),
                account: details.account.clone(),
                destination: details.destination.clone(),
                fee: details.fee.clone(),
                sequence: details.sequence,
                memos: details.memos.clone(),
                validated: proof.validated,
                ledger_index: Some(proof.ledger_index),
                result_code: Some(proof.transaction_result.clone()),
            },
            ledger: LedgerHeader {
                ledger_index: proof.ledger_index,
                ledger_hash: proof.ledger_hash.clone(),
                close_time: proof.ledger_proof.close_time,
                parent_hash: proof.ledger_proof.parent_hash.clone(),
                total_coins: proof.ledger_proof.total_coins.clone(),
            },
        };
        Self::assemble_at(&tx, &facts, proof.media_id, &proof.media_format, proof.timestamp)
    }
}

impl BurnProof {
    /// Commitment recomputed from this record's fields.
    pub fn recompute_hash(&self) -> String {
        commitment_hash(
            &self.xrpl_tx_hash,
            self.burn_amount,
            &self.burner_address,
            &self.token,
            &self.issuer,
            self.ledger_index,
            self.timestamp,
        )
    }

    /// Whether `proof_hash` matches the committed fields.
    pub fn verify_commitment(&self) -> bool {
        self.recompute_hash() == self.proof_hash
    }

    /// Whether `media_id` is the selection for `xrpl_tx_hash` over `catalog_size`.
    pub fn verify_selection(&self, catalog_size: u32) -> Result<bool> {
        Ok(selector::select(&self.xrpl_tx_hash, catalog_size)? == self.media_id)
    }

    pub fn circuit_inputs(&self, recipient: &str) -> CircuitInputs {
        CircuitInputs {
            xrpl_tx_hash: self.xrpl_tx_hash.clone(),
            burn_amount: self.burn_amount,
            media_id: self.media_id,
            recipient: recipient.to_string(),
        }
    }
}
