//! Burn coordination: preconditions, submission, and proof production.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::amount::TokenAmount;
use crate::catalog::{AssetCatalog, CatalogMode};
use crate::error::{BurnProofError, Result};
use crate::ledger::{
    fetch_balance, IssuedAmount, LedgerClient, LedgerTransaction, Memo, TX_HASH_HEX_LEN,
};
use crate::proof::{BurnProof, BurnTransaction, LedgerFacts, ProofAssembler};
use crate::selector;

/// Outcome of a successful burn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnResult {
    pub transaction_hash: String,
    pub ledger_index: u32,
    pub proof: BurnProof,
}

/// Burns catalog tokens for a holder and produces the proof of each burn.
///
/// The coordinator borrows the ledger client and catalog; it holds no state of
/// its own between calls.
pub struct BurnCoordinator<'a, L: LedgerClient + ?Sized> {
    ledger: &'a L,
    catalog: &'a AssetCatalog,
    issuer: &'a str,
}

impl<'a, L: LedgerClient + ?Sized> BurnCoordinator<'a, L> {
    pub fn new(ledger: &'a L, catalog: &'a AssetCatalog, issuer: &'a str) -> Self {
        Self {
            ledger,
            catalog,
            issuer,
        }
    }

    /// Burn `amount` whole units of `token` held by `holder`.
    ///
    /// Preconditions are checked in order and abort the burn before anything
    /// is submitted: positive and representable amount, registered token,
    /// sufficient balance.
    pub async fn burn(&self, holder: &str, token: &str, amount: u64) -> Result<BurnResult> {
        let need = match TokenAmount::checked_from_units(amount) {
            Some(need) if !need.is_zero() => need,
            _ => {
                return Err(BurnProofError::InvalidAmount {
                    token: token.to_string(),
                    amount,
                })
            }
        };

        let entry = self.catalog.lookup(token)?;
        let symbol = entry.token.symbol.as_str();

        let balance = fetch_balance(self.ledger, holder, symbol, self.issuer)
            .await
            .map_err(|e| BurnProofError::ledger("get_trust_lines", None, e))?;
        debug!(token = symbol, holder, have = %balance.amount, need = %need, "checked balance");
        if balance.amount < need {
            return Err(BurnProofError::InsufficientBalance {
                token: symbol.to_string(),
                have: balance.amount,
                need,
            });
        }

        let tx = LedgerTransaction::burn(
            holder,
            IssuedAmount {
                currency: symbol.to_string(),
                issuer: self.issuer.to_string(),
                value: need,
            },
            self.burn_memo(symbol, entry.media_format, amount),
        );

        let signed = self
            .ledger
            .prepare(&tx)
            .await
            .map_err(|e| BurnProofError::ledger("prepare", None, e))?;
        let tx_hash = signed.hash.clone();
        info!(token = symbol, amount, tx_hash = %tx_hash, "submitting burn");

        let outcome = self
            .ledger
            .submit(&signed)
            .await
            .map_err(|e| BurnProofError::ledger("submit", Some(&tx_hash), e))?;
        if !outcome.result_code.is_success() {
            warn!(token = symbol, amount, tx_hash = %tx_hash, code = %outcome.result_code, "burn rejected");
            return Err(BurnProofError::BurnRejected {
                token: symbol.to_string(),
                amount,
                tx_hash,
                code: outcome.result_code.0,
            });
        }

        let burn = BurnTransaction {
            hash: tx_hash,
            token: symbol.to_string(),
            amount,
            burner_address: holder.to_string(),
            issuer_address: self.issuer.to_string(),
            ledger_index: outcome.ledger_index,
            result_code: outcome.result_code,
        };
        info!(token = symbol, amount, tx_hash = %burn.hash, ledger_index = burn.ledger_index, "burn settled");

        let proof = self.prove(&burn).await?;
        Ok(BurnResult {
            transaction_hash: burn.hash,
            ledger_index: burn.ledger_index,
            proof,
        })
    }

    /// Fetch ledger facts for a settled burn and assemble its proof.
    pub async fn prove(&self, burn: &BurnTransaction) -> Result<BurnProof> {
        if !is_tx_hash(&burn.hash) {
            return Err(BurnProofError::InvalidTransactionHash(burn.hash.clone()));
        }

        let facts = self.fetch_facts(burn).await?;
        if !facts.transaction.validated {
            return Err(BurnProofError::NotValidated {
                tx_hash: burn.hash.clone(),
            });
        }

        let media_id = selector::select(&burn.hash, self.catalog.selection_size())?;
        let media_format = self
            .catalog
            .media_format(media_id)
            .ok_or(BurnProofError::InvalidCatalogSize)?;

        let proof = ProofAssembler::assemble(burn, &facts, media_id, media_format);
        info!(
            tx_hash = %burn.hash,
            media_id,
            media_format,
            proof_hash = %proof.proof_hash,
            "burn proof assembled"
        );
        Ok(proof)
    }

    async fn fetch_facts(&self, burn: &BurnTransaction) -> Result<LedgerFacts> {
        let transaction = self
            .ledger
            .get_transaction(&burn.hash)
            .await
            .map_err(|e| BurnProofError::ledger("get_transaction", Some(&burn.hash), e))?;
        let ledger = self
            .ledger
            .get_ledger(burn.ledger_index)
            .await
            .map_err(|e| BurnProofError::ledger("get_ledger", Some(&burn.hash), e))?;
        Ok(LedgerFacts {
            transaction,
            ledger,
        })
    }

    fn burn_memo(&self, symbol: &str, media_format: &str, amount: u64) -> Memo {
        let data = format!("{} Burn - {} tokens for NFT mint", symbol, amount);
        match self.catalog.mode() {
            CatalogMode::Single => Memo::new("token_burn", &data, Some("burn_proof")),
            CatalogMode::Multi => Memo::new("multi_token_burn", &data, Some(media_format)),
        }
    }
}

fn is_tx_hash(hash: &str) -> bool {
    hash.len() == TX_HASH_HEX_LEN && hash.bytes().all(|b| b.is_ascii_hexdigit())
}
