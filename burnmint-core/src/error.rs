//! Error types for the burn-to-proof pipeline.

use thiserror::Error;

use crate::amount::TokenAmount;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, BurnProofError>;

/// Errors raised by the external ledger collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Connection or transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete in time.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The requested object (transaction, ledger) is unknown to the ledger.
    #[error("not found: {0}")]
    NotFound(String),

    /// The ledger answered with something we could not interpret.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Aggregated error type for the pipeline.
#[derive(Debug, Error)]
pub enum BurnProofError {
    /// Requested amount is zero or exceeds what a ledger value can carry.
    #[error("invalid amount {amount} for {token}: must be between 1 and {}", crate::amount::MAX_UNITS)]
    InvalidAmount { token: String, amount: u64 },

    /// Symbol not registered in the catalog.
    #[error("unknown token type: {0}")]
    UnknownTokenType(String),

    /// Holder balance does not cover the requested burn.
    #[error("insufficient {token} balance: have {have}, need {need}")]
    InsufficientBalance {
        token: String,
        have: TokenAmount,
        need: TokenAmount,
    },

    /// The ledger settled the burn with a non-success result code.
    #[error("burn of {amount} {token} rejected by ledger with {code} (tx {tx_hash})")]
    BurnRejected {
        token: String,
        amount: u64,
        tx_hash: String,
        code: String,
    },

    /// The issuer's account setup settled with a non-success result code.
    #[error("issuer setup rejected by ledger with {code} (tx {tx_hash})")]
    IssuerSetupRejected { tx_hash: String, code: String },

    /// Transaction hash of the wrong length or not hexadecimal.
    #[error("invalid transaction hash: {0:?}")]
    InvalidTransactionHash(String),

    /// Media selection over an empty catalog.
    #[error("catalog size must be at least 1")]
    InvalidCatalogSize,

    /// The burn transaction was found but is not part of a validated ledger.
    #[error("transaction {tx_hash} is not validated")]
    NotValidated { tx_hash: String },

    /// Transport or timeout failure from the external ledger.
    #[error("ledger unavailable during {operation}{}: {source}", tx_suffix(.tx_hash))]
    LedgerUnavailable {
        operation: &'static str,
        tx_hash: Option<String>,
        #[source]
        source: LedgerError,
    },

    /// Batch issuance finished with failures.
    #[error("issuance incomplete: {succeeded}/{attempted} token types issued")]
    PartialIssuanceFailure { succeeded: usize, attempted: usize },

    /// Catalog definition violates its invariants.
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    /// A ledger value string could not be parsed as a token amount.
    #[error("invalid token amount: {0:?}")]
    InvalidTokenAmount(String),
}

fn tx_suffix(tx_hash: &Option<String>) -> String {
    match tx_hash {
        Some(hash) => format!(" (tx {})", hash),
        None => String::new(),
    }
}

impl BurnProofError {
    /// Wrap a collaborator error with the operation it interrupted.
    pub fn ledger(operation: &'static str, tx_hash: Option<&str>, source: LedgerError) -> Self {
        BurnProofError::LedgerUnavailable {
            operation,
            tx_hash: tx_hash.map(str::to_string),
            source,
        }
    }

    /// The transaction hash involved in this failure, if one was already known.
    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            BurnProofError::BurnRejected { tx_hash, .. }
            | BurnProofError::IssuerSetupRejected { tx_hash, .. }
            | BurnProofError::NotValidated { tx_hash } => Some(tx_hash),
            BurnProofError::LedgerUnavailable { tx_hash, .. } => tx_hash.as_deref(),
            _ => None,
        }
    }
}
