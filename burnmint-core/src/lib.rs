//! burnmint-core
//!
//! Burn-to-proof pipeline for issued ledger tokens: a holder burns one of N
//! catalog tokens, the burn's transaction hash deterministically selects one of
//! the media assets, and the result is committed into a proof object consumed
//! by an external zero-knowledge verification circuit.
//!
//! # Architecture
//!
//! - [`catalog`]: the fixed registry of token types and their media formats.
//! - [`selector`]: `mediaId = (last 8 hex chars of hash mod N) + 1`.
//! - [`proof`]: proof assembly and the SHA-256 commitment over a fixed-order
//!   JSON preimage.
//! - [`burn`]: precondition checks, the return-to-issuer payment, and fact
//!   retrieval for a single burn.
//! - [`issuance`]: trust-line setup and initial issuance across the whole
//!   catalog, with per-token retry and partial-failure accounting.
//!
//! # Ledger access
//!
//! All ledger I/O goes through the [`LedgerClient`] trait. The pipeline borrows
//! a client per operation; connection management, autofill and signing live
//! behind the trait.
//!
//! # Commitment
//!
//! `proofHash = sha256(json({xrplTxHash, burnAmount, burnerAddress, currency,
//! issuer, ledgerIndex, timestamp}))`, lowercase hex. `mediaId` is not part of
//! the preimage: it is a pure function of `xrplTxHash`, which is.

pub mod amount;
pub mod burn;
pub mod catalog;
pub mod config;
pub mod error;
pub mod issuance;
pub mod ledger;
pub mod proof;
pub mod retry;
pub mod selector;

pub use amount::{TokenAmount, MAX_UNITS, TOKEN_DECIMALS};
pub use burn::{BurnCoordinator, BurnResult};
pub use catalog::{
    asset_class, AssetCatalog, AssetClass, CatalogEntry, CatalogMode, TokenType, MEDIA_POOL,
    SINGLE_ASSET_SYMBOL,
};
pub use config::PipelineConfig;
pub use error::{BurnProofError, LedgerError, Result};
pub use issuance::{
    IssuanceOrchestrator, IssuanceOutcome, IssuanceReport, IssuanceStage, TokenIssuance,
    DEFAULT_TRUST_LIMIT,
};
pub use ledger::{
    fetch_balance, AccountFlag, Balance, IssuedAmount, LedgerClient, LedgerHeader,
    LedgerTransaction, Memo, ResultCode, SignedTransaction, SubmitOutcome, TransactionKind,
    TransactionRecord, TrustLine, SUCCESS_CODE, TX_HASH_HEX_LEN,
};
pub use proof::{
    commitment_hash, BurnProof, BurnTransaction, CircuitInputs, LedgerFacts, LedgerProof,
    ProofAssembler, TransactionDetails, DEFAULT_RECIPIENT,
};
pub use retry::RetryPolicy;
pub use selector::select;
