//! Batch issuance across the whole catalog.
//!
//! For every token type, in catalog order: open the holder's trust line if it
//! is missing, then issue the configured amount. A failed token is recorded and
//! the loop moves on; the batch always attempts every token type.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::amount::TokenAmount;
use crate::catalog::{AssetCatalog, TokenType};
use crate::error::{BurnProofError, LedgerError, Result};
use crate::ledger::{
    AccountFlag, IssuedAmount, LedgerClient, LedgerTransaction, Memo, ResultCode, TrustLine,
};
use crate::retry::RetryPolicy;

/// Default trust-line limit requested for each token.
pub const DEFAULT_TRUST_LIMIT: u64 = 100_000;

/// Step of the per-token sequence that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuanceStage {
    TrustLine,
    Issue,
}

/// What happened to one token type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IssuanceOutcome {
    Issued {
        /// `None` when the holder already had a sufficient trust line.
        trust_line_hash: Option<String>,
        transaction_hash: String,
        amount: u64,
    },
    Failed {
        stage: IssuanceStage,
        error_code: String,
        transaction_hash: Option<String>,
    },
}

/// Per-token entry in an [`IssuanceReport`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenIssuance {
    pub token: String,
    pub media_format: String,
    /// Submissions made for this token, across both stages.
    pub attempts: u32,
    pub outcome: IssuanceOutcome,
}

impl TokenIssuance {
    pub fn success(&self) -> bool {
        matches!(self.outcome, IssuanceOutcome::Issued { .. })
    }

    pub fn transaction_hash(&self) -> Option<&str> {
        match &self.outcome {
            IssuanceOutcome::Issued {
                transaction_hash, ..
            } => Some(transaction_hash),
            IssuanceOutcome::Failed {
                transaction_hash, ..
            } => transaction_hash.as_deref(),
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        match &self.outcome {
            IssuanceOutcome::Issued { .. } => None,
            IssuanceOutcome::Failed { error_code, .. } => Some(error_code),
        }
    }
}

/// Ordered record of a batch run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceReport {
    results: Vec<TokenIssuance>,
    success_count: usize,
    total_attempted: usize,
    total_issued: u64,
}

impl IssuanceReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token's result. A token already in the report is ignored.
    pub fn record(&mut self, entry: TokenIssuance) -> bool {
        if self.results.iter().any(|r| r.token == entry.token) {
            warn!(token = %entry.token, "token already recorded in issuance report");
            return false;
        }
        self.total_attempted += 1;
        if let IssuanceOutcome::Issued { amount, .. } = entry.outcome {
            self.success_count += 1;
            self.total_issued = self.total_issued.saturating_add(amount);
        }
        self.results.push(entry);
        true
    }

    pub fn results(&self) -> &[TokenIssuance] {
        &self.results
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn total_attempted(&self) -> usize {
        self.total_attempted
    }

    /// Whole units issued by successful entries.
    pub fn total_issued(&self) -> u64 {
        self.total_issued
    }

    pub fn failures(&self) -> impl Iterator<Item = &TokenIssuance> {
        self.results.iter().filter(|r| !r.success())
    }

    /// Whether every catalog token type was issued.
    pub fn is_complete(&self, catalog_size: usize) -> bool {
        self.success_count == catalog_size && self.total_attempted == catalog_size
    }

    /// Turn a partial report into [`BurnProofError::PartialIssuanceFailure`].
    pub fn into_result(self, catalog_size: usize) -> Result<Self> {
        if self.is_complete(catalog_size) {
            Ok(self)
        } else {
            Err(BurnProofError::PartialIssuanceFailure {
                succeeded: self.success_count,
                attempted: self.total_attempted,
            })
        }
    }
}

/// Result of one submission after retries.
struct Submission {
    hash: String,
    attempts: u32,
}

/// Terminal submission failure.
enum SubmissionFailure {
    /// Settled, or refused, with a non-success code.
    Rejected {
        code: String,
        hash: Option<String>,
        attempts: u32,
    },
    /// The ledger could not be reached, or the outcome could not be confirmed.
    Unavailable {
        source: LedgerError,
        hash: Option<String>,
        attempts: u32,
    },
}

impl SubmissionFailure {
    fn code(&self) -> String {
        match self {
            SubmissionFailure::Rejected { code, .. } => code.clone(),
            SubmissionFailure::Unavailable { source, .. } => format!("ledger: {}", source),
        }
    }

    fn hash(&self) -> Option<String> {
        match self {
            SubmissionFailure::Rejected { hash, .. } | SubmissionFailure::Unavailable { hash, .. } => {
                hash.clone()
            }
        }
    }

    fn attempts(&self) -> u32 {
        match self {
            SubmissionFailure::Rejected { attempts, .. }
            | SubmissionFailure::Unavailable { attempts, .. } => *attempts,
        }
    }
}

/// Drives trust-line setup and issuance for every catalog token.
pub struct IssuanceOrchestrator<'a, L: LedgerClient + ?Sized> {
    ledger: &'a L,
    catalog: &'a AssetCatalog,
    issuer: &'a str,
    policy: RetryPolicy,
    trust_limit: TokenAmount,
}

impl<'a, L: LedgerClient + ?Sized> IssuanceOrchestrator<'a, L> {
    pub fn new(
        ledger: &'a L,
        catalog: &'a AssetCatalog,
        issuer: &'a str,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            ledger,
            catalog,
            issuer,
            policy,
            trust_limit: TokenAmount::from_units(DEFAULT_TRUST_LIMIT),
        }
    }

    pub fn with_trust_limit(mut self, limit: TokenAmount) -> Self {
        self.trust_limit = limit;
        self
    }

    /// Enable rippling on the issuer account. Needed once before first issuance.
    pub async fn configure_issuer(&self) -> Result<String> {
        let memo = Memo::new(
            "multi_token_setup",
            &format!("Token issuer setup - {} assets", self.catalog.len()),
            None,
        );
        let tx = LedgerTransaction::account_set(self.issuer, AccountFlag::DefaultRipple, memo);
        match self.submit_with_retry(&tx).await {
            Ok(sub) => {
                info!(issuer = self.issuer, tx_hash = %sub.hash, "issuer configured");
                Ok(sub.hash)
            }
            Err(SubmissionFailure::Rejected { code, hash, .. }) => {
                Err(BurnProofError::IssuerSetupRejected {
                    tx_hash: hash.unwrap_or_default(),
                    code,
                })
            }
            Err(SubmissionFailure::Unavailable { source, hash, .. }) => {
                Err(BurnProofError::LedgerUnavailable {
                    operation: "configure_issuer",
                    tx_hash: hash,
                    source,
                })
            }
        }
    }

    /// Open trust lines and issue `per_token_amount` of every catalog token to
    /// `holder`. Always returns the full report; see
    /// [`IssuanceReport::into_result`] for an error view.
    pub async fn setup_and_issue(&self, holder: &str, per_token_amount: u64) -> IssuanceReport {
        let total = self.catalog.len();
        info!(holder, total, per_token_amount, "starting batch issuance");

        let mut report = IssuanceReport::new();
        let mut first_submission = true;

        for (i, token) in self.catalog.all().iter().enumerate() {
            debug!(token = %token.symbol, "{}/{}", i + 1, total);
            let entry = self
                .issue_one(holder, token, per_token_amount, &mut first_submission)
                .await;
            match &entry.outcome {
                IssuanceOutcome::Issued {
                    transaction_hash, ..
                } => info!(token = %token.symbol, tx_hash = %transaction_hash, "issued"),
                IssuanceOutcome::Failed {
                    stage, error_code, ..
                } => warn!(token = %token.symbol, ?stage, error_code = %error_code, "issuance failed"),
            }
            report.record(entry);
        }

        info!(
            success = report.success_count(),
            attempted = report.total_attempted(),
            total_issued = report.total_issued(),
            "batch issuance finished"
        );
        report
    }

    async fn issue_one(
        &self,
        holder: &str,
        token: &TokenType,
        amount: u64,
        first_submission: &mut bool,
    ) -> TokenIssuance {
        let mut attempts = 0;
        let failed = |stage, code: String, hash: Option<String>, attempts| TokenIssuance {
            token: token.symbol.clone(),
            media_format: token.media_format.clone(),
            attempts,
            outcome: IssuanceOutcome::Failed {
                stage,
                error_code: code,
                transaction_hash: hash,
            },
        };

        let value = match TokenAmount::checked_from_units(amount) {
            Some(value) if !value.is_zero() => value,
            _ => return failed(IssuanceStage::Issue, "invalid_amount".into(), None, 0),
        };

        let trust_line_hash = match self.needs_trust_line(holder, &token.symbol).await {
            Err(e) => {
                return failed(IssuanceStage::TrustLine, format!("ledger: {}", e), None, 0);
            }
            Ok(false) => None,
            Ok(true) => {
                self.pace(first_submission).await;
                let tx = LedgerTransaction::trust_set(
                    holder,
                    self.issued(&token.symbol, self.trust_limit),
                    Memo::new(
                        "multi_trust_line",
                        &format!("{} Trust - {}", token.symbol, token.media_format),
                        Some(&token.media_format),
                    ),
                );
                match self.submit_with_retry(&tx).await {
                    Ok(sub) => {
                        attempts += sub.attempts;
                        Some(sub.hash)
                    }
                    Err(fail) => {
                        return failed(
                            IssuanceStage::TrustLine,
                            fail.code(),
                            fail.hash(),
                            attempts + fail.attempts(),
                        );
                    }
                }
            }
        };

        self.pace(first_submission).await;
        let tx = LedgerTransaction::issue(
            holder,
            self.issued(&token.symbol, value),
            Memo::new(
                "multi_token_issuance",
                &format!("{} Issuance - {} Asset", token.symbol, token.media_format),
                Some(&token.media_format),
            ),
        );
        match self.submit_with_retry(&tx).await {
            Ok(sub) => TokenIssuance {
                token: token.symbol.clone(),
                media_format: token.media_format.clone(),
                attempts: attempts + sub.attempts,
                outcome: IssuanceOutcome::Issued {
                    trust_line_hash,
                    transaction_hash: sub.hash,
                    amount,
                },
            },
            Err(fail) => failed(
                IssuanceStage::Issue,
                fail.code(),
                fail.hash(),
                attempts + fail.attempts(),
            ),
        }
    }

    async fn needs_trust_line(&self, holder: &str, symbol: &str) -> std::result::Result<bool, LedgerError> {
        let lines: Vec<TrustLine> = self.ledger.get_trust_lines(holder).await?;
        let sufficient = lines
            .iter()
            .any(|l| l.currency == symbol && l.issuer == self.issuer && l.limit >= self.trust_limit);
        Ok(!sufficient)
    }

    fn issued(&self, symbol: &str, value: TokenAmount) -> IssuedAmount {
        IssuedAmount {
            currency: symbol.to_string(),
            issuer: self.issuer.to_string(),
            value,
        }
    }

    async fn pace(&self, first_submission: &mut bool) {
        if *first_submission {
            *first_submission = false;
            return;
        }
        if !self.policy.pacing.is_zero() {
            tokio::time::sleep(self.policy.pacing).await;
        }
    }

    /// Sign once, then submit until settled, retryable failures exhausted, or
    /// a terminal code. A transport failure is never followed by a blind
    /// re-submit: the prepared hash is looked up first.
    async fn submit_with_retry(
        &self,
        tx: &LedgerTransaction,
    ) -> std::result::Result<Submission, SubmissionFailure> {
        let signed = self
            .ledger
            .prepare(tx)
            .await
            .map_err(|source| SubmissionFailure::Unavailable {
                source,
                hash: None,
                attempts: 0,
            })?;

        let max = self.policy.attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            if attempt > 1 {
                let delay = self.policy.backoff(attempt - 1);
                debug!(tx_hash = %signed.hash, attempt, ?delay, "retrying submission");
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            let failure = match self.ledger.submit(&signed).await {
                Ok(outcome) if outcome.result_code.is_success() => {
                    return Ok(Submission {
                        hash: outcome.hash,
                        attempts: attempt,
                    });
                }
                Ok(outcome) => {
                    let retryable = outcome.result_code.is_retryable();
                    let failure = SubmissionFailure::Rejected {
                        code: outcome.result_code.0,
                        hash: Some(outcome.hash),
                        attempts: attempt,
                    };
                    if !retryable {
                        return Err(failure);
                    }
                    failure
                }
                Err(source) => {
                    warn!(tx_hash = %signed.hash, attempt, error = %source, "submission failed in transit");
                    match self.confirm(&signed.hash).await {
                        Confirmation::Settled(code) if code.is_success() => {
                            return Ok(Submission {
                                hash: signed.hash,
                                attempts: attempt,
                            });
                        }
                        Confirmation::Settled(code) => {
                            return Err(SubmissionFailure::Rejected {
                                code: code.0,
                                hash: Some(signed.hash),
                                attempts: attempt,
                            });
                        }
                        Confirmation::Absent => SubmissionFailure::Unavailable {
                            source,
                            hash: Some(signed.hash.clone()),
                            attempts: attempt,
                        },
                        // Outcome unknown; submitting again could apply it twice.
                        Confirmation::Unknown => {
                            return Err(SubmissionFailure::Unavailable {
                                source,
                                hash: Some(signed.hash),
                                attempts: attempt,
                            });
                        }
                    }
                }
            };

            if attempt >= max {
                return Err(failure);
            }
        }
    }

    async fn confirm(&self, hash: &str) -> Confirmation {
        match self.ledger.get_transaction(hash).await {
            Ok(record) if record.validated => match record.result_code {
                Some(code) => Confirmation::Settled(code),
                None => Confirmation::Unknown,
            },
            // Seen but not yet in a validated ledger: may still settle.
            Ok(_) => Confirmation::Unknown,
            Err(LedgerError::NotFound(_)) => Confirmation::Absent,
            Err(_) => Confirmation::Unknown,
        }
    }
}

enum Confirmation {
    Settled(ResultCode),
    Absent,
    Unknown,
}
