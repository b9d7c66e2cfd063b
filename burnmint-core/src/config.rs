//! Pipeline configuration.
//!
//! Everything is read from `BURNMINT_*` variables. The recipient has its own
//! loader so the offline tools can resolve it without an issuer account.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::amount::TokenAmount;
use crate::burn::BurnCoordinator;
use crate::catalog::{AssetCatalog, CatalogMode};
use crate::issuance::{IssuanceOrchestrator, IssuanceReport, DEFAULT_TRUST_LIMIT};
use crate::ledger::LedgerClient;
use crate::proof::DEFAULT_RECIPIENT;
use crate::retry::RetryPolicy;

const RECIPIENT_VAR: &str = "BURNMINT_RECIPIENT";

/// Circuit-input recipient from `BURNMINT_RECIPIENT`, or the placeholder.
pub fn recipient_from_env() -> String {
    recipient_from_lookup(&|key: &str| env::var(key).ok())
}

pub fn recipient_from_lookup<F>(lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(RECIPIENT_VAR)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_RECIPIENT.to_string())
}

/// Pipeline configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Issuing account of every catalog token.
    pub issuer_address: String,
    /// Which built-in catalog to use.
    pub catalog_mode: CatalogMode,
    /// Trust-line limit requested per token.
    pub trust_limit: TokenAmount,
    /// Whole units issued per token during batch issuance.
    pub tokens_per_asset: u64,
    /// Delay between consecutive submissions.
    pub pacing_ms: u64,
    /// Attempts per submission, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: f64,
    /// Recipient placed in circuit inputs.
    pub recipient: String,
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let issuer_address = lookup("BURNMINT_ISSUER_ADDRESS")
            .filter(|s| !s.trim().is_empty())
            .context("BURNMINT_ISSUER_ADDRESS must be set")?;

        let catalog_mode: CatalogMode = parse_or(&lookup, "BURNMINT_CATALOG_MODE", CatalogMode::Multi)?;
        let trust_limit = parse_or(
            &lookup,
            "BURNMINT_TRUST_LIMIT",
            TokenAmount::from_units(DEFAULT_TRUST_LIMIT),
        )?;
        let tokens_per_asset: u64 = parse_or(&lookup, "BURNMINT_TOKENS_PER_ASSET", 1000)?;
        if tokens_per_asset == 0 {
            bail!("BURNMINT_TOKENS_PER_ASSET must be greater than zero");
        }

        let defaults = RetryPolicy::default();
        let pacing_ms = parse_or(&lookup, "BURNMINT_PACING_MS", millis(defaults.pacing))?;
        let max_attempts = parse_or(&lookup, "BURNMINT_MAX_ATTEMPTS", defaults.max_attempts)?;
        let base_delay_ms = parse_or(&lookup, "BURNMINT_BASE_DELAY_MS", millis(defaults.base_delay))?;
        let max_delay_ms = parse_or(&lookup, "BURNMINT_MAX_DELAY_MS", millis(defaults.max_delay))?;
        let jitter: f64 = parse_or(&lookup, "BURNMINT_JITTER", defaults.jitter)?;
        if !(0.0..=1.0).contains(&jitter) {
            bail!("BURNMINT_JITTER must be within [0, 1], got {}", jitter);
        }

        let recipient = recipient_from_lookup(&lookup);

        Ok(Self {
            issuer_address: issuer_address.trim().to_string(),
            catalog_mode,
            trust_limit,
            tokens_per_asset,
            pacing_ms,
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            jitter,
            recipient,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter,
            pacing: Duration::from_millis(self.pacing_ms),
        }
    }

    pub fn catalog(&self) -> &'static AssetCatalog {
        AssetCatalog::builtin(self.catalog_mode)
    }

    /// Orchestrator over the configured catalog, issuer, retry policy and
    /// trust limit.
    pub fn orchestrator<'a, L>(&'a self, ledger: &'a L) -> IssuanceOrchestrator<'a, L>
    where
        L: LedgerClient + ?Sized,
    {
        IssuanceOrchestrator::new(ledger, self.catalog(), &self.issuer_address, self.retry_policy())
            .with_trust_limit(self.trust_limit)
    }

    pub fn burn_coordinator<'a, L>(&'a self, ledger: &'a L) -> BurnCoordinator<'a, L>
    where
        L: LedgerClient + ?Sized,
    {
        BurnCoordinator::new(ledger, self.catalog(), &self.issuer_address)
    }

    /// Issue `tokens_per_asset` of every configured catalog token to `holder`.
    pub async fn issue_all<L>(&self, ledger: &L, holder: &str) -> IssuanceReport
    where
        L: LedgerClient + ?Sized,
    {
        self.orchestrator(ledger)
            .setup_and_issue(holder, self.tokens_per_asset)
            .await
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}={:?}: {}", key, raw, e)),
        _ => Ok(default),
    }
}
