use std::{fmt, fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use burnmint_core::{
    asset_class, config, select, AssetCatalog, AssetClass, BurnProof, CatalogMode,
    CircuitInputs, DEFAULT_RECIPIENT, MEDIA_POOL,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info, warn};

const DEFAULT_CATALOG_SIZE: u32 = MEDIA_POOL.len() as u32;

#[derive(Parser)]
#[command(
    name = "burnmint-tools",
    about = "Audit commands for token burn proofs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the media selection for a transaction hash.
    MediaId(MediaIdArgs),
    /// Recompute a stored proof's commitment and media selection.
    VerifyProof(VerifyArgs),
    /// List the built-in token catalog.
    Catalog(CatalogArgs),
    /// Print the circuit input record for a stored proof.
    CircuitInputs(CircuitInputsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// One token (LAY) over the media pool.
    Single,
    /// One token per media asset.
    Multi,
}

impl From<ModeArg> for CatalogMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Single => CatalogMode::Single,
            ModeArg::Multi => CatalogMode::Multi,
        }
    }
}

#[derive(Args)]
struct MediaIdArgs {
    /// Burn transaction hash (hex).
    #[arg(long)]
    tx_hash: String,
    #[arg(long, default_value_t = DEFAULT_CATALOG_SIZE)]
    catalog_size: u32,
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct VerifyArgs {
    /// Proof JSON file.
    #[arg(long)]
    proof: PathBuf,
    #[arg(long, default_value_t = DEFAULT_CATALOG_SIZE)]
    catalog_size: u32,
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CatalogArgs {
    #[arg(long, value_enum, default_value_t = ModeArg::Multi)]
    mode: ModeArg,
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CircuitInputsArgs {
    /// Proof JSON file.
    #[arg(long)]
    proof: PathBuf,
    /// Recipient key on the verification chain. Falls back to
    /// BURNMINT_RECIPIENT, then to the placeholder.
    #[arg(long)]
    recipient: Option<String>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "burnmint_tools=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::MediaId(args) => media_id(args),
        Commands::VerifyProof(args) => verify_proof(args),
        Commands::Catalog(args) => catalog(args),
        Commands::CircuitInputs(args) => circuit_inputs(args),
    }
}

fn media_id(args: MediaIdArgs) -> Result<()> {
    let summary = selection_summary(&args.tx_hash, args.catalog_size)?;
    output_summary(&summary, args.json)
}

fn verify_proof(args: VerifyArgs) -> Result<()> {
    let proof = load_proof(&args.proof)?;
    let report = verify(&proof, args.catalog_size)?;
    output_summary(&report, args.json)?;
    if !report.passed() {
        warn!(proof = %args.proof.display(), "proof failed verification");
        bail!("proof {} failed verification", args.proof.display());
    }
    info!(proof = %args.proof.display(), "proof verified");
    Ok(())
}

fn catalog(args: CatalogArgs) -> Result<()> {
    let summary = catalog_summary(AssetCatalog::builtin(args.mode.into()));
    output_summary(&summary, args.json)
}

fn circuit_inputs(args: CircuitInputsArgs) -> Result<()> {
    let proof = load_proof(&args.proof)?;
    let recipient = args.recipient.unwrap_or_else(config::recipient_from_env);
    if recipient == DEFAULT_RECIPIENT {
        warn!("recipient is the placeholder; pass --recipient for a real mint");
    }
    let inputs: CircuitInputs = proof.circuit_inputs(&recipient);
    println!("{}", serde_json::to_string_pretty(&inputs)?);
    Ok(())
}

fn load_proof(path: &PathBuf) -> Result<BurnProof> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let proof = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse proof {}", path.display()))?;
    debug!(path = %path.display(), "loaded proof");
    Ok(proof)
}

fn output_summary<T>(summary: &T, json: bool) -> Result<()>
where
    T: Serialize + fmt::Display,
{
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        print!("{}", summary);
    }
    Ok(())
}

fn selection_summary(tx_hash: &str, catalog_size: u32) -> Result<SelectionSummary> {
    let media_id = select(tx_hash, catalog_size)
        .with_context(|| format!("cannot select media for {:?}", tx_hash))?;
    let media_format = (catalog_size as usize == MEDIA_POOL.len())
        .then(|| MEDIA_POOL[media_id as usize - 1].1.to_string());
    Ok(SelectionSummary {
        tx_hash: tx_hash.to_string(),
        catalog_size,
        media_id,
        media_format,
    })
}

fn verify(proof: &BurnProof, catalog_size: u32) -> Result<VerifyReport> {
    let recomputed_hash = proof.recompute_hash();
    let expected_media_id = select(&proof.xrpl_tx_hash, catalog_size)
        .with_context(|| format!("proof carries an unusable hash {:?}", proof.xrpl_tx_hash))?;
    Ok(VerifyReport {
        tx_hash: proof.xrpl_tx_hash.clone(),
        proof_hash: proof.proof_hash.clone(),
        commitment_ok: recomputed_hash == proof.proof_hash,
        recomputed_hash,
        media_id: proof.media_id,
        selection_ok: expected_media_id == proof.media_id,
        expected_media_id,
        settled_ok: proof.validated && proof.transaction_result.is_success(),
    })
}

fn catalog_summary(catalog: &AssetCatalog) -> CatalogSummary {
    CatalogSummary {
        mode: catalog.mode().to_string(),
        selection_size: catalog.selection_size(),
        tokens: catalog
            .all()
            .iter()
            .map(|t| CatalogRow {
                index: t.catalog_index,
                symbol: t.symbol.clone(),
                media_format: t.media_format.clone(),
                asset_class: asset_class(&t.media_format),
            })
            .collect(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SelectionSummary {
    tx_hash: String,
    catalog_size: u32,
    media_id: u32,
    /// Only known when selecting over the media pool.
    #[serde(skip_serializing_if = "Option::is_none")]
    media_format: Option<String>,
}

impl fmt::Display for SelectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tx_hash: {}", self.tx_hash)?;
        writeln!(f, "catalog_size: {}", self.catalog_size)?;
        writeln!(f, "media_id: {}", self.media_id)?;
        if let Some(format) = &self.media_format {
            writeln!(f, "media_format: {}", format)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyReport {
    tx_hash: String,
    proof_hash: String,
    recomputed_hash: String,
    commitment_ok: bool,
    media_id: u32,
    expected_media_id: u32,
    selection_ok: bool,
    settled_ok: bool,
}

impl VerifyReport {
    fn passed(&self) -> bool {
        self.commitment_ok && self.selection_ok && self.settled_ok
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tx_hash: {}", self.tx_hash)?;
        writeln!(f, "proof_hash: {}", self.proof_hash)?;
        writeln!(f, "recomputed: {}", self.recomputed_hash)?;
        writeln!(f, "commitment: {}", verdict(self.commitment_ok))?;
        writeln!(
            f,
            "media_id: {} (expected {}) {}",
            self.media_id,
            self.expected_media_id,
            verdict(self.selection_ok)
        )?;
        writeln!(f, "settlement: {}", verdict(self.settled_ok))
    }
}

fn verdict(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "MISMATCH"
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogSummary {
    mode: String,
    selection_size: u32,
    tokens: Vec<CatalogRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogRow {
    index: u32,
    symbol: String,
    media_format: String,
    asset_class: AssetClass,
}

impl fmt::Display for CatalogSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "mode: {} ({} tokens, selecting over {})",
            self.mode,
            self.tokens.len(),
            self.selection_size
        )?;
        for row in &self.tokens {
            writeln!(
                f,
                "  {:>2}  {:<4}  {:<12}  {}",
                row.index, row.symbol, row.media_format, row.asset_class
            )?;
        }
        Ok(())
    }
}
