//! In-memory ledger and sample artifacts shared by the burnmint test suites.
//!
//! [`MockLedger`] keeps trust lines, sequences and closed ledgers in memory and
//! applies issued-currency payments the way the real ledger does for the cases
//! the pipeline touches: issuing requires a trust line, burning requires funds.
//! Failures are injected per currency or per call.

use std::collections::HashMap;

use async_trait::async_trait;
use burnmint_core::{
    BurnProof, BurnTransaction, IssuedAmount, LedgerClient, LedgerError, LedgerFacts,
    LedgerHeader, LedgerTransaction, Memo, ProofAssembler, ResultCode, SignedTransaction,
    SubmitOutcome, TokenAmount, TransactionKind, TransactionRecord, TrustLine,
};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

pub const ISSUER: &str = "rN7n7otQDd6FczFgLdSqtcsAUxDkw6fzRH";
pub const HOLDER: &str = "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe";

/// Index of the last closed ledger before any test submission.
pub const GENESIS_LEDGER_INDEX: u32 = 4_200_000;

/// Ledger-epoch close time of [`GENESIS_LEDGER_INDEX`].
pub const GENESIS_CLOSE_TIME: u64 = 780_000_000;

/// Fixed timestamp for deterministic proof fixtures.
pub const SAMPLE_TIMESTAMP: u64 = 1_700_000_000;

/// Hash of the transaction in [`sample_proof`].
pub const SAMPLE_TX_HASH: &str =
    "6A3C5F2E9B1D4C7A8E0F1B2C3D4E5F60718293A4B5C6D7E8F90A1B2C34567890";

#[derive(Default)]
struct State {
    lines: HashMap<String, Vec<TrustLine>>,
    sequences: HashMap<String, u32>,
    ledger_index: u32,
    ledgers: HashMap<u32, LedgerHeader>,
    prepared: HashMap<String, LedgerTransaction>,
    records: HashMap<String, TransactionRecord>,
    submissions: Vec<String>,
    default_ripple: bool,

    rejected: HashMap<String, String>,
    rejected_trust: HashMap<String, String>,
    transient: HashMap<String, (String, u32)>,
    dropped_submissions: u32,
    apply_dropped: bool,
    ledger_lookups_fail: bool,
    trust_queries_fail: bool,
    unvalidated: bool,
}

/// In-memory [`LedgerClient`].
pub struct MockLedger {
    issuer: String,
    state: Mutex<State>,
}

impl MockLedger {
    pub fn new(issuer: &str) -> Self {
        let mut state = State {
            ledger_index: GENESIS_LEDGER_INDEX,
            ..State::default()
        };
        state
            .ledgers
            .insert(GENESIS_LEDGER_INDEX, header(GENESIS_LEDGER_INDEX, String::new()));
        Self {
            issuer: issuer.to_string(),
            state: Mutex::new(state),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Open a trust line for `holder` with `units` already on it.
    pub async fn fund(&self, holder: &str, currency: &str, units: u64) {
        let mut state = self.state.lock().await;
        let line = line_mut(&mut state, holder, currency, &self.issuer);
        line.balance = TokenAmount::from_units(units);
        if line.limit < line.balance {
            line.limit = line.balance;
        }
    }

    /// Open an empty trust line with the given limit.
    pub async fn open_trust_line(&self, holder: &str, currency: &str, limit_units: u64) {
        let mut state = self.state.lock().await;
        line_mut(&mut state, holder, currency, &self.issuer).limit =
            TokenAmount::from_units(limit_units);
    }

    /// Settle every payment or trust line in `currency` with `code`.
    pub async fn reject_currency(&self, currency: &str, code: &str) {
        let mut state = self.state.lock().await;
        state.rejected.insert(currency.to_string(), code.to_string());
    }

    /// Settle trust-line requests for `currency` with `code`.
    pub async fn reject_trust_set(&self, currency: &str, code: &str) {
        let mut state = self.state.lock().await;
        state
            .rejected_trust
            .insert(currency.to_string(), code.to_string());
    }

    /// Answer the next `times` submissions in `currency` with a retryable code.
    pub async fn fail_transiently(&self, currency: &str, code: &str, times: u32) {
        let mut state = self.state.lock().await;
        state
            .transient
            .insert(currency.to_string(), (code.to_string(), times));
    }

    /// Lose the response of the next `times` submissions. With `applied` the
    /// transaction still reaches the ledger before the response is lost.
    pub async fn drop_submissions(&self, times: u32, applied: bool) {
        let mut state = self.state.lock().await;
        state.dropped_submissions = times;
        state.apply_dropped = applied;
    }

    pub async fn fail_ledger_lookups(&self) {
        self.state.lock().await.ledger_lookups_fail = true;
    }

    pub async fn fail_trust_line_queries(&self) {
        self.state.lock().await.trust_queries_fail = true;
    }

    /// Report settled transactions as not yet validated.
    pub async fn leave_unvalidated(&self) {
        self.state.lock().await.unvalidated = true;
    }

    pub async fn balance(&self, holder: &str, currency: &str) -> TokenAmount {
        let state = self.state.lock().await;
        find_line(&state, holder, currency, &self.issuer)
            .map(|l| l.balance)
            .unwrap_or_default()
    }

    pub async fn trust_limit(&self, holder: &str, currency: &str) -> Option<TokenAmount> {
        let state = self.state.lock().await;
        find_line(&state, holder, currency, &self.issuer).map(|l| l.limit)
    }

    /// Number of `submit` calls, including failed and repeated ones.
    pub async fn submission_count(&self) -> usize {
        self.state.lock().await.submissions.len()
    }

    /// Transactions passed to `submit`, in order.
    pub async fn submitted(&self) -> Vec<LedgerTransaction> {
        let state = self.state.lock().await;
        state
            .submissions
            .iter()
            .filter_map(|h| state.prepared.get(h).cloned())
            .collect()
    }

    /// Transactions that reached a closed ledger, successful or not.
    pub async fn applied_count(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn default_ripple(&self) -> bool {
        self.state.lock().await.default_ripple
    }

    pub async fn current_ledger_index(&self) -> u32 {
        self.state.lock().await.ledger_index
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn prepare(&self, tx: &LedgerTransaction) -> Result<SignedTransaction, LedgerError> {
        let blob = serde_json::to_string(tx).map_err(|e| LedgerError::Malformed(e.to_string()))?;
        let mut state = self.state.lock().await;
        let sequence = state.sequences.entry(tx.account.clone()).or_insert(0);
        *sequence += 1;
        let hash = digest(&format!("{}:{}:{}", tx.account, sequence, blob));
        state.prepared.insert(hash.clone(), tx.clone());
        Ok(SignedTransaction {
            hash,
            blob: hex::encode_upper(blob),
        })
    }

    async fn submit(&self, signed: &SignedTransaction) -> Result<SubmitOutcome, LedgerError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.submissions.push(signed.hash.clone());
        let tx = state
            .prepared
            .get(&signed.hash)
            .cloned()
            .ok_or_else(|| LedgerError::Malformed(format!("unknown blob {}", signed.hash)))?;

        if let Some(record) = state.records.get(&signed.hash) {
            return Ok(SubmitOutcome {
                hash: signed.hash.clone(),
                result_code: ResultCode("tefPAST_SEQ".into()),
                ledger_index: record.ledger_index.unwrap_or(state.ledger_index),
            });
        }

        if state.dropped_submissions > 0 {
            state.dropped_submissions -= 1;
            if state.apply_dropped {
                apply(state, &signed.hash, &tx);
            }
            return Err(LedgerError::Transport("connection reset".into()));
        }

        if let Some(currency) = tx.currency() {
            if let Some((code, remaining)) = state.transient.get_mut(currency) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Ok(SubmitOutcome {
                        hash: signed.hash.clone(),
                        result_code: ResultCode(code.clone()),
                        ledger_index: state.ledger_index,
                    });
                }
            }
        }

        let result_code = apply(state, &signed.hash, &tx);
        Ok(SubmitOutcome {
            hash: signed.hash.clone(),
            result_code,
            ledger_index: state.ledger_index,
        })
    }

    async fn get_transaction(&self, hash: &str) -> Result<TransactionRecord, LedgerError> {
        let state = self.state.lock().await;
        state
            .records
            .get(hash)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("txn {}", hash)))
    }

    async fn get_ledger(&self, index: u32) -> Result<LedgerHeader, LedgerError> {
        let state = self.state.lock().await;
        if state.ledger_lookups_fail {
            return Err(LedgerError::Timeout(format!("ledger {}", index)));
        }
        state
            .ledgers
            .get(&index)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("ledger {}", index)))
    }

    async fn get_trust_lines(&self, address: &str) -> Result<Vec<TrustLine>, LedgerError> {
        let state = self.state.lock().await;
        if state.trust_queries_fail {
            return Err(LedgerError::Transport("account_lines unavailable".into()));
        }
        Ok(state.lines.get(address).cloned().unwrap_or_default())
    }
}

fn apply(state: &mut State, hash: &str, tx: &LedgerTransaction) -> ResultCode {
    let code = match &tx.kind {
        TransactionKind::Payment {
            destination,
            amount,
        } => {
            if let Some(code) = state.rejected.get(&amount.currency) {
                ResultCode(code.clone())
            } else if tx.account == amount.issuer {
                credit(state, destination, amount)
            } else if *destination == amount.issuer {
                debit(state, &tx.account, amount)
            } else {
                ResultCode("temREDUNDANT".into())
            }
        }
        TransactionKind::TrustSet { limit_amount } => {
            let currency = &limit_amount.currency;
            if let Some(code) = state
                .rejected_trust
                .get(currency)
                .or_else(|| state.rejected.get(currency))
            {
                ResultCode(code.clone())
            } else {
                line_mut(state, &tx.account, currency, &limit_amount.issuer).limit =
                    limit_amount.value;
                ResultCode::success()
            }
        }
        TransactionKind::AccountSet { .. } => {
            state.default_ripple = true;
            ResultCode::success()
        }
    };

    let parent = state
        .ledgers
        .get(&state.ledger_index)
        .map(|h| h.ledger_hash.clone())
        .unwrap_or_default();
    state.ledger_index += 1;
    let index = state.ledger_index;
    state.ledgers.insert(index, header(index, parent));

    let sequence = state.sequences.get(&tx.account).copied().unwrap_or(1);
    let destination = match &tx.kind {
        TransactionKind::Payment { destination, .. } => Some(destination.clone()),
        _ => None,
    };
    state.records.insert(
        hash.to_string(),
        TransactionRecord {
            hash: hash.to_string(),
            account: tx.account.clone(),
            destination,
            fee: "12".to_string(),
            sequence,
            memos: tx.memos.clone(),
            validated: !state.unvalidated,
            ledger_index: Some(index),
            result_code: Some(code.clone()),
        },
    );
    code
}

fn credit(state: &mut State, holder: &str, amount: &IssuedAmount) -> ResultCode {
    let Some(line) = state
        .lines
        .get_mut(holder)
        .and_then(|lines| lines.iter_mut().find(|l| l.currency == amount.currency && l.issuer == amount.issuer))
    else {
        return ResultCode("tecPATH_DRY".into());
    };
    match line.balance.checked_add(amount.value) {
        Some(total) if total <= line.limit => {
            line.balance = total;
            ResultCode::success()
        }
        _ => ResultCode("tecPATH_PARTIAL".into()),
    }
}

fn debit(state: &mut State, holder: &str, amount: &IssuedAmount) -> ResultCode {
    let line = state
        .lines
        .get_mut(holder)
        .and_then(|lines| lines.iter_mut().find(|l| l.currency == amount.currency && l.issuer == amount.issuer));
    match line {
        Some(line) => match line.balance.checked_sub(amount.value) {
            Some(rest) => {
                line.balance = rest;
                ResultCode::success()
            }
            None => ResultCode("tecPATH_PARTIAL".into()),
        },
        None => ResultCode("tecPATH_DRY".into()),
    }
}

fn find_line<'s>(state: &'s State, holder: &str, currency: &str, issuer: &str) -> Option<&'s TrustLine> {
    state
        .lines
        .get(holder)?
        .iter()
        .find(|l| l.currency == currency && l.issuer == issuer)
}

fn line_mut<'s>(state: &'s mut State, holder: &str, currency: &str, issuer: &str) -> &'s mut TrustLine {
    let lines = state.lines.entry(holder.to_string()).or_default();
    let pos = match lines
        .iter()
        .position(|l| l.currency == currency && l.issuer == issuer)
    {
        Some(pos) => pos,
        None => {
            lines.push(TrustLine {
                currency: currency.to_string(),
                issuer: issuer.to_string(),
                balance: TokenAmount::ZERO,
                limit: TokenAmount::ZERO,
            });
            lines.len() - 1
        }
    };
    &mut lines[pos]
}

fn header(index: u32, parent_hash: String) -> LedgerHeader {
    LedgerHeader {
        ledger_index: index,
        ledger_hash: digest(&format!("ledger:{}", index)),
        close_time: GENESIS_CLOSE_TIME + u64::from(index - GENESIS_LEDGER_INDEX) * 4,
        parent_hash,
        total_coins: "99999999999999990".to_string(),
    }
}

/// Deterministic 64-character uppercase hex digest.
pub fn digest(input: &str) -> String {
    hex::encode_upper(Sha256::digest(input.as_bytes()))
}

/// A settled burn of 100 LYC with its ledger facts.
pub fn sample_burn() -> (BurnTransaction, LedgerFacts) {
    let tx = BurnTransaction {
        hash: SAMPLE_TX_HASH.to_string(),
        token: "LYC".to_string(),
        amount: 100,
        burner_address: HOLDER.to_string(),
        issuer_address: ISSUER.to_string(),
        ledger_index: GENESIS_LEDGER_INDEX + 1,
        result_code: ResultCode::success(),
    };
    let facts = LedgerFacts {
        transaction: TransactionRecord {
            hash: SAMPLE_TX_HASH.to_string(),
            account: HOLDER.to_string(),
            destination: Some(ISSUER.to_string()),
            fee: "12".to_string(),
            sequence: 7,
            memos: vec![Memo::new(
                "multi_token_burn",
                "LYC Burn - 100 tokens for NFT mint",
                Some("video/mp4"),
            )],
            validated: true,
            ledger_index: Some(GENESIS_LEDGER_INDEX + 1),
            result_code: Some(ResultCode::success()),
        },
        ledger: header(
            GENESIS_LEDGER_INDEX + 1,
            digest(&format!("ledger:{}", GENESIS_LEDGER_INDEX)),
        ),
    };
    (tx, facts)
}

/// Proof of [`sample_burn`], selected over the 25-entry media pool.
pub fn sample_proof() -> BurnProof {
    let (tx, facts) = sample_burn();
    // ...34567890 -> 0x34567890 % 25 + 1
    let media_id = 0x3456_7890u32 % 25 + 1;
    let format = burnmint_core::AssetCatalog::multi_asset()
        .media_format(media_id)
        .unwrap_or("image/jpeg")
        .to_string();
    ProofAssembler::assemble_at(&tx, &facts, media_id, &format, SAMPLE_TIMESTAMP)
}
