//! The external ledger collaborator.
//!
//! Connection management, autofill, signing and submission belong to the
//! ledger client library. This module only fixes the request/response shapes
//! the pipeline depends on and the trait a client has to implement.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::amount::TokenAmount;
use crate::error::LedgerError;

/// Canonical settlement code for a successful transaction.
pub const SUCCESS_CODE: &str = "tesSUCCESS";

/// Length of a ledger transaction hash in hex characters.
pub const TX_HASH_HEX_LEN: usize = 64;

/// Settlement result code as reported by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultCode(pub String);

impl ResultCode {
    pub fn success() -> Self {
        ResultCode(SUCCESS_CODE.to_string())
    }

    pub fn is_success(&self) -> bool {
        self.0 == SUCCESS_CODE
    }

    /// Local (`tel`) and retry (`ter`) classes may succeed if submitted again.
    /// Claimed-fee (`tec`), malformed (`tem`) and failure (`tef`) codes never do.
    pub fn is_retryable(&self) -> bool {
        self.0.starts_with("ter") || self.0.starts_with("tel")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issued-currency amount: value of `currency` owed by `issuer`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedAmount {
    pub currency: String,
    pub issuer: String,
    pub value: TokenAmount,
}

/// Transaction memo, hex-encoded as the ledger stores it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Memo {
    pub memo_type: String,
    pub memo_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo_format: Option<String>,
}

impl Memo {
    /// Build a memo from plain-text fields.
    pub fn new(memo_type: &str, memo_data: &str, memo_format: Option<&str>) -> Self {
        Self {
            memo_type: hex::encode_upper(memo_type),
            memo_data: hex::encode_upper(memo_data),
            memo_format: memo_format.map(hex::encode_upper),
        }
    }

    /// Decoded memo data, if it is valid UTF-8 hex.
    pub fn data_text(&self) -> Option<String> {
        hex::decode(&self.memo_data)
            .ok()
            .and_then(|b| String::from_utf8(b).ok())
    }

    pub fn type_text(&self) -> Option<String> {
        hex::decode(&self.memo_type)
            .ok()
            .and_then(|b| String::from_utf8(b).ok())
    }
}

/// Account flags the pipeline sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountFlag {
    /// Allow issued balances to ripple through the issuer.
    DefaultRipple,
}

/// Transaction body.
///
/// Transaction fields use the ledger's PascalCase names; amount objects keep
/// their lowercase `currency`/`issuer`/`value` keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "TransactionType")]
pub enum TransactionKind {
    #[serde(rename_all = "PascalCase")]
    Payment {
        destination: String,
        amount: IssuedAmount,
    },
    #[serde(rename_all = "PascalCase")]
    TrustSet {
        limit_amount: IssuedAmount,
    },
    #[serde(rename_all = "PascalCase")]
    AccountSet {
        set_flag: AccountFlag,
    },
}

/// Unsigned transaction handed to the ledger client for autofill and signing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LedgerTransaction {
    pub account: String,
    #[serde(flatten)]
    pub kind: TransactionKind,
    #[serde(default)]
    pub memos: Vec<Memo>,
}

impl LedgerTransaction {
    /// Payment returning `amount` to its issuer, which extinguishes it.
    pub fn burn(holder: &str, amount: IssuedAmount, memo: Memo) -> Self {
        Self {
            account: holder.to_string(),
            kind: TransactionKind::Payment {
                destination: amount.issuer.clone(),
                amount,
            },
            memos: vec![memo],
        }
    }

    /// Payment from the issuer, which creates `amount` in the holder's line.
    pub fn issue(holder: &str, amount: IssuedAmount, memo: Memo) -> Self {
        Self {
            account: amount.issuer.clone(),
            kind: TransactionKind::Payment {
                destination: holder.to_string(),
                amount,
            },
            memos: vec![memo],
        }
    }

    pub fn trust_set(holder: &str, limit_amount: IssuedAmount, memo: Memo) -> Self {
        Self {
            account: holder.to_string(),
            kind: TransactionKind::TrustSet { limit_amount },
            memos: vec![memo],
        }
    }

    pub fn account_set(account: &str, set_flag: AccountFlag, memo: Memo) -> Self {
        Self {
            account: account.to_string(),
            kind: TransactionKind::AccountSet { set_flag },
            memos: vec![memo],
        }
    }

    /// Currency this transaction moves or authorises, if any.
    pub fn currency(&self) -> Option<&str> {
        match &self.kind {
            TransactionKind::Payment { amount, .. } => Some(&amount.currency),
            TransactionKind::TrustSet { limit_amount } => Some(&limit_amount.currency),
            TransactionKind::AccountSet { .. } => None,
        }
    }
}

/// Autofilled and signed transaction. The hash is final at this point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hash: String,
    pub blob: String,
}

/// Outcome of a submission once the ledger has settled it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub hash: String,
    pub result_code: ResultCode,
    pub ledger_index: u32,
}

/// Transaction as returned by a lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub hash: String,
    pub account: String,
    pub destination: Option<String>,
    /// Fee in drops, as the ledger renders it.
    pub fee: String,
    pub sequence: u32,
    pub memos: Vec<Memo>,
    pub validated: bool,
    pub ledger_index: Option<u32>,
    pub result_code: Option<ResultCode>,
}

/// Header facts of a closed ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerHeader {
    pub ledger_index: u32,
    pub ledger_hash: String,
    /// Seconds since the ledger epoch (2000-01-01).
    pub close_time: u64,
    pub parent_hash: String,
    /// Total native supply in drops, as a decimal string.
    pub total_coins: String,
}

/// One trust line of an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLine {
    pub currency: String,
    /// Counterparty of the line; the issuer for holder-side lines.
    pub issuer: String,
    pub balance: TokenAmount,
    pub limit: TokenAmount,
}

/// Client for the external ledger.
///
/// Implementations own the connection; the pipeline borrows a client for the
/// duration of one operation and never stores it.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Autofill and sign a transaction. Does not submit.
    async fn prepare(&self, tx: &LedgerTransaction) -> Result<SignedTransaction, LedgerError>;

    /// Submit a signed transaction and wait for its settlement.
    async fn submit(&self, signed: &SignedTransaction) -> Result<SubmitOutcome, LedgerError>;

    /// Look up a transaction by hash.
    async fn get_transaction(&self, hash: &str) -> Result<TransactionRecord, LedgerError>;

    /// Look up a closed ledger by index.
    async fn get_ledger(&self, index: u32) -> Result<LedgerHeader, LedgerError>;

    /// All trust lines of an account, in ledger order.
    async fn get_trust_lines(&self, address: &str) -> Result<Vec<TrustLine>, LedgerError>;
}

/// Balance of one token type for one holder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub token: String,
    pub holder: String,
    pub amount: TokenAmount,
    pub trust_limit: TokenAmount,
}

/// Read the holder's current balance of `currency` issued by `issuer`.
///
/// A missing trust line reads as a zero balance with a zero limit.
pub async fn fetch_balance<L>(
    ledger: &L,
    holder: &str,
    currency: &str,
    issuer: &str,
) -> Result<Balance, LedgerError>
where
    L: LedgerClient + ?Sized,
{
    let lines = ledger.get_trust_lines(holder).await?;
    let line = lines
        .into_iter()
        .find(|l| l.currency == currency && l.issuer == issuer);
    Ok(Balance {
        token: currency.to_string(),
        holder: holder.to_string(),
        amount: line.as_ref().map(|l| l.balance).unwrap_or_default(),
        trust_limit: line.map(|l| l.limit).unwrap_or_default(),
    })
}
