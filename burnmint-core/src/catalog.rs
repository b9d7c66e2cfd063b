//! Static registry of burnable token types and the media pool they select from.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{BurnProofError, Result};

/// The 25 media assets a burn can entitle the holder to mint, in pool order.
pub const MEDIA_POOL: [(&str, &str); 25] = [
    ("LYA", "image/jpeg"),
    ("LYB", "image/png"),
    ("LYC", "video/mp4"),
    ("LYD", "image/gif"),
    ("LYE", "video/webm"),
    ("LYF", "image/svg"),
    ("LYG", "audio/mp3"),
    ("LYH", "image/webp"),
    ("LYI", "video/mov"),
    ("LYJ", "image/tiff"),
    ("LYK", "video/avi"),
    ("LYL", "image/bmp"),
    ("LYM", "audio/wav"),
    ("LYN", "image/heic"),
    ("LYO", "video/mkv"),
    ("LYP", "image/raw"),
    ("LYQ", "audio/flac"),
    ("LYR", "image/eps"),
    ("LYS", "video/wmv"),
    ("LYT", "image/ico"),
    ("LYU", "audio/aac"),
    ("LYV", "image/psd"),
    ("LYW", "video/flv"),
    ("LYX", "image/ai"),
    ("LYZ", "video/3gp"),
];

/// Symbol of the single-asset catalog's only token.
pub const SINGLE_ASSET_SYMBOL: &str = "LAY";

static SINGLE_ASSET: Lazy<AssetCatalog> = Lazy::new(|| AssetCatalog {
    mode: CatalogMode::Single,
    tokens: vec![TokenType {
        symbol: SINGLE_ASSET_SYMBOL.to_string(),
        media_format: MEDIA_POOL[0].1.to_string(),
        catalog_index: 1,
    }],
});

static MULTI_ASSET: Lazy<AssetCatalog> = Lazy::new(|| AssetCatalog {
    mode: CatalogMode::Multi,
    tokens: MEDIA_POOL
        .iter()
        .enumerate()
        .map(|(i, (symbol, format))| TokenType {
            symbol: symbol.to_string(),
            media_format: format.to_string(),
            catalog_index: i as u32 + 1,
        })
        .collect(),
});

/// Catalog flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogMode {
    /// One fungible token; every burn selects from the full media pool.
    Single,
    /// One token per media asset.
    Multi,
}

impl FromStr for CatalogMode {
    type Err = BurnProofError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(CatalogMode::Single),
            "multi" => Ok(CatalogMode::Multi),
            other => Err(BurnProofError::InvalidCatalog(format!(
                "unknown catalog mode {:?} (expected single or multi)",
                other
            ))),
        }
    }
}

impl fmt::Display for CatalogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogMode::Single => f.write_str("single"),
            CatalogMode::Multi => f.write_str("multi"),
        }
    }
}

/// Broad media family, derived from the format string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Image,
    Video,
    Audio,
    Other,
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetClass::Image => "image",
            AssetClass::Video => "video",
            AssetClass::Audio => "audio",
            AssetClass::Other => "other",
        };
        f.write_str(s)
    }
}

/// Classify a media format by prefix. First match wins.
pub fn asset_class(media_format: &str) -> AssetClass {
    const PREFIXES: [(&str, AssetClass); 3] = [
        ("image/", AssetClass::Image),
        ("video/", AssetClass::Video),
        ("audio/", AssetClass::Audio),
    ];
    PREFIXES
        .iter()
        .find(|(prefix, _)| media_format.starts_with(prefix))
        .map(|(_, class)| *class)
        .unwrap_or(AssetClass::Other)
}

/// A burnable token type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenType {
    /// 3–4 character currency code.
    pub symbol: String,
    pub media_format: String,
    /// Position in the catalog, 1-based.
    pub catalog_index: u32,
}

impl TokenType {
    pub fn asset_class(&self) -> AssetClass {
        asset_class(&self.media_format)
    }
}

/// Result of a catalog lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogEntry<'a> {
    pub token: &'a TokenType,
    pub media_format: &'a str,
    pub catalog_index: u32,
}

/// Immutable registry of token types.
#[derive(Clone, Debug)]
pub struct AssetCatalog {
    mode: CatalogMode,
    tokens: Vec<TokenType>,
}

impl AssetCatalog {
    /// Build a custom catalog, validating symbols and indices.
    pub fn new(mode: CatalogMode, tokens: Vec<TokenType>) -> Result<Self> {
        if tokens.is_empty() {
            return Err(BurnProofError::InvalidCatalog("catalog is empty".into()));
        }
        let mut seen = HashSet::new();
        for (i, token) in tokens.iter().enumerate() {
            let len = token.symbol.len();
            if !(3..=4).contains(&len) || !token.symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(BurnProofError::InvalidCatalog(format!(
                    "symbol {:?} must be 3-4 alphanumeric characters",
                    token.symbol
                )));
            }
            if token.symbol != token.symbol.to_ascii_uppercase() {
                return Err(BurnProofError::InvalidCatalog(format!(
                    "symbol {:?} must be upper case",
                    token.symbol
                )));
            }
            if !seen.insert(token.symbol.as_str()) {
                return Err(BurnProofError::InvalidCatalog(format!(
                    "duplicate symbol {}",
                    token.symbol
                )));
            }
            if token.catalog_index != i as u32 + 1 {
                return Err(BurnProofError::InvalidCatalog(format!(
                    "{} has catalog index {}, expected {}",
                    token.symbol,
                    token.catalog_index,
                    i + 1
                )));
            }
        }
        Ok(Self { mode, tokens })
    }

    /// The built-in single-asset catalog (`LAY`).
    pub fn single_asset() -> &'static AssetCatalog {
        &SINGLE_ASSET
    }

    /// The built-in 25-token catalog (`LYA`..`LYZ`).
    pub fn multi_asset() -> &'static AssetCatalog {
        &MULTI_ASSET
    }

    pub fn builtin(mode: CatalogMode) -> &'static AssetCatalog {
        match mode {
            CatalogMode::Single => Self::single_asset(),
            CatalogMode::Multi => Self::multi_asset(),
        }
    }

    pub fn mode(&self) -> CatalogMode {
        self.mode
    }

    /// Look up a token type by symbol (case-insensitive).
    pub fn lookup(&self, symbol: &str) -> Result<CatalogEntry<'_>> {
        let wanted = symbol.trim();
        self.tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(wanted))
            .map(|token| CatalogEntry {
                token,
                media_format: &token.media_format,
                catalog_index: token.catalog_index,
            })
            .ok_or_else(|| BurnProofError::UnknownTokenType(symbol.to_string()))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.lookup(symbol).is_ok()
    }

    /// Token types in definition order.
    pub fn all(&self) -> &[TokenType] {
        &self.tokens
    }

    /// Number of token types (N).
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Catalog size handed to the media selector.
    ///
    /// Every built-in catalog selects over the shared media pool, so a
    /// single-asset burn still lands on one of the 25 assets.
    pub fn selection_size(&self) -> u32 {
        match self.mode {
            CatalogMode::Single => MEDIA_POOL.len() as u32,
            CatalogMode::Multi => self.tokens.len() as u32,
        }
    }

    /// Media format of the asset a burn selected.
    pub fn media_format(&self, media_id: u32) -> Option<&str> {
        let idx = media_id.checked_sub(1)? as usize;
        match self.mode {
            CatalogMode::Single => MEDIA_POOL.get(idx).map(|(_, f)| *f),
            CatalogMode::Multi => self.tokens.get(idx).map(|t| t.media_format.as_str()),
        }
    }
}
