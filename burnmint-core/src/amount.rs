//! Fixed-point token amounts.
//!
//! Issued-currency values travel over the ledger as decimal strings. Tokens in
//! this system carry six decimal places, so amounts are held as integer
//! micro-units and compared exactly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::BurnProofError;

/// Decimal places carried by every token in the catalog.
pub const TOKEN_DECIMALS: u32 = 6;

const SCALE: u64 = 10u64.pow(TOKEN_DECIMALS);

/// Largest whole-unit amount representable in micro-units.
pub const MAX_UNITS: u64 = u64::MAX / SCALE;

/// Non-negative token amount with six decimal places.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(u64);

impl TokenAmount {
    pub const ZERO: TokenAmount = TokenAmount(0);

    /// Amount from whole token units, or `None` past the micro-unit ceiling.
    pub const fn checked_from_units(units: u64) -> Option<Self> {
        match units.checked_mul(SCALE) {
            Some(micros) => Some(TokenAmount(micros)),
            None => None,
        }
    }

    /// Amount from whole token units. Saturates past the micro-unit ceiling;
    /// use [`TokenAmount::checked_from_units`] for caller-supplied values.
    pub const fn from_units(units: u64) -> Self {
        TokenAmount(units.saturating_mul(SCALE))
    }

    /// Amount from raw micro-units.
    pub const fn from_micros(micros: u64) -> Self {
        TokenAmount(micros)
    }

    pub const fn micros(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: TokenAmount) -> Option<TokenAmount> {
        self.0.checked_add(other.0).map(TokenAmount)
    }

    pub fn checked_sub(self, other: TokenAmount) -> Option<TokenAmount> {
        self.0.checked_sub(other.0).map(TokenAmount)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE;
        let frac = self.0 % SCALE;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:0width$}", frac, width = TOKEN_DECIMALS as usize);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl FromStr for TokenAmount {
    type Err = BurnProofError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BurnProofError::InvalidTokenAmount(s.to_string());
        let trimmed = s.trim();

        // The ledger reports an emptied line as "-0" from the holder's side.
        let unsigned = match trimmed.strip_prefix('-') {
            Some(rest) if rest.chars().all(|c| c == '0' || c == '.') && !rest.is_empty() => rest,
            Some(_) => return Err(invalid()),
            None => trimmed,
        };

        let (whole, frac) = match unsigned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (unsigned, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > TOKEN_DECIMALS as usize {
            return Err(invalid());
        }

        let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
        let frac_micros: u64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = TOKEN_DECIMALS as usize);
            padded.parse().map_err(|_| invalid())?
        };

        whole
            .checked_mul(SCALE)
            .and_then(|m| m.checked_add(frac_micros))
            .map(TokenAmount)
            .ok_or_else(invalid)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ledger_value_strings() {
        assert_eq!("1000".parse::<TokenAmount>().unwrap(), TokenAmount::from_units(1000));
        assert_eq!("99.5".parse::<TokenAmount>().unwrap().micros(), 99_500_000);
        assert_eq!("0.000001".parse::<TokenAmount>().unwrap().micros(), 1);
        assert_eq!("-0".parse::<TokenAmount>().unwrap(), TokenAmount::ZERO);
        assert_eq!(".5".parse::<TokenAmount>().unwrap().micros(), 500_000);
    }

    #[test]
    fn rejects_negative_and_overly_precise_values() {
        assert!("-1".parse::<TokenAmount>().is_err());
        assert!("1.0000001".parse::<TokenAmount>().is_err());
        assert!("abc".parse::<TokenAmount>().is_err());
        assert!("".parse::<TokenAmount>().is_err());
        assert!("1e5".parse::<TokenAmount>().is_err());
    }

    #[test]
    fn checked_units_stop_at_the_micro_unit_ceiling() {
        let max_units = u64::MAX / 1_000_000;
        assert_eq!(max_units, MAX_UNITS);
        assert_eq!(
            TokenAmount::checked_from_units(max_units),
            Some(TokenAmount::from_micros(max_units * 1_000_000))
        );
        assert_eq!(TokenAmount::checked_from_units(max_units + 1), None);
        assert_eq!(TokenAmount::checked_from_units(0), Some(TokenAmount::ZERO));
    }

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(TokenAmount::from_units(100).to_string(), "100");
        assert_eq!(TokenAmount::from_micros(99_500_000).to_string(), "99.5");
        assert_eq!(TokenAmount::from_micros(1).to_string(), "0.000001");
    }

    #[test]
    fn serde_uses_decimal_strings() {
        let json = serde_json::to_string(&TokenAmount::from_micros(1_250_000)).unwrap();
        assert_eq!(json, "\"1.25\"");
        let back: TokenAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(back.micros(), 1_250_000);
    }
}
