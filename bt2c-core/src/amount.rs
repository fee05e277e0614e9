use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// Fixed-point BT2C amount, scaled by `10^8` (8 decimal places), stored as
/// `i128` so aggregation across a block never overflows a `u64`.
///
/// Canonical encoding represents amounts as decimal strings rather than
/// floats, to avoid float drift across nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Amount(i128);

pub const SCALE: i128 = 100_000_000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount overflow")]
    Overflow,
    #[error("invalid decimal amount: {0}")]
    InvalidDecimal(String),
    #[error("amount must be non-negative")]
    Negative,
}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_units(units: i128) -> Self {
        Self(units)
    }

    pub fn from_integer(whole: u64) -> Self {
        Self(whole as i128 * SCALE)
    }

    pub fn units(&self) -> i128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Result<Amount, AmountError> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }

    pub fn checked_sub(self, other: Amount) -> Result<Amount, AmountError> {
        self.0
            .checked_sub(other.0)
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }

    pub fn checked_mul_f64(self, factor: f64) -> Amount {
        Amount(((self.0 as f64) * factor) as i128)
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount((self.0 - other.0).max(0))
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE;
        let frac = (self.0 % SCALE).unsigned_abs();
        write!(f, "{whole}.{frac:08}")
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let negative = s.starts_with('-');
        let mut parts = s.trim_start_matches('-').splitn(2, '.');
        let whole: i128 = parts
            .next()
            .unwrap_or("0")
            .parse()
            .map_err(|_| AmountError::InvalidDecimal(s.to_string()))?;
        let frac_str = parts.next().unwrap_or("0");
        if frac_str.len() > 8 {
            return Err(AmountError::InvalidDecimal(s.to_string()));
        }
        let frac_padded = format!("{frac_str:0<8}");
        let frac: i128 = frac_padded
            .parse()
            .map_err(|_| AmountError::InvalidDecimal(s.to_string()))?;
        let magnitude = whole * SCALE + frac;
        if negative {
            return Ok(Amount(-magnitude));
        }
        Ok(Amount(magnitude))
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_roundtrip() {
        let a = Amount::from_str("21.5").unwrap();
        assert_eq!(a.to_string(), "21.50000000");
        assert_eq!(Amount::from_str(&a.to_string()).unwrap(), a);
    }

    #[test]
    fn integer_helper() {
        assert_eq!(Amount::from_integer(21).to_string(), "21.00000000");
    }

    #[test]
    fn arithmetic() {
        let a = Amount::from_str("1.5").unwrap();
        let b = Amount::from_str("0.5").unwrap();
        assert_eq!((a + b).to_string(), "2.00000000");
        assert_eq!(a.checked_sub(b).unwrap().to_string(), "1.00000000");
    }

    #[test]
    fn serde_roundtrip() {
        let a = Amount::from_str("100.00000001").unwrap();
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"100.00000001\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(a, back);
    }
}
