use bigdecimal::BigDecimal;
use num_traits::Zero;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::ValidationError;

/// Strictly positive quantity of a coin.
///
/// Always built from decimal text so no binary float ever sits between the
/// caller's digits and the stored value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(BigDecimal);

impl Amount {
    pub fn new(value: BigDecimal) -> Result<Self, ValidationError> {
        if value <= BigDecimal::zero() {
            return Err(ValidationError::NonPositiveAmount);
        }
        Ok(Amount(value))
    }

    /// Parse decimal text such as `"0.1"` or `"1e-3"`.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let trimmed = text.trim();
        let value = BigDecimal::from_str(trimmed)
            .map_err(|_| ValidationError::InvalidAmount(trimmed.to_string()))?;
        Amount::new(value)
    }

    pub fn value(&self) -> &BigDecimal {
        &self.0
    }

    pub fn into_inner(self) -> BigDecimal {
        self.0
    }

    /// Exact decimal sum
    pub fn add(&self, other: &Amount) -> Amount {
        Amount(&self.0 + &other.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // JSON numbers go through their shortest decimal text, never through f64 math.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawAmount {
            Text(String),
            Number(serde_json::Number),
        }

        let text = match RawAmount::deserialize(deserializer)? {
            RawAmount::Text(text) => text,
            RawAmount::Number(number) => number.to_string(),
        };
        Amount::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_parse_valid() {
        let amount = Amount::parse("0.5").unwrap();
        assert_eq!(amount.value(), &BigDecimal::from_str("0.5").unwrap());
    }

    #[test]
    fn test_amount_zero_rejected() {
        assert_eq!(Amount::parse("0"), Err(ValidationError::NonPositiveAmount));
    }

    #[test]
    fn test_amount_negative_rejected() {
        assert_eq!(Amount::parse("-1"), Err(ValidationError::NonPositiveAmount));
    }

    #[test]
    fn test_amount_garbage_rejected() {
        assert!(matches!(
            Amount::parse("lots"),
            Err(ValidationError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_amount_addition_is_exact() {
        let a = Amount::parse("0.1").unwrap();
        let b = Amount::parse("0.2").unwrap();
        let sum = a.add(&b);
        assert_eq!(sum, Amount::parse("0.3").unwrap());
        assert_eq!(sum.to_string(), "0.3");
    }

    #[test]
    fn test_amount_deserialize_from_number_and_string() {
        let from_number: Amount = serde_json::from_str("0.1").unwrap();
        let from_text: Amount = serde_json::from_str("\"0.1\"").unwrap();
        assert_eq!(from_number, from_text);
        assert_eq!(from_number.to_string(), "0.1");
    }

    #[test]
    fn test_amount_deserialize_rejects_non_positive() {
        let result: Result<Amount, _> = serde_json::from_str("0");
        assert!(result.is_err());
    }

    #[test]
    fn test_amount_serializes_as_string() {
        let amount = Amount::parse("1.25").unwrap();
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"1.25\"");
    }
}
