//! Transactions as returned by the HCB transactions endpoint.
//!
//! The shape of a transaction changed across API revisions, so every attribution field is
//! optional and identifiers are accepted both as strings and as numbers.

use crate::Decimal;
use rust_decimal::RoundingStrategy;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// An identifier the API may send either as a JSON string or a JSON number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(from = "RawIdentifier")]
pub struct Identifier(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawIdentifier {
    Text(String),
    Number(serde_json::Number),
}

impl From<RawIdentifier> for Identifier {
    fn from(raw: RawIdentifier) -> Self {
        match raw {
            RawIdentifier::Text(text) => Identifier(text),
            RawIdentifier::Number(number) => Identifier(number.to_string()),
        }
    }
}

impl Identifier {
    pub fn new(id: impl Into<String>) -> Self {
        Identifier(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Label {
    pub name: String,
}

/// One side of a nested `transfer` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TransferParty {
    #[serde(default)]
    pub id: Option<Identifier>,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TransferDetails {
    #[serde(default)]
    pub from: Option<TransferParty>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawTransaction {
    pub id: Identifier,
    #[serde(default, deserialize_with = "deserialize_cents")]
    pub amount_cents: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub from_event_id: Option<Identifier>,
    #[serde(default)]
    pub from_organization_id: Option<Identifier>,
    #[serde(default)]
    pub transfer: Option<TransferDetails>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub labels: Option<Vec<Label>>,
}

impl RawTransaction {
    pub fn new(id: impl Into<String>) -> Self {
        RawTransaction {
            id: Identifier::new(id),
            amount_cents: None,
            amount: None,
            from_event_id: None,
            from_organization_id: None,
            transfer: None,
            memo: None,
            labels: None,
        }
    }

    /// Absolute amount in cents.
    ///
    /// Prefers `amount_cents`; otherwise `amount` is scaled by 100 and rounded half away from
    /// zero. Outflows are recorded as negative amounts, so the sign is dropped. A transaction
    /// carrying neither field counts as zero.
    pub fn amount_in_cents(&self) -> u64 {
        if let Some(cents) = self.amount_cents {
            return cents.unsigned_abs();
        }
        let Some(amount) = self.amount else {
            return 0;
        };
        (amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .abs()
            .to_u64()
            .unwrap_or(u64::MAX)
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.labels
            .iter()
            .flatten()
            .any(|label| label.name == name)
    }

    pub fn transfer_source(&self) -> Option<&TransferParty> {
        self.transfer.as_ref()?.from.as_ref()
    }
}

/// Read a decimal from a JSON number or numeric string.
///
/// Numbers go through their shortest textual form, which keeps `12.345` exact instead of
/// inheriting the binary float error. `null` is `None`.
pub fn decimal_from_json(value: &serde_json::Value) -> Result<Option<Decimal>, String> {
    let text = match value {
        serde_json::Value::Null => return Ok(None),
        serde_json::Value::Number(number) => number.to_string(),
        serde_json::Value::String(text) => text.trim().to_owned(),
        other => return Err(format!("expected a number, found {other}")),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map(Some)
        .map_err(|error| format!("invalid number `{text}`: {error}"))
}

fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    decimal_from_json(&value).map_err(serde::de::Error::custom)
}

fn deserialize_cents<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let Some(cents) = decimal_from_json(&value).map_err(serde::de::Error::custom)? else {
        return Ok(None);
    };
    cents
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("cents out of range: {cents}")))
}
