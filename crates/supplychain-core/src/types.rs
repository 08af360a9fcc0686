//! ============================================================================
//! Core Types for the Supply Chain Client
//! ============================================================================
//! Strongly typed records for the ledger's wire format. Records arriving from
//! the network are parsed into these types at the client boundary; anything
//! that does not fit is rejected there rather than inside the evaluator.
//! ============================================================================

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::ValidationError;

/// Lifecycle status of a supply-chain event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
}

impl TransactionStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Completed => "Completed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque server-assigned transaction identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TransactionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self(string_or_number(deserializer)?))
    }
}

/// A supply-chain event as stored by the ledger, pending or mined.
///
/// `quantity`, `temperature` and `delivery_date` stay free-form text; the
/// evaluator interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none", deserialize_with = "optional_id")]
    pub id: Option<TransactionId>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub sender: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub recipient: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub product: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub quantity: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub location: String,
    #[serde(
        default,
        serialize_with = "serialize_status",
        deserialize_with = "deserialize_status"
    )]
    pub status: Option<TransactionStatus>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub temperature: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub delivery_date: String,
}

/// Transactions awaiting inclusion in the next block
pub type PendingTransaction = TransactionRecord;

impl TransactionRecord {
    /// Display label: id when known, otherwise sender -> recipient
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => id.to_string(),
            None => format!("{} -> {} ({})", self.sender, self.recipient, self.product),
        }
    }

    /// The editable fields of this record as a draft
    pub fn to_draft(&self) -> TransactionDraft {
        TransactionDraft {
            sender: self.sender.clone(),
            recipient: self.recipient.clone(),
            product: self.product.clone(),
            quantity: self.quantity.clone(),
            location: self.location.clone(),
            status: self.status,
            temperature: self.temperature.clone(),
            delivery_date: self.delivery_date.clone(),
        }
    }
}

/// Payload for creating or updating a transaction. Has no identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    pub sender: String,
    pub recipient: String,
    pub product: String,
    pub quantity: String,
    pub location: String,
    #[serde(serialize_with = "serialize_status")]
    pub status: Option<TransactionStatus>,
    pub temperature: String,
    pub delivery_date: String,
}

impl TransactionDraft {
    /// Sender, recipient and product are required; the rest is free text
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut err = ValidationError::new();
        for (field, value) in [
            ("sender", &self.sender),
            ("recipient", &self.recipient),
            ("product", &self.product),
        ] {
            if value.trim().is_empty() {
                err.push(field, "is required");
            }
        }
        err.into_result()
    }
}

/// A block from the mined chain. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinedBlock {
    pub index: u64,
    pub timestamp: BlockTimestamp,
    #[serde(deserialize_with = "string_or_number")]
    pub previous_hash: String,
    pub proof: u64,
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,
}

/// Block timestamps arrive either as epoch numbers or as text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockTimestamp {
    Epoch(f64),
    Text(String),
}

/// Epoch values above this are taken as milliseconds
const EPOCH_MILLIS_CUTOFF: f64 = 100_000_000_000.0;

impl BlockTimestamp {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            BlockTimestamp::Epoch(value) => epoch_to_datetime(*value),
            BlockTimestamp::Text(text) => DateTime::parse_from_rfc3339(text.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| text.trim().parse::<f64>().ok().and_then(epoch_to_datetime)),
        }
    }
}

impl fmt::Display for BlockTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S UTC")),
            None => match self {
                BlockTimestamp::Epoch(v) => write!(f, "(invalid: {})", v),
                BlockTimestamp::Text(t) => write!(f, "(invalid: {})", t),
            },
        }
    }
}

fn epoch_to_datetime(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let millis = if value.abs() >= EPOCH_MILLIS_CUTOFF {
        value
    } else {
        value * 1000.0
    };
    Utc.timestamp_millis_opt(millis as i64).single()
}

// ============================================================================
// Wire helpers
// ============================================================================

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
        Raw::Null(()) => String::new(),
    })
}

fn optional_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<TransactionId>, D::Error> {
    let raw = string_or_number(deserializer)?;
    if raw.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(TransactionId(raw)))
    }
}

fn deserialize_status<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<TransactionStatus>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => TransactionStatus::from_str(s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown transaction status '{}'", s))),
    }
}

fn serialize_status<S: Serializer>(
    status: &Option<TransactionStatus>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(status.map(|s| s.as_str()).unwrap_or(""))
}
