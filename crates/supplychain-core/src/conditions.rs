//! ============================================================================
//! Trigger Conditions - Operator-chosen admission thresholds
//! ============================================================================
//! A transaction must meet every set threshold before it may be mined:
//! - quantity at least `min_quantity`
//! - temperature at most `max_temperature`
//! - delivery on or before `max_delivery_date`
//!
//! An unset threshold places no constraint. Conditions are saved wholesale;
//! a save never carries a partial triple.
//! ============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Date format used for thresholds and operator input
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Active trigger-condition thresholds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConditions {
    #[serde(default)]
    pub min_quantity: Option<u64>,
    #[serde(default)]
    pub max_temperature: Option<i64>,
    #[serde(default)]
    pub max_delivery_date: Option<NaiveDate>,
}

impl TriggerConditions {
    /// Fully populated conditions
    pub fn new(min_quantity: u64, max_temperature: i64, max_delivery_date: NaiveDate) -> Self {
        Self {
            min_quantity: Some(min_quantity),
            max_temperature: Some(max_temperature),
            max_delivery_date: Some(max_delivery_date),
        }
    }

    /// No thresholds set; every transaction passes
    pub fn unset() -> Self {
        Self::default()
    }

    pub fn is_unset(&self) -> bool {
        self.min_quantity.is_none()
            && self.max_temperature.is_none()
            && self.max_delivery_date.is_none()
    }

    /// Saving requires every threshold to be present
    pub fn ensure_complete(&self) -> Result<(), ValidationError> {
        let mut err = ValidationError::new();
        if self.min_quantity.is_none() {
            err.push("minQuantity", "is required");
        }
        if self.max_temperature.is_none() {
            err.push("maxTemperature", "is required");
        }
        if self.max_delivery_date.is_none() {
            err.push("maxDeliveryDate", "is required");
        }
        err.into_result()
    }
}

impl fmt::Display for TriggerConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show<T: fmt::Display>(value: &Option<T>) -> String {
            value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "(unset)".to_string())
        }

        write!(
            f,
            "quantity >= {}, temperature <= {}, delivery by {}",
            show(&self.min_quantity),
            show(&self.max_temperature),
            show(&self.max_delivery_date)
        )
    }
}

/// Raw trigger-condition input as typed by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionsForm {
    pub quantity: String,
    pub temperature: String,
    pub delivery_date: String,
}

impl ConditionsForm {
    pub fn new(
        quantity: impl Into<String>,
        temperature: impl Into<String>,
        delivery_date: impl Into<String>,
    ) -> Self {
        Self {
            quantity: quantity.into(),
            temperature: temperature.into(),
            delivery_date: delivery_date.into(),
        }
    }

    /// Parse into fully populated conditions. Every field is required.
    pub fn parse(&self) -> Result<TriggerConditions, ValidationError> {
        let mut err = ValidationError::new();

        let quantity = self.quantity.trim();
        let min_quantity = if quantity.is_empty() {
            err.push("minQuantity", "is required");
            None
        } else {
            match quantity.parse::<u64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    err.push("minQuantity", format!("'{}' is not a non-negative integer", quantity));
                    None
                }
            }
        };

        let temperature = self.temperature.trim();
        let max_temperature = if temperature.is_empty() {
            err.push("maxTemperature", "is required");
            None
        } else {
            match temperature.parse::<i64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    err.push("maxTemperature", format!("'{}' is not an integer", temperature));
                    None
                }
            }
        };

        let date = self.delivery_date.trim();
        let max_delivery_date = if date.is_empty() {
            err.push("maxDeliveryDate", "is required");
            None
        } else {
            match NaiveDate::parse_from_str(date, DATE_FORMAT) {
                Ok(v) => Some(v),
                Err(_) => {
                    err.push("maxDeliveryDate", format!("'{}' is not a YYYY-MM-DD date", date));
                    None
                }
            }
        };

        err.into_result()?;
        Ok(TriggerConditions {
            min_quantity,
            max_temperature,
            max_delivery_date,
        })
    }
}

impl From<&TriggerConditions> for ConditionsForm {
    fn from(conditions: &TriggerConditions) -> Self {
        Self {
            quantity: conditions.min_quantity.map(|v| v.to_string()).unwrap_or_default(),
            temperature: conditions.max_temperature.map(|v| v.to_string()).unwrap_or_default(),
            delivery_date: conditions
                .max_delivery_date
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
        }
    }
}
