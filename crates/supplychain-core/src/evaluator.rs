//! ============================================================================
//! Condition Evaluator - Per-transaction trigger-condition checks
//! ============================================================================
//! Pure functions over a transaction and a set of thresholds. No I/O.
//!
//! Quantity and temperature are free text on the record and are read with
//! lenient leading-integer parsing ("12kg" reads as 12). Text without a
//! leading integer is not-a-number, and any comparison against it fails.
//! An unset threshold is always satisfied.
//! ============================================================================

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::conditions::{TriggerConditions, DATE_FORMAT};
use crate::types::TransactionRecord;

/// Outcome of a single rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOutcome {
    /// Threshold not set; satisfied vacuously
    Unset,
    Passed,
    Failed,
    /// The transaction's value could not be read; counts as failed
    Unparseable,
}

impl RuleOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, RuleOutcome::Unset | RuleOutcome::Passed)
    }

    fn from_comparison(passed: bool) -> Self {
        if passed {
            RuleOutcome::Passed
        } else {
            RuleOutcome::Failed
        }
    }
}

/// Per-rule evaluation of one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionReport {
    pub quantity: RuleOutcome,
    pub temperature: RuleOutcome,
    pub delivery_date: RuleOutcome,
    /// One line per failing rule, for display
    pub failures: Vec<String>,
}

impl ConditionReport {
    /// True when every rule is satisfied
    pub fn passes(&self) -> bool {
        self.quantity.is_satisfied()
            && self.temperature.is_satisfied()
            && self.delivery_date.is_satisfied()
    }
}

/// Decide whether a transaction meets every set trigger condition
pub fn evaluate(transaction: &TransactionRecord, conditions: &TriggerConditions) -> bool {
    quantity_rule(transaction, conditions).is_satisfied()
        && temperature_rule(transaction, conditions).is_satisfied()
        && delivery_date_rule(transaction, conditions).is_satisfied()
}

/// Evaluate every rule and describe the failures
pub fn evaluate_detailed(
    transaction: &TransactionRecord,
    conditions: &TriggerConditions,
) -> ConditionReport {
    let quantity = quantity_rule(transaction, conditions);
    let temperature = temperature_rule(transaction, conditions);
    let delivery_date = delivery_date_rule(transaction, conditions);

    let mut failures = Vec::new();
    if let Some(min) = conditions.min_quantity {
        match quantity {
            RuleOutcome::Failed => failures.push(format!(
                "quantity {} is below the minimum of {}",
                transaction.quantity.trim(),
                min
            )),
            RuleOutcome::Unparseable => failures.push(format!(
                "quantity '{}' is not a number",
                transaction.quantity
            )),
            _ => {}
        }
    }
    if let Some(max) = conditions.max_temperature {
        match temperature {
            RuleOutcome::Failed => failures.push(format!(
                "temperature {} is above the maximum of {}",
                transaction.temperature.trim(),
                max
            )),
            RuleOutcome::Unparseable => failures.push(format!(
                "temperature '{}' is not a number",
                transaction.temperature
            )),
            _ => {}
        }
    }
    if let Some(max) = conditions.max_delivery_date {
        match delivery_date {
            RuleOutcome::Failed => failures.push(format!(
                "delivery date {} is after {}",
                transaction.delivery_date.trim(),
                max.format(DATE_FORMAT)
            )),
            RuleOutcome::Unparseable => failures.push(format!(
                "delivery date '{}' is not a date",
                transaction.delivery_date
            )),
            _ => {}
        }
    }

    ConditionReport {
        quantity,
        temperature,
        delivery_date,
        failures,
    }
}

pub fn quantity_rule(transaction: &TransactionRecord, conditions: &TriggerConditions) -> RuleOutcome {
    let Some(min) = conditions.min_quantity else {
        return RuleOutcome::Unset;
    };
    match parse_leading_int(&transaction.quantity) {
        Some(quantity) => RuleOutcome::from_comparison(i128::from(quantity) >= i128::from(min)),
        None => RuleOutcome::Unparseable,
    }
}

pub fn temperature_rule(
    transaction: &TransactionRecord,
    conditions: &TriggerConditions,
) -> RuleOutcome {
    let Some(max) = conditions.max_temperature else {
        return RuleOutcome::Unset;
    };
    match parse_leading_int(&transaction.temperature) {
        Some(temperature) => RuleOutcome::from_comparison(temperature <= max),
        None => RuleOutcome::Unparseable,
    }
}

pub fn delivery_date_rule(
    transaction: &TransactionRecord,
    conditions: &TriggerConditions,
) -> RuleOutcome {
    let Some(max) = conditions.max_delivery_date else {
        return RuleOutcome::Unset;
    };
    match parse_delivery_date(&transaction.delivery_date) {
        Some(date) => RuleOutcome::from_comparison(date <= max),
        None => RuleOutcome::Unparseable,
    }
}

/// Leading-integer parse: skip leading whitespace, accept one sign, then read
/// decimal digits up to the first non-digit. None when no digit is found.
/// Values beyond the i64 range saturate.
pub fn parse_leading_int(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    let mut seen_digit = false;
    for byte in digits.bytes() {
        if !byte.is_ascii_digit() {
            break;
        }
        seen_digit = true;
        let digit = i64::from(byte - b'0');
        value = if negative {
            value.saturating_mul(10).saturating_sub(digit)
        } else {
            value.saturating_mul(10).saturating_add(digit)
        };
    }

    seen_digit.then_some(value)
}

/// Calendar date of a delivery-date string. Accepts `YYYY-MM-DD`, RFC 3339
/// timestamps (taken in UTC) and naive `YYYY-MM-DDTHH:MM:SS[.fff]`.
pub fn parse_delivery_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, DATE_FORMAT) {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.date())
}
