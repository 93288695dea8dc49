//! Item normalization: one raw queue entry in, one validated purchase out.
//!
//! # Rules
//!
//! 1. `userId` must be a non-empty string
//! 2. `items` must be a non-empty array
//! 3. `total` is taken verbatim when numerically truthy, otherwise it is
//!    the sum of each line's `price` (missing or non-numeric counts as 0)
//! 4. The event time is `timestamp`, else `createdAt`, else `now`
//!
//! Normalization is pure. The processing time is supplied by the caller.

use crate::queued::{json_type_name, QueuedItem};
use crate::record::{PurchaseInput, PurchaseMetadata, PurchaseStatus, RequestContext};
use crate::{error::Result, Error, Timestamp};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Validate and transform one batch element.
pub fn normalize(raw: &Value, ctx: &RequestContext, now: Timestamp) -> Result<PurchaseInput> {
    let item = QueuedItem::from_value(raw)?;
    let queue_id = item.queue_id();

    let user_id = match &item.user_id {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::String(_)) | Some(Value::Null) | None => {
            return Err(Error::IncompleteItem("userId is required".into()))
        }
        Some(other) => {
            return Err(Error::IncompleteItem(format!(
                "userId must be a string, got {}",
                json_type_name(other)
            )))
        }
    };

    let lines = match item.items {
        Some(Value::Array(lines)) if !lines.is_empty() => lines,
        _ => {
            return Err(Error::IncompleteItem(
                "items must be a non-empty array".into(),
            ))
        }
    };

    let total = item
        .total
        .as_ref()
        .and_then(as_number)
        .filter(|t| *t != 0.0)
        .unwrap_or_else(|| line_total(&lines));

    if !total.is_finite() || total < 0.0 {
        return Err(Error::IncompleteItem(format!(
            "total must be a non-negative number, got {}",
            total
        )));
    }

    let timestamp = item
        .timestamp
        .as_ref()
        .and_then(parse_instant)
        .or_else(|| item.created_at.as_ref().and_then(parse_instant))
        .unwrap_or(now);

    Ok(PurchaseInput {
        user_id,
        items: lines,
        total,
        timestamp,
        status: PurchaseStatus::Synced,
        metadata: PurchaseMetadata::new(ctx, queue_id.as_deref()),
        queue_id,
        attributes: item.attributes,
    })
}

/// Sum of line prices, treating missing or non-numeric prices as zero.
pub fn line_total(lines: &[Value]) -> f64 {
    lines
        .iter()
        .map(|line| line.get("price").and_then(as_number).unwrap_or(0.0))
        .sum()
}

/// Read a JSON number, or a string holding one.
fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Parse a date-like value.
///
/// Accepts RFC 3339, naive date-times (read as UTC), plain dates and
/// epoch milliseconds.
pub fn parse_instant(value: &Value) -> Option<Timestamp> {
    match value {
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            DateTime::from_timestamp_millis(millis)
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(naive.and_utc());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
        _ => None,
    }
}
