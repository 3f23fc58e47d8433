// Analytics upload: area visitor counts, heatmap data and per-visit durations

pub mod client;
pub mod poster;
pub mod schedule;

pub use client::{AnalyticsTransport, HttpTransport};
pub use poster::{AnalyticsPoster, CycleOutcome, PosterHandle};
pub use schedule::{DailyReset, Gate, PostSchedule};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of exhibition areas whose ids are reset when init data is unavailable
pub const DEFAULT_AREA_COUNT: usize = 8;

/// Error type for analytics operations
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Invalid init response: {0}")]
    InvalidInit(String),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// One heatmap cell, serialized as `[x, y, level]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapPoint(pub u32, pub u32, pub u32);

/// A visitor leaving an area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub area: u32,
    pub visitor_id: u64,
    pub time_in: String,
    pub time_out: String,
    /// Seconds spent in the area
    pub duration: f64,
}

/// Visit identifier: `YYYYMMDD_<visitor id>_<area>`
pub fn visit_noid(date: NaiveDate, visitor_id: u64, area: u32) -> String {
    format!("{}_{}_{}", date.format("%Y%m%d"), visitor_id, area)
}

/// Totals stored by the backend, used to continue today's numbering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitData {
    pub count_today: u64,
    /// Next free visitor id per area
    pub next_ids: Vec<u64>,
}

impl InitData {
    /// Start of a fresh day
    pub fn fallback() -> Self {
        Self {
            count_today: 0,
            next_ids: vec![0; DEFAULT_AREA_COUNT],
        }
    }
}

/// Parse `[count_today, [noid, ...]]` as returned by the init endpoint.
///
/// Counts and ids only carry over when dated `today`.
pub fn parse_init_response(value: &serde_json::Value, today: NaiveDate) -> Result<InitData> {
    let invalid = |msg: &str| AnalyticsError::InvalidInit(msg.to_string());

    let items = value.as_array().ok_or_else(|| invalid("expected an array"))?;
    let count = items.first().ok_or_else(|| invalid("missing count"))?;
    let count = match count {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| invalid("count is not a non-negative integer"))?;

    let noids = items
        .get(1)
        .and_then(|v| v.as_array())
        .ok_or_else(|| invalid("missing noid list"))?
        .iter()
        .map(|v| v.as_str().ok_or_else(|| invalid("noid is not a string")))
        .collect::<Result<Vec<_>>>()?;

    // The first area's entry dates the running total
    let first = noids.first().ok_or_else(|| invalid("empty noid list"))?;
    let today_tag = today.format("%Y%m%d").to_string();
    let count_today = if noid_date(first) == Some(today_tag.as_str()) {
        count
    } else {
        0
    };

    let next_ids = noids
        .iter()
        .map(|noid| {
            if noid.is_empty() || noid_date(noid) != Some(today_tag.as_str()) {
                return Ok(0);
            }
            noid.split('_')
                .nth(1)
                .and_then(|id| id.parse::<u64>().ok())
                .map(|id| id + 1)
                .ok_or_else(|| invalid(&format!("malformed noid {:?}", noid)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(InitData {
        count_today,
        next_ids,
    })
}

fn noid_date(noid: &str) -> Option<&str> {
    noid.split('_').next().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 8).unwrap()
    }

    #[test]
    fn noid_format() {
        assert_eq!(visit_noid(day(), 17, 3), "20240608_17_3");
    }

    #[test]
    fn init_carries_over_todays_ids() {
        let value = json!([42, ["20240608_9_1", "", "20240607_5_3", "20240608_0_4"]]);
        let init = parse_init_response(&value, day()).unwrap();
        assert_eq!(init.count_today, 42);
        assert_eq!(init.next_ids, vec![10, 0, 0, 1]);
    }

    #[test]
    fn stale_first_area_resets_count() {
        let value = json!(["42", ["20240607_9_1", "20240608_2_2"]]);
        let init = parse_init_response(&value, day()).unwrap();
        assert_eq!(init.count_today, 0);
        assert_eq!(init.next_ids, vec![0, 3]);
    }

    #[test]
    fn malformed_responses_are_rejected() {
        assert!(parse_init_response(&json!({}), day()).is_err());
        assert!(parse_init_response(&json!([1, []]), day()).is_err());
        assert!(parse_init_response(&json!([1, ["20240608_x_1"]]), day()).is_err());
        assert_eq!(InitData::fallback().next_ids, vec![0; 8]);
    }
}
