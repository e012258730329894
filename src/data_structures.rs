use crate::catalog::ScreenerCatalog;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

// --- Core Data Structures ---

/// One result row exactly as the screening service returned it.
pub type RawResultRow = Map<String, Value>;

/// A single cell value passed through from the service untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scalar(pub Value);

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            Value::Null => Ok(()),
            other => write!(f, "{}", other),
        }
    }
}

impl From<Value> for Scalar {
    fn from(value: Value) -> Self {
        Scalar(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRow {
    pub stock_name: Scalar,
    pub percent_change: Scalar,
    pub current_price: Scalar,
    pub trade_volume: Scalar,
    pub rank: Scalar,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub rows: Vec<NormalizedRow>,
    pub fetched_at: DateTime<Utc>,
    pub source_screener_id: String,
}

impl ScanResult {
    pub fn fetched_at_in(&self, tz: Tz) -> String {
        self.fetched_at
            .with_timezone(&tz)
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string()
    }
}

// --- Type Aliases for Shared State ---

pub type SharedCatalog = Arc<ScreenerCatalog>;
