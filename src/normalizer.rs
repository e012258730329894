use crate::data_structures::{NormalizedRow, RawResultRow, Scalar};
use tracing::debug;

pub const REQUIRED_FIELDS: [&str; 5] = ["nsecode", "per_chg", "close", "volume", "sr"];

/// Source key → field name used by the HTML view.
pub const VIEW_COLUMNS: [(&str, &str); 5] = [
    ("nsecode", "stock_name"),
    ("per_chg", "percent_change"),
    ("close", "current_price"),
    ("volume", "trade_volume"),
    ("sr", "rank"),
];

/// Source key → CSV header label, in export column order.
pub const EXPORT_COLUMNS: [(&str, &str); 5] = [
    ("sr", "Rank"),
    ("nsecode", "Stock Symbol"),
    ("per_chg", "Percent Change"),
    ("close", "Current Price"),
    ("volume", "Trade Volume"),
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer flush failed: {0}")]
    Flush(String),
}

/// Keeps rows that carry every required key and renames them. Order is kept
/// as received; the service already ranks its output.
pub fn normalize(raw_rows: Vec<RawResultRow>) -> Vec<NormalizedRow> {
    let total = raw_rows.len();
    let rows: Vec<NormalizedRow> = raw_rows.into_iter().filter_map(normalize_row).collect();
    debug!(total, kept = rows.len(), dropped = total - rows.len(), "Normalized result rows");
    rows
}

fn normalize_row(mut raw: RawResultRow) -> Option<NormalizedRow> {
    if !REQUIRED_FIELDS.iter().all(|key| raw.contains_key(*key)) {
        return None;
    }
    let mut take = |key: &str| raw.remove(key).map(Scalar::from);
    Some(NormalizedRow {
        stock_name: take(VIEW_COLUMNS[0].0)?,
        percent_change: take(VIEW_COLUMNS[1].0)?,
        current_price: take(VIEW_COLUMNS[2].0)?,
        trade_volume: take(VIEW_COLUMNS[3].0)?,
        rank: take(VIEW_COLUMNS[4].0)?,
    })
}

impl NormalizedRow {
    fn field(&self, source_key: &str) -> Option<&Scalar> {
        match source_key {
            "nsecode" => Some(&self.stock_name),
            "per_chg" => Some(&self.percent_change),
            "close" => Some(&self.current_price),
            "volume" => Some(&self.trade_volume),
            "sr" => Some(&self.rank),
            _ => None,
        }
    }

    /// Cells in `EXPORT_COLUMNS` order.
    pub fn export_record(&self) -> Vec<String> {
        EXPORT_COLUMNS
            .iter()
            .map(|(key, _)| self.field(key).map(ToString::to_string).unwrap_or_default())
            .collect()
    }
}

pub fn to_csv(rows: &[NormalizedRow]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(EXPORT_COLUMNS.iter().map(|(_, label)| *label))?;
    for row in rows {
        writer.write_record(row.export_record())?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Flush(e.error().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn raw(value: Value) -> RawResultRow {
        match value {
            Value::Object(map) => map,
            _ => panic!("test row must be an object"),
        }
    }

    fn chartink_row(symbol: &str, rank: u64) -> RawResultRow {
        raw(json!({
            "sr": rank,
            "nsecode": symbol,
            "name": format!("{symbol} Ltd"),
            "bsecode": "500325",
            "per_chg": 1.25,
            "close": 250.5,
            "volume": 120000
        }))
    }

    #[test]
    fn test_normalize_renames_fields() {
        let rows = normalize(vec![chartink_row("RELIANCE", 1)]);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.stock_name, Scalar(json!("RELIANCE")));
        assert_eq!(row.percent_change, Scalar(json!(1.25)));
        assert_eq!(row.current_price, Scalar(json!(250.5)));
        assert_eq!(row.trade_volume, Scalar(json!(120000)));
        assert_eq!(row.rank, Scalar(json!(1)));

        let serialized = serde_json::to_value(row).unwrap();
        for (_, view_name) in VIEW_COLUMNS {
            assert!(serialized.get(view_name).is_some(), "missing {view_name}");
        }
    }

    #[test]
    fn test_normalize_drops_incomplete_rows_and_keeps_order() {
        let mut no_volume = chartink_row("TCS", 2);
        no_volume.remove("volume");
        let mut no_rank = chartink_row("INFY", 4);
        no_rank.remove("sr");

        let input = vec![
            chartink_row("ZOMATO", 3),
            no_volume,
            chartink_row("ABB", 1),
            no_rank,
            chartink_row("MRF", 5),
        ];
        let names: Vec<String> = normalize(input)
            .iter()
            .map(|r| r.stock_name.to_string())
            .collect();
        assert_eq!(names, vec!["ZOMATO", "ABB", "MRF"]);
    }

    #[test]
    fn test_null_value_still_counts_as_present() {
        let mut row = chartink_row("HDFC", 1);
        row.insert("per_chg".to_string(), Value::Null);
        let rows = normalize(vec![row]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].percent_change.to_string(), "");
    }

    #[test]
    fn test_csv_matches_export_layout() {
        let rows = vec![NormalizedRow {
            stock_name: Scalar(json!("ABC")),
            percent_change: Scalar(json!(5.2)),
            current_price: Scalar(json!(101.5)),
            trade_volume: Scalar(json!(20000)),
            rank: Scalar(json!(1)),
        }];
        let csv = String::from_utf8(to_csv(&rows).unwrap()).unwrap();
        assert_eq!(
            csv,
            "Rank,Stock Symbol,Percent Change,Current Price,Trade Volume\n1,ABC,5.2,101.5,20000\n"
        );
    }

    #[test]
    fn test_csv_quotes_when_needed() {
        let rows = vec![NormalizedRow {
            stock_name: Scalar(json!("M&M, LTD")),
            percent_change: Scalar(json!(-0.4)),
            current_price: Scalar(json!("1,234.5")),
            trade_volume: Scalar(json!(10)),
            rank: Scalar(json!(2)),
        }];
        let csv = String::from_utf8(to_csv(&rows).unwrap()).unwrap();
        assert!(csv.ends_with("2,\"M&M, LTD\",-0.4,\"1,234.5\",10\n"));
    }

    #[test]
    fn test_csv_without_rows_is_header_only() {
        let csv = String::from_utf8(to_csv(&[]).unwrap()).unwrap();
        assert_eq!(csv, "Rank,Stock Symbol,Percent Change,Current Price,Trade Volume\n");
    }
}
