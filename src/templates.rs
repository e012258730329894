use crate::data_structures::NormalizedRow;
use askama::Template;

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenerOption {
    pub id: String,
    pub name: String,
}

/// Page model for `/`. `stock_list` is `None` until a scan is requested and
/// `Some(vec![])` when the scan produced nothing.
#[derive(Template, Debug)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub screeners: Vec<ScreenerOption>,
    pub categories: Vec<String>,
    pub selected_category: String,
    pub selected_screener: String,
    pub selected_screener_name: String,
    pub stock_list: Option<Vec<NormalizedRow>>,
    /// Fetch time in the display timezone, empty when no scan ran.
    pub last_updated: String,
}
