use crate::chartink::{ScanDispatcher, ScanError};
use crate::catalog::ScreenerCatalog;
use crate::config::SharedConfig;
use crate::data_structures::{ScanResult, SharedCatalog};
use crate::normalizer::to_csv;
use crate::templates::{IndexTemplate, ScreenerOption};
use askama::Template;
use axum::{
    extract::{rejection::FormRejection, Form, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use chrono_tz::Tz;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

pub type SharedDispatcher = Arc<ScanDispatcher>;

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScanForm {
    pub screener_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub screener_name: Option<String>,
}

/// Where a single view request ended up. Every request starts at `Idle`.
#[derive(Debug)]
pub enum ViewState {
    Idle,
    ResultsReady(ScanResult),
    ResultsEmpty,
}

#[instrument(skip(catalog, config))]
pub async fn index_handler(
    State(catalog): State<SharedCatalog>,
    State(config): State<SharedConfig>,
    Query(query): Query<CategoryQuery>,
) -> Response {
    debug!("Received catalog view request");
    let page = build_page(&catalog, config.display_timezone, query.category, None, ViewState::Idle);
    render_page(page)
}

#[instrument(skip(catalog, dispatcher, config, form))]
pub async fn scan_handler(
    State(catalog): State<SharedCatalog>,
    State(dispatcher): State<SharedDispatcher>,
    State(config): State<SharedConfig>,
    Query(query): Query<CategoryQuery>,
    form: Result<Form<ScanForm>, FormRejection>,
) -> Response {
    let screener = form
        .ok()
        .and_then(|Form(form)| form.screener_name)
        .filter(|id| !id.is_empty());

    let page = render_view(&catalog, &dispatcher, config.display_timezone, query.category, screener).await;
    render_page(page)
}

#[instrument(skip(dispatcher, config))]
pub async fn download_handler(
    State(dispatcher): State<SharedDispatcher>,
    State(config): State<SharedConfig>,
    Query(query): Query<DownloadQuery>,
) -> Response {
    let screener_id = query
        .screener_name
        .unwrap_or_else(|| config.default_download_screener.clone());
    render_download(&dispatcher, &screener_id).await
}

/// Runs the scan (when a screener was picked) and builds the page model.
pub async fn render_view(
    catalog: &ScreenerCatalog,
    dispatcher: &ScanDispatcher,
    tz: Tz,
    selected_category: Option<String>,
    selected_screener: Option<String>,
) -> IndexTemplate {
    let state = match selected_screener.as_deref() {
        Some(id) => match dispatcher.run_scan(id).await {
            Ok(result) => ViewState::ResultsReady(result),
            Err(e) => {
                error!(screener = id, kind = e.kind(), error = %e, "Scan failed; showing empty results");
                ViewState::ResultsEmpty
            }
        },
        None => ViewState::Idle,
    };

    build_page(catalog, tz, selected_category, selected_screener, state)
}

pub fn build_page(
    catalog: &ScreenerCatalog,
    tz: Tz,
    selected_category: Option<String>,
    selected_screener: Option<String>,
    state: ViewState,
) -> IndexTemplate {
    let screeners = catalog
        .list_by_category(selected_category.as_deref())
        .into_iter()
        .map(|s| ScreenerOption {
            id: s.id.clone(),
            name: s.display_name.clone(),
        })
        .collect();

    let selected_screener_name = selected_screener
        .as_deref()
        .and_then(|id| catalog.get_definition(id))
        .map(|s| s.display_name.clone())
        .unwrap_or_default();

    let (stock_list, last_updated) = match state {
        ViewState::Idle => (None, String::new()),
        ViewState::ResultsReady(result) => {
            let fetched = result.fetched_at_in(tz);
            (Some(result.rows), fetched)
        }
        ViewState::ResultsEmpty => (Some(Vec::new()), String::new()),
    };

    IndexTemplate {
        screeners,
        categories: catalog.category_labels(),
        selected_category: selected_category.unwrap_or_default(),
        selected_screener: selected_screener.unwrap_or_default(),
        selected_screener_name,
        stock_list,
        last_updated,
    }
}

fn render_page(page: IndexTemplate) -> Response {
    match page.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render index template");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}

pub async fn render_download(dispatcher: &ScanDispatcher, screener_id: &str) -> Response {
    let result = match dispatcher.run_scan(screener_id).await {
        Ok(result) => result,
        Err(e) => {
            error!(screener = screener_id, kind = e.kind(), error = %e, "CSV download failed");
            return (StatusCode::OK, download_error_message(&e)).into_response();
        }
    };

    match to_csv(&result.rows) {
        Ok(body) => {
            info!(screener = screener_id, rows = result.rows.len(), "Serving CSV download");
            let disposition = format!(
                "attachment; filename=\"{}_stocks.csv\"",
                sanitize_filename(screener_id)
            );
            (
                [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response()
        }
        Err(e) => {
            error!(screener = screener_id, error = %e, "Failed to build CSV");
            (StatusCode::OK, "Error downloading CSV: could not build the file").into_response()
        }
    }
}

pub fn download_error_message(error: &ScanError) -> String {
    let reason = match error {
        ScanError::Session(_) | ScanError::Transport(_) => {
            "screening service unreachable".to_string()
        }
        ScanError::Status(status) => {
            format!("screening service rejected the request (status {})", status.as_u16())
        }
        ScanError::Parse(_) | ScanError::UnexpectedShape(_) => {
            "screening service returned an unexpected response".to_string()
        }
    };
    format!("Error downloading CSV: {reason}")
}

// Header values cannot carry quotes or control characters.
fn sanitize_filename(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "screener".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::{NormalizedRow, Scalar};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn catalog() -> ScreenerCatalog {
        ScreenerCatalog::built_in().unwrap()
    }

    fn row(symbol: &str, rank: u64) -> NormalizedRow {
        NormalizedRow {
            stock_name: Scalar(json!(symbol)),
            percent_change: Scalar(json!(3.4)),
            current_price: Scalar(json!(512.75)),
            trade_volume: Scalar(json!(88000)),
            rank: Scalar(json!(rank)),
        }
    }

    #[test]
    fn test_idle_page_lists_category() {
        let page = build_page(
            &catalog(),
            chrono_tz::Asia::Kolkata,
            Some("IPO Base".to_string()),
            None,
            ViewState::Idle,
        );
        let ids: Vec<&str> = page.screeners.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["ipo_1_year", "ipo_3_years", "momentum_compression"]);
        assert_eq!(page.categories, vec!["Tradable Universe", "IPO Base"]);
        assert!(page.stock_list.is_none());
        assert!(page.last_updated.is_empty());
        assert_eq!(page.selected_screener_name, "");
    }

    #[test]
    fn test_ready_page_carries_rows_and_local_time() {
        let result = ScanResult {
            rows: vec![row("ABB", 1), row("TRENT", 2)],
            fetched_at: Utc.with_ymd_and_hms(2024, 6, 3, 10, 15, 0).unwrap(),
            source_screener_id: "minervini_stage_2".to_string(),
        };
        let page = build_page(
            &catalog(),
            chrono_tz::Asia::Kolkata,
            None,
            Some("minervini_stage_2".to_string()),
            ViewState::ResultsReady(result),
        );
        assert_eq!(page.screeners.len(), 6);
        assert_eq!(page.selected_screener_name, "Minervini Stage 2 Stocks");
        assert_eq!(page.stock_list.as_ref().map(Vec::len), Some(2));
        assert_eq!(page.last_updated, "2024-06-03 15:45:00 IST");

        let html = page.render().unwrap();
        assert!(html.contains("Minervini Stage 2 Stocks"));
        assert!(html.contains("TRENT"));
        assert!(html.contains("/download?screener_name=minervini_stage_2"));
    }

    #[test]
    fn test_failed_scan_renders_empty_table() {
        let page = build_page(
            &catalog(),
            chrono_tz::Asia::Kolkata,
            Some("unknown-label".to_string()),
            Some("ipo_1_year".to_string()),
            ViewState::ResultsEmpty,
        );
        assert_eq!(page.stock_list, Some(Vec::new()));
        assert_eq!(page.screeners.len(), 6);
        let html = page.render().unwrap();
        assert!(html.contains("No stocks matched this screener."));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("ipo_1_year"), "ipo_1_year");
        assert_eq!(sanitize_filename("a\"b;c"), "a_b_c");
        assert_eq!(sanitize_filename(""), "screener");
    }

    #[test]
    fn test_download_error_message_names_failure_class() {
        let err = ScanError::Status(StatusCode::FORBIDDEN);
        assert_eq!(
            download_error_message(&err),
            "Error downloading CSV: screening service rejected the request (status 403)"
        );
        let err = ScanError::UnexpectedShape("missing 'data' field".to_string());
        assert!(download_error_message(&err).ends_with("unexpected response"));
    }
}
