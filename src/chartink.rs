use crate::config::AppConfig;
use crate::data_structures::{RawResultRow, ScanResult, SharedCatalog};
use crate::normalizer::normalize;
use chrono::Utc;
use rand::seq::IndexedRandom;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const CSRF_HEADER: &str = "x-csrf-token";
const SCAN_CLAUSE_FIELD: &str = "scan_clause";

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to build HTTP session: {0}")]
    Session(#[source] reqwest::Error),
    #[error("request to screening service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("screening service responded with status {0}")]
    Status(StatusCode),
    #[error("screening service returned invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),
}

impl ScanError {
    /// Short, stable label for logs and user-facing messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::Session(_) => "session",
            ScanError::Transport(_) => "transport",
            ScanError::Status(_) => "status",
            ScanError::Parse(_) => "parse",
            ScanError::UnexpectedShape(_) => "unexpected_shape",
        }
    }
}

/// Runs catalog screeners against the screening service.
pub struct ScanDispatcher {
    catalog: SharedCatalog,
    endpoint: String,
    timeout: Option<Duration>,
    user_agents: Vec<String>,
    random_agent: bool,
}

impl ScanDispatcher {
    pub fn new(catalog: SharedCatalog, config: &AppConfig) -> Self {
        let user_agents = vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Safari/605.1.15".to_string(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0".to_string(),
        ];

        Self {
            catalog,
            endpoint: config.screener_endpoint.clone(),
            timeout: config.http_timeout,
            user_agents,
            random_agent: config.random_agent,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn get_user_agent(&self) -> &str {
        let chosen = if self.random_agent {
            self.user_agents.choose(&mut rand::rng())
        } else {
            self.user_agents.first()
        };
        chosen.map(String::as_str).unwrap_or_default()
    }

    // One client per scan so the cookie jar lives exactly as long as the GET/POST pair.
    fn open_session(&self) -> Result<Client, ScanError> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .user_agent(self.get_user_agent());
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().map_err(ScanError::Session)
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn run_scan(&self, screener_id: &str) -> Result<ScanResult, ScanError> {
        let form: Vec<(&str, &str)> = match self.catalog.get_definition(screener_id) {
            Some(definition) => {
                debug!(name = %definition.display_name, "Resolved screener");
                vec![(SCAN_CLAUSE_FIELD, definition.query_string.as_str())]
            }
            None => {
                warn!("Unknown screener id; posting an empty scan");
                Vec::new()
            }
        };

        let session = self.open_session()?;

        let page = session.get(&self.endpoint).send().await?.text().await?;
        let token = extract_csrf_token(&page);
        debug!(has_token = token.is_some(), "Fetched screener page");

        let mut request = session.post(&self.endpoint).form(&form);
        match &token {
            Some(token) => request = request.header(CSRF_HEADER, token.as_str()),
            None => warn!("No csrf-token meta tag found; posting without anti-forgery header"),
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status(status));
        }

        let body = response.text().await?;
        let raw_rows = extract_rows(&body)?;
        let rows = normalize(raw_rows);

        info!(rows = rows.len(), "Scan completed");
        Ok(ScanResult {
            rows,
            fetched_at: Utc::now(),
            source_screener_id: screener_id.to_string(),
        })
    }
}

pub fn extract_csrf_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"meta[name="csrf-token"]"#).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(str::to_string)
}

/// Pulls the `data` array out of a scan response. Non-object entries are
/// dropped along with incomplete rows later on.
pub fn extract_rows(body: &str) -> Result<Vec<RawResultRow>, ScanError> {
    let response: Value = serde_json::from_str(body)?;

    let data = response
        .get("data")
        .ok_or_else(|| ScanError::UnexpectedShape("missing 'data' field".to_string()))?;
    let entries = data
        .as_array()
        .ok_or_else(|| ScanError::UnexpectedShape("'data' is not an array".to_string()))?;

    Ok(entries
        .iter()
        .filter_map(|entry| entry.as_object().cloned())
        .collect())
}
