use std::collections::BTreeMap;
use std::path::Path;

use chrono::DateTime;
use chrono::Utc;
use reqwest::header::HeaderMap;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::filter::Exchange;
use crate::scenario::ScenarioOutcome;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The JSON document written by `--report`.
#[derive(Debug, Serialize)]
pub struct Report {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub base_url: String,
    pub passed: usize,
    pub failed: usize,
    pub scenarios: Vec<ScenarioOutcome>,
    pub exchanges: Vec<ExchangeRecord>,
}

#[derive(Debug, Serialize)]
pub struct ExchangeRecord {
    pub scenario: String,
    pub method: String,
    pub url: String,
    pub request_headers: BTreeMap<String, Vec<String>>,
    pub request_body: Option<serde_json::Value>,
    pub status: Option<u16>,
    pub response_headers: BTreeMap<String, Vec<String>>,
    pub response_body: Option<String>,
    pub elapsed_ms: Option<u64>,
    pub error: Option<String>,
}

impl From<&Exchange> for ExchangeRecord {
    fn from(exchange: &Exchange) -> Self {
        let response = exchange.response.as_ref();

        Self {
            scenario: exchange.request.scenario.clone(),
            method: exchange.request.method.to_string(),
            url: exchange.request.url.clone(),
            request_headers: header_record(&exchange.request.headers),
            request_body: exchange.request.body.clone(),
            status: response.map(|r| r.status.as_u16()),
            response_headers: response
                .map(|r| header_record(&r.headers))
                .unwrap_or_default(),
            response_body: response.map(|r| r.body_text.clone()),
            elapsed_ms: response.map(|r| r.elapsed.as_millis() as u64),
            error: exchange.error.clone(),
        }
    }
}

impl Report {
    pub fn new(
        started_at: DateTime<Utc>,
        base_url: &str,
        scenarios: Vec<ScenarioOutcome>,
        exchanges: &[Exchange],
    ) -> Self {
        let passed = scenarios.iter().filter(|s| s.passed()).count();

        Self {
            run_id: Uuid::new_v4(),
            started_at,
            base_url: base_url.to_string(),
            passed,
            failed: scenarios.len() - passed,
            scenarios,
            exchanges: exchanges.iter().map(ExchangeRecord::from).collect(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn header_record(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut record: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (k, v) in headers {
        record
            .entry(k.as_str().to_string())
            .or_default()
            .push(v.to_str().unwrap_or("<invalid utf8>").to_string());
    }
    record
}
