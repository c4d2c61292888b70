use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use flume::SendError;
use flume::Sender;
use futures::future::join_all;
use reqwest::Client;
use reqwest::Method;
use reqwest::Response;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use thiserror::Error;

use crate::log::Logger;
use crate::scenario::Scenario;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("channel error")]
    ChannelError(#[from] SendError<RunnerResult>),
}

/// Raw result of sending one scenario's request.
#[derive(Debug)]
pub struct RunnerResult {
    pub scenario: Arc<Scenario>,
    pub request: CapturedRequest,
    pub response: Option<CapturedResponse>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub scenario: String,
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body_text: String,
    pub body_json: Option<serde_json::Value>,
    pub elapsed: Duration,
}

impl CapturedResponse {
    /// Reads the whole body. A body that cannot be read fails like the
    /// request itself.
    pub async fn from_response(resp: Response, started: Instant) -> Result<Self, reqwest::Error> {
        let status = resp.status();
        let headers = resp.headers().clone();

        // Consume the body exactly once
        let body_text = resp.text().await?;
        let body_json = serde_json::from_str::<serde_json::Value>(&body_text).ok();

        Ok(Self {
            status,
            headers,
            body_text,
            body_json,
            elapsed: started.elapsed(),
        })
    }
}

/// Sends every scenario and forwards the raw results to the asserter.
/// Scenarios run one after another unless `parallel` is set, in which case
/// results arrive in completion order. A scenario whose task dies is
/// forwarded as a failed request.
pub async fn run_scenarios(
    scenarios: Vec<Arc<Scenario>>,
    client: Client,
    base_url: String,
    tx: Sender<RunnerResult>,
    logger: Logger,
    parallel: bool,
) -> Result<(), RunnerError> {
    if !parallel {
        for scenario in scenarios {
            let result = send_scenario(&client, &base_url, scenario, &logger).await;
            tx.send_async(result).await?;
        }
        return Ok(());
    }

    let mut handles = vec![];

    for scenario in scenarios {
        let client = client.clone();
        let base_url = base_url.clone();
        let task_scenario = scenario.clone();

        let handle = tokio::spawn(async move {
            send_scenario(&client, &base_url, task_scenario, &logger).await
        });

        handles.push((scenario, handle));
    }

    let (scenarios, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();

    for (scenario, result) in scenarios.into_iter().zip(join_all(handles).await) {
        let result = match result {
            Ok(result) => result,
            Err(e) => RunnerResult {
                request: captured_request(&base_url, &scenario),
                scenario,
                response: None,
                error: Some(format!("scenario task failed: {e}")),
            },
        };
        tx.send_async(result).await?;
    }

    Ok(())
}

fn captured_request(base_url: &str, scenario: &Scenario) -> CapturedRequest {
    CapturedRequest {
        scenario: scenario.name.clone(),
        method: scenario.method.clone(),
        url: format!("{}{}", base_url.trim_end_matches('/'), scenario.path),
        headers: scenario.request_spec.headers().clone(),
        body: scenario.body.clone(),
    }
}

/// Performs the single request of a scenario. Filters on the request
/// specification see the request before it is sent and the response or
/// error after.
pub async fn send_scenario(
    client: &Client,
    base_url: &str,
    scenario: Arc<Scenario>,
    logger: &Logger,
) -> RunnerResult {
    let spec = &scenario.request_spec;
    let request = captured_request(base_url, &scenario);

    logger.request(spec.log(), &request);
    for filter in spec.filters() {
        filter.on_request(&request);
    }

    let builder = client
        .request(scenario.method.clone(), &request.url)
        .headers(spec.headers().clone());

    // `json` would overwrite the content type chosen by the specification
    let builder = match &scenario.body {
        Some(body) => builder.body(body.to_string()),
        None => builder,
    };

    let started = Instant::now();
    let response = match builder.send().await {
        Ok(resp) => CapturedResponse::from_response(resp, started).await,
        Err(err) => Err(err),
    };

    match response {
        Ok(response) => {
            for filter in spec.filters() {
                filter.on_response(&request, &response);
            }

            RunnerResult {
                scenario,
                request,
                response: Some(response),
                error: None,
            }
        }
        Err(err) => {
            let error = err.to_string();
            for filter in spec.filters() {
                filter.on_error(&request, &error);
            }

            RunnerResult {
                scenario,
                request,
                response: None,
                error: Some(error),
            }
        }
    }
}
