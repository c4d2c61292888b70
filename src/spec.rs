use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use thiserror::Error;

use crate::filter::Filter;

pub const CREATE_USER: &str = "create_user";
pub const REGISTER: &str = "register";

pub const CREATED: &str = "created";
pub const OK: &str = "ok";
pub const BAD_REQUEST: &str = "bad_request";

pub const JSON: &str = "application/json";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("a response specification requires an expected status code")]
    MissingStatus,

    #[error("invalid expected status code {0}, it must be within 100..=599")]
    InvalidStatus(i32),

    #[error("invalid content type `{0}`")]
    InvalidContentType(String),

    #[error("no request specification named `{0}`")]
    UnknownRequestSpec(String),

    #[error("no response specification named `{0}`")]
    UnknownResponseSpec(String),

    #[error("unknown filter `{0}`")]
    UnknownFilter(String),

    #[error("`status` can only be logged for responses")]
    StatusLogOnRequest,

    #[error("unknown log detail `{0}`, expected one of all, method, uri, headers, body, status")]
    UnknownLogDetail(String),

    #[error("scenario `{scenario}` has a body that cannot be encoded: {message}")]
    InvalidBody { scenario: String, message: String },
}

/// Which parts of a request or response get logged when a specification is
/// applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDetail {
    All,
    Method,
    Uri,
    Headers,
    Body,
    Status,
}

impl LogDetail {
    pub fn includes(self, part: LogDetail) -> bool {
        self == LogDetail::All || self == part
    }
}

impl FromStr for LogDetail {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(LogDetail::All),
            "method" => Ok(LogDetail::Method),
            "uri" => Ok(LogDetail::Uri),
            "headers" => Ok(LogDetail::Headers),
            "body" => Ok(LogDetail::Body),
            "status" => Ok(LogDetail::Status),
            _ => Err(SpecError::UnknownLogDetail(s.to_string())),
        }
    }
}

impl fmt::Display for LogDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogDetail::All => "all",
            LogDetail::Method => "method",
            LogDetail::Uri => "uri",
            LogDetail::Headers => "headers",
            LogDetail::Body => "body",
            LogDetail::Status => "status",
        };
        write!(f, "{s}")
    }
}

/// Shape shared by every request of one endpoint family.
#[derive(Debug, Clone)]
pub struct RequestSpecification {
    headers: HeaderMap,
    log: Option<LogDetail>,
    filters: Vec<Arc<dyn Filter>>,
}

impl RequestSpecification {
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.headers.get(CONTENT_TYPE)
    }

    pub fn log(&self) -> Option<LogDetail> {
        self.log
    }

    pub fn filters(&self) -> &[Arc<dyn Filter>] {
        &self.filters
    }

    /// Adds `headers` to the specification. Headers already present on the
    /// specification are kept with all their values.
    pub fn with_base_headers(mut self, headers: &HeaderMap) -> Self {
        let mut merged = headers.clone();
        for key in self.headers.keys() {
            merged.remove(key);
        }
        for (key, value) in self.headers.iter() {
            merged.append(key.clone(), value.clone());
        }
        self.headers = merged;
        self
    }

    /// Adds `headers` to the specification. A header named in `headers`
    /// replaces every existing value of that header.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        let mut current = None;
        for (key, value) in headers {
            // Extra values of the same header come without a key
            match key {
                Some(key) => {
                    self.headers.insert(key.clone(), value);
                    current = Some(key);
                }
                None => {
                    if let Some(key) = &current {
                        self.headers.append(key.clone(), value);
                    }
                }
            }
        }
        self
    }
}

/// Expected outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSpecification {
    status: StatusCode,
    log: Vec<LogDetail>,
    log_if_validation_fails: bool,
}

impl ResponseSpecification {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn log(&self) -> &[LogDetail] {
        &self.log
    }

    /// Restricts response logging to responses that fail validation.
    pub fn log_if_validation_fails(mut self, only_on_failure: bool) -> Self {
        self.log_if_validation_fails = only_on_failure;
        self
    }

    pub fn should_log(&self, validation_failed: bool) -> bool {
        !self.log.is_empty() && (!self.log_if_validation_fails || validation_failed)
    }
}

pub fn build_request_spec(
    content_type: &str,
    log: Option<LogDetail>,
    filters: Vec<Arc<dyn Filter>>,
) -> Result<RequestSpecification, SpecError> {
    if log == Some(LogDetail::Status) {
        return Err(SpecError::StatusLogOnRequest);
    }

    let value = HeaderValue::from_str(content_type)
        .map_err(|_| SpecError::InvalidContentType(content_type.to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, value);

    Ok(RequestSpecification {
        headers,
        log,
        filters,
    })
}

pub fn build_response_spec(
    expected_status: Option<i32>,
    log: &[LogDetail],
) -> Result<ResponseSpecification, SpecError> {
    let status = expected_status.ok_or(SpecError::MissingStatus)?;

    if !(100..=599).contains(&status) {
        return Err(SpecError::InvalidStatus(status));
    }

    let status = StatusCode::from_u16(status as u16).map_err(|_| SpecError::InvalidStatus(status))?;

    Ok(ResponseSpecification {
        status,
        log: log.to_vec(),
        log_if_validation_fails: false,
    })
}

/// The named specification pairs scenarios are built from.
///
/// A registry is assembled once, then shared behind an `Arc`. The `with_*`
/// methods consume the registry so nothing can change it after that point.
#[derive(Debug, Clone, Default)]
pub struct SpecRegistry {
    requests: HashMap<String, RequestSpecification>,
    responses: HashMap<String, ResponseSpecification>,
}

impl SpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pairs used by the reqres suite: JSON request specs for user
    /// creation and registration, and the 201, 200 and 400 expectations.
    pub fn reqres_defaults(filters: Vec<Arc<dyn Filter>>) -> Result<Self, SpecError> {
        let body_and_status = [LogDetail::Status, LogDetail::Body];

        Ok(Self::new()
            .with_request(
                CREATE_USER,
                build_request_spec(JSON, Some(LogDetail::All), filters.clone())?,
            )
            .with_request(
                REGISTER,
                build_request_spec(JSON, Some(LogDetail::All), filters)?,
            )
            .with_response(CREATED, build_response_spec(Some(201), &body_and_status)?)
            .with_response(OK, build_response_spec(Some(200), &body_and_status)?)
            .with_response(
                BAD_REQUEST,
                build_response_spec(Some(400), &body_and_status)?,
            ))
    }

    pub fn with_request(mut self, name: &str, spec: RequestSpecification) -> Self {
        self.requests.insert(name.to_string(), spec);
        self
    }

    pub fn with_response(mut self, name: &str, spec: ResponseSpecification) -> Self {
        self.responses.insert(name.to_string(), spec);
        self
    }

    /// Applies `headers` to every request specification without overriding
    /// what a specification sets itself.
    pub fn with_global_headers(mut self, headers: &HeaderMap) -> Self {
        self.requests = self
            .requests
            .into_iter()
            .map(|(name, spec)| (name, spec.with_base_headers(headers)))
            .collect();
        self
    }

    pub fn request(&self, name: &str) -> Result<&RequestSpecification, SpecError> {
        self.requests
            .get(name)
            .ok_or_else(|| SpecError::UnknownRequestSpec(name.to_string()))
    }

    pub fn response(&self, name: &str) -> Result<&ResponseSpecification, SpecError> {
        self.responses
            .get(name)
            .ok_or_else(|| SpecError::UnknownResponseSpec(name.to_string()))
    }
}
