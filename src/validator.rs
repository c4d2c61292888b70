use std::sync::Arc;

use miette::Diagnostic;
use miette::NamedSource;
use miette::SourceSpan;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use thiserror::Error;
use toml::Value;
use url::Url;

use crate::filter;
use crate::filter::Filter;
use crate::filter::ReportCapture;
use crate::parser::ReqresQuest;
use crate::parser::RequestSpecEntry;
use crate::parser::ResponseSpecEntry;
use crate::spec::JSON;
use crate::spec::LogDetail;
use crate::spec::SpecError;
use crate::spec::SpecRegistry;
use crate::spec::build_request_spec;
use crate::spec::build_response_spec;

const BASE_URL_ENDS_WITH: &str =
    "The base URL from setup can't end with a /, scenario paths start with one";

pub struct Validator {
    quest: ReqresQuest,
    toml_src: String,
    file_name: String,
}

/// Everything the suite needs from the configuration file.
#[derive(Debug)]
pub struct ValidatedConfig {
    pub base_url: String,
    pub registry: SpecRegistry,
}

#[derive(Debug, Error, Diagnostic)]
#[error("Invalid field `{field}`: {message}")]
pub struct ValidationError {
    pub(crate) field: String,
    pub(crate) message: String,
    #[source_code]
    pub(crate) src: Option<NamedSource<String>>,
    #[label("invalid value here")]
    pub(crate) span: Option<SourceSpan>,
}

macro_rules! validation_err {
    ($field:expr, $msg:expr, $self:expr, $span:expr) => {
        ValidationError {
            field: $field.to_string(),
            message: $msg.to_string(),
            src: Some(NamedSource::new(
                $self.file_name.clone(),
                $self.toml_src.clone(),
            )),
            span: $span,
        }
    };
}

impl Validator {
    pub fn new(quest: &ReqresQuest, toml_src: &str, file_name: &str) -> Self {
        Self {
            quest: quest.clone(),
            toml_src: toml_src.into(),
            file_name: file_name.into(),
        }
    }

    /// Builds the specification registry: the suite defaults, overridden by
    /// the entries of the file, with the global headers applied last.
    pub fn validate(&self, report: &ReportCapture) -> Result<ValidatedConfig, ValidationError> {
        let base_url = self.validate_base_url()?;
        let report: Arc<dyn Filter> = Arc::new(report.clone());

        let mut registry = SpecRegistry::reqres_defaults(vec![report.clone()])
            .map_err(|e| validation_err!("defaults", e, self, None))?;

        for (name, entry) in &self.quest.request_specs {
            registry = self.add_request_spec(registry, name, entry, &report)?;
        }

        for (name, entry) in &self.quest.response_specs {
            registry = self.add_response_spec(registry, name, entry)?;
        }

        let global = self.global_headers()?;

        Ok(ValidatedConfig {
            base_url,
            registry: registry.with_global_headers(&global),
        })
    }

    fn validate_base_url(&self) -> Result<String, ValidationError> {
        let base_url = &self.quest.setup.base_url;
        let span = find_span(base_url, &self.toml_src);

        if base_url.ends_with('/') {
            return Err(validation_err!("setup.base_url", BASE_URL_ENDS_WITH, self, span));
        }

        let url = Url::parse(base_url)
            .map_err(|e| validation_err!("setup.base_url", e, self, span))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(validation_err!(
                "setup.base_url",
                format!("Expected an http or https URL, got scheme `{}`", url.scheme()),
                self,
                span
            ));
        }

        Ok(base_url.clone())
    }

    fn global_headers(&self) -> Result<HeaderMap, ValidationError> {
        match &self.quest.global.headers {
            Some(value) => self.parse_headers(value, "global.headers"),
            None => Ok(HeaderMap::new()),
        }
    }

    fn add_request_spec(
        &self,
        registry: SpecRegistry,
        name: &str,
        entry: &RequestSpecEntry,
        report: &Arc<dyn Filter>,
    ) -> Result<SpecRegistry, ValidationError> {
        let field = format!("request_specs.{name}");
        let table_span = find_raw_span(&field, &self.toml_src);

        let log = match entry.log.as_deref() {
            None => Some(LogDetail::All),
            Some("none") => None,
            Some(detail) => {
                let span = find_span(detail, &self.toml_src);
                let parsed = detail
                    .parse::<LogDetail>()
                    .map_err(|e| validation_err!(format!("{field}.log"), e, self, span))?;

                if parsed == LogDetail::Status {
                    return Err(validation_err!(
                        format!("{field}.log"),
                        SpecError::StatusLogOnRequest,
                        self,
                        span
                    ));
                }
                Some(parsed)
            }
        };

        let filters = entry
            .filters
            .iter()
            .flatten()
            .map(|filter_name| match filter_name.as_str() {
                filter::REPORT => Ok(report.clone()),
                other => Err(validation_err!(
                    format!("{field}.filters"),
                    format!("unknown filter `{other}`, known filters: {}", filter::REPORT),
                    self,
                    find_span(other, &self.toml_src)
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let content_type = entry.content_type.as_deref().unwrap_or(JSON);
        let mut spec = build_request_spec(content_type, log, filters).map_err(|e| {
            validation_err!(
                format!("{field}.content_type"),
                e,
                self,
                find_span(content_type, &self.toml_src).or(table_span)
            )
        })?;

        if let Some(value) = &entry.headers {
            spec = spec.with_headers(self.parse_headers(value, &format!("{field}.headers"))?);
        }

        Ok(registry.with_request(name, spec))
    }

    fn add_response_spec(
        &self,
        registry: SpecRegistry,
        name: &str,
        entry: &ResponseSpecEntry,
    ) -> Result<SpecRegistry, ValidationError> {
        let field = format!("response_specs.{name}");
        let table_span = find_raw_span(&field, &self.toml_src);

        let log = entry
            .log
            .as_ref()
            .map(|log| log.items())
            .unwrap_or_default()
            .into_iter()
            .map(|detail| {
                detail.parse::<LogDetail>().map_err(|e| {
                    validation_err!(
                        format!("{field}.log"),
                        e,
                        self,
                        find_span(detail, &self.toml_src)
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let spec = build_response_spec(entry.status, &log)
            .map_err(|e| validation_err!(format!("{field}.status"), e, self, table_span))?
            .log_if_validation_fails(entry.log_if_validation_fails.unwrap_or(false));

        Ok(registry.with_response(name, spec))
    }

    /// Parses a table of header names to a string, or to a list of strings
    /// for a header sent more than once.
    fn parse_headers(&self, value: &Value, field: &str) -> Result<HeaderMap, ValidationError> {
        let table = value.as_table().ok_or_else(|| {
            validation_err!(
                field,
                format!("Expected a table for headers, got {value:?}"),
                self,
                find_raw_span(field, &self.toml_src)
            )
        })?;

        let mut headers = HeaderMap::new();

        for (key, value) in table {
            let header_field = format!("{field}.{key}");
            let key_span = find_raw_span(key, &self.toml_src);

            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                validation_err!(
                    header_field,
                    format!("Invalid header name `{key}`: {e}"),
                    self,
                    key_span
                )
            })?;

            let values = match value {
                Value::String(s) => vec![s.as_str()],
                Value::Array(items) => items
                    .iter()
                    .map(|item| item.as_str())
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| {
                        validation_err!(
                            header_field,
                            format!("Header values must be strings, got {value:?}"),
                            self,
                            key_span
                        )
                    })?,
                _ => {
                    return Err(validation_err!(
                        header_field,
                        format!("Header value must be a string or a list of strings, got {value:?}"),
                        self,
                        key_span
                    ));
                }
            };

            for v in values {
                let header_value = HeaderValue::from_str(v).map_err(|e| {
                    validation_err!(
                        header_field,
                        format!("Invalid header value for `{key}`: {e}"),
                        self,
                        find_span(v, &self.toml_src).or(key_span)
                    )
                })?;
                headers.append(name.clone(), header_value);
            }
        }

        Ok(headers)
    }
}

/// Finds a quoted string value.
fn find_span(needle: &str, toml_src: &str) -> Option<SourceSpan> {
    let pattern = format!("\"{}\"", needle);
    toml_src
        .find(&pattern)
        .map(|start| SourceSpan::new((start + 1).into(), needle.len()))
}

fn find_raw_span(needle: &str, toml_src: &str) -> Option<SourceSpan> {
    toml_src
        .find(needle)
        .map(|start| SourceSpan::new(start.into(), needle.len()))
}

#[cfg(test)]
mod test {
    use reqwest::StatusCode;
    use reqwest::header::ACCEPT;
    use reqwest::header::CONTENT_TYPE;

    use super::*;
    use crate::spec::BAD_REQUEST;
    use crate::spec::CREATED;
    use crate::spec::OK;
    use crate::spec::REGISTER;

    fn validate(src: &str) -> Result<ValidatedConfig, ValidationError> {
        let quest: ReqresQuest = toml::from_str(src).unwrap();
        Validator::new(&quest, src, "reqres_quest.toml").validate(&ReportCapture::new())
    }

    #[test]
    fn defaults_are_kept_without_overrides() {
        let config = validate(
            r#"
            [setup]
            base_url = "https://reqres.in/api"
        "#,
        )
        .unwrap();

        assert_eq!(config.base_url, "https://reqres.in/api");
        assert_eq!(
            config.registry.response(CREATED).unwrap().status(),
            StatusCode::CREATED
        );
        assert_eq!(config.registry.request(REGISTER).unwrap().filters().len(), 1);
    }

    #[test]
    fn entries_override_defaults_and_globals_apply() {
        let config = validate(
            r#"
            [setup]
            base_url = "https://reqres.in/api"

            [global]
            headers = { x-api-key = "reqres-free-v1", content-type = "text/plain" }

            [request_specs.register]
            log = "none"
            headers = { accept = "application/json" }

            [response_specs.bad_request]
            status = 422
            log = "body"
        "#,
        )
        .unwrap();

        let register = config.registry.request(REGISTER).unwrap();
        assert_eq!(register.log(), None);
        assert!(register.filters().is_empty());
        assert_eq!(register.headers().get(ACCEPT).unwrap(), "application/json");
        assert_eq!(register.headers().get("x-api-key").unwrap(), "reqres-free-v1");
        assert_eq!(register.headers().get(CONTENT_TYPE).unwrap(), "application/json");

        let bad_request = config.registry.response(BAD_REQUEST).unwrap();
        assert_eq!(bad_request.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(bad_request.log(), &[LogDetail::Body]);
        assert_eq!(config.registry.response(OK).unwrap().status(), StatusCode::OK);
    }

    #[test]
    fn missing_status_is_reported() {
        let err = validate(
            r#"
            [setup]
            base_url = "https://reqres.in/api"

            [response_specs.teapot]
            log = ["status"]
        "#,
        )
        .unwrap_err();

        assert_eq!(err.field, "response_specs.teapot.status");
        assert!(err.message.contains("expected status code"));
        assert!(err.span.is_some());
    }

    #[test]
    fn base_url_with_trailing_slash_is_rejected() {
        let err = validate(
            r#"
            [setup]
            base_url = "https://reqres.in/api/"
        "#,
        )
        .unwrap_err();

        assert_eq!(err.field, "setup.base_url");
        assert_eq!(err.message, BASE_URL_ENDS_WITH);
    }

    #[test]
    fn base_url_must_be_http() {
        let err = validate(
            r#"
            [setup]
            base_url = "ftp://reqres.in"
        "#,
        )
        .unwrap_err();

        assert!(err.message.contains("ftp"));
    }

    #[test]
    fn unknown_filter_is_rejected() {
        let err = validate(
            r#"
            [setup]
            base_url = "https://reqres.in/api"

            [request_specs.users]
            filters = ["allure"]
        "#,
        )
        .unwrap_err();

        assert_eq!(err.field, "request_specs.users.filters");
        assert!(err.message.contains("allure"));
    }

    #[test]
    fn unknown_log_detail_is_rejected() {
        let err = validate(
            r#"
            [setup]
            base_url = "https://reqres.in/api"

            [response_specs.ok]
            status = 200
            log = ["status", "cookies"]
        "#,
        )
        .unwrap_err();

        assert_eq!(err.field, "response_specs.ok.log");
    }

    #[test]
    fn unparsable_base_url_is_rejected() {
        let err = validate(
            r#"
            [setup]
            base_url = "reqres.in"
        "#,
        )
        .unwrap_err();

        assert_eq!(err.field, "setup.base_url");
        assert!(err.span.is_some());
    }

    #[test]
    fn status_log_is_rejected_for_requests() {
        let err = validate(
            r#"
            [setup]
            base_url = "https://reqres.in/api"

            [request_specs.register]
            log = "status"
        "#,
        )
        .unwrap_err();

        assert_eq!(err.field, "request_specs.register.log");
        assert_eq!(err.message, SpecError::StatusLogOnRequest.to_string());
        assert!(err.span.is_some());
    }

    #[test]
    fn headers_may_repeat() {
        let config = validate(
            r#"
            [setup]
            base_url = "https://reqres.in/api"

            [request_specs.register]
            headers = { cookie = ["a=1", "b=2"] }
        "#,
        )
        .unwrap();

        let register = config.registry.request(REGISTER).unwrap();
        let cookies: Vec<&str> = register
            .headers()
            .get_all("cookie")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }

    #[test]
    fn non_string_header_names_its_full_path() {
        let err = validate(
            r#"
            [setup]
            base_url = "https://reqres.in/api"

            [global]
            headers = { retries = 3 }
        "#,
        )
        .unwrap_err();

        assert_eq!(err.field, "global.headers.retries");
    }

    #[test]
    fn headers_must_be_a_table() {
        let err = validate(
            r#"
            [setup]
            base_url = "https://reqres.in/api"

            [global]
            headers = "x-api-key"
        "#,
        )
        .unwrap_err();

        assert_eq!(err.field, "global.headers");
    }

    #[test]
    fn invalid_header_name_is_pointed_at() {
        let err = validate(
            r#"
            [setup]
            base_url = "https://reqres.in/api"

            [request_specs.users]
            headers = { "bad header" = "x" }
        "#,
        )
        .unwrap_err();

        assert_eq!(err.field, "request_specs.users.headers.bad header");
        assert!(err.span.is_some());
    }
}
