use std::fmt::Write;

use reqwest::header::HeaderMap;

use crate::runner::CapturedRequest;
use crate::runner::CapturedResponse;
use crate::spec::LogDetail;

/// Prints request and response diagnostics as specifications ask for them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger {
    quiet: bool,
}

impl Logger {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn quiet() -> Self {
        Self { quiet: true }
    }

    pub fn setup(&self, message: &str) {
        println!("{}", console::style(format!("[SETUP] {message}")).bold().yellow());
    }

    pub fn request(&self, detail: Option<LogDetail>, request: &CapturedRequest) {
        if self.quiet {
            return;
        }
        if let Some(detail) = detail {
            print!("{}", render_request(detail, request));
        }
    }

    pub fn response(&self, details: &[LogDetail], scenario: &str, response: &CapturedResponse) {
        if self.quiet {
            return;
        }
        print!("{}", render_response(details, scenario, response));
    }
}

pub fn render_request(detail: LogDetail, request: &CapturedRequest) -> String {
    let mut out = String::new();
    let prefix = console::style("[REQUEST]").bold().cyan();

    let _ = writeln!(out, "{prefix} {}", request.scenario);
    if detail.includes(LogDetail::Method) {
        let _ = writeln!(out, "  Method:  {}", request.method);
    }
    if detail.includes(LogDetail::Uri) {
        let _ = writeln!(out, "  URI:     {}", request.url);
    }
    if detail.includes(LogDetail::Headers) {
        let _ = writeln!(out, "  Headers:");
        write_headers(&mut out, &request.headers);
    }
    if detail.includes(LogDetail::Body) {
        let body = request
            .body
            .as_ref()
            .map(|b| serde_json::to_string_pretty(b).unwrap_or_default())
            .unwrap_or_else(|| "<none>".into());
        let _ = writeln!(out, "  Body:    {body}");
    }

    out
}

pub fn render_response(details: &[LogDetail], scenario: &str, response: &CapturedResponse) -> String {
    let mut out = String::new();
    let prefix = console::style("[RESPONSE]").bold().magenta();
    let wants = |part| details.iter().any(|d| d.includes(part));

    let _ = writeln!(out, "{prefix} {scenario}");
    if wants(LogDetail::Status) {
        let _ = writeln!(out, "  Status:  {}", response.status);
    }
    if wants(LogDetail::Headers) {
        let _ = writeln!(out, "  Headers:");
        write_headers(&mut out, &response.headers);
    }
    if wants(LogDetail::Body) {
        let body = match &response.body_json {
            Some(json) => serde_json::to_string_pretty(json).unwrap_or_default(),
            None => response.body_text.clone(),
        };
        let _ = writeln!(out, "  Body:    {body}");
    }

    out
}

fn write_headers(out: &mut String, headers: &HeaderMap) {
    for (k, v) in headers.iter() {
        let value = v.to_str().unwrap_or("<invalid utf8>");
        let _ = writeln!(out, "    {}: {}", console::style(k.as_str()).yellow(), value);
    }
}
