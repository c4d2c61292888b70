use std::fmt;

use reqwest::Method;
use serde::Serialize;
use thiserror::Error;

use crate::model::ResponseModel;
use crate::spec::RequestSpecification;
use crate::spec::ResponseSpecification;
use crate::spec::SpecError;

/// One independent test case against the external API.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub title: String,
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub request_spec: RequestSpecification,
    pub response_spec: ResponseSpecification,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn post(
        name: &str,
        title: &str,
        path: &str,
        request_spec: &RequestSpecification,
        response_spec: &ResponseSpecification,
    ) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            method: Method::POST,
            path: path.to_string(),
            body: None,
            request_spec: request_spec.clone(),
            response_spec: response_spec.clone(),
            steps: vec![],
        }
    }

    pub fn body<T: Serialize>(mut self, body: &T) -> Result<Self, SpecError> {
        let value = serde_json::to_value(body).map_err(|e| SpecError::InvalidBody {
            scenario: self.name.clone(),
            message: e.to_string(),
        })?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn step(mut self, label: &str, expectation: Expectation) -> Self {
        self.steps.push(Step {
            label: label.to_string(),
            expectation,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub label: String,
    pub expectation: Expectation,
}

/// The output-model fields a step is allowed to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Name,
    Job,
    CreatedAt,
    Token,
    Error,
}

impl Field {
    pub fn value(self, model: &ResponseModel) -> Option<String> {
        match self {
            Field::Id => model.id.as_ref().map(ToString::to_string),
            Field::Name => model.name.clone(),
            Field::Job => model.job.clone(),
            Field::CreatedAt => model.created_at.clone(),
            Field::Token => model.token.clone(),
            Field::Error => model.error.clone(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Field::Id => "id",
            Field::Name => "name",
            Field::Job => "job",
            Field::CreatedAt => "createdAt",
            Field::Token => "token",
            Field::Error => "error",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    Equals(Field, String),
    Present(Field),
    NonEmpty(Field),
    /// Present and a valid RFC 3339 timestamp.
    Timestamp(Field),
}

impl Expectation {
    pub fn equals(field: Field, expected: &str) -> Self {
        Expectation::Equals(field, expected.to_string())
    }

    /// Ok carries what was observed, Err explains the mismatch.
    pub fn check(&self, model: &ResponseModel) -> Result<String, String> {
        match self {
            Expectation::Equals(field, expected) => match field.value(model) {
                Some(actual) if actual == *expected => Ok(format!("{field} is {actual:?}")),
                Some(actual) => Err(format!("expected {field} {expected:?}, got {actual:?}")),
                None => Err(format!("expected {field} {expected:?}, got nothing")),
            },
            Expectation::Present(field) => match field.value(model) {
                Some(actual) => Ok(format!("{field} is {actual:?}")),
                None => Err(format!("expected {field} to be present")),
            },
            Expectation::NonEmpty(field) => match field.value(model) {
                Some(actual) if !actual.is_empty() => Ok(format!("{field} is {actual:?}")),
                Some(_) => Err(format!("expected {field} to be non-empty, got \"\"")),
                None => Err(format!("expected {field} to be non-empty, got nothing")),
            },
            Expectation::Timestamp(field) => {
                let Some(actual) = field.value(model) else {
                    return Err(format!("expected {field} to be a timestamp, got nothing"));
                };
                chrono::DateTime::parse_from_rfc3339(&actual)
                    .map(|_| format!("{field} is {actual}"))
                    .map_err(|e| format!("expected {field} to be a timestamp, got {actual:?}: {e}"))
            }
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Equals(field, expected) => write!(f, "{field} == {expected:?}"),
            Expectation::Present(field) => write!(f, "{field} is present"),
            Expectation::NonEmpty(field) => write!(f, "{field} is not empty"),
            Expectation::Timestamp(field) => write!(f, "{field} is a timestamp"),
        }
    }
}

/// What happens to the remaining steps once one fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StepPolicy {
    #[default]
    ContinueOnFailure,
    FailFast,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestResult {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub label: String,
    pub expectation: String,
    pub status: TestResult,
    pub detail: String,
}

impl StepResult {
    pub fn skipped(step: &Step) -> Self {
        Self {
            label: step.label.clone(),
            expectation: step.expectation.to_string(),
            status: TestResult::Skipped,
            detail: "not evaluated".into(),
        }
    }
}

pub fn evaluate_steps(steps: &[Step], model: &ResponseModel, policy: StepPolicy) -> Vec<StepResult> {
    let mut results = Vec::with_capacity(steps.len());
    let mut failed = false;

    for step in steps {
        if failed && policy == StepPolicy::FailFast {
            results.push(StepResult::skipped(step));
            continue;
        }

        let (status, detail) = match step.expectation.check(model) {
            Ok(detail) => (TestResult::Pass, detail),
            Err(detail) => {
                failed = true;
                (TestResult::Fail, detail)
            }
        };

        results.push(StepResult {
            label: step.label.clone(),
            expectation: step.expectation.to_string(),
            status,
            detail,
        });
    }

    results
}

#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioFailure {
    #[error("request failed: {message}")]
    Transport { message: String },

    #[error("expected status {expected}, got status {actual}")]
    StatusMismatch { expected: u16, actual: u16 },

    #[error("response body does not match the response model: {message}")]
    Deserialization { message: String },
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Passed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub title: String,
    pub method: String,
    pub path: String,
    pub status: ScenarioStatus,
    pub failure: Option<ScenarioFailure>,
    pub steps: Vec<StepResult>,
    pub elapsed_ms: u64,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.status == ScenarioStatus::Passed
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::Id;

    fn created_user() -> ResponseModel {
        ResponseModel {
            id: Some(Id::Text("613".into())),
            name: Some("bond".into()),
            job: Some("qa".into()),
            created_at: Some("2024-05-01T10:00:00.000Z".into()),
            ..Default::default()
        }
    }

    fn steps() -> Vec<Step> {
        vec![
            Step {
                label: "name".into(),
                expectation: Expectation::equals(Field::Name, "james"),
            },
            Step {
                label: "job".into(),
                expectation: Expectation::equals(Field::Job, "spy"),
            },
            Step {
                label: "id".into(),
                expectation: Expectation::Present(Field::Id),
            },
        ]
    }

    #[test]
    fn expectations_check_fields() {
        let model = created_user();

        assert!(Expectation::equals(Field::Name, "bond").check(&model).is_ok());
        assert!(Expectation::equals(Field::Job, "dev").check(&model).is_err());
        assert!(Expectation::Present(Field::Id).check(&model).is_ok());
        assert!(Expectation::Present(Field::Token).check(&model).is_err());
        assert!(Expectation::NonEmpty(Field::Name).check(&model).is_ok());
        assert!(Expectation::Timestamp(Field::CreatedAt).check(&model).is_ok());
        assert!(Expectation::Timestamp(Field::Name).check(&model).is_err());
    }

    #[test]
    fn non_empty_rejects_empty_strings() {
        let model = ResponseModel {
            token: Some(String::new()),
            ..Default::default()
        };

        let err = Expectation::NonEmpty(Field::Token).check(&model).unwrap_err();
        assert_eq!(err, "expected token to be non-empty, got \"\"");
    }

    #[test]
    fn numeric_id_equals_text() {
        let model = ResponseModel {
            id: Some(Id::Number(4)),
            ..Default::default()
        };

        assert!(Expectation::equals(Field::Id, "4").check(&model).is_ok());
    }

    #[test]
    fn continue_policy_reports_every_failure() {
        let results = evaluate_steps(&steps(), &created_user(), StepPolicy::ContinueOnFailure);

        let statuses: Vec<TestResult> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![TestResult::Fail, TestResult::Fail, TestResult::Pass]
        );
        assert_eq!(results[0].detail, "expected name \"james\", got \"bond\"");
    }

    #[test]
    fn fail_fast_policy_skips_after_first_failure() {
        let results = evaluate_steps(&steps(), &created_user(), StepPolicy::FailFast);

        let statuses: Vec<TestResult> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![TestResult::Fail, TestResult::Skipped, TestResult::Skipped]
        );
    }

    #[test]
    fn expectation_display() {
        assert_eq!(
            Expectation::equals(Field::Error, "Missing password").to_string(),
            "error == \"Missing password\""
        );
        assert_eq!(
            Expectation::Timestamp(Field::CreatedAt).to_string(),
            "createdAt is a timestamp"
        );
    }
}
