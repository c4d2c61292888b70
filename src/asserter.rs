use flume::Receiver;
use flume::SendError;
use flume::Sender;
use thiserror::Error;

use crate::log::Logger;
use crate::model::ResponseModel;
use crate::runner::CapturedResponse;
use crate::runner::RunnerResult;
use crate::scenario::ScenarioFailure;
use crate::scenario::ScenarioOutcome;
use crate::scenario::ScenarioStatus;
use crate::scenario::StepPolicy;
use crate::scenario::StepResult;
use crate::scenario::TestResult;
use crate::scenario::evaluate_steps;
use crate::spec::ResponseSpecification;

#[derive(Error, Debug)]
pub enum AsserterError {
    #[error("channel error")]
    ChannelError(#[from] SendError<ScenarioOutcome>),
}

pub struct Asserter {}

pub trait Assert {
    fn assert(&self, policy: StepPolicy, logger: &Logger) -> ScenarioOutcome;
}

impl Assert for RunnerResult {
    fn assert(&self, policy: StepPolicy, logger: &Logger) -> ScenarioOutcome {
        let scenario = &self.scenario;
        let spec = &scenario.response_spec;

        let (validated, elapsed_ms) = match (&self.response, &self.error) {
            (Some(response), _) => {
                let validated = validate(spec, response);
                if spec.should_log(validated.is_err()) {
                    logger.response(spec.log(), &scenario.name, response);
                }
                (validated, response.elapsed.as_millis() as u64)
            }
            (None, error) => (
                Err(ScenarioFailure::Transport {
                    message: error.clone().unwrap_or_else(|| "no response".into()),
                }),
                0,
            ),
        };

        let (failure, steps) = match validated {
            Ok(model) => (None, evaluate_steps(&scenario.steps, &model, policy)),
            Err(failure) => (
                Some(failure),
                scenario.steps.iter().map(StepResult::skipped).collect(),
            ),
        };

        let status = if failure.is_none() && steps.iter().all(|s| s.status == TestResult::Pass) {
            ScenarioStatus::Passed
        } else {
            ScenarioStatus::Failed
        };

        ScenarioOutcome {
            name: scenario.name.clone(),
            title: scenario.title.clone(),
            method: self.request.method.to_string(),
            path: scenario.path.clone(),
            status,
            failure,
            steps,
            elapsed_ms,
        }
    }
}

impl Asserter {
    pub async fn run(
        rx: Receiver<RunnerResult>,
        output_tx: Sender<ScenarioOutcome>,
        policy: StepPolicy,
        logger: Logger,
    ) -> Result<(), AsserterError> {
        while let Ok(msg) = rx.recv_async().await {
            let outcome = msg.assert(policy, &logger);
            output_tx.send_async(outcome).await?;
        }

        Ok(())
    }
}

/// Checks the status code, then the body's shape.
pub fn validate(
    spec: &ResponseSpecification,
    response: &CapturedResponse,
) -> Result<ResponseModel, ScenarioFailure> {
    if response.status != spec.status() {
        return Err(ScenarioFailure::StatusMismatch {
            expected: spec.status().as_u16(),
            actual: response.status.as_u16(),
        });
    }

    serde_json::from_str::<ResponseModel>(&response.body_text).map_err(|e| {
        ScenarioFailure::Deserialization {
            message: e.to_string(),
        }
    })
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use reqwest::Method;
    use reqwest::StatusCode;
    use reqwest::header::HeaderMap;

    use super::*;
    use crate::runner::CapturedRequest;
    use crate::scenario::Expectation;
    use crate::scenario::Field;
    use crate::scenario::Scenario;
    use crate::spec::BAD_REQUEST;
    use crate::spec::REGISTER;
    use crate::spec::SpecRegistry;

    fn scenario() -> Arc<Scenario> {
        let registry = SpecRegistry::reqres_defaults(vec![]).unwrap();

        Arc::new(
            Scenario::post(
                "missing_password",
                "Register without a password",
                "/register",
                registry.request(REGISTER).unwrap(),
                registry.response(BAD_REQUEST).unwrap(),
            )
            .step("error message", Expectation::equals(Field::Error, "Missing password"))
            .step("no token", Expectation::Present(Field::Token)),
        )
    }

    fn result(status: StatusCode, body: &str) -> RunnerResult {
        let scenario = scenario();
        RunnerResult {
            request: CapturedRequest {
                scenario: scenario.name.clone(),
                method: Method::POST,
                url: "http://localhost/register".into(),
                headers: HeaderMap::new(),
                body: None,
            },
            scenario,
            response: Some(CapturedResponse {
                status,
                headers: HeaderMap::new(),
                body_text: body.into(),
                body_json: serde_json::from_str(body).ok(),
                elapsed: Duration::from_millis(12),
            }),
            error: None,
        }
    }

    #[test]
    fn status_mismatch_skips_every_step() {
        let outcome = result(StatusCode::OK, r#"{"id":4,"token":"abc"}"#)
            .assert(StepPolicy::ContinueOnFailure, &Logger::quiet());

        assert_eq!(outcome.status, ScenarioStatus::Failed);
        assert_eq!(
            outcome.failure,
            Some(ScenarioFailure::StatusMismatch {
                expected: 400,
                actual: 200
            })
        );
        assert!(outcome.steps.iter().all(|s| s.status == TestResult::Skipped));
    }

    #[test]
    fn malformed_body_is_a_validation_failure() {
        let outcome = result(StatusCode::BAD_REQUEST, "<html>Bad Request</html>")
            .assert(StepPolicy::ContinueOnFailure, &Logger::quiet());

        assert!(matches!(
            outcome.failure,
            Some(ScenarioFailure::Deserialization { .. })
        ));
        assert!(outcome.steps.iter().all(|s| s.status == TestResult::Skipped));
    }

    #[test]
    fn transport_error_fails_scenario() {
        let mut result = result(StatusCode::BAD_REQUEST, "{}");
        result.response = None;
        result.error = Some("connection refused".into());

        let outcome = result.assert(StepPolicy::ContinueOnFailure, &Logger::quiet());

        assert_eq!(
            outcome.failure,
            Some(ScenarioFailure::Transport {
                message: "connection refused".into()
            })
        );
        assert_eq!(outcome.elapsed_ms, 0);
    }

    #[test]
    fn failing_step_fails_scenario_but_others_run() {
        let outcome = result(StatusCode::BAD_REQUEST, r#"{"error":"Missing password"}"#)
            .assert(StepPolicy::ContinueOnFailure, &Logger::quiet());

        assert_eq!(outcome.status, ScenarioStatus::Failed);
        assert_eq!(outcome.failure, None);
        assert_eq!(outcome.steps[0].status, TestResult::Pass);
        assert_eq!(outcome.steps[1].status, TestResult::Fail);
        assert_eq!(outcome.method, "POST");
        assert_eq!(outcome.elapsed_ms, 12);
    }

    #[tokio::test]
    async fn test_full() {
        let (runner_tx, asserter_rx) = flume::unbounded::<RunnerResult>();
        let (asserter_tx, outputter_rx) = flume::unbounded::<ScenarioOutcome>();

        tokio::spawn(async move {
            Asserter::run(
                asserter_rx,
                asserter_tx,
                StepPolicy::FailFast,
                Logger::quiet(),
            )
            .await
            .unwrap();
        });

        runner_tx
            .send_async(result(
                StatusCode::BAD_REQUEST,
                r#"{"error":"Missing password","token":"t"}"#,
            ))
            .await
            .unwrap();

        let outcome = outputter_rx.recv_async().await.unwrap();
        assert_eq!(outcome.name, "missing_password");
        assert_eq!(outcome.path, "/register");
        assert!(outcome.passed());
    }
}
