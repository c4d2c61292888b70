use console::Style;
use flume::Receiver;

use crate::scenario::ScenarioOutcome;
use crate::scenario::TestResult;

pub struct OutPutter;

impl OutPutter {
    /// Prints every outcome as it arrives and a summary once the channel
    /// closes. Returns the outcomes in arrival order.
    pub async fn start(
        rx: Receiver<ScenarioOutcome>,
        config_path: &str,
        n_scenarios: usize,
    ) -> Vec<ScenarioOutcome> {
        let style = Style::new().bold().cyan();
        let open_text = &format!(
            "Running scenarios from: {config_path} Found {n_scenarios} scenarios: Running..."
        );
        let open_text = style.apply_to(open_text);

        println!("{open_text}");
        let mut i = 1;
        let mut outcomes: Vec<ScenarioOutcome> = vec![];
        while let Ok(outcome) = rx.recv_async().await {
            print!("{}", render_outcome(i, n_scenarios, &outcome));
            outcomes.push(outcome);
            i += 1;
        }

        print!("{}", render_summary(&outcomes));
        outcomes
    }
}

pub fn render_outcome(i: usize, n_scenarios: usize, outcome: &ScenarioOutcome) -> String {
    let mut out = String::new();
    let marker = if outcome.passed() {
        console::style("✔").green().bold()
    } else {
        console::style("╳").red().bold()
    };

    out.push_str(&format!(
        "[{i}/{n_scenarios}] {marker}  {} ({} {}) {}ms\n",
        outcome.title, outcome.method, outcome.path, outcome.elapsed_ms
    ));

    if let Some(failure) = &outcome.failure {
        out.push_str(&format!(
            "      {} {}\n",
            console::style("FAILED!").red().bold(),
            failure
        ));
    }

    for step in &outcome.steps {
        let line = match step.status {
            TestResult::Pass => format!(
                "      {} {}: {}",
                console::style("✔").green(),
                step.label,
                console::style(&step.detail).dim()
            ),
            TestResult::Fail => format!(
                "      {} {}: {}",
                console::style("╳").red(),
                step.label,
                console::style(&step.detail).red()
            ),
            TestResult::Skipped => format!(
                "      {} {}: {}",
                console::style("-").yellow(),
                step.label,
                console::style("skipped").yellow()
            ),
        };
        out.push_str(&line);
        out.push('\n');
    }

    out
}

pub fn render_summary(outcomes: &[ScenarioOutcome]) -> String {
    let failed: Vec<&ScenarioOutcome> = outcomes.iter().filter(|o| !o.passed()).collect();

    if failed.is_empty() {
        return format!(
            "\n{}\n",
            console::style("All scenarios passed! 🎉").bold().green()
        );
    }

    let mut out = format!(
        "\n{}\n",
        console::style("Summary of Failed Scenarios:").bold().red()
    );
    for (idx, outcome) in failed.iter().enumerate() {
        out.push_str(&format!("\n{}. {} ({})\n", idx + 1, outcome.title, outcome.name));
        if let Some(failure) = &outcome.failure {
            out.push_str(&format!("  {failure}\n"));
        }
        for step in outcome.steps.iter().filter(|s| s.status == TestResult::Fail) {
            out.push_str(&format!("  {}: {}\n", step.label, step.detail));
        }
    }
    out.push_str(&format!(
        "\n{} passed, {} failed\n",
        outcomes.len() - failed.len(),
        failed.len()
    ));

    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scenario::ScenarioFailure;
    use crate::scenario::ScenarioStatus;
    use crate::scenario::StepResult;

    fn outcome(name: &str, status: ScenarioStatus, failure: Option<ScenarioFailure>) -> ScenarioOutcome {
        ScenarioOutcome {
            name: name.into(),
            title: format!("Title of {name}"),
            method: "POST".into(),
            path: "/register".into(),
            status,
            failure,
            steps: vec![StepResult {
                label: "Check the error message".into(),
                expectation: "error == \"Missing password\"".into(),
                status: if status == ScenarioStatus::Passed {
                    TestResult::Pass
                } else {
                    TestResult::Fail
                },
                detail: "expected error \"Missing password\", got nothing".into(),
            }],
            elapsed_ms: 5,
        }
    }

    #[test]
    fn summary_lists_only_failures() {
        let outcomes = vec![
            outcome("missing_password", ScenarioStatus::Passed, None),
            outcome("undefined_email", ScenarioStatus::Failed, None),
        ];

        let summary = render_summary(&outcomes);
        assert!(summary.contains("undefined_email"));
        assert!(!summary.contains("missing_password"));
        assert!(summary.contains("1 passed, 1 failed"));
    }

    #[test]
    fn summary_when_everything_passed() {
        let outcomes = vec![outcome("missing_password", ScenarioStatus::Passed, None)];

        assert!(render_summary(&outcomes).contains("All scenarios passed"));
    }

    #[test]
    fn outcome_shows_validation_failure() {
        let rendered = render_outcome(
            2,
            5,
            &outcome(
                "undefined_email",
                ScenarioStatus::Failed,
                Some(ScenarioFailure::StatusMismatch {
                    expected: 400,
                    actual: 200,
                }),
            ),
        );

        assert!(rendered.starts_with("[2/5]"));
        assert!(rendered.contains("expected status 400, got status 200"));
        assert!(rendered.contains("POST /register"));
    }

    #[tokio::test]
    async fn collects_outcomes_in_order() {
        let (tx, rx) = flume::unbounded();
        tx.send(outcome("a", ScenarioStatus::Passed, None)).unwrap();
        tx.send(outcome("b", ScenarioStatus::Failed, None)).unwrap();
        drop(tx);

        let outcomes = OutPutter::start(rx, "reqres_quest.toml", 2).await;
        let names: Vec<&str> = outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
