#![allow(clippy::result_large_err)]

use std::path::Path;

use chrono::Utc;
use clap::Parser;
use miette::Diagnostic;
use miette::Result;
use reqres_quest::asserter::AsserterError;
use reqres_quest::cli::Cli;
use reqres_quest::filter::ReportCapture;
use reqres_quest::log::Logger;
use reqres_quest::parser::ReqresQuest;
use reqres_quest::pipeline::PipelineOptions;
use reqres_quest::pipeline::run_pipeline_tasks;
use reqres_quest::report::Report;
use reqres_quest::report::ReportError;
use reqres_quest::runner::RunnerError;
use reqres_quest::scenario::StepPolicy;
use reqres_quest::spec::SpecError;
use reqres_quest::suite;
use reqres_quest::validator::ValidatedConfig;
use reqres_quest::validator::ValidationError;
use reqres_quest::validator::Validator;
use reqwest::Client;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum SuiteError {
    #[error("Failed to read toml file")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse toml file")]
    TomlParsing(#[from] toml::de::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    ValidationError(#[from] ValidationError),

    #[error("Failed to build the scenarios: {0}")]
    SpecError(#[from] SpecError),

    #[error("Failed in the runner step: {0}")]
    RunnerError(#[from] RunnerError),

    #[error("Failed in the assert step: {0}")]
    AssertError(#[from] AsserterError),

    #[error("A pipeline task stopped unexpectedly: {0}")]
    TaskFailed(String),

    #[error(transparent)]
    ReportError(#[from] ReportError),

    #[error("{0} scenario(s) failed")]
    ScenariosFailed(usize),
}

/// Reads the configuration file, applies the CLI base URL override and
/// validates it into a specification registry.
fn load_and_validate_config(
    cli: &Cli,
    capture: &ReportCapture,
) -> Result<ValidatedConfig, SuiteError> {
    let contents = std::fs::read_to_string(&cli.path).map_err(SuiteError::FileError)?;
    let mut quest: ReqresQuest = toml::from_str(&contents).map_err(SuiteError::TomlParsing)?;

    if let Some(base_url) = &cli.base_url {
        quest.setup.base_url = base_url.clone();
    }

    let validator = Validator::new(&quest, contents.as_str(), cli.path.as_str());
    let config = validator
        .validate(capture)
        .map_err(SuiteError::ValidationError)?;

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let logger = Logger::new(cli.quiet);
    let capture = ReportCapture::new();
    let started_at = Utc::now();

    // Every specification is built and checked here, before any request
    // is sent.
    let config = load_and_validate_config(&cli, &capture)?;
    let scenarios = suite::reqres_scenarios(&config.registry).map_err(SuiteError::SpecError)?;
    let scenarios = suite::select(scenarios, &cli.scenarios);

    logger.setup(&format!("running against {} ⚙️", config.base_url));

    let policy = if cli.fail_fast {
        StepPolicy::FailFast
    } else {
        StepPolicy::ContinueOnFailure
    };

    let handles = run_pipeline_tasks(
        scenarios,
        Client::new(),
        PipelineOptions {
            base_url: config.base_url.clone(),
            config_path: cli.path.clone(),
            policy,
            parallel: cli.parallel,
            logger,
        },
    );

    let (runner, asserter, outcomes) =
        futures::join!(handles.runner, handles.asserter, handles.outputter);

    runner
        .map_err(|e| SuiteError::TaskFailed(e.to_string()))?
        .map_err(SuiteError::RunnerError)?;
    asserter
        .map_err(|e| SuiteError::TaskFailed(e.to_string()))?
        .map_err(SuiteError::AssertError)?;
    let outcomes = outcomes.map_err(|e| SuiteError::TaskFailed(e.to_string()))?;

    if let Some(path) = &cli.report {
        Report::new(started_at, &config.base_url, outcomes.clone(), &capture.exchanges())
            .write(Path::new(path))
            .map_err(SuiteError::ReportError)?;
        logger.setup(&format!("report written to {path}"));
    }

    let failed = outcomes.iter().filter(|o| !o.passed()).count();
    if failed > 0 {
        return Err(SuiteError::ScenariosFailed(failed).into());
    }

    Ok(())
}
