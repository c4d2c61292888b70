use std::sync::Arc;

use reqwest::Client;
use tokio::task::JoinHandle;

use crate::asserter::Assert;
use crate::asserter::Asserter;
use crate::asserter::AsserterError;
use crate::log::Logger;
use crate::outputter::OutPutter;
use crate::runner::RunnerError;
use crate::runner::RunnerResult;
use crate::runner::run_scenarios;
use crate::runner::send_scenario;
use crate::scenario::Scenario;
use crate::scenario::ScenarioOutcome;
use crate::scenario::StepPolicy;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub base_url: String,
    pub config_path: String,
    pub policy: StepPolicy,
    pub parallel: bool,
    pub logger: Logger,
}

pub struct PipelineHandles {
    pub runner: JoinHandle<Result<(), RunnerError>>,
    pub asserter: JoinHandle<Result<(), AsserterError>>,
    pub outputter: JoinHandle<Vec<ScenarioOutcome>>,
}

/// Spawns the runner, asserter and outputter tasks, connected by unbounded
/// flume channels.
pub fn run_pipeline_tasks(
    scenarios: Vec<Scenario>,
    client: Client,
    options: PipelineOptions,
) -> PipelineHandles {
    let (runner_tx, asserter_rx) = flume::unbounded::<RunnerResult>();
    let (asserter_tx, outputter_rx) = flume::unbounded::<ScenarioOutcome>();
    let n_scenarios = scenarios.len();

    let config_path = options.config_path.clone();
    let outputter =
        tokio::spawn(async move { OutPutter::start(outputter_rx, &config_path, n_scenarios).await });

    let scenarios = scenarios.into_iter().map(Arc::new).collect();
    let runner = tokio::spawn(run_scenarios(
        scenarios,
        client,
        options.base_url,
        runner_tx,
        options.logger,
        options.parallel,
    ));

    let asserter = tokio::spawn(Asserter::run(
        asserter_rx,
        asserter_tx,
        options.policy,
        options.logger,
    ));

    PipelineHandles {
        runner,
        asserter,
        outputter,
    }
}

/// Runs one scenario end to end without the pipeline.
pub async fn run_scenario(
    client: &Client,
    base_url: &str,
    scenario: Scenario,
    policy: StepPolicy,
    logger: &Logger,
) -> ScenarioOutcome {
    send_scenario(client, base_url, Arc::new(scenario), logger)
        .await
        .assert(policy, logger)
}
