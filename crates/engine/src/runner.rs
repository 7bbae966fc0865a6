//! Scenario runner: browser lifecycle, time budget, screenshots and results

use chrono::Utc;
use futures::stream::{self, StreamExt};
use mailproof_common::config::VerificationSettings;
use mailproof_common::{
    ArtifactSink, ArtifactStore, RunStatus, ScenarioDetail, ScenarioSummary, TestResult,
    TestScenario, TestStep,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::capture::file_url;
use crate::driver::{BrowserLauncher, LaunchOptions, PageDriver};
use crate::error::{EngineError, EngineResult};
use crate::interpreter::{Action, Interpreter, RunState, StepFailure, Transcript};

/// Result of running a batch of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: Vec<SkippedScenario>,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

/// A scenario that produced no result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedScenario {
    pub scenario_id: String,
    pub reason: String,
}

/// How a single run ended, before it becomes a [`TestResult`]
struct RunOutcome {
    status: RunStatus,
    error_message: Option<String>,
    screenshot_path: Option<String>,
    duration_ms: u64,
    degraded: bool,
}

/// Executes scenarios in isolated browser sessions and records the results
#[derive(Clone)]
pub struct ScenarioRunner {
    launcher: Arc<dyn BrowserLauncher>,
    sink: Arc<dyn ArtifactSink>,
    store: ArtifactStore,
    settings: VerificationSettings,
}

impl ScenarioRunner {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        sink: Arc<dyn ArtifactSink>,
        store: ArtifactStore,
        settings: VerificationSettings,
    ) -> Self {
        Self {
            launcher,
            sink,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &VerificationSettings {
        &self.settings
    }

    /// Run one scenario and persist its result
    ///
    /// Only a scenario without steps or a broken sink yields `Err`; every
    /// browser or assertion problem is captured in the returned result.
    pub async fn run(&self, scenario: &TestScenario) -> EngineResult<TestResult> {
        let steps = scenario.ordered_steps();
        if steps.is_empty() {
            return Err(EngineError::NoSteps(scenario.id.clone()));
        }

        let run_id = Uuid::new_v4();
        let executed_at = Utc::now();
        let mut transcript = Transcript::new();
        transcript.push(format!(
            "Starting run {} for scenario '{}' ({} steps)",
            run_id,
            scenario.name,
            steps.len()
        ));

        let workdir = tempfile::Builder::new().prefix("mailproof-run-").tempdir()?;
        let document = workdir.path().join("document.html");
        tokio::fs::write(&document, &scenario.html).await?;
        transcript.push(format!("Temporary HTML file created: {}", document.display()));
        let url = file_url(&document)?;

        // One wall-clock deadline covers launch, steps and teardown
        let ceiling = self.settings.run_timeout();
        let run_started = Instant::now();
        let deadline = run_started + ceiling;

        let launched = tokio::time::timeout_at(
            deadline,
            self.launcher.launch(LaunchOptions {
                viewport: self.settings.viewport,
                workdir: workdir.path().to_path_buf(),
            }),
        )
        .await;

        let outcome = match launched {
            Ok(Ok(page)) => {
                transcript.push("Browser launched");
                self.drive(page, &url, &steps, deadline, &mut transcript).await
            }
            Ok(Err(e)) => {
                warn!("Browser launch failed for scenario {}: {}", scenario.id, e);
                validate_only(&steps, &e, run_started, &mut transcript)
            }
            Err(_) => {
                let message = format!("Run exceeded {}s while launching the browser", ceiling.as_secs());
                warn!("{} (scenario {})", message, scenario.id);
                transcript.push(message.clone());
                RunOutcome {
                    status: RunStatus::Error,
                    error_message: Some(message),
                    screenshot_path: None,
                    duration_ms: ceiling.as_millis() as u64,
                    degraded: false,
                }
            }
        };

        if let Err(e) = workdir.close() {
            warn!("Failed to remove run scratch directory: {}", e);
        }

        match (&outcome.status, &outcome.error_message) {
            (RunStatus::Passed, _) => transcript.push("Test completed successfully"),
            (RunStatus::Failed, Some(message)) => transcript.push(format!("Test failed: {}", message)),
            (_, message) => transcript.push(format!(
                "Test errored: {}",
                message.as_deref().unwrap_or("unknown error")
            )),
        }

        let result = TestResult {
            id: run_id,
            scenario_id: scenario.id.clone(),
            status: outcome.status,
            executed_at,
            duration_ms: outcome.duration_ms,
            error_message: outcome.error_message,
            screenshot_path: outcome.screenshot_path,
            logs: transcript.into_lines(),
            degraded: outcome.degraded,
        };

        self.sink.record_result(&result)?;

        match result.status {
            RunStatus::Passed => info!("✓ {} ({} ms)", scenario.name, result.duration_ms),
            _ => error!(
                "✗ {} [{}] - {}",
                scenario.name,
                result.status,
                result.error_message.as_deref().unwrap_or("unknown error")
            ),
        }

        Ok(result)
    }

    async fn drive(
        &self,
        mut page: Box<dyn PageDriver>,
        url: &str,
        steps: &[&TestStep],
        deadline: Instant,
        transcript: &mut Transcript,
    ) -> RunOutcome {
        let mut interpreter = Interpreter::new();
        let ceiling = self.settings.run_timeout();
        let load_started = Instant::now();

        let verdict = tokio::time::timeout_at(deadline, async {
            interpreter.load(page.as_mut(), url, transcript).await?;
            interpreter.execute(page.as_mut(), steps, transcript).await
        })
        .await;

        let duration_ms = interpreter
            .started_at()
            .unwrap_or(load_started.into_std())
            .elapsed()
            .as_millis() as u64;

        let (failure, timed_out) = match verdict {
            Ok(Ok(())) => (None, false),
            Ok(Err(failure)) => (Some(failure), false),
            Err(_) => {
                let message = match interpreter.state() {
                    RunState::Running(index) => format!(
                        "Run exceeded {}s during step {} ({})",
                        ceiling.as_secs(),
                        steps[index].step_order,
                        steps[index].label()
                    ),
                    _ => format!("Run exceeded {}s while loading the document", ceiling.as_secs()),
                };
                transcript.push(message.clone());
                (Some(StepFailure::Infrastructure(message)), true)
            }
        };

        // A timed-out driver is torn down at once, no screenshot
        let screenshot_path = match &failure {
            Some(_) if self.settings.screenshot_on_failure && !timed_out => {
                self.capture_failure(page.as_mut(), deadline, transcript).await
            }
            _ => None,
        };

        if timed_out {
            page.terminate();
        } else {
            let grace = remaining(deadline, self.settings.capture_grace());
            match tokio::time::timeout(grace, page.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Browser close failed: {}", e),
                Err(_) => warn!("Browser close exceeded {:?}", grace),
            }
            page.terminate();
        }
        transcript.push("Browser session closed");

        match failure {
            None => RunOutcome {
                status: RunStatus::Passed,
                error_message: None,
                screenshot_path,
                duration_ms,
                degraded: false,
            },
            Some(failure) => RunOutcome {
                status: failure.status(),
                error_message: Some(failure.message().to_string()),
                screenshot_path,
                duration_ms,
                degraded: false,
            },
        }
    }

    /// Best-effort full-page screenshot, bounded by the capture grace and
    /// whatever is left of the run deadline
    async fn capture_failure(
        &self,
        page: &mut dyn PageDriver,
        deadline: Instant,
        transcript: &mut Transcript,
    ) -> Option<String> {
        let grace = remaining(deadline, self.settings.capture_grace());
        if grace.is_zero() {
            transcript.push("Failed to capture screenshot: run deadline reached");
            return None;
        }
        let slot = self.store.allocate("screenshot_");

        let error = match tokio::time::timeout(grace, page.screenshot(&slot.absolute, true)).await {
            Ok(Ok(())) => {
                transcript.push(format!("Screenshot captured at: {}", slot.relative));
                return Some(slot.relative);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("screenshot exceeded {:?}", grace),
        };

        transcript.push(format!("Failed to capture screenshot: {}", error));
        if let Err(e) = self.store.remove(&slot.relative).await {
            debug!("No partial screenshot to remove: {}", e);
        }
        None
    }

    /// Run scenarios with bounded concurrency
    ///
    /// Inactive and empty scenarios are skipped; a broken sink aborts.
    pub async fn run_many(&self, scenarios: &[TestScenario]) -> EngineResult<SuiteSummary> {
        let start = Instant::now();
        let mut skipped = Vec::new();

        let runnable: Vec<&TestScenario> = scenarios
            .iter()
            .filter(|s| {
                if !s.is_active {
                    skipped.push(SkippedScenario {
                        scenario_id: s.id.clone(),
                        reason: "inactive".into(),
                    });
                }
                s.is_active
            })
            .collect();

        info!(
            "Running {} scenario(s), {} at a time...",
            runnable.len(),
            self.settings.concurrency.max(1)
        );

        let outcomes: Vec<(&TestScenario, EngineResult<TestResult>)> = stream::iter(runnable)
            .map(|scenario| async move { (scenario, self.run(scenario).await) })
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut results = Vec::new();
        for (scenario, outcome) in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) if e.is_storage() => return Err(e),
                Err(e) => skipped.push(SkippedScenario {
                    scenario_id: scenario.id.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        let count = |status: RunStatus| results.iter().filter(|r| r.status == status).count();
        let summary = SuiteSummary {
            total: scenarios.len(),
            passed: count(RunStatus::Passed),
            failed: count(RunStatus::Failed),
            errored: count(RunStatus::Error),
            skipped,
            duration_ms: start.elapsed().as_millis() as u64,
            results,
        };

        info!(
            "Scenario results: {} passed, {} failed, {} errored, {} skipped ({} ms)",
            summary.passed,
            summary.failed,
            summary.errored,
            summary.skipped.len(),
            summary.duration_ms
        );

        Ok(summary)
    }
}

/// Time left before `deadline`, capped at `cap`
fn remaining(deadline: Instant, cap: Duration) -> Duration {
    deadline.saturating_duration_since(Instant::now()).min(cap)
}

/// Degraded mode: check every step's shape without executing anything
fn validate_only(
    steps: &[&TestStep],
    cause: &EngineError,
    started: Instant,
    transcript: &mut Transcript,
) -> RunOutcome {
    transcript.push(format!("Browser automation unavailable: {}", cause));
    transcript.push("Falling back to validation only; no step will be executed");

    let mut first_invalid = None;
    for step in steps {
        transcript.push(format!("Validating step {}: {}", step.step_order, step.label()));
        if let Err(shape) = Action::from_step(step) {
            transcript.push(format!("Step {} is invalid: {}", step.step_order, shape));
            first_invalid.get_or_insert(shape.0);
        }
    }

    let message = first_invalid.unwrap_or_else(|| {
        format!(
            "Browser unavailable; {} step(s) validated but not executed: {}",
            steps.len(),
            cause
        )
    });

    RunOutcome {
        status: RunStatus::Error,
        error_message: Some(message),
        screenshot_path: None,
        duration_ms: started.elapsed().as_millis() as u64,
        degraded: true,
    }
}

/// List scenarios with their most recent result
pub fn summarize(
    scenarios: &[TestScenario],
    sink: &dyn ArtifactSink,
) -> mailproof_common::Result<Vec<ScenarioSummary>> {
    scenarios
        .iter()
        .map(|s| {
            let latest = sink.latest_result(&s.id)?;
            Ok(ScenarioSummary::new(s, latest.as_ref()))
        })
        .collect()
}

/// One scenario with its full result history, newest first
pub fn detail(scenario: &TestScenario, sink: &dyn ArtifactSink) -> mailproof_common::Result<ScenarioDetail> {
    Ok(ScenarioDetail {
        scenario: scenario.clone(),
        results: sink.results_for_scenario(&scenario.id)?,
    })
}
