//! Scenario Commands

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Subcommand;
use colored::Colorize;
use mailproof_common::config::VerificationSettings;
use mailproof_common::{ArtifactSink, Config, ScenarioSummary, TestResult, TestScenario, TestStep};
use mailproof_engine::runner::{detail, summarize};
use mailproof_engine::selector::{extract_testids, TestIdElement};
use mailproof_engine::spec::filter_by_tag;
use mailproof_engine::{LoadedScenario, ScenarioFile, ScenarioRunner};
use serde::Serialize;

use super::Context;
use crate::output::{
    format_duration, print_document, print_list, print_warning, spinner, status_label, truncate,
    TableDisplay,
};

#[derive(Subcommand)]
pub enum ScenarioCommands {
    /// Run scenarios from a file or directory
    Run {
        /// Scenario file or directory of scenario files
        path: PathBuf,

        /// Scenarios executed at once
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Only run scenarios carrying this tag
        #[arg(long)]
        tag: Option<String>,

        /// Run ceiling per scenario, in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Do not capture a screenshot on failure
        #[arg(long)]
        no_screenshot: bool,
    },

    /// List scenarios with their latest result
    List {
        /// Directory of scenario files
        dir: PathBuf,

        /// Only list scenarios carrying this tag
        #[arg(long)]
        tag: Option<String>,
    },

    /// Show a scenario with its steps and result history
    Show {
        /// Scenario file
        file: PathBuf,

        /// Print the transcript of the latest run
        #[arg(long)]
        logs: bool,
    },

    /// Result history for a scenario id
    Results {
        /// Scenario ID
        scenario_id: String,

        /// Number of results to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// List elements carrying data-testid in a scenario document
    Testids {
        /// Scenario file, or an HTML document
        file: PathBuf,
    },
}

/// Scenario listing row
#[derive(Serialize)]
pub struct SummaryDisplay {
    #[serde(flatten)]
    pub summary: ScenarioSummary,
}

impl TableDisplay for SummaryDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Active", "Steps", "Last Result", "Last Run"]
    }

    fn row(&self) -> Vec<String> {
        let s = &self.summary;
        let (status, when) = match &s.latest_result {
            Some(latest) => (
                status_label(latest.status),
                latest.executed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
            None => ("never run".dimmed().to_string(), "-".into()),
        };
        vec![
            s.id.clone(),
            s.name.clone(),
            if s.is_active { "yes".into() } else { "no".into() },
            s.step_count.to_string(),
            status,
            when,
        ]
    }
}

/// Result history row
#[derive(Serialize)]
pub struct ResultDisplay {
    #[serde(flatten)]
    pub result: TestResult,
}

impl TableDisplay for ResultDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Status", "Executed", "Duration", "Screenshot", "Error"]
    }

    fn row(&self) -> Vec<String> {
        let r = &self.result;
        let mut status = status_label(r.status);
        if r.degraded {
            status.push_str(" (validation only)");
        }
        vec![
            r.scenario_id.clone(),
            status,
            r.executed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            format_duration(r.duration_ms),
            r.screenshot_path.clone().unwrap_or_else(|| "-".into()),
            truncate(r.error_message.as_deref().unwrap_or("-"), 60),
        ]
    }
}

/// Step row for `show`
#[derive(Serialize)]
pub struct StepDisplay {
    #[serde(flatten)]
    pub step: TestStep,
}

impl TableDisplay for StepDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Order", "Action", "Selector", "Value", "Description"]
    }

    fn row(&self) -> Vec<String> {
        let s = &self.step;
        let value = match (&s.attr, &s.value) {
            (Some(attr), Some(value)) => format!("{}={}", attr, value),
            (None, Some(value)) => value.clone(),
            (Some(attr), None) => attr.clone(),
            (None, None) => "-".into(),
        };
        vec![
            s.step_order.to_string(),
            s.action.to_string(),
            s.selector.clone().unwrap_or_else(|| "-".into()),
            truncate(&value, 40),
            s.description.clone().unwrap_or_default(),
        ]
    }
}

impl TableDisplay for TestIdElement {
    fn headers() -> Vec<&'static str> {
        vec!["Test ID", "Tag", "Text", "Selector"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.testid.clone(),
            self.tag.clone(),
            self.text.clone(),
            self.selector.clone(),
        ]
    }
}

fn load_scenarios(path: &Path, tag: Option<&str>) -> Result<Vec<LoadedScenario>> {
    let loaded = ScenarioFile::load_path(path)
        .with_context(|| format!("loading scenarios from {}", path.display()))?;
    Ok(match tag {
        Some(tag) => filter_by_tag(&loaded, tag).into_iter().cloned().collect(),
        None => loaded,
    })
}

pub async fn execute(cmd: ScenarioCommands, ctx: &Context) -> Result<()> {
    match cmd {
        ScenarioCommands::Run {
            path,
            concurrency,
            tag,
            timeout,
            no_screenshot,
        } => {
            let scenarios: Vec<TestScenario> = load_scenarios(&path, tag.as_deref())?
                .into_iter()
                .map(|l| l.scenario)
                .collect();

            let settings = run_settings(&ctx.config, concurrency, timeout, no_screenshot)?;

            let launcher = ctx.launcher();
            if let Err(e) = launcher.check_installed() {
                print_warning(&format!("{}; steps will only be validated", e));
            }

            let sink: Arc<dyn ArtifactSink> = Arc::new(ctx.database()?);
            let runner = ScenarioRunner::new(launcher, sink, ctx.store().await?, settings);

            let progress = spinner(&format!("Running {} scenario(s)", scenarios.len()), ctx.format);
            let summary = runner.run_many(&scenarios).await;
            progress.finish_and_clear();
            let summary = summary?;

            if ctx.format.is_structured() {
                print_document(&summary, ctx.format)?;
            } else {
                let rows: Vec<ResultDisplay> = summary
                    .results
                    .iter()
                    .cloned()
                    .map(|result| ResultDisplay { result })
                    .collect();
                print_list(&rows, ctx.format)?;

                for skipped in &summary.skipped {
                    print_warning(&format!("{} skipped: {}", skipped.scenario_id, skipped.reason));
                }

                println!();
                println!(
                    "{} passed, {} failed, {} errored, {} skipped in {}",
                    summary.passed.to_string().green().bold(),
                    summary.failed.to_string().red(),
                    summary.errored.to_string().yellow(),
                    summary.skipped.len(),
                    format_duration(summary.duration_ms)
                );
            }

            if summary.failed + summary.errored > 0 {
                std::process::exit(1);
            }
        }

        ScenarioCommands::List { dir, tag } => {
            let scenarios: Vec<TestScenario> = load_scenarios(&dir, tag.as_deref())?
                .into_iter()
                .map(|l| l.scenario)
                .collect();
            let db = ctx.database()?;
            let rows: Vec<SummaryDisplay> = summarize(&scenarios, &db)?
                .into_iter()
                .map(|summary| SummaryDisplay { summary })
                .collect();
            print_list(&rows, ctx.format)?;
        }

        ScenarioCommands::Show { file, logs } => {
            let loaded = ScenarioFile::load(&file)?;
            let db = ctx.database()?;
            let detail = detail(&loaded.scenario, &db)?;

            if ctx.format.is_structured() {
                return print_document(&detail, ctx.format);
            }

            let s = &detail.scenario;
            println!("{} {}", s.name.bold(), format!("({})", s.id).dimmed());
            if !s.description.is_empty() {
                println!("  {}", s.description);
            }
            if !loaded.tags.is_empty() {
                println!("  Tags: {}", loaded.tags.join(", ").cyan());
            }
            if !s.is_active {
                println!("  {}", "inactive".yellow());
            }
            println!();

            let steps: Vec<StepDisplay> = s
                .ordered_steps()
                .into_iter()
                .cloned()
                .map(|step| StepDisplay { step })
                .collect();
            print_list(&steps, ctx.format)?;

            println!();
            let results: Vec<ResultDisplay> = detail
                .results
                .iter()
                .cloned()
                .map(|result| ResultDisplay { result })
                .collect();
            print_list(&results, ctx.format)?;

            if logs {
                if let Some(latest) = detail.results.first() {
                    println!();
                    println!("{}", "Latest transcript".bold());
                    for line in &latest.logs {
                        println!("  {}", line);
                    }
                }
            }
        }

        ScenarioCommands::Results { scenario_id, limit } => {
            let db = ctx.database()?;
            let rows: Vec<ResultDisplay> = db
                .results_for_scenario(&scenario_id)?
                .into_iter()
                .take(limit)
                .map(|result| ResultDisplay { result })
                .collect();
            print_list(&rows, ctx.format)?;
        }

        ScenarioCommands::Testids { file } => {
            let html = document_for(&file)?;
            print_list(&extract_testids(&html), ctx.format)?;
        }
    }

    Ok(())
}

/// Verification settings with command-line overrides applied, held to the
/// same rules as the config file
fn run_settings(
    config: &Config,
    concurrency: Option<usize>,
    timeout: Option<u64>,
    no_screenshot: bool,
) -> Result<VerificationSettings> {
    let mut config = config.clone();
    let settings = &mut config.verification;
    if let Some(n) = concurrency {
        settings.concurrency = n;
    }
    if let Some(secs) = timeout {
        settings.run_timeout_secs = secs;
    }
    if no_screenshot {
        settings.screenshot_on_failure = false;
    }
    config.validate().context("invalid run options")?;
    Ok(config.verification)
}

/// The document a testid listing inspects: raw HTML, or a scenario's page
fn document_for(file: &Path) -> Result<String> {
    let is_html = matches!(
        file.extension().and_then(|e| e.to_str()),
        Some("html") | Some("htm")
    );
    if is_html {
        return std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()));
    }
    Ok(ScenarioFile::load(file)?.scenario.html)
}
