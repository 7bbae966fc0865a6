//! Storage failures are the only errors that escape a batch or a run

mod support;

use std::sync::Arc;

use mailproof_common::config::VerificationSettings;
use mailproof_common::{
    ArtifactSink, ArtifactStore, CopyEntry, Error, GeneratedEmail, ProjectBundle, Result, StepDraft,
    Template, TestResult, TestScenario,
};
use mailproof_engine::{Generator, ScenarioRunner};
use tempfile::TempDir;

use support::{FakeLauncher, Script};

/// A sink whose database has gone away
struct UnreachableSink;

fn unreachable() -> Error {
    Error::Database(rusqlite::Error::InvalidQuery)
}

impl ArtifactSink for UnreachableSink {
    fn record_email(&self, _email: &GeneratedEmail) -> Result<()> {
        Err(unreachable())
    }

    fn emails_for_template(&self, _template_id: &str) -> Result<Vec<GeneratedEmail>> {
        Err(unreachable())
    }

    fn record_result(&self, _result: &TestResult) -> Result<()> {
        Err(unreachable())
    }

    fn results_for_scenario(&self, _scenario_id: &str) -> Result<Vec<TestResult>> {
        Err(unreachable())
    }
}

/// Rejects individual records but stays reachable
struct PickySink;

impl ArtifactSink for PickySink {
    fn record_email(&self, email: &GeneratedEmail) -> Result<()> {
        Err(Error::InvalidStep(format!("refusing {}", email.locale)))
    }

    fn emails_for_template(&self, _template_id: &str) -> Result<Vec<GeneratedEmail>> {
        Ok(vec![])
    }

    fn record_result(&self, _result: &TestResult) -> Result<()> {
        Ok(())
    }

    fn results_for_scenario(&self, _scenario_id: &str) -> Result<Vec<TestResult>> {
        Ok(vec![])
    }
}

fn bundle() -> ProjectBundle {
    ProjectBundle {
        templates: vec![Template::new("t", "<p>{{ k }}</p>")],
        copy: vec![CopyEntry::new("t", "en", "k", "v"), CopyEntry::new("t", "fr", "k", "w")],
    }
}

#[tokio::test]
async fn generation_aborts_on_unreachable_storage() {
    let err = Generator::new(Arc::new(UnreachableSink), None)
        .generate(&bundle())
        .await
        .unwrap_err();
    assert!(err.is_storage());
}

#[tokio::test]
async fn generation_records_item_level_sink_errors() {
    let report = Generator::new(Arc::new(PickySink), None)
        .generate(&bundle())
        .await
        .unwrap();
    assert_eq!(report.generated, 0);
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures[0].reason.contains("refusing"));
}

#[tokio::test]
async fn run_propagates_unreachable_storage() {
    let root = TempDir::new().unwrap();
    let store = ArtifactStore::new(root.path()).await.unwrap();
    let launcher = FakeLauncher::new(Script::new().element("x", "ok"));
    let runner = ScenarioRunner::new(
        Arc::new(launcher.clone()),
        Arc::new(UnreachableSink),
        store,
        VerificationSettings::default(),
    );

    let mut scenario = TestScenario::new("s", "S", "<p data-testid=\"x\">ok</p>");
    scenario.add_step(StepDraft::new(1, "expectText").selector("x").value("ok"));

    let err = runner.run(&scenario).await.unwrap_err();
    assert!(err.is_storage());
    assert!(launcher.workdirs().iter().all(|d| !d.exists()));
}
