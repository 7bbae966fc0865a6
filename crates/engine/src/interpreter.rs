//! Step interpreter
//!
//! Turns stored steps into typed actions and drives them against a page.
//! A run moves `Idle -> Loaded -> Running(i) -> Passed | Failed | Error`.
//! An assertion that does not hold ends the run as Failed; anything that
//! stops a step from being evaluated at all ends it as Error.

use mailproof_common::{ActionKind, RunStatus, TestStep};
use std::fmt;
use std::time::Instant;
use tracing::debug;

use crate::assert::{self, AssertionFailure};
use crate::driver::{LoadState, PageDriver};
use crate::error::EngineError;
use crate::selector::testid_selector;

/// A validated step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Click { testid: String },
    Fill { testid: String, value: String },
    ExpectText { testid: String, expected: String },
    ExpectAttr { testid: String, attr: String, expected: String },
    ExpectUrlContains { expected: String },
    ExpectPageTitle { expected: String },
    WaitForSelector { testid: String },
    WaitForPageLoad,
}

/// A stored step that cannot be executed as written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeError(pub String);

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn required(step: &TestStep, field: &str, value: &Option<String>) -> Result<String, ShapeError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.clone()),
        _ => Err(ShapeError(format!(
            "Step {} ({}) requires a {}",
            step.step_order, step.action, field
        ))),
    }
}

impl Action {
    pub fn from_step(step: &TestStep) -> Result<Self, ShapeError> {
        let kind = &step.action;
        let testid = if kind.requires_selector() {
            required(step, "selector", &step.selector)?
        } else {
            String::new()
        };
        let attr = if kind.requires_attr() {
            required(step, "attribute name", &step.attr)?
        } else {
            String::new()
        };
        // Expected text may legitimately be whitespace, only absence is rejected
        let expected = match (&step.value, kind.requires_value()) {
            (Some(v), _) => v.clone(),
            (None, false) => String::new(),
            (None, true) => {
                return Err(ShapeError(format!(
                    "Step {} ({}) requires a value",
                    step.step_order, step.action
                )))
            }
        };

        Ok(match kind {
            ActionKind::Click => Action::Click { testid },
            ActionKind::Fill => Action::Fill { testid, value: expected },
            ActionKind::ExpectText => Action::ExpectText { testid, expected },
            ActionKind::ExpectAttr => Action::ExpectAttr { testid, attr, expected },
            ActionKind::ExpectUrlContains => Action::ExpectUrlContains { expected },
            ActionKind::ExpectPageTitle => Action::ExpectPageTitle { expected },
            ActionKind::WaitForSelector => Action::WaitForSelector { testid },
            ActionKind::WaitForPageLoad => Action::WaitForPageLoad,
            ActionKind::Unrecognized(name) => {
                return Err(ShapeError(format!("Unknown action: {}", name)));
            }
        })
    }
}

/// Why a step stopped the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepFailure {
    /// The check ran and did not hold
    Assertion(String),
    /// The check could not be evaluated
    Infrastructure(String),
}

impl StepFailure {
    pub fn status(&self) -> RunStatus {
        match self {
            StepFailure::Assertion(_) => RunStatus::Failed,
            StepFailure::Infrastructure(_) => RunStatus::Error,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            StepFailure::Assertion(m) | StepFailure::Infrastructure(m) => m,
        }
    }
}

impl From<EngineError> for StepFailure {
    fn from(e: EngineError) -> Self {
        StepFailure::Infrastructure(e.to_string())
    }
}

impl From<AssertionFailure> for StepFailure {
    fn from(e: AssertionFailure) -> Self {
        StepFailure::Assertion(e.0)
    }
}

impl From<ShapeError> for StepFailure {
    fn from(e: ShapeError) -> Self {
        StepFailure::Infrastructure(e.0)
    }
}

/// Run state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Loaded,
    /// Index into the ordered step list
    Running(usize),
    Passed,
    Failed,
    Error,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Passed | RunState::Failed | RunState::Error)
    }
}

/// Human-readable run trail
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    lines: Vec<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        debug!(target: "mailproof::transcript", "{}", line);
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// Drives one scenario's steps against one page
#[derive(Debug)]
pub struct Interpreter {
    state: RunState,
    started: Option<Instant>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            started: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// When the first step was dispatched
    pub fn started_at(&self) -> Option<Instant> {
        self.started
    }

    /// Navigate to the scenario document
    pub async fn load(
        &mut self,
        page: &mut dyn PageDriver,
        url: &str,
        transcript: &mut Transcript,
    ) -> Result<(), StepFailure> {
        transcript.push(format!("Navigating to {}", url));
        let loaded = async {
            page.goto(url).await?;
            page.wait_for_load(LoadState::Load).await
        }
        .await;

        match loaded {
            Ok(()) => {
                self.state = RunState::Loaded;
                transcript.push("Document loaded");
                Ok(())
            }
            Err(e) => {
                self.state = RunState::Error;
                let failure = StepFailure::Infrastructure(format!("Failed to load document: {}", e));
                transcript.push(failure.message().to_string());
                Err(failure)
            }
        }
    }

    /// Execute `steps` in order, stopping at the first failure
    pub async fn execute(
        &mut self,
        page: &mut dyn PageDriver,
        steps: &[&TestStep],
        transcript: &mut Transcript,
    ) -> Result<(), StepFailure> {
        if self.state != RunState::Loaded {
            return Err(StepFailure::Infrastructure(format!(
                "Cannot execute steps from state {:?}",
                self.state
            )));
        }
        self.started = Some(Instant::now());

        for (index, step) in steps.iter().enumerate() {
            self.state = RunState::Running(index);
            transcript.push(format!("Executing step {}: {}", step.step_order, step.label()));

            let outcome = match Action::from_step(step) {
                Ok(action) => dispatch(page, &action, transcript).await,
                Err(shape) => Err(StepFailure::from(shape)),
            };

            if let Err(failure) = outcome {
                self.state = match failure {
                    StepFailure::Assertion(_) => RunState::Failed,
                    StepFailure::Infrastructure(_) => RunState::Error,
                };
                let verb = match failure {
                    StepFailure::Assertion(_) => "failed",
                    StepFailure::Infrastructure(_) => "errored",
                };
                transcript.push(format!("Step {} {}: {}", step.step_order, verb, failure.message()));
                return Err(failure);
            }

            transcript.push(format!("Step {} completed successfully", step.step_order));
        }

        self.state = RunState::Passed;
        Ok(())
    }
}

async fn dispatch(
    page: &mut dyn PageDriver,
    action: &Action,
    transcript: &mut Transcript,
) -> Result<(), StepFailure> {
    match action {
        Action::Click { testid } => page.click(&testid_selector(testid)).await?,
        Action::Fill { testid, value } => page.fill(&testid_selector(testid), value).await?,
        Action::ExpectText { testid, expected } => {
            let actual = page
                .text_content(&testid_selector(testid))
                .await?
                .unwrap_or_default();
            transcript.push(format!("Found text: '{}'", assert::normalize_text(&actual)));
            transcript.push(format!("Expected text: '{}'", assert::normalize_text(expected)));
            assert::expect_text(&actual, expected)?;
        }
        Action::ExpectAttr {
            testid,
            attr,
            expected,
        } => {
            let actual = page.attribute(&testid_selector(testid), attr).await?;
            transcript.push(format!(
                "Found {}: {}",
                attr,
                actual.as_deref().unwrap_or("<absent>")
            ));
            assert::expect_attr(attr, actual.as_deref(), expected)?;
        }
        Action::ExpectUrlContains { expected } => {
            let url = page.current_url().await?;
            transcript.push(format!("Current URL: {}", url));
            assert::expect_url_contains(&url, expected)?;
        }
        Action::ExpectPageTitle { expected } => {
            let title = page.title().await?;
            transcript.push(format!("Page title: '{}'", title));
            assert::expect_title(&title, expected)?;
        }
        Action::WaitForSelector { testid } => page.wait_for_selector(&testid_selector(testid)).await?,
        Action::WaitForPageLoad => page.wait_for_load(LoadState::DomContentLoaded).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailproof_common::{StepDraft, TestScenario};

    fn step(draft: StepDraft) -> TestStep {
        let mut scenario = TestScenario::new("s", "s", "<p></p>");
        let id = scenario.add_step(draft);
        scenario.step(id).unwrap().clone()
    }

    #[test]
    fn test_from_step_typed() {
        let action = Action::from_step(&step(
            StepDraft::new(1, "expectAttr").selector("cta").attr("href").value("/offer"),
        ))
        .unwrap();
        assert_eq!(
            action,
            Action::ExpectAttr {
                testid: "cta".into(),
                attr: "href".into(),
                expected: "/offer".into()
            }
        );
    }

    #[test]
    fn test_from_step_rejects_missing_fields() {
        let err = Action::from_step(&step(StepDraft::new(2, "click"))).unwrap_err();
        assert!(err.0.contains("selector"));

        let err = Action::from_step(&step(StepDraft::new(3, "expectText").selector("h"))).unwrap_err();
        assert!(err.0.contains("value"));

        let err = Action::from_step(&step(StepDraft::new(4, "expectAttr").selector("h").value("x")))
            .unwrap_err();
        assert!(err.0.contains("attribute"));
    }

    #[test]
    fn test_bare_step_rejected_exactly_when_fields_are_required() {
        for kind in ActionKind::RECOGNIZED {
            let needs_fields = kind.requires_selector() || kind.requires_value() || kind.requires_attr();
            let parsed = Action::from_step(&step(StepDraft::new(1, kind.as_str())));
            assert_eq!(parsed.is_err(), needs_fields, "{}", kind);
        }
    }

    #[test]
    fn test_whitespace_value_is_accepted() {
        let action = Action::from_step(&step(StepDraft::new(1, "fill").selector("name").value(" "))).unwrap();
        assert_eq!(
            action,
            Action::Fill {
                testid: "name".into(),
                value: " ".into()
            }
        );
    }

    #[test]
    fn test_unknown_action_is_infrastructure() {
        let err = Action::from_step(&step(StepDraft::new(1, "hover").selector("x"))).unwrap_err();
        assert_eq!(err.0, "Unknown action: hover");
        assert_eq!(StepFailure::from(err).status(), RunStatus::Error);
    }

    #[test]
    fn test_wait_for_page_load_needs_nothing() {
        assert_eq!(
            Action::from_step(&step(StepDraft::new(1, "waitForPageLoad"))).unwrap(),
            Action::WaitForPageLoad
        );
    }

    #[test]
    fn test_failure_classification() {
        assert_eq!(StepFailure::Assertion("x".into()).status(), RunStatus::Failed);
        let timeout = StepFailure::from(EngineError::Timeout("waiting for cta".into()));
        assert_eq!(timeout.status(), RunStatus::Error);
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Running(0).is_terminal());
    }
}
