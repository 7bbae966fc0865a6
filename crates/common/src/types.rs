//! Core types for mailproof

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

use crate::placeholder;
use crate::{Error, Result};

/// Browser viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Viewport for generated-email thumbnails
    pub const THUMBNAIL: Viewport = Viewport {
        width: 600,
        height: 800,
    };

    /// Viewport for template previews
    pub const TEMPLATE_PREVIEW: Viewport = Viewport {
        width: 800,
        height: 600,
    };
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ============================================================================
// Templates and copy
// ============================================================================

/// An uploaded email template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    #[serde(default)]
    pub filename: String,
    /// Owning campaign or group, opaque to the engine
    #[serde(default)]
    pub group: Option<String>,
    pub content: String,
}

impl Template {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            filename: String::new(),
            group: None,
            content: content.into(),
        }
    }

    /// Placeholder keys, always recomputed from the markup
    pub fn placeholders(&self) -> BTreeSet<String> {
        placeholder::extract(&self.content)
    }
}

/// A localized copy string for one template key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyEntry {
    pub template_id: String,
    pub locale: String,
    pub key: String,
    pub value: String,
    /// Workflow label (draft, approved, ...); rendering ignores it
    #[serde(default = "default_copy_status")]
    pub status: String,
}

fn default_copy_status() -> String {
    "draft".to_string()
}

impl CopyEntry {
    pub fn new(
        template_id: impl Into<String>,
        locale: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            template_id: template_id.into(),
            locale: locale.into(),
            key: key.into(),
            value: value.into(),
            status: default_copy_status(),
        }
    }
}

/// Rendered output for one (template, locale) pair. Never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedEmail {
    pub id: Uuid,
    pub template_id: String,
    pub locale: String,
    pub html: String,
    /// Relative path of the thumbnail, if one was captured
    pub screenshot: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl GeneratedEmail {
    pub fn new(template_id: &str, locale: &str, html: String, screenshot: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            template_id: template_id.to_string(),
            locale: locale.to_string(),
            html,
            screenshot,
            generated_at: Utc::now(),
        }
    }
}

/// Templates and copy pool handed over by the CRUD layer for one project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectBundle {
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub copy: Vec<CopyEntry>,
}

impl ProjectBundle {
    /// Parse a bundle from YAML (JSON is accepted too)
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn template(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Copy entries scoped to one template
    pub fn copy_for(&self, template_id: &str) -> Vec<CopyEntry> {
        self.copy
            .iter()
            .filter(|c| c.template_id == template_id)
            .cloned()
            .collect()
    }
}

// ============================================================================
// Scenarios and steps
// ============================================================================

/// Scenario-builder action vocabulary.
///
/// Unknown action names survive deserialization as `Unrecognized` so the
/// interpreter can report them as an infrastructure error instead of the
/// scenario failing to load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    Click,
    Fill,
    ExpectText,
    ExpectAttr,
    ExpectUrlContains,
    ExpectPageTitle,
    WaitForSelector,
    WaitForPageLoad,
    Unrecognized(String),
}

impl ActionKind {
    /// Every recognized action, in documentation order
    pub const RECOGNIZED: [ActionKind; 8] = [
        ActionKind::Click,
        ActionKind::Fill,
        ActionKind::ExpectText,
        ActionKind::ExpectAttr,
        ActionKind::ExpectUrlContains,
        ActionKind::ExpectPageTitle,
        ActionKind::WaitForSelector,
        ActionKind::WaitForPageLoad,
    ];

    pub fn parse(name: &str) -> Self {
        match name {
            "click" => ActionKind::Click,
            "fill" => ActionKind::Fill,
            "expectText" => ActionKind::ExpectText,
            "expectAttr" => ActionKind::ExpectAttr,
            "expectUrlContains" => ActionKind::ExpectUrlContains,
            "expectPageTitle" => ActionKind::ExpectPageTitle,
            "waitForSelector" => ActionKind::WaitForSelector,
            "waitForPageLoad" => ActionKind::WaitForPageLoad,
            other => ActionKind::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Fill => "fill",
            ActionKind::ExpectText => "expectText",
            ActionKind::ExpectAttr => "expectAttr",
            ActionKind::ExpectUrlContains => "expectUrlContains",
            ActionKind::ExpectPageTitle => "expectPageTitle",
            ActionKind::WaitForSelector => "waitForSelector",
            ActionKind::WaitForPageLoad => "waitForPageLoad",
            ActionKind::Unrecognized(name) => name,
        }
    }

    /// Shape rules enforced before a step is dispatched
    pub fn requires_selector(&self) -> bool {
        matches!(
            self,
            ActionKind::Click
                | ActionKind::Fill
                | ActionKind::ExpectText
                | ActionKind::ExpectAttr
                | ActionKind::WaitForSelector
        )
    }

    pub fn requires_value(&self) -> bool {
        matches!(
            self,
            ActionKind::Fill
                | ActionKind::ExpectText
                | ActionKind::ExpectAttr
                | ActionKind::ExpectUrlContains
                | ActionKind::ExpectPageTitle
        )
    }

    pub fn requires_attr(&self) -> bool {
        matches!(self, ActionKind::ExpectAttr)
    }
}

impl From<String> for ActionKind {
    fn from(name: String) -> Self {
        ActionKind::parse(&name)
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored step of a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStep {
    /// Creation sequence within the scenario; breaks `step_order` ties
    #[serde(default)]
    pub id: u64,
    pub step_order: i64,
    pub action: ActionKind,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub attr: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TestStep {
    /// Short label used in transcripts
    pub fn label(&self) -> String {
        match &self.selector {
            Some(selector) => format!("{} on {}", self.action, selector),
            None => self.action.to_string(),
        }
    }
}

/// Field values for adding a step or replacing an existing one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepDraft {
    pub step_order: i64,
    pub action: String,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub attr: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl StepDraft {
    pub fn new(step_order: i64, action: &str) -> Self {
        Self {
            step_order,
            action: action.to_string(),
            ..Default::default()
        }
    }

    pub fn selector(mut self, selector: &str) -> Self {
        self.selector = Some(selector.to_string());
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn attr(mut self, attr: &str) -> Self {
        self.attr = Some(attr.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// A named HTML document plus the steps that verify it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestScenario {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub html_filename: Option<String>,
    pub html: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub steps: Vec<TestStep>,
}

fn default_true() -> bool {
    true
}

impl TestScenario {
    pub fn new(id: impl Into<String>, name: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            html_filename: None,
            html: html.into(),
            is_active: true,
            steps: Vec::new(),
        }
    }

    fn next_step_id(&self) -> u64 {
        self.steps.iter().map(|s| s.id).max().map_or(1, |id| id + 1)
    }

    /// Append a step and return its id
    pub fn add_step(&mut self, draft: StepDraft) -> u64 {
        let id = self.next_step_id();
        self.steps.push(TestStep {
            id,
            step_order: draft.step_order,
            action: ActionKind::parse(&draft.action),
            selector: draft.selector,
            value: draft.value,
            attr: draft.attr,
            description: draft.description,
        });
        id
    }

    pub fn step(&self, id: u64) -> Option<&TestStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Replace every field of an existing step
    pub fn update_step(&mut self, id: u64, draft: StepDraft) -> Result<&TestStep> {
        let step = self
            .steps
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::not_found("step", id))?;

        step.step_order = draft.step_order;
        step.action = ActionKind::parse(&draft.action);
        step.selector = draft.selector;
        step.value = draft.value;
        step.attr = draft.attr;
        step.description = draft.description;
        Ok(step)
    }

    pub fn remove_step(&mut self, id: u64) -> bool {
        let before = self.steps.len();
        self.steps.retain(|s| s.id != id);
        self.steps.len() != before
    }

    /// Reassign dense orders following `ids`, which must name every step once
    pub fn reorder(&mut self, ids: &[u64]) -> Result<()> {
        let known: HashSet<u64> = self.steps.iter().map(|s| s.id).collect();
        let requested: HashSet<u64> = ids.iter().copied().collect();
        if ids.len() != self.steps.len() || requested != known {
            return Err(Error::InvalidStep(format!(
                "reorder must list each of the {} step ids exactly once",
                self.steps.len()
            )));
        }

        for (position, id) in ids.iter().enumerate() {
            if let Some(step) = self.steps.iter_mut().find(|s| s.id == *id) {
                step.step_order = position as i64;
            }
        }
        Ok(())
    }

    /// Steps in execution order: `step_order`, then creation order
    pub fn ordered_steps(&self) -> Vec<&TestStep> {
        let mut steps: Vec<&TestStep> = self.steps.iter().collect();
        steps.sort_by_key(|s| (s.step_order, s.id));
        steps
    }
}

// ============================================================================
// Results
// ============================================================================

/// Terminal status of a verification run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Passed,
    Failed,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
            RunStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "passed" => Ok(RunStatus::Passed),
            "failed" => Ok(RunStatus::Failed),
            "error" => Ok(RunStatus::Error),
            other => Err(Error::Internal(format!("unknown run status: {}", other))),
        }
    }
}

/// Outcome of one scenario run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: Uuid,
    pub scenario_id: String,
    pub status: RunStatus,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub error_message: Option<String>,
    pub screenshot_path: Option<String>,
    pub logs: Vec<String>,
    /// Set when the browser could not start and only step shapes were checked
    #[serde(default)]
    pub degraded: bool,
}

/// Latest-result digest shown in scenario listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestResult {
    pub status: RunStatus,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl From<&TestResult> for LatestResult {
    fn from(result: &TestResult) -> Self {
        Self {
            status: result.status,
            executed_at: result.executed_at,
            duration_ms: result.duration_ms,
        }
    }
}

/// One row of a scenario listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub html_filename: Option<String>,
    pub is_active: bool,
    pub step_count: usize,
    pub latest_result: Option<LatestResult>,
}

impl ScenarioSummary {
    pub fn new(scenario: &TestScenario, latest: Option<&TestResult>) -> Self {
        Self {
            id: scenario.id.clone(),
            name: scenario.name.clone(),
            description: scenario.description.clone(),
            html_filename: scenario.html_filename.clone(),
            is_active: scenario.is_active,
            step_count: scenario.steps.len(),
            latest_result: latest.map(LatestResult::from),
        }
    }
}

/// A scenario with its full result history, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDetail {
    #[serde(flatten)]
    pub scenario: TestScenario,
    pub results: Vec<TestResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> TestScenario {
        TestScenario::new("checkout", "Checkout", "<html></html>")
    }

    #[test]
    fn test_action_kind_round_trips_unknown_names() {
        let kind: ActionKind = serde_json::from_str("\"hover\"").unwrap();
        assert_eq!(kind, ActionKind::Unrecognized("hover".to_string()));
        assert!(!kind.requires_selector() && !kind.requires_value());
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"hover\"");

        for action in ActionKind::RECOGNIZED {
            assert_eq!(ActionKind::parse(action.as_str()), action);
        }
    }

    #[test]
    fn test_ordered_steps_break_ties_by_creation() {
        let mut s = scenario();
        let a = s.add_step(StepDraft::new(2, "click").selector("a"));
        let b = s.add_step(StepDraft::new(1, "click").selector("b"));
        let c = s.add_step(StepDraft::new(1, "click").selector("c"));

        let order: Vec<u64> = s.ordered_steps().iter().map(|st| st.id).collect();
        assert_eq!(order, vec![b, c, a]);
    }

    #[test]
    fn test_update_step_replaces_fields() {
        let mut s = scenario();
        let id = s.add_step(StepDraft::new(0, "click").selector("buy").description("buy"));

        s.update_step(
            id,
            StepDraft::new(3, "expectAttr").selector("logo").attr("alt").value("Logo"),
        )
        .unwrap();

        let step = s.step(id).unwrap();
        assert_eq!(step.step_order, 3);
        assert_eq!(step.action, ActionKind::ExpectAttr);
        assert_eq!(step.attr.as_deref(), Some("alt"));
        assert_eq!(step.description, None);

        assert!(s.update_step(99, StepDraft::new(0, "click")).is_err());
    }

    #[test]
    fn test_remove_step_and_ids_stay_unique() {
        let mut s = scenario();
        let first = s.add_step(StepDraft::new(0, "click").selector("a"));
        let second = s.add_step(StepDraft::new(1, "click").selector("b"));
        assert!(s.remove_step(first));
        assert!(!s.remove_step(first));

        let third = s.add_step(StepDraft::new(2, "click").selector("c"));
        assert_ne!(third, second);
        assert_eq!(s.steps.len(), 2);
    }

    #[test]
    fn test_reorder_assigns_dense_orders() {
        let mut s = scenario();
        let a = s.add_step(StepDraft::new(10, "click").selector("a"));
        let b = s.add_step(StepDraft::new(20, "click").selector("b"));
        let c = s.add_step(StepDraft::new(30, "click").selector("c"));

        s.reorder(&[c, a, b]).unwrap();
        let order: Vec<u64> = s.ordered_steps().iter().map(|st| st.id).collect();
        assert_eq!(order, vec![c, a, b]);
        assert_eq!(s.step(c).unwrap().step_order, 0);

        assert!(s.reorder(&[a, b]).is_err());
        assert!(s.reorder(&[a, a, b]).is_err());
    }

    #[test]
    fn test_project_bundle_from_yaml() {
        let yaml = r#"
templates:
  - id: welcome
    content: "<h1>{{ title }}</h1>"
copy:
  - template_id: welcome
    locale: en
    key: title
    value: Welcome
  - template_id: other
    locale: en
    key: title
    value: Other
"#;
        let bundle = ProjectBundle::from_yaml(yaml).unwrap();
        let template = bundle.template("welcome").unwrap();
        assert!(template.placeholders().contains("title"));
        let copy = bundle.copy_for("welcome");
        assert_eq!(copy.len(), 1);
        assert_eq!(copy[0].status, "draft");
    }

    #[test]
    fn test_run_status_parse() {
        assert_eq!("failed".parse::<RunStatus>().unwrap(), RunStatus::Failed);
        assert!("skipped".parse::<RunStatus>().is_err());
    }
}
