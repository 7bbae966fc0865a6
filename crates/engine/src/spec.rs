//! Declarative YAML scenario files
//!
//! ```yaml
//! name: order-confirmation
//! description: Clicking the CTA reveals the confirmation
//! tags: [smoke]
//! html_file: order.html
//! steps:
//!   - action: click
//!     selector: cta
//!   - action: expectText
//!     selector: result
//!     value: Done
//! ```

use mailproof_common::{StepDraft, TestScenario};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};

/// A scenario as authored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioFile {
    /// Stable id; defaults to the file stem, then the name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Inactive scenarios are listed but not run
    #[serde(default = "default_active")]
    pub active: bool,

    /// Inline document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    /// Document path, relative to the scenario file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_file: Option<PathBuf>,

    /// Steps to execute in order
    pub steps: Vec<StepSpec>,
}

fn default_active() -> bool {
    true
}

/// A single authored step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Execution order; defaults to the position in the list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl StepSpec {
    fn draft(&self, position: usize) -> StepDraft {
        StepDraft {
            step_order: self.order.unwrap_or(position as i64),
            action: self.action.clone(),
            selector: self.selector.clone(),
            value: self.value.clone(),
            attr: self.attr.clone(),
            description: self.description.clone(),
        }
    }
}

/// A loaded scenario file
#[derive(Debug, Clone)]
pub struct LoadedScenario {
    pub path: Option<PathBuf>,
    pub tags: Vec<String>,
    pub scenario: TestScenario,
}

impl ScenarioFile {
    /// Parse a scenario from YAML string
    pub fn from_yaml(yaml: &str) -> EngineResult<Self> {
        serde_yaml::from_str(yaml).map_err(EngineError::from)
    }

    /// Resolve the document and steps into a runnable scenario
    ///
    /// `base_dir` anchors a relative `html_file`.
    pub fn into_scenario(self, fallback_id: Option<&str>, base_dir: &Path) -> EngineResult<TestScenario> {
        let (html, html_filename) = match (self.html, &self.html_file) {
            (Some(html), None) => (html, None),
            (None, Some(file)) => {
                let path = if file.is_absolute() {
                    file.clone()
                } else {
                    base_dir.join(file)
                };
                let html = std::fs::read_to_string(&path).map_err(|e| {
                    EngineError::ScenarioParse(format!("cannot read {}: {}", path.display(), e))
                })?;
                let name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string());
                (html, name)
            }
            (Some(_), Some(_)) => {
                return Err(EngineError::ScenarioParse(format!(
                    "scenario '{}' sets both html and html_file",
                    self.name
                )))
            }
            (None, None) => {
                return Err(EngineError::ScenarioParse(format!(
                    "scenario '{}' needs html or html_file",
                    self.name
                )))
            }
        };

        let id = self
            .id
            .or_else(|| fallback_id.map(String::from))
            .unwrap_or_else(|| self.name.clone());

        let mut scenario = TestScenario::new(id, self.name, html);
        scenario.description = self.description;
        scenario.html_filename = html_filename;
        scenario.is_active = self.active;
        for (position, step) in self.steps.iter().enumerate() {
            scenario.add_step(step.draft(position));
        }
        Ok(scenario)
    }

    /// Load a scenario file, resolving `html_file` next to it
    pub fn load(path: &Path) -> EngineResult<LoadedScenario> {
        let content = std::fs::read_to_string(path)?;
        let file = Self::from_yaml(&content)
            .map_err(|e| EngineError::ScenarioParse(format!("{}: {}", path.display(), e)))?;
        let tags = file.tags.clone();
        let stem = path.file_stem().map(|s| s.to_string_lossy().to_string());
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        Ok(LoadedScenario {
            path: Some(path.to_path_buf()),
            tags,
            scenario: file.into_scenario(stem.as_deref(), base_dir)?,
        })
    }

    /// Load all scenario files under a directory, sorted by path
    pub fn load_all(dir: &Path) -> EngineResult<Vec<LoadedScenario>> {
        let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        paths.iter().map(|p| Self::load(p)).collect()
    }

    /// Load a single file or every file under a directory
    pub fn load_path(path: &Path) -> EngineResult<Vec<LoadedScenario>> {
        if path.is_dir() {
            Self::load_all(path)
        } else {
            Ok(vec![Self::load(path)?])
        }
    }
}

/// Filter loaded scenarios by tag
pub fn filter_by_tag<'a>(scenarios: &'a [LoadedScenario], tag: &str) -> Vec<&'a LoadedScenario> {
    scenarios.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
}
