//! Persistence boundary for generated emails and test results
//!
//! The engine only ever creates and reads records through [`ArtifactSink`].
//! [`crate::Database`] is the durable implementation; [`MemorySink`] backs
//! tests and dry runs.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::types::{GeneratedEmail, TestResult};
use crate::Result;

/// Create/read access to generation and verification output
pub trait ArtifactSink: Send + Sync {
    fn record_email(&self, email: &GeneratedEmail) -> Result<()>;

    fn emails_for_template(&self, template_id: &str) -> Result<Vec<GeneratedEmail>>;

    fn record_result(&self, result: &TestResult) -> Result<()>;

    /// Result history for a scenario, newest first
    fn results_for_scenario(&self, scenario_id: &str) -> Result<Vec<TestResult>>;

    fn latest_result(&self, scenario_id: &str) -> Result<Option<TestResult>> {
        Ok(self.results_for_scenario(scenario_id)?.into_iter().next())
    }
}

impl<S: ArtifactSink + ?Sized> ArtifactSink for Arc<S> {
    fn record_email(&self, email: &GeneratedEmail) -> Result<()> {
        (**self).record_email(email)
    }

    fn emails_for_template(&self, template_id: &str) -> Result<Vec<GeneratedEmail>> {
        (**self).emails_for_template(template_id)
    }

    fn record_result(&self, result: &TestResult) -> Result<()> {
        (**self).record_result(result)
    }

    fn results_for_scenario(&self, scenario_id: &str) -> Result<Vec<TestResult>> {
        (**self).results_for_scenario(scenario_id)
    }

    fn latest_result(&self, scenario_id: &str) -> Result<Option<TestResult>> {
        (**self).latest_result(scenario_id)
    }
}

/// In-process sink
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    emails: Arc<Mutex<Vec<GeneratedEmail>>>,
    results: Arc<Mutex<Vec<TestResult>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emails(&self) -> Vec<GeneratedEmail> {
        self.emails.lock().clone()
    }

    pub fn results(&self) -> Vec<TestResult> {
        self.results.lock().clone()
    }
}

impl ArtifactSink for MemorySink {
    fn record_email(&self, email: &GeneratedEmail) -> Result<()> {
        self.emails.lock().push(email.clone());
        Ok(())
    }

    fn emails_for_template(&self, template_id: &str) -> Result<Vec<GeneratedEmail>> {
        Ok(self
            .emails
            .lock()
            .iter()
            .filter(|e| e.template_id == template_id)
            .cloned()
            .collect())
    }

    fn record_result(&self, result: &TestResult) -> Result<()> {
        self.results.lock().push(result.clone());
        Ok(())
    }

    fn results_for_scenario(&self, scenario_id: &str) -> Result<Vec<TestResult>> {
        let results = self.results.lock();
        // Insertion order breaks timestamp ties, newest first.
        let mut matching: Vec<(usize, &TestResult)> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.scenario_id == scenario_id)
            .collect();
        matching.sort_by(|(ia, a), (ib, b)| b.executed_at.cmp(&a.executed_at).then(ib.cmp(ia)));
        Ok(matching.into_iter().map(|(_, r)| r.clone()).collect())
    }
}
