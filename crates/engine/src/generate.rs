//! Batch generation: every template in every locale its copy can satisfy

use mailproof_common::locale::{self, Resolution};
use mailproof_common::render::render;
use mailproof_common::{ArtifactSink, GeneratedEmail, ProjectBundle, Template};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::capture::{CaptureKind, ScreenshotArtifact, ScreenshotCapturer};
use crate::error::{EngineError, EngineResult};

/// A locale the copy pool cannot cover yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedLocale {
    pub template_id: String,
    pub locale: String,
    pub missing: Vec<String>,
}

/// A (template, locale) pair that was attempted and did not produce an email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub template_id: String,
    pub locale: String,
    pub reason: String,
}

/// One stored email plus its thumbnail details, if captured
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub email: GeneratedEmail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<ScreenshotArtifact>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationReport {
    pub generated: usize,
    pub artifacts: Vec<GeneratedArtifact>,
    pub skipped: Vec<SkippedLocale>,
    pub failures: Vec<GenerationFailure>,
    /// Emails stored without a thumbnail because capture failed
    pub capture_failures: usize,
    pub duration_ms: u64,
}

/// Renders, captures and records emails
pub struct Generator {
    sink: Arc<dyn ArtifactSink>,
    capturer: Option<ScreenshotCapturer>,
}

impl Generator {
    /// `capturer` of `None` disables thumbnails
    pub fn new(sink: Arc<dyn ArtifactSink>, capturer: Option<ScreenshotCapturer>) -> Self {
        Self { sink, capturer }
    }

    /// Generate every resolvable (template, locale) pair in the bundle
    ///
    /// Only a storage failure aborts the batch.
    pub async fn generate(&self, bundle: &ProjectBundle) -> EngineResult<GenerationReport> {
        let start = Instant::now();
        let mut report = GenerationReport::default();

        for template in &bundle.templates {
            self.generate_template(template, bundle, &mut report).await?;
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Generated {} email(s), {} locale(s) skipped, {} failure(s) ({} ms)",
            report.generated,
            report.skipped.len(),
            report.failures.len(),
            report.duration_ms
        );
        Ok(report)
    }

    async fn generate_template(
        &self,
        template: &Template,
        bundle: &ProjectBundle,
        report: &mut GenerationReport,
    ) -> EngineResult<()> {
        let placeholders = template.placeholders();
        let entries = bundle.copy_for(&template.id);
        let locales = locale::requested_locales(&entries);

        debug!(
            "Template {}: {} placeholder(s), {} locale(s)",
            template.id,
            placeholders.len(),
            locales.len()
        );

        for requested in locales {
            let copy = match locale::resolve(&placeholders, &requested, &entries) {
                Resolution::Resolved(copy) => copy,
                Resolution::Unresolvable { locale, missing } => {
                    debug!(
                        "Skipping {} for template {}: missing {:?}",
                        locale, template.id, missing
                    );
                    report.skipped.push(SkippedLocale {
                        template_id: template.id.clone(),
                        locale,
                        missing: missing.into_iter().collect(),
                    });
                    continue;
                }
            };

            let rendered = render(&template.content, &copy.values);
            if !rendered.is_complete() {
                warn!(
                    "Template {} ({}) rendered with unresolved keys {:?}",
                    template.id, requested, rendered.unresolved
                );
                report.failures.push(GenerationFailure {
                    template_id: template.id.clone(),
                    locale: requested.clone(),
                    reason: format!("unresolved placeholders: {:?}", rendered.unresolved),
                });
                continue;
            }

            let thumbnail = match &self.capturer {
                Some(capturer) => match capturer.capture(&rendered.html, &CaptureKind::Thumbnail).await {
                    Ok(artifact) => Some(artifact),
                    Err(e) => {
                        warn!(
                            "Thumbnail capture failed for template {} ({}): {}",
                            template.id, requested, e
                        );
                        report.capture_failures += 1;
                        None
                    }
                },
                None => None,
            };

            let email = GeneratedEmail::new(
                &template.id,
                &requested,
                rendered.html,
                thumbnail.as_ref().map(|t| t.relative_path.clone()),
            );

            match self.sink.record_email(&email) {
                Ok(()) => {}
                Err(e) if e.is_storage() => {
                    error!("Storage failure while recording email: {}", e);
                    return Err(EngineError::from(e));
                }
                Err(e) => {
                    report.failures.push(GenerationFailure {
                        template_id: template.id.clone(),
                        locale: requested.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            }

            info!("Generated {} ({})", template.id, requested);
            report.generated += 1;
            report.artifacts.push(GeneratedArtifact { email, thumbnail });
        }

        Ok(())
    }
}
