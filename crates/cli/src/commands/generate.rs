//! Batch generation command

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use mailproof_common::ArtifactSink;
use mailproof_engine::generate::GeneratedArtifact;
use mailproof_engine::Generator;
use serde::Serialize;

use super::{load_bundle, Context};
use crate::output::{
    format_duration, print_document, print_error, print_list, print_warning, spinner, OutputFormat,
    TableDisplay,
};

#[derive(Args)]
pub struct GenerateArgs {
    /// Project bundle with templates and copy (YAML or JSON)
    pub project: PathBuf,

    /// Only generate this template
    #[arg(short, long)]
    pub template: Option<String>,

    /// Skip thumbnail capture
    #[arg(long)]
    pub no_thumbnails: bool,
}

/// Generated email display wrapper
#[derive(Serialize)]
pub struct EmailDisplay {
    pub id: String,
    pub template_id: String,
    pub locale: String,
    pub thumbnail: Option<String>,
    pub size: Option<String>,
}

impl From<&GeneratedArtifact> for EmailDisplay {
    fn from(artifact: &GeneratedArtifact) -> Self {
        Self {
            id: artifact.email.id.to_string(),
            template_id: artifact.email.template_id.clone(),
            locale: artifact.email.locale.clone(),
            thumbnail: artifact.email.screenshot.clone(),
            size: artifact
                .thumbnail
                .as_ref()
                .map(|t| format!("{}x{}", t.width, t.height)),
        }
    }
}

impl TableDisplay for EmailDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Template", "Locale", "Thumbnail", "Size"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id[..8].to_string(),
            self.template_id.clone(),
            self.locale.clone(),
            self.thumbnail.clone().unwrap_or_else(|| "-".into()),
            self.size.clone().unwrap_or_else(|| "-".into()),
        ]
    }
}

pub async fn execute(args: GenerateArgs, ctx: &Context) -> Result<()> {
    let bundle = load_bundle(&args.project, args.template.as_deref())?;
    let sink: Arc<dyn ArtifactSink> = Arc::new(ctx.database()?);

    let capturer = if ctx.config.generation.thumbnails && !args.no_thumbnails {
        let capturer = ctx.capturer().await?;
        match ctx.launcher().check_installed() {
            Ok(()) => Some(capturer),
            Err(e) => {
                print_warning(&format!("{}; generating without thumbnails", e));
                None
            }
        }
    } else {
        None
    };

    let progress = spinner(
        &format!("Generating {} template(s)", bundle.templates.len()),
        ctx.format,
    );
    let report = Generator::new(sink, capturer).generate(&bundle).await;
    progress.finish_and_clear();
    let report = report?;

    if ctx.format.is_structured() {
        return print_document(&report, ctx.format);
    }

    let displays: Vec<EmailDisplay> = report.artifacts.iter().map(EmailDisplay::from).collect();
    print_list(&displays, ctx.format)?;

    for skipped in &report.skipped {
        print_warning(&format!(
            "{} [{}] skipped, missing copy: {}",
            skipped.template_id,
            skipped.locale,
            skipped.missing.join(", ")
        ));
    }
    for failure in &report.failures {
        print_error(&format!(
            "{} [{}] failed: {}",
            failure.template_id, failure.locale, failure.reason
        ));
    }

    if ctx.format == OutputFormat::Table {
        println!();
        println!(
            "{} generated, {} skipped, {} failed in {}",
            report.generated.to_string().green().bold(),
            report.skipped.len().to_string().yellow(),
            report.failures.len().to_string().red(),
            format_duration(report.duration_ms)
        );
        if report.capture_failures > 0 {
            println!(
                "{}",
                format!("{} thumbnail capture(s) failed", report.capture_failures).dimmed()
            );
        }
    }

    Ok(())
}
