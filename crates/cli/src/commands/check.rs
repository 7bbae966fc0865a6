//! Inline checks over generated emails

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;
use mailproof_common::ArtifactSink;
use mailproof_engine::inline::{check_email, EmailCheck};
use mailproof_engine::InlineStep;
use serde::Serialize;

use super::{load_bundle, Context};
use crate::output::{print_document, print_list, truncate, TableDisplay};

#[derive(Args)]
pub struct CheckArgs {
    /// Project bundle whose templates are checked
    pub project: PathBuf,

    /// Only check this template
    #[arg(short, long)]
    pub template: Option<String>,

    /// JSON file with extra steps: [{"type": "expectText", "selector": "...", "text": "..."}]
    #[arg(long)]
    pub steps: Option<PathBuf>,

    /// Check every stored email, not just the newest per locale
    #[arg(long)]
    pub all: bool,
}

/// Check display wrapper
#[derive(Serialize)]
pub struct CheckDisplay {
    #[serde(flatten)]
    pub check: EmailCheck,
}

impl TableDisplay for CheckDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Email", "Template", "Locale", "Result", "Issues"]
    }

    fn row(&self) -> Vec<String> {
        let result = if self.check.report.passed {
            "✓ passed".green().to_string()
        } else {
            "✗ failed".red().to_string()
        };
        vec![
            self.check.email_id.to_string()[..8].to_string(),
            self.check.template_id.clone(),
            self.check.locale.clone(),
            result,
            truncate(&self.check.report.issues.join("; "), 80),
        ]
    }
}

pub async fn execute(args: CheckArgs, ctx: &Context) -> Result<()> {
    let bundle = load_bundle(&args.project, args.template.as_deref())?;
    let steps = match &args.steps {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading steps from {}", path.display()))?;
            InlineStep::parse_list(&json)?
        }
        None => Vec::new(),
    };

    let db = ctx.database()?;
    let mut checks = Vec::new();
    for template in &bundle.templates {
        // Newest first, so the first email per locale is the latest
        let mut seen = HashSet::new();
        for email in db.emails_for_template(&template.id)? {
            if !args.all && !seen.insert(email.locale.clone()) {
                continue;
            }
            checks.push(CheckDisplay {
                check: check_email(&email, &steps),
            });
        }
    }

    let failed = checks.iter().filter(|c| !c.check.report.passed).count();

    if ctx.format.is_structured() {
        let reports: Vec<&EmailCheck> = checks.iter().map(|c| &c.check).collect();
        print_document(&reports, ctx.format)?;
    } else {
        print_list(&checks, ctx.format)?;
        println!();
        println!(
            "{} checked, {} with issues",
            checks.len(),
            if failed == 0 {
                failed.to_string().green()
            } else {
                failed.to_string().red()
            }
        );
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
