//! Template preview command

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use mailproof_engine::ScreenshotArtifact;
use serde::Serialize;

use super::{load_bundle, Context};
use crate::output::{print_item, print_success, TableDisplay};

#[derive(Args)]
pub struct PreviewArgs {
    /// Project bundle with templates and copy
    pub project: PathBuf,

    /// Template to preview
    pub template_id: String,

    /// Capture a new preview even if one exists
    #[arg(long)]
    pub refresh: bool,

    /// Delete every stored preview of the template
    #[arg(long, conflicts_with = "refresh")]
    pub delete: bool,
}

/// Preview display wrapper
#[derive(Serialize)]
pub struct PreviewDisplay {
    pub template_id: String,
    pub path: String,
    pub file: PathBuf,
    pub width: u32,
    pub height: u32,
    pub sha256: String,
}

impl TableDisplay for PreviewDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Template", "Path", "Size", "SHA256"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.template_id.clone(),
            self.path.clone(),
            format!("{}x{}", self.width, self.height),
            self.sha256[..16].to_string(),
        ]
    }
}

pub async fn execute(args: PreviewArgs, ctx: &Context) -> Result<()> {
    let capturer = ctx.capturer().await?;

    if args.delete {
        let removed = capturer.delete_previews(&args.template_id).await?;
        print_success(&format!(
            "Deleted {} preview(s) for template {}",
            removed, args.template_id
        ));
        return Ok(());
    }

    let bundle = load_bundle(&args.project, Some(&args.template_id))?;
    let template = bundle
        .template(&args.template_id)
        .context("template missing from bundle")?;

    let artifact: ScreenshotArtifact = if args.refresh {
        capturer.refresh_preview(template).await?
    } else {
        capturer.template_preview(template).await?
    };

    let display = PreviewDisplay {
        template_id: template.id.clone(),
        file: capturer.store().absolute(&artifact.relative_path),
        path: artifact.relative_path,
        width: artifact.width,
        height: artifact.height,
        sha256: artifact.sha256,
    };
    print_item(&display, ctx.format)
}
