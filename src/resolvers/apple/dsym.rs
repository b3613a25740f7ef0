//! `upload dsym`: dSYMs anywhere in a path tree, or through a scheme.

use super::xcode_build;
use super::{DsymFlags, find_dsyms, resolve_locations};
use crate::error::{AppError, Result};
use crate::model::ArtifactKind;
use crate::resolvers::ResolveContext;
use crate::tools::xcodebuild::find_project_or_workspace;
use crate::upload::UploadPlan;
use std::path::PathBuf;

/// `upload dsym`
#[derive(Debug, Clone, Default, clap::Args)]
pub struct DsymOptions {
    #[command(flatten)]
    pub flags: DsymFlags,
    /// Locate the dSYM through this scheme's build settings instead of
    /// walking the path
    #[arg(long)]
    pub scheme: Option<String>,
    /// Build configuration used with --scheme
    #[arg(long)]
    pub configuration: Option<String>,
    /// Xcode project or workspace used with --scheme
    #[arg(long)]
    pub xcode_project: Option<PathBuf>,
    /// dSYM bundles, directories containing them, zips or DWARF files
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,
}

/// One plan per input path.
///
/// Without `--scheme` every dSYM below the path is uploaded. With it, only
/// the dSYM named by the scheme's build settings is.
pub async fn resolve(ctx: &ResolveContext<'_>, options: &DsymOptions) -> Result<Vec<UploadPlan>> {
    let mut plans = Vec::new();
    for path in &options.paths {
        let plan = match options.scheme.as_deref() {
            Some(scheme) => {
                let project = options
                    .xcode_project
                    .clone()
                    .or_else(|| find_project_or_workspace(path))
                    .ok_or_else(|| AppError::NotFound {
                        what: format!("an Xcode project or workspace for scheme {scheme}"),
                    })?;
                xcode_build::resolve_path(
                    ctx,
                    ArtifactKind::Dsym,
                    &options.flags,
                    &project,
                    Some(&project),
                    Some(scheme),
                    options.configuration.as_deref(),
                )
                .await?
            }
            None => {
                let found = find_dsyms(path)?;
                if found.locations.is_empty() {
                    return Err(AppError::NotFound {
                        what: format!("dSYM files in {}", path.display()),
                    });
                }
                let (plan, _) =
                    resolve_locations(ctx, ArtifactKind::Dsym, &options.flags, None, None, found).await?;
                plan
            }
        };
        plans.push(plan);
    }
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{LogLevel, OutputManager};
    use crate::resolvers::tests::context;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_scheme_without_project_fails() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let options = DsymOptions {
            scheme: Some("App".into()),
            paths: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        let err = resolve(&ctx, &options).await.unwrap_err();
        assert!(err.to_string().contains("scheme App"));
    }

    #[tokio::test]
    async fn test_tree_without_dsyms_fails() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let options = DsymOptions {
            paths: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        assert!(matches!(
            resolve(&ctx, &options).await,
            Err(AppError::NotFound { .. })
        ));
    }
}
