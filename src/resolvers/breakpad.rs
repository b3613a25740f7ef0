//! Breakpad `.sym` files. Identity goes in the query string, module details
//! in the form.

use super::{ResolveContext, path_string, require_api_key};
use crate::endpoint::Route;
use crate::error::Result;
use crate::files;
use crate::model::{ArtifactKind, BuildDescriptor};
use crate::upload::{ArtifactFile, BreakpadFields, FilePart, UploadPlan};
use std::path::PathBuf;

/// `upload breakpad`
#[derive(Debug, Clone, Default, clap::Args)]
pub struct BreakpadOptions {
    /// Path prefix to strip from file names in stack traces
    #[arg(long)]
    pub project_root: Option<String>,
    /// CPU architecture of the module
    #[arg(long)]
    pub cpu_arch: Option<String>,
    /// Module file name
    #[arg(long)]
    pub code_file: Option<String>,
    /// Debug file name
    #[arg(long)]
    pub debug_file: Option<String>,
    /// Debug identifier
    #[arg(long)]
    pub debug_identifier: Option<String>,
    /// Product name
    #[arg(long)]
    pub product_name: Option<String>,
    /// Operating system name
    #[arg(long)]
    pub os_name: Option<String>,
    /// Product version
    #[arg(long, alias = "app-version")]
    pub version_name: Option<String>,
    /// `.sym` files or directories holding them
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

/// `.sym` files among `paths`; anything else is skipped with a warning
pub fn sym_files(ctx: &ResolveContext<'_>, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for path in paths {
        files::ensure_exists(path)?;
        if path.is_dir() {
            found.extend(
                files::walk_files(path)?
                    .into_iter()
                    .filter(|f| files::has_extension(f, "sym")),
            );
        } else if files::has_extension(path, "sym") {
            found.push(path.clone());
        } else {
            ctx.output.warn(&format!(
                "Skipping {} (not a .sym file or directory)",
                path.display()
            ));
        }
    }
    Ok(found)
}

/// One plan, one upload per `.sym` file
pub fn resolve(ctx: &ResolveContext<'_>, options: &BreakpadOptions) -> Result<Vec<UploadPlan>> {
    let cli = BuildDescriptor {
        project_root: options.project_root.clone(),
        version_name: options.version_name.clone(),
        ..Default::default()
    };
    let descriptor = ctx.merge(&cli, &BuildDescriptor::default());
    require_api_key(&descriptor)?;

    let symbols = sym_files(ctx, &options.paths)?;
    let mut plan = ctx.plan(ArtifactKind::Breakpad, &descriptor)?;
    if symbols.is_empty() {
        ctx.output.info("No Breakpad .sym files found, skipping upload");
        return Ok(vec![plan]);
    }
    ctx.output.info(&format!(
        "Uploading {} Breakpad .sym files",
        symbols.len()
    ));

    for sym in symbols {
        let fields = BreakpadFields {
            api_key: descriptor.api_key.clone(),
            project_root: descriptor
                .project_root
                .clone()
                .or_else(|| sym.parent().map(path_string)),
            overwrite: ctx.overwrite,
            cpu_arch: options.cpu_arch.clone(),
            code_file: options.code_file.clone(),
            debug_file: options.debug_file.clone(),
            debug_identifier: options.debug_identifier.clone(),
            product_name: options.product_name.clone(),
            os_name: options.os_name.clone(),
            version: descriptor.version_name.clone(),
        };
        let file = ArtifactFile::new(
            Route::BreakpadSymbol,
            &fields,
            FilePart::local("symbol_file", &sym),
        )
        .with_query(fields.query());
        plan.push(file);
    }
    Ok(vec![plan])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{LogLevel, OutputManager, Tag};
    use crate::resolvers::tests::{API_KEY, context};
    use std::fs;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_sym_files_and_query() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("symbols/nested")).unwrap();
        fs::write(dir.path().join("symbols/nested/game.sym"), "MODULE").unwrap();
        fs::write(dir.path().join("symbols/readme.txt"), "x").unwrap();
        let stray = dir.path().join("game.pdb");
        fs::write(&stray, "x").unwrap();

        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let options = BreakpadOptions {
            project_root: Some("/my project".into()),
            cpu_arch: Some("x86_64".into()),
            paths: vec![dir.path().join("symbols"), stray],
            ..Default::default()
        };
        let plans = resolve(&ctx, &options).unwrap();
        let uploads = &plans[0].files;
        assert_eq!(uploads.len(), 1);
        assert!(output.contains(Tag::Warn, "not a .sym file or directory"));

        let upload = &uploads[0];
        assert_eq!(upload.parts[0].field, "symbol_file");
        assert_eq!(upload.fields["cpu_arch"], "x86_64");
        assert_eq!(
            upload.url_for("https://upload.example.com/breakpad-symbol"),
            format!(
                "https://upload.example.com/breakpad-symbol?api_key={API_KEY}&project_root=%2Fmy%20project"
            )
        );
    }

    #[test]
    fn test_nothing_to_upload_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let options = BreakpadOptions {
            paths: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        let plans = resolve(&ctx, &options).unwrap();
        assert!(plans[0].is_empty());
        assert!(output.contains(Tag::Info, "No Breakpad .sym files found"));
    }
}
