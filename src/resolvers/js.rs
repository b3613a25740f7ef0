//! Browser and Node source maps.
//!
//! Maps are found under the input directory (or given explicitly), enriched
//! with `sourcesContent` from the project root, and sent with the minified
//! bundle they describe.

use super::{ResolveContext, cwd_string, path_string, require_api_key};
use crate::endpoint::Route;
use crate::error::{AppError, ErrorExt, Result};
use crate::files;
use crate::model::{ArtifactKind, BuildDescriptor};
use crate::readers::sourcemap::{add_sources_content, read_source_map};
use crate::upload::{ArtifactFile, FilePart, JsFields, UploadPlan};
use path_absolutize::Absolutize;
use std::path::{Component, Path, PathBuf};

/// `upload js`
#[derive(Debug, Clone, Default, clap::Args)]
pub struct JsOptions {
    /// Application version; read from the nearest package.json when absent
    #[arg(long, alias = "app-version")]
    pub version_name: Option<String>,
    /// Code bundle identifier
    #[arg(long)]
    pub code_bundle_id: Option<String>,
    /// Directory that source paths in the map are relative to
    #[arg(long)]
    pub project_root: Option<String>,
    /// Source map to upload, overriding discovery
    #[arg(long)]
    pub source_map: Option<PathBuf>,
    /// Minified bundle, defaulting to the source map path without `.map`
    #[arg(long)]
    pub bundle: Option<PathBuf>,
    /// URL of the bundle, when uploading a single file
    #[arg(long)]
    pub bundle_url: Option<String>,
    /// URL prefix of the bundles, when uploading a directory
    #[arg(long)]
    pub base_url: Option<String>,
    /// Build output directory or source map
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,
}

/// `version` of the nearest package.json at or above `start`
pub fn package_version(ctx: &ResolveContext<'_>, start: &Path) -> Option<String> {
    ctx.output.debug(&format!(
        "Attempting to automatically resolve the version starting from: {}",
        start.display()
    ));
    let start = match start.absolutize() {
        Ok(path) => path.into_owned(),
        Err(e) => {
            ctx.output.warn(&format!(
                "when resolving the version, unable to make an absolute path {}: {}",
                start.display(),
                e
            ));
            return None;
        }
    };
    let package_json = start
        .ancestors()
        .map(|dir| dir.join("package.json"))
        .find(|p| p.is_file())?;

    let parsed = std::fs::read(&package_json)
        .fs_context("reading", &package_json)
        .and_then(|bytes| Ok(serde_json::from_slice::<serde_json::Value>(&bytes)?));
    match parsed {
        Ok(json) => match json.get("version").and_then(|v| v.as_str()) {
            Some(version) => {
                ctx.output.info(&format!(
                    "Using app version from {}: {}",
                    package_json.display(),
                    version
                ));
                Some(version.to_string())
            }
            None => {
                ctx.output.warn(&format!(
                    "when resolving the version, no version field in {}",
                    package_json.display()
                ));
                None
            }
        },
        Err(e) => {
            ctx.output.warn(&format!(
                "when resolving the version, unable to read {}: {}",
                package_json.display(),
                e
            ));
            None
        }
    }
}

/// Source maps below `dir`, excluding stylesheet maps
pub fn find_source_maps(ctx: &ResolveContext<'_>, dir: &Path) -> Result<Vec<PathBuf>> {
    let mut maps = Vec::new();
    for file in files::walk_files(dir)? {
        let name = files::file_name(&file);
        if !name.ends_with(".map") {
            continue;
        }
        if name.ends_with(".css.map") {
            ctx.output
                .debug(&format!("Skipping .css.map file {}", file.display()));
            continue;
        }
        maps.push(file);
    }
    Ok(maps)
}

/// Explicit bundle, else the map path without `.map` when that file exists
pub fn bundle_for(ctx: &ResolveContext<'_>, explicit: Option<&Path>, source_map: &Path) -> Result<Option<PathBuf>> {
    if let Some(bundle) = explicit {
        files::ensure_exists(bundle)?;
        return Ok(Some(bundle.to_path_buf()));
    }
    let stripped = path_string(source_map)
        .strip_suffix(".map")
        .map(PathBuf::from)
        .filter(|p| p.is_file());
    if let Some(bundle) = &stripped {
        ctx.output.info(&format!(
            "Automatically using the bundle at path {} based on stripping the .map suffix.",
            bundle.display()
        ));
    }
    Ok(stripped)
}

/// `base_url` joined with the bundle path below the project root, minus its
/// first component (the output directory)
pub fn minified_url(base_url: &str, bundle: &Path, project_root: &Path) -> String {
    let relative = bundle.strip_prefix(project_root).unwrap_or(bundle);
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    let file = match parts.as_slice() {
        [_, rest @ ..] if !rest.is_empty() => rest.join("/"),
        _ => parts.join("/"),
    };
    format!("{base_url}{file}")
}

fn validate_urls(is_file: bool, options: &JsOptions) -> Result<Option<String>> {
    let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
    match (is_file, set(&options.bundle_url), set(&options.base_url)) {
        (true, false, _) => Err(AppError::invalid("`--bundle-url` must be set when uploading a file")),
        (true, true, true) => Err(AppError::invalid("`--base-url` must not be set when uploading a file")),
        (false, _, false) => Err(AppError::invalid(
            "`--base-url` must be set when uploading from a directory",
        )),
        (false, true, true) => Err(AppError::invalid(
            "`--bundle-url` must not be set when uploading from a directory",
        )),
        (true, true, false) => Ok(None),
        (false, false, true) => Ok(options.base_url.as_ref().map(|base| {
            if base.ends_with('/') {
                base.clone()
            } else {
                format!("{base}/")
            }
        })),
    }
}

fn source_map_part(ctx: &ResolveContext<'_>, map_path: &Path, project_root: &Path) -> Result<FilePart> {
    ctx.output
        .info(&format!("Reading sourcemap {}", map_path.display()));
    let mut map = read_source_map(map_path)?;
    let enrichment = add_sources_content(&mut map, project_root);
    for warning in &enrichment.warnings {
        ctx.output.warn(warning);
    }
    if enrichment.modified {
        ctx.output.info(&format!(
            "Added sources content to source map from {}",
            map_path.display()
        ));
        let bytes = serde_json::to_vec(&map)?;
        Ok(FilePart::in_memory("sourceMap", files::file_name(map_path), bytes))
    } else {
        ctx.output.info(&format!(
            "Uploading unmodified source map from {}",
            map_path.display()
        ));
        Ok(FilePart::local("sourceMap", map_path))
    }
}

/// One plan per input path, one upload per source map
pub fn resolve(ctx: &ResolveContext<'_>, options: &JsOptions) -> Result<Vec<UploadPlan>> {
    let mut plans = Vec::new();
    for path in &options.paths {
        files::ensure_exists(path)?;
        let project_root = options
            .project_root
            .clone()
            .or_else(cwd_string)
            .unwrap_or_else(|| path_string(path));
        ctx.output
            .debug(&format!("Using project root {project_root}"));
        let version = options
            .version_name
            .clone()
            .or_else(|| package_version(ctx, path));

        let maps = match &options.source_map {
            Some(map) => {
                if !map.is_file() {
                    return Err(AppError::NotFound {
                        what: format!("the specified source map file {}", map.display()),
                    });
                }
                vec![map.clone()]
            }
            None if path.is_dir() => find_source_maps(ctx, path)?,
            None => vec![path.clone()],
        };
        if maps.is_empty() {
            return Err(AppError::invalid(
                "could not find a source map, please specify the path by using --source-map",
            ));
        }
        ctx.output.info(&format!(
            "Found source map(s): {}",
            maps.iter()
                .map(|m| m.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));

        let is_file = options.source_map.is_some() || !path.is_dir();
        let base_url = validate_urls(is_file, options)?;

        let cli = BuildDescriptor {
            version_name: version,
            code_bundle_id: options.code_bundle_id.clone(),
            project_root: Some(project_root.clone()),
            ..Default::default()
        };
        let descriptor = ctx.merge(&cli, &BuildDescriptor::default());
        require_api_key(&descriptor)?;

        let root = PathBuf::from(&project_root);
        let mut plan = ctx.plan(ArtifactKind::JsSourceMap, &descriptor)?;
        for map in maps {
            let bundle = bundle_for(ctx, options.bundle.as_deref(), &map)?;
            let url = match &base_url {
                Some(base) => {
                    let target = bundle.clone().unwrap_or_else(|| map.with_extension(""));
                    let url = minified_url(base, &target, &root);
                    ctx.output
                        .debug(&format!("Generated URL {url} using the base URL {base}"));
                    url
                }
                None => options.bundle_url.clone().unwrap_or_default(),
            };
            let fields = JsFields {
                api_key: descriptor.api_key.clone(),
                app_version: descriptor.version_name.clone(),
                code_bundle_id: descriptor.code_bundle_id.clone(),
                minified_url: url,
                project_root: descriptor.project_root.clone(),
                overwrite: ctx.overwrite,
            };
            let mut file = ArtifactFile::new(Route::SourceMap, &fields, source_map_part(ctx, &map, &root)?)
                .named(map.display().to_string());
            if let Some(bundle) = bundle {
                file = file.with_part(FilePart::local("minifiedFile", bundle));
            }
            plan.push(file);
        }
        plans.push(plan);
    }
    Ok(plans)
}
