//! React Native bundle and source-map resolvers.

pub mod android;
pub mod ios;
pub mod sourcemaps;

use super::{ResolveContext, path_string};
use crate::endpoint::Route;
use crate::error::Result;
use crate::files;
use crate::model::{ArtifactKind, BuildDescriptor, Platform};
use crate::upload::{ArtifactFile, FilePart, ReactNativeFields, UploadPlan};
use std::path::{Path, PathBuf};

/// Identity and file flags shared by the React Native kinds
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ReactNativeIdentity {
    /// App version
    #[arg(long, alias = "app-version")]
    pub version_name: Option<String>,
    /// Code bundle id, used instead of version fields
    #[arg(long)]
    pub code_bundle_id: Option<String>,
    /// The bundle is a development build
    #[arg(long)]
    pub dev: bool,
    /// Path prefix to strip from file names in stack traces
    #[arg(long)]
    pub project_root: Option<String>,
    /// JavaScript bundle, overriding discovery
    #[arg(long)]
    pub bundle: Option<PathBuf>,
    /// Source map, overriding discovery
    #[arg(long)]
    pub source_map: Option<PathBuf>,
}

impl ReactNativeIdentity {
    /// Command-line layer; `project_root` falls back to `default_root`
    pub fn layer(&self, default_root: &Path) -> BuildDescriptor {
        BuildDescriptor {
            version_name: self.version_name.clone(),
            code_bundle_id: self.code_bundle_id.clone(),
            dev: self.dev.then_some(true),
            project_root: self
                .project_root
                .clone()
                .or_else(|| Some(path_string(default_root))),
            ..Default::default()
        }
    }
}

/// Bundle and source map for one upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlePair {
    /// Minified bundle
    pub bundle: PathBuf,
    /// Its source map
    pub source_map: PathBuf,
}

/// One-file plan carrying both parts
pub fn bundle_plan(
    ctx: &ResolveContext<'_>,
    kind: ArtifactKind,
    descriptor: &BuildDescriptor,
    platform: Platform,
    pair: &BundlePair,
) -> Result<UploadPlan> {
    files::ensure_exists(&pair.source_map)?;
    files::ensure_exists(&pair.bundle)?;
    let mut plan = ctx.plan(kind, descriptor)?;
    let fields = ReactNativeFields::new(descriptor, platform, ctx.overwrite);
    plan.push(
        ArtifactFile::new(
            Route::ReactNativeSourceMap,
            &fields,
            FilePart::local("sourceMap", &pair.source_map),
        )
        .with_part(FilePart::local("bundle", &pair.bundle))
        .named(files::file_name(&pair.source_map)),
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{LogLevel, OutputManager};
    use crate::resolvers::tests::context;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_bundle_plan_parts_and_fields() {
        let dir = tempfile::tempdir().unwrap();
        let pair = BundlePair {
            bundle: dir.path().join("main.jsbundle"),
            source_map: dir.path().join("main.jsbundle.map"),
        };
        std::fs::write(&pair.bundle, "js").unwrap();
        std::fs::write(&pair.source_map, "{}").unwrap();

        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let identity = ReactNativeIdentity {
            code_bundle_id: Some("rn-42".into()),
            dev: true,
            ..Default::default()
        };
        let descriptor = ctx.merge(&identity.layer(dir.path()), &BuildDescriptor::default());
        let plan = bundle_plan(&ctx, ArtifactKind::ReactNativeIos, &descriptor, Platform::Ios, &pair).unwrap();

        let file = &plan.files[0];
        assert_eq!(file.route, Route::ReactNativeSourceMap);
        let fields: Vec<&str> = file.parts.iter().map(|p| p.field.as_str()).collect();
        assert_eq!(fields, vec!["sourceMap", "bundle"]);
        assert_eq!(file.fields["codeBundleId"], "rn-42");
        assert_eq!(file.fields["dev"], "true");
        assert_eq!(file.fields["platform"], "ios");
        assert_eq!(file.fields["projectRoot"], path_string(dir.path()));
    }
}
