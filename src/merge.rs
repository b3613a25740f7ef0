//! Field-wise precedence merge of [`BuildDescriptor`] layers.
//!
//! Three layers feed a descriptor: values given on the command line, values
//! read from a packaged manifest or plist, and values discovered from the
//! environment (git, current user). Higher layers win field by field; a
//! field is inherited only when the higher layer leaves it empty.

use crate::error::{AppError, Result};
use crate::model::{BuildDescriptor, NO_BUILD_UUID, SourceControl};
use std::collections::BTreeMap;

/// Whether a field value counts as "not set" for precedence purposes.
pub trait Emptiness {
    /// True when a lower layer should supply this value instead
    fn is_unset(&self) -> bool;
}

impl Emptiness for Option<String> {
    fn is_unset(&self) -> bool {
        self.as_deref().is_none_or(str::is_empty)
    }
}

macro_rules! scalar_emptiness {
    ($($ty:ty),*) => {
        $(impl Emptiness for Option<$ty> {
            fn is_unset(&self) -> bool {
                self.is_none()
            }
        })*
    };
}

scalar_emptiness!(bool, crate::model::Platform, crate::model::Provider);

impl Emptiness for BTreeMap<String, String> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

/// Pick `high` when set, otherwise `low`
pub fn prefer<T: Emptiness + Clone>(high: &T, low: &T) -> T {
    if high.is_unset() {
        low.clone()
    } else {
        high.clone()
    }
}

/// Types that can be layered over a lower-priority value of the same shape.
pub trait Layered {
    /// Compose `self` (higher priority) over `lower`
    fn over(&self, lower: &Self) -> Self;
}

impl Layered for SourceControl {
    fn over(&self, lower: &Self) -> Self {
        SourceControl {
            provider: prefer(&self.provider, &lower.provider),
            repository: prefer(&self.repository, &lower.repository),
            revision: prefer(&self.revision, &lower.revision),
        }
    }
}

impl Layered for BuildDescriptor {
    fn over(&self, lower: &Self) -> Self {
        BuildDescriptor {
            api_key: prefer(&self.api_key, &lower.api_key),
            application_id: prefer(&self.application_id, &lower.application_id),
            version_name: prefer(&self.version_name, &lower.version_name),
            version_code: prefer(&self.version_code, &lower.version_code),
            bundle_version: prefer(&self.bundle_version, &lower.bundle_version),
            build_uuid: prefer(&self.build_uuid, &lower.build_uuid),
            project_root: prefer(&self.project_root, &lower.project_root),
            code_bundle_id: prefer(&self.code_bundle_id, &lower.code_bundle_id),
            dev: prefer(&self.dev, &lower.dev),
            platform: prefer(&self.platform, &lower.platform),
            metadata: prefer(&self.metadata, &lower.metadata),
            source_control: self.source_control.over(&lower.source_control),
            builder_name: prefer(&self.builder_name, &lower.builder_name),
            release_stage: prefer(&self.release_stage, &lower.release_stage),
            auto_assign_release: prefer(&self.auto_assign_release, &lower.auto_assign_release),
        }
    }
}

fn suppresses_build_uuid(layer: &BuildDescriptor) -> bool {
    layer.build_uuid.as_deref() == Some(NO_BUILD_UUID)
}

/// Compose the three layers with CLI > Manifest > Base precedence.
///
/// The `none` build UUID sentinel on any layer clears the merged build UUID.
pub fn compose(
    cli: &BuildDescriptor,
    manifest: &BuildDescriptor,
    base: &BuildDescriptor,
) -> BuildDescriptor {
    let mut merged = cli.over(&manifest.over(base));
    if [cli, manifest, base].into_iter().any(suppresses_build_uuid) {
        merged.build_uuid = None;
    }
    merged
}

/// Validate a merged descriptor for the create-build endpoint
pub fn validate_for_build(descriptor: &BuildDescriptor) -> Result<()> {
    if descriptor.api_key.is_unset() {
        return Err(AppError::missing("--api-key"));
    }
    if descriptor.version_name.is_unset() {
        return Err(AppError::missing("--version-name"));
    }
    Ok(())
}

/// Parse `k=v,k2=v2` into a metadata map.
///
/// Entries without `=` are rejected.
pub fn parse_metadata(raw: &str) -> Result<BTreeMap<String, String>> {
    let mut metadata = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            AppError::invalid(format!("metadata entry '{pair}' is not of the form key=value"))
        })?;
        metadata.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(metadata)
}
