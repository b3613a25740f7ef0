//! `upload all`: every file under the given paths, with caller-supplied
//! fields, sent to the base route.

use super::{ResolveContext, require_api_key};
use crate::endpoint::Route;
use crate::error::{AppError, Result};
use crate::files;
use crate::merge::parse_metadata;
use crate::model::{ArtifactKind, BuildDescriptor};
use crate::upload::{ArtifactFile, CustomFields, FilePart, UploadPlan};
use std::collections::BTreeMap;
use std::path::PathBuf;

const FILE_FIELD_KEY: &str = "fileNameField";
const DEFAULT_FILE_FIELD: &str = "file";

/// `upload all`
#[derive(Debug, Clone, Default, clap::Args)]
pub struct DiscoverOptions {
    /// Extra form fields as `key=value,key2=value2`; `fileNameField` names
    /// the file part
    #[arg(long = "upload-options", alias = "fields")]
    pub fields: Option<String>,
    /// Files or directories to upload
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

/// Split the file-part name out of the caller's fields
pub fn split_file_field(mut fields: BTreeMap<String, String>) -> (String, BTreeMap<String, String>) {
    let name = fields
        .remove(FILE_FIELD_KEY)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_FILE_FIELD.to_string());
    (name, fields)
}

/// One plan with one upload per file
pub fn resolve(ctx: &ResolveContext<'_>, options: &DiscoverOptions) -> Result<Vec<UploadPlan>> {
    let descriptor = ctx.merge(&BuildDescriptor::default(), &BuildDescriptor::default());
    let api_key = require_api_key(&descriptor)?.to_string();

    let parsed = match &options.fields {
        Some(raw) => parse_metadata(raw)?,
        None => BTreeMap::new(),
    };
    let (file_field, mut fields) = split_file_field(parsed);
    if file_field.contains(['"', '\r', '\n']) {
        return Err(AppError::invalid(format!("bad file field name {file_field}")));
    }
    fields.entry("apiKey".to_string()).or_insert(api_key);

    let record = CustomFields {
        fields,
        overwrite: ctx.overwrite,
    };
    let mut plan = ctx.plan(ArtifactKind::DiscoverAny, &descriptor)?;
    for file in files::build_file_list(&options.paths)? {
        plan.push(ArtifactFile::new(
            Route::Base,
            &record,
            FilePart::local(&file_field, &file),
        ));
    }
    Ok(vec![plan])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{LogLevel, OutputManager};
    use crate::resolvers::tests::{API_KEY, context};
    use std::fs;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_file_field_override_is_consumed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();

        let output = OutputManager::capture(LogLevel::Debug);
        let cancel = CancellationToken::new();
        let ctx = context(&output, &cancel);
        let options = DiscoverOptions {
            fields: Some("fileNameField=symbols,appVersion=2.0".into()),
            paths: vec![dir.path().to_path_buf()],
        };
        let plans = resolve(&ctx, &options).unwrap();
        let uploads = &plans[0].files;
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].route, Route::Base);
        assert_eq!(uploads[0].parts[0].field, "symbols");
        assert_eq!(uploads[0].fields["appVersion"], "2.0");
        assert_eq!(uploads[0].fields["apiKey"], API_KEY);
        assert!(!uploads[0].fields.contains_key(FILE_FIELD_KEY));
    }

    #[test]
    fn test_default_file_field() {
        let (name, rest) = split_file_field(BTreeMap::new());
        assert_eq!(name, "file");
        assert!(rest.is_empty());
    }
}
