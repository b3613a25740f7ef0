//! Multipart request construction.

use super::fields::FormFields;
use crate::endpoint::Route;
use crate::error::{ErrorExt, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where a file part's bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartSource {
    /// Streamed from disk
    Local(PathBuf),
    /// Produced in memory, e.g. an enriched source map
    InMemory {
        /// File name sent in the part header
        name: String,
        /// Content
        bytes: Vec<u8>,
    },
}

/// A file part of the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name
    pub field: String,
    /// Content source
    pub source: PartSource,
}

impl FilePart {
    /// Part streamed from a file on disk
    pub fn local(field: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            field: field.to_string(),
            source: PartSource::Local(path.into()),
        }
    }

    /// Part held in memory
    pub fn in_memory(field: &str, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field: field.to_string(),
            source: PartSource::InMemory {
                name: name.into(),
                bytes,
            },
        }
    }

    /// File name sent in the part header
    pub fn file_name(&self) -> String {
        match &self.source {
            PartSource::Local(path) => crate::files::file_name(path),
            PartSource::InMemory { name, .. } => name.clone(),
        }
    }
}

/// One upload: text fields, file parts and the route they go to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
    /// Route appended to the endpoint base
    pub route: Route,
    /// Name shown in logs
    pub display_name: String,
    /// Text fields, sorted by key
    pub fields: BTreeMap<String, String>,
    /// File parts, in form order
    pub parts: Vec<FilePart>,
    /// Extra query-string pairs
    pub query: Vec<(String, String)>,
}

impl ArtifactFile {
    /// Upload of a single file part
    pub fn new(route: Route, record: &impl FormFields, part: FilePart) -> Self {
        Self {
            route,
            display_name: part.file_name(),
            fields: record.form_fields(),
            parts: vec![part],
            query: Vec::new(),
        }
    }

    /// Add another file part
    pub fn with_part(mut self, part: FilePart) -> Self {
        self.parts.push(part);
        self
    }

    /// Attach query-string pairs
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Override the log name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// `url` with this file's query string appended
    pub fn url_for(&self, url: &str) -> String {
        append_query(url, &self.query)
    }

    /// Local files this upload reads
    pub fn local_paths(&self) -> impl Iterator<Item = &Path> {
        self.parts.iter().filter_map(|p| match &p.source {
            PartSource::Local(path) => Some(path.as_path()),
            PartSource::InMemory { .. } => None,
        })
    }
}

/// Append percent-encoded pairs; spaces become `%20`
pub fn append_query(url: &str, query: &[(String, String)]) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let mut out = url.to_string();
    let mut sep = if url.contains('?') { '&' } else { '?' };
    for (key, value) in query {
        out.push(sep);
        out.push_str(&urlencoding::encode(key));
        out.push('=');
        out.push_str(&urlencoding::encode(value));
        sep = '&';
    }
    out
}

/// Build the reqwest form, streaming local files from disk
pub(crate) async fn multipart_form(file: &ArtifactFile) -> Result<reqwest::multipart::Form> {
    use reqwest::multipart::{Form, Part};

    let mut form = Form::new();
    for (key, value) in &file.fields {
        form = form.text(key.clone(), value.clone());
    }
    for part in &file.parts {
        let name = part.file_name();
        let body = match &part.source {
            PartSource::Local(path) => {
                let handle = tokio::fs::File::open(path)
                    .await
                    .fs_context("opening upload file", path)?;
                let len = handle
                    .metadata()
                    .await
                    .fs_context("reading size of", path)?
                    .len();
                let stream = tokio_util::io::ReaderStream::new(handle);
                Part::stream_with_length(reqwest::Body::wrap_stream(stream), len)
            }
            PartSource::InMemory { bytes, .. } => Part::bytes(bytes.clone()),
        };
        form = form.part(part.field.clone(), body.file_name(name));
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::fields::DsymFields;

    #[test]
    fn test_query_uses_percent_twenty() {
        let url = append_query(
            "https://upload.example.com/breakpad-symbol",
            &[
                ("api_key".into(), "abc".into()),
                ("project_root".into(), "/my project/src".into()),
            ],
        );
        assert_eq!(
            url,
            "https://upload.example.com/breakpad-symbol?api_key=abc&project_root=%2Fmy%20project%2Fsrc"
        );
    }

    #[test]
    fn test_artifact_file_from_record() {
        let record = DsymFields {
            api_key: Some("key".into()),
            project_root: None,
            overwrite: true,
        };
        let file = ArtifactFile::new(
            Route::Dsym,
            &record,
            FilePart::local("dsym", "/tmp/Example.app.dSYM/Contents/Resources/DWARF/Example"),
        );
        assert_eq!(file.display_name, "Example");
        assert_eq!(
            file.fields.keys().collect::<Vec<_>>(),
            vec!["apiKey", "overwrite"]
        );
        assert_eq!(file.local_paths().count(), 1);
    }

    #[tokio::test]
    async fn test_missing_local_file_fails_to_build() {
        let file = ArtifactFile::new(
            Route::Dsym,
            &DsymFields::default(),
            FilePart::local("dsym", "/definitely/not/here"),
        );
        assert!(multipart_form(&file).await.is_err());
    }
}
