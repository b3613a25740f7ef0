//! JavaScript source maps and `sourcesContent` enrichment.

use crate::error::{AppError, ErrorExt, FormatError, Result};
use serde_json::Value;
use std::path::{Component, Path, PathBuf};

/// Parse a source map; the top level must be a JSON object
pub fn read_source_map(path: &Path) -> Result<Value> {
    let bytes = std::fs::read(path).fs_context("reading source map", path)?;
    let value: Value = serde_json::from_slice(&bytes).map_err(|e| invalid(path, e.to_string()))?;
    if !value.is_object() {
        return Err(invalid(path, "top level is not an object".to_string()));
    }
    Ok(value)
}

/// Outcome of [`add_sources_content`]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Enrichment {
    /// Whether `sourcesContent` was written anywhere
    pub modified: bool,
    /// Problems for the caller to report
    pub warnings: Vec<String>,
}

/// Fill `sourcesContent` from files under `project_root`.
///
/// Sectioned maps are enriched per section.
pub fn add_sources_content(map: &mut Value, project_root: &Path) -> Enrichment {
    let mut result = Enrichment::default();
    if let Some(sections) = map.get_mut("sections").and_then(Value::as_array_mut) {
        for section in sections.iter_mut() {
            if let Some(inner) = section.get_mut("map") {
                result.modified |= enrich_section(inner, project_root, &mut result.warnings);
            }
        }
        return result;
    }
    result.modified = enrich_section(map, project_root, &mut result.warnings);
    result
}

fn enrich_section(section: &mut Value, project_root: &Path, warnings: &mut Vec<String>) -> bool {
    let Some(sources) = section.get("sources") else {
        warnings.push("Source map has no sources field".to_string());
        return false;
    };
    let Some(sources) = sources.as_array() else {
        warnings.push("Source map sources field is not a list".to_string());
        return false;
    };

    let complete = section
        .get("sourcesContent")
        .and_then(Value::as_array)
        .is_some_and(|content| content.len() == sources.len());
    if complete {
        log::debug!("sourcesContent is already populated");
        return false;
    }

    let content: Vec<Value> = sources
        .iter()
        .map(|source| match source.as_str().and_then(|s| source_path(s, project_root)) {
            Some(path) => match std::fs::read_to_string(&path) {
                Ok(text) => Value::String(text),
                Err(e) => {
                    warnings.push(format!(
                        "Cannot read referenced source file '{}': {}",
                        path.display(),
                        e
                    ));
                    Value::Null
                }
            },
            None => Value::Null,
        })
        .collect();

    if let Some(obj) = section.as_object_mut() {
        obj.insert("sourcesContent".to_string(), Value::Array(content));
        true
    } else {
        false
    }
}

/// Resolve one `sources` entry to a file, or `None` for virtual sources
fn source_path(source: &str, project_root: &Path) -> Option<PathBuf> {
    let mut source = source.to_string();
    if let Some(rest) = source.strip_prefix("webpack://") {
        // webpack://<namespace>/<path>
        let rest = match rest.find('/') {
            Some(slash) if slash + 1 < rest.len() => &rest[slash + 1..],
            _ => rest,
        };
        if rest.contains("webpack/") {
            return None;
        }
        let rest = rest.split_once('?').map_or(rest, |(path, _loader)| path);
        source = rest.to_string();
    }

    let path = Path::new(&source);
    if path.is_absolute() {
        return Some(path.to_path_buf());
    }
    let cleaned: PathBuf = path
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    Some(project_root.join(cleaned))
}

fn invalid(path: &Path, reason: String) -> AppError {
    AppError::Format(FormatError::InvalidSourceMap {
        path: path.to_path_buf(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enriches_from_project_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/app.js"), "console.log(1)").unwrap();

        let mut map = json!({
            "version": 3,
            "sources": ["../src/app.js", "webpack://my-app/webpack/bootstrap", "missing.js", null],
            "mappings": ""
        });
        let enrichment = add_sources_content(&mut map, dir.path());
        assert!(enrichment.modified);
        assert_eq!(
            map["sourcesContent"],
            json!(["console.log(1)", null, null, null])
        );
        assert_eq!(enrichment.warnings.len(), 1);
        assert!(enrichment.warnings[0].contains("missing.js"));
    }

    #[test]
    fn test_webpack_namespace_and_loader_are_stripped() {
        let root = Path::new("/project");
        assert_eq!(
            source_path("webpack://my-app/./src/index.ts?babel-loader", root),
            Some(PathBuf::from("/project/src/index.ts"))
        );
        assert_eq!(source_path("webpack://my-app/webpack/runtime", root), None);
        assert_eq!(
            source_path("/abs/file.js", root),
            Some(PathBuf::from("/abs/file.js"))
        );
    }

    #[test]
    fn test_complete_sources_content_is_left_alone() {
        let mut map = json!({
            "sources": ["a.js"],
            "sourcesContent": ["original"]
        });
        assert_eq!(
            add_sources_content(&mut map, Path::new("/nowhere")),
            Enrichment::default()
        );
        assert_eq!(map["sourcesContent"], json!(["original"]));
    }

    #[test]
    fn test_sections_are_enriched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.js"), "A").unwrap();
        let mut map = json!({
            "version": 3,
            "sections": [
                {"offset": {"line": 0, "column": 0}, "map": {"sources": ["a.js"]}},
                {"offset": {"line": 10, "column": 0}, "map": {"sources": ["a.js"], "sourcesContent": ["kept"]}}
            ]
        });
        assert!(add_sources_content(&mut map, dir.path()).modified);
        assert_eq!(map["sections"][0]["map"]["sourcesContent"], json!(["A"]));
        assert_eq!(map["sections"][1]["map"]["sourcesContent"], json!(["kept"]));
    }

    #[test]
    fn test_missing_sources_is_reported() {
        let mut map = json!({"version": 3, "mappings": ""});
        let enrichment = add_sources_content(&mut map, Path::new("/nowhere"));
        assert!(!enrichment.modified);
        assert_eq!(enrichment.warnings, vec!["Source map has no sources field".to_string()]);
    }

    #[test]
    fn test_non_object_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.js.map");
        std::fs::write(&path, "[1,2,3]").unwrap();
        assert!(matches!(
            read_source_map(&path),
            Err(AppError::Format(FormatError::InvalidSourceMap { .. }))
        ));
    }
}
