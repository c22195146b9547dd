//! Reading definitions from the mocks folder.

use crate::alerts::Alerts;
use anyhow::{bail, Context};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const COLLECTIONS_FILE_NAMES: [&str; 3] =
    ["collections.json", "collections.yaml", "collections.yml"];
pub const ROUTES_FOLDER: &str = "routes";
const EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Definitions read from one mocks folder
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Definitions {
    pub routes: Vec<Value>,
    pub collections: Vec<Value>,
}

fn has_definitions_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Definition files under `dir`, recursively, sorted by path
pub fn definition_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if has_definitions_extension(&path) {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

/// Parse a JSON or YAML file that must contain an array
pub fn read_array(path: &Path) -> anyhow::Result<Vec<Value>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let value: Value = if is_json {
        serde_json::from_str(&contents).context("Invalid JSON")?
    } else {
        serde_yaml::from_str(&contents).context("Invalid YAML")?
    };
    match value {
        Value::Array(items) => Ok(items),
        _ => bail!("File does not contain an array"),
    }
}

fn display_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Read the collections file and every routes file of `root`.
///
/// `alerts` is the files namespace. Files that can not be parsed are
/// skipped and reported as `load:<file>`.
pub fn read_definitions(root: &Path, alerts: &Alerts) -> Definitions {
    alerts.remove("load");
    alerts.remove("collections");

    let mut definitions = Definitions::default();
    let read_into = |path: &Path, target: &mut Vec<Value>| {
        let name = display_name(root, path);
        match read_array(path) {
            Ok(items) => {
                debug!(file = %name, items = items.len(), "Definitions file read");
                target.extend(items);
            }
            Err(e) => alerts.set(
                &format!("load:{name}"),
                format!("Error loading file {name}"),
                Some(&e),
            ),
        }
    };

    match COLLECTIONS_FILE_NAMES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
    {
        Some(path) => read_into(&path, &mut definitions.collections),
        None => alerts.set(
            "collections:not-found",
            format!("No collections file found in folder {}", root.display()),
            None,
        ),
    }

    for path in definition_files(&root.join(ROUTES_FOLDER)) {
        read_into(&path, &mut definitions.routes);
    }

    definitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(root: &Path, name: &str, contents: &str) {
        let path = root.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_reads_sorted_routes_and_collections() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "collections.yaml", "- id: base\n  routes: []\n");
        write(dir.path(), "routes/b.json", r#"[{"id": "b"}]"#);
        write(dir.path(), "routes/a/nested.yml", "- id: a\n");
        write(dir.path(), "routes/notes.txt", "ignored");

        let alerts = Alerts::new();
        let definitions = read_definitions(dir.path(), &alerts);

        assert_eq!(definitions.collections, vec![json!({"id": "base", "routes": []})]);
        assert_eq!(definitions.routes, vec![json!({"id": "a"}), json!({"id": "b"})]);
        assert!(alerts.flat().is_empty());
    }

    #[test]
    fn test_invalid_files_are_skipped_with_alert() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "collections.json", "[]");
        write(dir.path(), "routes/object.json", r#"{"id": "x"}"#);
        write(dir.path(), "routes/broken.json", "[");
        write(dir.path(), "routes/ok.json", r#"[{"id": "ok"}]"#);

        let alerts = Alerts::new().collection("files");
        let definitions = read_definitions(dir.path(), &alerts);

        assert_eq!(definitions.routes, vec![json!({"id": "ok"})]);
        let ids: Vec<String> = alerts.flat().into_iter().map(|a| a.id).collect();
        assert_eq!(
            ids,
            vec!["files:load:routes/broken.json", "files:load:routes/object.json"]
        );
        let object_alert = alerts.find("files:load:routes/object.json").unwrap();
        assert!(object_alert
            .error
            .unwrap()
            .message
            .contains("does not contain an array"));
    }

    #[test]
    fn test_missing_collections_file() {
        let dir = tempfile::tempdir().unwrap();
        let alerts = Alerts::new().collection("files");

        let definitions = read_definitions(dir.path(), &alerts);
        assert_eq!(definitions, Definitions::default());
        assert!(alerts.find("files:collections:not-found").is_some());

        write(dir.path(), "collections.yml", "[]");
        read_definitions(dir.path(), &alerts);
        assert!(alerts.flat().is_empty());
    }
}
