use crate::elements::{ElementKind, GeneratedElement};
use crate::error::{ManifestError, WriteError};
use crate::manifest::write_atomic;
use crate::sexpr;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const SOURCE_FILE: &str = "source.json";
const MARKER_CONTENT: &[u8] = b"1\n";

/// Directory of one element below the library root.
pub fn element_dir(root: &Path, kind: ElementKind, uuid: &Uuid) -> PathBuf {
    root.join(kind.dir()).join(uuid.to_string())
}

/// Write an element's serialized text, version marker and vendor source.
/// Each file is replaced atomically. Returns the element directory.
pub fn write_element(
    root: &Path,
    element: &GeneratedElement,
    text: &str,
    source: &Value,
) -> Result<PathBuf, WriteError> {
    let kind = element.kind();
    let dir = element_dir(root, kind, &element.uuid());
    let mut source_json = serde_json::to_vec_pretty(source).map_err(|e| WriteError::Json {
        path: dir.join(SOURCE_FILE).display().to_string(),
        source: e,
    })?;
    source_json.push(b'\n');

    let files: [(PathBuf, &[u8]); 3] = [
        (dir.join(kind.file_name()), text.as_bytes()),
        (dir.join(kind.marker_file()), MARKER_CONTENT),
        (dir.join(SOURCE_FILE), source_json.as_slice()),
    ];
    for (path, content) in &files {
        write_atomic(path, content).map_err(|source| WriteError::Io {
            path: path.display().to_string(),
            source,
        })?;
    }
    log::debug!("Wrote {kind} {}", dir.display());
    Ok(dir)
}

/// UUID of the first element of `kind` other than `skip` whose
/// `generated_by` equals `generated_by`, scanning element directories in
/// name order.
pub fn find_element_by_generated_by(
    root: &Path,
    kind: ElementKind,
    generated_by: &str,
    skip: Option<&Uuid>,
) -> Result<Option<Uuid>, ManifestError> {
    let dir = root.join(kind.dir());
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ManifestError::Io {
                path: dir.display().to_string(),
                source,
            })
        }
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    for element in dirs {
        let Some(uuid) = element
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| Uuid::parse_str(n).ok())
        else {
            continue;
        };
        if skip == Some(&uuid) {
            continue;
        }
        let Ok(data) = fs::read(element.join(kind.file_name())) else {
            continue;
        };
        match sexpr::parse(&data) {
            Ok(root) if root.value("generated_by") == Some(generated_by) => return Ok(Some(uuid)),
            Ok(_) => {}
            Err(e) => log::warn!("Unreadable element {}: {e}", element.display()),
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Metadata, Symbol};
    use chrono::{DateTime, Utc};
    use tempfile::TempDir;

    fn symbol(uuid: Uuid, generated_by: &str) -> GeneratedElement {
        GeneratedElement::Symbol(Symbol {
            meta: Metadata {
                uuid,
                name: "X".to_string(),
                description: String::new(),
                keywords: Vec::new(),
                author: String::new(),
                version: "0.1".to_string(),
                created: DateTime::<Utc>::UNIX_EPOCH,
                generated_by: generated_by.to_string(),
                category: Uuid::nil(),
            },
            pins: Vec::new(),
            polygons: Vec::new(),
            circles: Vec::new(),
            texts: Vec::new(),
        })
    }

    fn write(root: &Path, element: &GeneratedElement) -> PathBuf {
        let text = crate::serialize::serialize(element).unwrap();
        write_element(root, element, &text, &serde_json::json!({"b": 1, "a": 2})).unwrap()
    }

    #[test]
    fn test_write_element_layout() {
        let dir = TempDir::new().unwrap();
        let uuid = Uuid::from_u128(7);
        let out = write(dir.path(), &symbol(uuid, "webparts:lcsc:C1"));
        assert_eq!(out, dir.path().join("sym").join(uuid.to_string()));
        assert!(out.join("symbol.lp").exists());
        assert_eq!(fs::read(out.join(".librepcb-sym")).unwrap(), b"1\n");
        let source = fs::read_to_string(out.join(SOURCE_FILE)).unwrap();
        assert!(source.find("\"a\"").unwrap() < source.find("\"b\"").unwrap());
    }

    #[test]
    fn test_write_element_under_file_fails() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("lib");
        fs::write(&root, b"not a directory").unwrap();
        let element = symbol(Uuid::from_u128(7), "webparts:lcsc:C1");
        let text = crate::serialize::serialize(&element).unwrap();
        let err = write_element(&root, &element, &text, &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, WriteError::Io { .. }));
    }

    #[test]
    fn test_find_by_generated_by() {
        let dir = TempDir::new().unwrap();
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        write(dir.path(), &symbol(a, "webparts:lcsc:C1"));
        write(dir.path(), &symbol(b, "webparts:lcsc:C2"));
        fs::create_dir_all(dir.path().join("sym/not-a-uuid")).unwrap();

        let find = |kind: ElementKind, generated_by: &str| {
            find_element_by_generated_by(dir.path(), kind, generated_by, None).unwrap()
        };
        assert_eq!(find(ElementKind::Symbol, "webparts:lcsc:C2"), Some(b));
        assert_eq!(find(ElementKind::Symbol, "webparts:lcsc:C3"), None);
        assert_eq!(find(ElementKind::Device, "webparts:lcsc:C1"), None);
    }

    #[test]
    fn test_find_skips_given_uuid() {
        let dir = TempDir::new().unwrap();
        let first = Uuid::from_u128(1);
        let later = Uuid::from_u128(9);
        write(dir.path(), &symbol(first, "webparts:lcsc:C1"));
        write(dir.path(), &symbol(later, "webparts:lcsc:C1"));

        let found = find_element_by_generated_by(
            dir.path(),
            ElementKind::Symbol,
            "webparts:lcsc:C1",
            Some(&first),
        )
        .unwrap();
        assert_eq!(found, Some(later));
    }
}
