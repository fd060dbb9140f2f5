use crate::elements::{element_path, ElementKind};
use crate::error::ManifestError;
use crate::ids::PartIdentity;
use crate::types::{PartInfo, Warning};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const MANIFEST_VERSION: u32 = 1;
/// Directory below the library root holding part manifests.
pub const PARTS_DIR: &str = "webparts";

// ─── Manifest documents ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartStatus {
    NeedsReview,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementStatus {
    #[default]
    NeedsReview,
    Approved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Unresolved,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub code: String,
    pub message: String,
    pub status: IssueStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Validation {
    #[serde(default)]
    pub errors: Vec<Issue>,
    #[serde(default)]
    pub warnings: Vec<Issue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementManifest {
    pub version: u32,
    #[serde(default)]
    pub status: ElementStatus,
    #[serde(default)]
    pub validation: Validation,
}

impl Default for ElementManifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            status: ElementStatus::NeedsReview,
            validation: Validation::default(),
        }
    }
}

impl ElementManifest {
    pub fn unresolved(&self) -> impl Iterator<Item = &Issue> {
        self.validation
            .errors
            .iter()
            .chain(&self.validation.warnings)
            .filter(|i| i.status == IssueStatus::Unresolved)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartManifest {
    pub version: u32,
    pub lcsc_part: String,
    pub mpn: String,
    pub manufacturer: String,
    pub added_at_utc: DateTime<Utc>,
    pub overall_status: PartStatus,
    pub uuids: PartIdentity,
}

impl PartManifest {
    pub fn element_uuid(&self, kind: ElementKind) -> Uuid {
        self.uuids.get(kind)
    }

    /// A part keeps the element UUIDs it was created with.
    pub fn check_identity(&self, uuids: &PartIdentity) -> Result<(), ManifestError> {
        match ElementKind::ALL
            .into_iter()
            .find(|&kind| self.uuids.get(kind) != uuids.get(kind))
        {
            Some(kind) => Err(ManifestError::IdentityMismatch {
                device: self.uuids.device,
                kind,
                stored: self.uuids.get(kind),
                requested: uuids.get(kind),
            }),
            None => Ok(()),
        }
    }
}

// ─── Reconciliation ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// One issue reported by a validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub code: String,
    pub message: String,
}

impl Finding {
    pub fn new(severity: Severity, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Converter warnings are reconciled like checker warnings.
impl From<&Warning> for Finding {
    fn from(w: &Warning) -> Self {
        Finding::new(Severity::Warning, w.code.as_str(), w.message.clone())
    }
}

/// Fold a validation run into a stored manifest.
///
/// Issues are keyed by `(code, message)`. Stored issues absent from the run
/// become resolved, present ones become unresolved again, and new ones are
/// appended as unresolved. Nothing is removed and `status` is kept.
pub fn reconcile(old: &ElementManifest, findings: &[Finding]) -> ElementManifest {
    let pick = |severity: Severity| {
        findings
            .iter()
            .filter(|f| f.severity == severity)
            .map(|f| (f.code.as_str(), f.message.as_str()))
            .collect::<Vec<_>>()
    };
    ElementManifest {
        version: MANIFEST_VERSION,
        status: old.status,
        validation: Validation {
            errors: reconcile_list(&old.validation.errors, &pick(Severity::Error)),
            warnings: reconcile_list(&old.validation.warnings, &pick(Severity::Warning)),
        },
    }
}

fn reconcile_list(old: &[Issue], current: &[(&str, &str)]) -> Vec<Issue> {
    let present: HashSet<(&str, &str)> = current.iter().copied().collect();
    let mut out: Vec<Issue> = old
        .iter()
        .map(|issue| {
            let key = (issue.code.as_str(), issue.message.as_str());
            Issue {
                status: if present.contains(&key) {
                    IssueStatus::Unresolved
                } else {
                    IssueStatus::Resolved
                },
                ..issue.clone()
            }
        })
        .collect();
    let mut known: HashSet<(String, String)> = old
        .iter()
        .map(|i| (i.code.clone(), i.message.clone()))
        .collect();
    for (code, message) in current {
        if known.insert((code.to_string(), message.to_string())) {
            out.push(Issue {
                code: code.to_string(),
                message: message.to_string(),
                status: IssueStatus::Unresolved,
            });
        }
    }
    out
}

// ─── Files ───────────────────────────────────────────────────────────

/// Replace `path` with `content` via a temp file in the same directory.
pub fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ManifestError> {
    let data = fs::read(path).map_err(|source| ManifestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|source| ManifestError::Json {
        path: path.display().to_string(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ManifestError> {
    let mut data = serde_json::to_vec_pretty(value).map_err(|source| ManifestError::Json {
        path: path.display().to_string(),
        source,
    })?;
    data.push(b'\n');
    write_atomic(path, &data).map_err(|source| ManifestError::Io {
        path: path.display().to_string(),
        source,
    })
}

// ─── Store ───────────────────────────────────────────────────────────

/// Sole owner of the part and element manifests below a library root.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    root: PathBuf,
}

impl ManifestStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn part_path(&self, device: &Uuid) -> PathBuf {
        self.root.join(PARTS_DIR).join(format!("{device}.part.wp"))
    }

    pub fn element_manifest_path(&self, kind: ElementKind, uuid: &Uuid) -> PathBuf {
        element_path(&self.root, kind, uuid, &kind.manifest_file(uuid))
    }

    /// Register a new part. Fails without writing when the device already has
    /// a manifest or any of its UUIDs belongs to another part.
    pub fn create_part(
        &self,
        info: &PartInfo,
        uuids: PartIdentity,
    ) -> Result<PartManifest, ManifestError> {
        self.ensure_available(&uuids)?;
        let part = PartManifest {
            version: MANIFEST_VERSION,
            lcsc_part: info.lcsc_part.clone(),
            mpn: info.mpn.clone(),
            manufacturer: info.manufacturer.clone(),
            added_at_utc: Utc::now(),
            overall_status: PartStatus::NeedsReview,
            uuids,
        };
        write_json(&self.part_path(&uuids.device), &part)?;
        log::info!("Added part {} ({})", part.lcsc_part, uuids.device);
        Ok(part)
    }

    /// Fails with `DuplicatePart` when a part manifest already claims any
    /// of these UUIDs.
    pub fn ensure_available(&self, uuids: &PartIdentity) -> Result<(), ManifestError> {
        if self.part_path(&uuids.device).exists() {
            return Err(ManifestError::DuplicatePart(uuids.device));
        }
        let wanted: HashSet<Uuid> = uuids.all().into_iter().collect();
        for existing in self.list_parts()? {
            if let Some(clash) = existing.uuids.all().into_iter().find(|u| wanted.contains(u)) {
                return Err(ManifestError::DuplicatePart(clash));
            }
        }
        Ok(())
    }

    pub fn load_part(&self, device: &Uuid) -> Result<PartManifest, ManifestError> {
        let path = self.part_path(device);
        if !path.exists() {
            return Err(ManifestError::NotFound(*device));
        }
        read_json(&path)
    }

    pub fn load_element(
        &self,
        kind: ElementKind,
        uuid: &Uuid,
    ) -> Result<ElementManifest, ManifestError> {
        let path = self.element_manifest_path(kind, uuid);
        if !path.exists() {
            return Err(ManifestError::NotFound(*uuid));
        }
        read_json(&path)
    }

    fn load_element_or_default(
        &self,
        kind: ElementKind,
        uuid: &Uuid,
    ) -> Result<ElementManifest, ManifestError> {
        match self.load_element(kind, uuid) {
            Err(ManifestError::NotFound(_)) => Ok(ElementManifest::default()),
            other => other,
        }
    }

    /// Reconcile a validation run into the element manifest, creating it
    /// when missing.
    pub fn update_element(
        &self,
        kind: ElementKind,
        uuid: &Uuid,
        findings: &[Finding],
    ) -> Result<ElementManifest, ManifestError> {
        let old = self.load_element_or_default(kind, uuid)?;
        let new = reconcile(&old, findings);
        write_json(&self.element_manifest_path(kind, uuid), &new)?;
        log::debug!(
            "Updated {kind} {uuid}: {} unresolved issue(s)",
            new.unresolved().count()
        );
        Ok(new)
    }

    /// `approved` when all four elements are approved; a rejected part stays
    /// rejected until one of its elements is reopened.
    pub fn recompute_overall_status(&self, device: &Uuid) -> Result<PartStatus, ManifestError> {
        let mut part = self.load_part(device)?;
        if part.overall_status == PartStatus::Rejected {
            return Ok(PartStatus::Rejected);
        }
        let mut all_approved = true;
        for kind in ElementKind::ALL {
            let element = self.load_element_or_default(kind, &part.element_uuid(kind))?;
            all_approved &= element.status == ElementStatus::Approved;
        }
        let status = if all_approved {
            PartStatus::Approved
        } else {
            PartStatus::NeedsReview
        };
        if status != part.overall_status {
            part.overall_status = status;
            write_json(&self.part_path(device), &part)?;
        }
        Ok(status)
    }

    /// Record a human approval of one element.
    pub fn approve_element(
        &self,
        kind: ElementKind,
        uuid: &Uuid,
    ) -> Result<ElementManifest, ManifestError> {
        self.set_element_status(kind, uuid, ElementStatus::Approved)
    }

    /// Send an element back to review; clears a rejection of its part.
    pub fn reopen_element(
        &self,
        kind: ElementKind,
        uuid: &Uuid,
    ) -> Result<ElementManifest, ManifestError> {
        if let Some(mut part) = self.find_part(kind, uuid)? {
            if part.overall_status == PartStatus::Rejected {
                part.overall_status = PartStatus::NeedsReview;
                write_json(&self.part_path(&part.uuids.device), &part)?;
            }
        }
        self.set_element_status(kind, uuid, ElementStatus::NeedsReview)
    }

    fn set_element_status(
        &self,
        kind: ElementKind,
        uuid: &Uuid,
        status: ElementStatus,
    ) -> Result<ElementManifest, ManifestError> {
        let mut element = self.load_element_or_default(kind, uuid)?;
        element.status = status;
        write_json(&self.element_manifest_path(kind, uuid), &element)?;
        if let Some(part) = self.find_part(kind, uuid)? {
            self.recompute_overall_status(&part.uuids.device)?;
        }
        Ok(element)
    }

    pub fn reject_part(&self, device: &Uuid) -> Result<PartManifest, ManifestError> {
        let mut part = self.load_part(device)?;
        part.overall_status = PartStatus::Rejected;
        write_json(&self.part_path(device), &part)?;
        log::info!("Rejected part {} ({device})", part.lcsc_part);
        Ok(part)
    }

    /// All part manifests, ordered by device UUID.
    pub fn list_parts(&self) -> Result<Vec<PartManifest>, ManifestError> {
        let dir = self.root.join(PARTS_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ManifestError::Io {
                    path: dir.display().to_string(),
                    source,
                })
            }
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".part.wp"))
            })
            .collect();
        paths.sort();
        paths.iter().map(|p| read_json(p)).collect()
    }

    /// The part owning an element, if any.
    pub fn find_part(
        &self,
        kind: ElementKind,
        uuid: &Uuid,
    ) -> Result<Option<PartManifest>, ManifestError> {
        Ok(self
            .list_parts()?
            .into_iter()
            .find(|p| p.element_uuid(kind) == *uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn identity() -> PartIdentity {
        PartIdentity::from_vendor(
            Uuid::parse_str("d79d354b-62bd-4866-996a-78941c575e78").unwrap(),
            Uuid::parse_str("512dc09f-9434-4046-8381-248b8b264b12").unwrap(),
        )
    }

    fn info() -> PartInfo {
        PartInfo {
            lcsc_part: "C12345".to_string(),
            mpn: "AC1117".to_string(),
            manufacturer: "ACME".to_string(),
            ..Default::default()
        }
    }

    fn warning(code: &str, message: &str) -> Finding {
        Finding::new(Severity::Warning, code, message)
    }

    fn issue(code: &str, message: &str, status: IssueStatus) -> Issue {
        Issue {
            code: code.to_string(),
            message: message.to_string(),
            status,
        }
    }

    #[test]
    fn test_reconcile_transitions() {
        let run1 = reconcile(
            &ElementManifest::default(),
            &[warning("X", "Y"), warning("A", "B")],
        );
        assert_eq!(
            run1.validation.warnings,
            vec![
                issue("X", "Y", IssueStatus::Unresolved),
                issue("A", "B", IssueStatus::Unresolved)
            ]
        );

        let run2 = reconcile(&run1, &[warning("A", "B"), warning("N", "new")]);
        assert_eq!(
            run2.validation.warnings,
            vec![
                issue("X", "Y", IssueStatus::Resolved),
                issue("A", "B", IssueStatus::Unresolved),
                issue("N", "new", IssueStatus::Unresolved)
            ]
        );

        let run3 = reconcile(&run2, &[warning("X", "Y")]);
        assert_eq!(run3.validation.warnings[0].status, IssueStatus::Unresolved);
        assert_eq!(run3.validation.warnings.len(), 3);
    }

    #[test]
    fn test_reconcile_keeps_approval_and_splits_severity() {
        let approved = ElementManifest {
            status: ElementStatus::Approved,
            ..Default::default()
        };
        let out = reconcile(
            &approved,
            &[
                Finding::new(Severity::Error, "librepcb_error", "bad"),
                warning("w", "meh"),
                warning("w", "meh"),
            ],
        );
        assert_eq!(out.status, ElementStatus::Approved);
        assert_eq!(out.validation.errors.len(), 1);
        assert_eq!(out.validation.warnings.len(), 1);
    }

    #[test]
    fn test_reconcile_same_message_different_code() {
        let run1 = reconcile(&ElementManifest::default(), &[warning("a", "m")]);
        let run2 = reconcile(&run1, &[warning("b", "m")]);
        assert_eq!(run2.validation.warnings[0].status, IssueStatus::Resolved);
        assert_eq!(run2.validation.warnings[1].code, "b");
    }

    #[test]
    fn test_create_part_twice_fails() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path());
        let part = store.create_part(&info(), identity()).unwrap();
        assert_eq!(part.overall_status, PartStatus::NeedsReview);
        let path = store.part_path(&identity().device);
        let before = fs::read(&path).unwrap();

        let err = store.create_part(&info(), identity()).unwrap_err();
        assert!(matches!(err, ManifestError::DuplicatePart(u) if u == identity().device));
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(store.list_parts().unwrap().len(), 1);
    }

    #[test]
    fn test_create_part_detects_shared_uuid() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path());
        store.create_part(&info(), identity()).unwrap();
        let mut other = identity();
        other.device = Uuid::new_v4();
        other.component = Uuid::new_v4();
        let err = store.create_part(&info(), other).unwrap_err();
        assert!(matches!(err, ManifestError::DuplicatePart(u) if u == identity().symbol));
        assert!(!store.part_path(&other.device).exists());
    }

    #[test]
    fn test_part_manifest_json_shape() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path());
        store.create_part(&info(), identity()).unwrap();
        let raw = fs::read_to_string(store.part_path(&identity().device)).unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["version"], 1);
        assert_eq!(v["lcsc_part"], "C12345");
        assert_eq!(v["overall_status"], "needs_review");
        assert_eq!(
            v["uuids"]["symbol"],
            "d79d354b-62bd-4866-996a-78941c575e78"
        );
        assert!(v["added_at_utc"].is_string());
    }

    #[test]
    fn test_update_element_persists() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path());
        let id = identity();
        store
            .update_element(ElementKind::Package, &id.package, &[warning("X", "Y")])
            .unwrap();
        let path = store.element_manifest_path(ElementKind::Package, &id.package);
        assert!(path.ends_with(format!("pkg/{}/{}.footprint.wp", id.package, id.package)));
        store
            .update_element(ElementKind::Package, &id.package, &[])
            .unwrap();
        let loaded = store.load_element(ElementKind::Package, &id.package).unwrap();
        assert_eq!(loaded.validation.warnings[0].status, IssueStatus::Resolved);
        let v: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(v["validation"]["warnings"][0]["status"], "resolved");
        assert_eq!(v["status"], "needs_review");
    }

    #[test]
    fn test_overall_status_follows_approvals() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path());
        let id = identity();
        store.create_part(&info(), id).unwrap();
        for kind in &ElementKind::ALL[..3] {
            let uuid = store.load_part(&id.device).unwrap().element_uuid(*kind);
            store.approve_element(*kind, &uuid).unwrap();
        }
        assert_eq!(
            store.recompute_overall_status(&id.device).unwrap(),
            PartStatus::NeedsReview
        );
        store.approve_element(ElementKind::Device, &id.device).unwrap();
        assert_eq!(
            store.load_part(&id.device).unwrap().overall_status,
            PartStatus::Approved
        );

        // A fresh run with no issues leaves approval alone.
        let after = store
            .update_element(ElementKind::Device, &id.device, &[])
            .unwrap();
        assert_eq!(after.status, ElementStatus::Approved);

        store.reopen_element(ElementKind::Symbol, &id.symbol).unwrap();
        assert_eq!(
            store.load_part(&id.device).unwrap().overall_status,
            PartStatus::NeedsReview
        );
    }

    #[test]
    fn test_reject_is_sticky_until_reopen() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path());
        let id = identity();
        store.create_part(&info(), id).unwrap();
        store.reject_part(&id.device).unwrap();
        assert_eq!(
            store.recompute_overall_status(&id.device).unwrap(),
            PartStatus::Rejected
        );
        store.reopen_element(ElementKind::Package, &id.package).unwrap();
        assert_eq!(
            store.load_part(&id.device).unwrap().overall_status,
            PartStatus::NeedsReview
        );
    }

    #[test]
    fn test_missing_manifests() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path());
        let id = identity();
        assert!(matches!(
            store.load_part(&id.device),
            Err(ManifestError::NotFound(_))
        ));
        assert!(store.list_parts().unwrap().is_empty());
    }

    #[test]
    fn test_check_identity() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path());
        let id = identity();
        let part = store.create_part(&info(), id).unwrap();
        assert!(part.check_identity(&id).is_ok());

        let moved = PartIdentity {
            package: Uuid::from_u128(5),
            ..id
        };
        match part.check_identity(&moved) {
            Err(ManifestError::IdentityMismatch {
                kind,
                stored,
                requested,
                ..
            }) => {
                assert_eq!(kind, ElementKind::Package);
                assert_eq!(stored, id.package);
                assert_eq!(requested, Uuid::from_u128(5));
            }
            other => panic!("expected identity mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_write_atomic_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b.wp");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
        let leftovers = fs::read_dir(dir.path().join("a")).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
