use crate::elements::ElementKind;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::{Builder, Uuid};

/// Deterministic version-4 UUID from a base UUID and a text modifier.
///
/// SHA-256 over the base bytes followed by the modifier; the first 16 bytes
/// of the digest become the UUID with version and variant bits forced.
pub fn derive_uuid(base: &Uuid, modifier: &str) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(base.as_bytes());
    hasher.update(modifier.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Builder::from_random_bytes(bytes).into_uuid()
}

/// Parse a vendor identifier; accepts hyphenated and plain 32-digit forms.
pub fn parse_vendor_uuid(raw: &str) -> Option<Uuid> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Uuid::parse_str(raw).ok()
}

/// The four element UUIDs of one atomic part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartIdentity {
    pub device: Uuid,
    pub component: Uuid,
    pub symbol: Uuid,
    pub package: Uuid,
}

impl PartIdentity {
    /// Component and device identifiers follow from the vendor symbol UUID.
    pub fn from_vendor(symbol: Uuid, package: Uuid) -> Self {
        Self {
            device: derive_uuid(&symbol, "device"),
            component: derive_uuid(&symbol, "component"),
            symbol,
            package,
        }
    }

    pub fn all(&self) -> [Uuid; 4] {
        [self.device, self.component, self.symbol, self.package]
    }

    pub fn get(&self, kind: ElementKind) -> Uuid {
        match kind {
            ElementKind::Symbol => self.symbol,
            ElementKind::Package => self.package,
            ElementKind::Component => self.component,
            ElementKind::Device => self.device,
        }
    }
}
