use crate::error::SerializationError;
use crate::layers::TargetLayer;
use crate::types::{ElectricalType, Vertex};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

/// Category every generated element is filed under ("Unsorted").
pub const UNSORTED_CATEGORY: &str = "e29f0cb3-ef6d-4203-b854-d75150cbae0b";

// ─── Element kinds ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Symbol,
    Package,
    Component,
    Device,
}

impl ElementKind {
    pub const ALL: [ElementKind; 4] = [
        ElementKind::Symbol,
        ElementKind::Package,
        ElementKind::Component,
        ElementKind::Device,
    ];

    /// Library sub-directory.
    pub fn dir(&self) -> &'static str {
        match self {
            ElementKind::Symbol => "sym",
            ElementKind::Package => "pkg",
            ElementKind::Component => "cmp",
            ElementKind::Device => "dev",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ElementKind::Symbol => "symbol.lp",
            ElementKind::Package => "package.lp",
            ElementKind::Component => "component.lp",
            ElementKind::Device => "device.lp",
        }
    }

    /// Version marker file expected by the target tool.
    pub fn marker_file(&self) -> String {
        format!(".librepcb-{}", self.dir())
    }

    pub fn root_node(&self) -> &'static str {
        match self {
            ElementKind::Symbol => "librepcb_symbol",
            ElementKind::Package => "librepcb_package",
            ElementKind::Component => "librepcb_component",
            ElementKind::Device => "librepcb_device",
        }
    }

    /// Name used in element manifest files; packages are reviewed as footprints.
    pub fn review_name(&self) -> &'static str {
        match self {
            ElementKind::Symbol => "symbol",
            ElementKind::Package => "footprint",
            ElementKind::Component => "component",
            ElementKind::Device => "device",
        }
    }

    pub fn manifest_file(&self, uuid: &Uuid) -> String {
        format!("{uuid}.{}.wp", self.review_name())
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.review_name())
    }
}

impl FromStr for ElementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "symbol" | "sym" => Ok(ElementKind::Symbol),
            "package" | "pkg" | "footprint" => Ok(ElementKind::Package),
            "component" | "cmp" => Ok(ElementKind::Component),
            "device" | "dev" => Ok(ElementKind::Device),
            _ => Err(format!(
                "Unknown element kind: {s}. Use: symbol, footprint, component, device"
            )),
        }
    }
}

/// `{base}/{kind dir}/{uuid}/{filename}`. Never persisted.
pub fn element_path(base: &Path, kind: ElementKind, uuid: &Uuid, filename: &str) -> PathBuf {
    base.join(kind.dir()).join(uuid.to_string()).join(filename)
}

// ─── Shared pieces ───────────────────────────────────────────────────

/// Header fields common to every library element.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub uuid: Uuid,
    pub name: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub author: String,
    pub version: String,
    pub created: DateTime<Utc>,
    pub generated_by: String,
    pub category: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub uuid: Uuid,
    pub layer: TargetLayer,
    pub width: f64,
    pub fill: bool,
    pub grab_area: bool,
    pub vertices: Vec<Vertex>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Circle {
    pub uuid: Uuid,
    pub layer: TargetLayer,
    pub width: f64,
    pub fill: bool,
    pub grab_area: bool,
    pub diameter: f64,
    pub position: [f64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Center,
    Bottom,
}

impl HAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            HAlign::Left => "left",
            HAlign::Center => "center",
            HAlign::Right => "right",
        }
    }
}

impl VAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            VAlign::Top => "top",
            VAlign::Center => "center",
            VAlign::Bottom => "bottom",
        }
    }
}

/// Schematic text.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub uuid: Uuid,
    pub layer: TargetLayer,
    pub value: String,
    pub align: (HAlign, VAlign),
    pub height: f64,
    pub position: [f64; 2],
    pub rotation: f64,
}

/// Board text drawn with strokes.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeText {
    pub uuid: Uuid,
    pub layer: TargetLayer,
    pub height: f64,
    pub stroke_width: f64,
    pub align: (HAlign, VAlign),
    pub position: [f64; 2],
    pub rotation: f64,
    pub value: String,
}

// ─── Symbol ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolPin {
    pub uuid: Uuid,
    pub name: String,
    pub position: [f64; 2],
    pub rotation: f64,
    pub length: f64,
    /// Vendor pin numbers merged into this pin.
    pub numbers: Vec<String>,
    pub role: ElectricalType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub meta: Metadata,
    pub pins: Vec<SymbolPin>,
    pub polygons: Vec<Polygon>,
    pub circles: Vec<Circle>,
    pub texts: Vec<Text>,
}

// ─── Package ─────────────────────────────────────────────────────────

/// Logical pad; one per distinct pad number.
#[derive(Debug, Clone, PartialEq)]
pub struct PackagePad {
    pub uuid: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadSide {
    Top,
    Bottom,
}

impl PadSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PadSide::Top => "top",
            PadSide::Bottom => "bottom",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PadOutline {
    /// Rounded rectangle; radius is a fraction of the shorter side (0..=1).
    RoundRect { radius: f64 },
    /// Outline relative to the pad position.
    Custom(Vec<[f64; 2]>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PadHole {
    pub uuid: Uuid,
    pub diameter: f64,
    /// Relative to the pad position; more than one vertex makes a slot.
    pub vertices: Vec<[f64; 2]>,
}

/// Physical copper of one footprint, bound to a package pad.
#[derive(Debug, Clone, PartialEq)]
pub struct FootprintPad {
    pub uuid: Uuid,
    pub side: PadSide,
    pub outline: PadOutline,
    pub position: [f64; 2],
    pub rotation: f64,
    pub size: [f64; 2],
    pub package_pad: Uuid,
    /// Plated holes only; non-plated drills become footprint holes.
    pub holes: Vec<PadHole>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hole {
    pub uuid: Uuid,
    pub diameter: f64,
    pub position: [f64; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    pub uuid: Uuid,
    pub name: String,
    pub pads: Vec<FootprintPad>,
    pub polygons: Vec<Polygon>,
    pub circles: Vec<Circle>,
    pub texts: Vec<StrokeText>,
    pub holes: Vec<Hole>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyType {
    Tht,
    Smt,
    Mixed,
    None,
}

impl AssemblyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssemblyType::Tht => "tht",
            AssemblyType::Smt => "smt",
            AssemblyType::Mixed => "mixed",
            AssemblyType::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub meta: Metadata,
    pub assembly_type: AssemblyType,
    pub pads: Vec<PackagePad>,
    pub footprints: Vec<Footprint>,
}

// ─── Component ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub uuid: Uuid,
    pub name: String,
    pub role: ElectricalType,
    pub forced_net: String,
}

impl Signal {
    /// Signal role keyword in the target format.
    pub fn role_str(&self) -> &'static str {
        match self.role {
            ElectricalType::Input => "input",
            ElectricalType::Output => "output",
            ElectricalType::Io => "inout",
            ElectricalType::Power => "power",
            ElectricalType::Passive | ElectricalType::Undefined => "passive",
        }
    }
}

/// Symbol pin → component signal.
#[derive(Debug, Clone, PartialEq)]
pub struct PinSignal {
    pub pin: Uuid,
    pub signal: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gate {
    pub uuid: Uuid,
    pub symbol: Uuid,
    pub pins: Vec<PinSignal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub uuid: Uuid,
    pub name: String,
    pub gates: Vec<Gate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub meta: Metadata,
    pub prefix: String,
    pub default_value: String,
    pub signals: Vec<Signal>,
    pub variants: Vec<Variant>,
}

// ─── Device ──────────────────────────────────────────────────────────

/// Package pad → component signal; `None` leaves the pad unconnected.
#[derive(Debug, Clone, PartialEq)]
pub struct PadSignal {
    pub pad: Uuid,
    pub signal: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub mpn: String,
    pub manufacturer: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub meta: Metadata,
    pub component: Uuid,
    pub package: Uuid,
    pub pads: Vec<PadSignal>,
    pub parts: Vec<Part>,
    pub datasheet: Option<String>,
}

// ─── Generated elements ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedElement {
    Symbol(Symbol),
    Package(Package),
    Component(Component),
    Device(Device),
}

impl GeneratedElement {
    pub fn kind(&self) -> ElementKind {
        match self {
            GeneratedElement::Symbol(_) => ElementKind::Symbol,
            GeneratedElement::Package(_) => ElementKind::Package,
            GeneratedElement::Component(_) => ElementKind::Component,
            GeneratedElement::Device(_) => ElementKind::Device,
        }
    }

    pub fn meta(&self) -> &Metadata {
        match self {
            GeneratedElement::Symbol(e) => &e.meta,
            GeneratedElement::Package(e) => &e.meta,
            GeneratedElement::Component(e) => &e.meta,
            GeneratedElement::Device(e) => &e.meta,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.meta().uuid
    }

    /// UUIDs of other elements this one refers to.
    pub fn references(&self) -> Vec<(ElementKind, Uuid)> {
        match self {
            GeneratedElement::Symbol(_) | GeneratedElement::Package(_) => Vec::new(),
            GeneratedElement::Component(c) => c
                .variants
                .iter()
                .flat_map(|v| v.gates.iter())
                .map(|g| (ElementKind::Symbol, g.symbol))
                .collect(),
            GeneratedElement::Device(d) => vec![
                (ElementKind::Component, d.component),
                (ElementKind::Package, d.package),
            ],
        }
    }
}

/// Per-run map of element UUIDs to what they are.
#[derive(Debug, Clone, Default)]
pub struct ElementIndex {
    entries: BTreeMap<Uuid, (ElementKind, String)>,
}

impl ElementIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, element: &GeneratedElement) -> Result<(), SerializationError> {
        let uuid = element.uuid();
        if self.entries.contains_key(&uuid) {
            return Err(SerializationError::DuplicateUuid {
                uuid,
                element: element.meta().name.clone(),
            });
        }
        self.entries
            .insert(uuid, (element.kind(), element.meta().name.clone()));
        Ok(())
    }

    pub fn get(&self, uuid: &Uuid) -> Option<(ElementKind, &str)> {
        self.entries.get(uuid).map(|(k, n)| (*k, n.as_str()))
    }

    /// References that are neither in the index nor of the expected kind.
    pub fn dangling(&self, element: &GeneratedElement) -> Vec<Uuid> {
        element
            .references()
            .into_iter()
            .filter(|(kind, uuid)| self.get(uuid).map(|(k, _)| k) != Some(*kind))
            .map(|(_, uuid)| uuid)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(uuid: Uuid) -> Metadata {
        Metadata {
            uuid,
            name: "X".to_string(),
            description: String::new(),
            keywords: Vec::new(),
            author: String::new(),
            version: "0.1".to_string(),
            created: DateTime::<Utc>::UNIX_EPOCH,
            generated_by: String::new(),
            category: Uuid::nil(),
        }
    }

    #[test]
    fn test_element_path() {
        let u = Uuid::parse_str("d79d354b-62bd-4866-996a-78941c575e78").unwrap();
        let p = element_path(Path::new("/lib"), ElementKind::Package, &u, "package.lp");
        assert_eq!(
            p,
            PathBuf::from("/lib/pkg/d79d354b-62bd-4866-996a-78941c575e78/package.lp")
        );
    }

    #[test]
    fn test_kind_names() {
        let u = Uuid::nil();
        assert_eq!(ElementKind::Package.marker_file(), ".librepcb-pkg");
        assert_eq!(
            ElementKind::Package.manifest_file(&u),
            format!("{u}.footprint.wp")
        );
        assert_eq!("footprint".parse::<ElementKind>(), Ok(ElementKind::Package));
        assert!("board".parse::<ElementKind>().is_err());
    }

    #[test]
    fn test_index_rejects_duplicate_uuid() {
        let u = Uuid::new_v4();
        let sym = GeneratedElement::Symbol(Symbol {
            meta: meta(u),
            pins: Vec::new(),
            polygons: Vec::new(),
            circles: Vec::new(),
            texts: Vec::new(),
        });
        let mut index = ElementIndex::new();
        index.insert(&sym).unwrap();
        assert!(matches!(
            index.insert(&sym),
            Err(SerializationError::DuplicateUuid { .. })
        ));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&u), Some((ElementKind::Symbol, "X")));
    }

    #[test]
    fn test_dangling_references() {
        let dev = GeneratedElement::Device(Device {
            meta: meta(Uuid::new_v4()),
            component: Uuid::new_v4(),
            package: Uuid::new_v4(),
            pads: Vec::new(),
            parts: Vec::new(),
            datasheet: None,
        });
        let index = ElementIndex::new();
        assert_eq!(index.dangling(&dev).len(), 2);
    }
}
