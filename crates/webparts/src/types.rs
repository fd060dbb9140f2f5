use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Round a float to N decimal places.
pub fn round_f64(v: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (v * factor).round() / factor
}

// ─── Warnings ────────────────────────────────────────────────────────

/// Stable code of a non-fatal conversion warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    UnmappedLayer,
    UnsupportedShape,
    ApproximatedPad,
    ExcludedMaskPolygons,
    DuplicatePinsMerged,
    DuplicatePadNumber,
    UnconnectedPad,
    UnconnectedPin,
    RedundantPadBinding,
    PreviousConversion,
}

impl WarningCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCode::UnmappedLayer => "unmapped_layer",
            WarningCode::UnsupportedShape => "unsupported_shape",
            WarningCode::ApproximatedPad => "approximated_pad",
            WarningCode::ExcludedMaskPolygons => "excluded_mask_polygons",
            WarningCode::DuplicatePinsMerged => "duplicate_pins_merged",
            WarningCode::DuplicatePadNumber => "duplicate_pad_number",
            WarningCode::UnconnectedPad => "unconnected_pad",
            WarningCode::UnconnectedPin => "unconnected_pin",
            WarningCode::RedundantPadBinding => "redundant_pad_binding",
            WarningCode::PreviousConversion => "previous_conversion",
        }
    }
}

/// A recorded, non-fatal loss of fidelity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub code: WarningCode,
    pub message: String,
}

impl Warning {
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        let message = message.into();
        log::warn!("{}: {message}", code.as_str());
        Self { code, message }
    }
}

// ─── Layers ──────────────────────────────────────────────────────────

/// Layer as the vendor names it. Resolved to a target layer by a `LayerMapping`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VendorLayer {
    pub id: String,
    pub name: Option<String>,
}

impl VendorLayer {
    /// Schematic drawings carry no vendor layer.
    pub fn schematic() -> Self {
        Self {
            id: "schematic".to_string(),
            name: Some("schematic".to_string()),
        }
    }

    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({name})", self.id),
            None => self.id.clone(),
        }
    }
}

// ─── Graphics ────────────────────────────────────────────────────────

/// Polyline vertex; `angle` (degrees, positive is counter-clockwise) bends
/// the segment that starts here into an arc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f64; 2],
    pub angle: f64,
}

impl Vertex {
    pub fn at(position: [f64; 2]) -> Self {
        Self {
            position,
            angle: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Polyline {
        vertices: Vec<Vertex>,
        width: f64,
        closed: bool,
        filled: bool,
    },
    Circle {
        center: [f64; 2],
        radius: f64,
        width: f64,
        filled: bool,
    },
    Ellipse {
        center: [f64; 2],
        radius: [f64; 2],
        width: f64,
        filled: bool,
    },
    Text {
        text: String,
        position: [f64; 2],
        height: f64,
        rotation: f64,
    },
    Hole {
        center: [f64; 2],
        diameter: f64,
    },
}

impl Geometry {
    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Polyline { .. } => "polyline",
            Geometry::Circle { .. } => "circle",
            Geometry::Ellipse { .. } => "ellipse",
            Geometry::Text { .. } => "text",
            Geometry::Hole { .. } => "hole",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicElement {
    pub geometry: Geometry,
    pub layer: VendorLayer,
}

// ─── Symbol ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectricalType {
    Undefined,
    Input,
    Output,
    Io,
    Power,
    Passive,
}

impl ElectricalType {
    pub fn from_vendor(code: i64) -> Self {
        match code {
            1 => ElectricalType::Input,
            2 => ElectricalType::Output,
            3 => ElectricalType::Io,
            4 => ElectricalType::Power,
            _ => ElectricalType::Undefined,
        }
    }
}

/// Direction a pin points away from the symbol body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinDirection {
    Right,
    Down,
    Left,
    Up,
}

impl PinDirection {
    pub fn from_rotation(degrees: i64) -> Self {
        match degrees.rem_euclid(360) {
            90 => PinDirection::Down,
            180 => PinDirection::Left,
            270 => PinDirection::Up,
            _ => PinDirection::Right,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    /// Vendor identifier, when the vendor supplied a real UUID.
    pub vendor_uuid: Option<Uuid>,
    pub number: String,
    pub name: String,
    pub position: [f64; 2],
    pub direction: PinDirection,
    pub length: f64,
    pub electrical_type: ElectricalType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalSymbol {
    pub uuid: Uuid,
    pub name: String,
    pub prefix: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub created: Option<DateTime<Utc>>,
    pub origin: [f64; 2],
    pub pins: Vec<Pin>,
    pub graphics: Vec<GraphicElement>,
}

// ─── Footprint ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum PadShape {
    Rect,
    Round,
    Oval,
    Ellipse,
    /// Outline relative to the pad center.
    Polygon(Vec<[f64; 2]>),
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Drill {
    pub diameter: f64,
    /// Slot path relative to the pad center; a single point for round holes.
    pub path: Vec<[f64; 2]>,
    pub plated: bool,
}

/// One piece of physical copper.
#[derive(Debug, Clone, PartialEq)]
pub struct PadCopper {
    pub shape: PadShape,
    pub position: [f64; 2],
    pub size: [f64; 2],
    pub rotation: f64,
    pub layer: VendorLayer,
    pub drill: Option<Drill>,
}

/// A pad number with all copper that carries it.
#[derive(Debug, Clone, PartialEq)]
pub struct Pad {
    pub number: String,
    pub net_label: Option<String>,
    /// Never empty; the first entry is the primary copper.
    pub copper: Vec<PadCopper>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalFootprint {
    pub uuid: Uuid,
    pub name: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub created: Option<DateTime<Utc>>,
    /// Pad numbers are unique.
    pub pads: Vec<Pad>,
    pub graphics: Vec<GraphicElement>,
}

// ─── Vendor part ─────────────────────────────────────────────────────

/// Identifiers and metadata of one vendor part.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartInfo {
    pub lcsc_part: String,
    pub mpn: String,
    pub manufacturer: String,
    pub title: String,
    pub description: String,
    pub datasheet: Option<String>,
}
