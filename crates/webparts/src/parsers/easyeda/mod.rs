pub mod footprint;
pub mod path;
pub mod symbol;

use crate::error::ParseError;
use crate::ids::parse_vendor_uuid;
use crate::types::*;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::VendorPart;

/// One EasyEDA unit (10 mil) in millimetres.
pub const UNIT_MM: f64 = 0.254;

/// Parse an LCSC/EasyEDA component API document.
pub fn parse(data: &[u8]) -> Result<VendorPart, ParseError> {
    let root: Value = serde_json::from_slice(data)?;
    let doc = unwrap_result(&root);
    if !doc.is_object() {
        return Err(ParseError::MissingField("result"));
    }

    let info = part_info(doc)?;
    let symbol = symbol::parse(doc)?;
    let footprint = footprint::parse(doc)?;
    log::info!(
        "EasyEDA: parsed {} ({} pins, {} pads)",
        info.lcsc_part,
        symbol.value.pins.len(),
        footprint.value.pads.len()
    );

    Ok(VendorPart {
        info,
        symbol,
        footprint,
        source: doc.clone(),
    })
}

/// The API wraps the document as `{"success": true, "result": {...}}`.
pub fn unwrap_result(root: &Value) -> &Value {
    match root.get("result") {
        Some(result) if result.is_object() => result,
        _ => root,
    }
}

/// Vendor identifiers from `lcsc` and the symbol's `c_para` attributes.
pub fn part_info(doc: &Value) -> Result<PartInfo, ParseError> {
    let attrs = doc
        .get("dataStr")
        .and_then(|d| d.get("head"))
        .and_then(Head::from_value)
        .map(|h| h.attributes)
        .unwrap_or_default();
    let attr = |key: &str| {
        attrs
            .get(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let lcsc_part = doc
        .get("lcsc")
        .and_then(|l| l.get("number"))
        .and_then(|n| n.as_str())
        .map(str::to_string)
        .or_else(|| attr("Supplier Part"))
        .ok_or(ParseError::MissingField("lcsc.number"))?;
    let title = str_field(doc, "title");

    Ok(PartInfo {
        mpn: attr("Manufacturer Part").unwrap_or_else(|| title.clone()),
        manufacturer: attr("Manufacturer").unwrap_or_default(),
        datasheet: attr("link"),
        description: str_field(doc, "description"),
        title,
        lcsc_part,
    })
}

fn str_field(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(|s| s.as_str())
        .unwrap_or("")
        .trim()
        .to_string()
}

fn keywords(doc: &Value) -> Vec<String> {
    doc.get("tags")
        .and_then(|t| t.as_array())
        .map(|tags| {
            tags.iter()
                .filter_map(|t| t.as_str())
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn shape_strings<'a>(
    data_str: &'a Value,
    field: &'static str,
) -> Result<impl Iterator<Item = &'a str>, ParseError> {
    let shapes = data_str
        .get("shape")
        .and_then(|s| s.as_array())
        .ok_or(ParseError::MissingField(field))?;
    Ok(shapes.iter().filter_map(|s| s.as_str()))
}

// ─── Document head ───────────────────────────────────────────────────

/// `dataStr.head` of a symbol or footprint document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Head {
    pub origin: [f64; 2],
    pub uuid: Option<String>,
    pub utime: Option<i64>,
    pub attributes: BTreeMap<String, String>,
}

impl Head {
    /// Accepts the object form and the legacy `~`-separated string form.
    pub fn from_value(v: &Value) -> Option<Head> {
        match v {
            Value::Object(obj) => {
                let num = |key: &str| -> f64 {
                    match obj.get(key) {
                        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
                        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
                        _ => 0.0,
                    }
                };
                let utime = match obj.get("utime") {
                    Some(Value::Number(n)) => n.as_i64(),
                    Some(Value::String(s)) => s.parse().ok(),
                    _ => None,
                };
                let attributes = obj
                    .get("c_para")
                    .and_then(|c| c.as_object())
                    .map(|c| {
                        c.iter()
                            .map(|(k, v)| {
                                let v = match v {
                                    Value::String(s) => s.clone(),
                                    other => other.to_string(),
                                };
                                (k.clone(), v)
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Some(Head {
                    origin: [num("x"), num("y")],
                    uuid: obj
                        .get("uuid")
                        .and_then(|u| u.as_str())
                        .map(str::to_string),
                    utime,
                    attributes,
                })
            }
            Value::String(s) => {
                // "7~1.7.5~400~300~package`DIP08`pre`U?`"
                let parts: Vec<&str> = s.split('~').collect();
                let coord = |n: usize| -> f64 {
                    parts.get(n).and_then(|s| s.parse().ok()).unwrap_or(0.0)
                };
                let rest = parts.get(4..).map(|p| p.join("~")).unwrap_or_default();
                let fields: Vec<&str> = rest.split('`').collect();
                let attributes = fields
                    .chunks(2)
                    .filter(|c| c.len() == 2 && !c[0].is_empty())
                    .map(|c| (c[0].to_string(), c[1].to_string()))
                    .collect();
                Some(Head {
                    origin: [coord(2), coord(3)],
                    uuid: None,
                    utime: None,
                    attributes,
                })
            }
            _ => None,
        }
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.utime.and_then(|t| DateTime::from_timestamp(t, 0))
    }

    /// Head UUID, falling back to the enclosing document's `uuid`.
    fn resolve_uuid(&self, doc: &Value, field: &'static str) -> Result<Uuid, ParseError> {
        let raw = self
            .uuid
            .clone()
            .or_else(|| doc.get("uuid").and_then(|u| u.as_str()).map(str::to_string))
            .ok_or(ParseError::MissingField(field))?;
        parse_vendor_uuid(&raw).ok_or(ParseError::InvalidUuid { field, value: raw })
    }
}

// ─── Coordinate frame ────────────────────────────────────────────────

/// Vendor units relative to the head origin → millimetres with Y up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    origin: [f64; 2],
}

impl Frame {
    pub fn new(origin: [f64; 2]) -> Self {
        Self { origin }
    }

    pub fn point(&self, x: f64, y: f64) -> [f64; 2] {
        [
            (x - self.origin[0]) * UNIT_MM,
            -(y - self.origin[1]) * UNIT_MM,
        ]
    }

    pub fn length(&self, v: f64) -> f64 {
        v * UNIT_MM
    }
}

// ─── Shapes ──────────────────────────────────────────────────────────

/// A pad as one vendor PAD shape describes it.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorPad {
    pub number: String,
    pub net: Option<String>,
    pub copper: PadCopper,
}

/// One entry of a vendor `shape` list.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Pin(Pin),
    Pad(VendorPad),
    /// Lines, rectangles, polylines, tracks and filled regions.
    Polygon(GraphicElement),
    Circle(GraphicElement),
    Arc(GraphicElement),
    Text(GraphicElement),
    Hole(GraphicElement),
    /// Anything this parser does not convert, kept verbatim.
    Unrecognized { kind: String, raw: String },
}

impl Shape {
    pub fn unrecognized(raw: &str) -> Self {
        Shape::Unrecognized {
            kind: raw.split('~').next().unwrap_or("").to_string(),
            raw: raw.to_string(),
        }
    }
}

/// Required numeric field of a shape string.
fn coord(parts: &[&str], n: usize, shape: &'static str, raw: &str) -> Result<f64, ParseError> {
    parts
        .get(n)
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::MalformedCoordinates {
            shape,
            raw: raw.to_string(),
        })
}

/// Optional numeric field of a shape string.
fn number(parts: &[&str], n: usize) -> f64 {
    parts
        .get(n)
        .and_then(|s| s.trim().trim_end_matches("pt").parse().ok())
        .filter(|v: &f64| v.is_finite())
        .unwrap_or(0.0)
}

/// Collapse unrecognized shapes into one warning per kind.
fn unrecognized_warnings(kinds: &BTreeMap<String, usize>) -> Vec<Warning> {
    kinds
        .iter()
        .map(|(kind, count)| {
            let kind = if kind.is_empty() { "(empty)" } else { kind };
            Warning::new(
                WarningCode::UnsupportedShape,
                format!("Skipped {count} unsupported {kind} shape(s)"),
            )
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_unwrap_result() {
        let doc = fixtures::document();
        assert_eq!(unwrap_result(&doc)["lcsc"]["number"], "C12345");
        let bare = serde_json::json!({"title": "x"});
        assert_eq!(unwrap_result(&bare)["title"], "x");
    }

    #[test]
    fn test_part_info() {
        let doc = fixtures::document();
        let info = part_info(unwrap_result(&doc)).unwrap();
        assert_eq!(info.lcsc_part, "C12345");
        assert_eq!(info.mpn, "AC1117");
        assert_eq!(info.manufacturer, "ACME");
        assert_eq!(info.datasheet.as_deref(), Some("https://example.com/ds.pdf"));
    }

    #[test]
    fn test_part_info_requires_lcsc_number() {
        let doc = serde_json::json!({"title": "x"});
        assert!(matches!(
            part_info(&doc),
            Err(ParseError::MissingField("lcsc.number"))
        ));
    }

    #[test]
    fn test_legacy_string_head() {
        let head = Head::from_value(&Value::String(
            "7~1.7.5~400~300~package`DIP08`pre`U?`".to_string(),
        ))
        .unwrap();
        assert_eq!(head.origin, [400.0, 300.0]);
        assert_eq!(head.attributes.get("pre").map(String::as_str), Some("U?"));
        assert_eq!(head.attributes.get("package").map(String::as_str), Some("DIP08"));
    }

    #[test]
    fn test_head_created() {
        let head = Head {
            utime: Some(1_700_000_000),
            ..Head::default()
        };
        assert_eq!(
            head.created().unwrap().to_rfc3339(),
            "2023-11-14T22:13:20+00:00"
        );
    }

    #[test]
    fn test_frame_inverts_y() {
        let f = Frame::new([400.0, 300.0]);
        let p = f.point(410.0, 290.0);
        assert_relative_eq!(p[0], 2.54, epsilon = 1e-9);
        assert_relative_eq!(p[1], 2.54, epsilon = 1e-9);
    }

    #[test]
    fn test_coord_rejects_garbage() {
        let parts = ["P", "abc"];
        assert!(coord(&parts, 1, "P", "P~abc").is_err());
        assert!(coord(&parts, 5, "P", "P~abc").is_err());
        assert_eq!(number(&["T", "9pt"], 1), 9.0);
    }

    #[test]
    fn test_parse_full_document() {
        let data = serde_json::to_vec(&fixtures::document()).unwrap();
        let part = parse(&data).unwrap();
        assert_eq!(part.symbol.value.pins.len(), 5);
        assert_eq!(part.footprint.value.pads.len(), 6);
        assert_eq!(part.info.lcsc_part, "C12345");
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(parse(b"[1, 2]").is_err());
        assert!(matches!(parse(b"{"), Err(ParseError::Json(_))));
    }
}
