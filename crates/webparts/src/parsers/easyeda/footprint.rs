use super::path::{parse_path, parse_point_list};
use super::*;
use crate::parsers::Parsed;
use std::collections::HashMap;

/// Parse the footprint document (`packageDetail`) of a component.
pub fn parse(doc: &Value) -> Result<Parsed<CanonicalFootprint>, ParseError> {
    let detail = doc
        .get("packageDetail")
        .ok_or(ParseError::MissingField("packageDetail"))?;
    let data_str = detail
        .get("dataStr")
        .filter(|d| d.is_object())
        .ok_or(ParseError::MissingField("packageDetail.dataStr"))?;
    let head = data_str
        .get("head")
        .and_then(Head::from_value)
        .ok_or(ParseError::MissingField("packageDetail.dataStr.head"))?;
    let uuid = head.resolve_uuid(detail, "packageDetail.dataStr.head.uuid")?;
    let frame = Frame::new(head.origin);
    let layers = LayerTable::from_value(data_str.get("layers"));

    let mut vendor_pads = Vec::new();
    let mut graphics = Vec::new();
    let mut skipped: BTreeMap<String, usize> = BTreeMap::new();

    for raw in shape_strings(data_str, "packageDetail.dataStr.shape")? {
        match parse_shape(raw, &frame, &layers)? {
            Shape::Pad(pad) => vendor_pads.push(pad),
            Shape::Polygon(g) | Shape::Circle(g) | Shape::Arc(g) | Shape::Hole(g) => {
                graphics.push(g)
            }
            // Names and values are placed by the generator.
            Shape::Text(_) => *skipped.entry("TEXT".to_string()).or_default() += 1,
            Shape::Pin(_) => *skipped.entry("P".to_string()).or_default() += 1,
            Shape::Unrecognized { kind, .. } => *skipped.entry(kind).or_default() += 1,
        }
    }

    if vendor_pads.is_empty() {
        return Err(ParseError::NoPads);
    }

    let (pads, mut warnings) = group_pads(vendor_pads);
    warnings.extend(unrecognized_warnings(&skipped));

    let name = head
        .attributes
        .get("package")
        .filter(|p| !p.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| str_field(detail, "title"));

    log::debug!(
        "EasyEDA: footprint {name}: {} pads, {} graphics",
        pads.len(),
        graphics.len()
    );

    Ok(Parsed {
        value: CanonicalFootprint {
            uuid,
            name,
            description: str_field(doc, "description"),
            keywords: keywords(doc),
            created: head.created(),
            pads,
            graphics,
        },
        warnings,
    })
}

/// Group vendor pads by number, keeping first-appearance order.
pub fn group_pads(vendor_pads: Vec<VendorPad>) -> (Vec<Pad>, Vec<Warning>) {
    let mut pads: Vec<Pad> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for vp in vendor_pads {
        match index.get(&vp.number) {
            Some(&i) => {
                let pad = &mut pads[i];
                if pad.net_label.is_none() {
                    pad.net_label = vp.net;
                }
                pad.copper.push(vp.copper);
            }
            None => {
                index.insert(vp.number.clone(), pads.len());
                pads.push(Pad {
                    number: vp.number,
                    net_label: vp.net,
                    copper: vec![vp.copper],
                });
            }
        }
    }
    let warnings = pads
        .iter()
        .filter(|p| p.copper.len() > 1)
        .map(|p| {
            Warning::new(
                WarningCode::DuplicatePadNumber,
                format!(
                    "Pad number {} is used by {} copper pads",
                    p.number,
                    p.copper.len()
                ),
            )
        })
        .collect();
    (pads, warnings)
}

// ─── Layers ──────────────────────────────────────────────────────────

/// Vendor layer id → layer name, from `dataStr.layers`.
#[derive(Debug, Clone, Default)]
pub struct LayerTable {
    names: HashMap<String, String>,
}

impl LayerTable {
    /// Entries look like `"3~TopSilkLayer~#FFCC00~true~false~true~"`.
    pub fn from_value(v: Option<&Value>) -> Self {
        let mut names = HashMap::new();
        for entry in v.and_then(|l| l.as_array()).into_iter().flatten() {
            let Some(s) = entry.as_str() else { continue };
            let mut parts = s.split('~');
            if let (Some(id), Some(name)) = (parts.next(), parts.next()) {
                if !id.is_empty() && !name.is_empty() {
                    names.insert(id.to_string(), name.to_string());
                }
            }
        }
        Self { names }
    }

    pub fn layer(&self, id: &str) -> VendorLayer {
        let name = self
            .names
            .get(id)
            .cloned()
            .or_else(|| standard_layer_name(id).map(str::to_string));
        VendorLayer {
            id: id.to_string(),
            name,
        }
    }
}

/// EasyEDA's fixed layer ids, for documents without a layer table.
fn standard_layer_name(id: &str) -> Option<&'static str> {
    const INNER: [&str; 30] = [
        "Inner1", "Inner2", "Inner3", "Inner4", "Inner5", "Inner6", "Inner7", "Inner8",
        "Inner9", "Inner10", "Inner11", "Inner12", "Inner13", "Inner14", "Inner15", "Inner16",
        "Inner17", "Inner18", "Inner19", "Inner20", "Inner21", "Inner22", "Inner23", "Inner24",
        "Inner25", "Inner26", "Inner27", "Inner28", "Inner29", "Inner30",
    ];
    let n: u32 = id.parse().ok()?;
    Some(match n {
        1 => "TopLayer",
        2 => "BottomLayer",
        3 => "TopSilkLayer",
        4 => "BottomSilkLayer",
        5 => "TopPasteMaskLayer",
        6 => "BottomPasteMaskLayer",
        7 => "TopSolderMaskLayer",
        8 => "BottomSolderMaskLayer",
        9 => "Ratlines",
        10 => "BoardOutLine",
        11 => "Multi-Layer",
        12 => "Document",
        13 => "TopAssembly",
        14 => "BottomAssembly",
        15 => "Mechanical",
        19 => "3DModel",
        21..=50 => INNER[(n - 21) as usize],
        99 => "ComponentShapeLayer",
        100 => "LeadShapeLayer",
        101 => "ComponentMarkingLayer",
        _ => return None,
    })
}

// ─── Shapes ──────────────────────────────────────────────────────────

/// Classify one footprint shape string.
pub fn parse_shape(raw: &str, frame: &Frame, layers: &LayerTable) -> Result<Shape, ParseError> {
    let parts: Vec<&str> = raw.split('~').collect();
    let field = |n: usize| parts.get(n).map(|s| s.trim()).unwrap_or("");
    let shape = match parts[0] {
        "PAD" => Shape::Pad(parse_pad(&parts, raw, frame, layers)?),
        "TRACK" => {
            // TRACK~width~layer~net~points
            let vertices = point_list(field(4), frame, "TRACK", raw)?;
            Shape::Polygon(GraphicElement {
                geometry: Geometry::Polyline {
                    vertices,
                    width: frame.length(number(&parts, 1)),
                    closed: false,
                    filled: false,
                },
                layer: layers.layer(field(2)),
            })
        }
        "RECT" => {
            // RECT~x~y~width~height~layer~id~locked~strokeWidth~fill
            let x = coord(&parts, 1, "RECT", raw)?;
            let y = coord(&parts, 2, "RECT", raw)?;
            let w = coord(&parts, 3, "RECT", raw)?;
            let h = coord(&parts, 4, "RECT", raw)?;
            let corners = [[x, y], [x + w, y], [x + w, y + h], [x, y + h], [x, y]];
            let fill = field(9);
            Shape::Polygon(GraphicElement {
                geometry: Geometry::Polyline {
                    vertices: corners
                        .iter()
                        .map(|c| Vertex::at(frame.point(c[0], c[1])))
                        .collect(),
                    width: frame.length(number(&parts, 8)),
                    closed: true,
                    filled: !(fill.is_empty() || fill == "none"),
                },
                layer: layers.layer(field(5)),
            })
        }
        "CIRCLE" => {
            // CIRCLE~cx~cy~r~width~layer
            let center = frame.point(
                coord(&parts, 1, "CIRCLE", raw)?,
                coord(&parts, 2, "CIRCLE", raw)?,
            );
            Shape::Circle(GraphicElement {
                geometry: Geometry::Circle {
                    center,
                    radius: frame.length(coord(&parts, 3, "CIRCLE", raw)?),
                    width: frame.length(number(&parts, 4)),
                    filled: false,
                },
                layer: layers.layer(field(5)),
            })
        }
        "ARC" => {
            // ARC~width~layer~net~path
            let path = parse_path(field(4), frame);
            if path.vertices.len() < 2 {
                return Err(ParseError::MalformedCoordinates {
                    shape: "ARC",
                    raw: raw.to_string(),
                });
            }
            Shape::Arc(GraphicElement {
                geometry: Geometry::Polyline {
                    vertices: path.vertices,
                    width: frame.length(number(&parts, 1)),
                    closed: false,
                    filled: false,
                },
                layer: layers.layer(field(2)),
            })
        }
        "SOLIDREGION" => {
            // SOLIDREGION~layer~net~path~type
            let mut path = parse_path(field(3), frame);
            if path.vertices.len() < 3 {
                return Err(ParseError::MalformedCoordinates {
                    shape: "SOLIDREGION",
                    raw: raw.to_string(),
                });
            }
            if path.vertices.first().map(|v| v.position) != path.vertices.last().map(|v| v.position) {
                path.vertices.push(Vertex::at(path.vertices[0].position));
            }
            Shape::Polygon(GraphicElement {
                geometry: Geometry::Polyline {
                    vertices: path.vertices,
                    width: 0.0,
                    closed: true,
                    filled: field(4) == "solid",
                },
                layer: layers.layer(field(1)),
            })
        }
        "HOLE" => {
            // HOLE~cx~cy~radius
            let center = frame.point(coord(&parts, 1, "HOLE", raw)?, coord(&parts, 2, "HOLE", raw)?);
            Shape::Hole(GraphicElement {
                geometry: Geometry::Hole {
                    center,
                    diameter: frame.length(coord(&parts, 3, "HOLE", raw)? * 2.0),
                },
                layer: VendorLayer {
                    id: "hole".to_string(),
                    name: Some("Hole".to_string()),
                },
            })
        }
        "TEXT" => {
            // TEXT~type~x~y~strokeWidth~rotation~mirror~layer~net~fontSize~text
            Shape::Text(GraphicElement {
                geometry: Geometry::Text {
                    text: field(10).to_string(),
                    position: frame.point(number(&parts, 2), number(&parts, 3)),
                    height: frame.length(number(&parts, 9)),
                    rotation: number(&parts, 5),
                },
                layer: layers.layer(field(7)),
            })
        }
        _ => Shape::unrecognized(raw),
    };
    Ok(shape)
}

fn point_list(
    raw_points: &str,
    frame: &Frame,
    shape: &'static str,
    raw: &str,
) -> Result<Vec<Vertex>, ParseError> {
    parse_point_list(raw_points)
        .filter(|p| p.len() >= 2)
        .map(|p| p.iter().map(|c| Vertex::at(frame.point(c[0], c[1]))).collect())
        .ok_or_else(|| ParseError::MalformedCoordinates {
            shape,
            raw: raw.to_string(),
        })
}

/// `PAD~shape~cx~cy~w~h~layer~net~number~holeRadius~points~rotation~id~holeLength~holePoints~plated`
fn parse_pad(
    parts: &[&str],
    raw: &str,
    frame: &Frame,
    layers: &LayerTable,
) -> Result<VendorPad, ParseError> {
    let field = |n: usize| parts.get(n).map(|s| s.trim()).unwrap_or("");
    let position = frame.point(coord(parts, 2, "PAD", raw)?, coord(parts, 3, "PAD", raw)?);
    let size = [
        frame.length(coord(parts, 4, "PAD", raw)?),
        frame.length(coord(parts, 5, "PAD", raw)?),
    ];
    let relative = |p: &[f64; 2]| {
        let abs = frame.point(p[0], p[1]);
        [abs[0] - position[0], abs[1] - position[1]]
    };

    // Vendor rotation is clockwise.
    let mut rotation = (-number(parts, 11)).rem_euclid(360.0);
    let shape = match field(1) {
        "RECT" => PadShape::Rect,
        "ROUND" => PadShape::Round,
        "OVAL" => PadShape::Oval,
        "ELLIPSE" => PadShape::Ellipse,
        "POLYGON" => {
            // Polygon points are absolute and already rotated.
            rotation = 0.0;
            let points = parse_point_list(field(10)).unwrap_or_default();
            PadShape::Polygon(points.iter().map(relative).collect())
        }
        other => PadShape::Other(other.to_string()),
    };

    let hole_radius = number(parts, 9);
    let drill = if hole_radius > 0.0 {
        let slot = parse_point_list(field(14))
            .filter(|p| p.len() >= 2 && number(parts, 13) > 0.0)
            .map(|p| p.iter().map(relative).collect());
        let plated = !matches!(field(15).to_ascii_uppercase().as_str(), "N" | "FALSE" | "0");
        Some(Drill {
            diameter: frame.length(hole_radius * 2.0),
            path: slot.unwrap_or_else(|| vec![[0.0, 0.0]]),
            plated,
        })
    } else {
        None
    };

    let net = field(7);
    Ok(VendorPad {
        number: field(8).to_string(),
        net: (!net.is_empty()).then(|| net.to_string()),
        copper: PadCopper {
            shape,
            position,
            size,
            rotation,
            layer: layers.layer(field(6)),
            drill,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use approx::assert_relative_eq;

    fn frame() -> Frame {
        Frame::new([4000.0, 3000.0])
    }

    fn pad(raw: &str) -> VendorPad {
        match parse_shape(raw, &frame(), &LayerTable::default()).unwrap() {
            Shape::Pad(p) => p,
            other => panic!("expected pad, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_smd_pad() {
        let p = pad("PAD~RECT~3990~2990~4~6~1~VDD~1~0~~90~gge10~0~~Y~0~0~0.2~");
        assert_eq!(p.number, "1");
        assert_eq!(p.net.as_deref(), Some("VDD"));
        assert_eq!(p.copper.shape, PadShape::Rect);
        assert_relative_eq!(p.copper.position[0], -2.54, epsilon = 1e-9);
        assert_relative_eq!(p.copper.position[1], 2.54, epsilon = 1e-9);
        assert_relative_eq!(p.copper.size[1], 1.524, epsilon = 1e-9);
        assert_relative_eq!(p.copper.rotation, 270.0);
        assert_eq!(p.copper.layer.name.as_deref(), Some("TopLayer"));
        assert!(p.copper.drill.is_none());
    }

    #[test]
    fn test_parse_tht_pad() {
        let p = pad("PAD~ROUND~4000~3000~6~6~11~~1~1.5~~0~gge1~0~~N");
        let drill = p.copper.drill.unwrap();
        assert_relative_eq!(drill.diameter, 0.762, epsilon = 1e-9);
        assert_eq!(drill.path, vec![[0.0, 0.0]]);
        assert!(!drill.plated);
        assert_eq!(p.net, None);
    }

    #[test]
    fn test_parse_slot_pad() {
        let p = pad("PAD~OVAL~4000~3000~6~12~11~~1~1.5~~0~gge1~6~4000 2997 4000 3003~Y");
        let drill = p.copper.drill.unwrap();
        assert_eq!(drill.path.len(), 2);
        assert_relative_eq!(drill.path[0][1], 0.762, epsilon = 1e-9);
        assert!(drill.plated);
    }

    #[test]
    fn test_polygon_pad_points_relative() {
        let p = pad("PAD~POLYGON~4000~3000~4~4~1~~1~0~3998 2998 4002 2998 4002 3002~45~gge1~0~~Y");
        let PadShape::Polygon(points) = &p.copper.shape else {
            panic!("expected polygon");
        };
        assert_eq!(points.len(), 3);
        assert_relative_eq!(points[0][0], -0.508, epsilon = 1e-9);
        assert_relative_eq!(points[0][1], 0.508, epsilon = 1e-9);
        assert_eq!(p.copper.rotation, 0.0);
    }

    #[test]
    fn test_unknown_pad_shape_kept() {
        let p = pad("PAD~STAR~4000~3000~4~4~1~~1~0~~0~gge1~0~~Y");
        assert_eq!(p.copper.shape, PadShape::Other("STAR".to_string()));
    }

    #[test]
    fn test_malformed_pad() {
        let r = parse_shape("PAD~RECT~x~3000~4~4~1", &frame(), &LayerTable::default());
        assert!(matches!(
            r,
            Err(ParseError::MalformedCoordinates { shape: "PAD", .. })
        ));
    }

    #[test]
    fn test_solid_region_closed() {
        let s = parse_shape(
            "SOLIDREGION~99~~M 3990 2990 L 4010 2990 L 4010 3010~solid~gge1",
            &frame(),
            &LayerTable::default(),
        )
        .unwrap();
        let Shape::Polygon(g) = s else {
            panic!("expected polygon");
        };
        assert_eq!(g.layer.name.as_deref(), Some("ComponentShapeLayer"));
        let Geometry::Polyline { vertices, filled, closed, .. } = g.geometry else {
            panic!("expected polyline");
        };
        assert!(filled && closed);
        assert_eq!(vertices.len(), 4);
    }

    #[test]
    fn test_layer_table_overrides_standard() {
        let v = serde_json::json!(["3~MySilk~#fff", "bogus"]);
        let t = LayerTable::from_value(Some(&v));
        assert_eq!(t.layer("3").name.as_deref(), Some("MySilk"));
        assert_eq!(t.layer("23").name.as_deref(), Some("Inner3"));
        assert_eq!(t.layer("77").name, None);
    }

    #[test]
    fn test_group_pads_merges_numbers() {
        let a = pad("PAD~RECT~3990~2990~4~6~1~~5~0~~0~gge10~0~~Y");
        let b = pad("PAD~RECT~4010~2990~4~6~1~EP~5~0~~0~gge11~0~~Y");
        let c = pad("PAD~RECT~4000~2990~4~6~1~~1~0~~0~gge12~0~~Y");
        let (pads, warnings) = group_pads(vec![a, b, c]);
        assert_eq!(pads.len(), 2);
        assert_eq!(pads[0].number, "5");
        assert_eq!(pads[0].copper.len(), 2);
        assert_eq!(pads[0].net_label.as_deref(), Some("EP"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::DuplicatePadNumber);
    }

    #[test]
    fn test_parse_footprint_document() {
        let doc = fixtures::document();
        let parsed = parse(unwrap_result(&doc)).unwrap();
        let fp = parsed.value;
        assert_eq!(fp.name, "SOT-23-6");
        assert_eq!(fp.pads.len(), 6);
        assert_eq!(fp.graphics.len(), 5);
        let codes: Vec<_> = parsed.warnings.iter().map(|w| w.code).collect();
        assert_eq!(codes, vec![WarningCode::UnsupportedShape; 2]);
    }

    #[test]
    fn test_footprint_without_pads_fails() {
        let doc = serde_json::json!({
            "packageDetail": {
                "uuid": fixtures::PACKAGE_UUID,
                "dataStr": {"head": {"x": 0, "y": 0}, "shape": ["CIRCLE~0~0~1~1~3~g1"]}
            }
        });
        assert!(matches!(parse(&doc), Err(ParseError::NoPads)));
    }
}
