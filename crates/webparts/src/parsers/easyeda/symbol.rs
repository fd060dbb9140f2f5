use super::path::{parse_path, parse_point_list};
use super::*;
use crate::parsers::Parsed;

/// Pin length used when the pin path cannot be measured.
const DEFAULT_PIN_LENGTH: f64 = 2.54;
/// Points to millimetres.
const PT_MM: f64 = 0.3528;

/// Parse the symbol document (`dataStr`) of a component.
pub fn parse(doc: &Value) -> Result<Parsed<CanonicalSymbol>, ParseError> {
    let data_str = doc
        .get("dataStr")
        .ok_or(ParseError::MissingField("dataStr"))?;
    let head = data_str
        .get("head")
        .and_then(Head::from_value)
        .ok_or(ParseError::MissingField("dataStr.head"))?;
    let uuid = head.resolve_uuid(doc, "dataStr.head.uuid")?;
    let frame = Frame::new(head.origin);

    let mut pins = Vec::new();
    let mut graphics = Vec::new();
    let mut skipped: BTreeMap<String, usize> = BTreeMap::new();

    for raw in shape_strings(data_str, "dataStr.shape")? {
        match parse_shape(raw, &frame)? {
            Some(Shape::Pin(pin)) => pins.push(pin),
            Some(
                Shape::Polygon(g)
                | Shape::Circle(g)
                | Shape::Arc(g)
                | Shape::Text(g)
                | Shape::Hole(g),
            ) => graphics.push(g),
            Some(Shape::Unrecognized { kind, .. }) => *skipped.entry(kind).or_default() += 1,
            Some(Shape::Pad(_)) => *skipped.entry("PAD".to_string()).or_default() += 1,
            None => {}
        }
    }

    if pins.is_empty() {
        return Err(ParseError::NoPins);
    }

    let attrs = &head.attributes;
    let name = attrs
        .get("name")
        .filter(|n| !n.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| str_field(doc, "title"));
    let prefix = attrs
        .get("pre")
        .map(|p| p.trim().trim_end_matches('?').to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "U".to_string());

    log::debug!(
        "EasyEDA: symbol {name}: {} pins, {} graphics",
        pins.len(),
        graphics.len()
    );

    Ok(Parsed {
        value: CanonicalSymbol {
            uuid,
            name,
            prefix,
            description: str_field(doc, "description"),
            keywords: keywords(doc),
            created: head.created(),
            origin: head.origin,
            pins,
            graphics,
        },
        warnings: unrecognized_warnings(&skipped),
    })
}

/// Classify one symbol shape string.
///
/// `Ok(None)` marks shapes that are intentionally not represented, such as
/// the name and prefix texts which the generator replaces with its own labels.
pub fn parse_shape(raw: &str, frame: &Frame) -> Result<Option<Shape>, ParseError> {
    let parts: Vec<&str> = raw.split('~').collect();
    let shape = match parts[0] {
        "P" => Shape::Pin(parse_pin(raw, frame)?),
        "R" => Shape::Polygon(parse_rect(&parts, raw, frame)?),
        "L" => {
            let a = frame.point(coord(&parts, 1, "L", raw)?, coord(&parts, 2, "L", raw)?);
            let b = frame.point(coord(&parts, 3, "L", raw)?, coord(&parts, 4, "L", raw)?);
            schematic(Geometry::Polyline {
                vertices: vec![Vertex::at(a), Vertex::at(b)],
                width: frame.length(number(&parts, 6)),
                closed: false,
                filled: false,
            })
        }
        "PL" | "PG" => {
            let closed = parts[0] == "PG";
            let points = parts
                .get(1)
                .and_then(|p| parse_point_list(p))
                .filter(|p| p.len() >= 2)
                .ok_or_else(|| ParseError::MalformedCoordinates {
                    shape: "PL",
                    raw: raw.to_string(),
                })?;
            let mut vertices: Vec<Vertex> = points
                .iter()
                .map(|p| Vertex::at(frame.point(p[0], p[1])))
                .collect();
            if closed && vertices.first() != vertices.last() {
                vertices.push(vertices[0]);
            }
            schematic(Geometry::Polyline {
                vertices,
                width: frame.length(number(&parts, 3)),
                closed,
                filled: closed && is_filled(parts.get(5)),
            })
        }
        "C" => {
            let center = frame.point(coord(&parts, 1, "C", raw)?, coord(&parts, 2, "C", raw)?);
            schematic(Geometry::Circle {
                center,
                radius: frame.length(coord(&parts, 3, "C", raw)?),
                width: frame.length(number(&parts, 5)),
                filled: is_filled(parts.get(7)),
            })
        }
        "E" => {
            let center = frame.point(coord(&parts, 1, "E", raw)?, coord(&parts, 2, "E", raw)?);
            schematic(Geometry::Ellipse {
                center,
                radius: [
                    frame.length(coord(&parts, 3, "E", raw)?),
                    frame.length(coord(&parts, 4, "E", raw)?),
                ],
                width: frame.length(number(&parts, 6)),
                filled: is_filled(parts.get(8)),
            })
        }
        "A" => {
            let path = parse_path(parts.get(1).unwrap_or(&""), frame);
            if path.vertices.len() < 2 {
                return Err(ParseError::MalformedCoordinates {
                    shape: "A",
                    raw: raw.to_string(),
                });
            }
            let closed = path.closed;
            Shape::Arc(GraphicElement {
                geometry: Geometry::Polyline {
                    vertices: path.vertices,
                    width: frame.length(number(&parts, 4)),
                    closed,
                    filled: false,
                },
                layer: VendorLayer::schematic(),
            })
        }
        "T" => {
            // T~mark~x~y~rotation~color~font~size~weight~style~baseline~type~text~visible
            let mark = parts.get(1).copied().unwrap_or("");
            let visible = parts.get(13).map(|v| *v != "0").unwrap_or(true);
            let text = parts.get(12).map(|t| t.trim()).unwrap_or("");
            if matches!(mark, "N" | "P") || !visible || text.is_empty() {
                log::debug!("EasyEDA: dropping symbol text {mark}: {text:?}");
                return Ok(None);
            }
            let size = number(&parts, 7);
            Shape::Text(GraphicElement {
                geometry: Geometry::Text {
                    text: text.to_string(),
                    position: frame.point(coord(&parts, 2, "T", raw)?, coord(&parts, 3, "T", raw)?),
                    height: if size > 0.0 { size * PT_MM } else { 2.54 },
                    // Vendor rotation is clockwise.
                    rotation: (-number(&parts, 4)).rem_euclid(360.0),
                },
                layer: VendorLayer::schematic(),
            })
        }
        _ => Shape::unrecognized(raw),
    };
    Ok(Some(shape))
}

fn schematic(geometry: Geometry) -> Shape {
    let g = GraphicElement {
        geometry,
        layer: VendorLayer::schematic(),
    };
    match g.geometry {
        Geometry::Polyline { .. } => Shape::Polygon(g),
        _ => Shape::Circle(g),
    }
}

/// White and transparent fills read as outlines.
fn is_filled(fill: Option<&&str>) -> bool {
    match fill.map(|f| f.trim().to_ascii_lowercase()) {
        Some(f) => !(f.is_empty() || f == "none" || f == "#ffffff" || f == "#fff"),
        None => false,
    }
}

fn parse_rect(parts: &[&str], raw: &str, frame: &Frame) -> Result<GraphicElement, ParseError> {
    // R~x~y~rx~ry~width~height~strokeColor~strokeWidth~strokeStyle~fill
    let x = coord(parts, 1, "R", raw)?;
    let y = coord(parts, 2, "R", raw)?;
    let w = coord(parts, 5, "R", raw)?;
    let h = coord(parts, 6, "R", raw)?;
    let corners = [[x, y], [x + w, y], [x + w, y + h], [x, y + h], [x, y]];
    Ok(GraphicElement {
        geometry: Geometry::Polyline {
            vertices: corners
                .iter()
                .map(|c| Vertex::at(frame.point(c[0], c[1])))
                .collect(),
            width: frame.length(number(parts, 8)),
            closed: true,
            filled: is_filled(parts.get(10)),
        },
        layer: VendorLayer::schematic(),
    })
}

/// `P~show~electric~spice~x~y~rotation~id^^dot^^path^^name^^number^^...`
fn parse_pin(raw: &str, frame: &Frame) -> Result<Pin, ParseError> {
    let segments: Vec<&str> = raw.split("^^").collect();
    let config: Vec<&str> = segments[0].split('~').collect();
    let x = coord(&config, 4, "P", raw)?;
    let y = coord(&config, 5, "P", raw)?;
    let rotation = number(&config, 6).round() as i64;
    let electric = config
        .get(2)
        .and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(0);
    let spice = config.get(3).map(|s| s.trim()).unwrap_or("").to_string();

    let label = |seg: usize| {
        segments
            .get(seg)
            .and_then(|s| s.split('~').nth(4))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let number = label(4).unwrap_or(spice);
    let name = label(3).unwrap_or_else(|| number.clone());

    let length = segments
        .get(2)
        .and_then(|s| s.split('~').next())
        .map(|p| path_length(p, frame))
        .filter(|l| *l > 0.0)
        .unwrap_or(DEFAULT_PIN_LENGTH);

    Ok(Pin {
        vendor_uuid: config.get(7).and_then(|id| parse_vendor_uuid(id)),
        number,
        name,
        position: frame.point(x, y),
        direction: PinDirection::from_rotation(rotation),
        length,
        electrical_type: ElectricalType::from_vendor(electric),
    })
}

fn path_length(path: &str, frame: &Frame) -> f64 {
    let p = parse_path(path, frame);
    match (p.vertices.first(), p.vertices.last()) {
        (Some(a), Some(b)) => {
            ((b.position[0] - a.position[0]).powi(2) + (b.position[1] - a.position[1]).powi(2))
                .sqrt()
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use approx::assert_relative_eq;

    fn frame() -> Frame {
        Frame::new([400.0, 300.0])
    }

    #[test]
    fn test_parse_pin() {
        let raw = "P~show~4~1~370~290~180~gge2^^370~290^^M 370 290 h 10~#880000^^1~383~293~0~VDD~start~~~#0000FF^^1~375~289~0~1~end~~~#0000FF^^0~378~290^^0~M 380 287";
        let Some(Shape::Pin(pin)) = parse_shape(raw, &frame()).unwrap() else {
            panic!("expected pin");
        };
        assert_eq!(pin.name, "VDD");
        assert_eq!(pin.number, "1");
        assert_eq!(pin.direction, PinDirection::Left);
        assert_eq!(pin.electrical_type, ElectricalType::Power);
        assert_eq!(pin.vendor_uuid, None);
        assert_relative_eq!(pin.length, 2.54, epsilon = 1e-9);
        assert_relative_eq!(pin.position[0], -7.62, epsilon = 1e-9);
        assert_relative_eq!(pin.position[1], 2.54, epsilon = 1e-9);
    }

    #[test]
    fn test_pin_without_name_uses_number() {
        let raw = "P~show~0~7~400~300~0~gge9^^400~300^^M 400 300 h -10^^1~0~0~0~~start^^1~0~0~0~7~end";
        let Some(Shape::Pin(pin)) = parse_shape(raw, &frame()).unwrap() else {
            panic!("expected pin");
        };
        assert_eq!(pin.name, "7");
        assert_eq!(pin.number, "7");
    }

    #[test]
    fn test_malformed_pin_coordinates() {
        let raw = "P~show~0~1~abc~290~0~gge2^^x";
        assert!(matches!(
            parse_shape(raw, &frame()),
            Err(ParseError::MalformedCoordinates { shape: "P", .. })
        ));
    }

    #[test]
    fn test_rect_is_closed_outline() {
        let raw = "R~380~280~2~2~40~40~#880000~1~0~#FFFFFF~gge1~0";
        let Some(Shape::Polygon(g)) = parse_shape(raw, &frame()).unwrap() else {
            panic!("expected polygon");
        };
        let Geometry::Polyline { vertices, closed, filled, .. } = g.geometry else {
            panic!("expected polyline");
        };
        assert!(closed);
        assert!(!filled);
        assert_eq!(vertices.len(), 5);
        assert_eq!(vertices[0], vertices[4]);
    }

    #[test]
    fn test_circle_and_polygon() {
        let c = parse_shape("C~400~300~5~#880000~1~0~none~gge3", &frame()).unwrap();
        assert!(matches!(c, Some(Shape::Circle(_))));
        let pg = parse_shape("PG~390 290 400 300 390 300~#880000~1~0~#880000~gge4", &frame())
            .unwrap();
        let Some(Shape::Polygon(g)) = pg else {
            panic!("expected polygon");
        };
        assert!(matches!(g.geometry, Geometry::Polyline { filled: true, closed: true, .. }));
    }

    #[test]
    fn test_name_text_dropped() {
        let raw = "T~N~400~270~0~#000080~~9pt~~~~comment~TEST-REG~1~start~gge7~0";
        assert_eq!(parse_shape(raw, &frame()).unwrap(), None);
        let label = "T~L~400~270~0~#000080~~9pt~~~~comment~VIN~1~start~gge8~0";
        assert!(matches!(parse_shape(label, &frame()).unwrap(), Some(Shape::Text(_))));
    }

    #[test]
    fn test_unknown_shape_is_unrecognized() {
        assert_eq!(
            parse_shape("J~junction~1", &frame()).unwrap(),
            Some(Shape::Unrecognized {
                kind: "J".to_string(),
                raw: "J~junction~1".to_string()
            })
        );
    }

    #[test]
    fn test_parse_symbol_document() {
        let doc = fixtures::document();
        let parsed = parse(unwrap_result(&doc)).unwrap();
        let sym = parsed.value;
        assert_eq!(sym.name, "TEST-REG");
        assert_eq!(sym.prefix, "U");
        assert_eq!(sym.pins.len(), 5);
        assert_eq!(sym.keywords, vec!["Power", "LDO"]);
        assert!(sym.created.is_some());
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].code, WarningCode::UnsupportedShape);
    }

    #[test]
    fn test_symbol_without_pins_fails() {
        let doc = serde_json::json!({
            "uuid": fixtures::SYMBOL_UUID,
            "dataStr": {"head": {"x": 0, "y": 0}, "shape": ["R~0~0~0~0~10~10~#000~1~0~none~g1~0"]}
        });
        assert!(matches!(parse(&doc), Err(ParseError::NoPins)));
    }

    #[test]
    fn test_symbol_invalid_uuid() {
        let doc = serde_json::json!({
            "dataStr": {"head": {"x": 0, "y": 0, "uuid": "not-a-uuid"}, "shape": []}
        });
        assert!(matches!(parse(&doc), Err(ParseError::InvalidUuid { .. })));
    }
}
