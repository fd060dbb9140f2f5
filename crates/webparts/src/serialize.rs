use crate::elements::*;
use crate::error::SerializationError;
use crate::sexpr::{format_number, SExpr};
use crate::types::Vertex;
use std::collections::HashSet;
use uuid::Uuid;

/// Render an element as LibrePCB text. Output depends only on `element`.
pub fn serialize(element: &GeneratedElement) -> Result<String, SerializationError> {
    Ok(to_sexpr(element)?.to_document())
}

pub fn to_sexpr(element: &GeneratedElement) -> Result<SExpr, SerializationError> {
    let mut w = Writer::new(element.meta());
    let mut items = vec![w.id(element.uuid())?];
    items.extend(w.metadata(element.meta()));
    match element {
        GeneratedElement::Symbol(s) => w.symbol(s, &mut items)?,
        GeneratedElement::Package(p) => w.package(p, &mut items)?,
        GeneratedElement::Component(c) => w.component(c, &mut items)?,
        GeneratedElement::Device(d) => w.device(d, &mut items)?,
    }
    Ok(SExpr::list(element.kind().root_node(), items))
}

fn node(tag: &str, value: SExpr) -> SExpr {
    SExpr::list(tag, [value])
}

fn text(tag: &str, value: &str) -> SExpr {
    node(tag, SExpr::string(value))
}

fn keyword(tag: &str, value: &str) -> SExpr {
    node(tag, SExpr::atom(value))
}

fn uuid_ref(tag: &str, uuid: Uuid) -> SExpr {
    node(tag, SExpr::atom(uuid.to_string()))
}

/// Tracks identifiers within one element and rejects non-finite numbers.
struct Writer {
    element: String,
    seen: HashSet<Uuid>,
}

impl Writer {
    fn new(meta: &Metadata) -> Self {
        Self {
            element: meta.name.clone(),
            seen: HashSet::new(),
        }
    }

    /// An identifier introduced by this element.
    fn id(&mut self, uuid: Uuid) -> Result<SExpr, SerializationError> {
        if !self.seen.insert(uuid) {
            return Err(SerializationError::DuplicateUuid {
                uuid,
                element: self.element.clone(),
            });
        }
        Ok(SExpr::atom(uuid.to_string()))
    }

    fn num(&self, v: f64, what: &str) -> Result<SExpr, SerializationError> {
        if !v.is_finite() {
            return Err(SerializationError::NonFinite {
                context: format!("{} {what}", self.element),
            });
        }
        Ok(SExpr::atom(format_number(v)))
    }

    fn scalar(&self, tag: &str, v: f64) -> Result<SExpr, SerializationError> {
        Ok(node(tag, self.num(v, tag)?))
    }

    fn point(&self, tag: &str, p: [f64; 2]) -> Result<SExpr, SerializationError> {
        Ok(SExpr::list(tag, [self.num(p[0], tag)?, self.num(p[1], tag)?]))
    }

    fn vertex(&self, v: &Vertex) -> Result<SExpr, SerializationError> {
        Ok(SExpr::list(
            "vertex",
            [self.point("position", v.position)?, self.scalar("angle", v.angle)?],
        ))
    }

    fn metadata(&self, meta: &Metadata) -> Vec<SExpr> {
        vec![
            text("name", &meta.name),
            text("description", &meta.description),
            text("keywords", &meta.keywords.join(",")),
            text("author", &meta.author),
            text("version", &meta.version),
            keyword(
                "created",
                &meta.created.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            ),
            node("deprecated", SExpr::bool(false)),
            text("generated_by", &meta.generated_by),
            uuid_ref("category", meta.category),
        ]
    }

    // ─── Shared primitives ───────────────────────────────────────────

    fn polygon(&mut self, p: &Polygon) -> Result<SExpr, SerializationError> {
        let mut items = vec![
            self.id(p.uuid)?,
            keyword("layer", &p.layer.as_str()),
            self.scalar("width", p.width)?,
            node("fill", SExpr::bool(p.fill)),
            node("grab_area", SExpr::bool(p.grab_area)),
        ];
        for v in &p.vertices {
            items.push(self.vertex(v)?);
        }
        Ok(SExpr::list("polygon", items))
    }

    fn circle(&mut self, c: &Circle) -> Result<SExpr, SerializationError> {
        Ok(SExpr::list(
            "circle",
            [
                self.id(c.uuid)?,
                keyword("layer", &c.layer.as_str()),
                self.scalar("width", c.width)?,
                node("fill", SExpr::bool(c.fill)),
                node("grab_area", SExpr::bool(c.grab_area)),
                self.scalar("diameter", c.diameter)?,
                self.point("position", c.position)?,
            ],
        ))
    }

    fn align(h: HAlign, v: VAlign) -> SExpr {
        SExpr::list("align", [SExpr::atom(h.as_str()), SExpr::atom(v.as_str())])
    }

    // ─── Symbol ──────────────────────────────────────────────────────

    fn symbol(&mut self, s: &Symbol, items: &mut Vec<SExpr>) -> Result<(), SerializationError> {
        for pin in &s.pins {
            items.push(SExpr::list(
                "pin",
                [
                    self.id(pin.uuid)?,
                    text("name", &pin.name),
                    self.point("position", pin.position)?,
                    self.scalar("rotation", pin.rotation)?,
                    self.scalar("length", pin.length)?,
                    self.point("name_position", [pin.length + 1.27, 0.0])?,
                    self.scalar("name_rotation", 0.0)?,
                    self.scalar("name_height", 2.5)?,
                    SExpr::list("name_align", [SExpr::atom("left"), SExpr::atom("center")]),
                ],
            ));
        }
        for p in &s.polygons {
            items.push(self.polygon(p)?);
        }
        for c in &s.circles {
            items.push(self.circle(c)?);
        }
        for t in &s.texts {
            items.push(SExpr::list(
                "text",
                [
                    self.id(t.uuid)?,
                    keyword("layer", &t.layer.as_str()),
                    text("value", &t.value),
                    Self::align(t.align.0, t.align.1),
                    self.scalar("height", t.height)?,
                    self.point("position", t.position)?,
                    self.scalar("rotation", t.rotation)?,
                ],
            ));
        }
        Ok(())
    }

    // ─── Package ─────────────────────────────────────────────────────

    fn package(&mut self, p: &Package, items: &mut Vec<SExpr>) -> Result<(), SerializationError> {
        items.push(keyword("assembly_type", p.assembly_type.as_str()));
        for pad in &p.pads {
            items.push(SExpr::list("pad", [self.id(pad.uuid)?, text("name", &pad.name)]));
        }
        for fp in &p.footprints {
            items.push(self.footprint(fp)?);
        }
        Ok(())
    }

    fn footprint(&mut self, fp: &Footprint) -> Result<SExpr, SerializationError> {
        let zero3 = || {
            [
                SExpr::atom("0.0"),
                SExpr::atom("0.0"),
                SExpr::atom("0.0"),
            ]
        };
        let mut items = vec![
            self.id(fp.uuid)?,
            text("name", &fp.name),
            text("description", ""),
            SExpr::list("3d_position", zero3()),
            SExpr::list("3d_rotation", zero3()),
        ];
        for pad in &fp.pads {
            items.push(self.footprint_pad(pad)?);
        }
        for p in &fp.polygons {
            items.push(self.polygon(p)?);
        }
        for c in &fp.circles {
            items.push(self.circle(c)?);
        }
        for t in &fp.texts {
            items.push(SExpr::list(
                "stroke_text",
                [
                    self.id(t.uuid)?,
                    keyword("layer", &t.layer.as_str()),
                    self.scalar("height", t.height)?,
                    self.scalar("stroke_width", t.stroke_width)?,
                    keyword("letter_spacing", "auto"),
                    keyword("line_spacing", "auto"),
                    Self::align(t.align.0, t.align.1),
                    self.point("position", t.position)?,
                    self.scalar("rotation", t.rotation)?,
                    node("auto_rotate", SExpr::bool(true)),
                    node("mirror", SExpr::bool(false)),
                    text("value", &t.value),
                ],
            ));
        }
        for h in &fp.holes {
            items.push(SExpr::list(
                "hole",
                [
                    self.id(h.uuid)?,
                    self.scalar("diameter", h.diameter)?,
                    self.vertex(&Vertex::at(h.position))?,
                ],
            ));
        }
        Ok(SExpr::list("footprint", items))
    }

    fn footprint_pad(&mut self, pad: &FootprintPad) -> Result<SExpr, SerializationError> {
        let (shape, radius) = match &pad.outline {
            PadOutline::RoundRect { radius } => ("roundrect", *radius),
            PadOutline::Custom(_) => ("custom", 0.0),
        };
        let paste = if pad.holes.is_empty() { "auto" } else { "off" };
        let mut items = vec![
            self.id(pad.uuid)?,
            keyword("side", pad.side.as_str()),
            keyword("shape", shape),
            self.point("position", pad.position)?,
            self.scalar("rotation", pad.rotation)?,
            self.point("size", pad.size)?,
            self.scalar("radius", radius)?,
            keyword("stop_mask", "auto"),
            keyword("solder_paste", paste),
            self.scalar("clearance", 0.0)?,
            keyword("function", "unspecified"),
            uuid_ref("package_pad", pad.package_pad),
        ];
        for hole in &pad.holes {
            let mut h = vec![self.id(hole.uuid)?, self.scalar("diameter", hole.diameter)?];
            for p in &hole.vertices {
                h.push(self.vertex(&Vertex::at(*p))?);
            }
            items.push(SExpr::list("hole", h));
        }
        if let PadOutline::Custom(points) = &pad.outline {
            for p in points {
                items.push(self.vertex(&Vertex::at(*p))?);
            }
        }
        Ok(SExpr::list("pad", items))
    }

    // ─── Component ───────────────────────────────────────────────────

    fn component(&mut self, c: &Component, items: &mut Vec<SExpr>) -> Result<(), SerializationError> {
        items.push(node("schematic_only", SExpr::bool(false)));
        items.push(text("default_value", &c.default_value));
        items.push(text("prefix", &c.prefix));
        for s in &c.signals {
            items.push(SExpr::list(
                "signal",
                [
                    self.id(s.uuid)?,
                    text("name", &s.name),
                    keyword("role", s.role_str()),
                    node("required", SExpr::bool(false)),
                    node("negated", SExpr::bool(false)),
                    node("clock", SExpr::bool(false)),
                    text("forced_net", &s.forced_net),
                ],
            ));
        }
        for v in &c.variants {
            let mut variant = vec![
                self.id(v.uuid)?,
                text("norm", ""),
                text("name", &v.name),
                text("description", ""),
            ];
            for g in &v.gates {
                let mut gate = vec![
                    self.id(g.uuid)?,
                    uuid_ref("symbol", g.symbol),
                    self.point("position", [0.0, 0.0])?,
                    self.scalar("rotation", 0.0)?,
                    node("required", SExpr::bool(true)),
                    text("suffix", ""),
                ];
                for ps in &g.pins {
                    gate.push(SExpr::list(
                        "pin",
                        [
                            SExpr::atom(ps.pin.to_string()),
                            uuid_ref("signal", ps.signal),
                            keyword("text", "signal"),
                        ],
                    ));
                }
                variant.push(SExpr::list("gate", gate));
            }
            items.push(SExpr::list("variant", variant));
        }
        Ok(())
    }

    // ─── Device ──────────────────────────────────────────────────────

    fn device(&mut self, d: &Device, items: &mut Vec<SExpr>) -> Result<(), SerializationError> {
        items.push(uuid_ref("component", d.component));
        items.push(uuid_ref("package", d.package));
        for pad in &d.pads {
            let signal = match pad.signal {
                Some(s) => s.to_string(),
                None => "none".to_string(),
            };
            items.push(SExpr::list(
                "pad",
                [SExpr::atom(pad.pad.to_string()), keyword("signal", &signal)],
            ));
        }
        for part in &d.parts {
            items.push(SExpr::list(
                "part",
                [
                    SExpr::string(part.mpn.as_str()),
                    text("manufacturer", &part.manufacturer),
                ],
            ));
        }
        if let Some(url) = &d.datasheet {
            items.push(SExpr::list(
                "resource",
                [
                    SExpr::string(format!("Datasheet {}", d.meta.name)),
                    text("mediatype", "application/pdf"),
                    text("url", url),
                ],
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::TargetLayer;
    use crate::sexpr;
    use crate::types::ElectricalType;
    use chrono::{DateTime, Utc};

    fn meta(name: &str) -> Metadata {
        Metadata {
            uuid: Uuid::parse_str("d79d354b-62bd-4866-996a-78941c575e78").unwrap(),
            name: name.to_string(),
            description: "Test \"part\"".to_string(),
            keywords: vec!["a".to_string(), "b".to_string()],
            author: "webparts".to_string(),
            version: "0.1".to_string(),
            created: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            generated_by: "webparts:lcsc:C1".to_string(),
            category: Uuid::parse_str(UNSORTED_CATEGORY).unwrap(),
        }
    }

    fn symbol() -> Symbol {
        Symbol {
            meta: meta("TEST"),
            pins: vec![SymbolPin {
                uuid: Uuid::from_u128(1),
                name: "VDD".to_string(),
                position: [-7.62, 2.54],
                rotation: 0.0,
                length: 2.54,
                numbers: vec!["1".to_string()],
                role: ElectricalType::Power,
            }],
            polygons: vec![Polygon {
                uuid: Uuid::from_u128(2),
                layer: TargetLayer::SymOutlines,
                width: 0.2,
                fill: false,
                grab_area: true,
                vertices: vec![Vertex::at([0.0, 0.0]), Vertex::at([-0.0, 5.08])],
            }],
            circles: Vec::new(),
            texts: Vec::new(),
        }
    }

    #[test]
    fn test_symbol_document() {
        let out = serialize(&GeneratedElement::Symbol(symbol())).unwrap();
        assert!(out.starts_with("(librepcb_symbol d79d354b-62bd-4866-996a-78941c575e78\n"));
        assert!(out.contains(" (description \"Test \\\"part\\\"\")\n"));
        assert!(out.contains(" (keywords \"a,b\")\n"));
        assert!(out.contains(" (created 2023-11-14T22:13:20Z)\n"));
        assert!(out.contains("(position -7.62 2.54)"));
        assert!(out.contains("(vertex (position 0.0 5.08) (angle 0.0))"));
        assert!(out.ends_with(")\n"));
        assert!(!out.contains("-0.0"));
    }

    #[test]
    fn test_output_is_stable() {
        let e = GeneratedElement::Symbol(symbol());
        assert_eq!(serialize(&e).unwrap(), serialize(&e).unwrap());
    }

    #[test]
    fn test_reads_back() {
        let out = serialize(&GeneratedElement::Symbol(symbol())).unwrap();
        let parsed = sexpr::parse(out.as_bytes()).unwrap();
        assert_eq!(parsed.tag(), Some("librepcb_symbol"));
        assert_eq!(parsed.value("generated_by"), Some("webparts:lcsc:C1"));
        let pin = parsed.find("pin").unwrap();
        assert_eq!(pin.value("name"), Some("VDD"));
        assert_eq!(pin.value("length"), Some("2.54"));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut s = symbol();
        s.pins[0].position[0] = f64::NAN;
        assert!(matches!(
            serialize(&GeneratedElement::Symbol(s)),
            Err(SerializationError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let mut s = symbol();
        s.polygons[0].uuid = s.pins[0].uuid;
        assert!(matches!(
            serialize(&GeneratedElement::Symbol(s)),
            Err(SerializationError::DuplicateUuid { .. })
        ));
    }

    #[test]
    fn test_device_unconnected_pad() {
        let dev = Device {
            meta: meta("TEST"),
            component: Uuid::from_u128(10),
            package: Uuid::from_u128(11),
            pads: vec![
                PadSignal {
                    pad: Uuid::from_u128(12),
                    signal: Some(Uuid::from_u128(13)),
                },
                PadSignal {
                    pad: Uuid::from_u128(14),
                    signal: None,
                },
            ],
            parts: vec![Part {
                mpn: "AC1117".to_string(),
                manufacturer: "ACME".to_string(),
            }],
            datasheet: None,
        };
        let out = serialize(&GeneratedElement::Device(dev)).unwrap();
        let parsed = sexpr::parse(out.as_bytes()).unwrap();
        let pads: Vec<_> = parsed
            .children()
            .iter()
            .filter(|c| c.tag() == Some("pad"))
            .collect();
        assert_eq!(pads.len(), 2);
        assert_eq!(pads[1].value("signal"), Some("none"));
        assert_eq!(parsed.find("part").and_then(|p| p.atom_at(0)), Some("AC1117"));
        assert!(parsed.find("resource").is_none());
    }

    #[test]
    fn test_tht_pad_has_no_paste() {
        let pad = FootprintPad {
            uuid: Uuid::from_u128(20),
            side: PadSide::Top,
            outline: PadOutline::RoundRect { radius: 1.0 },
            position: [0.0, 0.0],
            rotation: 0.0,
            size: [1.6, 1.6],
            package_pad: Uuid::from_u128(21),
            holes: vec![PadHole {
                uuid: Uuid::from_u128(22),
                diameter: 0.8,
                vertices: vec![[0.0, 0.0]],
            }],
        };
        let mut w = Writer::new(&meta("P"));
        let expr = w.footprint_pad(&pad).unwrap();
        assert_eq!(expr.value("solder_paste"), Some("off"));
        assert_eq!(expr.value("shape"), Some("roundrect"));
        assert_eq!(expr.find("hole").and_then(|h| h.value("diameter")), Some("0.8"));
    }
}
