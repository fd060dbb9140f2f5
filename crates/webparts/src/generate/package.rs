use super::{ellipse_vertices, extents, Generated, LayerResolver, MetaTemplate};
use crate::elements::*;
use crate::error::GenerationError;
use crate::geometry::snap_pads;
use crate::ids::derive_uuid;
use crate::layers::{LayerMapping, TargetLayer};
use crate::types::{CanonicalFootprint, Geometry, PadCopper, PadShape, Warning, WarningCode};
use uuid::Uuid;

const TEXT_HEIGHT: f64 = 1.0;
const TEXT_STROKE: f64 = 0.2;
const TEXT_OFFSET: f64 = 1.2;

/// Build the target package from a canonical footprint.
///
/// Every vendor pad number becomes one package pad; every piece of copper
/// becomes one footprint pad referencing it.
pub fn generate_package(
    footprint: &CanonicalFootprint,
    grid: f64,
    layers: &LayerMapping,
    template: &MetaTemplate,
) -> Result<Generated<Package>, GenerationError> {
    let pads = snap_pads(&footprint.pads, grid)?;
    let base = footprint.uuid;
    let mut resolver = LayerResolver::new(layers);
    let mut warnings = Vec::new();
    let mut fp = Footprint {
        uuid: derive_uuid(&base, "footprint:default"),
        name: "default".to_string(),
        pads: Vec::new(),
        polygons: Vec::new(),
        circles: Vec::new(),
        texts: Vec::new(),
        holes: Vec::new(),
    };

    let mut package_pads = Vec::with_capacity(pads.len());
    for pad in &pads {
        let package_pad = derive_uuid(&base, &format!("pad:{}", pad.number));
        package_pads.push(PackagePad {
            uuid: package_pad,
            name: pad.number.clone(),
        });
        for (j, copper) in pad.copper.iter().enumerate() {
            let key = format!("{}:{j}", pad.number);
            let side = match resolver.resolve(&copper.layer) {
                TargetLayer::BotCopper => PadSide::Bottom,
                layer if layer.is_copper() => PadSide::Top,
                _ => {
                    resolver.unmapped(&copper.layer, TargetLayer::TopCopper);
                    PadSide::Top
                }
            };
            let (outline, size) = outline(copper, &pad.number, &mut warnings);
            let mut holes = Vec::new();
            if let Some(drill) = &copper.drill {
                if drill.plated {
                    holes.push(PadHole {
                        uuid: derive_uuid(&base, &format!("pad-hole:{key}")),
                        diameter: drill.diameter,
                        vertices: drill.path.clone(),
                    });
                } else {
                    let offset = drill.path.first().copied().unwrap_or([0.0, 0.0]);
                    fp.holes.push(Hole {
                        uuid: derive_uuid(&base, &format!("npth:{key}")),
                        diameter: drill.diameter,
                        position: [
                            copper.position[0] + offset[0],
                            copper.position[1] + offset[1],
                        ],
                    });
                }
            }
            fp.pads.push(FootprintPad {
                uuid: derive_uuid(&base, &format!("fpad:{key}")),
                side,
                outline,
                position: copper.position,
                rotation: copper.rotation,
                size,
                package_pad,
                holes,
            });
        }
    }

    let mut excluded = 0usize;
    for (i, g) in footprint.graphics.iter().enumerate() {
        let layer = resolver.resolve(&g.layer);
        if layer.is_mask_or_paste() {
            excluded += 1;
            continue;
        }
        let id = |what: &str| derive_uuid(&base, &format!("{what}:{i}"));
        match &g.geometry {
            Geometry::Polyline {
                vertices,
                width,
                filled,
                ..
            } => fp.polygons.push(Polygon {
                uuid: id("polygon"),
                layer,
                width: *width,
                fill: *filled && layer != TargetLayer::TopPackageOutlines,
                grab_area: false,
                vertices: vertices.clone(),
            }),
            Geometry::Circle {
                center,
                radius,
                width,
                filled,
            } => fp.circles.push(Circle {
                uuid: id("circle"),
                layer,
                width: *width,
                fill: *filled,
                grab_area: false,
                diameter: radius * 2.0,
                position: *center,
            }),
            Geometry::Ellipse {
                center,
                radius,
                width,
                filled,
            } => fp.polygons.push(Polygon {
                uuid: id("ellipse"),
                layer,
                width: *width,
                fill: *filled,
                grab_area: false,
                vertices: ellipse_vertices(*center, *radius, 36),
            }),
            Geometry::Text {
                text,
                position,
                height,
                rotation,
            } => fp.texts.push(StrokeText {
                uuid: id("text"),
                layer,
                height: *height,
                stroke_width: TEXT_STROKE,
                align: (HAlign::Left, VAlign::Bottom),
                position: *position,
                rotation: *rotation,
                value: text.clone(),
            }),
            Geometry::Hole { center, diameter } => fp.holes.push(Hole {
                uuid: id("hole"),
                diameter: *diameter,
                position: *center,
            }),
        }
    }
    if excluded > 0 {
        warnings.push(Warning::new(
            WarningCode::ExcludedMaskPolygons,
            format!("Excluded {excluded} mask/paste element(s)"),
        ));
    }
    warnings.extend(resolver.warnings);

    let labels = name_value_texts(&base, &fp);
    fp.texts.extend(labels);

    let assembly_type = assembly_type(&fp.pads);
    let meta = template.metadata(
        footprint.uuid,
        &footprint.name,
        &footprint.description,
        &footprint.keywords,
        footprint.created,
    );
    log::info!(
        "Generated package {}: {} pads, {} copper pads, {} polygons",
        meta.name,
        package_pads.len(),
        fp.pads.len(),
        fp.polygons.len()
    );
    Ok(Generated {
        element: Package {
            meta,
            assembly_type,
            pads: package_pads,
            footprints: vec![fp],
        },
        warnings,
    })
}

/// Target pad outline and size for one piece of copper.
fn outline(copper: &PadCopper, number: &str, warnings: &mut Vec<Warning>) -> (PadOutline, [f64; 2]) {
    let mut approximate = |what: &str| {
        warnings.push(Warning::new(
            WarningCode::ApproximatedPad,
            format!("Pad {number}: {what} approximated by a rectangle"),
        ));
        (PadOutline::RoundRect { radius: 0.0 }, copper.size)
    };
    match &copper.shape {
        PadShape::Rect => (PadOutline::RoundRect { radius: 0.0 }, copper.size),
        PadShape::Round | PadShape::Oval | PadShape::Ellipse => {
            (PadOutline::RoundRect { radius: 1.0 }, copper.size)
        }
        PadShape::Polygon(points) if points.len() >= 3 => {
            let size = extents(points.iter().copied())
                .map(|[x0, y0, x1, y1]| [x1 - x0, y1 - y0])
                .unwrap_or(copper.size);
            (PadOutline::Custom(points.clone()), size)
        }
        PadShape::Polygon(points) => {
            approximate(&format!("polygon with {} points", points.len()))
        }
        PadShape::Other(kind) => approximate(&format!("shape {kind}")),
    }
}

fn assembly_type(pads: &[FootprintPad]) -> AssemblyType {
    let tht = pads.iter().filter(|p| !p.holes.is_empty()).count();
    match tht {
        _ if pads.is_empty() => AssemblyType::None,
        0 => AssemblyType::Smt,
        n if n == pads.len() => AssemblyType::Tht,
        _ => AssemblyType::Mixed,
    }
}

/// `{{NAME}}` above and `{{VALUE}}` below the package outline, or the pads
/// when no outline is drawn.
fn name_value_texts(base: &Uuid, fp: &Footprint) -> [StrokeText; 2] {
    let outline = extents(
        fp.polygons
            .iter()
            .filter(|p| p.layer == TargetLayer::TopPackageOutlines)
            .flat_map(|p| p.vertices.iter().map(|v| v.position)),
    );
    let bounds = outline.or_else(|| {
        extents(fp.pads.iter().flat_map(|p| {
            let [hw, hh] = [p.size[0] / 2.0, p.size[1] / 2.0];
            [
                [p.position[0] - hw, p.position[1] - hh],
                [p.position[0] + hw, p.position[1] + hh],
            ]
        }))
    });
    let [_, y0, _, y1] = bounds.unwrap_or([0.0, 0.0, 0.0, 0.0]);
    let text = |value: &str, layer, valign, y: f64| StrokeText {
        uuid: derive_uuid(base, &format!("label:{value}")),
        layer,
        height: TEXT_HEIGHT,
        stroke_width: TEXT_STROKE,
        align: (HAlign::Center, valign),
        position: [0.0, crate::types::round_f64(y, 3)],
        rotation: 0.0,
        value: value.to_string(),
    };
    [
        text("{{NAME}}", TargetLayer::TopNames, VAlign::Bottom, y1 + TEXT_OFFSET),
        text("{{VALUE}}", TargetLayer::TopValues, VAlign::Top, y0 - TEXT_OFFSET),
    ]
}
