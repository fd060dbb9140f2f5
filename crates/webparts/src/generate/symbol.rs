use super::{ellipse_vertices, extents, Generated, LayerResolver, MetaTemplate};
use crate::elements::{Circle, HAlign, Polygon, Symbol, SymbolPin, Text, VAlign};
use crate::error::GenerationError;
use crate::geometry::{consolidate_pins, ConsolidatedPin};
use crate::ids::derive_uuid;
use crate::layers::{LayerMapping, TargetLayer};
use crate::sexpr::format_number;
use crate::types::*;
use uuid::Uuid;

const OUTLINE_WIDTH: f64 = 0.2;
const LABEL_HEIGHT: f64 = 2.54 * 0.7;

/// Build the target symbol from a canonical symbol.
///
/// Pins are snapped to `grid` and merged by name; vendor graphics land on
/// their mapped schematic layers.
pub fn generate_symbol(
    symbol: &CanonicalSymbol,
    grid: f64,
    layers: &LayerMapping,
    template: &MetaTemplate,
) -> Result<Generated<Symbol>, GenerationError> {
    if symbol.pins.is_empty() {
        return Err(GenerationError::NoPins(symbol.name.clone()));
    }
    let consolidation = consolidate_pins(&symbol.pins, grid)?;
    let mut warnings = Vec::new();
    if consolidation.duplicates_removed > 0 {
        warnings.push(Warning::new(
            WarningCode::DuplicatePinsMerged,
            format!(
                "{} unique pins (removed {} duplicates)",
                consolidation.pins.len(),
                consolidation.duplicates_removed
            ),
        ));
    }

    let pins: Vec<SymbolPin> = consolidation
        .pins
        .iter()
        .map(|p| target_pin(&symbol.uuid, p))
        .collect();

    let mut resolver = LayerResolver::new(layers);
    let mut polygons = Vec::new();
    let mut circles = Vec::new();
    let mut texts = Vec::new();
    for (i, g) in symbol.graphics.iter().enumerate() {
        let mut layer = resolver.resolve(&g.layer);
        if !layer.is_schematic() {
            resolver.unmapped(&g.layer, TargetLayer::SymDocumentation);
            layer = TargetLayer::SymDocumentation;
        }
        let id = |what: &str| derive_uuid(&symbol.uuid, &format!("{what}:{i}"));
        match &g.geometry {
            Geometry::Polyline {
                vertices,
                width,
                closed,
                filled,
            } => polygons.push(Polygon {
                uuid: id("polygon"),
                layer,
                width: *width,
                fill: *filled,
                grab_area: *closed,
                vertices: vertices.clone(),
            }),
            Geometry::Circle {
                center,
                radius,
                width,
                filled,
            } => circles.push(Circle {
                uuid: id("circle"),
                layer,
                width: *width,
                fill: *filled,
                grab_area: true,
                diameter: radius * 2.0,
                position: *center,
            }),
            Geometry::Ellipse {
                center,
                radius,
                width,
                filled,
            } => polygons.push(Polygon {
                uuid: id("ellipse"),
                layer,
                width: *width,
                fill: *filled,
                grab_area: true,
                vertices: ellipse_vertices(*center, *radius, 36),
            }),
            Geometry::Text {
                text,
                position,
                height,
                rotation,
            } => texts.push(Text {
                uuid: id("text"),
                layer: TargetLayer::SymDocumentation,
                value: text.clone(),
                align: (HAlign::Left, VAlign::Bottom),
                height: *height,
                position: *position,
                rotation: *rotation,
            }),
            Geometry::Hole { .. } => warnings.push(Warning::new(
                WarningCode::UnsupportedShape,
                "Skipped hole in symbol graphics",
            )),
        }
    }
    warnings.extend(resolver.warnings);

    if polygons.is_empty() && circles.is_empty() {
        polygons.push(body_outline(&symbol.uuid, &pins, grid));
    }
    texts.extend(labels(&symbol.uuid, &pins));

    let meta = template.metadata(
        symbol.uuid,
        &symbol.name,
        &symbol.description,
        &symbol.keywords,
        symbol.created,
    );
    log::info!(
        "Generated symbol {}: {} pins, {} polygons",
        meta.name,
        pins.len(),
        polygons.len()
    );
    Ok(Generated {
        element: Symbol {
            meta,
            pins,
            polygons,
            circles,
            texts,
        },
        warnings,
    })
}

fn target_pin(symbol: &Uuid, pin: &ConsolidatedPin) -> SymbolPin {
    let uuid = pin.vendor_uuid.unwrap_or_else(|| {
        derive_uuid(
            symbol,
            &format!(
                "pin:{}:{}:{}",
                pin.name,
                format_number(pin.position[0]),
                format_number(pin.position[1])
            ),
        )
    });
    SymbolPin {
        uuid,
        name: pin.name.clone(),
        position: pin.position,
        rotation: rotation(pin.direction),
        length: pin.length,
        numbers: pin.numbers.clone(),
        role: pin.electrical_type,
    }
}

/// Target pins extend from their position toward the body.
fn rotation(direction: PinDirection) -> f64 {
    match direction {
        PinDirection::Right => 180.0,
        PinDirection::Down => 270.0,
        PinDirection::Left => 0.0,
        PinDirection::Up => 90.0,
    }
}

/// End of the pin touching the body.
fn inner_end(pin: &SymbolPin) -> [f64; 2] {
    let (dx, dy) = match pin.rotation as i64 {
        0 => (1.0, 0.0),
        90 => (0.0, 1.0),
        180 => (-1.0, 0.0),
        _ => (0.0, -1.0),
    };
    [
        round_f64(pin.position[0] + dx * pin.length, 6),
        round_f64(pin.position[1] + dy * pin.length, 6),
    ]
}

/// Rectangle spanning the inner pin ends, at least one grid step each way.
fn body_outline(symbol: &Uuid, pins: &[SymbolPin], grid: f64) -> Polygon {
    let [mut x0, mut y0, mut x1, mut y1] =
        extents(pins.iter().map(inner_end)).unwrap_or([0.0, 0.0, 0.0, 0.0]);
    if x1 - x0 < grid {
        x0 -= grid;
        x1 += grid;
    }
    if y1 - y0 < grid {
        y0 -= grid;
        y1 += grid;
    }
    let corners = [[x0, y1], [x1, y1], [x1, y0], [x0, y0], [x0, y1]];
    Polygon {
        uuid: derive_uuid(symbol, "outline"),
        layer: TargetLayer::SymOutlines,
        width: OUTLINE_WIDTH,
        fill: false,
        grab_area: true,
        vertices: corners.iter().map(|c| Vertex::at(*c)).collect(),
    }
}

/// `{{NAME}}` above and `{{VALUE}}` below the pin extents.
fn labels(symbol: &Uuid, pins: &[SymbolPin]) -> [Text; 2] {
    let [x0, y0, _, y1] = extents(pins.iter().flat_map(|p| [p.position, inner_end(p)]))
        .unwrap_or([0.0, 0.0, 0.0, 0.0]);
    let label = |value: &str, layer, valign, y| Text {
        uuid: derive_uuid(symbol, &format!("label:{value}")),
        layer,
        value: value.to_string(),
        align: (HAlign::Left, valign),
        height: LABEL_HEIGHT,
        position: [x0, y],
        rotation: 0.0,
    };
    [
        label("{{NAME}}", TargetLayer::SymNames, VAlign::Bottom, y1 + 1.27),
        label("{{VALUE}}", TargetLayer::SymValues, VAlign::Top, y0 - 1.27),
    ]
}
