use crate::error::GeometryError;
use crate::types::*;
use std::collections::HashMap;
use uuid::Uuid;

// ─── Grid snapping ───────────────────────────────────────────────────

fn check_grid(grid: f64) -> Result<(), GeometryError> {
    if grid.is_finite() && grid > 0.0 {
        Ok(())
    } else {
        Err(GeometryError::InvalidGrid(grid))
    }
}

/// Round to the nearest multiple of `grid`; exact halves round away from zero.
pub fn snap(value: f64, grid: f64) -> f64 {
    // Absorb float noise so 3.81 / 2.54 counts as exactly 1.5 steps.
    let steps = round_f64(value / grid, 9).round();
    let snapped = round_f64(steps * grid, 9);
    if snapped == 0.0 {
        0.0
    } else {
        snapped
    }
}

pub fn snap_point(p: [f64; 2], grid: f64) -> [f64; 2] {
    [snap(p[0], grid), snap(p[1], grid)]
}

// ─── Pin consolidation ───────────────────────────────────────────────

/// One target pin standing for every vendor pin sharing its name.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedPin {
    pub name: String,
    /// Vendor pin numbers, in natural order.
    pub numbers: Vec<String>,
    pub vendor_uuid: Option<Uuid>,
    pub position: [f64; 2],
    pub direction: PinDirection,
    pub length: f64,
    pub electrical_type: ElectricalType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Consolidation {
    pub pins: Vec<ConsolidatedPin>,
    pub duplicates_removed: usize,
}

/// Union of the electrical roles of merged pins.
pub fn merge_roles(a: ElectricalType, b: ElectricalType) -> ElectricalType {
    use ElectricalType::*;
    match (a, b) {
        (x, y) if x == y => x,
        (Undefined, x) | (x, Undefined) => x,
        (Power, _) | (_, Power) => Power,
        (Passive, x) | (x, Passive) => x,
        _ => Io,
    }
}

/// Snap pins to the grid and merge pins that share a name.
///
/// The first pin of each name supplies position and direction; the group's
/// role is the union of all members, with all-undefined groups read as passive.
pub fn consolidate_pins(pins: &[Pin], grid: f64) -> Result<Consolidation, GeometryError> {
    check_grid(grid)?;
    if pins.is_empty() {
        return Err(GeometryError::EmptyPins);
    }

    let mut out: Vec<ConsolidatedPin> = Vec::new();
    let mut by_name: HashMap<&str, usize> = HashMap::new();
    for pin in pins {
        match by_name.get(pin.name.as_str()) {
            Some(&i) => {
                let merged = &mut out[i];
                merged.numbers.push(pin.number.clone());
                merged.electrical_type = merge_roles(merged.electrical_type, pin.electrical_type);
                if merged.vendor_uuid.is_none() {
                    merged.vendor_uuid = pin.vendor_uuid;
                }
            }
            None => {
                by_name.insert(pin.name.as_str(), out.len());
                out.push(ConsolidatedPin {
                    name: pin.name.clone(),
                    numbers: vec![pin.number.clone()],
                    vendor_uuid: pin.vendor_uuid,
                    position: snap_point(pin.position, grid),
                    direction: pin.direction,
                    length: snap(pin.length, grid).max(grid),
                    electrical_type: pin.electrical_type,
                });
            }
        }
    }

    for pin in &mut out {
        pin.numbers.sort_by(|a, b| natural_sort_key(a).cmp(&natural_sort_key(b)));
        pin.numbers.dedup();
        if pin.electrical_type == ElectricalType::Undefined {
            pin.electrical_type = ElectricalType::Passive;
        }
    }

    let duplicates_removed = pins.len() - out.len();
    if duplicates_removed > 0 {
        log::debug!("merged {duplicates_removed} duplicate pins");
    }
    Ok(Consolidation {
        pins: out,
        duplicates_removed,
    })
}

// ─── Pads ────────────────────────────────────────────────────────────

/// Snap every pad copper position to the grid. Pad numbers stay distinct.
pub fn snap_pads(pads: &[Pad], grid: f64) -> Result<Vec<Pad>, GeometryError> {
    check_grid(grid)?;
    if pads.is_empty() {
        return Err(GeometryError::EmptyPads);
    }
    Ok(pads
        .iter()
        .map(|pad| Pad {
            copper: pad
                .copper
                .iter()
                .map(|c| PadCopper {
                    position: snap_point(c.position, grid),
                    ..c.clone()
                })
                .collect(),
            ..pad.clone()
        })
        .collect())
}

/// Natural sort key: split into (prefix, number) for sorting like 1, 2, 10, A1.
pub fn natural_sort_key(s: &str) -> (String, u64, String) {
    let prefix_end = s
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    let prefix = s[..prefix_end].to_string();
    let num: u64 = s[prefix_end..].parse().unwrap_or(0);
    (prefix, num, s.to_string())
}
