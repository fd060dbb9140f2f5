use super::{Generated, MetaTemplate};
use crate::elements::*;
use crate::error::GenerationError;
use crate::ids::derive_uuid;
use crate::types::{PartInfo, Warning, WarningCode};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

/// One signal per symbol pin, in pin order, and a single-gate variant
/// binding each pin to its signal.
pub fn generate_component(
    uuid: Uuid,
    symbol: &Symbol,
    prefix: &str,
    info: &PartInfo,
    template: &MetaTemplate,
) -> Result<Generated<Component>, GenerationError> {
    if symbol.pins.is_empty() {
        return Err(GenerationError::NoSignals(symbol.meta.name.clone()));
    }
    let signals: Vec<Signal> = symbol
        .pins
        .iter()
        .map(|pin| Signal {
            uuid: derive_uuid(&uuid, &format!("signal:{}", pin.name)),
            name: pin.name.clone(),
            role: pin.role,
            forced_net: String::new(),
        })
        .collect();
    let gate = Gate {
        uuid: derive_uuid(&uuid, "gate:main"),
        symbol: symbol.meta.uuid,
        pins: symbol
            .pins
            .iter()
            .zip(&signals)
            .map(|(pin, signal)| PinSignal {
                pin: pin.uuid,
                signal: signal.uuid,
            })
            .collect(),
    };
    let description = if info.description.is_empty() {
        symbol.meta.description.as_str()
    } else {
        info.description.as_str()
    };
    let meta = template.metadata(
        uuid,
        &symbol.meta.name,
        description,
        &symbol.meta.keywords,
        Some(symbol.meta.created),
    );
    Ok(Generated {
        element: Component {
            meta,
            prefix: prefix.to_string(),
            default_value: "{{MPN or DEVICE}}".to_string(),
            signals,
            variants: vec![Variant {
                uuid: derive_uuid(&uuid, "variant:default"),
                name: "default".to_string(),
                gates: vec![gate],
            }],
        },
        warnings: Vec::new(),
    })
}

/// Bind every package pad to the signal of the pin carrying its number.
///
/// Pads without a pin stay in the device unconnected; a pad claimed by
/// several pins keeps the first binding.
pub fn generate_device(
    uuid: Uuid,
    symbol: &Symbol,
    package: &Package,
    component: &Component,
    info: &PartInfo,
    template: &MetaTemplate,
) -> Result<Generated<Device>, GenerationError> {
    if component.signals.is_empty() {
        return Err(GenerationError::NoSignals(component.meta.name.clone()));
    }
    let pin_signal: HashMap<Uuid, Uuid> = component
        .variants
        .iter()
        .flat_map(|v| v.gates.iter())
        .flat_map(|g| g.pins.iter())
        .map(|ps| (ps.pin, ps.signal))
        .collect();

    let mut claims: BTreeMap<&str, Vec<&SymbolPin>> = BTreeMap::new();
    for pin in &symbol.pins {
        for number in &pin.numbers {
            claims.entry(number.as_str()).or_default().push(pin);
        }
    }

    let mut warnings = Vec::new();
    let mut pads = Vec::with_capacity(package.pads.len());
    let mut bound_pins: HashSet<Uuid> = HashSet::new();
    for pad in &package.pads {
        let signal = match claims.get(pad.name.as_str()) {
            Some(pins) => {
                let kept = pins[0];
                if pins.len() > 1 {
                    let others: Vec<&str> = pins[1..].iter().map(|p| p.name.as_str()).collect();
                    warnings.push(Warning::new(
                        WarningCode::RedundantPadBinding,
                        format!(
                            "Pad {} bound to {}; dropped binding to {}",
                            pad.name,
                            kept.name,
                            others.join(", ")
                        ),
                    ));
                }
                bound_pins.insert(kept.uuid);
                pin_signal.get(&kept.uuid).copied()
            }
            None => {
                warnings.push(Warning::new(
                    WarningCode::UnconnectedPad,
                    format!("Pad {} without corresponding Pin", pad.name),
                ));
                None
            }
        };
        pads.push(PadSignal {
            pad: pad.uuid,
            signal,
        });
    }
    for pin in &symbol.pins {
        if !bound_pins.contains(&pin.uuid) {
            warnings.push(Warning::new(
                WarningCode::UnconnectedPin,
                format!("Pin {} without corresponding Pad", pin.name),
            ));
        }
    }

    let name = if info.mpn.is_empty() {
        symbol.meta.name.as_str()
    } else {
        info.mpn.as_str()
    };
    let parts = if info.mpn.is_empty() {
        Vec::new()
    } else {
        vec![Part {
            mpn: info.mpn.clone(),
            manufacturer: info.manufacturer.clone(),
        }]
    };
    let meta = template.metadata(
        uuid,
        name,
        &component.meta.description,
        &component.meta.keywords,
        Some(component.meta.created),
    );
    log::info!(
        "Generated device {}: {} pads, {} unconnected",
        meta.name,
        pads.len(),
        pads.iter().filter(|p| p.signal.is_none()).count()
    );
    Ok(Generated {
        element: Device {
            meta,
            component: component.meta.uuid,
            package: package.meta.uuid,
            pads,
            parts,
            datasheet: info.datasheet.clone(),
        },
        warnings,
    })
}
