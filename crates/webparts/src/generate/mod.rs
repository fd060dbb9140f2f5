pub mod device;
pub mod package;
pub mod symbol;

use crate::elements::{Metadata, UNSORTED_CATEGORY};
use crate::layers::{LayerMapping, Resolved, TargetLayer};
use crate::types::{Vertex, VendorLayer, Warning, WarningCode};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

pub use device::{generate_component, generate_device};
pub use package::generate_package;
pub use symbol::generate_symbol;

/// A generated element and the fidelity losses recorded while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated<T> {
    pub element: T,
    pub warnings: Vec<Warning>,
}

/// Metadata shared by every element of one conversion.
#[derive(Debug, Clone)]
pub struct MetaTemplate {
    pub author: String,
    pub version: String,
    /// `webparts:<source>:<part id>`
    pub generated_by: String,
}

impl MetaTemplate {
    pub fn new(author: &str, version: &str, source: &str, part_id: &str) -> Self {
        Self {
            author: author.to_string(),
            version: version.to_string(),
            generated_by: format!("webparts:{source}:{part_id}"),
        }
    }

    pub fn metadata(
        &self,
        uuid: Uuid,
        name: &str,
        description: &str,
        keywords: &[String],
        created: Option<DateTime<Utc>>,
    ) -> Metadata {
        Metadata {
            uuid,
            name: name.to_string(),
            description: description.to_string(),
            keywords: keywords.to_vec(),
            author: self.author.clone(),
            version: self.version.clone(),
            created: created.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            generated_by: self.generated_by.clone(),
            category: Uuid::parse_str(UNSORTED_CATEGORY).unwrap_or_default(),
        }
    }
}

/// Resolves vendor layers and reports each unmapped one once.
struct LayerResolver<'a> {
    mapping: &'a LayerMapping,
    reported: BTreeSet<String>,
    warnings: Vec<Warning>,
}

impl<'a> LayerResolver<'a> {
    fn new(mapping: &'a LayerMapping) -> Self {
        Self {
            mapping,
            reported: BTreeSet::new(),
            warnings: Vec::new(),
        }
    }

    fn resolve(&mut self, layer: &VendorLayer) -> TargetLayer {
        match self.mapping.resolve(layer) {
            Resolved::Mapped(target) => target,
            Resolved::Fallback(target) => {
                self.unmapped(layer, target);
                target
            }
        }
    }

    /// Record that `layer` was placed on `target` instead of its own layer.
    fn unmapped(&mut self, layer: &VendorLayer, target: TargetLayer) {
        let label = layer.label();
        if self.reported.insert(label.clone()) {
            self.warnings.push(Warning::new(
                WarningCode::UnmappedLayer,
                format!("Layer {label} has no target layer, placed on {target}"),
            ));
        }
    }
}

/// Closed polygon approximating an ellipse.
pub fn ellipse_vertices(center: [f64; 2], radius: [f64; 2], segments: usize) -> Vec<Vertex> {
    let segments = segments.max(4);
    let mut out: Vec<Vertex> = (0..segments)
        .map(|i| {
            let t = i as f64 * std::f64::consts::TAU / segments as f64;
            Vertex::at([
                center[0] + radius[0] * t.cos(),
                center[1] + radius[1] * t.sin(),
            ])
        })
        .collect();
    out.push(out[0]);
    out
}

/// Bounding box `[min_x, min_y, max_x, max_y]` of a set of points.
pub fn extents(points: impl IntoIterator<Item = [f64; 2]>) -> Option<[f64; 4]> {
    points.into_iter().fold(None, |acc, p| {
        Some(match acc {
            None => [p[0], p[1], p[0], p[1]],
            Some([x0, y0, x1, y1]) => [x0.min(p[0]), y0.min(p[1]), x1.max(p[0]), y1.max(p[1])],
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_metadata_defaults_to_epoch() {
        let t = MetaTemplate::new("me", "0.1", "lcsc", "C1");
        let m = t.metadata(Uuid::nil(), "X", "", &[], None);
        assert_eq!(m.generated_by, "webparts:lcsc:C1");
        assert_eq!(m.created.timestamp(), 0);
        assert_eq!(m.category.to_string(), UNSORTED_CATEGORY);
    }

    #[test]
    fn test_unmapped_layer_reported_once() {
        let mapping = LayerMapping::easyeda();
        let mut r = LayerResolver::new(&mapping);
        let odd = VendorLayer {
            id: "77".to_string(),
            name: Some("Ratlines".to_string()),
        };
        assert_eq!(r.resolve(&odd), TargetLayer::BoardDocumentation);
        r.resolve(&odd);
        assert_eq!(r.warnings.len(), 1);
        assert_eq!(r.warnings[0].code, WarningCode::UnmappedLayer);
    }

    #[test]
    fn test_ellipse_is_closed() {
        let v = ellipse_vertices([1.0, 1.0], [2.0, 1.0], 8);
        assert_eq!(v.len(), 9);
        assert_eq!(v[0], v[8]);
        assert_relative_eq!(v[2].position[1], 2.0);
    }

    #[test]
    fn test_extents() {
        assert_eq!(extents([[1.0, -1.0], [-2.0, 3.0]]), Some([-2.0, -1.0, 1.0, 3.0]));
        assert_eq!(extents(Vec::<[f64; 2]>::new()), None);
    }
}
