pub mod easyeda;

use crate::error::ParseError;
use crate::types::{CanonicalFootprint, CanonicalSymbol, PartInfo, Warning};
use serde_json::Value;
use std::path::Path;

/// A parsed value and the non-fatal warnings produced while reading it.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

/// One vendor part in canonical form.
#[derive(Debug, Clone)]
pub struct VendorPart {
    pub info: PartInfo,
    pub symbol: Parsed<CanonicalSymbol>,
    pub footprint: Parsed<CanonicalFootprint>,
    /// The vendor document, stored next to the generated elements.
    pub source: Value,
}

impl VendorPart {
    /// The part of `source` describing the footprint, when present.
    pub fn footprint_source(&self) -> &Value {
        self.source.get("packageDetail").unwrap_or(&self.source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorFormat {
    EasyEda,
}

impl VendorFormat {
    /// Detect format from file extension.
    pub fn detect(path: &Path) -> Option<VendorFormat> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("json") => Some(VendorFormat::EasyEda),
            _ => None,
        }
    }

    /// Source prefix recorded in `generated_by`.
    pub fn source_name(&self) -> &'static str {
        match self {
            VendorFormat::EasyEda => "lcsc",
        }
    }
}

/// Parse vendor bytes with an explicit format.
pub fn parse_part(data: &[u8], format: VendorFormat) -> Result<VendorPart, ParseError> {
    match format {
        VendorFormat::EasyEda => easyeda::parse(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(
            VendorFormat::detect(Path::new("C12345.JSON")),
            Some(VendorFormat::EasyEda)
        );
        assert_eq!(VendorFormat::detect(Path::new("board.kicad_pcb")), None);
    }

    #[test]
    fn test_footprint_source() {
        let data = serde_json::to_vec(&easyeda::fixtures::document()).unwrap();
        let part = parse_part(&data, VendorFormat::EasyEda).unwrap();
        assert_eq!(part.footprint_source()["title"], "SOT-23-6");
        assert_eq!(part.source["lcsc"]["number"], "C12345");
    }
}
