pub mod checker;
pub mod elements;
pub mod error;
pub mod generate;
pub mod geometry;
pub mod ids;
pub mod layers;
pub mod library;
pub mod manifest;
pub mod parsers;
pub mod pipeline;
pub mod serialize;
pub mod sexpr;
pub mod types;

pub use checker::{Checker, LibrePcbCli, NoChecker};
pub use elements::ElementKind;
pub use error::{ConvertError, Stage};
pub use ids::PartIdentity;
pub use manifest::{ManifestStore, PartStatus};
pub use parsers::{parse_part, VendorFormat};
pub use pipeline::{ConversionPipeline, ConversionReport, ConvertOptions};
