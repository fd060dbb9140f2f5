use crate::checker::{Checker, CheckerIssue};
use crate::elements::{ElementIndex, ElementKind, GeneratedElement};
use crate::error::{ConvertError, ManifestError, ParseError, SerializationError};
use crate::generate::{
    generate_component, generate_device, generate_package, generate_symbol, MetaTemplate,
};
use crate::ids::PartIdentity;
use crate::layers::LayerMapping;
use crate::library::{find_element_by_generated_by, write_element};
use crate::manifest::{ElementStatus, Finding, ManifestStore, PartStatus};
use crate::parsers::{parse_part, VendorFormat, VendorPart};
use crate::serialize::serialize;
use crate::types::{Warning, WarningCode};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Conversion settings. No global state: everything a run needs is here.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Symbol pin grid in mm.
    pub symbol_grid: f64,
    /// Footprint pad grid in mm.
    pub footprint_grid: f64,
    pub checker_timeout: Duration,
    pub author: String,
    pub version: String,
    pub layers: LayerMapping,
    /// Identifier overrides; vendor or derived UUIDs are used otherwise.
    pub symbol_uuid: Option<Uuid>,
    pub package_uuid: Option<Uuid>,
    pub component_uuid: Option<Uuid>,
    pub device_uuid: Option<Uuid>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            symbol_grid: 2.54,
            footprint_grid: 0.001,
            checker_timeout: Duration::from_secs(30),
            author: "webparts".to_string(),
            version: "0.1".to_string(),
            layers: LayerMapping::easyeda(),
            symbol_uuid: None,
            package_uuid: None,
            component_uuid: None,
            device_uuid: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ElementReport {
    pub kind: ElementKind,
    pub uuid: Uuid,
    pub warnings: Vec<Warning>,
    pub checker: Vec<CheckerIssue>,
    pub status: ElementStatus,
    pub unresolved: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub lcsc_part: String,
    pub mpn: String,
    pub uuids: PartIdentity,
    /// False when an existing part was re-converted.
    pub added: bool,
    pub overall_status: PartStatus,
    pub elements: Vec<ElementReport>,
}

struct Staged {
    element: GeneratedElement,
    warnings: Vec<Warning>,
    text: String,
}

/// Converts one vendor part at a time into a library. Runs for distinct
/// parts may proceed concurrently; runs for the same part must not.
pub struct ConversionPipeline<C: Checker> {
    store: ManifestStore,
    checker: C,
    options: ConvertOptions,
}

impl<C: Checker> ConversionPipeline<C> {
    pub fn new(library: impl Into<PathBuf>, checker: C, options: ConvertOptions) -> Self {
        Self {
            store: ManifestStore::new(library),
            checker,
            options,
        }
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    /// Read a vendor file, detecting the format from its extension.
    pub fn convert_file(&self, path: &Path) -> Result<ConversionReport, ConvertError> {
        let format = VendorFormat::detect(path).ok_or_else(|| {
            ParseError::UnsupportedFormat(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("(none)")
                    .to_string(),
            )
        })?;
        let data = std::fs::read(path).map_err(ParseError::from)?;
        self.convert(&data, format)
    }

    /// Parse, generate, serialize, write, check, then reconcile manifests.
    ///
    /// Nothing is written unless every element serializes. Manifests are
    /// only touched after the checker has finished. When the component or
    /// device cannot be derived, symbol and package are still written and
    /// the generation error is returned afterwards.
    pub fn convert(
        &self,
        data: &[u8],
        format: VendorFormat,
    ) -> Result<ConversionReport, ConvertError> {
        let mut part = parse_part(data, format)?;
        let uuids = self.identity(&part);
        part.symbol.value.uuid = uuids.symbol;
        part.footprint.value.uuid = uuids.package;
        let opts = &self.options;
        let template = MetaTemplate::new(
            &opts.author,
            &opts.version,
            format.source_name(),
            &part.info.lcsc_part,
        );
        log::info!(
            "Converting {} ({}) as device {}",
            part.info.lcsc_part,
            part.info.mpn,
            uuids.device
        );

        let added = match self.store.load_part(&uuids.device) {
            Ok(existing) => {
                existing.check_identity(&uuids)?;
                false
            }
            Err(ManifestError::NotFound(_)) => {
                self.store.ensure_available(&uuids)?;
                true
            }
            Err(e) => return Err(e.into()),
        };

        // ─── Generate ────────────────────────────────────────────────
        let symbol = generate_symbol(
            &part.symbol.value,
            opts.symbol_grid,
            &opts.layers,
            &template,
        )?;
        let package = generate_package(
            &part.footprint.value,
            opts.footprint_grid,
            &opts.layers,
            &template,
        )?;

        let mut symbol_warnings = part.symbol.warnings.clone();
        symbol_warnings.extend(symbol.warnings);
        if let Some(previous) = self.previous_conversion(&template, &uuids)? {
            symbol_warnings.push(Warning::new(
                WarningCode::PreviousConversion,
                format!("Part was previously converted as device {previous}"),
            ));
        }
        let mut package_warnings = part.footprint.warnings.clone();
        package_warnings.extend(package.warnings);

        let linked = generate_component(
            uuids.component,
            &symbol.element,
            &part.symbol.value.prefix,
            &part.info,
            &template,
        )
        .and_then(|component| {
            let device = generate_device(
                uuids.device,
                &symbol.element,
                &package.element,
                &component.element,
                &part.info,
                &template,
            )?;
            Ok((component, device))
        });

        let mut generated = vec![
            (GeneratedElement::Symbol(symbol.element), symbol_warnings),
            (GeneratedElement::Package(package.element), package_warnings),
        ];
        let deferred = match linked {
            Ok((component, device)) => {
                generated.push((
                    GeneratedElement::Component(component.element),
                    component.warnings,
                ));
                generated.push((GeneratedElement::Device(device.element), device.warnings));
                None
            }
            Err(e) => {
                log::warn!("Component/device generation failed: {e}");
                Some(e)
            }
        };

        // ─── Serialize ───────────────────────────────────────────────
        let staged = stage(generated)?;

        // ─── Write and check ─────────────────────────────────────────
        let mut checked = Vec::with_capacity(staged.len());
        for s in &staged {
            let source = source_for(&part, &s.element);
            let dir = write_element(self.store.root(), &s.element, &s.text, source)?;
            let issues = self
                .checker
                .check(s.element.kind(), &dir, opts.checker_timeout)?;
            checked.push(issues);
        }

        // ─── Manifests ───────────────────────────────────────────────
        if added {
            self.store.create_part(&part.info, uuids)?;
        }
        let mut elements = Vec::with_capacity(staged.len());
        for (s, issues) in staged.into_iter().zip(checked) {
            let kind = s.element.kind();
            let uuid = s.element.uuid();
            let findings: Vec<Finding> = s
                .warnings
                .iter()
                .map(Finding::from)
                .chain(issues.iter().map(CheckerIssue::to_finding))
                .collect();
            let manifest = self.store.update_element(kind, &uuid, &findings)?;
            elements.push(ElementReport {
                kind,
                uuid,
                warnings: s.warnings,
                checker: issues,
                status: manifest.status,
                unresolved: manifest.unresolved().count(),
            });
        }
        let overall_status = self.store.recompute_overall_status(&uuids.device)?;

        if let Some(e) = deferred {
            return Err(e.into());
        }
        log::info!(
            "Converted {}: overall status {:?}",
            part.info.lcsc_part,
            overall_status
        );
        Ok(ConversionReport {
            lcsc_part: part.info.lcsc_part,
            mpn: part.info.mpn,
            uuids,
            added,
            overall_status,
            elements,
        })
    }

    fn identity(&self, part: &VendorPart) -> PartIdentity {
        let o = &self.options;
        let derived =
            PartIdentity::from_vendor(part.symbol.value.uuid, part.footprint.value.uuid);
        PartIdentity {
            symbol: o.symbol_uuid.unwrap_or(derived.symbol),
            package: o.package_uuid.unwrap_or(derived.package),
            component: o.component_uuid.unwrap_or(derived.component),
            device: o.device_uuid.unwrap_or(derived.device),
        }
    }

    /// A device generated from the same vendor part under another UUID.
    fn previous_conversion(
        &self,
        template: &MetaTemplate,
        uuids: &PartIdentity,
    ) -> Result<Option<Uuid>, ManifestError> {
        find_element_by_generated_by(
            self.store.root(),
            ElementKind::Device,
            &template.generated_by,
            Some(&uuids.device),
        )
    }
}

/// Index and serialize every element before anything touches the disk.
fn stage(
    generated: Vec<(GeneratedElement, Vec<Warning>)>,
) -> Result<Vec<Staged>, SerializationError> {
    let mut index = ElementIndex::new();
    for (element, _) in &generated {
        index.insert(element)?;
    }
    generated
        .into_iter()
        .map(|(element, warnings)| {
            if let Some(uuid) = index.dangling(&element).into_iter().next() {
                return Err(SerializationError::DanglingReference {
                    uuid,
                    element: element.meta().name.clone(),
                });
            }
            let text = serialize(&element)?;
            Ok(Staged {
                element,
                warnings,
                text,
            })
        })
        .collect()
}

/// Footprint elements keep the footprint document; the rest keep the part.
fn source_for<'a>(part: &'a VendorPart, element: &GeneratedElement) -> &'a serde_json::Value {
    match element.kind() {
        ElementKind::Package => part.footprint_source(),
        _ => &part.source,
    }
}
