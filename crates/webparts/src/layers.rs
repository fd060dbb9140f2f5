use crate::types::VendorLayer;
use std::collections::HashMap;
use std::fmt;

/// LibrePCB layer identifiers used by generated elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetLayer {
    SymOutlines,
    SymNames,
    SymValues,
    SymDocumentation,
    TopCopper,
    BotCopper,
    InnerCopper(u8),
    TopLegend,
    BotLegend,
    TopDocumentation,
    BotDocumentation,
    TopPackageOutlines,
    TopCourtyard,
    TopStopMask,
    BotStopMask,
    TopSolderPaste,
    BotSolderPaste,
    TopNames,
    TopValues,
    BoardOutlines,
    BoardDocumentation,
}

impl TargetLayer {
    pub fn as_str(&self) -> String {
        let s = match self {
            TargetLayer::SymOutlines => "sym_outlines",
            TargetLayer::SymNames => "sym_names",
            TargetLayer::SymValues => "sym_values",
            TargetLayer::SymDocumentation => "sym_documentation",
            TargetLayer::TopCopper => "top_cu",
            TargetLayer::BotCopper => "bot_cu",
            TargetLayer::InnerCopper(n) => return format!("in{n}_cu"),
            TargetLayer::TopLegend => "top_legend",
            TargetLayer::BotLegend => "bot_legend",
            TargetLayer::TopDocumentation => "top_documentation",
            TargetLayer::BotDocumentation => "bot_documentation",
            TargetLayer::TopPackageOutlines => "top_package_outlines",
            TargetLayer::TopCourtyard => "top_courtyard",
            TargetLayer::TopStopMask => "top_stop_mask",
            TargetLayer::BotStopMask => "bot_stop_mask",
            TargetLayer::TopSolderPaste => "top_solder_paste",
            TargetLayer::BotSolderPaste => "bot_solder_paste",
            TargetLayer::TopNames => "top_names",
            TargetLayer::TopValues => "top_values",
            TargetLayer::BoardOutlines => "brd_outlines",
            TargetLayer::BoardDocumentation => "brd_documentation",
        };
        s.to_string()
    }

    /// Mask and paste layers are derived from pads by the target tool.
    pub fn is_mask_or_paste(&self) -> bool {
        matches!(
            self,
            TargetLayer::TopStopMask
                | TargetLayer::BotStopMask
                | TargetLayer::TopSolderPaste
                | TargetLayer::BotSolderPaste
        )
    }

    pub fn is_schematic(&self) -> bool {
        matches!(
            self,
            TargetLayer::SymOutlines
                | TargetLayer::SymNames
                | TargetLayer::SymValues
                | TargetLayer::SymDocumentation
        )
    }

    pub fn is_copper(&self) -> bool {
        matches!(
            self,
            TargetLayer::TopCopper | TargetLayer::BotCopper | TargetLayer::InnerCopper(_)
        )
    }
}

impl fmt::Display for TargetLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

/// Result of resolving a vendor layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Mapped(TargetLayer),
    /// Unknown to the table; placed on the fallback layer.
    Fallback(TargetLayer),
}

impl Resolved {
    pub fn layer(&self) -> TargetLayer {
        match self {
            Resolved::Mapped(l) | Resolved::Fallback(l) => *l,
        }
    }
}

/// Vendor layer name → target layer table, passed explicitly to generators.
#[derive(Debug, Clone)]
pub struct LayerMapping {
    by_name: HashMap<String, TargetLayer>,
    fallback: TargetLayer,
}

impl LayerMapping {
    pub fn new(fallback: TargetLayer) -> Self {
        Self {
            by_name: HashMap::new(),
            fallback,
        }
    }

    /// Add or replace an entry. Names match case-insensitively.
    pub fn insert(&mut self, vendor_name: &str, target: TargetLayer) -> &mut Self {
        self.by_name.insert(vendor_name.to_lowercase(), target);
        self
    }

    pub fn fallback(&self) -> TargetLayer {
        self.fallback
    }

    /// Look up by layer name first, then by raw id.
    pub fn resolve(&self, layer: &VendorLayer) -> Resolved {
        let by_name = layer
            .name
            .as_deref()
            .and_then(|n| self.by_name.get(&n.to_lowercase()));
        match by_name.or_else(|| self.by_name.get(&layer.id.to_lowercase())) {
            Some(target) => Resolved::Mapped(*target),
            None => Resolved::Fallback(self.fallback),
        }
    }

    /// Table for EasyEDA footprint and symbol layers.
    pub fn easyeda() -> Self {
        use TargetLayer::*;
        let mut m = Self::new(BoardDocumentation);
        m.insert("schematic", SymOutlines)
            .insert("boardoutline", BoardOutlines)
            .insert("toplayer", TopCopper)
            .insert("bottomlayer", BotCopper)
            .insert("multi-layer", TopCopper)
            .insert("topsilklayer", TopLegend)
            .insert("bottomsilklayer", BotLegend)
            .insert("toppastemasklayer", TopSolderPaste)
            .insert("bottompastemasklayer", BotSolderPaste)
            .insert("topsoldermasklayer", TopStopMask)
            .insert("bottomsoldermasklayer", BotStopMask)
            .insert("componentshapelayer", TopPackageOutlines)
            .insert("componentmarkinglayer", BoardDocumentation)
            .insert("componentpolaritylayer", BoardDocumentation)
            .insert("leadshapelayer", BoardDocumentation)
            .insert("document", BoardDocumentation)
            .insert("mechanical", BoardDocumentation)
            .insert("topassembly", TopDocumentation)
            .insert("bottomassembly", BotDocumentation)
            .insert("hole", BoardDocumentation)
            .insert("3dmodel", BoardDocumentation);
        for i in 1..=30u8 {
            m.insert(&format!("inner{i}"), InnerCopper(i));
        }
        m
    }
}

impl Default for LayerMapping {
    fn default() -> Self {
        Self::easyeda()
    }
}
