use crate::elements::ElementKind;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Vendor document lacks the minimum structure needed to build a canonical element.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid UUID in {field}: {value}")]
    InvalidUuid { field: &'static str, value: String },

    #[error("malformed coordinates in {shape} shape: {raw}")]
    MalformedCoordinates { shape: &'static str, raw: String },

    #[error("symbol has no pins")]
    NoPins,

    #[error("footprint has no pads")]
    NoPads,
}

#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("no pins left after normalization")]
    EmptyPins,

    #[error("no pads left after normalization")]
    EmptyPads,

    #[error("grid spacing must be positive, got {0}")]
    InvalidGrid(f64),
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("symbol {0} has no pins after consolidation")]
    NoPins(String),

    #[error("no signals could be derived for component {0}")]
    NoSignals(String),

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("non-finite coordinate in {context}")]
    NonFinite { context: String },

    #[error("identifier {uuid} used twice in {element}")]
    DuplicateUuid { uuid: uuid::Uuid, element: String },

    #[error("{element} refers to {uuid}, which is not part of this conversion")]
    DanglingReference { uuid: uuid::Uuid, element: String },
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("part already exists: {0}")]
    DuplicatePart(uuid::Uuid),

    #[error("no manifest for {0}")]
    NotFound(uuid::Uuid),

    #[error("part {device} has {kind} {stored}, not {requested}")]
    IdentityMismatch {
        device: uuid::Uuid,
        kind: ElementKind,
        stored: uuid::Uuid,
        requested: uuid::Uuid,
    },
}

/// Element files could not be written below the library root.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum CheckerError {
    #[error("failed to run checker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("checker timed out after {0:?}")]
    Timeout(Duration),

    #[error("checker failed: {0}")]
    Failed(String),
}

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parse,
    Geometry,
    Generation,
    Serialization,
    Write,
    Check,
    Manifest,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Parse => "parse",
            Stage::Geometry => "geometry",
            Stage::Generation => "generation",
            Stage::Serialization => "serialization",
            Stage::Write => "write",
            Stage::Check => "check",
            Stage::Manifest => "manifest",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("{stage} stage failed: {source}")]
    Parse {
        stage: Stage,
        #[source]
        source: ParseError,
    },

    #[error("{stage} stage failed: {source}")]
    Geometry {
        stage: Stage,
        #[source]
        source: GeometryError,
    },

    #[error("{stage} stage failed: {source}")]
    Generation {
        stage: Stage,
        #[source]
        source: GenerationError,
    },

    #[error("{stage} stage failed: {source}")]
    Serialization {
        stage: Stage,
        #[source]
        source: SerializationError,
    },

    #[error("{stage} stage failed: {source}")]
    Write {
        stage: Stage,
        #[source]
        source: WriteError,
    },

    #[error("{stage} stage failed: {source}")]
    Manifest {
        stage: Stage,
        #[source]
        source: ManifestError,
    },

    #[error("{stage} stage failed: {source}")]
    Check {
        stage: Stage,
        #[source]
        source: CheckerError,
    },
}

impl ConvertError {
    pub fn stage(&self) -> Stage {
        match self {
            ConvertError::Parse { stage, .. }
            | ConvertError::Geometry { stage, .. }
            | ConvertError::Generation { stage, .. }
            | ConvertError::Serialization { stage, .. }
            | ConvertError::Write { stage, .. }
            | ConvertError::Manifest { stage, .. }
            | ConvertError::Check { stage, .. } => *stage,
        }
    }
}

impl From<ParseError> for ConvertError {
    fn from(source: ParseError) -> Self {
        ConvertError::Parse {
            stage: Stage::Parse,
            source,
        }
    }
}

impl From<GeometryError> for ConvertError {
    fn from(source: GeometryError) -> Self {
        ConvertError::Geometry {
            stage: Stage::Geometry,
            source,
        }
    }
}

impl From<GenerationError> for ConvertError {
    fn from(source: GenerationError) -> Self {
        match source {
            GenerationError::Geometry(source) => source.into(),
            source => ConvertError::Generation {
                stage: Stage::Generation,
                source,
            },
        }
    }
}

impl From<SerializationError> for ConvertError {
    fn from(source: SerializationError) -> Self {
        ConvertError::Serialization {
            stage: Stage::Serialization,
            source,
        }
    }
}

impl From<CheckerError> for ConvertError {
    fn from(source: CheckerError) -> Self {
        ConvertError::Check {
            stage: Stage::Check,
            source,
        }
    }
}

impl From<WriteError> for ConvertError {
    fn from(source: WriteError) -> Self {
        ConvertError::Write {
            stage: Stage::Write,
            source,
        }
    }
}

impl From<ManifestError> for ConvertError {
    fn from(source: ManifestError) -> Self {
        ConvertError::Manifest {
            stage: Stage::Manifest,
            source,
        }
    }
}
