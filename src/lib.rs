//! Stylepack Core - Symbology Translation Engine
//!
//! Exports the visible layers of a map project as a portable style package: one
//! geometry file and one style document per renderer partition, label documents,
//! copied icon assets and a `project.json` manifest.
//!
//! # Guarantees
//! 1. Every length is written in points
//! 2. Symbol records keep source order and draw passes verbatim
//! 3. Partitions never share a feature
//! 4. One physical copy per icon source per run
//! 5. Unknown symbol layer kinds abort the run; known unsupported ones degrade

#[macro_use]
mod macros;

pub mod error;
pub mod units;
pub mod color;
pub mod symbol;
pub mod penstyle;
pub mod records;
pub mod assets;
pub mod translate;
pub mod renderer;
pub mod validation;
pub mod labels;
pub mod layer;
pub mod manifest;
pub mod host;
pub mod expression;
pub mod snapshot;
pub mod hashing;
pub mod pipeline;

pub use error::{ExportError, ExportResult};
pub use units::{normalize, Crs, DistanceUnit, ExportContext, Length, RenderUnit};
pub use color::Rgba;
pub use symbol::{Symbol, SymbolGeometry, SymbolLayer, SymbolLayerKind};
pub use penstyle::{PenStyleDescriptor, Stroke};
pub use records::SymbolLayerRecord;
pub use assets::{AssetRef, AssetRegistry};
pub use translate::SymbolTranslator;
pub use renderer::{partition_categorized, partition_graduated, FieldValue, Renderer};
pub use validation::{ValidationResult, ValidationRule, ValidationViolation, Validator, ViolationSeverity};
pub use labels::{LabelFeature, LabelRecord};
pub use layer::{BlendMode, Extent, GeometryType, LayerExportResult, MapLayer, RasterLayer, VectorLayer};
pub use manifest::{ProjectManifest, StyleDocument};
pub use host::HostServices;
pub use snapshot::{ProjectSnapshot, SnapshotHost};
pub use pipeline::{AbortHandle, ExportConfig, ExportHandle, ExportPipeline, ExportReport, ProgressEvent};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const MIN_SNAPSHOT_VERSION: &str = "1.0.0";
