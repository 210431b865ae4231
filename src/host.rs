//! Services the engine consumes from the surrounding GIS environment.
//!
//! The engine never clips, reprojects, lays out labels or renders rasters itself.
//! A host implements these traits; [`crate::snapshot`] provides a file-based one.

use std::path::Path;

use crate::error::ExportResult;
use crate::labels::LabelFeature;
use crate::layer::{Extent, Feature, FeatureSet, FieldDef, GeometryType, RasterLayer, VectorLayer};
use crate::units::{Crs, ExportContext};

/// Reprojection, clipping and attribute computation.
pub trait GeometryService {
    /// Reproject `layer` to `target` and keep what falls inside `extent`.
    fn clip_to_extent(
        &self,
        layer: &VectorLayer,
        extent: &Extent,
        target: &Crs,
    ) -> ExportResult<FeatureSet>;

    /// Evaluate `expression` for every feature and store the result as `field`.
    fn calculate_field(
        &self,
        features: FeatureSet,
        field: &FieldDef,
        expression: &str,
    ) -> ExportResult<FeatureSet>;
}

/// Parameters of one geometry file.
#[derive(Debug, Clone, Copy)]
pub struct SinkSpec<'a> {
    pub path: &'a Path,
    pub encoding: &'a str,
    pub fields: &'a [FieldDef],
    pub geometry_type: GeometryType,
    pub crs: &'a Crs,
}

/// Vector file writer.
pub trait FeatureWriter {
    /// File extension of written files, without the dot.
    fn extension(&self) -> &str;

    fn write(&self, spec: &SinkSpec<'_>, features: &[Feature]) -> ExportResult<()>;
}

/// Global, collision-aware label layout.
pub trait LabelService {
    fn extract_labels(&self, extent: &Extent, scale: f64, dpi: f64)
        -> ExportResult<Vec<LabelFeature>>;
}

/// What a raster render produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterOutput {
    /// Area the image covers, in project CRS.
    pub extent: Extent,
    pub units_per_pixel: f64,
    pub width: u32,
    pub height: u32,
}

pub trait RasterRenderer {
    /// Render `layer` clipped to `extent` as a PNG at `png_path`.
    fn render(
        &self,
        layer: &RasterLayer,
        extent: &Extent,
        ctx: &ExportContext,
        png_path: &Path,
    ) -> ExportResult<RasterOutput>;
}

/// Everything the export driver needs from a host.
pub trait HostServices: GeometryService + FeatureWriter + LabelService + RasterRenderer {}

impl<T> HostServices for T where T: GeometryService + FeatureWriter + LabelService + RasterRenderer {}
