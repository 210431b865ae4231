//! Source-side symbol object graph.
//!
//! This is the styling model as the host exposes it: an ordered chain of symbol layers,
//! each identified by a free-form kind name. [`SymbolLayerKind::parse`] closes that
//! open vocabulary into a sum type before anything is translated.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::color::Rgba;
use crate::error::{ExportError, ExportResult};
use crate::units::{Length, RenderUnit};

fn default_one() -> f64 {
    1.0
}

/// Geometry class of a symbol layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolGeometry {
    Marker,
    Line,
    Fill,
    Hybrid,
}

impl fmt::Display for SymbolGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Marker => "marker",
            Self::Line => "line",
            Self::Fill => "fill",
            Self::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

/// Stroke style as configured on the source layer, presets included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourcePenStyle {
    NoPen,
    #[default]
    Solid,
    Dash,
    Dot,
    DashDot,
    DashDotDot,
    CustomDash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JoinStyle {
    Miter,
    #[default]
    Bevel,
    Round,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CapStyle {
    Flat,
    #[default]
    Square,
    Round,
}

/// Custom dash lengths, alternating dash and gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DashVector {
    pub values: Vec<f64>,
    #[serde(default)]
    pub unit: RenderUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Offset {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub unit: RenderUnit,
}

/// Which colors and widths an SVG file lets the style override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SvgParams {
    #[serde(default)]
    pub has_fill_param: bool,
    #[serde(default)]
    pub has_stroke_param: bool,
    #[serde(default)]
    pub has_stroke_width_param: bool,
}

/// An ordered chain of symbol layers drawn together for one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    #[serde(default = "default_one")]
    pub opacity: f64,
    #[serde(default)]
    pub layers: Vec<SymbolLayer>,
}

impl Symbol {
    pub fn new(opacity: f64, layers: Vec<SymbolLayer>) -> Self {
        Self { opacity, layers }
    }
}

/// One paint operation within a symbol.
///
/// Fields not meaningful for a given kind are ignored by the translator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolLayer {
    /// Host kind name, e.g. `SimpleMarker`, `SimpleLine`, `GradientFill`.
    pub layer_type: String,
    pub geometry: SymbolGeometry,
    /// Draw pass used when symbol levels are enabled.
    #[serde(default)]
    pub rendering_pass: i32,
    #[serde(default)]
    pub color: Rgba,
    /// Fill color of fill layers; falls back to `color`.
    #[serde(default)]
    pub fill_color: Option<Rgba>,
    #[serde(default)]
    pub stroke_color: Rgba,
    #[serde(default)]
    pub size: Length,
    #[serde(default)]
    pub width: Length,
    #[serde(default)]
    pub stroke_width: Length,
    /// Pen style of line layers, stroke style of marker and fill layers.
    #[serde(default)]
    pub pen_style: SourcePenStyle,
    #[serde(default)]
    pub join_style: JoinStyle,
    #[serde(default)]
    pub cap_style: CapStyle,
    #[serde(default)]
    pub custom_dash: Option<DashVector>,
    #[serde(default)]
    pub shape: Option<String>,
    #[serde(default)]
    pub brush_style: Option<String>,
    /// Source file of raster and SVG markers.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Width/height ratio locked by the user; `0` when unlocked.
    #[serde(default)]
    pub fixed_aspect_ratio: f64,
    /// Ratio defined by the icon file itself.
    #[serde(default = "default_one")]
    pub default_aspect_ratio: f64,
    #[serde(default)]
    pub offset: Offset,
    #[serde(default)]
    pub angle: f64,
    #[serde(default)]
    pub interval: Length,
    #[serde(default)]
    pub svg_params: SvgParams,
    #[serde(default)]
    pub sub_symbol: Option<Box<Symbol>>,
}

impl SymbolLayer {
    /// A layer of the given kind with every property at its host default.
    pub fn new(geometry: SymbolGeometry, layer_type: impl Into<String>) -> Self {
        Self {
            layer_type: layer_type.into(),
            geometry,
            rendering_pass: 0,
            color: Rgba::BLACK,
            fill_color: None,
            stroke_color: Rgba::BLACK,
            size: Length::default(),
            width: Length::default(),
            stroke_width: Length::default(),
            pen_style: SourcePenStyle::Solid,
            join_style: JoinStyle::Bevel,
            cap_style: CapStyle::Square,
            custom_dash: None,
            shape: None,
            brush_style: None,
            path: None,
            fixed_aspect_ratio: 0.0,
            default_aspect_ratio: 1.0,
            offset: Offset::default(),
            angle: 0.0,
            interval: Length::default(),
            svg_params: SvgParams::default(),
            sub_symbol: None,
        }
    }

    pub fn kind(&self) -> ExportResult<SymbolLayerKind> {
        SymbolLayerKind::parse(self.geometry, &self.layer_type)
    }

    /// Custom dash vector, if one is set and non-empty.
    pub fn custom_dash(&self) -> Option<&DashVector> {
        self.custom_dash.as_ref().filter(|d| !d.values.is_empty())
    }
}

/// Closed vocabulary of symbol layer kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolLayerKind {
    SimpleMarker,
    RasterMarker,
    SvgMarker,
    SimpleLine,
    MarkerLine,
    SimpleFill,
    SvgFill,
    /// Known to the host but without a faithful translation.
    Unsupported(&'static str),
}

const UNSUPPORTED_MARKERS: &[&str] = &[
    "FontMarker",
    "AnimatedMarker",
    "EllipseMarker",
    "FilledMarker",
    "MaskMarker",
    "VectorField",
    "GeometryGenerator",
];

const UNSUPPORTED_LINES: &[&str] = &[
    "InterpolatedLine",
    "HashLine",
    "RasterLine",
    "Lineburst",
    "ArrowLine",
    "GeometryGenerator",
];

const UNSUPPORTED_FILLS: &[&str] = &[
    "CentroidFill",
    "PointPatternFill",
    "RandomMarkerFill",
    "LinePatternFill",
    "RasterFill",
    "GradientFill",
    "ShapeburstFill",
    "GeometryGenerator",
];

const UNSUPPORTED_HYBRIDS: &[&str] = &["GeometryGenerator"];

impl SymbolLayerKind {
    /// Resolve a host kind name within its geometry class.
    ///
    /// A name the engine has never heard of is a contract violation and fails loudly.
    pub fn parse(geometry: SymbolGeometry, name: &str) -> ExportResult<Self> {
        let kind = match (geometry, name) {
            (SymbolGeometry::Marker, "SimpleMarker") => Self::SimpleMarker,
            (SymbolGeometry::Marker, "RasterMarker") => Self::RasterMarker,
            (SymbolGeometry::Marker, "SvgMarker") => Self::SvgMarker,
            (SymbolGeometry::Line, "SimpleLine") => Self::SimpleLine,
            (SymbolGeometry::Line, "MarkerLine") => Self::MarkerLine,
            (SymbolGeometry::Fill, "SimpleFill") => Self::SimpleFill,
            (SymbolGeometry::Fill, "SVGFill") => Self::SvgFill,
            (geometry, name) => {
                let known = match geometry {
                    SymbolGeometry::Marker => UNSUPPORTED_MARKERS,
                    SymbolGeometry::Line => UNSUPPORTED_LINES,
                    SymbolGeometry::Fill => UNSUPPORTED_FILLS,
                    SymbolGeometry::Hybrid => UNSUPPORTED_HYBRIDS,
                };
                match known.iter().copied().find(|k| *k == name) {
                    Some(k) => Self::Unsupported(k),
                    None => {
                        return Err(ExportError::UnknownSymbolLayerKind {
                            geometry: geometry.to_string(),
                            kind: name.to_string(),
                        })
                    }
                }
            }
        };
        Ok(kind)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }

    /// Marker kinds that reference an icon file.
    pub fn is_icon_marker(&self) -> bool {
        matches!(self, Self::RasterMarker | Self::SvgMarker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_kinds_resolve() {
        assert_eq!(
            SymbolLayerKind::parse(SymbolGeometry::Marker, "SvgMarker").unwrap(),
            SymbolLayerKind::SvgMarker
        );
        assert_eq!(
            SymbolLayerKind::parse(SymbolGeometry::Fill, "SVGFill").unwrap(),
            SymbolLayerKind::SvgFill
        );
    }

    #[test]
    fn known_unsupported_kinds_degrade() {
        let kind = SymbolLayerKind::parse(SymbolGeometry::Fill, "GradientFill").unwrap();
        assert_eq!(kind, SymbolLayerKind::Unsupported("GradientFill"));
        assert!(!kind.is_supported());
        assert!(SymbolLayerKind::parse(SymbolGeometry::Hybrid, "GeometryGenerator").is_ok());
    }

    #[test]
    fn unknown_kind_is_fatal() {
        let err = SymbolLayerKind::parse(SymbolGeometry::Line, "HologramLine").unwrap_err();
        assert!(matches!(err, ExportError::UnknownSymbolLayerKind { .. }));
    }

    #[test]
    fn kind_name_is_scoped_by_geometry() {
        assert!(SymbolLayerKind::parse(SymbolGeometry::Marker, "SimpleLine").is_err());
    }

    #[test]
    fn layer_defaults_from_json() {
        let layer: SymbolLayer = serde_json::from_str(
            r##"{"layer_type": "SimpleLine", "geometry": "line", "color": "#336699"}"##,
        )
        .unwrap();
        assert_eq!(layer.pen_style, SourcePenStyle::Solid);
        assert_eq!(layer.default_aspect_ratio, 1.0);
        assert_eq!(layer.color, Rgba::opaque(0x33, 0x66, 0x99));
        assert!(layer.custom_dash().is_none());
    }
}
