//! Canonical symbol-layer records.
//!
//! This is the closed, renderer-agnostic vocabulary written to per-layer style files.
//! All lengths are points, all colors `#RRGGBBAA`.

use serde::{Deserialize, Serialize};

use crate::color::Rgba;
use crate::penstyle::PenStyleDescriptor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SymbolLayerRecord {
    SimpleMarker {
        size: f64,
        color: Rgba,
        outline_color: Rgba,
        outline_width: f64,
        outline_penstyle: PenStyleDescriptor,
        shape: MarkerShape,
        offset: [f64; 2],
        rotation: f64,
        level: i32,
        opacity: f64,
    },
    RasterMarker {
        width: f64,
        height: f64,
        asset_name: String,
        offset: [f64; 2],
        rotation: f64,
        level: i32,
        opacity: f64,
    },
    SvgMarker {
        width: f64,
        height: f64,
        /// `None` when the SVG file has no overridable fill.
        color: Option<Rgba>,
        outline_color: Option<Rgba>,
        outline_width: Option<f64>,
        asset_name: String,
        offset: [f64; 2],
        rotation: f64,
        level: i32,
        opacity: f64,
    },
    SimpleLine {
        color: Rgba,
        width: f64,
        penstyle: PenStyleDescriptor,
        level: i32,
        opacity: f64,
    },
    MarkerLine {
        markers: Vec<SymbolLayerRecord>,
        interval: f64,
        level: i32,
        opacity: f64,
    },
    SimpleFill {
        color: Rgba,
        brushstyle: BrushStyle,
        outline_color: Rgba,
        outline_width: f64,
        outline_penstyle: PenStyleDescriptor,
        level: i32,
        opacity: f64,
    },
    SvgFill {
        color: Rgba,
        outline_color: Rgba,
        outline_width: f64,
        level: i32,
        opacity: f64,
    },
    #[serde(rename = "unsupported-fallback")]
    Unsupported {
        kind: String,
        color: Rgba,
        size: f64,
        level: i32,
        opacity: f64,
    },
}

impl SymbolLayerRecord {
    pub fn level(&self) -> i32 {
        match self {
            Self::SimpleMarker { level, .. }
            | Self::RasterMarker { level, .. }
            | Self::SvgMarker { level, .. }
            | Self::SimpleLine { level, .. }
            | Self::MarkerLine { level, .. }
            | Self::SimpleFill { level, .. }
            | Self::SvgFill { level, .. }
            | Self::Unsupported { level, .. } => *level,
        }
    }

    pub fn opacity(&self) -> f64 {
        match self {
            Self::SimpleMarker { opacity, .. }
            | Self::RasterMarker { opacity, .. }
            | Self::SvgMarker { opacity, .. }
            | Self::SimpleLine { opacity, .. }
            | Self::MarkerLine { opacity, .. }
            | Self::SimpleFill { opacity, .. }
            | Self::SvgFill { opacity, .. }
            | Self::Unsupported { opacity, .. } => *opacity,
        }
    }

    pub fn asset_name(&self) -> Option<&str> {
        match self {
            Self::RasterMarker { asset_name, .. } | Self::SvgMarker { asset_name, .. } => {
                Some(asset_name)
            }
            _ => None,
        }
    }

    /// True if this record or any nested marker record is a fallback.
    pub fn is_degraded(&self) -> bool {
        match self {
            Self::Unsupported { .. } => true,
            Self::MarkerLine { markers, .. } => markers.iter().any(Self::is_degraded),
            _ => false,
        }
    }
}

named_enum!(
    /// Shape of a simple marker.
    MarkerShape, fallback = Circle, {
        Square => "square",
        Diamond => "diamond",
        Pentagon => "pentagon",
        Hexagon => "hexagon",
        Triangle => "triangle",
        EquilateralTriangle => "equilateraltriangle",
        Star => "star",
        Arrow => "arrow",
        Circle => "circle",
        Cross => "cross",
        CrossFill => "crossfill",
        Cross2 => "cross2",
        Line => "line",
        ArrowHead => "arrowhead",
        ArrowHeadFilled => "arrowheadfilled",
        SemiCircle => "semicircle",
        ThirdCircle => "thirdcircle",
        QuarterCircle => "quartercircle",
        QuarterSquare => "quartersquare",
        HalfSquare => "halfsquare",
        DiagonalHalfSquare => "diagonalhalfsquare",
        RightHalfTriangle => "righthalftriangle",
        LeftHalfTriangle => "lefthalftriangle",
        Trapezoid => "trapezoid",
        ParallelogramLeft => "parallelogramleft",
        ParallelogramRight => "parallelogramright",
        Shield => "shield",
        Octagon => "octagon",
        Decagon => "decagon",
        SquareWithCorners => "squarecorners",
        RoundedSquare => "squarerounded",
        DiamondStar => "diamondstar",
        Heart => "heart",
        HalfArc => "halfarc",
        ThirdArc => "thirdarc",
        QuarterArc => "quarterarc",
        AsteriskFill => "asteriskfill",
    }
);

named_enum!(
    /// Brush pattern of a simple fill.
    BrushStyle, fallback = Solid, {
        NoBrush => "nobrush",
        Solid => "solid",
        Dense1 => "dense1",
        Dense2 => "dense2",
        Dense3 => "dense3",
        Dense4 => "dense4",
        Dense5 => "dense5",
        Dense6 => "dense6",
        Dense7 => "dense7",
        Horizontal => "horizontal",
        Vertical => "vertical",
        Cross => "cross",
        BackwardDiagonal => "backwarddiagonal",
        ForwardDiagonal => "forwarddiagonal",
        CrossingDiagonal => "crossingdiagonal",
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_lookup_falls_back_to_circle() {
        assert_eq!(MarkerShape::from_name("Star"), MarkerShape::Star);
        assert_eq!(MarkerShape::from_name("squarecorners"), MarkerShape::SquareWithCorners);
        assert_eq!(MarkerShape::from_name("blob"), MarkerShape::Circle);
    }

    #[test]
    fn brush_lookup_falls_back_to_solid() {
        assert_eq!(BrushStyle::from_name("nobrush"), BrushStyle::NoBrush);
        assert_eq!(BrushStyle::from_name("plaid"), BrushStyle::Solid);
    }

    #[test]
    fn records_are_tagged_by_type() {
        let record = SymbolLayerRecord::Unsupported {
            kind: "gradientfill".to_string(),
            color: Rgba::BLACK,
            size: 0.0,
            level: 2,
            opacity: 1.0,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "unsupported-fallback");
        assert_eq!(value["color"], "#000000FF");
        assert_eq!(value["level"], 2);
        assert!(record.is_degraded());
    }
}
