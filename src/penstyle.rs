//! Pen Style Resolver
//!
//! Downstream consumers only distinguish `none`, `solid` and `dash`; every preset dash
//! variant collapses into `dash` with an explicit pattern in points.

use serde::{Deserialize, Serialize};

use crate::error::ExportResult;
use crate::symbol::{CapStyle, JoinStyle, SourcePenStyle, SymbolGeometry, SymbolLayer};
use crate::units::{ExportContext, Length};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stroke {
    None,
    Solid,
    Dash,
}

impl From<SourcePenStyle> for Stroke {
    fn from(style: SourcePenStyle) -> Self {
        match style {
            SourcePenStyle::NoPen => Self::None,
            SourcePenStyle::Solid => Self::Solid,
            SourcePenStyle::Dash
            | SourcePenStyle::Dot
            | SourcePenStyle::DashDot
            | SourcePenStyle::DashDotDot
            | SourcePenStyle::CustomDash => Self::Dash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenStyleDescriptor {
    pub stroke: Stroke,
    pub join: JoinStyle,
    /// Line layers only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<CapStyle>,
    /// Present iff `stroke` is `dash`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dash_pattern: Option<Vec<f64>>,
}

impl PenStyleDescriptor {
    pub fn solid(join: JoinStyle, cap: Option<CapStyle>) -> Self {
        Self {
            stroke: Stroke::Solid,
            join,
            cap,
            dash_pattern: None,
        }
    }
}

/// Dash/gap multipliers of a preset style, relative to the stroke width.
pub fn preset_multipliers(style: SourcePenStyle) -> &'static [f64] {
    match style {
        SourcePenStyle::Dot => &[1.0, 2.0],
        SourcePenStyle::DashDot => &[4.0, 2.0, 1.0, 2.0],
        SourcePenStyle::DashDotDot => &[4.0, 2.0, 1.0, 2.0, 1.0, 2.0],
        _ => &[4.0, 2.0],
    }
}

pub fn resolve(layer: &SymbolLayer, ctx: &ExportContext) -> ExportResult<PenStyleDescriptor> {
    match layer.geometry {
        SymbolGeometry::Line => resolve_line(layer, ctx),
        SymbolGeometry::Marker | SymbolGeometry::Fill => resolve_outline(layer, ctx),
        SymbolGeometry::Hybrid => Ok(PenStyleDescriptor::solid(
            JoinStyle::Bevel,
            Some(CapStyle::Square),
        )),
    }
}

/// Outline of a marker or fill: preset dashes only, no cap.
fn resolve_outline(layer: &SymbolLayer, ctx: &ExportContext) -> ExportResult<PenStyleDescriptor> {
    let stroke = Stroke::from(layer.pen_style);
    let dash_pattern = match stroke {
        Stroke::Dash => Some(scaled_preset(layer.pen_style, &layer.stroke_width, ctx)?),
        _ => None,
    };
    Ok(PenStyleDescriptor {
        stroke,
        join: layer.join_style,
        cap: None,
        dash_pattern,
    })
}

fn resolve_line(layer: &SymbolLayer, ctx: &ExportContext) -> ExportResult<PenStyleDescriptor> {
    let mut stroke = Stroke::from(layer.pen_style);
    let custom = layer.custom_dash();

    let dash_pattern = match (stroke, custom) {
        (Stroke::Dash, Some(dash)) => Some(custom_pattern(&dash.values, dash.unit, ctx)?),
        (Stroke::Dash, None) => Some(scaled_preset(layer.pen_style, &layer.width, ctx)?),
        // Hosts store custom patterns on solid pens too; they render dashed.
        (Stroke::Solid, Some(dash)) => {
            stroke = Stroke::Dash;
            Some(custom_pattern(&dash.values, dash.unit, ctx)?)
        }
        _ => None,
    };

    Ok(PenStyleDescriptor {
        stroke,
        join: layer.join_style,
        cap: Some(layer.cap_style),
        dash_pattern,
    })
}

fn scaled_preset(
    style: SourcePenStyle,
    width: &Length,
    ctx: &ExportContext,
) -> ExportResult<Vec<f64>> {
    let width_pt = width.to_points(ctx)?;
    Ok(preset_multipliers(style)
        .iter()
        .map(|m| m * width_pt)
        .collect())
}

fn custom_pattern(
    values: &[f64],
    unit: crate::units::RenderUnit,
    ctx: &ExportContext,
) -> ExportResult<Vec<f64>> {
    values.iter().map(|v| ctx.to_points(*v, unit)).collect()
}
