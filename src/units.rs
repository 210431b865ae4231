//! Unit Normalizer
//!
//! Every length leaving the engine is expressed in points. Scale-dependent units are
//! resolved against the map scale captured in [`ExportContext`] at export time.

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};

/// Millimeters to points.
pub const MM_TO_POINTS: f64 = 2.8346456693;

/// Inches to points.
pub const INCH_TO_POINTS: f64 = 72.0;

/// Points per ground meter at scale 1:1.
pub const POINTS_PER_METER: f64 = 2834.65;

/// One pixel of the default (DPI-independent) painter scale, in points.
pub const PIXELS_TO_POINTS: f64 = 25.4 / 72.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderUnit {
    Points,
    Pixels,
    Millimeters,
    Inches,
    MetersInMapUnits,
    MapUnits,
}

impl Default for RenderUnit {
    fn default() -> Self {
        Self::Millimeters
    }
}

impl std::fmt::Display for RenderUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Points => "points",
            Self::Pixels => "pixels",
            Self::Millimeters => "millimeters",
            Self::Inches => "inches",
            Self::MetersInMapUnits => "meters_in_map_units",
            Self::MapUnits => "map_units",
        };
        f.write_str(name)
    }
}

/// Linear unit of a coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    Meters,
    Kilometers,
    Feet,
    Degrees,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crs {
    /// Authority identifier, e.g. `EPSG:3857`.
    pub authid: String,
    #[serde(default)]
    pub is_geographic: bool,
    pub map_units: DistanceUnit,
}

impl Crs {
    pub fn is_metric(&self) -> bool {
        self.map_units == DistanceUnit::Meters
    }

    pub fn crs_type(&self) -> &'static str {
        if self.is_geographic {
            "geographic"
        } else {
            "projected"
        }
    }
}

/// Map state captured once per export run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportContext {
    pub scale: f64,
    pub dpi: f64,
    pub crs: Crs,
}

impl ExportContext {
    pub fn new(scale: f64, dpi: f64, crs: Crs) -> Self {
        Self { scale, dpi, crs }
    }

    /// Convert `value` expressed in `unit` to points.
    pub fn to_points(&self, value: f64, unit: RenderUnit) -> ExportResult<f64> {
        normalize(value, unit, self)
    }
}

/// A length paired with the unit it is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Length {
    pub value: f64,
    #[serde(default)]
    pub unit: RenderUnit,
}

impl Length {
    pub fn new(value: f64, unit: RenderUnit) -> Self {
        Self { value, unit }
    }

    pub fn points(value: f64) -> Self {
        Self::new(value, RenderUnit::Points)
    }

    pub fn to_points(&self, ctx: &ExportContext) -> ExportResult<f64> {
        normalize(self.value, self.unit, ctx)
    }
}

pub fn normalize(value: f64, unit: RenderUnit, ctx: &ExportContext) -> ExportResult<f64> {
    match unit {
        RenderUnit::Points => Ok(value),
        RenderUnit::Pixels => Ok(value * PIXELS_TO_POINTS),
        RenderUnit::Millimeters => Ok(value * MM_TO_POINTS),
        RenderUnit::Inches => Ok(value * INCH_TO_POINTS),
        RenderUnit::MetersInMapUnits => ground_meters_to_points(value, ctx.scale),
        RenderUnit::MapUnits if ctx.crs.is_metric() => ground_meters_to_points(value, ctx.scale),
        RenderUnit::MapUnits => Err(ExportError::UnsupportedUnit {
            unit: unit.to_string(),
            reason: format!(
                "map units of {} are not meters ({:?})",
                ctx.crs.authid, ctx.crs.map_units
            ),
        }),
    }
}

fn ground_meters_to_points(value: f64, scale: f64) -> ExportResult<f64> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(ExportError::UnsupportedUnit {
            unit: "map scale".to_string(),
            reason: format!("scale must be finite and > 0, got {scale}"),
        });
    }
    Ok(value / (scale / POINTS_PER_METER))
}
