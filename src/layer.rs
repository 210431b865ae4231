//! Input layers and per-layer export results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::renderer::{FieldType, FieldValue, Renderer};

fn default_one() -> f64 {
    1.0
}

/// Axis-aligned rectangle, serialized as `[xmin, ymin, xmax, ymax]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Extent {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Zero-area rectangles count as empty.
    pub fn is_empty(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    pub fn intersects(&self, other: &Extent) -> bool {
        self.xmin <= other.xmax
            && other.xmin <= self.xmax
            && self.ymin <= other.ymax
            && other.ymin <= self.ymax
    }

    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        let out = Extent::new(
            self.xmin.max(other.xmin),
            self.ymin.max(other.ymin),
            self.xmax.min(other.xmax),
            self.ymax.min(other.ymax),
        );
        (!out.is_empty()).then_some(out)
    }
}

impl From<[f64; 4]> for Extent {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Extent> for [f64; 4] {
    fn from(e: Extent) -> Self {
        [e.xmin, e.ymin, e.xmax, e.ymax]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryType {
    Point,
    Line,
    Polygon,
    Unknown,
}

impl GeometryType {
    /// Name written to style files.
    pub fn style_type(&self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Line => "line",
            Self::Polygon => "polygon",
            Self::Unknown => "unsupported",
        }
    }
}

named_enum!(
    /// Layer composition mode.
    BlendMode, fallback = Normal, {
        Normal => "normal",
        Lighten => "lighten",
        Screen => "screen",
        Dodge => "dodge",
        Addition => "addition",
        Darken => "darken",
        Multiply => "multiply",
        Burn => "burn",
        Overlay => "overlay",
        SoftLight => "soft_light",
        HardLight => "hard_light",
        Difference => "difference",
        Subtract => "subtract",
    }
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// GeoJSON geometry object.
    pub geometry: serde_json::Value,
    #[serde(default)]
    pub attributes: BTreeMap<String, FieldValue>,
}

impl Feature {
    pub fn attribute(&self, name: &str) -> &FieldValue {
        const NULL: &FieldValue = &FieldValue::Null;
        self.attributes.get(name).unwrap_or(NULL)
    }
}

/// Features plus the schema they conform to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FeatureSet {
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Subset of features by index, keeping the schema.
    pub fn select(&self, indices: &[usize]) -> FeatureSet {
        FeatureSet {
            fields: self.fields.clone(),
            features: indices.iter().map(|i| self.features[*i].clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorLayer {
    pub name: String,
    pub geometry_type: GeometryType,
    /// Authority id of the layer's own CRS.
    pub crs: String,
    pub renderer: Renderer,
    #[serde(default)]
    pub using_symbol_levels: bool,
    #[serde(default = "default_one")]
    pub opacity: f64,
    #[serde(default)]
    pub blend_mode: BlendMode,
    #[serde(default)]
    pub labels_enabled: bool,
    /// Layer data, for hosts that keep features in memory.
    #[serde(default)]
    pub data: FeatureSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterLayer {
    pub name: String,
    /// Layer bounds already transformed to the project CRS.
    pub extent: Extent,
    #[serde(default = "default_one")]
    pub opacity: f64,
    #[serde(default)]
    pub blend_mode: BlendMode,
    /// Host-specific data source (file path, tile URL, ...).
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MapLayer {
    Vector(VectorLayer),
    Raster(RasterLayer),
}

impl MapLayer {
    pub fn name(&self) -> &str {
        match self {
            Self::Vector(l) => &l.name,
            Self::Raster(l) => &l.name,
        }
    }
}

/// Outcome of exporting one input layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerExportResult {
    pub index: usize,
    pub source_name: String,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub has_unsupported_symbol: bool,
}

impl LayerExportResult {
    pub const EXTENT_IS_EMPTY: &'static str = "extent is empty";
    pub const UNSUPPORTED_RENDERER: &'static str = "unsupported renderer";

    pub fn completed(index: usize, source_name: impl Into<String>, has_unsupported_symbol: bool) -> Self {
        Self {
            index,
            source_name: source_name.into(),
            completed: true,
            reason: None,
            has_unsupported_symbol,
        }
    }

    pub fn incomplete(index: usize, source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            index,
            source_name: source_name.into(),
            completed: false,
            reason: Some(reason.into()),
            has_unsupported_symbol: false,
        }
    }

    /// Identifier of the layer inside the package.
    pub fn output_id(&self) -> String {
        format!("layer_{}", self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_serializes_as_array() {
        let e = Extent::new(0.0, 1.0, 2.0, 3.0);
        assert_eq!(serde_json::to_string(&e).unwrap(), "[0.0,1.0,2.0,3.0]");
        let back: Extent = serde_json::from_str("[0,1,2,3]").unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn disjoint_extents_have_no_intersection() {
        let a = Extent::new(0.0, 0.0, 10.0, 10.0);
        let b = Extent::new(20.0, 20.0, 30.0, 30.0);
        assert!(!a.intersects(&b));
        assert!(a.intersection(&b).is_none());
        assert_eq!(
            a.intersection(&Extent::new(5.0, 5.0, 15.0, 15.0)),
            Some(Extent::new(5.0, 5.0, 10.0, 10.0))
        );
    }

    #[test]
    fn blend_mode_names_are_stable() {
        assert_eq!(BlendMode::SoftLight.as_str(), "soft_light");
        assert_eq!(BlendMode::from_name("exclusion"), BlendMode::Normal);
        assert_eq!(
            serde_json::to_string(&BlendMode::Subtract).unwrap(),
            "\"subtract\""
        );
    }

    #[test]
    fn unknown_blend_mode_loads_as_normal() {
        let mode: BlendMode = serde_json::from_str("\"exclusion\"").unwrap();
        assert_eq!(mode, BlendMode::Normal);
        let mode: BlendMode = serde_json::from_str("\"Multiply\"").unwrap();
        assert_eq!(mode, BlendMode::Multiply);
    }

    #[test]
    fn incomplete_result_carries_reason() {
        let r = LayerExportResult::incomplete(3, "roads", LayerExportResult::EXTENT_IS_EMPTY);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["completed"], false);
        assert_eq!(json["reason"], "extent is empty");
        assert_eq!(r.output_id(), "layer_3");

        let done = serde_json::to_value(LayerExportResult::completed(0, "a", true)).unwrap();
        assert!(done.get("reason").is_none());
    }
}
