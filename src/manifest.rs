//! Documents written into the package. Keys are part of the package format.

use serde::{Deserialize, Serialize};

use crate::labels::LabelRecord;
use crate::layer::{BlendMode, Extent};
use crate::records::SymbolLayerRecord;
use crate::units::ExportContext;

/// `project.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub project_name: String,
    /// Authority id, e.g. `EPSG:3857`.
    pub crs: String,
    pub crs_type: String,
    pub extent: Extent,
    pub scale: f64,
    /// Output identifiers of completed layers, in input order.
    pub layers: Vec<String>,
    pub assets_path: String,
}

impl ProjectManifest {
    pub fn new(
        project_name: impl Into<String>,
        ctx: &ExportContext,
        extent: Extent,
        assets_path: impl Into<String>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            crs: ctx.crs.authid.clone(),
            crs_type: ctx.crs.crs_type().to_string(),
            extent,
            scale: ctx.scale,
            layers: Vec::new(),
            assets_path: assets_path.into(),
        }
    }
}

/// `layer_<idx>[_<sub>].json` for vector layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleDocument {
    pub layer: String,
    #[serde(rename = "type")]
    pub layer_type: String,
    pub symbols: Vec<SymbolLayerRecord>,
    /// Category or range label of partitioned renderers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend: Option<String>,
    pub opacity: f64,
    pub blend_mode: BlendMode,
    #[serde(rename = "usingSymbolLevels")]
    pub using_symbol_levels: bool,
}

/// `layer_<idx>.json` for raster layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterDocument {
    pub layer: String,
    #[serde(rename = "type")]
    pub layer_type: String,
    pub extent: Extent,
    pub opacity: f64,
    pub blend_mode: BlendMode,
}

/// `label_<idx>.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelDocument {
    pub layer: String,
    pub labels: Vec<LabelRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{Crs, DistanceUnit};

    #[test]
    fn manifest_keys_are_stable() {
        let ctx = ExportContext::new(
            5000.0,
            96.0,
            Crs {
                authid: "EPSG:4326".into(),
                is_geographic: true,
                map_units: DistanceUnit::Degrees,
            },
        );
        let manifest = ProjectManifest::new("demo", &ctx, Extent::new(0.0, 0.0, 1.0, 1.0), "assets");
        let json = serde_json::to_value(&manifest).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["assets_path", "crs", "crs_type", "extent", "layers", "project_name", "scale"]
        );
        assert_eq!(json["crs_type"], "geographic");
    }

    #[test]
    fn style_document_uses_package_key_names() {
        let doc = StyleDocument {
            layer: "parcels".into(),
            layer_type: "polygon".into(),
            symbols: vec![],
            legend: None,
            opacity: 1.0,
            blend_mode: BlendMode::Multiply,
            using_symbol_levels: true,
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["type"], "polygon");
        assert_eq!(json["usingSymbolLevels"], true);
        assert_eq!(json["blend_mode"], "multiply");
        assert!(json.get("legend").is_none());
    }
}
