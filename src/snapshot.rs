//! File-based host.
//!
//! A project snapshot is a JSON document holding everything a live GIS session would
//! provide: map context, export extent, layers with their features, and the result of
//! the global label layout. [`SnapshotHost`] serves those to the pipeline.
//!
//! Limits: features are clipped by bounding box (geometries are kept whole), layers
//! must already be in the project CRS, and rasters must be pre-rendered PNG files
//! covering the layer extent.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ExportError, ExportResult};
use crate::expression::Expr;
use crate::hashing::write_json;
use crate::host::{FeatureWriter, GeometryService, LabelService, RasterOutput, RasterRenderer, SinkSpec};
use crate::labels::LabelFeature;
use crate::layer::{Extent, Feature, FeatureSet, FieldDef, MapLayer, RasterLayer, VectorLayer};
use crate::pipeline::{ExportConfig, ExportPipeline};
use crate::renderer::{FieldType, FieldValue};
use crate::symbol::Symbol;
use crate::units::{Crs, ExportContext};
use crate::ENGINE_VERSION;

fn default_min_version() -> String {
    crate::MIN_SNAPSHOT_VERSION.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    #[serde(default = "default_min_version")]
    pub engine_min_version: String,
    pub project_name: String,
    pub context: ExportContext,
    pub extent: Extent,
    #[serde(default)]
    pub layers: Vec<MapLayer>,
    #[serde(default)]
    pub labels: Vec<LabelFeature>,
}

impl ProjectSnapshot {
    pub fn from_json(text: &str) -> ExportResult<Self> {
        let snapshot: Self = serde_json::from_str(text)?;
        snapshot.check_engine_version()?;
        Ok(snapshot)
    }

    /// Load a snapshot file. Relative icon and raster paths resolve against its directory.
    pub fn load(path: &Path) -> ExportResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| ExportError::io(path, e))?;
        let mut snapshot = Self::from_json(&text)?;
        if let Some(base) = path.parent() {
            snapshot.resolve_paths(base);
        }
        Ok(snapshot)
    }

    pub fn check_engine_version(&self) -> ExportResult<()> {
        let incompatible = || ExportError::IncompatibleSnapshot {
            required: self.engine_min_version.clone(),
            current: ENGINE_VERSION.to_string(),
        };
        let engine = semver::Version::parse(ENGINE_VERSION).map_err(|_| incompatible())?;
        let required = semver::Version::parse(&self.engine_min_version).map_err(|_| incompatible())?;

        if engine < required {
            return Err(incompatible());
        }
        Ok(())
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        for layer in &mut self.layers {
            match layer {
                MapLayer::Vector(vector) => {
                    for symbol in vector.renderer.symbols_mut() {
                        resolve_symbol_paths(symbol, base);
                    }
                }
                MapLayer::Raster(raster) => {
                    if !raster.source.is_empty() && Path::new(&raster.source).is_relative() {
                        raster.source = base.join(&raster.source).to_string_lossy().into_owned();
                    }
                }
            }
        }
    }

    pub fn vector_layers(&self) -> impl Iterator<Item = &VectorLayer> {
        self.layers.iter().filter_map(|l| match l {
            MapLayer::Vector(v) => Some(v),
            MapLayer::Raster(_) => None,
        })
    }

    /// Split into a ready-to-run pipeline and the layers to feed it.
    pub fn into_pipeline(self, config: ExportConfig) -> (ExportPipeline<SnapshotHost>, Vec<MapLayer>) {
        let host = SnapshotHost::new(self.labels);
        let pipeline = ExportPipeline::new(host, self.project_name, self.context, self.extent, config);
        (pipeline, self.layers)
    }
}

fn resolve_symbol_paths(symbol: &mut Symbol, base: &Path) {
    for layer in &mut symbol.layers {
        if let Some(path) = layer.path.as_mut() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        if let Some(sub) = layer.sub_symbol.as_mut() {
            resolve_symbol_paths(sub, base);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotHost {
    labels: Vec<LabelFeature>,
}

impl SnapshotHost {
    pub fn new(labels: Vec<LabelFeature>) -> Self {
        Self { labels }
    }
}

impl GeometryService for SnapshotHost {
    fn clip_to_extent(
        &self,
        layer: &VectorLayer,
        extent: &Extent,
        target: &Crs,
    ) -> ExportResult<FeatureSet> {
        if layer.crs != target.authid {
            return Err(ExportError::host(format!(
                "cannot reproject {} from {} to {}",
                layer.name, layer.crs, target.authid
            )));
        }

        let features = layer
            .data
            .features
            .iter()
            .filter(|f| geometry_bounds(&f.geometry).is_some_and(|b| b.intersects(extent)))
            .cloned()
            .collect();
        Ok(FeatureSet {
            fields: layer.data.fields.clone(),
            features,
        })
    }

    fn calculate_field(
        &self,
        mut features: FeatureSet,
        field: &FieldDef,
        expression: &str,
    ) -> ExportResult<FeatureSet> {
        let expr = Expr::parse(expression)?;
        for feature in &mut features.features {
            let value = coerce(expr.eval(feature), field.field_type);
            feature.attributes.insert(field.name.clone(), value);
        }
        features.fields.retain(|f| f.name != field.name);
        features.fields.push(field.clone());
        Ok(features)
    }
}

impl FeatureWriter for SnapshotHost {
    fn extension(&self) -> &str {
        "geojson"
    }

    fn write(&self, spec: &SinkSpec<'_>, features: &[Feature]) -> ExportResult<()> {
        if !spec.encoding.eq_ignore_ascii_case("utf-8") {
            return Err(ExportError::host(format!(
                "GeoJSON must be UTF-8, got {}",
                spec.encoding
            )));
        }

        let mut items = Vec::with_capacity(features.len());
        for feature in features {
            let props = properties(feature, spec.fields)?;
            items.push(json!({
                "type": "Feature",
                "geometry": feature.geometry,
                "properties": props,
            }));
        }
        let name = spec
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let collection = json!({
            "type": "FeatureCollection",
            "name": name,
            "crs": { "type": "name", "properties": { "name": spec.crs.authid } },
            "features": items,
        });
        write_json(spec.path, &collection, false)
    }
}

impl LabelService for SnapshotHost {
    fn extract_labels(
        &self,
        extent: &Extent,
        _scale: f64,
        _dpi: f64,
    ) -> ExportResult<Vec<LabelFeature>> {
        Ok(self
            .labels
            .iter()
            .filter(|l| {
                (extent.xmin..=extent.xmax).contains(&l.x)
                    && (extent.ymin..=extent.ymax).contains(&l.y)
            })
            .cloned()
            .collect())
    }
}

impl RasterRenderer for SnapshotHost {
    /// Copies the pre-rendered source PNG; the image always covers the whole layer.
    fn render(
        &self,
        layer: &RasterLayer,
        _extent: &Extent,
        _ctx: &ExportContext,
        png_path: &Path,
    ) -> ExportResult<RasterOutput> {
        if layer.source.is_empty() {
            return Err(ExportError::host(format!(
                "raster {} has no source image",
                layer.name
            )));
        }
        let source = PathBuf::from(&layer.source);
        let bytes = fs::read(&source).map_err(|e| ExportError::io(&source, e))?;
        let (width, height) = png_dimensions(&bytes).map_err(|e| {
            ExportError::host(format!("{} is not a PNG image: {e}", source.display()))
        })?;
        fs::write(png_path, &bytes).map_err(|e| ExportError::io(png_path, e))?;

        Ok(RasterOutput {
            extent: layer.extent,
            units_per_pixel: layer.extent.width() / f64::from(width),
            width,
            height,
        })
    }
}

fn properties(feature: &Feature, fields: &[FieldDef]) -> ExportResult<Map<String, Value>> {
    let mut props = Map::new();
    if fields.is_empty() {
        for (name, value) in &feature.attributes {
            props.insert(name.clone(), serde_json::to_value(value)?);
        }
    } else {
        for field in fields {
            props.insert(field.name.clone(), serde_json::to_value(feature.attribute(&field.name))?);
        }
    }
    Ok(props)
}

fn coerce(value: FieldValue, field_type: FieldType) -> FieldValue {
    match (field_type, value) {
        (_, FieldValue::Null) => FieldValue::Null,
        (FieldType::Float, v) => v.as_f64().map_or(FieldValue::Null, FieldValue::Float),
        (FieldType::Integer, FieldValue::Int(i)) => FieldValue::Int(i),
        (FieldType::Integer, v) => v
            .as_f64()
            .map_or(FieldValue::Null, |f| FieldValue::Int(f.round() as i64)),
        (FieldType::String, FieldValue::Text(s)) => FieldValue::Text(s),
        (FieldType::String, v) => FieldValue::Text(v.to_string()),
    }
}

/// Bounding box of a GeoJSON geometry, `None` for null or empty geometries.
pub fn geometry_bounds(geometry: &Value) -> Option<Extent> {
    if let Some(parts) = geometry.get("geometries").and_then(Value::as_array) {
        return parts.iter().filter_map(geometry_bounds).reduce(union);
    }
    let mut bounds = None;
    collect_positions(geometry.get("coordinates")?, &mut bounds);
    bounds
}

fn collect_positions(coords: &Value, bounds: &mut Option<Extent>) {
    let Some(items) = coords.as_array() else {
        return;
    };
    match (items.first().and_then(Value::as_f64), items.get(1).and_then(Value::as_f64)) {
        (Some(x), Some(y)) => {
            let point = Extent::new(x, y, x, y);
            *bounds = Some(bounds.map_or(point, |b| union(b, point)));
        }
        _ => items.iter().for_each(|c| collect_positions(c, bounds)),
    }
}

fn union(a: Extent, b: Extent) -> Extent {
    Extent::new(
        a.xmin.min(b.xmin),
        a.ymin.min(b.ymin),
        a.xmax.max(b.xmax),
        a.ymax.max(b.ymax),
    )
}

/// Image size from the PNG header.
fn png_dimensions(bytes: &[u8]) -> Result<(u32, u32), png::DecodingError> {
    let reader = png::Decoder::new(Cursor::new(bytes)).read_info()?;
    let info = reader.info();
    Ok((info.width, info.height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::GeometryType;
    use crate::renderer::Renderer;
    use crate::units::DistanceUnit;
    use std::collections::BTreeMap;

    fn crs() -> Crs {
        Crs {
            authid: "EPSG:3857".into(),
            is_geographic: false,
            map_units: DistanceUnit::Meters,
        }
    }

    fn point(x: f64, y: f64, attrs: &[(&str, FieldValue)]) -> Feature {
        Feature {
            geometry: json!({"type": "Point", "coordinates": [x, y]}),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn layer(features: Vec<Feature>) -> VectorLayer {
        VectorLayer {
            name: "pois".into(),
            geometry_type: GeometryType::Point,
            crs: "EPSG:3857".into(),
            renderer: Renderer::Single {
                symbol: Symbol::new(1.0, vec![]),
            },
            using_symbol_levels: false,
            opacity: 1.0,
            blend_mode: Default::default(),
            labels_enabled: false,
            data: FeatureSet {
                fields: vec![],
                features,
            },
        }
    }

    #[test]
    fn bounds_cover_nested_coordinates() {
        let polygon = json!({"type": "Polygon", "coordinates": [[[0, 0], [4, 0], [4, 3], [0, 0]]]});
        assert_eq!(geometry_bounds(&polygon), Some(Extent::new(0.0, 0.0, 4.0, 3.0)));
        assert_eq!(geometry_bounds(&Value::Null), None);

        let collection = json!({"type": "GeometryCollection", "geometries": [
            {"type": "Point", "coordinates": [-1, 5]},
            {"type": "LineString", "coordinates": [[2, 2], [3, 8]]}
        ]});
        assert_eq!(geometry_bounds(&collection), Some(Extent::new(-1.0, 2.0, 3.0, 8.0)));
    }

    #[test]
    fn clip_keeps_intersecting_features() {
        let host = SnapshotHost::default();
        let layer = layer(vec![point(1.0, 1.0, &[]), point(50.0, 50.0, &[])]);
        let clipped = host
            .clip_to_extent(&layer, &Extent::new(0.0, 0.0, 10.0, 10.0), &crs())
            .unwrap();
        assert_eq!(clipped.len(), 1);
    }

    #[test]
    fn reprojection_is_not_supported() {
        let host = SnapshotHost::default();
        let mut other = layer(vec![]);
        other.crs = "EPSG:4326".into();
        let err = host
            .clip_to_extent(&other, &Extent::new(0.0, 0.0, 1.0, 1.0), &crs())
            .unwrap_err();
        assert!(err.to_string().contains("EPSG:4326"));
    }

    #[test]
    fn calculated_field_is_coerced_to_its_type() {
        let host = SnapshotHost::default();
        let set = FeatureSet {
            fields: vec![],
            features: vec![
                point(0.0, 0.0, &[("a", FieldValue::Float(2.6)), ("b", FieldValue::Int(1))]),
                point(0.0, 0.0, &[("b", FieldValue::Int(1))]),
            ],
        };
        let field = FieldDef {
            name: "tmp_calc".into(),
            field_type: FieldType::Integer,
        };
        let out = host.calculate_field(set, &field, "a + b").unwrap();
        assert!(out.has_field("tmp_calc"));
        assert_eq!(out.features[0].attribute("tmp_calc"), &FieldValue::Int(4));
        assert_eq!(out.features[1].attribute("tmp_calc"), &FieldValue::Null);
    }

    #[test]
    fn writes_a_feature_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layer_0.geojson");
        let crs = crs();
        let fields = vec![FieldDef {
            name: "kind".into(),
            field_type: FieldType::String,
        }];
        let spec = SinkSpec {
            path: &path,
            encoding: "UTF-8",
            fields: &fields,
            geometry_type: GeometryType::Point,
            crs: &crs,
        };
        let feature = point(1.0, 2.0, &[("kind", "cafe".into()), ("hidden", FieldValue::Int(1))]);
        SnapshotHost::default().write(&spec, &[feature]).unwrap();

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["type"], "FeatureCollection");
        assert_eq!(written["name"], "layer_0");
        assert_eq!(written["features"][0]["properties"], json!({"kind": "cafe"}));
    }

    #[test]
    fn newer_snapshot_is_rejected() {
        let text = r#"{
            "engine_min_version": "99.0.0",
            "project_name": "demo",
            "context": {"scale": 1000, "dpi": 96,
                        "crs": {"authid": "EPSG:3857", "map_units": "meters"}},
            "extent": [0, 0, 1, 1]
        }"#;
        assert!(matches!(
            ProjectSnapshot::from_json(text),
            Err(ExportError::IncompatibleSnapshot { .. })
        ));
    }

    fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut encoder = png::Encoder::new(&mut bytes, width, height);
        encoder.set_color(png::ColorType::Rgba);
        let mut writer = encoder.write_header().unwrap();
        writer
            .write_image_data(&vec![0u8; (width * height * 4) as usize])
            .unwrap();
        writer.finish().unwrap();
        bytes
    }

    #[test]
    fn png_header_is_decoded() {
        assert_eq!(png_dimensions(&encode_png(64, 48)).unwrap(), (64, 48));
        assert!(png_dimensions(b"GIF89a").is_err());
    }

    #[test]
    fn truncated_png_header_is_rejected() {
        let bytes = encode_png(8, 8);
        assert!(png_dimensions(&bytes[..20]).is_err());
    }
}
