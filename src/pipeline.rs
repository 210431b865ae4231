//! Export Pipeline - Single Entry Point
//!
//! Layers are processed sequentially, in input order, against one run-scoped asset
//! registry. Every vector layer is validated before any of its files are written.
//! The first fatal error aborts the run; files of earlier layers stay on disk and the
//! manifest only lists completed layers.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assets::AssetRegistry;
use crate::error::{ExportError, ExportResult};
use crate::hashing::write_json;
use crate::host::{HostServices, SinkSpec};
use crate::labels::{self, LabelFeature};
use crate::layer::{Extent, FeatureSet, FieldDef, LayerExportResult, MapLayer, RasterLayer, VectorLayer};
use crate::manifest::{LabelDocument, ProjectManifest, RasterDocument, StyleDocument};
use crate::renderer::{partition_categorized, partition_graduated, FieldValue, Renderer};
use crate::symbol::Symbol;
use crate::translate::SymbolTranslator;
use crate::validation::{ValidationResult, Validator};
use crate::units::ExportContext;

/// Name of the temporary field holding a computed classification value.
pub const CLASSIFICATION_FIELD: &str = "tmp_calc";

/// Encoding handed to the geometry writer.
pub const OUTPUT_ENCODING: &str = "UTF-8";

pub const MANIFEST_FILE: &str = "project.json";

fn default_assets_dir() -> String {
    "assets".to_string()
}

fn default_label_dpi() -> f64 {
    96.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub output_dir: PathBuf,
    /// Asset directory, relative to `output_dir`.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,
    #[serde(default)]
    pub pretty: bool,
    /// DPI handed to the label layout service.
    #[serde(default = "default_label_dpi")]
    pub label_dpi: f64,
}

impl ExportConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            assets_dir: default_assets_dir(),
            pretty: false,
            label_dpi: default_label_dpi(),
        }
    }

    fn output_path(&self, file_name: impl AsRef<Path>) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

/// Cooperative cancellation flag, polled between layers.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started { total: usize },
    LayerProcessed { index: usize, name: String },
    Finished,
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportReport {
    pub run_id: String,
    pub finished_at: DateTime<Utc>,
    pub aborted: bool,
    pub results: Vec<LayerExportResult>,
    pub manifest: ProjectManifest,
    /// Completed layers with at least one unsupported symbol layer.
    pub unsupported_layers: Vec<String>,
}

impl ExportReport {
    pub fn completed(&self) -> impl Iterator<Item = &LayerExportResult> {
        self.results.iter().filter(|r| r.completed)
    }
}

/// A run executing on a worker thread.
pub struct ExportHandle {
    abort: AbortHandle,
    events: Receiver<ProgressEvent>,
    worker: JoinHandle<ExportResult<ExportReport>>,
}

impl ExportHandle {
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn events(&self) -> &Receiver<ProgressEvent> {
        &self.events
    }

    /// Wait for the run to finish.
    pub fn join(self) -> ExportResult<ExportReport> {
        self.worker
            .join()
            .map_err(|_| ExportError::host("export worker panicked"))?
    }
}

/// Mutable state of one run, owned by the driver.
struct RunState {
    assets: AssetRegistry,
    labels: Vec<LabelFeature>,
}

/// The export pipeline - single entry point for producing a style package
pub struct ExportPipeline<H> {
    host: H,
    project_name: String,
    ctx: ExportContext,
    extent: Extent,
    config: ExportConfig,
    validator: Validator,
}

impl<H: HostServices> ExportPipeline<H> {
    pub fn new(
        host: H,
        project_name: impl Into<String>,
        ctx: ExportContext,
        extent: Extent,
        config: ExportConfig,
    ) -> Self {
        Self {
            host,
            project_name: project_name.into(),
            ctx,
            extent,
            config,
            validator: Validator::new(),
        }
    }

    pub fn context(&self) -> &ExportContext {
        &self.ctx
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Pre-flight check of a vector layer's renderer definition.
    pub fn validate_layer(&self, layer: &VectorLayer) -> ValidationResult {
        self.validator.validate(layer)
    }

    /// Export `layers` on the calling thread.
    pub fn run(&self, layers: &[MapLayer], abort: &AbortHandle) -> ExportResult<ExportReport> {
        self.run_with_progress(layers, abort, |_| {})
    }

    pub fn run_with_progress<F>(
        &self,
        layers: &[MapLayer],
        abort: &AbortHandle,
        mut progress: F,
    ) -> ExportResult<ExportReport>
    where
        F: FnMut(ProgressEvent),
    {
        progress(ProgressEvent::Started {
            total: layers.len(),
        });
        match self.drive(layers, abort, &mut progress) {
            Ok(report) => {
                progress(ProgressEvent::Finished);
                Ok(report)
            }
            Err(err) => {
                progress(ProgressEvent::Failed {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Run on a dedicated worker thread, reporting progress over a channel.
    pub fn spawn(self, layers: Vec<MapLayer>) -> ExportResult<ExportHandle>
    where
        H: Send + 'static,
    {
        let abort = AbortHandle::new();
        let (tx, events) = mpsc::channel();
        let worker_abort = abort.clone();

        let worker = thread::Builder::new()
            .name("stylepack-export".to_string())
            .spawn(move || {
                self.run_with_progress(&layers, &worker_abort, |event| {
                    // The receiver may be gone; the run still completes.
                    let _ = tx.send(event);
                })
            })
            .map_err(|e| ExportError::host(format!("cannot start export worker: {e}")))?;

        Ok(ExportHandle {
            abort,
            events,
            worker,
        })
    }

    #[tracing::instrument(skip_all, fields(project = %self.project_name, layers = layers.len()))]
    fn drive(
        &self,
        layers: &[MapLayer],
        abort: &AbortHandle,
        progress: &mut dyn FnMut(ProgressEvent),
    ) -> ExportResult<ExportReport> {
        let out = &self.config.output_dir;
        fs::create_dir_all(out).map_err(|e| ExportError::io(out, e))?;

        let mut state = RunState {
            assets: AssetRegistry::new(self.config.output_path(&self.config.assets_dir)),
            labels: self.layout_labels(layers)?,
        };
        let mut manifest = ProjectManifest::new(
            self.project_name.clone(),
            &self.ctx,
            self.extent,
            self.config.assets_dir.clone(),
        );
        let mut results = Vec::with_capacity(layers.len());
        let mut aborted = false;

        for (index, layer) in layers.iter().enumerate() {
            if abort.is_aborted() {
                tracing::info!(remaining = layers.len() - index, "export aborted");
                aborted = true;
                break;
            }

            let result = self
                .export_layer(index, layer, &mut state)
                .map_err(|err| {
                    tracing::error!(layer = layer.name(), error = %err, "layer export failed");
                    err.in_layer(layer.name())
                })?;

            if result.completed {
                manifest.layers.push(result.output_id());
            }
            progress(ProgressEvent::LayerProcessed {
                index,
                name: layer.name().to_string(),
            });
            results.push(result);
        }

        write_json(
            &self.config.output_path(MANIFEST_FILE),
            &manifest,
            self.config.pretty,
        )?;

        let unsupported_layers = results
            .iter()
            .filter(|r| r.completed && r.has_unsupported_symbol)
            .map(|r| r.source_name.clone())
            .collect::<Vec<_>>();
        if !unsupported_layers.is_empty() {
            tracing::warn!(
                layers = ?unsupported_layers,
                "some symbol layers were exported as unsupported fallbacks"
            );
        }

        Ok(ExportReport {
            run_id: Uuid::new_v4().to_string(),
            finished_at: Utc::now(),
            aborted,
            results,
            manifest,
            unsupported_layers,
        })
    }

    /// Global label layout, computed once for every label-enabled layer.
    fn layout_labels(&self, layers: &[MapLayer]) -> ExportResult<Vec<LabelFeature>> {
        let wanted = layers
            .iter()
            .any(|l| matches!(l, MapLayer::Vector(v) if v.labels_enabled));
        if !wanted {
            return Ok(Vec::new());
        }
        self.host
            .extract_labels(&self.extent, self.ctx.scale, self.config.label_dpi)
    }

    #[tracing::instrument(skip(self, layer, state), fields(layer = layer.name()))]
    fn export_layer(
        &self,
        index: usize,
        layer: &MapLayer,
        state: &mut RunState,
    ) -> ExportResult<LayerExportResult> {
        let result = match layer {
            MapLayer::Vector(vector) => self.export_vector(index, vector, state)?,
            MapLayer::Raster(raster) => self.export_raster(index, raster)?,
        };

        match &result.reason {
            None => tracing::info!(
                unsupported_symbols = result.has_unsupported_symbol,
                "layer exported"
            ),
            Some(reason) => tracing::info!(reason = reason.as_str(), "layer skipped"),
        }
        Ok(result)
    }

    fn export_vector(
        &self,
        index: usize,
        layer: &VectorLayer,
        state: &mut RunState,
    ) -> ExportResult<LayerExportResult> {
        let validation = self.validator.validate(layer);
        for warning in validation.warnings() {
            tracing::warn!(rule = warning.rule.as_str(), "{}", warning.message);
        }
        if !validation.valid {
            return Err(ExportError::ValidationFailed(validation.error_summary()));
        }

        let clipped = self
            .host
            .clip_to_extent(layer, &self.extent, &self.ctx.crs)?;
        if clipped.is_empty() {
            return Ok(LayerExportResult::incomplete(
                index,
                &layer.name,
                LayerExportResult::EXTENT_IS_EMPTY,
            ));
        }

        let has_unsupported_symbol = match &layer.renderer {
            Renderer::Single { symbol } => {
                self.emit_partition(index, None, layer, &clipped, symbol, None, state)?
            }
            Renderer::Categorized {
                attribute,
                categories,
            } => {
                let (features, values) = self.classification_values(layer, clipped, attribute)?;
                let buckets = partition_categorized(categories, &values);
                let mut unsupported = false;
                for (sub, (category, indices)) in categories.iter().zip(&buckets).enumerate() {
                    unsupported |= self.emit_bucket(
                        index,
                        sub,
                        layer,
                        &features,
                        indices,
                        &category.symbol,
                        &category.label,
                        state,
                    )?;
                }
                unsupported
            }
            Renderer::Graduated { attribute, ranges } => {
                let (features, values) = self.classification_values(layer, clipped, attribute)?;
                let buckets = partition_graduated(ranges, &values);
                let mut unsupported = false;
                for (sub, (range, indices)) in ranges.iter().zip(&buckets).enumerate() {
                    unsupported |= self.emit_bucket(
                        index,
                        sub,
                        layer,
                        &features,
                        indices,
                        &range.symbol,
                        &range.label,
                        state,
                    )?;
                }
                unsupported
            }
            Renderer::Unsupported { kind } => {
                tracing::warn!(renderer = kind.as_str(), "renderer is not exported");
                return Ok(LayerExportResult::incomplete(
                    index,
                    &layer.name,
                    LayerExportResult::UNSUPPORTED_RENDERER,
                ));
            }
        };

        if layer.labels_enabled {
            self.export_labels(index, layer, &state.labels)?;
        }

        Ok(LayerExportResult::completed(
            index,
            &layer.name,
            has_unsupported_symbol,
        ))
    }

    /// Classification value of every feature. Attributes absent from the schema are
    /// treated as expressions and materialized as a temporary field, which is dropped
    /// again once the values are read.
    fn classification_values(
        &self,
        layer: &VectorLayer,
        features: FeatureSet,
        attribute: &str,
    ) -> ExportResult<(FeatureSet, Vec<FieldValue>)> {
        let (features, key) = if features.has_field(attribute) {
            (features, attribute)
        } else {
            let field = FieldDef {
                name: CLASSIFICATION_FIELD.to_string(),
                field_type: layer.renderer.computed_field_type(),
            };
            tracing::debug!(expression = attribute, "materializing classification field");
            (
                self.host.calculate_field(features, &field, attribute)?,
                CLASSIFICATION_FIELD,
            )
        };

        let mut features = features;
        let values = features
            .features
            .iter()
            .map(|f| f.attribute(key).clone())
            .collect();
        if key == CLASSIFICATION_FIELD {
            // Partition files keep the source schema.
            features.fields.retain(|f| f.name != CLASSIFICATION_FIELD);
            for feature in &mut features.features {
                feature.attributes.remove(CLASSIFICATION_FIELD);
            }
        }
        Ok((features, values))
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_bucket(
        &self,
        index: usize,
        sub: usize,
        layer: &VectorLayer,
        features: &FeatureSet,
        indices: &[usize],
        symbol: &Symbol,
        legend: &str,
        state: &mut RunState,
    ) -> ExportResult<bool> {
        if indices.is_empty() {
            tracing::debug!(sub, legend, "empty partition skipped");
            return Ok(false);
        }
        let subset = features.select(indices);
        self.emit_partition(index, Some(sub), layer, &subset, symbol, Some(legend), state)
    }

    /// Write one geometry file and its style document. Returns whether any symbol
    /// layer fell back to the unsupported record.
    #[allow(clippy::too_many_arguments)]
    fn emit_partition(
        &self,
        index: usize,
        sub: Option<usize>,
        layer: &VectorLayer,
        features: &FeatureSet,
        symbol: &Symbol,
        legend: Option<&str>,
        state: &mut RunState,
    ) -> ExportResult<bool> {
        let stem = match sub {
            Some(sub) => format!("layer_{index}_{sub}"),
            None => format!("layer_{index}"),
        };

        let geometry_path = self
            .config
            .output_path(format!("{stem}.{}", self.host.extension()));
        let sink = SinkSpec {
            path: &geometry_path,
            encoding: OUTPUT_ENCODING,
            fields: &features.fields,
            geometry_type: layer.geometry_type,
            crs: &self.ctx.crs,
        };
        self.host.write(&sink, &features.features)?;

        let symbols = SymbolTranslator::new(&self.ctx, &mut state.assets).translate(symbol)?;
        state.assets.export(symbol)?;
        let unsupported = symbols.iter().any(|r| r.is_degraded());

        let document = StyleDocument {
            layer: layer.name.clone(),
            layer_type: layer.geometry_type.style_type().to_string(),
            symbols,
            legend: legend.map(str::to_string),
            opacity: layer.opacity,
            blend_mode: layer.blend_mode,
            using_symbol_levels: layer.using_symbol_levels,
        };
        write_json(
            &self.config.output_path(format!("{stem}.json")),
            &document,
            self.config.pretty,
        )?;

        tracing::debug!(partition = stem.as_str(), features = features.len(), "partition written");
        Ok(unsupported)
    }

    fn export_labels(
        &self,
        index: usize,
        layer: &VectorLayer,
        all_labels: &[LabelFeature],
    ) -> ExportResult<()> {
        let records = labels::extract(all_labels, &layer.name);
        if records.is_empty() {
            tracing::debug!("no placed labels");
            return Ok(());
        }
        let document = LabelDocument {
            layer: layer.name.clone(),
            labels: records,
        };
        write_json(
            &self.config.output_path(format!("label_{index}.json")),
            &document,
            self.config.pretty,
        )
    }

    fn export_raster(&self, index: usize, layer: &RasterLayer) -> ExportResult<LayerExportResult> {
        let Some(clipped) = layer.extent.intersection(&self.extent) else {
            return Ok(LayerExportResult::incomplete(
                index,
                &layer.name,
                LayerExportResult::EXTENT_IS_EMPTY,
            ));
        };

        let png_path = self.config.output_path(format!("layer_{index}.png"));
        let output = self.host.render(layer, &clipped, &self.ctx, &png_path)?;

        let world_path = self.config.output_path(format!("layer_{index}.pgw"));
        fs::write(&world_path, world_file(output.units_per_pixel, &output.extent))
            .map_err(|e| ExportError::io(&world_path, e))?;

        let document = RasterDocument {
            layer: layer.name.clone(),
            layer_type: "raster".to_string(),
            extent: output.extent,
            opacity: layer.opacity,
            blend_mode: layer.blend_mode,
        };
        write_json(
            &self.config.output_path(format!("layer_{index}.json")),
            &document,
            self.config.pretty,
        )?;

        tracing::debug!(width = output.width, height = output.height, "raster rendered");
        Ok(LayerExportResult::completed(index, &layer.name, false))
    }
}

/// Six-line world file anchored at the top-left corner of `extent`.
fn world_file(units_per_pixel: f64, extent: &Extent) -> String {
    format!(
        "{}\n0\n0\n{}\n{}\n{}\n",
        units_per_pixel, -units_per_pixel, extent.xmin, extent.ymax
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_apply_when_loading() {
        let config: ExportConfig = serde_json::from_str(r#"{"output_dir": "out"}"#).unwrap();
        assert_eq!(config.assets_dir, "assets");
        assert_eq!(config.label_dpi, 96.0);
        assert!(!config.pretty);
    }

    #[test]
    fn world_file_has_six_lines() {
        let text = world_file(2.5, &Extent::new(100.0, 0.0, 200.0, 50.0));
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines, vec!["2.5", "0", "0", "-2.5", "100", "50"]);
    }

    #[test]
    fn abort_handle_is_shared() {
        let a = AbortHandle::new();
        let b = a.clone();
        assert!(!b.is_aborted());
        a.abort();
        assert!(b.is_aborted());
    }
}
