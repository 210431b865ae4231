//! Symbol Translator
//!
//! Turns an ordered chain of source symbol layers into [`SymbolLayerRecord`]s, one record
//! per layer, in source order. Lengths, strokes and icon names are delegated to
//! [`crate::units`], [`crate::penstyle`] and [`AssetRegistry`].

use crate::assets::AssetRegistry;
use crate::color::Rgba;
use crate::error::{ExportError, ExportResult};
use crate::penstyle;
use crate::records::{BrushStyle, MarkerShape, SymbolLayerRecord};
use crate::symbol::{Symbol, SymbolLayer, SymbolLayerKind};
use crate::units::{ExportContext, Length};

pub struct SymbolTranslator<'a> {
    ctx: &'a ExportContext,
    assets: &'a mut AssetRegistry,
}

impl<'a> SymbolTranslator<'a> {
    pub fn new(ctx: &'a ExportContext, assets: &'a mut AssetRegistry) -> Self {
        Self { ctx, assets }
    }

    /// Translate a symbol using its own opacity.
    pub fn translate(&mut self, symbol: &Symbol) -> ExportResult<Vec<SymbolLayerRecord>> {
        self.translate_layers(&symbol.layers, symbol.opacity)
    }

    /// Translate `layers`, stamping every record with `symbol_opacity`.
    pub fn translate_layers(
        &mut self,
        layers: &[SymbolLayer],
        symbol_opacity: f64,
    ) -> ExportResult<Vec<SymbolLayerRecord>> {
        layers
            .iter()
            .map(|layer| self.translate_layer(layer, symbol_opacity))
            .collect()
    }

    fn translate_layer(
        &mut self,
        layer: &SymbolLayer,
        opacity: f64,
    ) -> ExportResult<SymbolLayerRecord> {
        let ctx = self.ctx;
        let level = layer.rendering_pass;

        let record = match layer.kind()? {
            SymbolLayerKind::SimpleMarker => SymbolLayerRecord::SimpleMarker {
                size: layer.size.to_points(ctx)?,
                color: layer.color,
                outline_color: layer.stroke_color,
                outline_width: layer.stroke_width.to_points(ctx)?,
                outline_penstyle: penstyle::resolve(layer, ctx)?,
                shape: layer
                    .shape
                    .as_deref()
                    .map(MarkerShape::from_name)
                    .unwrap_or_default(),
                offset: self.offset(layer)?,
                rotation: layer.angle,
                level,
                opacity,
            },
            SymbolLayerKind::RasterMarker => SymbolLayerRecord::RasterMarker {
                width: layer.size.to_points(ctx)?,
                height: icon_height(layer).to_points(ctx)?,
                asset_name: self.asset_name(layer)?,
                offset: self.offset(layer)?,
                rotation: layer.angle,
                level,
                opacity,
            },
            SymbolLayerKind::SvgMarker => {
                let params = layer.svg_params;
                SymbolLayerRecord::SvgMarker {
                    width: layer.size.to_points(ctx)?,
                    height: icon_height(layer).to_points(ctx)?,
                    color: params.has_fill_param.then_some(layer.color),
                    outline_color: params.has_stroke_param.then_some(layer.stroke_color),
                    outline_width: if params.has_stroke_width_param {
                        Some(layer.stroke_width.to_points(ctx)?)
                    } else {
                        None
                    },
                    asset_name: self.asset_name(layer)?,
                    offset: self.offset(layer)?,
                    rotation: layer.angle,
                    level,
                    opacity,
                }
            }
            SymbolLayerKind::SimpleLine => SymbolLayerRecord::SimpleLine {
                color: layer.color,
                width: layer.width.to_points(ctx)?,
                penstyle: penstyle::resolve(layer, ctx)?,
                level,
                opacity,
            },
            SymbolLayerKind::MarkerLine => {
                let markers = match &layer.sub_symbol {
                    Some(sub) => self.translate(sub)?,
                    None => Vec::new(),
                };
                SymbolLayerRecord::MarkerLine {
                    markers,
                    interval: layer.interval.to_points(ctx)?,
                    level,
                    opacity,
                }
            }
            SymbolLayerKind::SimpleFill => SymbolLayerRecord::SimpleFill {
                color: layer.fill_color.unwrap_or(layer.color),
                brushstyle: layer
                    .brush_style
                    .as_deref()
                    .map(BrushStyle::from_name)
                    .unwrap_or_default(),
                outline_color: layer.stroke_color,
                outline_width: layer.stroke_width.to_points(ctx)?,
                outline_penstyle: penstyle::resolve(layer, ctx)?,
                level,
                opacity,
            },
            SymbolLayerKind::SvgFill => SymbolLayerRecord::SvgFill {
                color: layer.color,
                outline_color: layer.stroke_color,
                outline_width: layer.stroke_width.to_points(ctx)?,
                level,
                opacity,
            },
            SymbolLayerKind::Unsupported(name) => {
                tracing::warn!(kind = name, "symbol layer exported as unsupported fallback");
                SymbolLayerRecord::Unsupported {
                    kind: name.to_ascii_lowercase(),
                    color: Rgba::BLACK,
                    size: 0.0,
                    level,
                    opacity,
                }
            }
        };
        Ok(record)
    }

    fn offset(&self, layer: &SymbolLayer) -> ExportResult<[f64; 2]> {
        let unit = layer.offset.unit;
        Ok([
            self.ctx.to_points(layer.offset.x, unit)?,
            self.ctx.to_points(layer.offset.y, unit)?,
        ])
    }

    fn asset_name(&mut self, layer: &SymbolLayer) -> ExportResult<String> {
        let source = layer.path.as_deref().ok_or_else(|| {
            ExportError::host(format!("{} has no source path", layer.layer_type))
        })?;
        Ok(self.assets.reserve(source).name.clone())
    }
}

/// Icon height in symbol units: a locked ratio wins over the file's own ratio.
fn icon_height(layer: &SymbolLayer) -> Length {
    let ratio = if layer.fixed_aspect_ratio == 0.0 {
        layer.default_aspect_ratio
    } else {
        layer.fixed_aspect_ratio
    };
    Length::new(layer.size.value * ratio, layer.size.unit)
}
