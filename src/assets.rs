//! Asset Exporter
//!
//! Icon files referenced by raster and SVG markers are copied once per distinct source
//! path per run. The registry lives as long as one export run and is threaded through
//! the translator and the driver explicitly.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{ExportError, ExportResult};
use crate::hashing::sha256_hex;
use crate::symbol::{Symbol, SymbolGeometry};

/// An icon registered during the current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRef {
    /// Allocation order within the run.
    pub index: usize,
    /// File name inside the asset directory.
    pub name: String,
    pub source: PathBuf,
}

#[derive(Debug)]
struct AssetEntry {
    asset: AssetRef,
    copied: bool,
}

#[derive(Debug)]
pub struct AssetRegistry {
    asset_dir: PathBuf,
    by_source: HashMap<PathBuf, usize>,
    entries: Vec<AssetEntry>,
    names: HashSet<String>,
}

impl AssetRegistry {
    pub fn new(asset_dir: impl Into<PathBuf>) -> Self {
        Self {
            asset_dir: asset_dir.into(),
            by_source: HashMap::new(),
            entries: Vec::new(),
            names: HashSet::new(),
        }
    }

    pub fn asset_dir(&self) -> &Path {
        &self.asset_dir
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, source: &Path) -> Option<&AssetRef> {
        self.by_source.get(source).map(|i| &self.entries[*i].asset)
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetRef> {
        self.entries.iter().map(|e| &e.asset)
    }

    /// Allocate (or look up) the asset name for `source` without touching the disk.
    pub fn reserve(&mut self, source: &Path) -> &AssetRef {
        let index = match self.by_source.get(source) {
            Some(index) => *index,
            None => {
                let index = self.entries.len();
                let name = self.allocate_name(source, index);
                self.names.insert(name.clone());
                self.by_source.insert(source.to_path_buf(), index);
                self.entries.push(AssetEntry {
                    asset: AssetRef {
                        index,
                        name,
                        source: source.to_path_buf(),
                    },
                    copied: false,
                });
                index
            }
        };
        &self.entries[index].asset
    }

    /// Copy every icon referenced by `symbol`, nested sub-symbols included.
    pub fn export(&mut self, symbol: &Symbol) -> ExportResult<()> {
        for layer in &symbol.layers {
            if let Some(sub) = &layer.sub_symbol {
                self.export(sub)?;
            }

            if layer.geometry != SymbolGeometry::Marker || !layer.kind()?.is_icon_marker() {
                continue;
            }

            let source = layer.path.as_deref().ok_or_else(|| {
                ExportError::host(format!("{} has no source path", layer.layer_type))
            })?;
            self.copy_once(source)?;
        }
        Ok(())
    }

    fn copy_once(&mut self, source: &Path) -> ExportResult<()> {
        let index = self.reserve(source).index;
        let entry = &mut self.entries[index];
        if entry.copied {
            return Ok(());
        }

        fs::create_dir_all(&self.asset_dir).map_err(|e| ExportError::io(&self.asset_dir, e))?;
        let target = self.asset_dir.join(&entry.asset.name);
        fs::copy(source, &target).map_err(|e| ExportError::io(source, e))?;
        entry.copied = true;

        tracing::debug!(
            source = %source.display(),
            asset = %entry.asset.name,
            "copied symbol asset"
        );
        Ok(())
    }

    fn allocate_name(&self, source: &Path, index: usize) -> String {
        let file_name = match source.file_name().and_then(|n| n.to_str()) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("asset_{index}"),
        };
        if !self.names.contains(&file_name) {
            return file_name;
        }

        let digest = sha256_hex(source.to_string_lossy().as_bytes());
        let tag = &digest[..8];
        let candidate = match (
            source.file_stem().and_then(|s| s.to_str()),
            source.extension().and_then(|e| e.to_str()),
        ) {
            (Some(stem), Some(ext)) => format!("{stem}-{tag}.{ext}"),
            _ => format!("{file_name}-{tag}"),
        };
        if self.names.contains(&candidate) {
            format!("{index}-{candidate}")
        } else {
            candidate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolLayer;

    fn svg_marker(path: &Path) -> SymbolLayer {
        let mut layer = SymbolLayer::new(SymbolGeometry::Marker, "SvgMarker");
        layer.path = Some(path.to_path_buf());
        layer
    }

    #[test]
    fn reserve_is_idempotent_per_source() {
        let mut registry = AssetRegistry::new("out/assets");
        let a = registry.reserve(Path::new("/icons/pin.svg")).clone();
        let b = registry.reserve(Path::new("/icons/pin.svg")).clone();
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn same_file_name_from_different_sources_is_disambiguated() {
        let mut registry = AssetRegistry::new("out/assets");
        let a = registry.reserve(Path::new("/a/pin.svg")).name.clone();
        let b = registry.reserve(Path::new("/b/pin.svg")).name.clone();
        assert_eq!(a, "pin.svg");
        assert_ne!(a, b);
        assert!(b.starts_with("pin-") && b.ends_with(".svg"));
    }

    #[test]
    fn duplicate_references_copy_once() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let icon = src.path().join("pin.svg");
        fs::write(&icon, "<svg/>").unwrap();

        let mut nested = Symbol::new(1.0, vec![svg_marker(&icon)]);
        let mut marker_line = SymbolLayer::new(SymbolGeometry::Line, "MarkerLine");
        marker_line.sub_symbol = Some(Box::new(nested.clone()));
        nested.layers.push(marker_line);

        let mut registry = AssetRegistry::new(out.path().join("assets"));
        registry.export(&nested).unwrap();
        registry.export(&nested).unwrap();

        let files: Vec<_> = fs::read_dir(out.path().join("assets")).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn non_icon_layers_are_skipped() {
        let out = tempfile::tempdir().unwrap();
        let symbol = Symbol::new(
            1.0,
            vec![
                SymbolLayer::new(SymbolGeometry::Marker, "SimpleMarker"),
                SymbolLayer::new(SymbolGeometry::Fill, "GradientFill"),
            ],
        );
        let mut registry = AssetRegistry::new(out.path().join("assets"));
        registry.export(&symbol).unwrap();
        assert!(registry.is_empty());
        assert!(!out.path().join("assets").exists());
    }
}
