//! Error taxonomy for an export run.
//!
//! Only fatal conditions live here. Skips (empty extent, empty partition, no placed
//! labels) and degraded fidelity (unsupported symbol layers) are reported as values.

use std::path::PathBuf;

use thiserror::Error;

pub type ExportResult<T> = Result<T, ExportError>;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Unexpected symbol layer type: {kind} ({geometry} symbol layer)")]
    UnknownSymbolLayerKind { geometry: String, kind: String },

    #[error("Unsupported unit {unit}: {reason}")]
    UnsupportedUnit { unit: String, reason: String },

    #[error("Invalid renderer: {0}")]
    InvalidRenderer(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Host service error: {0}")]
    Host(String),

    #[error("Snapshot requires engine >= {required}, current is {current}")]
    IncompatibleSnapshot { required: String, current: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("layer:{layer} - error:{source}")]
    Layer {
        layer: String,
        #[source]
        source: Box<ExportError>,
    },
}

impl ExportError {
    pub fn host(msg: impl Into<String>) -> Self {
        Self::Host(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the name of the layer being processed when the error surfaced.
    pub fn in_layer(self, layer: impl Into<String>) -> Self {
        match self {
            already @ Self::Layer { .. } => already,
            other => Self::Layer {
                layer: layer.into(),
                source: Box::new(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_error_names_the_layer() {
        let err = ExportError::host("clip failed").in_layer("roads");
        assert_eq!(
            err.to_string(),
            "layer:roads - error:Host service error: clip failed"
        );
    }

    #[test]
    fn layer_context_is_not_nested() {
        let err = ExportError::host("x").in_layer("a").in_layer("b");
        assert!(err.to_string().starts_with("layer:a -"));
    }

    #[test]
    fn io_error_mentions_path() {
        let err = ExportError::io("out/layer_0.json", std::io::Error::other("disk full"));
        let msg = err.to_string();
        assert!(msg.contains("out/layer_0.json"));
        assert!(msg.contains("disk full"));
    }
}
