//! Label Record Extractor
//!
//! Label placement is computed once per run over the whole extent for every labelled
//! layer at once. Extraction is a pure filter over that shared result.

use serde::{Deserialize, Serialize};

use crate::color::Rgba;

/// One label produced by the host's global label layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelFeature {
    /// Name of the source layer the label belongs to.
    pub layer: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub rotation: f64,
    pub text: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub color: Rgba,
    #[serde(default = "default_opacity")]
    pub font_opacity: f64,
    #[serde(default)]
    pub buffer_size: f64,
    #[serde(default)]
    pub buffer_color: Option<Rgba>,
    #[serde(default)]
    pub buffer_opacity: f64,
    #[serde(default)]
    pub unplaced: bool,
}

fn default_opacity() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRecord {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub text: String,
    pub font_family: String,
    pub font_size: f64,
    pub bold: bool,
    pub underline: bool,
    pub text_color: Rgba,
    pub text_opacity: f64,
    pub buffer_width: f64,
    pub buffer_color: Rgba,
    pub buffer_opacity: f64,
}

impl From<&LabelFeature> for LabelRecord {
    fn from(label: &LabelFeature) -> Self {
        Self {
            x: label.x,
            y: label.y,
            rotation: label.rotation,
            text: label.text.clone(),
            font_family: label.family.clone(),
            font_size: label.size,
            bold: label.bold,
            underline: label.underline,
            text_color: label.color,
            text_opacity: label.font_opacity,
            buffer_width: label.buffer_size,
            buffer_color: label.buffer_color.unwrap_or(Rgba::BLACK),
            buffer_opacity: label.buffer_opacity,
        }
    }
}

/// Placed labels of `layer_name`, in layout order.
pub fn extract(all_labels: &[LabelFeature], layer_name: &str) -> Vec<LabelRecord> {
    all_labels
        .iter()
        .filter(|l| l.layer == layer_name && !l.unplaced)
        .map(LabelRecord::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(layer: &str, text: &str, unplaced: bool) -> LabelFeature {
        LabelFeature {
            layer: layer.to_string(),
            x: 1.0,
            y: 2.0,
            rotation: 0.0,
            text: text.to_string(),
            family: "Noto Sans".to_string(),
            size: 10.0,
            bold: false,
            underline: false,
            color: Rgba::BLACK,
            font_opacity: 1.0,
            buffer_size: 0.0,
            buffer_color: None,
            buffer_opacity: 0.0,
            unplaced,
        }
    }

    #[test]
    fn keeps_only_placed_labels_of_the_layer() {
        let all = vec![
            label("roads", "Main St", false),
            label("rivers", "Elbe", false),
            label("roads", "Hidden Rd", true),
            label("roads", "2nd Ave", false),
        ];
        let records = extract(&all, "roads");
        let texts: Vec<_> = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Main St", "2nd Ave"]);
    }

    #[test]
    fn missing_buffer_color_defaults_to_black() {
        let records = extract(&[label("a", "x", false)], "a");
        assert_eq!(records[0].buffer_color, Rgba::BLACK);
        assert_eq!(records[0].font_family, "Noto Sans");
    }

    #[test]
    fn unknown_layer_yields_nothing() {
        assert!(extract(&[label("a", "x", false)], "b").is_empty());
    }
}
