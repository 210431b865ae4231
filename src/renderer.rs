//! Renderer classification and feature partitioning.
//!
//! Partitioning is pure: it maps each feature's classification value to at most one
//! category or range index. The driver turns those indices into geometry files.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::symbol::Symbol;

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Null or empty string: the marker of a catch-all category.
    pub fn is_catch_all(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Null | Self::Bool(_) => None,
        }
    }

    /// Equality used for category matching: integers and floats compare numerically.
    pub fn matches(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => false,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => (*a as f64) == *b,
            (a, b) => a == b,
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Int(_) | Self::Bool(_) => FieldType::Integer,
            Self::Text(_) => FieldType::String,
            Self::Float(_) | Self::Null => FieldType::Float,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Storage type of a materialized classification field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Float,
    Integer,
    String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Null or `""` designates the catch-all category.
    #[serde(default)]
    pub value: FieldValue,
    #[serde(default)]
    pub label: String,
    pub symbol: Symbol,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range {
    /// Exclusive.
    pub lower: f64,
    /// Inclusive.
    pub upper: f64,
    #[serde(default)]
    pub label: String,
    pub symbol: Symbol,
}

impl Range {
    pub fn contains(&self, v: f64) -> bool {
        self.lower < v && v <= self.upper
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Renderer {
    Single {
        symbol: Symbol,
    },
    Categorized {
        /// Field name or expression producing the classification value.
        attribute: String,
        categories: Vec<Category>,
    },
    Graduated {
        attribute: String,
        ranges: Vec<Range>,
    },
    /// Any renderer the engine does not classify (rule based, heatmap, ...).
    Unsupported {
        kind: String,
    },
}

impl Renderer {
    pub fn kind_name(&self) -> &str {
        match self {
            Self::Single { .. } => "single",
            Self::Categorized { .. } => "categorized",
            Self::Graduated { .. } => "graduated",
            Self::Unsupported { kind } => kind,
        }
    }

    pub fn class_attribute(&self) -> Option<&str> {
        match self {
            Self::Categorized { attribute, .. } | Self::Graduated { attribute, .. } => {
                Some(attribute)
            }
            _ => None,
        }
    }

    pub fn symbols_mut(&mut self) -> Vec<&mut Symbol> {
        match self {
            Self::Single { symbol } => vec![symbol],
            Self::Categorized { categories, .. } => {
                categories.iter_mut().map(|c| &mut c.symbol).collect()
            }
            Self::Graduated { ranges, .. } => ranges.iter_mut().map(|r| &mut r.symbol).collect(),
            Self::Unsupported { .. } => Vec::new(),
        }
    }

    /// Type of the temporary field holding a computed classification value, taken
    /// from the first explicit category.
    pub fn computed_field_type(&self) -> FieldType {
        match self {
            Self::Categorized { categories, .. } => categories
                .iter()
                .find(|c| !c.value.is_catch_all())
                .map(|c| c.value.field_type())
                .unwrap_or(FieldType::String),
            _ => FieldType::Float,
        }
    }
}

/// Assign each value to the first category whose value it equals, otherwise to the
/// catch-all category. Returns one list of value indices per category.
pub fn partition_categorized<'v, I>(categories: &[Category], values: I) -> Vec<Vec<usize>>
where
    I: IntoIterator<Item = &'v FieldValue>,
{
    let mut buckets = vec![Vec::new(); categories.len()];
    let catch_all = categories.iter().position(|c| c.value.is_catch_all());

    for (i, value) in values.into_iter().enumerate() {
        let explicit = categories
            .iter()
            .position(|c| !c.value.is_catch_all() && c.value.matches(value));
        if let Some(bucket) = explicit.or(catch_all) {
            buckets[bucket].push(i);
        }
    }
    buckets
}

/// Assign each value to the first range with `lower < v <= upper`. Null and
/// non-numeric values land nowhere.
pub fn partition_graduated<'v, I>(ranges: &[Range], values: I) -> Vec<Vec<usize>>
where
    I: IntoIterator<Item = &'v FieldValue>,
{
    let mut buckets = vec![Vec::new(); ranges.len()];
    for (i, value) in values.into_iter().enumerate() {
        let Some(v) = value.as_f64() else {
            continue;
        };
        if let Some(bucket) = ranges.iter().position(|r| r.contains(v)) {
            buckets[bucket].push(i);
        }
    }
    buckets
}

/// Ranges sorted by lower bound, for overlap checks.
pub(crate) fn sorted_ranges(ranges: &[Range]) -> Vec<&Range> {
    let mut sorted: Vec<_> = ranges.iter().collect();
    sorted.sort_by(|a, b| a.lower.partial_cmp(&b.lower).unwrap_or(Ordering::Equal));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(value: FieldValue, label: &str) -> Category {
        Category {
            value,
            label: label.to_string(),
            symbol: Symbol::new(1.0, vec![]),
        }
    }

    fn range(lower: f64, upper: f64) -> Range {
        Range {
            lower,
            upper,
            label: format!("{lower} - {upper}"),
            symbol: Symbol::new(1.0, vec![]),
        }
    }

    #[test]
    fn catch_all_absorbs_unlisted_and_null() {
        let categories = vec![
            category(FieldValue::Int(1), "A"),
            category(FieldValue::Int(2), "B"),
            category("".into(), "Other"),
        ];
        let values = [FieldValue::Int(1), FieldValue::Int(2), FieldValue::Int(3), FieldValue::Null];
        let buckets = partition_categorized(&categories, &values);
        assert_eq!(buckets, vec![vec![0], vec![1], vec![2, 3]]);
    }

    #[test]
    fn categorized_partition_is_exhaustive_and_exclusive() {
        let categories = vec![
            category("forest".into(), "Forest"),
            category(FieldValue::Null, "Other"),
            category("water".into(), "Water"),
        ];
        let values: Vec<FieldValue> = ["water", "forest", "urban", "water", "", "forest"]
            .into_iter()
            .map(FieldValue::from)
            .collect();
        let buckets = partition_categorized(&categories, &values);

        let mut seen: Vec<usize> = buckets.iter().flatten().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..values.len()).collect::<Vec<_>>());
        assert_eq!(buckets[0], vec![1, 5]);
        assert_eq!(buckets[1], vec![2, 4]);
        assert_eq!(buckets[2], vec![0, 3]);
    }

    #[test]
    fn without_catch_all_unmatched_values_are_dropped() {
        let categories = vec![category(FieldValue::Int(1), "A")];
        let values = [FieldValue::Int(1), FieldValue::Int(5)];
        assert_eq!(partition_categorized(&categories, &values), vec![vec![0]]);
    }

    #[test]
    fn integer_and_float_values_match_numerically() {
        let categories = vec![category(FieldValue::Float(2.0), "two")];
        let values = [FieldValue::Int(2)];
        assert_eq!(partition_categorized(&categories, &values), vec![vec![0]]);
    }

    #[test]
    fn graduated_intervals_are_half_open() {
        let ranges = vec![range(0.0, 10.0), range(10.0, 20.0)];
        let values = [
            FieldValue::Float(0.0),
            FieldValue::Float(10.0),
            FieldValue::Float(10.5),
            FieldValue::Int(20),
            FieldValue::Null,
            FieldValue::Float(25.0),
        ];
        let buckets = partition_graduated(&ranges, &values);
        assert_eq!(buckets, vec![vec![1], vec![2, 3]]);
    }

    #[test]
    fn computed_field_type_follows_first_category() {
        let renderer = Renderer::Categorized {
            attribute: "\"a\" + \"b\"".into(),
            categories: vec![category(FieldValue::Int(3), "x")],
        };
        assert_eq!(renderer.computed_field_type(), FieldType::Integer);
        let graduated = Renderer::Graduated {
            attribute: "area".into(),
            ranges: vec![],
        };
        assert_eq!(graduated.computed_field_type(), FieldType::Float);
    }

    #[test]
    fn computed_field_type_skips_leading_catch_all() {
        let renderer = Renderer::Categorized {
            attribute: "\"kind\" + ''".into(),
            categories: vec![
                category(FieldValue::Null, "Other"),
                category(FieldValue::Text("forest".into()), "forest"),
            ],
        };
        assert_eq!(renderer.computed_field_type(), FieldType::String);

        let only_catch_all = Renderer::Categorized {
            attribute: "\"kind\" + ''".into(),
            categories: vec![category(FieldValue::Null, "Other")],
        };
        assert_eq!(only_catch_all.computed_field_type(), FieldType::String);
    }

    #[test]
    fn renderer_deserializes_from_tagged_json() {
        let renderer: Renderer = serde_json::from_str(
            r#"{"type": "categorized", "attribute": "kind",
                "categories": [{"value": null, "label": "all", "symbol": {"layers": []}}]}"#,
        )
        .unwrap();
        assert_eq!(renderer.class_attribute(), Some("kind"));
    }
}
