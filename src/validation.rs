//! Validation System - Rule/Policy Separation
//!
//! Rules inspect a vector layer's renderer definition and produce structured violations.
//! Policy: any error-severity violation makes the layer invalid and aborts the run;
//! warnings are logged and export continues.

use serde::{Deserialize, Serialize};

use crate::layer::VectorLayer;
use crate::renderer::{sorted_ranges, Renderer};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub remediation: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub layer: String,
    pub violations: Vec<ValidationViolation>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.severity == ViolationSeverity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationViolation> {
        self.violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationViolation> {
        self.violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::Warning)
    }

    /// `rule: message` of every error, joined.
    pub fn error_summary(&self) -> String {
        self.errors()
            .map(|v| format!("{}: {}", v.rule, v.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validation rule trait - produces violations
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, layer: &VectorLayer) -> Vec<ValidationViolation>;
}

fn violation(
    rule: &str,
    severity: ViolationSeverity,
    message: impl Into<String>,
    expected: Option<String>,
    actual: Option<String>,
    remediation: &str,
) -> ValidationViolation {
    ValidationViolation {
        rule: rule.to_string(),
        severity,
        message: message.into(),
        expected,
        actual,
        remediation: vec![remediation.to_string()],
    }
}

// --- Concrete Rules ---

pub struct ClassAttributeRule;

impl ValidationRule for ClassAttributeRule {
    fn name(&self) -> &'static str {
        "class_attribute"
    }

    fn validate(&self, layer: &VectorLayer) -> Vec<ValidationViolation> {
        match layer.renderer.class_attribute() {
            Some(attr) if attr.trim().is_empty() => vec![violation(
                self.name(),
                ViolationSeverity::Error,
                "Classification attribute is empty",
                Some("field name or expression".to_string()),
                Some(format!("{attr:?}")),
                "Set the renderer's classification field",
            )],
            _ => vec![],
        }
    }
}

pub struct CatchAllRule;

impl ValidationRule for CatchAllRule {
    fn name(&self) -> &'static str {
        "catch_all"
    }

    fn validate(&self, layer: &VectorLayer) -> Vec<ValidationViolation> {
        let Renderer::Categorized { categories, .. } = &layer.renderer else {
            return vec![];
        };
        let count = categories.iter().filter(|c| c.value.is_catch_all()).count();
        if count > 1 {
            vec![violation(
                self.name(),
                ViolationSeverity::Error,
                "More than one catch-all category",
                Some("at most 1".to_string()),
                Some(count.to_string()),
                "Keep a single category with an empty value",
            )]
        } else {
            vec![]
        }
    }
}

pub struct DuplicateCategoryRule;

impl ValidationRule for DuplicateCategoryRule {
    fn name(&self) -> &'static str {
        "duplicate_category"
    }

    fn validate(&self, layer: &VectorLayer) -> Vec<ValidationViolation> {
        let Renderer::Categorized { categories, .. } = &layer.renderer else {
            return vec![];
        };
        let mut violations = vec![];
        for (i, a) in categories.iter().enumerate() {
            if a.value.is_catch_all() {
                continue;
            }
            if categories[..i].iter().any(|b| b.value.matches(&a.value)) {
                violations.push(violation(
                    self.name(),
                    ViolationSeverity::Warning,
                    format!("Category {:?} repeats value {}", a.label, a.value),
                    None,
                    Some(a.value.to_string()),
                    "Features only go to the first category with this value",
                ));
            }
        }
        violations
    }
}

pub struct RangeBoundsRule;

impl ValidationRule for RangeBoundsRule {
    fn name(&self) -> &'static str {
        "range_bounds"
    }

    fn validate(&self, layer: &VectorLayer) -> Vec<ValidationViolation> {
        let Renderer::Graduated { ranges, .. } = &layer.renderer else {
            return vec![];
        };
        let mut violations = vec![];

        for range in ranges.iter().filter(|r| r.lower > r.upper) {
            violations.push(violation(
                self.name(),
                ViolationSeverity::Error,
                format!("Range {:?} has lower bound above upper bound", range.label),
                Some("lower <= upper".to_string()),
                Some(format!("{} > {}", range.lower, range.upper)),
                "Swap the range bounds",
            ));
        }

        let sorted = sorted_ranges(ranges);
        for pair in sorted.windows(2) {
            if pair[1].lower < pair[0].upper {
                violations.push(violation(
                    self.name(),
                    ViolationSeverity::Warning,
                    format!("Ranges {:?} and {:?} overlap", pair[0].label, pair[1].label),
                    None,
                    Some(format!("{} < {}", pair[1].lower, pair[0].upper)),
                    "Features only go to the first matching range",
                ));
            }
        }
        violations
    }
}

pub struct EmptyClassesRule;

impl ValidationRule for EmptyClassesRule {
    fn name(&self) -> &'static str {
        "empty_classes"
    }

    fn validate(&self, layer: &VectorLayer) -> Vec<ValidationViolation> {
        let empty = match &layer.renderer {
            Renderer::Categorized { categories, .. } => categories.is_empty(),
            Renderer::Graduated { ranges, .. } => ranges.is_empty(),
            _ => false,
        };
        if empty {
            vec![violation(
                self.name(),
                ViolationSeverity::Warning,
                "Renderer has no classes; the layer will produce no geometry",
                Some("at least 1 class".to_string()),
                Some("0".to_string()),
                "Classify the layer before exporting",
            )]
        } else {
            vec![]
        }
    }
}

/// Validator orchestrates rules and applies policy
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule + Send + Sync>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(ClassAttributeRule),
                Box::new(CatchAllRule),
                Box::new(DuplicateCategoryRule),
                Box::new(RangeBoundsRule),
                Box::new(EmptyClassesRule),
            ],
        }
    }

    pub fn validate(&self, layer: &VectorLayer) -> ValidationResult {
        let violations: Vec<_> = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(layer))
            .collect();

        let mut result = ValidationResult {
            valid: true,
            layer: layer.name.clone(),
            violations,
        };
        result.valid = !result.has_errors();
        result
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{FeatureSet, GeometryType};
    use crate::renderer::{Category, FieldValue, Range};
    use crate::symbol::Symbol;

    fn layer(renderer: Renderer) -> VectorLayer {
        VectorLayer {
            name: "test".into(),
            geometry_type: GeometryType::Point,
            crs: "EPSG:3857".into(),
            renderer,
            using_symbol_levels: false,
            opacity: 1.0,
            blend_mode: Default::default(),
            labels_enabled: false,
            data: FeatureSet::default(),
        }
    }

    fn category(value: FieldValue) -> Category {
        Category {
            value,
            label: String::new(),
            symbol: Symbol::new(1.0, vec![]),
        }
    }

    fn range(lower: f64, upper: f64) -> Range {
        Range {
            lower,
            upper,
            label: String::new(),
            symbol: Symbol::new(1.0, vec![]),
        }
    }

    #[test]
    fn two_catch_alls_is_an_error() {
        let result = Validator::new().validate(&layer(Renderer::Categorized {
            attribute: "kind".into(),
            categories: vec![category(FieldValue::Null), category("".into())],
        }));
        assert!(!result.valid);
        assert!(result.error_summary().contains("catch_all"));
    }

    #[test]
    fn inverted_range_is_an_error_overlap_a_warning() {
        let result = Validator::new().validate(&layer(Renderer::Graduated {
            attribute: "pop".into(),
            ranges: vec![range(0.0, 10.0), range(5.0, 20.0)],
        }));
        assert!(result.valid);
        assert_eq!(result.warnings().count(), 1);

        let result = Validator::new().validate(&layer(Renderer::Graduated {
            attribute: "pop".into(),
            ranges: vec![range(30.0, 20.0)],
        }));
        assert!(!result.valid);
    }

    #[test]
    fn empty_attribute_is_an_error() {
        let result = Validator::new().validate(&layer(Renderer::Categorized {
            attribute: "  ".into(),
            categories: vec![category(FieldValue::Int(1))],
        }));
        assert!(!result.valid);
    }

    #[test]
    fn single_symbol_layer_is_valid() {
        let result = Validator::new().validate(&layer(Renderer::Single {
            symbol: Symbol::new(1.0, vec![]),
        }));
        assert!(result.valid);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn duplicate_values_warn() {
        let result = Validator::new().validate(&layer(Renderer::Categorized {
            attribute: "kind".into(),
            categories: vec![category(FieldValue::Int(1)), category(FieldValue::Float(1.0))],
        }));
        assert!(result.valid);
        assert_eq!(result.warnings().count(), 1);
    }
}
