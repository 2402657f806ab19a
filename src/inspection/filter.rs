//! Area detection filter
//!
//! Scopes a frame's raw detections down to the subset relevant to one
//! inspection area: expected components pass through and are tallied,
//! explicit `"No "` defect classes become defect records, everything else
//! is dropped.
//!
//! Callers are expected to run [`reduce_best_per_class`] upstream so counts
//! are at most 1 per component type per frame.
//!
//! [`reduce_best_per_class`]: crate::vision::detector::reduce_best_per_class

use std::collections::HashMap;

use crate::inspection::rules::RuleTable;
use crate::vision::detector::Detection;

/// Detector class names starting with this prefix signal an explicitly
/// detected missing component, not a presence. The convention comes from how
/// the model's class labels were authored.
pub const DEFECT_CLASS_PREFIX: &str = "No ";

/// An explicit missing-component signal emitted by the detector.
#[derive(Debug, Clone)]
pub struct DefectRecord {
    /// Component name with the `"No "` prefix stripped.
    pub component: String,
    /// Raw detector class name.
    pub class_name: String,
    /// The detection that carried the signal, when available.
    pub detection: Option<Detection>,
}

impl DefectRecord {
    pub fn new(
        component: impl Into<String>,
        class_name: impl Into<String>,
        detection: Option<Detection>,
    ) -> Self {
        Self {
            component: component.into(),
            class_name: class_name.into(),
            detection,
        }
    }
}

/// Result of filtering one frame's detections for an area.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Detections of components the area expects, in input order.
    pub passthrough: Vec<Detection>,
    /// Observed count per expected component type.
    pub counts: HashMap<String, u32>,
    /// Explicit defect signals found in the frame.
    pub defects: Vec<DefectRecord>,
}

/// Partition detections for the given area.
///
/// Areas without a defined rule are unconstrained: every detection passes
/// through untouched with no counts and no defects.
pub fn filter_for_area<F>(
    area: &str,
    detections: &[Detection],
    class_name_of: F,
    rules: &RuleTable,
) -> FilterOutcome
where
    F: Fn(usize) -> String,
{
    let expected = rules.rules_for(area);

    if expected.is_empty() {
        return FilterOutcome {
            passthrough: detections.to_vec(),
            counts: HashMap::new(),
            defects: Vec::new(),
        };
    }

    let mut outcome = FilterOutcome::default();

    for detection in detections {
        let class_name = class_name_of(detection.class_id);

        if let Some(component) = class_name.strip_prefix(DEFECT_CLASS_PREFIX) {
            outcome.defects.push(DefectRecord::new(
                component,
                class_name.as_str(),
                Some(detection.clone()),
            ));
        } else if expected.contains_key(&class_name) {
            outcome.passthrough.push(detection.clone());
            *outcome.counts.entry(class_name).or_insert(0) += 1;
        }
        // Classes outside the area's rule that are not defect markers are
        // irrelevant here and dropped.
    }

    outcome
}
