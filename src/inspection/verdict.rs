//! Area validation engine
//!
//! Compares observed component counts against an area's expected-count rule
//! and produces a three-state verdict with itemized missing/excess/defect
//! breakdowns.

use std::collections::HashMap;

use crate::inspection::filter::DefectRecord;

/// Validation outcome, strongest wins and is never downgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    Ok,
    Warning,
    Error,
}

impl Status {
    /// Escalate to `other` if it is stronger than the current status.
    fn escalate(&mut self, other: Status) {
        if other > *self {
            *self = other;
        }
    }

    /// Short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Error => "ERROR",
        }
    }
}

/// A component observed fewer times than the rule requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingComponent {
    pub component: String,
    pub expected: u32,
    pub actual: u32,
    pub shortage: u32,
}

/// A component observed more times than the rule allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcessComponent {
    pub component: String,
    pub expected: u32,
    pub actual: u32,
    pub surplus: u32,
}

/// A defect signaled explicitly by the detector (a `"No "` class).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefectNote {
    /// Component name with the defect prefix stripped.
    pub component: String,
    /// Raw detector class name that signaled the defect.
    pub class_name: String,
}

/// Full validation result for one area and one frame.
///
/// Constructed atomically by [`validate_area`]; all list fields are always
/// present (possibly empty) and the verdict is never mutated after return.
#[derive(Debug, Clone)]
pub struct ValidationVerdict {
    pub status: Status,
    pub area: String,
    pub expected: HashMap<String, u32>,
    pub actual: HashMap<String, u32>,
    pub missing: Vec<MissingComponent>,
    pub excess: Vec<ExcessComponent>,
    pub defects: Vec<DefectNote>,
    pub message: String,
}

/// Validate observed counts and declared defects against an area rule.
///
/// Every ruled component is checked, observed or not. Missing components set
/// the status to `Error` (sticky); excess components raise `Ok` to `Warning`
/// but never downgrade an `Error`. Any explicit defect record fails the area
/// outright regardless of count matching.
pub fn validate_area(
    area: &str,
    counts: &HashMap<String, u32>,
    defects: &[DefectRecord],
    rules: &HashMap<String, u32>,
) -> ValidationVerdict {
    let mut status = Status::Ok;
    let mut expected = HashMap::new();
    let mut actual = HashMap::new();
    let mut missing = Vec::new();
    let mut excess = Vec::new();

    // Rule maps are unordered; walk components sorted by name so the
    // itemized lists come out deterministic.
    let mut components: Vec<(&String, &u32)> = rules.iter().collect();
    components.sort_by(|a, b| a.0.cmp(b.0));

    for (component, &expected_count) in components {
        let actual_count = counts.get(component).copied().unwrap_or(0);

        expected.insert(component.clone(), expected_count);
        actual.insert(component.clone(), actual_count);

        if actual_count < expected_count {
            missing.push(MissingComponent {
                component: component.clone(),
                expected: expected_count,
                actual: actual_count,
                shortage: expected_count - actual_count,
            });
            status.escalate(Status::Error);
        } else if actual_count > expected_count {
            excess.push(ExcessComponent {
                component: component.clone(),
                expected: expected_count,
                actual: actual_count,
                surplus: actual_count - expected_count,
            });
            status.escalate(Status::Warning);
        }
    }

    let defect_notes: Vec<DefectNote> = defects
        .iter()
        .map(|defect| DefectNote {
            component: defect.component.clone(),
            class_name: defect.class_name.clone(),
        })
        .collect();

    if !defect_notes.is_empty() {
        status.escalate(Status::Error);
    }

    let message = compose_message(area, status, &missing, &excess, &defect_notes);

    ValidationVerdict {
        status,
        area: area.to_string(),
        expected,
        actual,
        missing,
        excess,
        defects: defect_notes,
        message,
    }
}

fn compose_message(
    area: &str,
    status: Status,
    missing: &[MissingComponent],
    excess: &[ExcessComponent],
    defects: &[DefectNote],
) -> String {
    if status == Status::Ok {
        return format!("{}: All components OK", area);
    }

    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("Missing: {} type(s)", missing.len()));
    }
    if !excess.is_empty() {
        parts.push(format!("Excess: {} type(s)", excess.len()));
    }
    if !defects.is_empty() {
        parts.push(format!("Defects: {} issue(s)", defects.len()));
    }

    format!("{}: {}", area, parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(entries: &[(&str, u32)]) -> HashMap<String, u32> {
        entries
            .iter()
            .map(|(name, count)| (name.to_string(), *count))
            .collect()
    }

    fn counts(entries: &[(&str, u32)]) -> HashMap<String, u32> {
        rule(entries)
    }

    #[test]
    fn test_exact_counts_are_ok() {
        let rules = rule(&[("Resistor", 2), ("Capacitor", 3)]);
        let observed = counts(&[("Resistor", 2), ("Capacitor", 3)]);

        let verdict = validate_area("Area 4", &observed, &[], &rules);

        assert_eq!(verdict.status, Status::Ok);
        assert!(verdict.missing.is_empty());
        assert!(verdict.excess.is_empty());
        assert!(verdict.defects.is_empty());
        assert_eq!(verdict.message, "Area 4: All components OK");
    }

    #[test]
    fn test_shortage_is_error() {
        let rules = rule(&[("Resistor", 2), ("Capacitor", 3)]);
        let observed = counts(&[("Resistor", 1), ("Capacitor", 3)]);

        let verdict = validate_area("Area 4", &observed, &[], &rules);

        assert_eq!(verdict.status, Status::Error);
        assert_eq!(verdict.missing.len(), 1);
        assert_eq!(verdict.missing[0].component, "Resistor");
        assert_eq!(verdict.missing[0].expected, 2);
        assert_eq!(verdict.missing[0].actual, 1);
        assert_eq!(verdict.missing[0].shortage, 1);
        assert!(verdict.excess.is_empty());
    }

    #[test]
    fn test_surplus_is_warning() {
        let rules = rule(&[("Resistor", 2), ("Capacitor", 3)]);
        let observed = counts(&[("Resistor", 2), ("Capacitor", 4)]);

        let verdict = validate_area("Area 4", &observed, &[], &rules);

        assert_eq!(verdict.status, Status::Warning);
        assert_eq!(verdict.excess.len(), 1);
        assert_eq!(verdict.excess[0].component, "Capacitor");
        assert_eq!(verdict.excess[0].surplus, 1);
        assert!(verdict.missing.is_empty());
    }

    #[test]
    fn test_error_is_never_downgraded_by_excess() {
        // Missing "Apple" sets Error before the excess on "Zener" is seen;
        // the excess must not pull it back down to Warning.
        let rules = rule(&[("Apple", 1), ("Zener", 1)]);
        let observed = counts(&[("Zener", 2)]);

        let verdict = validate_area("Area 1", &observed, &[], &rules);

        assert_eq!(verdict.status, Status::Error);
        assert_eq!(verdict.missing.len(), 1);
        assert_eq!(verdict.excess.len(), 1);
    }

    #[test]
    fn test_any_defect_forces_error() {
        let rules = rule(&[("Resistor", 1)]);
        let observed = counts(&[("Resistor", 1)]);
        let defects = vec![DefectRecord::new("Capacitor", "No Capacitor", None)];

        let verdict = validate_area("Area 2", &observed, &defects, &rules);

        assert_eq!(verdict.status, Status::Error);
        assert_eq!(verdict.defects.len(), 1);
        assert_eq!(verdict.defects[0].component, "Capacitor");
        assert_eq!(verdict.defects[0].class_name, "No Capacitor");
    }

    #[test]
    fn test_unobserved_component_counts_as_zero() {
        let rules = rule(&[("LED", 1)]);
        let verdict = validate_area("Area 3", &HashMap::new(), &[], &rules);

        assert_eq!(verdict.status, Status::Error);
        assert_eq!(verdict.actual.get("LED"), Some(&0));
        assert_eq!(verdict.missing[0].shortage, 1);
    }

    #[test]
    fn test_message_enumerates_nonzero_sections() {
        let rules = rule(&[("IC", 2), ("LED", 1)]);
        let observed = counts(&[("IC", 1), ("LED", 3)]);
        let defects = vec![DefectRecord::new("Jumper", "No Jumper", None)];

        let verdict = validate_area("Area 3", &observed, &defects, &rules);

        assert_eq!(
            verdict.message,
            "Area 3: Missing: 1 type(s), Excess: 1 type(s), Defects: 1 issue(s)"
        );
    }
}
