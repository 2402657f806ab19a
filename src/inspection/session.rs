//! Inspection session state
//!
//! Tracks the operator-selected area, per-area captured snapshots, and
//! produces the multi-area inspection report.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::inspection::resistor::{ResistorKnowledgeBase, ResistorValidator};
use crate::inspection::rules::RuleTable;
use crate::inspection::verdict::{Status, ValidationVerdict};

/// Why a capture request was rejected. No state changes on rejection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no inspection area selected")]
    NoAreaSelected,
    #[error("camera is not running")]
    CameraNotRunning,
    #[error("no components tallied in the current frame")]
    NothingDetected,
}

/// Snapshot of one area taken on an explicit capture action.
#[derive(Debug, Clone)]
pub struct AreaCapture {
    pub area: String,
    pub counts: HashMap<String, u32>,
    pub captured_at: DateTime<Local>,
    pub verdict: ValidationVerdict,
}

/// Operator-facing inspection state: rules, resistor expectations, the
/// selected area and captured snapshots.
#[derive(Debug, Clone)]
pub struct InspectionSession {
    rules: RuleTable,
    resistors: ResistorValidator,
    selected_area: Option<String>,
    captures: HashMap<String, AreaCapture>,
}

impl InspectionSession {
    pub fn new(rules: RuleTable, knowledge: ResistorKnowledgeBase) -> Self {
        Self {
            rules,
            resistors: ResistorValidator::new(knowledge),
            selected_area: None,
            captures: HashMap::new(),
        }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn resistor_validator(&self) -> &ResistorValidator {
        &self.resistors
    }

    /// Set the active inspection area. Takes effect from the next frame.
    pub fn select_area(&mut self, area: impl Into<String>) {
        let area = area.into();
        info!("Selected inspection area: {}", area);
        self.selected_area = Some(area);
    }

    pub fn selected_area(&self) -> Option<&str> {
        self.selected_area.as_deref()
    }

    pub fn capture_for(&self, area: &str) -> Option<&AreaCapture> {
        self.captures.get(area)
    }

    /// Sorted, human-readable expected components for an area, plus the
    /// resistor summary when the knowledge base covers it.
    pub fn expected_component_listing(&self, area: &str) -> String {
        let mut listing = self.rules.component_listing(area);
        if self.resistors.knowledge().expected_for(area).is_some() {
            listing.push_str("\n\n");
            listing.push_str(&self.resistors.knowledge().summarize(area));
        }
        listing
    }

    /// Capture the latest validation result for the selected area.
    ///
    /// The observation must come from a fully-formed frame result; a capture
    /// of an already-captured area overwrites the earlier snapshot.
    pub fn capture_area(
        &mut self,
        camera_running: bool,
        observation: Option<(&HashMap<String, u32>, &ValidationVerdict)>,
    ) -> Result<AreaCapture, CaptureError> {
        let area = self
            .selected_area
            .clone()
            .ok_or(CaptureError::NoAreaSelected)?;

        if !camera_running {
            return Err(CaptureError::CameraNotRunning);
        }

        let (counts, verdict) = observation.ok_or(CaptureError::NothingDetected)?;
        if counts.is_empty() && verdict.defects.is_empty() {
            return Err(CaptureError::NothingDetected);
        }

        let capture = AreaCapture {
            area: area.clone(),
            counts: counts.clone(),
            captured_at: Local::now(),
            verdict: verdict.clone(),
        };

        info!(
            "Captured {} ({} component types, status {})",
            area,
            capture.counts.len(),
            capture.verdict.status.label()
        );
        self.captures.insert(area, capture.clone());
        Ok(capture)
    }

    /// Clear every captured area back to "not captured".
    pub fn reset_all_areas(&mut self) {
        info!("Resetting {} captured areas", self.captures.len());
        self.captures.clear();
    }

    pub fn captured_count(&self) -> usize {
        self.captures.len()
    }

    /// Full multi-area report: per-area capture state and tallies, plus an
    /// aggregate defect rate across the captured areas.
    pub fn generate_report(&self) -> String {
        let mut report = String::new();
        report.push_str("PCB Inspection Report\n");
        report.push_str(&format!(
            "Generated: {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        report.push_str(&"=".repeat(40));
        report.push('\n');

        let mut total_ok: u32 = 0;
        let mut total_defects: u32 = 0;

        for area in self.rules.area_names() {
            report.push('\n');
            match self.captures.get(&area) {
                None => {
                    report.push_str(&format!("{} [NOT CAPTURED]\n", area));
                }
                Some(capture) => {
                    report.push_str(&format!(
                        "{} [CAPTURED {}] - {}\n",
                        area,
                        capture.captured_at.format("%Y-%m-%d %H:%M:%S"),
                        capture.verdict.status.label()
                    ));

                    let mut counts: Vec<(&String, &u32)> = capture.counts.iter().collect();
                    counts.sort_by(|a, b| a.0.cmp(b.0));

                    if !counts.is_empty() {
                        report.push_str("  OK components:\n");
                        for (component, count) in counts {
                            report.push_str(&format!("    • {}: {}\n", component, count));
                            total_ok += count;
                        }
                    }

                    if !capture.verdict.defects.is_empty() {
                        report.push_str("  Incomplete:\n");
                        for defect in &capture.verdict.defects {
                            report.push_str(&format!(
                                "    • {} (missing {})\n",
                                defect.class_name, defect.component
                            ));
                            total_defects += 1;
                        }
                    }

                    if capture.verdict.status != Status::Ok {
                        report.push_str(&format!("  Verdict: {}\n", capture.verdict.message));
                    }
                }
            }
        }

        report.push('\n');
        report.push_str(&"-".repeat(40));
        report.push('\n');
        report.push_str(&format!(
            "Captured areas: {}/{}\n",
            self.captures.len(),
            self.rules.area_names().len()
        ));

        let observations = total_ok + total_defects;
        if observations > 0 {
            let rate = total_defects as f64 / observations as f64 * 100.0;
            report.push_str(&format!(
                "Aggregate defect rate: {:.1}% ({} defect signals / {} observations)\n",
                rate, total_defects, observations
            ));
        } else {
            report.push_str("Aggregate defect rate: n/a (no captured observations)\n");
        }

        report
    }

    /// Write the report as plain text. The only durable output of a session.
    pub fn export_report(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create report directory {:?}", dir))?;
        let filename = format!("inspection_{}.txt", Local::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(filename);
        std::fs::write(&path, self.generate_report())
            .with_context(|| format!("Failed to write report to {:?}", path))?;
        info!("Report exported to {:?}", path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspection::filter::DefectRecord;
    use crate::inspection::verdict::validate_area;

    fn session() -> InspectionSession {
        InspectionSession::new(RuleTable::builtin(), ResistorKnowledgeBase::builtin())
    }

    fn observation(
        area: &str,
        counts: &[(&str, u32)],
        defects: &[DefectRecord],
    ) -> (HashMap<String, u32>, ValidationVerdict) {
        let counts: HashMap<String, u32> = counts
            .iter()
            .map(|(name, count)| (name.to_string(), *count))
            .collect();
        let rules = RuleTable::builtin().rules_for(area);
        let verdict = validate_area(area, &counts, defects, &rules);
        (counts, verdict)
    }

    #[test]
    fn test_capture_requires_selected_area() {
        let mut session = session();
        let (counts, verdict) = observation("Area 4", &[("Resistor", 2)], &[]);

        let err = session
            .capture_area(true, Some((&counts, &verdict)))
            .unwrap_err();
        assert_eq!(err, CaptureError::NoAreaSelected);
        assert_eq!(session.captured_count(), 0);
    }

    #[test]
    fn test_capture_requires_running_camera() {
        let mut session = session();
        session.select_area("Area 4");
        let (counts, verdict) = observation("Area 4", &[("Resistor", 2)], &[]);

        let err = session
            .capture_area(false, Some((&counts, &verdict)))
            .unwrap_err();
        assert_eq!(err, CaptureError::CameraNotRunning);
    }

    #[test]
    fn test_capture_requires_detections() {
        let mut session = session();
        session.select_area("Area 4");

        assert_eq!(
            session.capture_area(true, None).unwrap_err(),
            CaptureError::NothingDetected
        );

        let (counts, verdict) = observation("Area 4", &[], &[]);
        assert_eq!(
            session
                .capture_area(true, Some((&counts, &verdict)))
                .unwrap_err(),
            CaptureError::NothingDetected
        );
    }

    #[test]
    fn test_capture_overwrites_previous_snapshot() {
        let mut session = session();
        session.select_area("Area 4");

        let (counts, verdict) = observation("Area 4", &[("Resistor", 1)], &[]);
        session.capture_area(true, Some((&counts, &verdict))).unwrap();

        let (counts, verdict) = observation("Area 4", &[("Resistor", 2), ("Capasitor", 3)], &[]);
        session.capture_area(true, Some((&counts, &verdict))).unwrap();

        assert_eq!(session.captured_count(), 1);
        let capture = session.capture_for("Area 4").unwrap();
        assert_eq!(capture.counts.get("Resistor"), Some(&2));
        assert_eq!(capture.verdict.status, Status::Ok);
    }

    #[test]
    fn test_reset_clears_all_captures() {
        let mut session = session();
        session.select_area("Area 4");
        let (counts, verdict) = observation("Area 4", &[("Resistor", 2)], &[]);
        session.capture_area(true, Some((&counts, &verdict))).unwrap();

        session.reset_all_areas();
        assert_eq!(session.captured_count(), 0);
        assert!(session.capture_for("Area 4").is_none());
    }

    #[test]
    fn test_expected_listing_includes_resistor_summary() {
        let session = session();
        let listing = session.expected_component_listing("Area 4");

        assert!(listing.contains("• Capasitor: 3"));
        assert!(listing.contains("• Resistor: 2"));
        assert!(listing.contains("Expected resistors in Area 4"));
        assert!(listing.contains("R53"));
    }

    #[test]
    fn test_expected_listing_without_resistor_data() {
        let session = session();
        let listing = session.expected_component_listing("Area 7");

        assert!(listing.contains("• Buzzer: 1"));
        assert!(!listing.contains("Expected resistors"));
    }

    #[test]
    fn test_report_marks_uncaptured_areas() {
        let report = session().generate_report();

        for area in RuleTable::builtin().area_names() {
            assert!(report.contains(&format!("{} [NOT CAPTURED]", area)));
        }
        assert!(report.contains("Captured areas: 0/7"));
        assert!(report.contains("n/a"));
    }

    #[test]
    fn test_report_defect_rate() {
        let mut session = session();
        session.select_area("Area 2");

        let defects = vec![DefectRecord::new("Capasitor", "No Capasitor", None)];
        let (counts, verdict) = observation("Area 2", &[("IC", 1)], &defects);
        session.capture_area(true, Some((&counts, &verdict))).unwrap();

        let report = session.generate_report();
        assert!(report.contains("Area 2 [CAPTURED"));
        assert!(report.contains("• IC: 1"));
        assert!(report.contains("• No Capasitor (missing Capasitor)"));
        // 1 defect out of 2 observations.
        assert!(report.contains("Aggregate defect rate: 50.0%"));
        assert!(report.contains("Captured areas: 1/7"));
    }

    #[test]
    fn test_export_report_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = session().export_report(dir.path()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("PCB Inspection Report"));
    }
}
