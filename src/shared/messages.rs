//! Message and result types passed between the worker and the dashboard

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::inspection::{ResistorVerdict, ValidationVerdict};
use crate::vision::BoundingBox;

/// Commands sent from the coordinator to the inspection worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    /// Request the worker loop to shut down
    Stop,
}

/// A detection prepared for drawing: display label and defect flag resolved.
#[derive(Debug, Clone)]
pub struct AnnotatedDetection {
    /// Label with model typos corrected, ready for display
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
    /// True when the class names a defect rather than a component
    pub is_defect: bool,
}

/// Everything the dashboard needs to render one processed frame.
#[derive(Debug, Clone)]
pub struct FrameResult {
    /// Raw RGB8 pixel data of the frame, row-major
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Detections surviving the area filter, annotated for display
    pub detections: Vec<AnnotatedDetection>,
    /// Expected-component tallies for the selected area
    pub counts: HashMap<String, u32>,
    /// Area verdict; `None` while no area is selected
    pub verdict: Option<ValidationVerdict>,
    /// Marking checks for resistors seen this frame
    pub resistor_checks: Vec<ResistorVerdict>,
    /// When processing of this frame finished
    pub completed_at: Instant,
}

/// Single-slot handoff for the latest frame result.
///
/// The worker overwrites the slot every frame; the dashboard takes whatever
/// is newest. Older results are intentionally dropped rather than queued.
pub type ResultSlot = Arc<Mutex<Option<Arc<FrameResult>>>>;

/// Create an empty result slot.
pub fn result_slot() -> ResultSlot {
    Arc::new(Mutex::new(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_slot_keeps_only_latest() {
        let slot = result_slot();

        for width in [10u32, 20, 30] {
            let result = FrameResult {
                pixels: vec![0; (width * width * 3) as usize],
                width,
                height: width,
                detections: vec![],
                counts: HashMap::new(),
                verdict: None,
                resistor_checks: vec![],
                completed_at: Instant::now(),
            };
            *slot.lock() = Some(Arc::new(result));
        }

        let latest = slot.lock().take().unwrap();
        assert_eq!(latest.width, 30);
        assert!(slot.lock().is_none());
    }
}
