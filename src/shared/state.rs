//! Shared application state between the dashboard and the inspection worker

use std::collections::HashMap;

use crate::config::AppConfig;
use crate::inspection::InspectionSession;

/// Central state guarded by a lock and shared across threads.
#[derive(Debug)]
pub struct SharedAppState {
    /// Application configuration
    pub config: AppConfig,
    /// Area selection, captures and validation rules
    pub session: InspectionSession,
    /// Runtime state (not persisted)
    pub runtime: RuntimeState,
}

impl SharedAppState {
    /// Create a new shared state with the given configuration and session
    pub fn new(config: AppConfig, session: InspectionSession) -> Self {
        Self {
            config,
            session,
            runtime: RuntimeState::default(),
        }
    }
}

impl Default for SharedAppState {
    fn default() -> Self {
        use crate::inspection::{ResistorKnowledgeBase, RuleTable};
        Self::new(
            AppConfig::default(),
            InspectionSession::new(RuleTable::builtin(), ResistorKnowledgeBase::builtin()),
        )
    }
}

/// Command to control the capture loop from the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    /// Start the inspection loop
    Start,
    /// Stop the inspection loop
    Stop,
}

/// Runtime state that is not persisted
#[derive(Debug, Clone, Default)]
pub struct RuntimeState {
    /// Whether the inspection loop is currently running
    pub is_capturing: bool,
    /// Description of the active frame source
    pub source_description: Option<String>,
    /// Measured processing rate in frames per second
    pub capture_fps: f32,
    /// Frames processed since the loop started
    pub frames_processed: u64,
    /// Last error message (if any)
    pub last_error: Option<String>,
    /// Pending capture command from UI
    pub capture_command: Option<CaptureCommand>,
    /// Highest simultaneous count seen per component class this run
    pub max_class_counts: HashMap<String, u32>,
}

impl RuntimeState {
    /// Clear any error state
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Set an error message
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    /// Fold a frame's class counts into the per-class maxima.
    pub fn record_class_counts(&mut self, counts: &HashMap<String, u32>) {
        for (class, &count) in counts {
            let entry = self.max_class_counts.entry(class.clone()).or_insert(0);
            if count > *entry {
                *entry = count;
            }
        }
    }

    /// Reset per-run statistics when a new capture loop starts.
    pub fn reset_run_stats(&mut self) {
        self.capture_fps = 0.0;
        self.frames_processed = 0;
        self.max_class_counts.clear();
    }
}
