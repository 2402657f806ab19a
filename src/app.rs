//! Application Coordinator
//!
//! Owns the inspection worker thread and the shared state between the
//! worker and the dashboard. The worker runs the per-frame pipeline:
//! read frame, detect, filter for the selected area, validate, and check
//! resistor markings, then publishes the result for the UI.

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::capture::FrameSource;
use crate::config::AppConfig;
use crate::inspection::{filter_for_area, validate_area, InspectionSession, ResistorVerdict};
use crate::shared::{
    result_slot, AnnotatedDetection, FrameResult, ResultSlot, SharedAppState, WorkerCommand,
};
use crate::vision::{display_label, VisionPipeline};

/// Consecutive frame-read failures tolerated before the loop gives up.
const MAX_READ_FAILURES: u32 = 2;

/// Main application coordinator
pub struct InspectorApp {
    /// Shared state between dashboard and worker
    pub shared_state: Arc<RwLock<SharedAppState>>,
    /// Latest processed frame, overwritten every cycle
    pub result_slot: ResultSlot,
    /// Channel to send commands to the worker
    to_worker: Option<Sender<WorkerCommand>>,
    /// Handle to the worker thread
    worker_handle: Option<JoinHandle<()>>,
}

impl InspectorApp {
    /// Create a new application coordinator
    pub fn new(config: AppConfig, session: InspectionSession) -> Self {
        Self {
            shared_state: Arc::new(RwLock::new(SharedAppState::new(config, session))),
            result_slot: result_slot(),
            to_worker: None,
            worker_handle: None,
        }
    }

    /// Start the inspection loop in a background thread.
    ///
    /// The worker owns the frame source and the vision pipeline; neither is
    /// recoverable after the loop stops.
    pub fn start_inspection(
        &mut self,
        source: Box<dyn FrameSource>,
        pipeline: VisionPipeline,
    ) -> Result<()> {
        if self.is_worker_running() {
            warn!("Inspection loop already running");
            return Ok(());
        }

        let (to_worker, commands) = unbounded();
        let shared_state = self.shared_state.clone();
        let slot = self.result_slot.clone();

        {
            let mut state = shared_state.write();
            state.runtime.is_capturing = true;
            state.runtime.source_description = Some(source.describe());
            state.runtime.clear_error();
            state.runtime.reset_run_stats();
        }

        let handle = std::thread::spawn(move || {
            info!("Inspection worker starting");
            run_worker(source, pipeline, shared_state.clone(), slot, commands);
            let mut state = shared_state.write();
            state.runtime.is_capturing = false;
            state.runtime.source_description = None;
            info!("Inspection worker exiting");
        });

        self.to_worker = Some(to_worker);
        self.worker_handle = Some(handle);
        Ok(())
    }

    /// Signal the worker to stop and wait for it to finish.
    pub fn stop_inspection(&mut self) {
        if let Some(sender) = self.to_worker.take() {
            let _ = sender.send(WorkerCommand::Stop);
        }
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
        self.result_slot.lock().take();
    }

    /// Check if the worker thread is alive
    pub fn is_worker_running(&self) -> bool {
        self.worker_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Get current shared state
    pub fn state(&self) -> Arc<RwLock<SharedAppState>> {
        self.shared_state.clone()
    }

    /// Take the newest processed frame, if one was published since last poll.
    pub fn latest_result(&self) -> Option<Arc<FrameResult>> {
        self.result_slot.lock().clone()
    }
}

impl Drop for InspectorApp {
    fn drop(&mut self) {
        self.stop_inspection();
    }
}

/// The worker loop body. Returns when commanded to stop, the source ends,
/// or reads fail repeatedly.
fn run_worker(
    mut source: Box<dyn FrameSource>,
    mut pipeline: VisionPipeline,
    shared_state: Arc<RwLock<SharedAppState>>,
    slot: ResultSlot,
    commands: Receiver<WorkerCommand>,
) {
    let max_fps = shared_state.read().config.camera.max_fps.max(1);
    let frame_budget = Duration::from_secs_f32(1.0 / max_fps as f32);

    let mut consecutive_failures = 0u32;
    let mut fps_estimate = 0.0f32;

    loop {
        if matches!(commands.try_recv(), Ok(WorkerCommand::Stop)) {
            break;
        }

        let cycle_start = Instant::now();

        let frame = match source.read_frame() {
            Ok(Some(frame)) => {
                consecutive_failures = 0;
                frame
            }
            Ok(None) => {
                info!("Frame source ended");
                break;
            }
            Err(err) => {
                consecutive_failures += 1;
                warn!(
                    "Frame read failed ({}/{}): {:#}",
                    consecutive_failures, MAX_READ_FAILURES, err
                );
                if consecutive_failures >= MAX_READ_FAILURES {
                    shared_state
                        .write()
                        .runtime
                        .set_error(format!("Frame source failed: {:#}", err));
                    break;
                }
                continue;
            }
        };

        if let Err(err) = process_frame(&frame, &mut pipeline, &shared_state, &slot) {
            error!("Frame processing failed: {:#}", err);
            shared_state
                .write()
                .runtime
                .set_error(format!("Processing failed: {:#}", err));
            break;
        }

        let elapsed = cycle_start.elapsed();
        if elapsed < frame_budget {
            std::thread::sleep(frame_budget - elapsed);
        }

        let cycle = cycle_start.elapsed().as_secs_f32().max(1e-6);
        fps_estimate = if fps_estimate == 0.0 {
            1.0 / cycle
        } else {
            fps_estimate * 0.9 + (1.0 / cycle) * 0.1
        };

        let mut state = shared_state.write();
        state.runtime.capture_fps = fps_estimate;
        state.runtime.frames_processed += 1;
    }
}

/// Run detection, area filtering, validation and marking checks for one
/// frame and publish the result.
fn process_frame(
    frame: &crate::capture::frame::CapturedFrame,
    pipeline: &mut VisionPipeline,
    shared_state: &Arc<RwLock<SharedAppState>>,
    slot: &ResultSlot,
) -> Result<()> {
    let detections = pipeline.detect(frame)?;

    let (selected_area, rules, resistors) = {
        let state = shared_state.read();
        (
            state.session.selected_area().map(str::to_string),
            state.session.rules().clone(),
            state.session.resistor_validator().clone(),
        )
    };

    let result = match selected_area {
        None => {
            // No area selected: show raw detections, no validation.
            let annotated = detections
                .iter()
                .map(|d| {
                    let class_name = pipeline.class_name(d.class_id);
                    AnnotatedDetection {
                        label: display_label(&class_name),
                        confidence: d.confidence,
                        bbox: d.bbox,
                        is_defect: class_name
                            .starts_with(crate::inspection::DEFECT_CLASS_PREFIX),
                    }
                })
                .collect();

            FrameResult {
                pixels: frame.data.clone(),
                width: frame.width,
                height: frame.height,
                detections: annotated,
                counts: Default::default(),
                verdict: None,
                resistor_checks: vec![],
                completed_at: Instant::now(),
            }
        }
        Some(area) => {
            let outcome = filter_for_area(
                &area,
                &detections,
                |id| pipeline.class_name(id),
                &rules,
            );
            let verdict = validate_area(&area, &outcome.counts, &outcome.defects, &rules.rules_for(&area));

            let mut resistor_checks: Vec<ResistorVerdict> = Vec::new();
            if pipeline.has_reader() {
                for detection in &outcome.passthrough {
                    if pipeline.class_name(detection.class_id) != "Resistor" {
                        continue;
                    }
                    if let Some(read) = pipeline.read_marking(frame, &detection.bbox)? {
                        resistor_checks.push(resistors.validate(&area, &read.text));
                    }
                }
            }

            let mut annotated: Vec<AnnotatedDetection> = outcome
                .passthrough
                .iter()
                .map(|d| AnnotatedDetection {
                    label: display_label(&pipeline.class_name(d.class_id)),
                    confidence: d.confidence,
                    bbox: d.bbox,
                    is_defect: false,
                })
                .collect();
            for defect in &outcome.defects {
                if let Some(detection) = &defect.detection {
                    annotated.push(AnnotatedDetection {
                        label: display_label(&defect.class_name),
                        confidence: detection.confidence,
                        bbox: detection.bbox,
                        is_defect: true,
                    });
                }
            }

            shared_state
                .write()
                .runtime
                .record_class_counts(&outcome.counts);

            FrameResult {
                pixels: frame.data.clone(),
                width: frame.width,
                height: frame.height,
                detections: annotated,
                counts: outcome.counts,
                verdict: Some(verdict),
                resistor_checks,
                completed_at: Instant::now(),
            }
        }
    };

    *slot.lock() = Some(Arc::new(result));
    Ok(())
}
