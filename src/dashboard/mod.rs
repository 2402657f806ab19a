//! Dashboard UI
//!
//! Single-window egui dashboard: area selection and capture controls on the
//! left, the live annotated frame and verdicts in the center.

use eframe::egui;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::error;

use crate::app::InspectorApp;
use crate::capture::FrameSource;
use crate::config::AppConfig;
use crate::inspection::{ResistorStatus, Status};
use crate::shared::FrameResult;
use crate::vision::VisionPipeline;

/// Builds the frame source and vision pipeline when inspection starts.
///
/// Construction is deferred to the start action so a missing camera or
/// model file surfaces as a dashboard error instead of aborting startup.
pub type PipelineFactory =
    Box<dyn Fn(&AppConfig) -> Result<(Box<dyn FrameSource>, VisionPipeline)> + Send>;

/// The main dashboard application
pub struct DashboardApp {
    /// Coordinator owning the worker thread and shared state
    app: InspectorApp,
    /// Factory invoked on every start action
    factory: PipelineFactory,
    /// GPU texture of the last rendered frame
    frame_texture: Option<egui::TextureHandle>,
    /// Result the texture was built from, to skip redundant uploads
    last_frame_at: Option<Instant>,
    /// Last result kept for capture actions and verdict display
    latest: Option<Arc<FrameResult>>,
    /// Report text shown in a window after "Generate report"
    report_text: Option<String>,
    /// Transient status line ("Captured Area 4", "Report exported ...")
    flash: Option<(String, Instant)>,
}

impl DashboardApp {
    pub fn new(app: InspectorApp, factory: PipelineFactory) -> Self {
        Self {
            app,
            factory,
            frame_texture: None,
            last_frame_at: None,
            latest: None,
            report_text: None,
            flash: None,
        }
    }

    /// Create eframe options for the dashboard window
    pub fn options() -> eframe::NativeOptions {
        eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([1100.0, 700.0])
                .with_min_inner_size([800.0, 500.0])
                .with_title("PCB Inspector"),
            ..Default::default()
        }
    }

    fn set_flash(&mut self, message: impl Into<String>) {
        self.flash = Some((message.into(), Instant::now()));
    }

    fn start_inspection(&mut self) {
        let config = self.app.shared_state.read().config.clone();
        match (self.factory)(&config) {
            Ok((source, pipeline)) => {
                if let Err(e) = self.app.start_inspection(source, pipeline) {
                    error!("Failed to start inspection: {:#}", e);
                    self.app
                        .shared_state
                        .write()
                        .runtime
                        .set_error(format!("Failed to start: {:#}", e));
                }
            }
            Err(e) => {
                error!("Failed to build pipeline: {:#}", e);
                self.app
                    .shared_state
                    .write()
                    .runtime
                    .set_error(format!("Failed to start: {:#}", e));
            }
        }
    }

    fn capture_current_area(&mut self) {
        let running = self.app.is_worker_running();
        let observation = self
            .latest
            .as_ref()
            .and_then(|r| r.verdict.as_ref().map(|v| (&r.counts, v)));

        let outcome = self
            .app
            .shared_state
            .write()
            .session
            .capture_area(running, observation);

        match outcome {
            Ok(capture) => {
                self.set_flash(format!(
                    "Captured {} ({})",
                    capture.area,
                    capture.verdict.status.label()
                ));
            }
            Err(e) => {
                self.app
                    .shared_state
                    .write()
                    .runtime
                    .set_error(e.to_string());
            }
        }
    }

    fn export_report(&mut self) {
        let (report_dir, result) = {
            let state = self.app.shared_state.read();
            let dir = state.config.inspection.report_dir.clone();
            let result = state.session.export_report(&dir);
            (dir, result)
        };

        match result {
            Ok(path) => self.set_flash(format!("Report exported to {}", path.display())),
            Err(e) => {
                error!("Report export to {:?} failed: {:#}", report_dir, e);
                self.app
                    .shared_state
                    .write()
                    .runtime
                    .set_error(format!("Export failed: {:#}", e));
            }
        }
    }

    fn render_sidebar(&mut self, ui: &mut egui::Ui) {
        ui.heading("Inspection");
        ui.separator();

        let (areas, selected, running, fps, frames, error, listing) = {
            let state = self.app.shared_state.read();
            let selected = state.session.selected_area().map(str::to_string);
            let listing = selected
                .as_deref()
                .map(|area| state.session.expected_component_listing(area));
            (
                state.session.rules().area_names(),
                selected,
                state.runtime.is_capturing,
                state.runtime.capture_fps,
                state.runtime.frames_processed,
                state.runtime.last_error.clone(),
                listing,
            )
        };

        let mut choice = selected.clone();
        egui::ComboBox::from_label("Area")
            .selected_text(choice.as_deref().unwrap_or("Select area"))
            .show_ui(ui, |ui| {
                for area in &areas {
                    ui.selectable_value(&mut choice, Some(area.clone()), area);
                }
            });
        if choice != selected {
            if let Some(area) = &choice {
                self.app.shared_state.write().session.select_area(area);
            }
        }

        ui.add_space(8.0);

        ui.horizontal(|ui| {
            if running {
                if ui.button("Stop").clicked() {
                    self.app.stop_inspection();
                }
            } else if ui.button("Start").clicked() {
                self.start_inspection();
            }

            if ui
                .add_enabled(running, egui::Button::new("Capture area"))
                .clicked()
            {
                self.capture_current_area();
            }
        });

        ui.add_space(8.0);

        let captured = self.app.shared_state.read().session.captured_count();
        let total = areas.len();
        ui.label(format!("Captured areas: {}/{}", captured, total));

        ui.horizontal(|ui| {
            if ui.button("Generate report").clicked() {
                self.report_text =
                    Some(self.app.shared_state.read().session.generate_report());
            }
            if ui.button("Export").clicked() {
                self.export_report();
            }
        });

        if ui.button("Reset all areas").clicked() {
            self.app.shared_state.write().session.reset_all_areas();
            self.set_flash("All areas reset");
        }

        ui.separator();

        if running {
            ui.label(format!("{:.1} FPS, {} frames", fps, frames));
        } else {
            ui.label("Stopped");
        }

        if let Some(error) = error {
            ui.colored_label(egui::Color32::LIGHT_RED, error);
            if ui.small_button("Dismiss").clicked() {
                self.app.shared_state.write().runtime.clear_error();
            }
        }

        if let Some((message, since)) = &self.flash {
            if since.elapsed().as_secs() < 5 {
                ui.colored_label(egui::Color32::LIGHT_GREEN, message);
            }
        }

        if let Some(listing) = listing {
            ui.separator();
            ui.label("Expected:");
            egui::ScrollArea::vertical()
                .max_height(200.0)
                .show(ui, |ui| {
                    ui.monospace(listing);
                });
        }
    }

    fn render_frame_view(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let Some(result) = self.latest.clone() else {
            ui.centered_and_justified(|ui| {
                ui.label("No frames yet. Select an area and press Start.");
            });
            return;
        };

        // Upload the texture only when a newer result arrived.
        if self.last_frame_at != Some(result.completed_at) {
            let image = egui::ColorImage::from_rgb(
                [result.width as usize, result.height as usize],
                &result.pixels,
            );
            self.frame_texture =
                Some(ctx.load_texture("frame", image, egui::TextureOptions::LINEAR));
            self.last_frame_at = Some(result.completed_at);
        }

        let Some(texture) = &self.frame_texture else {
            return;
        };

        let available = ui.available_size();
        let frame_size = egui::vec2(result.width as f32, result.height as f32);
        let scale = (available.x / frame_size.x)
            .min(available.y * 0.75 / frame_size.y)
            .min(1.0)
            .max(0.05);
        let display_size = frame_size * scale;

        let response = ui.add(
            egui::Image::from_texture(texture).fit_to_exact_size(display_size),
        );
        let origin = response.rect.min;

        let painter = ui.painter_at(response.rect);
        for detection in &result.detections {
            let color = if detection.is_defect {
                egui::Color32::RED
            } else {
                egui::Color32::GREEN
            };
            let rect = egui::Rect::from_min_max(
                origin + egui::vec2(detection.bbox.x1 * scale, detection.bbox.y1 * scale),
                origin + egui::vec2(detection.bbox.x2 * scale, detection.bbox.y2 * scale),
            );
            painter.rect_stroke(rect, 0.0, egui::Stroke::new(2.0, color));
            painter.text(
                rect.left_top() + egui::vec2(2.0, -2.0),
                egui::Align2::LEFT_BOTTOM,
                format!("{} {:.0}%", detection.label, detection.confidence * 100.0),
                egui::FontId::proportional(12.0),
                color,
            );
        }

        ui.add_space(8.0);

        if let Some(verdict) = &result.verdict {
            let color = match verdict.status {
                Status::Ok => egui::Color32::LIGHT_GREEN,
                Status::Warning => egui::Color32::YELLOW,
                Status::Error => egui::Color32::LIGHT_RED,
            };
            ui.colored_label(color, &verdict.message);
        }

        for check in &result.resistor_checks {
            let color = match check.status {
                ResistorStatus::Ok => egui::Color32::LIGHT_GREEN,
                ResistorStatus::Unknown => egui::Color32::GRAY,
                ResistorStatus::Error => egui::Color32::LIGHT_RED,
            };
            ui.colored_label(color, &check.message);
        }
    }

    fn render_report_window(&mut self, ctx: &egui::Context) {
        let Some(report) = self.report_text.clone() else {
            return;
        };

        let mut open = true;
        egui::Window::new("Inspection report")
            .open(&mut open)
            .default_width(480.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    ui.monospace(&report);
                });
            });
        if !open {
            self.report_text = None;
        }
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(result) = self.app.latest_result() {
            self.latest = Some(result);
        }

        // Keep repainting while the worker publishes frames.
        if self.app.is_worker_running() {
            ctx.request_repaint();
        }

        egui::SidePanel::left("sidebar")
            .resizable(false)
            .default_width(240.0)
            .show(ctx, |ui| {
                self.render_sidebar(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Frame::none().inner_margin(12.0).show(ui, |ui| {
                self.render_frame_view(ui, ctx);
            });
        });

        self.render_report_window(ctx);
    }
}

/// Run the dashboard application
pub fn run_dashboard(app: InspectorApp, factory: PipelineFactory) -> Result<(), eframe::Error> {
    eframe::run_native(
        "PCB Inspector",
        DashboardApp::options(),
        Box::new(|_cc| Ok(Box::new(DashboardApp::new(app, factory)))),
    )
}
