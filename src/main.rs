//! PCB Inspector - Area-based PCB component inspection
//!
//! Validates detected components against per-area assembly rules and checks
//! resistor markings read by OCR against expected values.

mod app;
mod capture;
mod config;
mod dashboard;
mod inspection;
mod shared;
mod vision;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::InspectorApp;
use crate::capture::{FolderSource, FrameSource};
use crate::config::AppConfig;
use crate::inspection::{InspectionSession, ResistorKnowledgeBase, RuleTable};
use crate::vision::{OnnxMarkingReader, VisionPipeline, YoloDetector};

/// PCB Inspector - area-based component validation
#[derive(Parser, Debug)]
#[command(name = "pcb-inspector")]
#[command(about = "Validates PCB component placement and resistor markings per inspection area")]
struct Args {
    /// Path to the configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Camera device index, overriding the configured one
    #[arg(short, long)]
    camera: Option<i32>,

    /// Play back still images from this directory instead of a camera
    #[arg(long)]
    playback: Option<PathBuf>,

    /// TOML rule file overriding the builtin area rules
    #[arg(long)]
    rules: Option<PathBuf>,

    /// List the defined inspection areas and their expected components
    #[arg(long)]
    list_areas: bool,

    /// Probe camera indices and exit
    #[cfg(feature = "camera")]
    #[arg(long)]
    list_cameras: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    #[cfg(feature = "camera")]
    if args.list_cameras {
        let cameras = capture::probe_cameras(8);
        if cameras.is_empty() {
            println!("No cameras detected");
        } else {
            println!("Available cameras:");
            for camera in &cameras {
                println!("  [{}] {}x{}", camera.index, camera.width, camera.height);
            }
        }
        return Ok(());
    }

    let mut config = config::load_or_default(args.config.as_deref());
    if let Some(index) = args.camera {
        config.camera.index = index;
    }
    if let Some(playback) = args.playback {
        config.camera.playback_dir = Some(playback);
    }
    if let Some(rules) = args.rules {
        config.inspection.rules_file = Some(rules);
    }

    let rules = match &config.inspection.rules_file {
        Some(path) => RuleTable::load(path)
            .with_context(|| format!("Failed to load rule file {:?}", path))?,
        None => RuleTable::builtin(),
    };

    if args.list_areas {
        for area in rules.area_names() {
            println!("{}", area);
            for line in rules.component_listing(&area).lines() {
                println!("  {}", line);
            }
        }
        return Ok(());
    }

    info!("PCB Inspector starting");

    let session = InspectionSession::new(rules, ResistorKnowledgeBase::builtin());
    let inspector = InspectorApp::new(config, session);

    let factory: dashboard::PipelineFactory = Box::new(build_pipeline);
    if let Err(e) = dashboard::run_dashboard(inspector, factory) {
        tracing::error!("Dashboard error: {}", e);
    }

    info!("PCB Inspector shutdown complete");
    Ok(())
}

/// Build the frame source and vision pipeline from the current config.
///
/// Called on every start action so configuration edits and replugged
/// cameras take effect without restarting the application.
fn build_pipeline(config: &AppConfig) -> Result<(Box<dyn FrameSource>, VisionPipeline)> {
    let source: Box<dyn FrameSource> = match &config.camera.playback_dir {
        Some(dir) => Box::new(FolderSource::new(dir, config.camera.loop_playback)?),
        None => open_camera(config)?,
    };

    let detector = YoloDetector::new(
        &config.detection.model_path,
        &config.detection.class_names_path,
        config.detection.input_size,
        config.detection.confidence_threshold,
    )?;

    let reader = if config.ocr.enabled {
        Some(Box::new(OnnxMarkingReader::new(
            &config.ocr.model_path,
            &config.ocr.dict_path,
        )?) as Box<dyn vision::MarkingReader>)
    } else {
        None
    };

    let pipeline = VisionPipeline::new(Box::new(detector), reader, config.ocr.crop_margin);
    Ok((source, pipeline))
}

#[cfg(feature = "camera")]
fn open_camera(config: &AppConfig) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(capture::CameraSource::open(config.camera.index)?))
}

#[cfg(not(feature = "camera"))]
fn open_camera(_config: &AppConfig) -> Result<Box<dyn FrameSource>> {
    anyhow::bail!(
        "Built without camera support; configure a playback directory or rebuild with --features camera"
    )
}
