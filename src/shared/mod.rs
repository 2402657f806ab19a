//! Shared state and messaging between the dashboard and the worker
//!
//! This module provides thread-safe shared state and the result handoff
//! used between the dashboard UI and the inspection worker thread.

pub mod messages;
pub mod state;

pub use messages::{result_slot, AnnotatedDetection, FrameResult, ResultSlot, WorkerCommand};
pub use state::{CaptureCommand, RuntimeState, SharedAppState};
