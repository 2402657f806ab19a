//! Area-based detection validation engine
//!
//! The decision core of the inspector: per-area component rules, detection
//! filtering, count validation, resistor marking checks, and session state
//! (captures and reporting).

pub mod filter;
pub mod resistor;
pub mod rules;
pub mod session;
pub mod verdict;

pub use filter::{filter_for_area, DefectRecord, FilterOutcome, DEFECT_CLASS_PREFIX};
pub use resistor::{
    decode_marking, DecodedMarking, ResistorKnowledgeBase, ResistorStatus, ResistorValidator,
    ResistorVerdict,
};
pub use rules::RuleTable;
pub use session::{AreaCapture, CaptureError, InspectionSession};
pub use verdict::{validate_area, Status, ValidationVerdict};
