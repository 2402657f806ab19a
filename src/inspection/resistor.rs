//! Resistor marking decode and validation
//!
//! Decodes SMD resistor marking codes (3-digit, 4-digit and R-notation) into
//! resistance values and checks decoded markings against the per-area
//! expected-marking table.

use std::collections::HashMap;

/// Result of decoding a marking string.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMarking {
    /// Resistance in ohms, `None` when the marking is undecodable.
    pub ohms: Option<f64>,
    /// Human-readable value, `"Unknown"` when undecodable.
    pub display: String,
    /// The normalized marking that was decoded.
    pub marking: String,
}

/// Decode a cleaned alphanumeric marking into a resistance value.
///
/// Rules in order, first match wins:
/// 1. 4 digits: first 3 = base, 4th = power-of-ten multiplier.
/// 2. 3 digits: first 2 = base, 3rd = multiplier.
/// 3. Leading `R` with a decimal remainder: remainder / 10 ohms.
/// 4. Anything else is undecodable.
pub fn decode_marking(marking: &str) -> DecodedMarking {
    let marking = marking.trim().to_uppercase();

    let ohms = if marking.len() == 4 && marking.chars().all(|c| c.is_ascii_digit()) {
        let base: f64 = marking[..3].parse().unwrap_or(0.0);
        let multiplier: u32 = marking[3..].parse().unwrap_or(0);
        Some(base * 10f64.powi(multiplier as i32))
    } else if marking.len() == 3 && marking.chars().all(|c| c.is_ascii_digit()) {
        let base: f64 = marking[..2].parse().unwrap_or(0.0);
        let multiplier: u32 = marking[2..].parse().unwrap_or(0);
        Some(base * 10f64.powi(multiplier as i32))
    } else if marking.starts_with('R') && marking.len() > 1 {
        marking[1..].parse::<f64>().ok().map(|value| value / 10.0)
    } else {
        None
    };

    let display = match ohms {
        Some(value) => format_resistance(value),
        None => "Unknown".to_string(),
    };

    DecodedMarking {
        ohms,
        display,
        marking,
    }
}

/// Format a resistance value with the usual k/M prefixes.
pub fn format_resistance(ohms: f64) -> String {
    if ohms >= 1_000_000.0 {
        format!("{:.1}MΩ", ohms / 1_000_000.0)
    } else if ohms >= 1_000.0 {
        format!("{:.1}kΩ", ohms / 1_000.0)
    } else {
        format!("{:.1}Ω", ohms)
    }
}

/// Expected resistors for one area: markings and their board positions.
///
/// The designator list may be shorter than the marking list; indices past its
/// end resolve to an unknown position.
#[derive(Debug, Clone)]
pub struct ResistorAreaEntry {
    pub markings: Vec<String>,
    pub designators: Vec<String>,
}

impl ResistorAreaEntry {
    pub fn new<S: Into<String>>(markings: Vec<S>, designators: Vec<S>) -> Self {
        Self {
            markings: markings.into_iter().map(Into::into).collect(),
            designators: designators.into_iter().map(Into::into).collect(),
        }
    }

    /// Designator at an index in the marking list, `"?"` when out of range.
    pub fn designator_at(&self, index: usize) -> String {
        self.designators
            .get(index)
            .map(|d| d.trim().to_string())
            .unwrap_or_else(|| "?".to_string())
    }
}

/// Per-area expected resistor markings and designators.
#[derive(Debug, Clone)]
pub struct ResistorKnowledgeBase {
    entries: HashMap<String, ResistorAreaEntry>,
}

impl ResistorKnowledgeBase {
    pub fn new(entries: HashMap<String, ResistorAreaEntry>) -> Self {
        Self { entries }
    }

    /// Built-in expectations for the three areas carrying checked resistors.
    pub fn builtin() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            "Area 4".to_string(),
            ResistorAreaEntry::new(vec!["1003", "1003"], vec!["R53", "R54"]),
        );
        entries.insert(
            "Area 5".to_string(),
            ResistorAreaEntry::new(vec!["1001"], vec!["R32"]),
        );
        entries.insert(
            "Area 6".to_string(),
            ResistorAreaEntry::new(
                vec!["1002", "133", "2002", "3003"],
                vec!["R42", "R43", "R44", "R41"],
            ),
        );
        Self { entries }
    }

    /// Expected markings for an area. `None` when the area has no entry,
    /// which is distinct from an area with an empty list.
    pub fn expected_for(&self, area: &str) -> Option<&ResistorAreaEntry> {
        self.entries.get(area)
    }

    /// Summary of expected resistors, grouped by marking in encounter order.
    pub fn summarize(&self, area: &str) -> String {
        let Some(entry) = self.entries.get(area) else {
            return "No resistor data for this area".to_string();
        };

        let mut summary = format!("Expected resistors in {}:\n", area);
        summary.push_str(&"=".repeat(40));
        summary.push('\n');

        let mut seen: Vec<&str> = Vec::new();
        for marking in &entry.markings {
            if seen.contains(&marking.as_str()) {
                continue;
            }
            seen.push(marking);

            let decoded = decode_marking(marking);
            let indices: Vec<usize> = entry
                .markings
                .iter()
                .enumerate()
                .filter(|(_, m)| *m == marking)
                .map(|(i, _)| i)
                .collect();
            let positions: Vec<String> =
                indices.iter().map(|&i| entry.designator_at(i)).collect();

            summary.push_str(&format!(
                "• {} ({}): {}x\n",
                marking,
                decoded.display,
                indices.len()
            ));
            summary.push_str(&format!("  Positions: {}\n", positions.join(", ")));
        }

        summary
    }
}

/// Outcome of checking one decoded marking against an area's expectations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResistorStatus {
    /// Marking matches an expected entry.
    Ok,
    /// Area has no entry in the knowledge base; no judgment possible.
    Unknown,
    /// Marking unreadable or not among the expected entries.
    Error,
}

/// Verdict for a single resistor read.
#[derive(Debug, Clone)]
pub struct ResistorVerdict {
    pub status: ResistorStatus,
    pub message: String,
    /// Board position of the matched entry, when the marking matched.
    pub designator: Option<String>,
    pub decoded: DecodedMarking,
}

/// Validates OCR-read resistor markings against the knowledge base.
#[derive(Debug, Clone)]
pub struct ResistorValidator {
    knowledge: ResistorKnowledgeBase,
}

impl ResistorValidator {
    pub fn new(knowledge: ResistorKnowledgeBase) -> Self {
        Self { knowledge }
    }

    pub fn knowledge(&self) -> &ResistorKnowledgeBase {
        &self.knowledge
    }

    /// Check a cleaned marking string against the area's expected list.
    pub fn validate(&self, area: &str, marking: &str) -> ResistorVerdict {
        if marking.is_empty() {
            return ResistorVerdict {
                status: ResistorStatus::Error,
                message: "OCR failed to read marking".to_string(),
                designator: None,
                decoded: decode_marking(marking),
            };
        }

        let decoded = decode_marking(marking);

        let Some(entry) = self.knowledge.expected_for(area) else {
            return ResistorVerdict {
                status: ResistorStatus::Unknown,
                message: format!("{} has no resistor expectations defined", area),
                designator: None,
                decoded,
            };
        };

        // First matching index resolves the designator.
        if let Some(index) = entry.markings.iter().position(|m| m == &decoded.marking) {
            let designator = entry.designator_at(index);
            return ResistorVerdict {
                status: ResistorStatus::Ok,
                message: format!("{} = {} ({})", decoded.marking, decoded.display, designator),
                designator: Some(designator),
                decoded,
            };
        }

        let mut distinct: Vec<&str> = Vec::new();
        for m in &entry.markings {
            if !distinct.contains(&m.as_str()) {
                distinct.push(m);
            }
        }

        ResistorVerdict {
            status: ResistorStatus::Error,
            message: format!(
                "Wrong: {} ({}), expected: {}",
                decoded.marking,
                decoded.display,
                distinct.join(", ")
            ),
            designator: None,
            decoded,
        }
    }
}
