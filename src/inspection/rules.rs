//! Per-area component rule table
//!
//! Each inspection area carries a declarative list of rule entries in the
//! `"Component: count"` form authored alongside the detector's class labels.
//! The table normalizes those entries into component -> expected-count maps.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Rule table mapping area names to expected component counts.
///
/// Constructed once at startup and shared by reference; unknown areas are
/// simply unconstrained and yield an empty mapping.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: HashMap<String, HashMap<String, u32>>,
}

/// On-disk representation for a user-provided rule file (TOML).
#[derive(Debug, Deserialize)]
struct RuleFile {
    areas: HashMap<String, Vec<String>>,
}

impl RuleTable {
    /// Build a rule table from raw `"Component: count"` entries per area.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<S>)>,
        S: Into<String>,
    {
        let rules = entries
            .into_iter()
            .map(|(area, raw)| {
                let raw: Vec<String> = raw.into_iter().map(Into::into).collect();
                (area.into(), parse_rule_entries(&raw))
            })
            .collect();
        Self { rules }
    }

    /// The built-in rule set for the seven board areas.
    pub fn builtin() -> Self {
        Self::from_entries([
            (
                "Area 1",
                vec![
                    "Dioda: 2",
                    "Resistor: 2",
                    "Oscillator: 1",
                    "IC: 1",
                    "Connector: 1",
                ],
            ),
            ("Area 2", vec!["IC:1", "Capasitor: 1"]),
            (
                "Area 3",
                vec![
                    "IC: 2",
                    "Button: 1",
                    "LED: 1",
                    "Capasitor: 2",
                    "Resistor: 1",
                    "Jumper: 1",
                ],
            ),
            ("Area 4", vec!["Resistor: 2", "Capasitor: 3"]),
            (
                "Area 5",
                vec![
                    "Inductor: 1",
                    "Capasitor: 1",
                    "Transistor: 1",
                    "Resistor: 1",
                ],
            ),
            (
                "Area 6",
                vec!["Dioda: 1", "Resistor: 4", "Switch: 1", "Jumper: 1"],
            ),
            ("Area 7", vec!["Buzzer: 1", "Regulator: 1"]),
        ])
    }

    /// Load a rule table from a TOML file.
    ///
    /// ```toml
    /// [areas]
    /// "Area 1" = ["Resistor: 2", "IC: 1"]
    /// ```
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rule file {:?}", path))?;
        let file: RuleFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse rule file {:?}", path))?;
        debug!("Loaded {} area rules from {:?}", file.areas.len(), path);
        Ok(Self::from_entries(
            file.areas.into_iter().map(|(a, e)| (a, e)),
        ))
    }

    /// Expected component counts for an area. Empty for unknown areas.
    pub fn rules_for(&self, area: &str) -> HashMap<String, u32> {
        self.rules.get(area).cloned().unwrap_or_default()
    }

    /// Whether the table defines any rule for this area.
    pub fn has_area(&self, area: &str) -> bool {
        self.rules
            .get(area)
            .map(|r| !r.is_empty())
            .unwrap_or(false)
    }

    /// All area names, sorted for stable display.
    pub fn area_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rules.keys().cloned().collect();
        names.sort();
        names
    }

    /// Human-readable expected-component listing, sorted by component name.
    pub fn component_listing(&self, area: &str) -> String {
        let rules = self.rules_for(area);
        if rules.is_empty() {
            return "No components defined for this area".to_string();
        }

        let mut components: Vec<(&String, &u32)> = rules.iter().collect();
        components.sort_by(|a, b| a.0.cmp(b.0));

        components
            .iter()
            .map(|(component, count)| format!("• {}: {}", component, count))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Normalize raw rule entries into a component -> count map.
///
/// Entries look like `"Resistor: 2"` or `"IC:1"`; the split happens on the
/// first colon and both sides are trimmed. Entries without a colon or with an
/// unparseable count are skipped.
fn parse_rule_entries(entries: &[String]) -> HashMap<String, u32> {
    let mut parsed = HashMap::new();

    for entry in entries {
        let Some((component, count)) = entry.split_once(':') else {
            warn!("Skipping rule entry without a colon: {:?}", entry);
            continue;
        };

        match count.trim().parse::<u32>() {
            Ok(count) => {
                parsed.insert(component.trim().to_string(), count);
            }
            Err(_) => warn!("Skipping rule entry with invalid count: {:?}", entry),
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_and_without_space() {
        let entries = vec!["IC:1".to_string(), "Capasitor: 3".to_string()];
        let parsed = parse_rule_entries(&entries);

        assert_eq!(parsed.get("IC"), Some(&1));
        assert_eq!(parsed.get("Capasitor"), Some(&3));
    }

    #[test]
    fn test_parse_skips_entries_without_colon() {
        let entries = vec!["Resistor 2".to_string(), "LED: 1".to_string()];
        let parsed = parse_rule_entries(&entries);

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.get("LED"), Some(&1));
    }

    #[test]
    fn test_parse_skips_invalid_counts() {
        let entries = vec!["Resistor: two".to_string()];
        assert!(parse_rule_entries(&entries).is_empty());
    }

    #[test]
    fn test_unknown_area_is_unconstrained() {
        let table = RuleTable::builtin();
        assert!(table.rules_for("Area 99").is_empty());
        assert!(!table.has_area("Area 99"));
    }

    #[test]
    fn test_builtin_area_4() {
        let table = RuleTable::builtin();
        let rules = table.rules_for("Area 4");

        assert_eq!(rules.get("Resistor"), Some(&2));
        assert_eq!(rules.get("Capasitor"), Some(&3));
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn test_listing_is_sorted() {
        let table = RuleTable::from_entries([("Area X", vec!["Zener: 1", "Button: 2"])]);
        let listing = table.component_listing("Area X");

        assert_eq!(listing, "• Button: 2\n• Zener: 1");
    }

    #[test]
    fn test_listing_for_unknown_area() {
        let table = RuleTable::builtin();
        assert_eq!(
            table.component_listing("Area 42"),
            "No components defined for this area"
        );
    }

    #[test]
    fn test_area_names_sorted() {
        let table = RuleTable::builtin();
        let names = table.area_names();

        assert_eq!(names.len(), 7);
        assert_eq!(names[0], "Area 1");
        assert_eq!(names[6], "Area 7");
    }

    #[test]
    fn test_load_from_toml() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[areas]").unwrap();
        writeln!(file, "\"Area 1\" = [\"Resistor: 1\", \"IC:2\"]").unwrap();

        let table = RuleTable::load(file.path()).unwrap();
        let rules = table.rules_for("Area 1");
        assert_eq!(rules.get("Resistor"), Some(&1));
        assert_eq!(rules.get("IC"), Some(&2));
    }
}
