//! Rendered summaries handed to certification/reporting collaborators.

use serde::{Deserialize, Serialize};

use crate::stats::StatsSnapshot;

/// A titled list of key/value properties describing one configured component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementData {
    /// Section title.
    pub title: String,
    /// Ordered `(name, value)` pairs.
    pub properties: Vec<(String, String)>,
}

impl ElementData {
    /// Creates an element without properties.
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            properties: vec![],
        }
    }

    /// Appends a property.
    pub fn with_property(mut self, name: &str, value: impl ToString) -> Self {
        self.properties.push((name.to_string(), value.to_string()));
        self
    }

    /// Value of the first property called `name`.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Summary of one anonymization run, the sink-facing output of the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymizationReport {
    /// Generalization levels of the chosen transformation.
    pub levels: Option<Vec<u32>>,
    /// Aggregated information loss of the chosen transformation.
    pub information_loss: Option<f64>,
    /// Differential-privacy score of the chosen transformation, if computed.
    pub score: Option<f64>,
    /// Whether the chosen transformation satisfies every criterion.
    pub anonymous: bool,
    /// Whether the search proved optimality (false when stopped by limits or when randomized).
    pub optimal: bool,
    /// Rendered privacy criteria in configuration order.
    pub criteria: Vec<ElementData>,
    /// Rendered information-loss metric.
    pub metric: ElementData,
    /// Rendered search configuration.
    pub search: ElementData,
    /// Engine counters at the end of the run.
    pub statistics: StatsSnapshot,
}

impl AnonymizationReport {
    /// Serializes the report to pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_properties() {
        let e = ElementData::new("Profitability")
            .with_property("Attacker model", "Prosecutor")
            .with_property("Adversary cost", 4.0);
        assert_eq!(e.property("Attacker model"), Some("Prosecutor"));
        assert_eq!(e.property("Adversary cost"), Some("4"));
        assert_eq!(e.property("missing"), None);
    }

    #[test]
    fn test_report_json() {
        let report = AnonymizationReport {
            levels: Some(vec![1, 0]),
            information_loss: Some(1.0),
            score: None,
            anonymous: true,
            optimal: true,
            criteria: vec![ElementData::new("Inclusion")],
            metric: ElementData::new("Height"),
            search: ElementData::new("Best-first search"),
            statistics: StatsSnapshot::default(),
        };
        let json = report.to_json().unwrap();
        assert!(json.contains("\"levels\""));
        assert!(json.contains("Height"));
    }
}
