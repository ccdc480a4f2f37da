//! Canonical shape of the model's verdict.
//!
//! Replies are relayed to the browser as-is; these types only describe what
//! the prompt asks for so drift can be detected and logged.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed per-category keys requested in the prompt, in prompt order.
pub const CATEGORY_KEYS: [&str; 5] = [
    "racism",
    "sexism",
    "homophobia",
    "religious_blasphemy",
    "parental_disapproval",
];

/// Paired offensiveness scores for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub ai_score: u8,
    pub potential_score: u8,
    pub reason: String,
}

/// Scores for a group the model chose to call out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinorityScore {
    pub group: String,
    #[serde(flatten)]
    pub score: CategoryScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub racism: CategoryScore,
    pub sexism: CategoryScore,
    pub homophobia: CategoryScore,
    pub religious_blasphemy: CategoryScore,
    pub parental_disapproval: CategoryScore,
    #[serde(default)]
    pub other_minorities: Vec<MinorityScore>,
    pub shaming_line: String,
    pub probability_beaten_up: u8,
    pub probability_cancelled: u8,
    pub history_summary: String,
    pub conversational_reception_score: u8,
    #[serde(default)]
    pub problematic_words: Vec<String>,
}

impl AnalysisReport {
    /// Describe how `value` departs from the canonical schema, if it does.
    pub fn drift(value: &Value) -> Option<String> {
        let report = match AnalysisReport::deserialize(value) {
            Ok(report) => report,
            Err(e) => return Some(e.to_string()),
        };
        report.range_violation()
    }

    fn range_violation(&self) -> Option<String> {
        let mut scores: Vec<(String, u8)> = vec![
            ("probability_beaten_up".into(), self.probability_beaten_up),
            ("probability_cancelled".into(), self.probability_cancelled),
            (
                "conversational_reception_score".into(),
                self.conversational_reception_score,
            ),
        ];
        for (key, category) in CATEGORY_KEYS.iter().zip(self.categories()) {
            scores.push((format!("{key}.ai_score"), category.ai_score));
            scores.push((format!("{key}.potential_score"), category.potential_score));
        }
        for minority in &self.other_minorities {
            scores.push((format!("{}.ai_score", minority.group), minority.score.ai_score));
            scores.push((
                format!("{}.potential_score", minority.group),
                minority.score.potential_score,
            ));
        }

        let out_of_range: Vec<String> = scores
            .into_iter()
            .filter(|(_, score)| *score > 100)
            .map(|(key, score)| format!("{key}={score}"))
            .collect();

        if out_of_range.is_empty() {
            None
        } else {
            Some(format!("scores above 100: {}", out_of_range.join(", ")))
        }
    }

    fn categories(&self) -> [&CategoryScore; 5] {
        [
            &self.racism,
            &self.sexism,
            &self.homophobia,
            &self.religious_blasphemy,
            &self.parental_disapproval,
        ]
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_report;
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_reply_has_no_drift() {
        let value = serde_json::to_value(sample_report()).unwrap();
        assert_eq!(AnalysisReport::drift(&value), None);
    }

    #[test]
    fn minority_score_is_flat() {
        let value = serde_json::to_value(sample_report()).unwrap();
        assert_eq!(value["other_minorities"][0]["group"], "Elderly");
        assert_eq!(value["other_minorities"][0]["ai_score"], 12);
    }

    #[test]
    fn problematic_words_are_optional() {
        let mut value = serde_json::to_value(sample_report()).unwrap();
        value.as_object_mut().unwrap().remove("problematic_words");
        assert_eq!(AnalysisReport::drift(&value), None);
    }

    #[test]
    fn missing_category_is_drift() {
        let mut value = serde_json::to_value(sample_report()).unwrap();
        value.as_object_mut().unwrap().remove("parental_disapproval");
        let drift = AnalysisReport::drift(&value).unwrap();
        assert!(drift.contains("parental_disapproval"));
    }

    #[test]
    fn legacy_field_name_is_drift() {
        let mut value = serde_json::to_value(sample_report()).unwrap();
        let obj = value.as_object_mut().unwrap();
        let parental = obj.remove("parental_disapproval").unwrap();
        obj.insert("probability_parental_disapproval".into(), parental);
        assert!(AnalysisReport::drift(&value).is_some());
    }

    #[test]
    fn score_above_100_is_drift() {
        let mut value = serde_json::to_value(sample_report()).unwrap();
        value["sexism"]["potential_score"] = json!(140);
        let drift = AnalysisReport::drift(&value).unwrap();
        assert!(drift.contains("sexism.potential_score=140"));
    }

    #[test]
    fn fractional_score_is_drift() {
        let mut value = serde_json::to_value(sample_report()).unwrap();
        value["probability_cancelled"] = json!(66.5);
        assert!(AnalysisReport::drift(&value).is_some());
    }
}
