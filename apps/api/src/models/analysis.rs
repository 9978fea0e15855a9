//! Analysis data model — the typed shape every validated model response is coerced into.
//!
//! Serialized in camelCase: the host UI reads these names and the stored
//! last-result blob uses the same encoding.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Skills (stage 1)
// ────────────────────────────────────────────────────────────────────────────

/// Whether the job description treats a skill as a hard requirement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Required,
    #[default]
    Preferred,
}

/// How one skill connects to another, phrased for a non-technical recruiter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillRelationship {
    pub related_skill_name: String,
    pub relationship_explanation: String,
    pub analogy: String,
}

/// A single skill extracted from the JD. `alternatives` and `relationships`
/// are always present, possibly empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillEntry {
    pub name: String,
    pub importance: Importance,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub context_explanation: String,
    #[serde(default)]
    pub relationships: Vec<SkillRelationship>,
}

impl SkillEntry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            importance: Importance::default(),
            category: String::new(),
            alternatives: Vec::new(),
            context_explanation: String::new(),
            relationships: Vec::new(),
        }
    }
}

/// Screening criteria split by strictness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedCriteria {
    #[serde(default)]
    pub must_have: Vec<String>,
    #[serde(default)]
    pub nice_to_have: Vec<String>,
}

/// Validated output of the skills stage. Embedded verbatim in the boolean-search prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillsReport {
    pub key_skills: Vec<SkillEntry>,
    pub red_flags: Vec<String>,
    pub suggested_criteria: SuggestedCriteria,
}

// ────────────────────────────────────────────────────────────────────────────
// Boolean searches (stage 2)
// ────────────────────────────────────────────────────────────────────────────

/// Breadth level of a boolean search string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Broad,
    Mid,
    Narrow,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Broad, Tier::Mid, Tier::Narrow];

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Broad => "broad",
            Tier::Mid => "mid",
            Tier::Narrow => "narrow",
        }
    }

    /// Placeholder used when the model left this tier's search string out.
    pub fn sentinel(self) -> String {
        format!("No {} boolean string generated", self.as_str())
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupingRule {
    pub group: String,
    pub reason: String,
    pub expected_impact: String,
}

/// How a search string was assembled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConstruction {
    #[serde(default)]
    pub title_variations: Vec<String>,
    #[serde(default)]
    pub core_technologies: Vec<String>,
    #[serde(default)]
    pub grouping_logic: Vec<GroupingRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanSearchTier {
    /// Never empty: falls back to `Tier::sentinel`.
    pub search_string: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub construction: SearchConstruction,
}

impl BooleanSearchTier {
    /// An all-default tier carrying only its sentinel search string.
    pub fn placeholder(tier: Tier) -> Self {
        Self {
            search_string: tier.sentinel(),
            explanation: String::new(),
            construction: SearchConstruction::default(),
        }
    }
}

/// Exactly three tiers, one per breadth level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanSearches {
    pub broad: BooleanSearchTier,
    pub mid: BooleanSearchTier,
    pub narrow: BooleanSearchTier,
}

impl BooleanSearches {
    pub fn get(&self, tier: Tier) -> &BooleanSearchTier {
        match tier {
            Tier::Broad => &self.broad,
            Tier::Mid => &self.mid,
            Tier::Narrow => &self.narrow,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tier, &BooleanSearchTier)> {
        Tier::ALL.into_iter().map(move |tier| (tier, self.get(tier)))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Merged result + pipeline state
// ────────────────────────────────────────────────────────────────────────────

/// Output of one successful pipeline run. Immutable once produced; the
/// orchestrator hands it out behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub run_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub skills: Vec<SkillEntry>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub suggested_criteria: SuggestedCriteria,
    pub boolean_searches: BooleanSearches,
}

impl AnalysisResult {
    pub fn merge(run_id: Uuid, report: SkillsReport, boolean_searches: BooleanSearches) -> Self {
        Self {
            run_id,
            completed_at: Utc::now(),
            skills: report.key_skills,
            red_flags: report.red_flags,
            suggested_criteria: report.suggested_criteria,
            boolean_searches,
        }
    }
}

/// Externally observable progress of the analysis pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineStage {
    #[default]
    Idle,
    SkillsInFlight,
    BooleanInFlight,
    Complete,
    Failed,
}

impl PipelineStage {
    pub fn is_in_flight(self) -> bool {
        matches!(self, PipelineStage::SkillsInFlight | PipelineStage::BooleanInFlight)
    }
}

/// What the host UI reads when it opens: last input, last completed result, current stage.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub job_description: Option<String>,
    pub result: Option<std::sync::Arc<AnalysisResult>>,
    pub stage: PipelineStage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_stage_serializes_camel_case() {
        let json = serde_json::to_string(&PipelineStage::SkillsInFlight).unwrap();
        assert_eq!(json, r#""skillsInFlight""#);
        let json = serde_json::to_string(&PipelineStage::BooleanInFlight).unwrap();
        assert_eq!(json, r#""booleanInFlight""#);
    }

    #[test]
    fn test_importance_serde_lowercase() {
        let importance: Importance = serde_json::from_str(r#""required""#).unwrap();
        assert_eq!(importance, Importance::Required);
        assert_eq!(Importance::default(), Importance::Preferred);
    }

    #[test]
    fn test_tier_sentinel_is_tier_specific_and_nonempty() {
        let sentinels: Vec<String> = Tier::ALL.iter().map(|t| t.sentinel()).collect();
        assert_eq!(sentinels[0], "No broad boolean string generated");
        assert_ne!(sentinels[0], sentinels[1]);
        assert_ne!(sentinels[1], sentinels[2]);
    }

    #[test]
    fn test_boolean_searches_iterates_all_three_tiers_in_order() {
        let searches = BooleanSearches {
            broad: BooleanSearchTier::placeholder(Tier::Broad),
            mid: BooleanSearchTier::placeholder(Tier::Mid),
            narrow: BooleanSearchTier::placeholder(Tier::Narrow),
        };
        let tiers: Vec<Tier> = searches.iter().map(|(t, _)| t).collect();
        assert_eq!(tiers, Tier::ALL.to_vec());
        assert!(searches.iter().all(|(_, t)| !t.search_string.is_empty()));
    }

    #[test]
    fn test_analysis_result_survives_storage_encoding() {
        let report = SkillsReport {
            key_skills: vec![SkillEntry::named("Rust")],
            red_flags: vec!["Unpaid trial period".to_string()],
            suggested_criteria: SuggestedCriteria::default(),
        };
        let searches = BooleanSearches {
            broad: BooleanSearchTier::placeholder(Tier::Broad),
            mid: BooleanSearchTier::placeholder(Tier::Mid),
            narrow: BooleanSearchTier::placeholder(Tier::Narrow),
        };
        let result = AnalysisResult::merge(Uuid::new_v4(), report, searches);

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("booleanSearches").is_some());
        assert_eq!(json["skills"][0]["contextExplanation"], "");

        let recovered: AnalysisResult = serde_json::from_value(json).unwrap();
        assert_eq!(recovered, result);
    }
}
