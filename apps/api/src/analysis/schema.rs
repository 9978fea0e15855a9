//! Schema validation — coerces parsed model JSON into the typed analysis model.
//!
//! Two tiers of strictness: a missing or mistyped root key fails with
//! `MissingRequiredField`; every field below the root is optional and falls
//! back to a default (empty list, empty string, or a tier sentinel).

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::models::analysis::{
    BooleanSearchTier, BooleanSearches, GroupingRule, Importance, SearchConstruction,
    SkillEntry, SkillRelationship, SkillsReport, SuggestedCriteria, Tier,
};

pub const SKILLS_ROOT: &str = "keySkills";
pub const SEARCHES_ROOT: &str = "booleanSearches";

/// The response shape expected from a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Skills,
    BooleanSearches,
}

impl Shape {
    pub fn root_key(self) -> &'static str {
        match self {
            Shape::Skills => SKILLS_ROOT,
            Shape::BooleanSearches => SEARCHES_ROOT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Validated {
    Skills(SkillsReport),
    BooleanSearches(BooleanSearches),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingRequiredField(String),
}

impl Shape {
    fn missing(self) -> ValidationError {
        ValidationError::MissingRequiredField(self.root_key().to_string())
    }
}

impl Validated {
    pub fn into_skills(self) -> Result<SkillsReport, ValidationError> {
        match self {
            Validated::Skills(report) => Ok(report),
            Validated::BooleanSearches(_) => Err(Shape::Skills.missing()),
        }
    }

    pub fn into_boolean_searches(self) -> Result<BooleanSearches, ValidationError> {
        match self {
            Validated::BooleanSearches(searches) => Ok(searches),
            Validated::Skills(_) => Err(Shape::BooleanSearches.missing()),
        }
    }
}

pub fn validate(parsed: &Value, shape: Shape) -> Result<Validated, ValidationError> {
    match shape {
        Shape::Skills => validate_skills(parsed).map(Validated::Skills),
        Shape::BooleanSearches => validate_boolean_searches(parsed).map(Validated::BooleanSearches),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Skills
// ────────────────────────────────────────────────────────────────────────────

pub fn validate_skills(parsed: &Value) -> Result<SkillsReport, ValidationError> {
    let missing = || Shape::Skills.missing();
    let root = parsed.as_object().ok_or_else(missing)?;
    let items = root
        .get(Shape::Skills.root_key())
        .and_then(Value::as_array)
        .ok_or_else(missing)?;

    let mut key_skills = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match item {
            Value::String(name) if !name.trim().is_empty() => {
                key_skills.push(SkillEntry::named(name.trim()));
            }
            Value::Object(obj) => match parse_skill(obj) {
                Some(skill) => key_skills.push(skill),
                None => warn!("Dropping keySkills[{index}]: no skill name"),
            },
            other => warn!("Dropping keySkills[{index}]: unexpected {}", json_type(other)),
        }
    }

    let suggested_criteria = root
        .get("suggestedCriteria")
        .and_then(Value::as_object)
        .map(|obj| SuggestedCriteria {
            must_have: string_list(obj.get("mustHave")),
            nice_to_have: string_list(obj.get("niceToHave")),
        })
        .unwrap_or_default();

    Ok(SkillsReport {
        key_skills,
        red_flags: string_list(root.get("redFlags")),
        suggested_criteria,
    })
}

fn parse_skill(obj: &Map<String, Value>) -> Option<SkillEntry> {
    let name = text(obj, &["name", "skill"]);
    if name.is_empty() {
        return None;
    }

    let relationships = obj
        .get("relationships")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|rel| SkillRelationship {
                    related_skill_name: text(rel, &["relatedSkillName", "relatedSkill", "skill"]),
                    relationship_explanation: text(
                        rel,
                        &["relationshipExplanation", "relationship", "explanation"],
                    ),
                    analogy: text(rel, &["analogy"]),
                })
                .filter(|rel| !rel.related_skill_name.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Some(SkillEntry {
        name,
        importance: parse_importance(obj.get("importance")),
        category: text(obj, &["category"]),
        alternatives: string_list(obj.get("alternatives")),
        context_explanation: text(obj, &["contextExplanation", "context"]),
        relationships,
    })
}

fn parse_importance(value: Option<&Value>) -> Importance {
    let Some(raw) = value.and_then(Value::as_str) else {
        return Importance::Preferred;
    };
    match raw.trim().to_lowercase().as_str() {
        "required" | "must have" | "must-have" | "mandatory" | "essential" => Importance::Required,
        _ => Importance::Preferred,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Boolean searches
// ────────────────────────────────────────────────────────────────────────────

pub fn validate_boolean_searches(parsed: &Value) -> Result<BooleanSearches, ValidationError> {
    let missing = || Shape::BooleanSearches.missing();
    let tiers = parsed
        .as_object()
        .and_then(|root| root.get(Shape::BooleanSearches.root_key()))
        .and_then(Value::as_object)
        .ok_or_else(missing)?;

    Ok(BooleanSearches {
        broad: parse_tier(Tier::Broad, tier_value(tiers, Tier::Broad)),
        mid: parse_tier(Tier::Mid, tier_value(tiers, Tier::Mid)),
        narrow: parse_tier(Tier::Narrow, tier_value(tiers, Tier::Narrow)),
    })
}

fn tier_value(tiers: &Map<String, Value>, tier: Tier) -> Option<&Value> {
    match tier {
        Tier::Mid => tiers.get("mid").or_else(|| tiers.get("medium")),
        _ => tiers.get(tier.as_str()),
    }
}

fn parse_tier(tier: Tier, value: Option<&Value>) -> BooleanSearchTier {
    let parsed = match value {
        Some(Value::Object(obj)) => {
            let construction = obj
                .get("construction")
                .and_then(Value::as_object)
                .map(parse_construction)
                .unwrap_or_default();
            BooleanSearchTier {
                search_string: text(obj, &["searchString", "booleanString", "string"]),
                explanation: text(obj, &["explanation"]),
                construction,
            }
        }
        // A bare string is taken as the search string itself.
        Some(Value::String(s)) => BooleanSearchTier {
            search_string: s.trim().to_string(),
            ..BooleanSearchTier::placeholder(tier)
        },
        _ => {
            warn!("Boolean search tier '{tier}' missing from model output, using placeholder");
            return BooleanSearchTier::placeholder(tier);
        }
    };

    if parsed.search_string.is_empty() {
        warn!("Boolean search tier '{tier}' has no search string, using sentinel");
        return BooleanSearchTier {
            search_string: tier.sentinel(),
            ..parsed
        };
    }
    parsed
}

fn parse_construction(obj: &Map<String, Value>) -> SearchConstruction {
    let grouping_logic = obj
        .get("groupingLogic")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(rule) => Some(GroupingRule {
                        group: text(rule, &["group"]),
                        reason: text(rule, &["reason"]),
                        expected_impact: text(rule, &["expectedImpact", "impact"]),
                    }),
                    Value::String(group) => Some(GroupingRule {
                        group: group.trim().to_string(),
                        ..GroupingRule::default()
                    }),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    SearchConstruction {
        title_variations: string_list(obj.get("titleVariations")),
        core_technologies: string_list(obj.get("coreTechnologies")),
        grouping_logic,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Field helpers
// ────────────────────────────────────────────────────────────────────────────

/// First non-empty scalar among `keys`, as trimmed text. Empty string if none.
fn text(obj: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| match obj.get(*key)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

/// A list of non-empty strings. A single string counts as a one-element list.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "empty string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
