// Prompt templates for the two analysis stages.

/// Stage 1 — skills extraction. Replace `{json_only}` and `{job_description}`.
pub const SKILLS_PROMPT_TEMPLATE: &str = r#"Analyze this job description as an expert technical recruiter and ATS specialist.
Explain every skill so that a recruiter without an engineering background understands it.

The JSON structure must be:
{
  "keySkills": [
    {
      "name": "Python",
      "importance": "required|preferred",
      "category": "language|framework|cloud|database|tool|practice|soft skill",
      "alternatives": ["skills a candidate could have instead"],
      "contextExplanation": "why this role needs the skill, in plain language",
      "relationships": [
        {
          "relatedSkillName": "Django",
          "relationshipExplanation": "how the two skills connect",
          "analogy": "an everyday analogy for the connection"
        }
      ]
    }
  ],
  "redFlags": ["unrealistic or contradictory requirements"],
  "suggestedCriteria": {
    "mustHave": ["screening criteria that are non-negotiable"],
    "niceToHave": ["criteria that strengthen a candidate"]
  }
}

Rules:
- "importance" is "required" only when the description says so (required, must have, minimum years); otherwise "preferred".
- Only relate skills that both appear in "keySkills".
- Use empty lists rather than omitting a field.

Job Description:
{job_description}

{json_only}"#;

/// Stage 2 — boolean search construction. Replace `{json_only}` and `{skills_json}`.
pub const BOOLEAN_PROMPT_TEMPLATE: &str = r#"You are an expert sourcer building Boolean search strings for LinkedIn and job boards.
Use ONLY the validated skills analysis below as your source.

Skills analysis:
{skills_json}

Build three search strings of decreasing breadth:
- "broad": maximum reach — title variations and core technologies joined generously with OR.
- "mid": balanced — required skills joined with AND, alternatives grouped with OR.
- "narrow": precise — every required skill, seniority terms, and NOT exclusions where useful.

The JSON structure must be:
{
  "booleanSearches": {
    "broad": {
      "searchString": "(\"Backend Engineer\" OR \"Python Developer\") AND (Python OR Django)",
      "explanation": "who this search finds and why",
      "construction": {
        "titleVariations": ["Backend Engineer", "Python Developer"],
        "coreTechnologies": ["Python"],
        "groupingLogic": [
          {"group": "(Python OR Django)", "reason": "why these terms are grouped", "expectedImpact": "effect on result volume"}
        ]
      }
    },
    "mid": { "...": "same structure" },
    "narrow": { "...": "same structure" }
  }
}

Escape every double quote inside a search string as \".

{json_only}"#;
