// Shared prompt fragments.
// Each pipeline that calls the model defines its own prompts.rs alongside it.

/// Appended to every prompt: the endpoint has no system role, so the
/// JSON-only contract travels in the user text.
pub const JSON_ONLY_INSTRUCTION: &str = "Return ONLY a raw JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include any text outside the JSON object. \
    Do NOT include explanations or apologies.";
