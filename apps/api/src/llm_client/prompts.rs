// Shared prompt fragments.
// Each module that needs LLM calls defines its own prompts.rs alongside it.

/// Appended to every extraction prompt whose reply is parsed as JSON.
pub const JSON_ONLY_INSTRUCTION: &str = "\
    Respond with a single JSON object only. \
    Do NOT include explanations or apologies outside the JSON object.";

/// Appended to prompts whose reply is inserted into an HTML email or page.
pub const HTML_FRAGMENT_INSTRUCTION: &str = "\
    Return an HTML fragment only (no <html>, <head> or <body> tags, no markdown fences).";

/// Fills `{name}` placeholders in a template. Unknown placeholders are left as-is.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |acc, (key, value)| {
            acc.replace(&format!("{{{key}}}"), value)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_replaces_every_occurrence() {
        let out = fill("{a} and {a} then {b} but not {c}", &[("a", "x"), ("b", "y")]);
        assert_eq!(out, "x and x then y but not {c}");
    }
}
