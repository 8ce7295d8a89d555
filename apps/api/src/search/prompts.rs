use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;

/// Search interpretation prompt. Replace `{query}` before sending.
pub const QUERY_INTERPRETATION_TEMPLATE: &str = r#"You are helping a recruiter search a database of job applicants.
Extract structured search criteria from the following natural language query:

"{query}"

Return a JSON object with these fields (omit any field the query does not mention):
- "skills": array of skill names, e.g. ["React", "TypeScript"]
- "experience": minimum years of experience as a number, e.g. 3
- "education": required education level as a string, e.g. "Bachelor's degree"
- "jobTitles": array of job titles, e.g. ["Frontend Developer"]
"#;

pub fn query_interpretation_prompt(query: &str) -> String {
    format!(
        "{}\n{}",
        crate::llm_client::prompts::fill(QUERY_INTERPRETATION_TEMPLATE, &[("query", query)]),
        JSON_ONLY_INSTRUCTION
    )
}
