use crate::llm_client::prompts::{fill, HTML_FRAGMENT_INSTRUCTION, JSON_ONLY_INSTRUCTION};

/// Resume analysis prompt. Replace `{resume_text}` before sending.
pub const RESUME_ANALYSIS_TEMPLATE: &str = r#"Analyze the following resume and extract key information.

RESUME:
{resume_text}

Return a JSON object with these fields:
- "skills": array of skill names found in the resume
- "experience": total years of professional experience as a number, if it can be determined
- "education": education details as a short string (degree, field, institution)
- "jobHistory": array of {"title": string, "company": string} for previous roles, newest first
- "assessment": a brief assessment of the candidate's qualifications (2-3 sentences)
"#;

/// Applicant summary prompt.
pub const APPLICANT_SUMMARY_TEMPLATE: &str = r#"Generate a comprehensive summary for the following job applicant:

Name: {name}
Email: {email}
Phone: {phone}
Location: {location}
Position Applied For: {position}
Skills: {skills}
LinkedIn: {linkedin}
Portfolio: {portfolio}

The summary must include:
- A header with the applicant's name
- Sections for contact information, skills, and qualifications
- A brief assessment of their fit for the position
- Styling with Tailwind CSS utility classes
"#;

/// Applicant status email prompt.
pub const STATUS_EMAIL_TEMPLATE: &str = r#"Write a professional email to an applicant named {name}
regarding their application for the {position} position.
The application is currently in the "{stage}" stage.
{custom_message}

The email should be professional, concise, and provide clear next steps.
Format the email with HTML tags (<p>, <h2>, etc.) suitable for an email client.
"#;

pub fn resume_analysis_prompt(resume_text: &str) -> String {
    format!(
        "{}\n{}",
        fill(RESUME_ANALYSIS_TEMPLATE, &[("resume_text", resume_text)]),
        JSON_ONLY_INSTRUCTION
    )
}

pub struct SummaryPromptFields<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub location: Option<&'a str>,
    pub position: Option<&'a str>,
    pub skills: &'a [String],
    pub linkedin: Option<&'a str>,
    pub portfolio: Option<&'a str>,
}

pub fn applicant_summary_prompt(fields: &SummaryPromptFields<'_>) -> String {
    let or_missing = |v: Option<&str>| v.filter(|s| !s.trim().is_empty()).unwrap_or("Not provided").to_string();
    let skills = if fields.skills.is_empty() {
        "None specified".to_string()
    } else {
        fields.skills.join(", ")
    };
    let phone = or_missing(fields.phone);
    let location = or_missing(fields.location);
    let linkedin = or_missing(fields.linkedin);
    let portfolio = or_missing(fields.portfolio);
    let prompt = fill(
        APPLICANT_SUMMARY_TEMPLATE,
        &[
            ("name", fields.name),
            ("email", fields.email),
            ("phone", phone.as_str()),
            ("location", location.as_str()),
            ("position", fields.position.unwrap_or("Unknown position")),
            ("skills", skills.as_str()),
            ("linkedin", linkedin.as_str()),
            ("portfolio", portfolio.as_str()),
        ],
    );
    format!("{prompt}\n{HTML_FRAGMENT_INSTRUCTION}")
}

pub fn status_email_prompt(
    name: &str,
    position: &str,
    stage: &str,
    custom_message: Option<&str>,
) -> String {
    let custom = custom_message
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| format!("Include this custom message: {m}"))
        .unwrap_or_default();
    let prompt = fill(
        STATUS_EMAIL_TEMPLATE,
        &[
            ("name", name),
            ("position", position),
            ("stage", stage),
            ("custom_message", custom.as_str()),
        ],
    );
    format!("{prompt}\n{HTML_FRAGMENT_INSTRUCTION}")
}
