pub mod handlers;

/// Categories a file can be filed under.
pub const FILE_CATEGORIES: &[&str] = &["resume", "cover_letter", "portfolio", "other"];

/// Upload size cap for the multipart route.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn normalize_category(raw: Option<&str>) -> Result<String, String> {
    let category = raw
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "resume".to_string());
    if FILE_CATEGORIES.contains(&category.as_str()) {
        Ok(category)
    } else {
        Err(format!(
            "Unknown file category '{category}'; expected one of {}",
            FILE_CATEGORIES.join(", ")
        ))
    }
}
