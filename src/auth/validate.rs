/// Validate a username: 2-50 chars, letters, digits and underscore only.
pub fn validate_username(username: &str) -> Option<String> {
    let trimmed = username.trim();
    let len = trimmed.chars().count();
    if len == 0 {
        return Some("Username is required".to_string());
    }
    if len < 2 {
        return Some("Username must be at least 2 characters".to_string());
    }
    if len > 50 {
        return Some("Username must be at most 50 characters".to_string());
    }
    if !trimmed.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Some("Username may only contain letters, numbers, and underscores".to_string());
    }
    None
}

pub fn validate_password(password: &str) -> Option<String> {
    if password.is_empty() {
        return Some("Password is required".to_string());
    }
    if password.chars().count() < 8 {
        return Some("Password must be at least 8 characters".to_string());
    }
    None
}

/// Validate a required text field with a max length (in characters).
pub fn validate_required(value: &str, field_name: &str, max_len: usize) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Some(format!("{field_name} is required"));
    }
    if trimmed.chars().count() > max_len {
        return Some(format!("{field_name} must be at most {max_len} characters"));
    }
    None
}

/// Validate an optional `#rrggbb` color.
pub fn validate_color(color: Option<&str>) -> Option<String> {
    let color = color?;
    let valid = color
        .strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()));
    (!valid).then(|| format!("Color '{color}' must look like #rrggbb"))
}
