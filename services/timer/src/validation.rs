//! Input validation utilities

/// Default countdown length in seconds
pub const DEFAULT_DURATION_SECS: i64 = 600;

/// Longest countdown a session may start with, in seconds
pub const MAX_DURATION_SECS: i64 = 7200;

/// Largest single extension, in minutes
pub const MAX_EXTENDED_MINUTES: i64 = 120;

/// Validate an access token and return it trimmed
pub fn validate_access_token(access_token: Option<&str>) -> Result<&str, String> {
    let token = access_token.map(str::trim).unwrap_or_default();

    if token.is_empty() {
        return Err("Access token required".to_string());
    }

    Ok(token)
}

/// Validate a requested start duration, applying the default when absent
pub fn validate_duration(duration: Option<i64>) -> Result<i32, String> {
    let duration = duration.unwrap_or(DEFAULT_DURATION_SECS);

    if !(1..=MAX_DURATION_SECS).contains(&duration) {
        return Err(format!(
            "Duration must be between 1 and {} seconds",
            MAX_DURATION_SECS
        ));
    }

    // Bounded above, cannot truncate.
    Ok(duration as i32)
}

/// Validate a requested extension length in minutes
pub fn validate_extended_minutes(minutes: Option<i64>) -> Result<i32, String> {
    let Some(minutes) = minutes else {
        return Err("Extended minutes required".to_string());
    };

    if !(1..=MAX_EXTENDED_MINUTES).contains(&minutes) {
        return Err(format!(
            "Extended minutes must be between 1 and {}",
            MAX_EXTENDED_MINUTES
        ));
    }

    Ok(minutes as i32)
}

/// Validate a member identifier required by the extension gate
pub fn validate_member_id(member_id: Option<&str>) -> Result<&str, String> {
    let member_id = member_id.map(str::trim).unwrap_or_default();

    if member_id.is_empty() {
        return Err("Member ID required".to_string());
    }

    Ok(member_id)
}
