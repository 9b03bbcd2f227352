/// Channel name templating and control-panel input validation.
///
/// Discord caps channel names at 100 characters; all truncation here is
/// char-boundary safe.
const MAX_CHANNEL_NAME: usize = 100;

pub const USERNAME_PLACEHOLDER: &str = "{username}";

/// Substitute `{username}` in a guild's name template and cap the length.
pub fn apply_name_template(template: &str, username: &str) -> String {
    truncate(&template.replace(USERNAME_PLACEHOLDER, username))
}

/// Name for the paired text channel.
pub fn side_channel_name(username: &str) -> String {
    truncate(&format!("💬 {username}"))
}

fn truncate(name: &str) -> String {
    name.chars().take(MAX_CHANNEL_NAME).collect()
}

/// Validate a rename request (1-100 chars after trimming).
pub fn validate_rename(name: &str) -> Result<String, &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name cannot be empty.");
    }
    if trimmed.chars().count() > MAX_CHANNEL_NAME {
        return Err("Name must be 1-100 characters.");
    }
    Ok(trimmed.to_string())
}

/// Validate a user limit (0-99; 0 = unlimited).
pub fn validate_limit(value: i64) -> Result<u32, &'static str> {
    if !(0..=99).contains(&value) {
        return Err("Limit must be 0-99.");
    }
    Ok(value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_every_placeholder() {
        assert_eq!(
            apply_name_template("{username}'s Room", "mira"),
            "mira's Room"
        );
        assert_eq!(apply_name_template("{username}-{username}", "a"), "a-a");
    }

    #[test]
    fn caps_channel_name_at_100_chars() {
        let long = "x".repeat(300);
        assert_eq!(apply_name_template("{username}", &long).chars().count(), 100);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let name = "é".repeat(150);
        let out = apply_name_template("{username}", &name);
        assert_eq!(out.chars().count(), 100);
    }

    #[test]
    fn rename_rejects_empty_and_oversized() {
        assert!(validate_rename("   ").is_err());
        assert!(validate_rename(&"x".repeat(101)).is_err());
        assert_eq!(validate_rename(" lounge ").unwrap(), "lounge");
    }

    #[test]
    fn limit_bounds() {
        assert!(validate_limit(-1).is_err());
        assert!(validate_limit(100).is_err());
        assert_eq!(validate_limit(0).unwrap(), 0);
        assert_eq!(validate_limit(99).unwrap(), 99);
    }
}
