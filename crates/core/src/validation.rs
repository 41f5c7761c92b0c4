//! Input validation utilities.

use crate::{OslerError, OslerResult};

/// Validates that a username is safe to use as a filename in the staff repository.
///
/// Usernames come from the authenticating proxy, so they are treated as untrusted:
/// - rejects empty or whitespace-only strings
/// - bounds the length
/// - restricts characters to ASCII alphanumerics and `.`, `-`, `_`, `@`
/// - rejects names starting with `.`
pub fn validate_username(username: &str) -> OslerResult<()> {
    const MAX_USERNAME_LEN: usize = 150;

    if username.trim().is_empty() {
        return Err(OslerError::InvalidInput("username cannot be empty".into()));
    }

    if username.len() > MAX_USERNAME_LEN {
        return Err(OslerError::InvalidInput(format!(
            "username exceeds maximum length of {} characters",
            MAX_USERNAME_LEN
        )));
    }

    if username.starts_with('.') {
        return Err(OslerError::InvalidInput(
            "username cannot start with '.'".into(),
        ));
    }

    let ok = username.bytes().all(|b| {
        matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-' | b'_' | b'@')
    });

    if !ok {
        return Err(OslerError::InvalidInput(
            "username contains invalid characters (only alphanumeric, '.', '-', '_', '@' allowed)"
                .into(),
        ));
    }

    Ok(())
}

/// Uppercases the first character and lowercases the rest, e.g. `mcDONALD` -> `Mcdonald`.
///
/// Applied to names entered on the pre-intake form before duplicate matching.
pub fn capitalize(input: &str) -> String {
    let trimmed = input.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_usernames() {
        assert!(validate_username("jdoe").is_ok());
        assert!(validate_username("jane.doe@wustl.edu").is_ok());
        assert!(validate_username("volunteer_12").is_ok());
    }

    #[test]
    fn rejects_path_like_usernames() {
        assert!(validate_username("").is_err());
        assert!(validate_username("../etc").is_err());
        assert!(validate_username(".hidden").is_err());
        assert!(validate_username("a/b").is_err());
        assert!(validate_username(&"x".repeat(151)).is_err());
    }

    #[test]
    fn capitalize_matches_form_cleaning() {
        assert_eq!(capitalize("jOHN"), "John");
        assert_eq!(capitalize("  smith "), "Smith");
        assert_eq!(capitalize("o'BRIEN"), "O'brien");
        assert_eq!(capitalize(""), "");
    }
}
