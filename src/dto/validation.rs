//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::{session::room_code, state::game_kind::GameKind};

/// Longest accepted principal id.
const MAX_PRINCIPAL_LEN: usize = 64;

/// Validates that a room code is made of [`room_code::CODE_LENGTH`] characters
/// of the code alphabet, ignoring case.
///
/// # Examples
///
/// ```ignore
/// validate_room_code("ab2c") // Ok
/// validate_room_code("AB0C") // Err - `0` is not in the alphabet
/// validate_room_code("ABC")  // Err - too short
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    if room_code::normalize(code).is_none() {
        let mut err = ValidationError::new("room_code");
        err.message = Some(format!("`{code}` is not a room code").into());
        return Err(err);
    }
    Ok(())
}

/// Validates that a principal id is usable as a store path segment.
pub fn validate_principal(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_PRINCIPAL_LEN {
        let mut err = ValidationError::new("principal_length");
        err.message = Some(
            format!("Principal must be 1 to {MAX_PRINCIPAL_LEN} characters (got {})", id.len())
                .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("principal_format");
        err.message = Some("Principal must contain only letters, digits, `-` and `_`".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a game tag names a known game.
pub fn validate_game_tag(tag: &str) -> Result<(), ValidationError> {
    if tag.parse::<GameKind>().is_err() {
        let mut err = ValidationError::new("game_tag");
        err.message = Some(format!("unknown game `{tag}`").into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_codes_ignore_case() {
        assert!(validate_room_code("ABCD").is_ok());
        assert!(validate_room_code(" wxyz ").is_ok());
        assert!(validate_room_code("ABC").is_err());
        assert!(validate_room_code("AB0C").is_err());
    }

    #[test]
    fn principals_must_be_path_safe() {
        assert!(validate_principal("3f2a9c0e5b7d4e21a0c8d6f1b2e3a4c5").is_ok());
        assert!(validate_principal("device_01-b").is_ok());
        assert!(validate_principal("").is_err());
        assert!(validate_principal("a/b").is_err());
        assert!(validate_principal("a.b").is_err());
        assert!(validate_principal(&"x".repeat(65)).is_err());
    }

    #[test]
    fn game_tags_must_be_registered_kinds() {
        assert!(validate_game_tag("tap").is_ok());
        assert!(validate_game_tag("runner").is_ok());
        assert!(validate_game_tag("pictionary").is_err());
    }
}
