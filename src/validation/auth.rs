use crate::error::{AppError, Result};

/// Validates a username.
pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() || username.len() < 3 {
        return Err(AppError::Validation(
            "Username must be at least 3 characters long".to_string(),
        ));
    }

    if username.len() > 100 {
        return Err(AppError::Validation(
            "Username must be at most 100 characters".to_string(),
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(AppError::Validation(
            "Username can only contain letters, numbers, dots, underscores, and hyphens".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(validate_username("dr.osei").is_ok());
        assert!(validate_username("nurse_kim-2").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("bad name").is_err());
        assert!(validate_username(&"x".repeat(101)).is_err());
    }

}
