//! Password strength policy, mirrored from the server so the change-password
//! form can reject weak input before a round trip.

use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PasswordPolicyError {
    #[error("password must be at least {min} characters long")]
    TooShort { min: usize },

    #[error("password must contain an uppercase letter")]
    MissingUppercase,

    #[error("password must contain a lowercase letter")]
    MissingLowercase,

    #[error("password must contain a digit")]
    MissingDigit,
}

/// First rule the password breaks, checked in a fixed order.
pub fn validate_password_strength(password: &str) -> Result<(), PasswordPolicyError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PasswordPolicyError::TooShort { min: MIN_PASSWORD_LEN });
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(PasswordPolicyError::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(PasswordPolicyError::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordPolicyError::MissingDigit);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_mixed_password() {
        assert_eq!(validate_password_strength("Secret1"), Ok(()));
    }

    #[test]
    fn reports_the_first_broken_rule() {
        assert_eq!(
            validate_password_strength("Ab1"),
            Err(PasswordPolicyError::TooShort { min: 6 })
        );
        assert_eq!(
            validate_password_strength("secret1"),
            Err(PasswordPolicyError::MissingUppercase)
        );
        assert_eq!(
            validate_password_strength("SECRET1"),
            Err(PasswordPolicyError::MissingLowercase)
        );
        assert_eq!(
            validate_password_strength("Secrets"),
            Err(PasswordPolicyError::MissingDigit)
        );
    }
}
