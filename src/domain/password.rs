//! Plaintext password handling and the strength policy.

use serde::Deserialize;
use std::fmt;

use super::error::ValidationError;

pub const PASSWORD_MIN_LENGTH: usize = 8;
/// bcrypt only reads this many bytes of input.
pub const PASSWORD_MAX_BYTES: usize = 72;

/// Characters that satisfy the "symbol" class.
pub const PASSWORD_SYMBOLS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?`~";

/// A plaintext password as received from a client.
///
/// `Debug` never prints the value so request DTOs can derive it safely.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

impl From<&str> for Password {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Checks a password against the strength policy.
///
/// Requires at least [`PASSWORD_MIN_LENGTH`] characters, at most
/// [`PASSWORD_MAX_BYTES`] bytes of UTF-8, and one each of uppercase,
/// lowercase, digit and symbol. The error lists every missing class.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();
    if length < PASSWORD_MIN_LENGTH {
        return Err(ValidationError::WeakPassword(format!(
            "password must be at least {PASSWORD_MIN_LENGTH} characters"
        )));
    }
    if password.len() > PASSWORD_MAX_BYTES {
        return Err(ValidationError::WeakPassword(format!(
            "password must be at most {PASSWORD_MAX_BYTES} bytes"
        )));
    }

    let mut missing = Vec::new();
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        missing.push("an uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        missing.push("a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        missing.push("a digit");
    }
    if !password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        missing.push("a symbol");
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::WeakPassword(format!(
            "password must contain {}",
            missing.join(", ")
        )))
    }
}
