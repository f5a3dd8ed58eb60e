//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;

use crate::error::DomainError;

/// Identifier of a user record.
///
/// Numeric and assigned sequentially by the user directory, so it can appear
/// directly in paths such as `/api/users/{id}`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(u64);

impl UserId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    /// The identifier that follows this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for UserId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .parse::<u64>()
            .map_err(|e| DomainError::invalid_id(format!("UserId: {}", e)))?;
        Ok(Self(value))
    }
}
