use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult};

/// Opaque user identifier issued by the upstream identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a validated user identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "user id must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the underlying identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Verified caller identity handed over by the identity collaborator.
///
/// Tokens are never inspected here: whoever constructs an `Identity` vouches
/// for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    user_id: UserId,
    is_superadmin: bool,
}

impl Identity {
    /// Creates an identity for a regular user.
    #[must_use]
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            is_superadmin: false,
        }
    }

    /// Creates an identity carrying the platform-wide superadmin flag.
    #[must_use]
    pub fn superadmin(user_id: UserId) -> Self {
        Self {
            user_id,
            is_superadmin: true,
        }
    }

    /// Creates an identity from its raw parts.
    #[must_use]
    pub fn new(user_id: UserId, is_superadmin: bool) -> Self {
        Self {
            user_id,
            is_superadmin,
        }
    }

    /// Returns the authenticated user.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns whether the user holds the superadmin flag.
    #[must_use]
    pub fn is_superadmin(&self) -> bool {
        self.is_superadmin
    }
}
