use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::ids::UserId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("username cannot be empty")]
    EmptyUsername,

    #[error("username cannot contain whitespace")]
    InvalidUsername,

    #[error("full name cannot be empty")]
    EmptyFullName,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),
}

//
// ─── ROLE ──────────────────────────────────────────────────────────────────────
//

/// What a user is allowed to do in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    /// Parses the storage representation of a role.
    ///
    /// # Errors
    ///
    /// Returns `UserError::UnknownRole` for anything other than
    /// `admin`, `teacher` or `student`.
    pub fn parse(value: &str) -> Result<Self, UserError> {
        match value {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(UserError::UnknownRole(other.to_owned())),
        }
    }

    /// Admins and teachers may author course content.
    #[must_use]
    pub fn can_author_courses(self) -> bool {
        matches!(self, Role::Admin | Role::Teacher)
    }
}

//
// ─── API TOKEN ─────────────────────────────────────────────────────────────────
//

/// Opaque bearer token identifying a user to the HTTP layer.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ApiToken(String);

impl ApiToken {
    /// Generates a fresh random token.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wraps a token received from a client or read from storage.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

//
// ─── PROFILE ───────────────────────────────────────────────────────────────────
//

/// Validated identity fields of a user, before storage assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    username: String,
    full_name: String,
    email: String,
}

impl UserProfile {
    /// # Errors
    ///
    /// Returns `UserError` if the username or full name is blank, the username
    /// contains whitespace, or the email has no `@` between non-empty parts.
    pub fn new(
        username: impl Into<String>,
        full_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<Self, UserError> {
        let username = username.into().trim().to_owned();
        let full_name = full_name.into().trim().to_owned();
        let email = email.into().trim().to_owned();

        if username.is_empty() {
            return Err(UserError::EmptyUsername);
        }
        if username.chars().any(char::is_whitespace) {
            return Err(UserError::InvalidUsername);
        }
        if full_name.is_empty() {
            return Err(UserError::EmptyFullName);
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(UserError::InvalidEmail(email)),
        }

        Ok(Self {
            username,
            full_name,
            email,
        })
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }
}

//
// ─── USER ──────────────────────────────────────────────────────────────────────
//

/// A person known to the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    profile: UserProfile,
    role: Role,
    created_at: DateTime<Utc>,
}

impl User {
    /// Creates a validated user.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`UserProfile::new`].
    pub fn new(
        id: UserId,
        username: impl Into<String>,
        full_name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        created_at: DateTime<Utc>,
    ) -> Result<Self, UserError> {
        let profile = UserProfile::new(username, full_name, email)?;
        Ok(Self::from_profile(id, profile, role, created_at))
    }

    #[must_use]
    pub fn from_profile(
        id: UserId,
        profile: UserProfile,
        role: Role,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            profile,
            role,
            created_at,
        }
    }

    #[must_use]
    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        self.profile.username()
    }

    #[must_use]
    pub fn full_name(&self) -> &str {
        self.profile.full_name()
    }

    #[must_use]
    pub fn email(&self) -> &str {
        self.profile.email()
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
