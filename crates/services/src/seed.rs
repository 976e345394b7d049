//! Idempotent creation of the default accounts.

use tracing::info;

use course_core::model::{ApiToken, Role};

use crate::error::UserServiceError;
use crate::user_service::{UserDraft, UserService};

/// Accounts ensured by [`ensure_default_users`].
pub const DEFAULT_USERS: [(&str, &str, Role); 3] = [
    ("admin", "Administrator", Role::Admin),
    ("teacher", "Default Teacher", Role::Teacher),
    ("student", "Default Student", Role::Student),
];

/// What seeding did for one default account.
#[derive(Debug, Clone)]
pub struct SeededUser {
    pub username: &'static str,
    pub role: Role,
    /// Present only when the account was created by this run.
    pub token: Option<ApiToken>,
}

/// Create any missing default account. Existing accounts are left untouched,
/// so running this repeatedly is safe.
///
/// # Errors
///
/// Returns `UserServiceError` if a lookup or insert fails.
pub async fn ensure_default_users(users: &UserService) -> Result<Vec<SeededUser>, UserServiceError> {
    let mut seeded = Vec::with_capacity(DEFAULT_USERS.len());

    for (username, full_name, role) in DEFAULT_USERS {
        if users.find_by_username(username).await?.is_some() {
            seeded.push(SeededUser {
                username,
                role,
                token: None,
            });
            continue;
        }

        let draft = UserDraft {
            username: username.to_owned(),
            full_name: full_name.to_owned(),
            email: format!("{username}@example.com"),
        };
        let issued = match users.register_with_role(draft, role).await {
            Ok(issued) => issued,
            // lost a race with a concurrent seed
            Err(UserServiceError::UsernameTaken(_)) => {
                seeded.push(SeededUser {
                    username,
                    role,
                    token: None,
                });
                continue;
            }
            Err(err) => return Err(err),
        };
        info!(username, role = role.as_str(), "default user created");
        seeded.push(SeededUser {
            username,
            role,
            token: Some(issued.token),
        });
    }

    Ok(seeded)
}
