use std::sync::Arc;

use tracing::{info, warn};

use course_core::model::{ApiToken, Role, User, UserId, UserProfile};
use storage::repository::{NewUserRecord, StorageError, UserRepository};

use crate::Clock;
use crate::error::UserServiceError;

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct UserDraft {
    pub username: String,
    pub full_name: String,
    pub email: String,
}

impl TryFrom<UserDraft> for UserProfile {
    type Error = UserServiceError;

    fn try_from(draft: UserDraft) -> Result<Self, Self::Error> {
        Ok(UserProfile::new(draft.username, draft.full_name, draft.email)?)
    }
}

/// A newly created user together with the only copy of its API token.
#[derive(Debug, Clone)]
pub struct IssuedUser {
    pub user: User,
    pub token: ApiToken,
}

/// Registers users and resolves bearer tokens.
#[derive(Clone)]
pub struct UserService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
}

impl UserService {
    #[must_use]
    pub fn new(clock: Clock, users: Arc<dyn UserRepository>) -> Self {
        Self { clock, users }
    }

    /// Create a user with `role`, bypassing the caller check. Used by seeding.
    pub(crate) async fn register_with_role(
        &self,
        draft: UserDraft,
        role: Role,
    ) -> Result<IssuedUser, UserServiceError> {
        let profile = UserProfile::try_from(draft)?;
        let token = ApiToken::generate();
        let created_at = self.clock.now();

        let id = match self
            .users
            .insert_user(NewUserRecord::new(&profile, role, token.clone(), created_at))
            .await
        {
            Ok(id) => id,
            Err(StorageError::Conflict) => {
                return Err(UserServiceError::UsernameTaken(profile.username().to_owned()));
            }
            Err(err) => return Err(err.into()),
        };
        info!(user_id = %id, role = role.as_str(), "user created");

        let user = User::from_profile(id, profile, role, created_at);
        Ok(IssuedUser { user, token })
    }

    /// Self-service registration; always creates a student.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::UsernameTaken` for a duplicate username and
    /// `UserServiceError::Invalid` for validation failures.
    pub async fn register_student(&self, draft: UserDraft) -> Result<IssuedUser, UserServiceError> {
        self.register_with_role(draft, Role::Student).await
    }

    /// Create a user of any role.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Forbidden` unless `actor` is an
    /// administrator, plus the errors of [`UserService::register_student`].
    pub async fn create_user(
        &self,
        actor: &User,
        draft: UserDraft,
        role: Role,
    ) -> Result<IssuedUser, UserServiceError> {
        if !actor.is_admin() {
            warn!(user_id = %actor.id(), "rejected user creation by non-admin");
            return Err(UserServiceError::Forbidden);
        }
        self.register_with_role(draft, role).await
    }

    /// Resolve a bearer token. Unknown tokens yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Storage` if repository access fails.
    pub async fn authenticate(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }
        Ok(self.users.find_by_token(&ApiToken::from_raw(token)).await?)
    }

    /// # Errors
    ///
    /// Returns `UserServiceError::Storage` if repository access fails.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self.users.find_by_username(username).await?)
    }

    /// # Errors
    ///
    /// Returns `UserServiceError::Forbidden` unless `actor` is an administrator.
    pub async fn list_users(&self, actor: &User, limit: u32) -> Result<Vec<User>, UserServiceError> {
        if !actor.is_admin() {
            return Err(UserServiceError::Forbidden);
        }
        Ok(self.users.list_users(limit).await?)
    }

    /// Fetch one user. Administrators see everyone, others only themselves.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Forbidden` or `UserServiceError::NotFound`.
    pub async fn get_user(&self, actor: &User, id: UserId) -> Result<User, UserServiceError> {
        if !actor.is_admin() && actor.id() != id {
            return Err(UserServiceError::Forbidden);
        }
        self.users
            .get_user(id)
            .await?
            .ok_or(UserServiceError::NotFound)
    }

    /// Replace a user's profile. Users may edit themselves; only
    /// administrators may edit others or change a role.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Forbidden`, `UserServiceError::NotFound`,
    /// `UserServiceError::UsernameTaken` or `UserServiceError::Invalid`.
    pub async fn update_user(
        &self,
        actor: &User,
        id: UserId,
        draft: UserDraft,
        role: Option<Role>,
    ) -> Result<User, UserServiceError> {
        let current = self.get_user(actor, id).await?;
        let role = match role {
            Some(role) if role != current.role() => {
                if !actor.is_admin() {
                    warn!(user_id = %actor.id(), "rejected role change by non-admin");
                    return Err(UserServiceError::Forbidden);
                }
                role
            }
            _ => current.role(),
        };

        let profile = UserProfile::try_from(draft)?;
        let user = User::from_profile(id, profile, role, current.created_at());
        match self.users.update_user(&user).await {
            Ok(()) => {}
            Err(StorageError::Conflict) => {
                return Err(UserServiceError::UsernameTaken(user.username().to_owned()));
            }
            Err(err) => return Err(err.into()),
        }
        info!(user_id = %id, role = role.as_str(), "user updated");
        Ok(user)
    }

    /// Delete a user together with the courses they teach and their
    /// enrollments. Administrators cannot delete their own account.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Forbidden` unless `actor` is an
    /// administrator deleting someone else, and `UserServiceError::NotFound`
    /// for an unknown id.
    pub async fn delete_user(&self, actor: &User, id: UserId) -> Result<(), UserServiceError> {
        if !actor.is_admin() || actor.id() == id {
            warn!(user_id = %actor.id(), target = %id, "rejected user deletion");
            return Err(UserServiceError::Forbidden);
        }
        self.users.delete_user(id).await?;
        info!(user_id = %id, "user deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    fn service() -> UserService {
        UserService::new(fixed_clock(), Arc::new(InMemoryRepository::new()))
    }

    fn draft(username: &str) -> UserDraft {
        UserDraft {
            username: username.into(),
            full_name: "Some One".into(),
            email: format!("{username}@example.org"),
        }
    }

    #[tokio::test]
    async fn registration_issues_a_working_token() {
        let svc = service();
        let issued = svc.register_student(draft("kim")).await.unwrap();
        assert_eq!(issued.user.role(), Role::Student);

        let found = svc.authenticate(issued.token.as_str()).await.unwrap();
        assert_eq!(found.map(|u| u.id()), Some(issued.user.id()));
        assert!(svc.authenticate("  ").await.unwrap().is_none());
        assert!(svc.authenticate("bogus").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_reported() {
        let svc = service();
        svc.register_student(draft("kim")).await.unwrap();
        let err = svc.register_student(draft("kim")).await.unwrap_err();
        assert!(matches!(err, UserServiceError::UsernameTaken(name) if name == "kim"));
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let svc = service();
        let mut bad = draft("kim");
        bad.email = "nope".into();
        assert!(matches!(
            svc.register_student(bad).await,
            Err(UserServiceError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn only_admins_create_and_list_users() {
        let svc = service();
        let student = svc.register_student(draft("kim")).await.unwrap().user;
        assert!(matches!(
            svc.create_user(&student, draft("eve"), Role::Admin).await,
            Err(UserServiceError::Forbidden)
        ));
        assert!(matches!(
            svc.list_users(&student, 10).await,
            Err(UserServiceError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn users_edit_themselves_but_not_their_role() {
        let svc = service();
        let kim = svc.register_student(draft("kim")).await.unwrap().user;
        let lee = svc.register_student(draft("lee")).await.unwrap().user;

        let mut rename = draft("kimberly");
        rename.full_name = "Kimberly Park".into();
        let updated = svc.update_user(&kim, kim.id(), rename, None).await.unwrap();
        assert_eq!(updated.username(), "kimberly");
        assert_eq!(updated.role(), Role::Student);
        assert_eq!(updated.created_at(), kim.created_at());
        assert_eq!(
            svc.find_by_username("kimberly").await.unwrap().map(|u| u.id()),
            Some(kim.id())
        );

        assert!(matches!(
            svc.update_user(&kim, kim.id(), draft("kimberly"), Some(Role::Admin))
                .await,
            Err(UserServiceError::Forbidden)
        ));
        assert!(matches!(
            svc.update_user(&kim, lee.id(), draft("lee"), None).await,
            Err(UserServiceError::Forbidden)
        ));
        assert!(matches!(
            svc.update_user(&lee, lee.id(), draft("kimberly"), None).await,
            Err(UserServiceError::UsernameTaken(_))
        ));
    }

    #[tokio::test]
    async fn only_admins_delete_and_never_themselves() {
        let svc = service();
        let root = svc
            .register_with_role(draft("root"), Role::Admin)
            .await
            .unwrap()
            .user;
        let kim = svc.register_student(draft("kim")).await.unwrap().user;

        assert!(matches!(
            svc.delete_user(&kim, root.id()).await,
            Err(UserServiceError::Forbidden)
        ));
        assert!(matches!(
            svc.delete_user(&root, root.id()).await,
            Err(UserServiceError::Forbidden)
        ));

        let promoted = svc
            .update_user(&root, kim.id(), draft("kim"), Some(Role::Teacher))
            .await
            .unwrap();
        assert_eq!(promoted.role(), Role::Teacher);

        svc.delete_user(&root, kim.id()).await.unwrap();
        assert!(matches!(
            svc.get_user(&root, kim.id()).await,
            Err(UserServiceError::NotFound)
        ));
        assert!(matches!(
            svc.delete_user(&root, kim.id()).await,
            Err(UserServiceError::NotFound)
        ));
    }
}
