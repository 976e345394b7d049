use course_core::model::{ApiToken, User, UserId};

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_user_row, user_id_from_i64};
use crate::repository::{NewUserRecord, StorageError, UserRepository};

const USER_COLUMNS: &str = "id, username, full_name, email, role, created_at";

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO users (username, full_name, email, role, api_token, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(user.username)
        .bind(user.full_name)
        .bind(user.email)
        .bind(user.role.as_str())
        .bind(user.api_token.as_str().to_owned())
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        user_id_from_i64(res.last_insert_rowid())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id_i64("user_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_user_row).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_user_row).transpose()
    }

    async fn find_by_token(&self, token: &ApiToken) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE api_token = ?1"
        ))
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_user_row).transpose()
    }

    async fn list_users(&self, limit: u32) -> Result<Vec<User>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id ASC LIMIT ?1"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_user_row).collect()
    }

    async fn update_user(&self, user: &User) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE users
            SET username = ?1, full_name = ?2, email = ?3, role = ?4
            WHERE id = ?5
            ",
        )
        .bind(user.username())
        .bind(user.full_name())
        .bind(user.email())
        .bind(user.role().as_str())
        .bind(id_i64("user_id", user.id().value())?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StorageError> {
        self.delete_by_id("users", id_i64("user_id", id.value())?)
            .await
    }
}
