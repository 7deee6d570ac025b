//! User repository for labbook.
//!
//! CRUD operations for accounts plus the reset-code columns.

use sqlx::{QueryBuilder, SqlitePool};

use super::user::{NewUser, Role, User, UserUpdate};
use crate::{LabbookError, Result};

const USER_COLUMNS: &str =
    "id, email, password, first_name, last_name, role, otp_hash, otp_issued_at, created_at";

/// Map constraint violations to [`LabbookError::Conflict`].
fn map_write_error(e: sqlx::Error, what: &str) -> LabbookError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
            return LabbookError::Conflict(what.to_string());
        }
    }
    LabbookError::Database(e.to_string())
}

/// Repository for user CRUD operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user.
    ///
    /// Fails with [`LabbookError::Conflict`] when the email is taken
    /// (case-insensitively).
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        let result = sqlx::query(
            "INSERT INTO users (email, password, first_name, last_name, role)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(new_user.email.trim())
        .bind(&new_user.password)
        .bind(new_user.first_name.trim())
        .bind(new_user.last_name.trim())
        .bind(new_user.role.as_str())
        .execute(self.pool)
        .await
        .map_err(|e| map_write_error(e, "email already registered"))?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| LabbookError::NotFound("user".to_string()))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    /// Get a user by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email.trim())
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    /// Update a user by ID.
    ///
    /// Only fields that are set in the update are modified.
    /// Returns the updated user, or None if not found.
    pub async fn update(&self, id: i64, update: &UserUpdate) -> Result<Option<User>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE users SET ");
        let mut separated = query.separated(", ");

        if let Some(ref password) = update.password {
            separated.push("password = ");
            separated.push_bind_unseparated(password);
        }
        if let Some(ref first_name) = update.first_name {
            separated.push("first_name = ");
            separated.push_bind_unseparated(first_name.trim());
        }
        if let Some(ref last_name) = update.last_name {
            separated.push("last_name = ");
            separated.push_bind_unseparated(last_name.trim());
        }
        if let Some(role) = update.role {
            separated.push("role = ");
            separated.push_bind_unseparated(role.as_str());
        }

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query.build().execute(self.pool).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    /// Delete a user by ID.
    ///
    /// Returns false if not found; [`LabbookError::Conflict`] if bookings
    /// still reference the user.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| map_write_error(e, "user is still referenced by bookings"))?;
        Ok(result.rows_affected() > 0)
    }

    /// List all users ordered by last name, first name.
    pub async fn list_all(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY last_name, first_name, id");
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(users)
    }

    /// Count users with the given role.
    pub async fn count_by_role(&self, role: Role) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ?")
            .bind(role.as_str())
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Check if an email is already registered (case-insensitive).
    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ? COLLATE NOCASE)")
                .bind(email.trim())
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Store a pending reset code, replacing any previous one.
    pub async fn set_otp(&self, id: i64, otp_hash: &str, issued_at: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET otp_hash = ?, otp_issued_at = ?, otp_attempts = 0 WHERE id = ?",
        )
        .bind(otp_hash)
        .bind(issued_at)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count a wrong guess against the pending code `otp_hash`.
    ///
    /// The code is cleared once `max_attempts` wrong guesses have been made.
    /// Returns true if this guess cleared it.
    pub async fn record_otp_failure(
        &self,
        id: i64,
        otp_hash: &str,
        max_attempts: u32,
    ) -> Result<bool> {
        let cleared: Option<i64> = sqlx::query_scalar(
            "UPDATE users
             SET otp_attempts = otp_attempts + 1,
                 otp_hash = CASE WHEN otp_attempts + 1 >= ?1 THEN NULL ELSE otp_hash END,
                 otp_issued_at = CASE WHEN otp_attempts + 1 >= ?1 THEN NULL ELSE otp_issued_at END
             WHERE id = ?2 AND otp_hash = ?3
             RETURNING otp_hash IS NULL",
        )
        .bind(max_attempts)
        .bind(id)
        .bind(otp_hash)
        .fetch_optional(self.pool)
        .await?;
        Ok(cleared == Some(1))
    }

    /// Consume a reset code and set the new password hash in one statement.
    ///
    /// Succeeds only when the stored code matches `otp_hash` and was issued
    /// at or after `not_before`. The code is cleared in the same write, so
    /// two concurrent confirmations cannot both succeed.
    pub async fn consume_otp(
        &self,
        id: i64,
        otp_hash: &str,
        not_before: i64,
        new_password_hash: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users
             SET password = ?, otp_hash = NULL, otp_issued_at = NULL, otp_attempts = 0
             WHERE id = ?
               AND otp_hash = ?
               AND otp_issued_at >= ?",
        )
        .bind(new_password_hash)
        .bind(id)
        .bind(otp_hash)
        .bind(not_before)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear the pending reset code of a user.
    pub async fn clear_otp(&self, id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE users SET otp_hash = NULL, otp_issued_at = NULL, otp_attempts = 0 WHERE id = ?",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Clear every reset code issued before `not_before` (cleanup).
    pub async fn clear_expired_otps(&self, not_before: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE users SET otp_hash = NULL, otp_issued_at = NULL, otp_attempts = 0
             WHERE otp_issued_at IS NOT NULL AND otp_issued_at < ?",
        )
        .bind(not_before)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn ada() -> NewUser {
        NewUser::new("ada@uni.example", "hashedpw", "Ada", "Lovelace")
    }

    #[tokio::test]
    async fn test_create_user() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());

        let user = repo.create(&ada()).await.unwrap();

        assert_eq!(user.id, 1);
        assert_eq!(user.email, "ada@uni.example");
        assert_eq!(user.first_name, "Ada");
        assert_eq!(user.role, Role::User);
        assert!(user.otp_hash.is_none());
    }

    #[tokio::test]
    async fn test_create_trims_fields() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());

        let user = repo
            .create(&NewUser::new("  grace@uni.example ", "h", " Grace ", "Hopper"))
            .await
            .unwrap();
        assert_eq!(user.email, "grace@uni.example");
        assert_eq!(user.first_name, "Grace");
    }

    #[tokio::test]
    async fn test_create_duplicate_email_case_insensitive() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());

        repo.create(&ada()).await.unwrap();
        let duplicate = NewUser::new("ADA@Uni.Example", "otherpw", "Other", "User");
        let result = repo.create(&duplicate).await;

        assert!(matches!(result, Err(LabbookError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_get_by_email_case_insensitive() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        repo.create(&ada()).await.unwrap();

        let found = repo.get_by_email("Ada@UNI.example").await.unwrap();
        assert_eq!(found.unwrap().last_name, "Lovelace");

        assert!(repo.get_by_email("nobody@uni.example").await.unwrap().is_none());
        assert!(repo.email_exists("ADA@uni.example").await.unwrap());
        assert!(!repo.email_exists("nobody@uni.example").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        let created = repo.create(&ada()).await.unwrap();

        assert!(repo.get_by_id(created.id).await.unwrap().is_some());
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_user() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        let user = repo.create(&ada()).await.unwrap();

        let update = UserUpdate::new().first_name("Augusta").role(Role::Lecturer);
        let updated = repo.update(user.id, &update).await.unwrap().unwrap();

        assert_eq!(updated.first_name, "Augusta");
        assert_eq!(updated.role, Role::Lecturer);
        assert_eq!(updated.password, "hashedpw");
    }

    #[tokio::test]
    async fn test_update_nonexistent_user() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());

        let result = repo
            .update(999, &UserUpdate::new().first_name("X"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_update_empty_returns_current() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        let user = repo.create(&ada()).await.unwrap();

        let result = repo.update(user.id, &UserUpdate::new()).await.unwrap();
        assert_eq!(result.unwrap().first_name, "Ada");
    }

    #[tokio::test]
    async fn test_delete_user() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        let user = repo.create(&ada()).await.unwrap();

        assert!(repo.delete(user.id).await.unwrap());
        assert!(!repo.delete(user.id).await.unwrap());
        assert!(repo.get_by_id(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_user_with_bookings_conflicts() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        let user = repo.create(&ada()).await.unwrap();

        sqlx::query(
            "INSERT INTO bookings (resource, title, start_time, end_time, owner_id)
             VALUES ('main-lab', 'Practical', 100, 200, ?)",
        )
        .bind(user.id)
        .execute(db.pool())
        .await
        .unwrap();

        let result = repo.delete(user.id).await;
        assert!(matches!(result, Err(LabbookError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        repo.create(&ada()).await.unwrap();
        repo.create(
            &NewUser::new("grace@uni.example", "h", "Grace", "Hopper").with_role(Role::Admin),
        )
        .await
        .unwrap();

        let users = repo.list_all().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].last_name, "Hopper");
        assert_eq!(repo.count_by_role(Role::Admin).await.unwrap(), 1);
        assert_eq!(repo.count_by_role(Role::Lecturer).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_consume_otp() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        let user = repo.create(&ada()).await.unwrap();

        assert!(repo.set_otp(user.id, "code-hash", 1_000).await.unwrap());

        // Wrong code
        assert!(!repo.consume_otp(user.id, "other", 900, "new").await.unwrap());
        // Expired: issued before the window
        assert!(!repo.consume_otp(user.id, "code-hash", 1_001, "new").await.unwrap());
        // Valid
        assert!(repo.consume_otp(user.id, "code-hash", 900, "new").await.unwrap());
        // Single use
        assert!(!repo.consume_otp(user.id, "code-hash", 900, "again").await.unwrap());

        let user = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.password, "new");
        assert!(user.otp_hash.is_none());
        assert!(user.otp_issued_at.is_none());
    }

    #[tokio::test]
    async fn test_set_otp_overwrites_previous() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        let user = repo.create(&ada()).await.unwrap();

        repo.set_otp(user.id, "first", 1_000).await.unwrap();
        repo.set_otp(user.id, "second", 1_010).await.unwrap();

        assert!(!repo.consume_otp(user.id, "first", 0, "pw").await.unwrap());
        assert!(repo.consume_otp(user.id, "second", 0, "pw").await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_guesses_clear_code() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        let user = repo.create(&ada()).await.unwrap();

        repo.set_otp(user.id, "code-hash", 1_000).await.unwrap();
        assert!(!repo.record_otp_failure(user.id, "code-hash", 3).await.unwrap());
        assert!(!repo.record_otp_failure(user.id, "code-hash", 3).await.unwrap());
        assert!(repo.record_otp_failure(user.id, "code-hash", 3).await.unwrap());

        assert!(repo.get_by_id(user.id).await.unwrap().unwrap().otp_hash.is_none());
        assert!(!repo.consume_otp(user.id, "code-hash", 0, "pw").await.unwrap());
        // No pending code left to count against
        assert!(!repo.record_otp_failure(user.id, "code-hash", 3).await.unwrap());
    }

    #[tokio::test]
    async fn test_new_code_resets_attempts() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        let user = repo.create(&ada()).await.unwrap();

        repo.set_otp(user.id, "first", 1_000).await.unwrap();
        repo.record_otp_failure(user.id, "first", 2).await.unwrap();
        repo.set_otp(user.id, "second", 1_010).await.unwrap();

        assert!(!repo.record_otp_failure(user.id, "second", 2).await.unwrap());
        assert!(repo.consume_otp(user.id, "second", 0, "pw").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_otp_and_cleanup() {
        let db = setup_db().await;
        let repo = UserRepository::new(db.pool());
        let ada = repo.create(&ada()).await.unwrap();
        let grace = repo
            .create(&NewUser::new("grace@uni.example", "h", "Grace", "Hopper"))
            .await
            .unwrap();

        repo.set_otp(ada.id, "old", 100).await.unwrap();
        repo.set_otp(grace.id, "fresh", 5_000).await.unwrap();

        assert_eq!(repo.clear_expired_otps(1_000).await.unwrap(), 1);
        assert!(repo.get_by_id(ada.id).await.unwrap().unwrap().otp_hash.is_none());
        assert!(repo.get_by_id(grace.id).await.unwrap().unwrap().otp_hash.is_some());

        repo.clear_otp(grace.id).await.unwrap();
        assert!(repo.get_by_id(grace.id).await.unwrap().unwrap().otp_hash.is_none());
    }
}
