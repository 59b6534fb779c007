//! Postgres-backed user store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Duplicate` | Email (or id) already taken |
//! | Database (other) | Any other | `Backend` | Check constraints, connection loss mid-query |
//! | PoolClosed | N/A | `Backend` | Pool was shut down |
//! | Other | N/A | `Backend` | Network errors, decode failures, etc. |
//!
//! The schema lives in `sql/users.sql` and is applied out of band.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use usergate_core::{Email, PageWindow, User, UserFilter, UserId};

use super::{StoreError, UserChanges, UserStore};

const SELECT_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

// `$1` = name needle, `$2` = email needle. NULL disables the clause.
const FILTER_CLAUSE: &str = "($1::text IS NULL OR strpos(name, $1) > 0) \
     AND ($2::text IS NULL OR strpos(email, $2) > 0)";

/// Postgres-backed user store.
///
/// Email uniqueness is enforced by the `users_email_key` constraint rather
/// than by a read-before-write, so two concurrent inserts with the same
/// address cannot both commit.
#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: Arc<PgPool>,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl UserStore for PostgresUserStore {
    #[instrument(skip(self), fields(email = %email), err)]
    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&sql)
            .bind(email.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_email", e))?;

        row.map(|row| decode_user("find_by_email", &row)).transpose()
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_id", e))?;

        row.map(|row| decode_user("find_by_id", &row)).transpose()
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn insert(&self, user: User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert", e))?;

        Ok(())
    }

    #[instrument(skip(self, changes), fields(user_id = %id), err)]
    async fn update(&self, id: UserId, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let sql = format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                updated_at = $5
            WHERE id = $1
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(changes.name.as_deref())
            .bind(changes.email.as_ref().map(Email::as_str))
            .bind(changes.password_hash.as_deref())
            .bind(changes.updated_at)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update", e))?;

        row.map(|row| decode_user("update", &row)).transpose()
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn count(&self, filter: &UserFilter) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) AS total FROM users WHERE {FILTER_CLAUSE}");

        let row = sqlx::query(&sql)
            .bind(filter.name.as_deref())
            .bind(filter.email.as_deref())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count", e))?;

        let total: i64 = row
            .try_get("total")
            .map_err(|e| StoreError::Backend(format!("failed to read total: {e}")))?;
        Ok(total.max(0) as u64)
    }

    #[instrument(skip(self), fields(offset = window.offset, limit = window.limit), err)]
    async fn list(&self, filter: &UserFilter, window: PageWindow) -> Result<Vec<User>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM users WHERE {FILTER_CLAUSE} \
             ORDER BY name ASC, id ASC LIMIT $3 OFFSET $4"
        );

        let rows = sqlx::query(&sql)
            .bind(filter.name.as_deref())
            .bind(filter.email.as_deref())
            .bind(i64::try_from(window.limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(window.offset).unwrap_or(i64::MAX))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list", e))?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            users.push(decode_user("list", &row)?);
        }
        Ok(users)
    }
}

fn decode_user(operation: &str, row: &sqlx::postgres::PgRow) -> Result<User, StoreError> {
    let row = UserRow::from_row(row)
        .map_err(|e| StoreError::Backend(format!("failed to decode user row in {operation}: {e}")))?;
    row.try_into()
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        if let sqlx::Error::Database(db_err) = &err {
            return StoreError::Duplicate(format!(
                "{} ({})",
                db_err.constraint().unwrap_or("unique"),
                operation
            ));
        }
    }

    match err {
        sqlx::Error::Database(db_err) => {
            StoreError::Backend(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

// SQLx row types

#[derive(Debug)]
struct UserRow {
    id: uuid::Uuid,
    name: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for UserRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email)
            .map_err(|e| StoreError::Backend(format!("stored email is invalid: {e}")))?;

        Ok(User {
            id: UserId::from_uuid(row.id),
            name: row.name,
            email,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declares_unique_email() {
        const SCHEMA: &str = include_str!("../../sql/users.sql");
        assert!(SCHEMA.contains("UNIQUE (email)"));
        assert!(SCHEMA.contains("CREATE TABLE IF NOT EXISTS users"));
    }

    #[test]
    fn filter_clause_uses_positional_needles() {
        assert!(FILTER_CLAUSE.contains("$1::text IS NULL"));
        assert!(FILTER_CLAUSE.contains("$2::text IS NULL"));
    }

    #[test]
    fn non_database_errors_are_backend_failures() {
        assert!(matches!(
            map_sqlx_error("list", sqlx::Error::PoolClosed),
            StoreError::Backend(_)
        ));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn corrupt_stored_email_is_a_backend_error() {
        let now = Utc::now();
        let row = UserRow {
            id: uuid::Uuid::now_v7(),
            name: "John".to_string(),
            email: "not-an-email".to_string(),
            password_hash: "hash".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(User::try_from(row), Err(StoreError::Backend(_))));
    }
}
