use axum::async_trait;
use sqlx::{FromRow, PgPool, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

/// Database row for an account. `password_hash` stays inside the crate;
/// handlers convert to `UserDto` before anything is serialized.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, thiserror::Error)]
pub enum UserRepoError {
    #[error("duplicate {0}")]
    Duplicate(&'static str),
    #[error("user not found")]
    NotFound,
    #[error("invalid cursor")]
    InvalidCursor,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Lookup seam for the handlers that only read accounts (login, `/me`);
/// tests swap in an in-memory store, production uses the pool.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserRepoError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserRepoError>;
}

#[async_trait]
impl UserStore for PgPool {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserRepoError> {
        User::find_by_email(self, email).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, UserRepoError> {
        User::find_by_id(self, id).await
    }
}

const PG_UNIQUE_VIOLATION: &str = "23505";

fn classify_unique(e: sqlx::Error) -> UserRepoError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(PG_UNIQUE_VIOLATION) {
            let field = match db.constraint() {
                Some(c) if c.contains("email") => "email",
                _ => "username",
            };
            return UserRepoError::Duplicate(field);
        }
    }
    UserRepoError::Db(e)
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub display_name: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
}

/// Applied over a fetched row; `update` writes the merged result back.
#[derive(Debug, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub display_name: Option<Option<String>>,
    pub avatar_url: Option<Option<String>>,
}

/// Filters for the paginated listing. `before`/`after` bound `created_at`,
/// `q` matches username, e-mail or display name, `cursor` is the id of the
/// last item of the previous page.
#[derive(Debug, Default)]
pub struct UserListFilter {
    pub limit: i64,
    pub cursor: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub q: Option<String>,
    pub before: Option<OffsetDateTime>,
    pub after: Option<OffsetDateTime>,
}

#[derive(Debug)]
pub struct UserPage {
    pub items: Vec<User>,
    pub next_cursor: Option<Uuid>,
}

fn like_pattern(q: &str) -> String {
    let escaped = q
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

impl User {
    pub async fn list(db: &PgPool) -> Result<Vec<User>, UserRepoError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(db)
            .await?;
        Ok(users)
    }

    /// Keyset pagination over `(created_at, id)` descending. Fetches one row
    /// past the limit to decide whether another page exists; a cursor naming
    /// no existing row is `InvalidCursor`.
    pub async fn list_page(
        db: &PgPool,
        filter: UserListFilter,
    ) -> Result<UserPage, UserRepoError> {
        let mut qb = QueryBuilder::new("SELECT * FROM users WHERE true");

        if let Some(user_id) = filter.user_id {
            qb.push(" AND id = ").push_bind(user_id);
        }
        if let Some(q) = &filter.q {
            let pattern = like_pattern(q);
            qb.push(" AND (username ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR display_name ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(before) = filter.before {
            qb.push(" AND created_at < ").push_bind(before);
        }
        if let Some(after) = filter.after {
            qb.push(" AND created_at > ").push_bind(after);
        }
        if let Some(cursor) = filter.cursor {
            let row: Option<(OffsetDateTime,)> =
                sqlx::query_as("SELECT created_at FROM users WHERE id = $1")
                    .bind(cursor)
                    .fetch_optional(db)
                    .await?;
            let (cursor_at,) = row.ok_or(UserRepoError::InvalidCursor)?;
            qb.push(" AND (created_at, id) < (")
                .push_bind(cursor_at)
                .push(", ")
                .push_bind(cursor)
                .push(")");
        }

        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(filter.limit + 1);

        let mut items: Vec<User> = qb.build_query_as().fetch_all(db).await?;
        let next_cursor = if items.len() as i64 > filter.limit {
            items.truncate(filter.limit as usize);
            items.last().map(|u| u.id)
        } else {
            None
        };
        Ok(UserPage { items, next_cursor })
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, UserRepoError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, UserRepoError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn create(db: &PgPool, new: NewUser<'_>) -> Result<User, UserRepoError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, password_hash, display_name, avatar_url)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(new.username)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.display_name)
        .bind(new.avatar_url)
        .fetch_one(db)
        .await
        .map_err(classify_unique)
    }

    /// Read-merge-write: the fetched row carries current values, the patch
    /// overrides the present ones, and the full row is written back so the
    /// statement stays static.
    pub async fn update(db: &PgPool, id: Uuid, patch: UserPatch) -> Result<User, UserRepoError> {
        let current = Self::find_by_id(db, id)
            .await?
            .ok_or(UserRepoError::NotFound)?;

        let username = patch.username.unwrap_or(current.username);
        let email = patch.email.unwrap_or(current.email);
        let password_hash = patch.password_hash.unwrap_or(current.password_hash);
        let display_name = patch.display_name.unwrap_or(current.display_name);
        let avatar_url = patch.avatar_url.unwrap_or(current.avatar_url);

        sqlx::query_as::<_, User>(
            "UPDATE users
             SET username = $2, email = $3, password_hash = $4,
                 display_name = $5, avatar_url = $6, updated_at = now()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(display_name)
        .bind(avatar_url)
        .fetch_one(db)
        .await
        .map_err(classify_unique)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, UserRepoError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("al"), "%al%");
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern(r"a\b"), r"%a\\b%");
    }
}
