use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::{Post, PostRequest, PostRow, User};

/// Repository Trait
///
/// Persistence contract for users and posts. Handlers only see this trait, so
/// tests can substitute an in-memory implementation.
///
/// Every call is one independent round trip (or one transaction for
/// [`Repository::delete_user`]); nothing is cached between requests.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn find_all_users(&self) -> Result<Vec<User>, sqlx::Error>;
    // Every user whose email equals `email` exactly (zero or one row in practice).
    async fn find_all_users_by_email(&self, email: &str) -> Result<Vec<User>, sqlx::Error>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error>;
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error>;
    // Substring match, case-sensitive, wildcards in `fragment` are literal.
    async fn find_users_by_email_contains(&self, fragment: &str) -> Result<Vec<User>, sqlx::Error>;
    // Substring match further restricted to `email` exactly.
    async fn find_users_by_email_contains_and_email(
        &self,
        fragment: &str,
        email: &str,
    ) -> Result<Vec<User>, sqlx::Error>;
    async fn exists_user_by_id(&self, id: i64) -> Result<bool, sqlx::Error>;
    async fn exists_user_by_email(&self, email: &str) -> Result<bool, sqlx::Error>;

    /// Inserts `user` (its `id` is ignored) and returns the stored row.
    async fn insert_user(&self, user: User) -> Result<User, sqlx::Error>;
    /// Overwrites every column of the row `user.id`, password included.
    /// `None` when the row no longer exists.
    async fn update_user(&self, user: User) -> Result<Option<User>, sqlx::Error>;
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, sqlx::Error>;
    /// Deletes the user and every post it owns atomically.
    /// Returns false when no such user existed.
    async fn delete_user(&self, id: i64) -> Result<bool, sqlx::Error>;

    // --- Posts ---
    async fn find_all_posts(&self) -> Result<Vec<Post>, sqlx::Error>;
    async fn insert_post(&self, post: PostRequest) -> Result<Post, sqlx::Error>;
}

/// RepositoryState
///
/// Shared handle to the persistence layer held in the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = "id, email, username, password, role";

const POST_SELECT: &str = r#"
    SELECT p.id, p.title, p.content,
           u.id AS user_id, u.email AS user_email, u.username AS user_username,
           u.password AS user_password, u.role AS user_role
    FROM posts p
    JOIN users u ON u.id = p.user_id
"#;

/// PostgresRepository
///
/// [`Repository`] backed by PostgreSQL through a shared connection pool.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_all_users(&self) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(&self.pool)
            .await
    }

    async fn find_all_users_by_email(&self, email: &str) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 ORDER BY id"
        ))
        .bind(email)
        .fetch_all(&self.pool)
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// `strpos` rather than `LIKE` so `%` and `_` in the fragment match literally.
    async fn find_users_by_email_contains(&self, fragment: &str) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE strpos(email, $1) > 0 ORDER BY id"
        ))
        .bind(fragment)
        .fetch_all(&self.pool)
        .await
    }

    async fn find_users_by_email_contains_and_email(
        &self,
        fragment: &str,
        email: &str,
    ) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE strpos(email, $1) > 0 AND email = $2 ORDER BY id"
        ))
        .bind(fragment)
        .bind(email)
        .fetch_all(&self.pool)
        .await
    }

    async fn exists_user_by_id(&self, id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    async fn exists_user_by_email(&self, email: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await
    }

    async fn insert_user(&self, user: User) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, username, password, role) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(user.email)
        .bind(user.username)
        .bind(user.password)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
    }

    async fn update_user(&self, user: User) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET email = $2, username = $3, password = $4, role = $5 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(user.email)
        .bind(user.username)
        .bind(user.password)
        .bind(user.role.as_str())
        .fetch_optional(&self.pool)
        .await
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET password = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Owned posts go first inside the same transaction, so a failure leaves
    /// both tables untouched.
    async fn delete_user(&self, id: i64) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let posts = sqlx::query("DELETE FROM posts WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let users = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if users.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        tracing::debug!(user_id = id, posts_removed = posts.rows_affected(), "user deleted");
        Ok(true)
    }

    async fn find_all_posts(&self) -> Result<Vec<Post>, sqlx::Error> {
        let rows = sqlx::query_as::<_, PostRow>(&format!("{POST_SELECT} ORDER BY p.id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// Inserts and re-reads through the join in one statement so the owner comes
    /// back materialized.
    async fn insert_post(&self, post: PostRequest) -> Result<Post, sqlx::Error> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            WITH inserted AS (
                INSERT INTO posts (title, content, user_id) VALUES ($1, $2, $3)
                RETURNING id, title, content, user_id
            )
            SELECT i.id, i.title, i.content,
                   u.id AS user_id, u.email AS user_email, u.username AS user_username,
                   u.password AS user_password, u.role AS user_role
            FROM inserted i
            JOIN users u ON u.id = i.user_id
            "#,
        )
        .bind(post.title)
        .bind(post.content)
        .bind(post.user.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(Post::from(row))
    }
}
