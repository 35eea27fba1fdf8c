use sqlx::{Error, PgPool, Postgres, Transaction};
use std::collections::HashMap;

use crate::db::models::{Category, NewUserRecord, UpdateUser, User, UserRole, UserWithCategories};

const USER_COLUMNS: &str =
    "id, username, password_hash, name, email, role, subscription_status, created_at";

pub struct UserRepository;

impl UserRepository {
    /// Inserts a user. The very first account on an empty instance becomes admin.
    pub async fn create_user(
        tx: &mut Transaction<'_, Postgres>,
        record: &NewUserRecord,
    ) -> Result<User, Error> {
        // Serializes concurrent registrations so only one can see an empty table
        sqlx::query("LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut **tx)
            .await?;

        let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&mut **tx)
            .await?;
        let role = if existing == 0 {
            UserRole::Admin
        } else {
            record.role
        };

        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, password_hash, name, email, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&record.username)
        .bind(&record.password_hash)
        .bind(&record.name)
        .bind(&record.email)
        .bind(role)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn get_user_by_id(pool: &PgPool, user_id: i32) -> Result<Option<User>, Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Case-insensitive lookup.
    pub async fn get_user_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<User>, Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(username) = LOWER($1)"
        ))
        .bind(username)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_users(pool: &PgPool) -> Result<Vec<User>, Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(pool)
            .await
    }

    /// Matches name, username or email; at most ten rows.
    pub async fn search_users(pool: &PgPool, query: &str) -> Result<Vec<User>, Error> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let pattern = format!("%{}%", query.trim());
        sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE name ILIKE $1 OR username ILIKE $1 OR email ILIKE $1
            ORDER BY name
            LIMIT 10
            "#
        ))
        .bind(pattern)
        .fetch_all(pool)
        .await
    }

    pub async fn update_user(
        pool: &PgPool,
        user_id: i32,
        update: &UpdateUser,
    ) -> Result<User, Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                role = COALESCE($4, role),
                subscription_status = COALESCE($5, subscription_status)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&update.name)
        .bind(&update.email)
        .bind(update.role)
        .bind(&update.subscription_status)
        .fetch_one(pool)
        .await
    }

    /// Removes a user together with everything that references them.
    pub async fn delete_user(
        tx: &mut Transaction<'_, Postgres>,
        user_id: i32,
    ) -> Result<bool, Error> {
        let dependent = [
            "DELETE FROM student_answers WHERE progress_id IN (SELECT id FROM student_progress WHERE user_id = $1)",
            "DELETE FROM quiz_feedback WHERE progress_id IN (SELECT id FROM student_progress WHERE user_id = $1)",
            "DELETE FROM quiz_submissions WHERE user_id = $1",
            "DELETE FROM student_progress WHERE user_id = $1",
            "DELETE FROM user_quizzes WHERE user_id = $1",
            "DELETE FROM user_categories WHERE user_id = $1",
            "DELETE FROM auth_sessions WHERE user_id = $1",
        ];
        for statement in dependent {
            sqlx::query(statement).bind(user_id).execute(&mut **tx).await?;
        }

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_user_categories(pool: &PgPool, user_id: i32) -> Result<Vec<Category>, Error> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT c.id, c.name, c.description, c.color_class, c.youtube_link
            FROM categories c
            JOIN user_categories uc ON uc.category_id = c.id
            WHERE uc.user_id = $1
            ORDER BY c.id
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn replace_user_categories(
        tx: &mut Transaction<'_, Postgres>,
        user_id: i32,
        category_ids: &[i32],
    ) -> Result<(), Error> {
        sqlx::query("DELETE FROM user_categories WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        if category_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO user_categories (user_id, category_id)
            SELECT $1, category_id FROM UNNEST($2::int4[]) AS ids(category_id)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(category_ids)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    pub async fn list_users_with_categories(
        pool: &PgPool,
    ) -> Result<Vec<UserWithCategories>, Error> {
        let users = Self::list_users(pool).await?;

        let links: Vec<(i32, i32, String, String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT uc.user_id, c.id, c.name, c.description, c.color_class, c.youtube_link
            FROM user_categories uc
            JOIN categories c ON c.id = uc.category_id
            ORDER BY c.id
            "#,
        )
        .fetch_all(pool)
        .await?;

        let mut by_user: HashMap<i32, Vec<Category>> = HashMap::new();
        for (user_id, id, name, description, color_class, youtube_link) in links {
            by_user.entry(user_id).or_default().push(Category {
                id,
                name,
                description,
                color_class,
                youtube_link,
            });
        }

        Ok(users
            .into_iter()
            .map(|user| UserWithCategories {
                categories: by_user.remove(&user.id).unwrap_or_default(),
                user,
            })
            .collect())
    }
}
