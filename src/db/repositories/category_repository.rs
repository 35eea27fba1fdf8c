use sqlx::{Error, PgPool, Postgres, Transaction};

use crate::db::models::{
    Category, NewCategory, NewSubcategory, Subcategory, UpdateCategory, UpdateSubcategory,
};

const CATEGORY_COLUMNS: &str = "id, name, description, color_class, youtube_link";
const SUBCATEGORY_COLUMNS: &str =
    "id, category_id, name, description, color_class, youtube_sublink";

pub struct CategoryRepository;

impl CategoryRepository {
    pub async fn list_categories(pool: &PgPool) -> Result<Vec<Category>, Error> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY id"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn get_category(pool: &PgPool, id: i32) -> Result<Option<Category>, Error> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create_category(pool: &PgPool, new: &NewCategory) -> Result<Category, Error> {
        sqlx::query_as::<_, Category>(&format!(
            r#"
            INSERT INTO categories (name, description, color_class, youtube_link)
            VALUES ($1, $2, $3, $4)
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.color_class)
        .bind(&new.youtube_link)
        .fetch_one(pool)
        .await
    }

    pub async fn update_category(
        pool: &PgPool,
        id: i32,
        update: &UpdateCategory,
    ) -> Result<Category, Error> {
        sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE categories SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                color_class = COALESCE($4, color_class),
                youtube_link = COALESCE($5, youtube_link)
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(&update.color_class)
        .bind(&update.youtube_link)
        .fetch_one(pool)
        .await
    }

    /// Deletes a category with its subcategories and user links.
    ///
    /// Quizzes still filed under the category keep it referenced, so the
    /// delete fails with a foreign-key violation until they are moved or removed.
    pub async fn delete_category(
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
    ) -> Result<bool, Error> {
        sqlx::query("DELETE FROM user_categories WHERE category_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM subcategories WHERE category_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_subcategories(pool: &PgPool) -> Result<Vec<Subcategory>, Error> {
        sqlx::query_as::<_, Subcategory>(&format!(
            "SELECT {SUBCATEGORY_COLUMNS} FROM subcategories ORDER BY category_id, id"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn list_subcategories_by_category(
        pool: &PgPool,
        category_id: i32,
    ) -> Result<Vec<Subcategory>, Error> {
        sqlx::query_as::<_, Subcategory>(&format!(
            "SELECT {SUBCATEGORY_COLUMNS} FROM subcategories WHERE category_id = $1 ORDER BY id"
        ))
        .bind(category_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create_subcategory(
        pool: &PgPool,
        new: &NewSubcategory,
    ) -> Result<Subcategory, Error> {
        sqlx::query_as::<_, Subcategory>(&format!(
            r#"
            INSERT INTO subcategories (category_id, name, description, color_class, youtube_sublink)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {SUBCATEGORY_COLUMNS}
            "#
        ))
        .bind(new.category_id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.color_class)
        .bind(&new.youtube_sublink)
        .fetch_one(pool)
        .await
    }

    pub async fn update_subcategory(
        pool: &PgPool,
        id: i32,
        update: &UpdateSubcategory,
    ) -> Result<Subcategory, Error> {
        sqlx::query_as::<_, Subcategory>(&format!(
            r#"
            UPDATE subcategories SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                color_class = COALESCE($4, color_class),
                youtube_sublink = COALESCE($5, youtube_sublink)
            WHERE id = $1
            RETURNING {SUBCATEGORY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(&update.color_class)
        .bind(&update.youtube_sublink)
        .fetch_one(pool)
        .await
    }

    /// Quizzes filed under the subcategory are detached, not deleted.
    pub async fn delete_subcategory(
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
    ) -> Result<bool, Error> {
        sqlx::query("UPDATE quizzes SET subcategory_id = NULL WHERE subcategory_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        let result = sqlx::query("DELETE FROM subcategories WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
