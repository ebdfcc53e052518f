use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres, QueryBuilder, Transaction};

use super::{error::QueryError, store::RecipeStore};
use crate::{
    schema::{
        EntryKind, Ingredient, Recipe, RecipeFilter, RecipeIngredient, RecipeRecord,
        ShoppingListItem, Tag, Uuid, User,
    },
    RecipeError,
};

const USER_COLUMNS: &str = "u.id, u.email, u.username, u.first_name, u.last_name, u.role";

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RecipeError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(QueryError::from)?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), RecipeError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| QueryError::from(sqlx::Error::from(e)))?;

        Ok(())
    }
}

async fn begin(pool: &Pool<Postgres>) -> Result<Transaction<'static, Postgres>, RecipeError> {
    pool.begin().await.map_err(|e| {
        log::error!("Could not start transaction: {e}");
        QueryError::new("Could not start transaction".to_owned()).into()
    })
}

async fn commit(tr: Transaction<'static, Postgres>) -> Result<(), RecipeError> {
    tr.commit().await.map_err(|e| {
        log::error!("Could not commit transaction: {e}");
        QueryError::new("Could not commit transaction".to_owned()).into()
    })
}

/// Bulk inserts the tag and ingredient association rows of a recipe.
async fn insert_associations(
    tr: &mut Transaction<'static, Postgres>,
    recipe_id: Uuid,
    record: &RecipeRecord,
) -> Result<(), RecipeError> {
    sqlx::query(
        "
        INSERT INTO recipe_tags (recipe_id, tag_id)
        SELECT $1, UNNEST($2::INTEGER[])
    ",
    )
    .bind(recipe_id)
    .bind(&record.tags)
    .execute(&mut **tr)
    .await
    .map_err(QueryError::from)?;

    let (ids, amounts): (Vec<Uuid>, Vec<i32>) = record
        .ingredients
        .iter()
        .map(|ingredient| (ingredient.id, ingredient.amount))
        .unzip();

    sqlx::query(
        "
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
        SELECT $1, i.ingredient_id, i.amount
        FROM UNNEST($2::INTEGER[], $3::INTEGER[]) AS i(ingredient_id, amount)
    ",
    )
    .bind(recipe_id)
    .bind(ids)
    .bind(amounts)
    .execute(&mut **tr)
    .await
    .map_err(QueryError::from)?;

    Ok(())
}

fn push_recipe_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &RecipeFilter) {
    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }
    if let Some(user_id) = filter.favorited_by {
        query
            .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
            .push_bind(user_id)
            .push(")");
    }
    if let Some(user_id) = filter.in_cart_of {
        query
            .push(" AND EXISTS (SELECT 1 FROM shopping_cart sc WHERE sc.recipe_id = r.id AND sc.user_id = ")
            .push_bind(user_id)
            .push(")");
    }
}

/// `%` and `_` in user input must match literally in a LIKE pattern.
fn like_prefix(prefix: &str) -> String {
    let escaped = prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("{escaped}%")
}

#[async_trait]
impl RecipeStore for PgStore {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RecipeError> {
        let row: Option<User> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(QueryError::from)?;

        Ok(row)
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), RecipeError> {
        let rows: Vec<User> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users u ORDER BY u.id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok((rows, count.0))
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, RecipeError> {
        let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(list)
    }

    async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>, RecipeError> {
        let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(tag)
    }

    async fn search_ingredients(
        &self,
        prefix: Option<&str>,
    ) -> Result<Vec<Ingredient>, RecipeError> {
        let list: Vec<Ingredient> = match prefix {
            Some(prefix) => {
                sqlx::query_as::<_, Ingredient>("SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY name, id")
                    .bind(like_prefix(prefix))
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query_as::<_, Ingredient>("SELECT * FROM ingredients ORDER BY name, id")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(QueryError::from)?;

        Ok(list)
    }

    async fn get_ingredient(&self, id: Uuid) -> Result<Option<Ingredient>, RecipeError> {
        let ingredient: Option<Ingredient> =
            sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(QueryError::from)?;

        Ok(ingredient)
    }

    async fn insert_recipe(
        &self,
        author_id: Uuid,
        record: &RecipeRecord,
    ) -> Result<Uuid, RecipeError> {
        let image = record
            .image
            .as_deref()
            .ok_or_else(|| RecipeError::InvalidInput(String::from("Field `image` is required")))?;

        let mut tr = begin(&self.pool).await?;

        let id: (i32,) = sqlx::query_as(
            "
            INSERT INTO recipes (author_id, name, image, text, cooking_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
        ",
        )
        .bind(author_id)
        .bind(&record.name)
        .bind(image)
        .bind(&record.text)
        .bind(record.cooking_time)
        .fetch_one(&mut *tr)
        .await
        .map_err(QueryError::from)?;

        insert_associations(&mut tr, id.0, record).await?;
        commit(tr).await?;

        Ok(id.0)
    }

    async fn replace_recipe(&self, id: Uuid, record: &RecipeRecord) -> Result<(), RecipeError> {
        let mut tr = begin(&self.pool).await?;

        let result = sqlx::query(
            "
            UPDATE recipes
            SET name = $1, text = $2, cooking_time = $3, image = COALESCE($4, image)
            WHERE id = $5
        ",
        )
        .bind(&record.name)
        .bind(&record.text)
        .bind(record.cooking_time)
        .bind(record.image.as_deref())
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RecipeError::not_found("Recipe", id));
        }

        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tr)
            .await
            .map_err(QueryError::from)?;

        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tr)
            .await
            .map_err(QueryError::from)?;

        insert_associations(&mut tr, id, record).await?;
        commit(tr).await
    }

    async fn delete_recipe(&self, id: Uuid) -> Result<bool, RecipeError> {
        // associations, favorites and cart entries cascade
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_recipe(&self, id: Uuid) -> Result<Option<Recipe>, RecipeError> {
        let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(row)
    }

    async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Recipe>, i64), RecipeError> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT r.* FROM recipes r WHERE TRUE");
        push_recipe_filters(&mut query, filter);
        query
            .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<Recipe> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(QueryError::from)?;

        let mut count_query =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM recipes r WHERE TRUE");
        push_recipe_filters(&mut count_query, filter);
        let count: (i64,) = count_query
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok((rows, count.0))
    }

    async fn list_author_recipes(
        &self,
        author_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, RecipeError> {
        // LIMIT NULL is LIMIT ALL
        let rows: Vec<Recipe> = sqlx::query_as(
            "SELECT * FROM recipes WHERE author_id = $1 ORDER BY pub_date DESC, id DESC LIMIT $2",
        )
        .bind(author_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(rows)
    }

    async fn count_recipes(&self, author_id: Uuid) -> Result<i64, RecipeError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(count.0)
    }

    async fn list_recipe_tags(&self, recipe_id: Uuid) -> Result<Vec<Tag>, RecipeError> {
        let list: Vec<Tag> = sqlx::query_as(
            "
            SELECT t.*
            FROM recipe_tags rt
            INNER JOIN tags t ON t.id = rt.tag_id
            WHERE rt.recipe_id = $1
            ORDER BY t.id
        ",
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(list)
    }

    async fn list_recipe_ingredients(
        &self,
        recipe_id: Uuid,
    ) -> Result<Vec<RecipeIngredient>, RecipeError> {
        let rows: Vec<RecipeIngredient> = sqlx::query_as(
            "
            SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
            FROM recipe_ingredients ri
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = $1
            ORDER BY i.name, i.id
        ",
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(rows)
    }

    async fn has_entry(
        &self,
        kind: EntryKind,
        user_id: Uuid,
        recipe_id: Uuid,
    ) -> Result<bool, RecipeError> {
        let table = kind.table();
        let result: Option<(i32,)> = sqlx::query_as(&format!(
            "SELECT recipe_id FROM {table} WHERE user_id = $1 AND recipe_id = $2"
        ))
        .bind(user_id)
        .bind(recipe_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(result.is_some())
    }

    async fn add_entry(
        &self,
        kind: EntryKind,
        user_id: Uuid,
        recipe_id: Uuid,
    ) -> Result<bool, RecipeError> {
        let table = kind.table();
        let mut tr = begin(&self.pool).await?;
        let result = sqlx::query(&format!(
            "INSERT INTO {table} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING"
        ))
        .bind(user_id)
        .bind(recipe_id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;
        commit(tr).await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_entry(
        &self,
        kind: EntryKind,
        user_id: Uuid,
        recipe_id: Uuid,
    ) -> Result<bool, RecipeError> {
        let table = kind.table();
        let mut tr = begin(&self.pool).await?;
        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE user_id = $1 AND recipe_id = $2"
        ))
        .bind(user_id)
        .bind(recipe_id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;
        commit(tr).await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RecipeError> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT id FROM follows WHERE user_id = $1 AND author_id = $2")
                .bind(user_id)
                .bind(author_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(QueryError::from)?;

        Ok(result.is_some())
    }

    async fn add_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RecipeError> {
        let mut tr = begin(&self.pool).await?;
        let result = sqlx::query(
            "INSERT INTO follows (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(author_id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;
        commit(tr).await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RecipeError> {
        let mut tr = begin(&self.pool).await?;
        let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .execute(&mut *tr)
            .await
            .map_err(QueryError::from)?;
        commit(tr).await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_following(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64), RecipeError> {
        let rows: Vec<User> = sqlx::query_as(&format!(
            "
            SELECT {USER_COLUMNS}
            FROM follows f
            INNER JOIN users u ON u.id = f.author_id
            WHERE f.user_id = $1
            ORDER BY f.id
            LIMIT $2 OFFSET $3
        "
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM follows WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok((rows, count.0))
    }

    async fn aggregate_shopping_list(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ShoppingListItem>, RecipeError> {
        let rows: Vec<ShoppingListItem> = sqlx::query_as(
            "
            SELECT i.name AS name, i.measurement_unit AS measurement_unit, SUM(ri.amount)::BIGINT AS amount
            FROM shopping_cart sc
            INNER JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE sc.user_id = $1
            GROUP BY i.name, i.measurement_unit
            ORDER BY i.name, i.measurement_unit
        ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(QueryError::from)?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(like_prefix("sa"), "sa%");
        assert_eq!(like_prefix("50%_"), "50\\%\\_%");
    }
}
