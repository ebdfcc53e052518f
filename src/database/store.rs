use async_trait::async_trait;

use crate::{
    schema::{
        EntryKind, Ingredient, Recipe, RecipeFilter, RecipeIngredient, RecipeRecord,
        ShoppingListItem, Tag, Uuid, User,
    },
    RecipeError,
};

/// Persistence seam for every action in the SDK.
///
/// Implementations run each mutating method as one transaction, so a recipe is
/// never observable without its tag and ingredient rows. Insert methods report
/// uniqueness conflicts by returning `false` rather than failing, the callers
/// turn that into the matching domain error.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    // Users

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RecipeError>;

    /// Users ordered by id, with the total count.
    async fn list_users(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), RecipeError>;

    // Reference data

    async fn list_tags(&self) -> Result<Vec<Tag>, RecipeError>;

    async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>, RecipeError>;

    /// Ingredients whose name starts with `prefix` (case-insensitive), ordered by name.
    async fn search_ingredients(&self, prefix: Option<&str>)
        -> Result<Vec<Ingredient>, RecipeError>;

    async fn get_ingredient(&self, id: Uuid) -> Result<Option<Ingredient>, RecipeError>;

    // Recipes

    async fn insert_recipe(&self, author_id: Uuid, record: &RecipeRecord)
        -> Result<Uuid, RecipeError>;

    /// Overwrites recipe fields and replaces the tag and ingredient sets wholesale.
    async fn replace_recipe(&self, id: Uuid, record: &RecipeRecord) -> Result<(), RecipeError>;

    async fn delete_recipe(&self, id: Uuid) -> Result<bool, RecipeError>;

    async fn get_recipe(&self, id: Uuid) -> Result<Option<Recipe>, RecipeError>;

    /// Newest first, with the total count of matching recipes.
    async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Recipe>, i64), RecipeError>;

    async fn list_author_recipes(
        &self,
        author_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, RecipeError>;

    async fn count_recipes(&self, author_id: Uuid) -> Result<i64, RecipeError>;

    async fn list_recipe_tags(&self, recipe_id: Uuid) -> Result<Vec<Tag>, RecipeError>;

    async fn list_recipe_ingredients(
        &self,
        recipe_id: Uuid,
    ) -> Result<Vec<RecipeIngredient>, RecipeError>;

    // Favorites and shopping cart

    async fn has_entry(
        &self,
        kind: EntryKind,
        user_id: Uuid,
        recipe_id: Uuid,
    ) -> Result<bool, RecipeError>;

    async fn add_entry(
        &self,
        kind: EntryKind,
        user_id: Uuid,
        recipe_id: Uuid,
    ) -> Result<bool, RecipeError>;

    async fn remove_entry(
        &self,
        kind: EntryKind,
        user_id: Uuid,
        recipe_id: Uuid,
    ) -> Result<bool, RecipeError>;

    // Follows

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RecipeError>;

    async fn add_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RecipeError>;

    async fn remove_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RecipeError>;

    /// Authors followed by `user_id` in subscription order, with the total count.
    async fn list_following(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64), RecipeError>;

    // Aggregation

    /// Ingredient amounts of every recipe in the user's cart, summed per
    /// (name, measurement unit) and ordered by name.
    async fn aggregate_shopping_list(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ShoppingListItem>, RecipeError>;
}
