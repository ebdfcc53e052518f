use redis::aio::MultiplexedConnection;

use crate::{
    cache::{get_or, CacheKey, CachedIngredients},
    schema::{Ingredient, Uuid},
    store::RecipeStore,
    RecipeError,
};

/// Case-insensitive name prefix search. A blank prefix lists everything.
pub async fn search_ingredients<S: RecipeStore + ?Sized>(
    store: &S,
    cache: Option<MultiplexedConnection>,
    name: Option<&str>,
) -> Result<Vec<Ingredient>, RecipeError> {
    let prefix = name
        .map(str::trim)
        .filter(|prefix| !prefix.is_empty())
        .map(str::to_lowercase);

    let key = CacheKey::Ingredients(prefix.clone());
    let cached: CachedIngredients = get_or(key, cache, || async {
        Ok::<_, RecipeError>(CachedIngredients {
            ingredients: store.search_ingredients(prefix.as_deref()).await?,
        })
    })
    .await?;

    Ok(cached.ingredients)
}

pub async fn get_ingredient<S: RecipeStore + ?Sized>(
    store: &S,
    id: Uuid,
) -> Result<Ingredient, RecipeError> {
    store
        .get_ingredient(id)
        .await?
        .ok_or_else(|| RecipeError::not_found("Ingredient", id))
}
