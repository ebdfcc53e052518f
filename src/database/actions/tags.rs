use redis::aio::MultiplexedConnection;

use crate::{
    cache::{get_or, CacheKey, CachedTags},
    schema::{Tag, Uuid},
    store::RecipeStore,
    RecipeError,
};

pub async fn list_tags<S: RecipeStore + ?Sized>(
    store: &S,
    cache: Option<MultiplexedConnection>,
) -> Result<Vec<Tag>, RecipeError> {
    let cached: CachedTags = get_or(CacheKey::Tags, cache, || async {
        Ok::<_, RecipeError>(CachedTags {
            tags: store.list_tags().await?,
        })
    })
    .await?;

    Ok(cached.tags)
}

pub async fn get_tag<S: RecipeStore + ?Sized>(store: &S, id: Uuid) -> Result<Tag, RecipeError> {
    store
        .get_tag(id)
        .await?
        .ok_or_else(|| RecipeError::not_found("Tag", id))
}
