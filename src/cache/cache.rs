use std::{
    fmt::{self, Display},
    future::Future,
};

use redis::{aio::MultiplexedConnection, AsyncCommands, FromRedisValue, ToRedisArgs};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{Deserialize, Serialize};

use crate::{
    constants::REFERENCE_CACHE_TTL,
    error::CacheError,
    schema::{Ingredient, Tag},
    RecipeError,
};

// Caching - keys

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheKey {
    Tags,
    /// Ingredient search, keyed by the lowercased name prefix.
    Ingredients(Option<String>),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Tags => write!(f, "tags"),
            CacheKey::Ingredients(None) => write!(f, "ingredients"),
            CacheKey::Ingredients(Some(prefix)) => {
                write!(f, "ingredients-{}", prefix.to_lowercase())
            }
        }
    }
}

// Cache - wrappers

#[derive(Serialize, Deserialize, FromRedisValue, ToRedisArgs, Clone, Debug)]
pub struct CachedTags {
    pub tags: Vec<Tag>,
}

#[derive(Serialize, Deserialize, FromRedisValue, ToRedisArgs, Clone, Debug)]
pub struct CachedIngredients {
    pub ingredients: Vec<Ingredient>,
}

/// Serves `key` from redis when possible, otherwise runs `fetch` and stores
/// the result. Redis failures are logged and never fail the request.
pub async fn get_or<V, F, Fut>(
    key: CacheKey,
    cache: Option<MultiplexedConnection>,
    fetch: F,
) -> Result<V, RecipeError>
where
    V: FromRedisValue + ToRedisArgs + Send + Sync,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, RecipeError>>,
{
    let Some(mut cache) = cache else {
        return fetch().await;
    };
    let k = key.to_string();

    match get_cache_value::<&str, V>(&k, &mut cache).await {
        Ok(Some(value)) => {
            log::trace!("> Found {k:?}");
            return Ok(value);
        }
        Ok(None) => {}
        Err(e) => {
            log::error!("> Failed to read cached value {k}: {e}");
            let mut c = cache.clone();
            let stale = k.clone();
            tokio::spawn(async move {
                if let Err(e) = delete_cache_value(&stale, &mut c).await {
                    log::error!("> Failed to delete cached value! {e}");
                }
            });
        }
    }

    log::trace!("> Fetching {k:?}");
    let value = fetch().await?;
    if let Err(e) = set_cache_value(&k, &value, REFERENCE_CACHE_TTL, &mut cache).await {
        log::error!("> Failed to cache {k}: {e}");
    }

    Ok(value)
}

// Cache - raw handlers

pub async fn set_cache_value<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    seconds: u64,
    cache: &mut MultiplexedConnection,
) -> Result<(), RecipeError> {
    let _: () = cache
        .set_ex(key, value, seconds)
        .await
        .map_err(CacheError::from)?;

    Ok(())
}

pub async fn delete_cache_value<K: ToRedisArgs + Send + Sync>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<(), RecipeError> {
    let _: () = cache.del(key).await.map_err(CacheError::from)?;

    Ok(())
}

pub async fn get_cache_value<K: ToRedisArgs + Send + Sync, V: FromRedisValue>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<Option<V>, RecipeError> {
    let value: Option<V> = cache.get(key).await.map_err(CacheError::from)?;

    Ok(value)
}
