//! Derived per-requester flags and counters. Every function takes the request
//! context explicitly, anonymous callers get `false` without touching the store.

use crate::{
    context::RequestContext,
    schema::{EntryKind, ShoppingListItem, Uuid},
    store::RecipeStore,
    RecipeError,
};

pub async fn is_favorited<S: RecipeStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    recipe_id: Uuid,
) -> Result<bool, RecipeError> {
    has_entry(store, ctx, EntryKind::Favorite, recipe_id).await
}

pub async fn is_in_shopping_cart<S: RecipeStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    recipe_id: Uuid,
) -> Result<bool, RecipeError> {
    has_entry(store, ctx, EntryKind::ShoppingCart, recipe_id).await
}

async fn has_entry<S: RecipeStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    kind: EntryKind,
    recipe_id: Uuid,
) -> Result<bool, RecipeError> {
    match ctx.user_id() {
        Some(user_id) => store.has_entry(kind, user_id, recipe_id).await,
        None => Ok(false),
    }
}

pub async fn is_subscribed<S: RecipeStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    author_id: Uuid,
) -> Result<bool, RecipeError> {
    match ctx.user_id() {
        Some(user_id) => store.is_following(user_id, author_id).await,
        None => Ok(false),
    }
}

pub async fn recipes_count<S: RecipeStore + ?Sized>(
    store: &S,
    author_id: Uuid,
) -> Result<i64, RecipeError> {
    store.count_recipes(author_id).await
}

/// Summed ingredient amounts over the user's cart, one line per (name, unit).
pub async fn aggregate_shopping_list<S: RecipeStore + ?Sized>(
    store: &S,
    user_id: Uuid,
) -> Result<Vec<ShoppingListItem>, RecipeError> {
    store.aggregate_shopping_list(user_id).await
}
