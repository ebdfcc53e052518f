use super::{
    aggregation::recipes_count,
    users::{get_user, user_view},
};
use crate::{
    authentication::permissions::ActionType,
    context::RequestContext,
    pagination::{PageContext, PageQuery},
    schema::{RecipeSummary, SubscriptionView, User, Uuid},
    store::RecipeStore,
    validation::validate_follow,
    RecipeError,
};

fn check_recipes_limit(recipes_limit: Option<i64>) -> Result<Option<i64>, RecipeError> {
    match recipes_limit {
        Some(limit) if limit < 0 => Err(RecipeError::InvalidInput(String::from(
            "Query parameter `recipes_limit` must not be negative",
        ))),
        limit => Ok(limit),
    }
}

/// Author card with their newest recipes, `recipes_limit` caps the previews.
pub async fn subscription_view<S: RecipeStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    author: User,
    recipes_limit: Option<i64>,
) -> Result<SubscriptionView, RecipeError> {
    let recipes: Vec<RecipeSummary> = store
        .list_author_recipes(author.id, recipes_limit)
        .await?
        .iter()
        .map(RecipeSummary::from)
        .collect();
    let recipes_count = recipes_count(store, author.id).await?;

    Ok(SubscriptionView {
        user: user_view(store, ctx, author).await?,
        recipes,
        recipes_count,
    })
}

pub async fn subscribe<S: RecipeStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    author_id: Uuid,
    recipes_limit: Option<i64>,
) -> Result<SubscriptionView, RecipeError> {
    let session = ctx.require_user()?;
    session.authenticate(ActionType::ManageOwnLists)?;
    let recipes_limit = check_recipes_limit(recipes_limit)?;
    let author = get_user(store, author_id).await?;

    let following = store.is_following(session.user_id, author_id).await?;
    if let Err(e) = validate_follow(session.user_id, author_id, following) {
        log::warn!("{} can't subscribe to {author_id}: {e}", session.username);
        return Err(e);
    }
    if !store.add_follow(session.user_id, author_id).await? {
        return Err(RecipeError::DuplicateFollow);
    }
    log::info!("{} subscribed to {}", session.username, author.username);

    subscription_view(store, ctx, author, recipes_limit).await
}

/// Removing a subscription that does not exist is not an error.
pub async fn unsubscribe<S: RecipeStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    author_id: Uuid,
) -> Result<(), RecipeError> {
    let session = ctx.require_user()?;
    session.authenticate(ActionType::ManageOwnLists)?;
    let author = get_user(store, author_id).await?;

    if store.remove_follow(session.user_id, author_id).await? {
        log::info!("{} unsubscribed from {}", session.username, author.username);
    }

    Ok(())
}

pub async fn list_subscriptions<S: RecipeStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    query: &PageQuery,
    recipes_limit: Option<i64>,
) -> Result<PageContext<SubscriptionView>, RecipeError> {
    let session = ctx.require_user()?;
    let recipes_limit = check_recipes_limit(recipes_limit)?;

    let (authors, total) = store
        .list_following(session.user_id, query.limit(), query.offset())
        .await?;

    let mut views = Vec::with_capacity(authors.len());
    for author in authors {
        views.push(subscription_view(store, ctx, author, recipes_limit).await?);
    }

    Ok(PageContext::from_rows(views, total, query))
}
