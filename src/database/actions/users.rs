use super::aggregation::is_subscribed;
use crate::{
    context::RequestContext,
    pagination::{PageContext, PageQuery},
    schema::{User, UserView, Uuid},
    store::RecipeStore,
    RecipeError,
};

pub async fn user_view<S: RecipeStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    user: User,
) -> Result<UserView, RecipeError> {
    let subscribed = is_subscribed(store, ctx, user.id).await?;
    Ok(UserView::from_user(user, subscribed))
}

pub async fn get_user<S: RecipeStore + ?Sized>(store: &S, id: Uuid) -> Result<User, RecipeError> {
    store
        .get_user(id)
        .await?
        .ok_or_else(|| RecipeError::not_found("User", id))
}

pub async fn get_user_view<S: RecipeStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    id: Uuid,
) -> Result<UserView, RecipeError> {
    let user = get_user(store, id).await?;
    user_view(store, ctx, user).await
}

pub async fn list_users<S: RecipeStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    query: &PageQuery,
) -> Result<PageContext<UserView>, RecipeError> {
    let (rows, total) = store.list_users(query.limit(), query.offset()).await?;

    let mut views = Vec::with_capacity(rows.len());
    for user in rows {
        views.push(user_view(store, ctx, user).await?);
    }

    Ok(PageContext::from_rows(views, total, query))
}

pub async fn me<S: RecipeStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
) -> Result<UserView, RecipeError> {
    let session = ctx.require_user()?;
    let user = get_user(store, session.user_id).await?;

    Ok(UserView::from_user(user, false))
}
