use super::recipes::get_recipe;
use crate::{
    authentication::permissions::ActionType,
    context::RequestContext,
    schema::{EntryKind, RecipeSummary, Uuid},
    store::RecipeStore,
    RecipeError,
};

/// Puts the recipe on the requester's favorites or shopping cart.
pub async fn add_entry<S: RecipeStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    kind: EntryKind,
    recipe_id: Uuid,
) -> Result<RecipeSummary, RecipeError> {
    let session = ctx.require_user()?;
    session.authenticate(ActionType::ManageOwnLists)?;
    let recipe = get_recipe(store, recipe_id).await?;

    if store.has_entry(kind, session.user_id, recipe_id).await? {
        log::warn!("{} already has recipe {recipe_id} in {kind}", session.username);
        return Err(RecipeError::AlreadyExists(kind));
    }
    // lost a race against an identical request
    if !store.add_entry(kind, session.user_id, recipe_id).await? {
        return Err(RecipeError::AlreadyExists(kind));
    }
    log::info!("{} added recipe {recipe_id} to {kind}", session.username);

    Ok(RecipeSummary::from(&recipe))
}

pub async fn remove_entry<S: RecipeStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    kind: EntryKind,
    recipe_id: Uuid,
) -> Result<(), RecipeError> {
    let session = ctx.require_user()?;
    session.authenticate(ActionType::ManageOwnLists)?;
    get_recipe(store, recipe_id).await?;

    if !store.remove_entry(kind, session.user_id, recipe_id).await? {
        log::warn!("{} has no recipe {recipe_id} in {kind}", session.username);
        return Err(RecipeError::EntryNotFound(kind));
    }
    log::info!("{} removed recipe {recipe_id} from {kind}", session.username);

    Ok(())
}
