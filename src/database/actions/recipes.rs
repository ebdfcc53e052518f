use super::{
    aggregation::{is_favorited, is_in_shopping_cart},
    users::{get_user, user_view},
};
use crate::{
    authentication::permissions::ActionType,
    context::RequestContext,
    jwt::SessionData,
    media::MediaStorage,
    pagination::{PageContext, PageQuery},
    schema::{Recipe, RecipeFilter, RecipeView, Uuid},
    store::RecipeStore,
    validation::{validate_recipe, RecipeDraft, ValidRecipe},
    RecipeError,
};

/// Recipe list query. `tags` may repeat, a recipe matches any of the slugs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeQuery {
    pub page: PageQuery,
    pub author: Option<Uuid>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

fn parse_flag(key: &str, value: &str) -> Result<bool, RecipeError> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(RecipeError::InvalidInput(format!(
            "Query parameter `{key}` must be 0 or 1"
        ))),
    }
}

fn parse_number(key: &str, value: &str) -> Result<i64, RecipeError> {
    value.parse().map_err(|_e| {
        RecipeError::InvalidInput(format!("Query parameter `{key}` must be an integer"))
    })
}

impl TryFrom<Vec<(String, String)>> for RecipeQuery {
    type Error = RecipeError;

    fn try_from(pairs: Vec<(String, String)>) -> Result<Self, Self::Error> {
        let mut query = RecipeQuery::default();

        for (key, value) in pairs {
            match key.as_str() {
                "page" => query.page.page = Some(parse_number(&key, &value)?),
                "limit" => query.page.limit = Some(parse_number(&key, &value)?),
                "author" => {
                    let author = parse_number(&key, &value)?;
                    query.author = Some(Uuid::try_from(author).map_err(|_e| {
                        RecipeError::InvalidInput(String::from("Unknown author"))
                    })?);
                }
                "tags" => query.tags.push(value),
                "is_favorited" => query.is_favorited = parse_flag(&key, &value)?,
                "is_in_shopping_cart" => query.is_in_shopping_cart = parse_flag(&key, &value)?,
                _ => {}
            }
        }

        Ok(query)
    }
}

pub async fn recipe_view<S: RecipeStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    recipe: Recipe,
) -> Result<RecipeView, RecipeError> {
    let author = get_user(store, recipe.author_id).await?;

    Ok(RecipeView {
        id: recipe.id,
        tags: store.list_recipe_tags(recipe.id).await?,
        author: user_view(store, ctx, author).await?,
        ingredients: store.list_recipe_ingredients(recipe.id).await?,
        is_favorited: is_favorited(store, ctx, recipe.id).await?,
        is_in_shopping_cart: is_in_shopping_cart(store, ctx, recipe.id).await?,
        name: recipe.name,
        image: recipe.image,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
    })
}

pub async fn get_recipe<S: RecipeStore + ?Sized>(
    store: &S,
    id: Uuid,
) -> Result<Recipe, RecipeError> {
    store
        .get_recipe(id)
        .await?
        .ok_or_else(|| RecipeError::not_found("Recipe", id))
}

pub async fn get_recipe_view<S: RecipeStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    id: Uuid,
) -> Result<RecipeView, RecipeError> {
    let recipe = get_recipe(store, id).await?;
    recipe_view(store, ctx, recipe).await
}

pub async fn list_recipes<S: RecipeStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    query: &RecipeQuery,
) -> Result<PageContext<RecipeView>, RecipeError> {
    // list filters only apply to a known requester
    let user_id = ctx.user_id();
    let filter = RecipeFilter {
        author: query.author,
        tags: query.tags.to_owned(),
        favorited_by: user_id.filter(|_| query.is_favorited),
        in_cart_of: user_id.filter(|_| query.is_in_shopping_cart),
    };

    let (rows, total) = store
        .list_recipes(&filter, query.page.limit(), query.page.offset())
        .await?;

    let mut views = Vec::with_capacity(rows.len());
    for recipe in rows {
        views.push(recipe_view(store, ctx, recipe).await?);
    }

    Ok(PageContext::from_rows(views, total, &query.page))
}

/// Fetches a recipe the session is allowed to modify.
pub async fn get_recipe_mut<S: RecipeStore + ?Sized>(
    store: &S,
    session: &SessionData,
    id: Uuid,
) -> Result<Recipe, RecipeError> {
    let recipe = get_recipe(store, id).await?;

    if recipe.author_id == session.user_id {
        session.authenticate(ActionType::ManageOwnRecipes)?;
    } else {
        session.authenticate(ActionType::ManageAllRecipes)?;
    }

    Ok(recipe)
}

async fn check_references<S: RecipeStore + ?Sized>(
    store: &S,
    recipe: &ValidRecipe,
) -> Result<(), RecipeError> {
    for tag in &recipe.tags {
        if store.get_tag(*tag).await?.is_none() {
            return Err(RecipeError::not_found("Tag", *tag));
        }
    }
    for ingredient in &recipe.ingredients {
        if store.get_ingredient(ingredient.id).await?.is_none() {
            return Err(RecipeError::not_found("Ingredient", ingredient.id));
        }
    }
    Ok(())
}

pub async fn create_recipe<S: RecipeStore + ?Sized>(
    store: &S,
    media: &MediaStorage,
    ctx: &RequestContext,
    draft: RecipeDraft,
) -> Result<RecipeView, RecipeError> {
    let session = ctx.require_user()?;
    session.authenticate(ActionType::CreateRecipes)?;

    let mut recipe = validate_recipe(draft)?;
    let image = recipe
        .image
        .take()
        .ok_or_else(|| RecipeError::InvalidInput(String::from("Field `image` is required")))?;
    check_references(store, &recipe).await?;

    let path = media.save(&image).await?;
    let id = match store
        .insert_recipe(session.user_id, &recipe.into_record(Some(path.to_owned())))
        .await
    {
        Ok(id) => id,
        Err(e) => {
            media.remove(&path).await;
            return Err(e);
        }
    };
    log::info!("{} created recipe {id}", session.username);

    get_recipe_view(store, ctx, id).await
}

/// Replaces every field of the recipe. Tags and ingredients are swapped
/// wholesale, the image is kept when the draft carries none.
pub async fn update_recipe<S: RecipeStore + ?Sized>(
    store: &S,
    media: &MediaStorage,
    ctx: &RequestContext,
    id: Uuid,
    draft: RecipeDraft,
) -> Result<RecipeView, RecipeError> {
    let session = ctx.require_user()?;
    let current = get_recipe_mut(store, session, id).await?;

    let mut recipe = validate_recipe(draft)?;
    check_references(store, &recipe).await?;

    let path = match recipe.image.take() {
        Some(image) => Some(media.save(&image).await?),
        None => None,
    };

    if let Err(e) = store
        .replace_recipe(id, &recipe.into_record(path.to_owned()))
        .await
    {
        if let Some(path) = &path {
            media.remove(path).await;
        }
        return Err(e);
    }
    if path.is_some() {
        media.remove(&current.image).await;
    }
    log::info!("{} updated recipe {id}", session.username);

    get_recipe_view(store, ctx, id).await
}

pub async fn delete_recipe<S: RecipeStore + ?Sized>(
    store: &S,
    media: &MediaStorage,
    ctx: &RequestContext,
    id: Uuid,
) -> Result<(), RecipeError> {
    let session = ctx.require_user()?;
    let recipe = get_recipe_mut(store, session, id).await?;

    if !store.delete_recipe(id).await? {
        return Err(RecipeError::not_found("Recipe", id));
    }
    media.remove(&recipe.image).await;
    log::info!("{} deleted recipe {id}", session.username);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(values: &[(&str, &str)]) -> Vec<(String, String)> {
        values
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_repeated_tags_and_flags() {
        let query = RecipeQuery::try_from(pairs(&[
            ("tags", "breakfast"),
            ("tags", "lunch"),
            ("is_favorited", "1"),
            ("author", "3"),
            ("page", "2"),
            ("unknown", "x"),
        ]))
        .unwrap();

        assert_eq!(query.tags, vec!["breakfast", "lunch"]);
        assert!(query.is_favorited);
        assert!(!query.is_in_shopping_cart);
        assert_eq!(query.author, Some(3));
        assert_eq!(query.page.page(), 2);
    }

    #[test]
    fn rejects_malformed_query() {
        assert!(RecipeQuery::try_from(pairs(&[("is_favorited", "yes")])).is_err());
        assert!(RecipeQuery::try_from(pairs(&[("limit", "many")])).is_err());
    }
}
