//! HTTP surface over the actions. Every handler resolves the caller through
//! [`with_context`] and turns [`RecipeError`] into a JSON `{"errors": ...}` reply.

use std::{convert::Infallible, sync::Arc};

use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    reply::{json, with_header, with_status, Response},
    Filter, Rejection, Reply,
};

use crate::{
    actions::{
        entries::{add_entry, remove_entry},
        ingredients::{get_ingredient, search_ingredients},
        recipes::{
            create_recipe, delete_recipe, get_recipe_view, list_recipes, update_recipe,
            RecipeQuery,
        },
        shopping_list::download_shopping_list,
        subscriptions::{list_subscriptions, subscribe, unsubscribe},
        tags::{get_tag, list_tags},
        users::{get_user_view, list_users, me},
    },
    constants::{MAX_BODY_SIZE, SHOPPING_LIST_FILENAME},
    context::RequestContext,
    error::ApiRejection,
    form::{read_multipart, Form, FormData},
    media::MediaStorage,
    middleware::with_context,
    pagination::PageQuery,
    schema::{EntryKind, Uuid},
    store::RecipeStore,
    validation::RecipeDraft,
    RecipeError,
};

/// Everything a handler needs, cloned into each request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecipeStore>,
    pub media: MediaStorage,
    pub jwt_secret: Arc<[u8]>,
    pub cache: Option<MultiplexedConnection>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecipeStore>, media: MediaStorage, jwt_secret: &[u8]) -> Self {
        Self {
            store,
            media,
            jwt_secret: Arc::from(jwt_secret),
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: MultiplexedConnection) -> Self {
        self.cache = Some(cache);
        self
    }
}

#[derive(Serialize)]
struct ErrorBody {
    errors: String,
}

#[derive(Deserialize)]
struct IngredientQuery {
    name: Option<String>,
}

#[derive(Deserialize)]
struct SubscriptionQuery {
    page: Option<i64>,
    limit: Option<i64>,
    recipes_limit: Option<i64>,
}

#[derive(Deserialize)]
struct RecipesLimit {
    recipes_limit: Option<i64>,
}

fn json_reply<T: Serialize>(value: &T, status: StatusCode) -> Response {
    with_status(json(value), status).into_response()
}

fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn with_caller(
    state: &AppState,
) -> impl Filter<Extract = (RequestContext,), Error = Rejection> + Clone {
    with_context(state.jwt_secret.clone())
}

/// Recipe payload as JSON, or as `multipart/form-data` with an uploaded image.
fn recipe_body() -> impl Filter<Extract = (RecipeDraft,), Error = Rejection> + Clone {
    let json = warp::body::content_length_limit(MAX_BODY_SIZE)
        .and(warp::body::json::<FormData>())
        .and_then(|data: FormData| async move {
            RecipeDraft::try_from(Form::from_data(data))
                .map_err(|e| Rejection::from(RecipeError::from(e)))
        });

    let multipart = warp::multipart::form()
        .max_length(MAX_BODY_SIZE)
        .and_then(|data: warp::multipart::FormData| async move {
            read_multipart(data)
                .await
                .map_err(|e| Rejection::from(RecipeError::from(e)))
        });

    json.or(multipart).unify()
}

/// All API routes plus `/media` file serving, with errors rendered as JSON.
pub fn routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let media = warp::path("media")
        .and(warp::fs::dir(state.media.root().to_path_buf()))
        .map(|file: warp::fs::File| file.into_response());

    warp::path("api")
        .and(
            tag_routes(state.clone())
                .or(ingredient_routes(state.clone()))
                .unify()
                .or(recipe_routes(state.clone()))
                .unify()
                .or(user_routes(state))
                .unify(),
        )
        .or(media)
        .unify()
        .recover(handle_rejection)
}

// Tags

fn tag_routes(state: AppState) -> BoxedFilter<(Response,)> {
    let list = warp::path!("tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_list_tags);

    let detail = warp::path!("tags" / Uuid)
        .and(warp::get())
        .and(with_state(state))
        .and_then(handle_get_tag);

    list.or(detail).unify().boxed()
}

async fn handle_list_tags(state: AppState) -> Result<Response, Rejection> {
    let tags = list_tags(&*state.store, state.cache.clone()).await?;
    Ok(json_reply(&tags, StatusCode::OK))
}

async fn handle_get_tag(id: Uuid, state: AppState) -> Result<Response, Rejection> {
    let tag = get_tag(&*state.store, id).await?;
    Ok(json_reply(&tag, StatusCode::OK))
}

// Ingredients

fn ingredient_routes(state: AppState) -> BoxedFilter<(Response,)> {
    let list = warp::path!("ingredients")
        .and(warp::get())
        .and(warp::query::<IngredientQuery>())
        .and(with_state(state.clone()))
        .and_then(handle_search_ingredients);

    let detail = warp::path!("ingredients" / Uuid)
        .and(warp::get())
        .and(with_state(state))
        .and_then(handle_get_ingredient);

    list.or(detail).unify().boxed()
}

async fn handle_search_ingredients(
    query: IngredientQuery,
    state: AppState,
) -> Result<Response, Rejection> {
    let ingredients =
        search_ingredients(&*state.store, state.cache.clone(), query.name.as_deref()).await?;
    Ok(json_reply(&ingredients, StatusCode::OK))
}

async fn handle_get_ingredient(id: Uuid, state: AppState) -> Result<Response, Rejection> {
    let ingredient = get_ingredient(&*state.store, id).await?;
    Ok(json_reply(&ingredient, StatusCode::OK))
}

// Recipes

fn recipe_routes(state: AppState) -> BoxedFilter<(Response,)> {
    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_caller(&state))
        .and(with_state(state.clone()))
        .and_then(handle_download_shopping_cart);

    let list = warp::path!("recipes")
        .and(warp::get())
        .and(warp::query::<Vec<(String, String)>>())
        .and(with_caller(&state))
        .and(with_state(state.clone()))
        .and_then(handle_list_recipes);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_caller(&state))
        .and(recipe_body())
        .and(with_state(state.clone()))
        .and_then(handle_create_recipe);

    let detail = warp::path!("recipes" / Uuid)
        .and(warp::get())
        .and(with_caller(&state))
        .and(with_state(state.clone()))
        .and_then(handle_get_recipe);

    let update = warp::path!("recipes" / Uuid)
        .and(warp::put().or(warp::patch()).unify())
        .and(with_caller(&state))
        .and(recipe_body())
        .and(with_state(state.clone()))
        .and_then(handle_update_recipe);

    let delete = warp::path!("recipes" / Uuid)
        .and(warp::delete())
        .and(with_caller(&state))
        .and(with_state(state.clone()))
        .and_then(handle_delete_recipe);

    let favorite = warp::path!("recipes" / Uuid / "favorite")
        .map(|id: Uuid| (id, EntryKind::Favorite))
        .untuple_one();
    let cart = warp::path!("recipes" / Uuid / "shopping_cart")
        .map(|id: Uuid| (id, EntryKind::ShoppingCart))
        .untuple_one();
    let entry = favorite.or(cart).unify();

    let add = entry
        .clone()
        .and(warp::post())
        .and(with_caller(&state))
        .and(with_state(state.clone()))
        .and_then(handle_add_entry);

    let remove = entry
        .and(warp::delete())
        .and(with_caller(&state))
        .and(with_state(state))
        .and_then(handle_remove_entry);

    download
        .or(list)
        .unify()
        .or(create)
        .unify()
        .or(detail)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(add)
        .unify()
        .or(remove)
        .unify()
        .boxed()
}

async fn handle_list_recipes(
    pairs: Vec<(String, String)>,
    ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    let query = RecipeQuery::try_from(pairs)?;
    let page = list_recipes(&*state.store, &ctx, &query).await?;
    Ok(json_reply(&page, StatusCode::OK))
}

async fn handle_get_recipe(
    id: Uuid,
    ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    let recipe = get_recipe_view(&*state.store, &ctx, id).await?;
    Ok(json_reply(&recipe, StatusCode::OK))
}

async fn handle_create_recipe(
    ctx: RequestContext,
    draft: RecipeDraft,
    state: AppState,
) -> Result<Response, Rejection> {
    let recipe = create_recipe(&*state.store, &state.media, &ctx, draft).await?;
    Ok(json_reply(&recipe, StatusCode::CREATED))
}

async fn handle_update_recipe(
    id: Uuid,
    ctx: RequestContext,
    draft: RecipeDraft,
    state: AppState,
) -> Result<Response, Rejection> {
    let recipe = update_recipe(&*state.store, &state.media, &ctx, id, draft).await?;
    Ok(json_reply(&recipe, StatusCode::OK))
}

async fn handle_delete_recipe(
    id: Uuid,
    ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    delete_recipe(&*state.store, &state.media, &ctx, id).await?;
    Ok(no_content())
}

async fn handle_add_entry(
    id: Uuid,
    kind: EntryKind,
    ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    let summary = add_entry(&*state.store, &ctx, kind, id).await?;
    Ok(json_reply(&summary, StatusCode::CREATED))
}

async fn handle_remove_entry(
    id: Uuid,
    kind: EntryKind,
    ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    remove_entry(&*state.store, &ctx, kind, id).await?;
    Ok(no_content())
}

async fn handle_download_shopping_cart(
    ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    let text = download_shopping_list(&*state.store, &ctx).await?;

    let reply = with_header(text, "content-type", "text/plain; charset=utf-8");
    let reply = with_header(
        reply,
        "content-disposition",
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    );
    Ok(reply.into_response())
}

// Users

fn user_routes(state: AppState) -> BoxedFilter<(Response,)> {
    let list = warp::path!("users")
        .and(warp::get())
        .and(warp::query::<PageQuery>())
        .and(with_caller(&state))
        .and(with_state(state.clone()))
        .and_then(handle_list_users);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_caller(&state))
        .and(with_state(state.clone()))
        .and_then(handle_me);

    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(warp::query::<SubscriptionQuery>())
        .and(with_caller(&state))
        .and(with_state(state.clone()))
        .and_then(handle_list_subscriptions);

    let detail = warp::path!("users" / Uuid)
        .and(warp::get())
        .and(with_caller(&state))
        .and(with_state(state.clone()))
        .and_then(handle_get_user);

    let subscribe = warp::path!("users" / Uuid / "subscribe")
        .and(warp::post())
        .and(warp::query::<RecipesLimit>())
        .and(with_caller(&state))
        .and(with_state(state.clone()))
        .and_then(handle_subscribe);

    let unsubscribe = warp::path!("users" / Uuid / "subscribe")
        .and(warp::delete())
        .and(with_caller(&state))
        .and(with_state(state))
        .and_then(handle_unsubscribe);

    list.or(me)
        .unify()
        .or(subscriptions)
        .unify()
        .or(detail)
        .unify()
        .or(subscribe)
        .unify()
        .or(unsubscribe)
        .unify()
        .boxed()
}

async fn handle_list_users(
    query: PageQuery,
    ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    let page = list_users(&*state.store, &ctx, &query).await?;
    Ok(json_reply(&page, StatusCode::OK))
}

async fn handle_me(ctx: RequestContext, state: AppState) -> Result<Response, Rejection> {
    let user = me(&*state.store, &ctx).await?;
    Ok(json_reply(&user, StatusCode::OK))
}

async fn handle_get_user(
    id: Uuid,
    ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    let user = get_user_view(&*state.store, &ctx, id).await?;
    Ok(json_reply(&user, StatusCode::OK))
}

async fn handle_list_subscriptions(
    query: SubscriptionQuery,
    ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    };
    let subscriptions =
        list_subscriptions(&*state.store, &ctx, &page, query.recipes_limit).await?;
    Ok(json_reply(&subscriptions, StatusCode::OK))
}

async fn handle_subscribe(
    id: Uuid,
    query: RecipesLimit,
    ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    let subscription = subscribe(&*state.store, &ctx, id, query.recipes_limit).await?;
    Ok(json_reply(&subscription, StatusCode::CREATED))
}

async fn handle_unsubscribe(
    id: Uuid,
    ctx: RequestContext,
    state: AppState,
) -> Result<Response, Rejection> {
    unsubscribe(&*state.store, &ctx, id).await?;
    Ok(no_content())
}

// Errors

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if let Some(ApiRejection(e)) = err.find() {
        if e.status().is_server_error() {
            log::error!("Request failed: {e}");
        }
        (e.status(), e.to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, String::from("Not found"))
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid JSON body: {e}"))
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, String::from("Payload too large"))
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            String::from("Unsupported media type"),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, String::from("Method not allowed"))
    } else {
        log::error!("Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("Internal server error"),
        )
    };

    Ok(json_reply(&ErrorBody { errors: message }, status))
}
