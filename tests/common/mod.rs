#![allow(dead_code)]

use std::sync::Arc;

use foodgram_sdk::{
    context::RequestContext,
    jwt::{JwtSessionData, SessionData},
    media::{ImageSource, MediaStorage},
    memory::MemoryStore,
    schema::{Ingredient, IngredientAmount, Tag, User, UserRole},
    validation::RecipeDraft,
};
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use sha2::Sha256;
use tempfile::TempDir;

pub const SECRET: &[u8] = b"integration-secret";
pub const IMAGE: &str = "data:image/png;base64,aGVsbG8=";

pub struct Kitchen {
    pub store: Arc<MemoryStore>,
    pub media: MediaStorage,
    pub cook: User,
    pub guest: User,
    pub admin: User,
    pub breakfast: Tag,
    pub lunch: Tag,
    pub salt: Ingredient,
    pub flour: Ingredient,
    pub pepper: Ingredient,
    _media_dir: TempDir,
}

impl Kitchen {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let media_dir = tempfile::tempdir().unwrap();

        Self {
            media: MediaStorage::new(media_dir.path()),
            cook: store.insert_user("cook", UserRole::User).await,
            guest: store.insert_user("guest", UserRole::User).await,
            admin: store.insert_user("admin", UserRole::Admin).await,
            breakfast: store.insert_tag("Breakfast", "#E26C2D", "breakfast").await,
            lunch: store.insert_tag("Lunch", "#49B64E", "lunch").await,
            salt: store.insert_ingredient("Salt", "g").await,
            flour: store.insert_ingredient("Flour", "g").await,
            pepper: store.insert_ingredient("Pepper", "g").await,
            store,
            _media_dir: media_dir,
        }
    }
}

pub fn context(user: &User) -> RequestContext {
    RequestContext::authenticated(SessionData {
        user_id: user.id,
        username: user.username.to_owned(),
        role: user.role.to_owned(),
    })
}

/// Signs a session the way the identity provider does.
pub fn session_token(user: &User) -> String {
    let key: Hmac<Sha256> = Hmac::new_from_slice(SECRET).unwrap();
    JwtSessionData::new(user.id, user.username.to_owned(), user.role.to_owned())
        .sign_with_key(&key)
        .unwrap()
}

pub fn draft(name: &str, tags: &[&Tag], ingredients: &[(&Ingredient, i32)]) -> RecipeDraft {
    RecipeDraft {
        tags: tags.iter().map(|tag| tag.id).collect(),
        ingredients: ingredients
            .iter()
            .map(|(ingredient, amount)| IngredientAmount {
                id: ingredient.id,
                amount: *amount,
            })
            .collect(),
        name: name.to_string(),
        text: String::from("Mix everything and wait"),
        cooking_time: 20,
        image: Some(ImageSource::DataUri(IMAGE.to_string())),
    }
}
