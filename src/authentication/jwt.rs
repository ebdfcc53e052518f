use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::constants::SESSION_LIFETIME_HOURS;
use crate::schema::{UserRole, Uuid};
use crate::RecipeError;

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Uuid, username: String, role: UserRole) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(SESSION_LIFETIME_HOURS)).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), RecipeError> {
        if !action.authenticate(self) {
            return Err(RecipeError::PermissionDenied);
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            user_id: value.user_id,
            username: value.username,
            role: value.role,
        }
    }
}

fn signing_key(secret: &[u8]) -> Result<Hmac<Sha256>, RecipeError> {
    Hmac::new_from_slice(secret)
        .map_err(|e| RecipeError::InvalidInput(format!("Invalid session key: {e}")))
}

#[cfg(test)]
pub(crate) fn generate_jwt_session(
    user: &crate::schema::User,
    secret: &[u8],
) -> Result<String, RecipeError> {
    use jwt::SignWithKey;

    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(user.id, user.username.to_owned(), user.role.to_owned());

    claims.sign_with_key(&key).map_err(|e| {
        log::error!("Failed to sign session for {}: {e}", user.username);
        RecipeError::Unauthenticated
    })
}

pub fn verify_jwt_session(token: &str, secret: &[u8]) -> Result<JwtSessionData, RecipeError> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token.verify_with_key(&key).map_err(|e| {
        log::debug!("Rejected session token: {e}");
        RecipeError::Unauthenticated
    })?;

    if (session.exp - Local::now().timestamp()).is_negative() {
        log::debug!("Session of {} expired", session.username);
        return Err(RecipeError::Unauthenticated);
    }
    Ok(session)
}
