use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use super::jwt::{verify_jwt_session, SessionData};
use crate::{constants::SESSION_COOKIE, context::RequestContext};

fn bearer(header: Option<String>) -> Option<String> {
    header.and_then(|value| {
        value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("Token "))
            .map(|token| token.trim().to_string())
    })
}

/// Resolves the caller from the `session` cookie or an `Authorization` header.
/// Missing and invalid tokens both yield an anonymous context.
pub fn with_context(
    secret: Arc<[u8]>,
) -> impl Filter<Extract = (RequestContext,), Error = Rejection> + Clone {
    warp::cookie::optional::<String>(SESSION_COOKIE)
        .and(warp::header::optional::<String>("authorization"))
        .map(move |cookie: Option<String>, header: Option<String>| {
            match cookie.or_else(|| bearer(header)) {
                Some(token) => match verify_jwt_session(&token, &secret) {
                    Ok(data) => RequestContext::authenticated(SessionData::from(data)),
                    Err(e) => {
                        log::warn!("Ignoring session token: {e}");
                        RequestContext::anonymous()
                    }
                },
                None => RequestContext::anonymous(),
            }
        })
}
