use crate::{jwt::SessionData, schema::Uuid, RecipeError};

/// Who is asking. Derived flags (`is_favorited`, `is_subscribed`, ...) are
/// always computed against this, anonymous requests see them as `false`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    session: Option<SessionData>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self { session: None }
    }

    pub fn authenticated(session: SessionData) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|session| session.user_id)
    }

    pub fn require_user(&self) -> Result<&SessionData, RecipeError> {
        self.session.as_ref().ok_or(RecipeError::Unauthenticated)
    }
}
