use std::fmt::{self, Display};

use thiserror::Error;
use warp::{http::StatusCode, reject::Rejection};

use crate::schema::{EntryKind, Uuid};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecipeError {
    #[error("Field `{0}` must not be empty")]
    EmptyCollection(&'static str),

    #[error("Ingredient {0} is listed more than once")]
    DuplicateIngredient(Uuid),

    #[error("Field `{0}` must be greater than zero")]
    NonPositiveValue(&'static str),

    #[error("You can't subscribe to yourself")]
    SelfFollow,

    #[error("You are already subscribed to this user")]
    DuplicateFollow,

    #[error("Recipe is already added to {0}")]
    AlreadyExists(EntryKind),

    #[error("Recipe is already removed from {0}")]
    EntryNotFound(EntryKind),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Authentication credentials were not provided")]
    Unauthenticated,

    #[error("You don't have permission to perform this action")]
    PermissionDenied,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    Query(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Media storage error: {0}")]
    Media(String),
}

impl RecipeError {
    pub fn not_found(entity: &str, id: Uuid) -> Self {
        Self::NotFound(format!("{entity} {id}"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RecipeError::EmptyCollection(_)
            | RecipeError::DuplicateIngredient(_)
            | RecipeError::NonPositiveValue(_)
            | RecipeError::SelfFollow
            | RecipeError::DuplicateFollow
            | RecipeError::AlreadyExists(_)
            | RecipeError::EntryNotFound(_)
            | RecipeError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RecipeError::Unauthenticated => StatusCode::UNAUTHORIZED,
            RecipeError::PermissionDenied => StatusCode::FORBIDDEN,
            RecipeError::NotFound(_) => StatusCode::NOT_FOUND,
            RecipeError::Query(_) | RecipeError::Cache(_) | RecipeError::Media(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Carries a [`RecipeError`] through warp's rejection chain.
#[derive(Debug)]
pub struct ApiRejection(pub RecipeError);

impl warp::reject::Reject for ApiRejection {}

impl From<RecipeError> for Rejection {
    fn from(value: RecipeError) -> Self {
        warp::reject::custom(ApiRejection(value))
    }
}

pub struct QueryError {
    info: String,
    code: Option<String>,
    constraint: Option<String>,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            info,
            code: None,
            constraint: None,
        }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => Self {
                info: format!("{e}"),
                code: e.code().map(|code| code.into_owned()),
                constraint: e.constraint().map(str::to_owned),
            },
            sqlx::Error::RowNotFound => Self::new(format!("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("Column not found: {e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::PoolTimedOut => Self::new(format!("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(format!("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(format!("Worker crashed")),
            e => Self::new(format!("{e}")),
        }
    }
}

impl From<QueryError> for RecipeError {
    fn from(value: QueryError) -> Self {
        match (value.code.as_deref(), value.constraint.as_deref()) {
            // foreign_key_violation
            (Some("23503"), _) => RecipeError::NotFound(String::from("Referenced row")),
            (Some("23505"), Some("follows_unique_pair")) => RecipeError::DuplicateFollow,
            (Some("23514"), Some("follows_prevent_self_follow")) => RecipeError::SelfFollow,
            (Some("23514"), _) => RecipeError::InvalidInput(value.info),
            _ => {
                log::error!("Query failed: {}", value.info);
                RecipeError::Query(value.info)
            }
        }
    }
}

pub struct CacheError {
    info: String,
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        Self {
            info: format!("{:?} - {:?}", value.code(), value.detail()),
        }
    }
}

impl From<CacheError> for RecipeError {
    fn from(value: CacheError) -> Self {
        RecipeError::Cache(value.info)
    }
}

#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info)
    }
}

impl std::error::Error for TypeError {}

impl From<TypeError> for RecipeError {
    fn from(value: TypeError) -> Self {
        RecipeError::InvalidInput(value.info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_bad_requests() {
        assert_eq!(
            RecipeError::EmptyCollection("tags").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RecipeError::AlreadyExists(EntryKind::Favorite).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RecipeError::EntryNotFound(EntryKind::ShoppingCart).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(RecipeError::SelfFollow.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_entities_are_not_found() {
        let error = RecipeError::not_found("Recipe", 7);
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
        assert_eq!(error.to_string(), "Recipe 7 not found");
    }

    #[test]
    fn auth_and_store_failures_keep_their_status() {
        assert_eq!(
            RecipeError::Unauthenticated.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(RecipeError::PermissionDenied.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            RecipeError::Media(String::from("disk full")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn constraint_violations_map_to_domain_errors() {
        let error = QueryError {
            info: String::from("duplicate key"),
            code: Some(String::from("23505")),
            constraint: Some(String::from("follows_unique_pair")),
        };
        assert_eq!(RecipeError::from(error), RecipeError::DuplicateFollow);

        let error = QueryError {
            info: String::from("violates foreign key constraint"),
            code: Some(String::from("23503")),
            constraint: None,
        };
        assert!(matches!(RecipeError::from(error), RecipeError::NotFound(_)));
    }
}
