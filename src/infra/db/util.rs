use crate::application::repos::RepoError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const NOT_NULL_VIOLATION: &str = "23502";
const INVALID_TEXT_REPRESENTATION: &str = "22P02";
const QUERY_CANCELED: &str = "57014";

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => classify(
            db.code().as_deref(),
            db.message(),
            db.constraint(),
        ),
        other => RepoError::from_persistence(other),
    }
}

fn classify(code: Option<&str>, message: &str, constraint: Option<&str>) -> RepoError {
    match code {
        Some(UNIQUE_VIOLATION) => RepoError::Duplicate {
            constraint: constraint.unwrap_or("unknown").to_string(),
        },
        Some(FOREIGN_KEY_VIOLATION | INVALID_TEXT_REPRESENTATION) => RepoError::InvalidInput {
            message: message.to_string(),
        },
        Some(CHECK_VIOLATION | NOT_NULL_VIOLATION) => RepoError::Integrity {
            message: message.to_string(),
        },
        Some(QUERY_CANCELED) => RepoError::Timeout,
        _ => RepoError::Persistence(message.to_string()),
    }
}
