use serenity::http::HttpError;
use thiserror::Error;

/// Failures of room operations against Discord and the database.
///
/// `Gone` is deliberately separate from `Platform`: a channel or message
/// that no longer exists is a success-equivalent outcome for teardown
/// paths and triggers row cleanup instead of a retry.
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("channel or message no longer exists")]
    Gone,
    #[error("discord request failed: {0}")]
    Platform(#[from] serenity::Error),
    #[error("database error: {0}")]
    Db(#[from] diesel::result::Error),
}

/// True when the error is Discord telling us the entity does not exist.
pub fn is_not_found(err: &serenity::Error) -> bool {
    match err {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) => {
            resp.status_code == serenity::http::StatusCode::NOT_FOUND
        }
        _ => false,
    }
}
