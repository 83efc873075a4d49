use farao_engine::errors::GameError;
use thiserror::Error;

use crate::session::GameId;

/// Errors surfaced by the session layer. Engine errors pass through
/// untranslated; everything else is a lobby-level failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Game not found: {0}")]
    GameNotFound(GameId),
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Game is full: {0}")]
    GameFull(GameId),
    #[error("Already joined game: {0}")]
    AlreadyInGame(GameId),
    #[error("Not a member of game: {0}")]
    NotInGame(GameId),
    #[error("Session storage lock poisoned")]
    StoragePoisoned,
    #[error(transparent)]
    Engine(#[from] GameError),
}

impl SessionError {
    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::GameNotFound(_) => "game_not_found",
            Self::UserNotFound(_) => "user_not_found",
            Self::GameFull(_) => "game_session_full",
            Self::AlreadyInGame(_) => "game_already_in",
            Self::NotInGame(_) => "game_not_in",
            Self::StoragePoisoned => "internal_error",
            Self::Engine(_) => "game_engine_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(SessionError::GameNotFound("g".into()).code(), "game_not_found");
        assert_eq!(SessionError::GameFull("g".into()).code(), "game_session_full");
        assert_eq!(SessionError::AlreadyInGame("g".into()).code(), "game_already_in");
        assert_eq!(SessionError::NotInGame("g".into()).code(), "game_not_in");
        assert_eq!(
            SessionError::Engine(GameError::AlreadyStarted).code(),
            "game_engine_error"
        );
    }

    #[test]
    fn engine_errors_convert_transparently() {
        let err: SessionError = GameError::GameFinished.into();
        assert_eq!(err, SessionError::Engine(GameError::GameFinished));
        assert_eq!(err.to_string(), "Game already finished");
    }
}
