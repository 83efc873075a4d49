use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("Player already registered: {0}")]
    DuplicateId(String),
    #[error("Unknown player: {0}")]
    UnknownPlayer(String),
    #[error("Game already started")]
    AlreadyStarted,
    #[error("Game not started")]
    NotStarted,
    #[error("No round in progress")]
    NoRoundInProgress,
    #[error("Round is still in progress")]
    RoundNotFinished,
    #[error("Game already finished")]
    GameFinished,
    #[error("Game not finished")]
    NotFinished,
    #[error("Turn order corrupted: no round-active player found")]
    TurnOrderCorrupted,
}
