use thiserror::Error;

use crate::puzzle::AttemptStatus;
use crate::story::Stage;

/// Rejections raised by the game state machines.
///
/// A wrong answer is not an error: it is a normal outcome that costs time.
/// These variants cover actions the current state does not accept.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("the session has not been started")]
    NotStarted,

    #[error("the session is already finished")]
    Finished,

    #[error("unknown room: {0}")]
    UnknownRoom(String),

    #[error("room {0} is locked")]
    RoomLocked(String),

    #[error("no room is open")]
    NoActiveRoom,

    #[error("attempt is {0}; reset it before answering again")]
    AttemptClosed(AttemptStatus),

    #[error("missing answer for {0}")]
    MissingAnswer(String),

    #[error("action not available during {0}")]
    WrongStage(Stage),

    #[error("invalid content: {0}")]
    InvalidContent(String),
}
