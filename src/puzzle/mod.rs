pub mod attempt;
pub mod loader;
pub mod rules;
pub mod types;

pub use attempt::{Answers, AttemptStatus, PuzzleAttempt, SubmitOutcome, MAX_ERRORS};
pub use loader::{builtin_rooms, load_floor};
pub use types::{InputKind, Room, RowStatus};
