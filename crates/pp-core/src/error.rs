use pp_types::{EXERCISE_MESSAGE, Requirement};
use thiserror::Error;

/// Rejected user actions. Silent corrections never surface here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ModeError {
    #[error("automatic mode requirement not met: {requirement}")]
    RequirementNotMet { requirement: Requirement },
    #[error("exercise mode needs automatic mode enabled first")]
    ExercisePreconditionNotMet,
    #[error("no exercise duration is awaiting confirmation")]
    ExerciseNotPending,
    #[error("exercise duration of {minutes} minutes is outside 1..=120")]
    InvalidExerciseDuration { minutes: u32 },
}

impl ModeError {
    /// Text handed to the message display, if the rejection is user-facing.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            ModeError::RequirementNotMet { requirement } => Some(requirement.message()),
            ModeError::ExercisePreconditionNotMet => Some(EXERCISE_MESSAGE),
            ModeError::ExerciseNotPending | ModeError::InvalidExerciseDuration { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("missing UI element `{0}`")]
    MissingElement(String),
}
