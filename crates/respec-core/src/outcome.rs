use std::fmt;

/// Terminal classification of a single session command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every example passed, or the target loaded cleanly.
    Success,
    /// Tests ran and at least one failed.
    RuntimeFailure,
    /// The target did not compile, link, or load.
    CompileFailure,
    /// The toolchain itself could not be brought up. Terminal for the session.
    LoadingFailure,
}

impl Outcome {
    /// Project the outcome onto the run history the controller tracks.
    ///
    /// `LoadingFailure` is a property of the session, not of the code under
    /// test, so it never becomes run history.
    pub fn run_status(self) -> Option<RunStatus> {
        match self {
            Outcome::Success => Some(RunStatus::Success),
            Outcome::RuntimeFailure => Some(RunStatus::RuntimeFailure),
            Outcome::CompileFailure => Some(RunStatus::CompileFailure),
            Outcome::LoadingFailure => None,
        }
    }

    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::RuntimeFailure => write!(f, "runtime failure"),
            Outcome::CompileFailure => write!(f, "compile failure"),
            Outcome::LoadingFailure => write!(f, "loading failure"),
        }
    }
}

/// Outcome of the most recent run, as remembered by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Success,
    RuntimeFailure,
    CompileFailure,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::RuntimeFailure => write!(f, "runtime failure"),
            RunStatus::CompileFailure => write!(f, "compile failure"),
        }
    }
}
