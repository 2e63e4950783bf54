pub mod classify;
pub mod config;
pub mod controller;
pub mod error;
pub mod glob;
pub mod naming;
pub mod notifier;
pub mod outcome;
pub mod sandbox;
pub mod session;
pub mod targets;

pub use error::{RespecError, Result};
pub use outcome::{Outcome, RunStatus};
