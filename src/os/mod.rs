pub mod artifact;
pub mod capture;
pub mod kill;
pub mod outcome;
pub mod runner;

pub use artifact::{DecodeError, RunnableArtifact};
pub use capture::OutputCapture;
pub use kill::{DirectKill, GroupKill, KillMode, Terminator};
pub use outcome::{ExecutionResult, Outcome};
pub use runner::{Job, ProcessRunner, RunnerConfig};
