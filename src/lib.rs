// Library interface for execbox
// The binary and the tests import the modules through here

pub mod cli;
pub mod config;
pub mod executor;
pub mod limits;
pub mod logging;
pub mod os;
pub mod prelude;
pub mod request;
pub mod webapp;

pub use executor::Executor;
pub use limits::Limits;
pub use os::ExecutionResult;
pub use request::{ExecutionRequest, ValidationError};
