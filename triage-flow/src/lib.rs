pub mod error;
pub mod flow;
pub mod runner;
pub mod step;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use error::{FlowError, Result};
pub use flow::{ExecutionResult, ExecutionStatus, Flow, FlowBuilder};
pub use runner::FlowRunner;
pub use step::{NextAction, Step, StepResult};
pub use storage::{InMemorySessionStorage, Session, SessionStorage};
pub use store::SessionStore;
