pub mod queries;
pub mod types;
pub mod workflow;

pub use queries::*;
pub use types::*;
pub use workflow::WorkflowError;
