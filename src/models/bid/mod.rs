pub mod comments;
pub mod queries;
pub mod types;
pub mod workflow;

pub use comments::*;
pub use queries::*;
pub use types::*;
pub use workflow::*;
