//! Core data model shared by planning, validation, and execution.

pub mod plan;
pub mod record;
pub mod report;

pub use plan::*;
pub use record::*;
pub use report::*;
