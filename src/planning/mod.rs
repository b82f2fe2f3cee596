//! Plan generation and validation
//!
//! - `allocator` - collision-free destination assignment
//! - `generator` - lazy rule-driven move generation
//! - `validator` - filesystem safety checks before execution
//! - `direct` - explicit-move plans from the oracle

pub mod allocator;
pub mod direct;
pub mod generator;
pub mod validator;

pub use allocator::{DestinationAllocator, DEFAULT_MAX_ATTEMPTS};
pub use direct::direct_plan;
pub use generator::{generate_moves, generate_plan, MoveGenerator};
pub use validator::{validate_plan, PlanValidator, ValidatedPlan};
