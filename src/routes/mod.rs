//! Route builders: one controller per model, nested children, and the aggregate router.

pub mod children;
pub mod controller;
pub mod router;

pub use children::create_children;
pub use controller::{create_controller, ModelRef};
pub use router::{create_router, RouterEntry};
