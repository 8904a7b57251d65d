//! HTTP handlers: record operations and the route handlers built on them.

pub mod children;
pub mod records;
pub mod resource;
