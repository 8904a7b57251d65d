pub mod hooks;
pub mod options;

pub use hooks::*;
pub use options::*;
