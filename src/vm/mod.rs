#[macro_use]
mod macros;
pub mod threading;

pub use threading::{ThreadManager, ThreadManagerOps};
