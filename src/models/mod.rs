pub mod generation;
pub mod task;

pub use generation::*;
pub use task::*;
