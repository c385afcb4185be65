pub mod agent;
pub mod delegation;
pub mod execution;
pub mod market;
pub mod signal;

pub use agent::*;
pub use delegation::*;
pub use execution::*;
pub use market::*;
pub use signal::*;
