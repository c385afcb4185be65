pub mod guard;

pub use guard::{BlockReason, RiskCheckResult, RiskGuard, RiskSettings};
