pub mod amortization;
pub mod error;
pub mod time_value;
pub mod types;

#[cfg(feature = "valuation")]
pub mod real_estate;

pub use error::ReInvestError;
pub use types::*;

/// Standard result type for all re-invest operations
pub type ReInvestResult<T> = Result<T, ReInvestError>;
