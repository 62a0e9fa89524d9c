pub mod sensitivity;
pub mod valuation;

#[cfg(feature = "comparison")]
pub mod comparison;
