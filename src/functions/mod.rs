//! SQL functions: scalar and date/time

pub mod datetime;
pub mod scalar;

pub use scalar::{get_scalar_function, ScalarFunc};
