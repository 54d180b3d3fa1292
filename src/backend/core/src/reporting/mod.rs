//! Report-window arithmetic.

pub mod range;

pub use range::DateRange;
