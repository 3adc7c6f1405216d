//! Request signing primitives.

pub mod signing;
