//! API endpoint implementations.

mod health;
mod matrix;

pub use health::HealthApi;
pub use matrix::MatrixApi;
