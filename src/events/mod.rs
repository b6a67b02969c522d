//! Release surprise detection.

pub mod detector;

pub use detector::*;
