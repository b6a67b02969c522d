//! Input/output helpers.
//!
//! - raw table normalization (`normalize`)
//! - durable CSV storage of series and the release calendar (`store`)
//! - indicator registry loading (`registry`)

pub mod normalize;
pub mod registry;
pub mod store;

pub use normalize::*;
pub use registry::*;
pub use store::*;
