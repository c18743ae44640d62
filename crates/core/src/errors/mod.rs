//! Error types for shmcache operations

mod builders;
mod conversions;
mod display;
mod recovery;
mod types;

pub use types::{CodecOp, Error, Result};
