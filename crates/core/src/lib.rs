//! Core domain types, errors, and key derivation for `shmcache`.
//!
//! Every other crate in the workspace builds on the pieces defined here.
//!
//! ## Key Components
//!
//! - **`errors`**: The `Error` enum and `Result` alias shared by the lock,
//!   segment, registry and backend layers.
//! - **`types`**: Newtypes for cache identity and System V resource keys, plus
//!   the small value types exchanged between the lock and cache layers.
//! - **`keys`**: Deterministic derivation of resource keys from a cache
//!   identity, so independent processes agree on IPC names without talking.
//! - **`constants`**: Environment variable names, defaults and format magic.

pub mod constants;
pub mod errors;
pub mod keys;
pub mod types;

pub use self::{
    constants::*,
    errors::{CodecOp, Error, Result},
    keys::derive_key,
    types::*,
};
