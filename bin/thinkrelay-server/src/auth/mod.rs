//! Authentication: the bearer token registry and credential hashing.

pub mod password;
pub mod registry;

pub use registry::{TokenRegistry, UserId, UNKNOWN_USER};
