//! Upload relay: re-exports of the relay crates.
//!
//! - [`gateway`]: storage backends (S3 and in-memory)
//! - [`orchestration`]: upload orchestration and document operations
//! - [`server`]: HTTP surface

pub use relay_cli as server;
pub use relay_core as orchestration;
pub use relay_gateway as gateway;
