//! # Upload Relay
//!
//! Stateless HTTP mediator between browser clients and S3-compatible
//! storage for large multipart uploads.
//!
//! The relay never sees file bytes. It opens multipart sessions, signs one
//! PUT URL per part, and stitches the parts together once the client has
//! uploaded them directly to storage. A handful of document endpoints
//! (list, remove, rename, share) round it out.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Browser clients                    │
//! └──────────┬──────────────────────────────┬───────────┘
//!            │ JSON envelope API            │ PUT part bytes
//! ┌──────────▼──────────────────┐           │
//! │        Upload Relay         │           │
//! ├─────────────────────────────┤           │
//! │ Request ID │ Logging │ Rate │           │
//! ├─────────────────────────────┤           │
//! │  Upload + Document handlers │           │
//! ├─────────────────────────────┤           │
//! │         relay-core          │           │
//! ├─────────────────────────────┤           │
//! │        relay-gateway        │           │
//! └──────────┬──────────────────┘           │
//!            │ signed S3 calls              │
//! ┌──────────▼──────────────────────────────▼───────────┐
//! │              S3-compatible object store              │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;
pub mod state;

pub use config::RelayConfig;
pub use error::{ApiError, ErrorCode, FlagError};
pub use response::ApiResponse;
pub use server::{run_server, run_server_with_shutdown};
pub use state::AppState;
