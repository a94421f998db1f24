//! # Relay Core
//!
//! Upload coordination for the Relay mediator.
//!
//! This crate provides:
//! - **UploadOrchestrator**: the three-phase multipart protocol (initiate, sign parts, complete)
//! - **ObjectService**: list, remove, rename and share for already-stored objects
//!
//! Nothing here holds upload state. The backend store owns sessions and
//! parts; the client holds the `(upload_id, object_key)` pair between calls.
//!
//! ```text
//!   Uninitiated ──initiate──▶ Initiated ──sign_parts──▶ PartsSigned ──complete──▶ Completed
//!                                              ▲              │
//!                                              └──sign_parts──┘
//! ```

pub mod error;
pub mod objects;
pub mod orchestrator;
pub mod types;

pub use error::{CoreError, Result};
pub use objects::{ObjectService, DEFAULT_SHARE_TTL_SECS, MAX_SHARE_TTL_SECS};
pub use orchestrator::{OrchestratorConfig, UploadOrchestrator};
pub use types::{CompletedUpload, PartDescriptor, SignedPartUrl, UploadSession};

pub use relay_gateway::ObjectSummary;
