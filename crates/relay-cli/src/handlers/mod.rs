//! HTTP request handlers

pub mod document;
pub mod memory;
pub mod service;
pub mod upload;

pub use document::*;
pub use memory::*;
pub use service::*;
pub use upload::*;
