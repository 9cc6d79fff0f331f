//! Core types and error definitions for toolbridge.
//!
//! This crate provides the foundational types shared across all toolbridge crates:
//! the error taxonomy, the conversation message representation, tool descriptors, and
//! the backend configuration surface handed over by the configuration store.
//!
//! # Main types
//!
//! - [`ToolbridgeError`] — Unified error enum for every toolbridge subsystem.
//! - [`ToolbridgeResult`] — Convenience alias for `Result<T, ToolbridgeError>`.
//! - [`Role`] / [`ChatMessage`] — One role-tagged entry of a conversation.
//! - [`ToolDescriptor`] — A tool as listed by a remote session.
//! - [`BackendConfig`] — A configured tool server (stdio or SSE).

/// Backend (tool server) configuration surface.
pub mod config;
/// Error taxonomy.
pub mod error;
/// Conversation messages.
pub mod message;
/// Tool descriptors and invocation outcomes.
pub mod tool;

pub use config::{active_backends, BackendConfig, BackendTransport};
pub use error::{ToolbridgeError, ToolbridgeResult};
pub use message::{ChatMessage, Role};
pub use tool::{ToolDescriptor, ToolOutcome};
