//! Quill CLI - terminal client for the Quill writing assistant.
//!
//! Projects, chat transcripts, outline history, and instruction overrides
//! are kept on this side in a [`quill_storage::FileStore`]. Each prompt is
//! answered either by a running `quill-server` ([`HttpOutlineService`]) or
//! by the generation pipeline in-process ([`LocalOutlineService`]).
//!
//! # Architecture
//!
//! - `cli/` - Command-line argument parsing and dispatch
//! - `service` - Backends implementing [`OutlineService`]
//! - `session` - The client session driving sends and project edits

pub mod cli;
pub mod service;
pub mod session;

pub use service::{HttpOutlineService, LocalOutlineService, OutlineService, ServiceError};
pub use session::{SendMode, SendOutcome, Session, SessionError};
