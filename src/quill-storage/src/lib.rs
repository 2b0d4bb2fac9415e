//! Quill Storage - Client-side persistence for Quill.
//!
//! Everything is kept behind a small get/set [`KeyValueStore`]:
//!
//! - `projects`: the serialized project array
//! - `currentProjectId`: the active project
//! - `styleInstructions`, `systemInstructions`, `technicalInstructions`:
//!   instruction overrides
//!
//! [`ProjectStore`] owns the project collection and persists on every
//! mutation. Each [`Project`] carries an [`OutlineHistory`] for undo/redo.

pub mod error;
pub mod history;
pub mod kv;
pub mod paths;
pub mod project;
pub mod settings;
pub mod store;

// Re-export main types at crate root
pub use error::{Result, StorageError};
pub use history::{HistoryError, OutlineHistory};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use paths::{QuillPaths, quill_data_dir};
pub use project::{ChatMessage, Project, Sender, UNTITLED};
pub use settings::{InstructionKind, InstructionSettings};
pub use store::ProjectStore;
