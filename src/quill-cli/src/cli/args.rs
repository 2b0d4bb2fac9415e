//! CLI argument structures and parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use quill_storage::InstructionKind;

use crate::service::DEFAULT_SERVER_URL;
use crate::session::SendMode;

/// Log verbosity level for CLI output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Only show errors
    Error,
    /// Show warnings and errors (default)
    #[default]
    Warn,
    /// Show informational messages, warnings, and errors
    Info,
    /// Show debug messages and above
    Debug,
    /// Show all messages including trace-level details
    Trace,
}

impl LogLevel {
    /// Convert to tracing filter string.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Quill - a writing assistant for outlines and scripts
#[derive(Debug, Parser)]
#[command(name = "quill")]
#[command(about = "Chat with an assistant that drafts and revises your outline")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Quill server URL
    #[arg(long, global = true, env = "QUILL_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    pub server: String,

    /// Run generation in-process instead of calling a server
    #[arg(long, global = true)]
    pub local: bool,

    /// Directory holding projects and settings
    #[arg(long, global = true, env = "QUILL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Shorthand for --log-level debug
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    pub fn effective_log_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else {
            self.log_level
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start an interactive chat with the active project (default)
    Chat(ChatArgs),

    /// Send one prompt to the assistant
    Send(SendArgs),

    /// Show the active project
    Show(ShowArgs),

    /// Create a new project and make it active
    New,

    /// List projects, most recently modified first
    #[command(visible_alias = "ls")]
    List,

    /// Make a project active
    Open(OpenArgs),

    /// Delete a project
    #[command(visible_alias = "rm")]
    Delete(DeleteArgs),

    /// Replace the outline by hand
    Edit(EditArgs),

    /// Step the outline back to the previous version
    Undo,

    /// Step the outline forward again
    Redo,

    /// Rename the active project
    Title(TitleArgs),

    /// Show or set instructions for the active project
    Instructions(InstructionsArgs),

    /// Manage instruction overrides sent with every request
    Settings(SettingsArgs),

    /// Write the outline to a text file
    Export(ExportArgs),

    /// Reset the active project's title, chat, and outline
    Clear(ClearArgs),
}

#[derive(Debug, Clone, Copy, Default, Args)]
#[group(multiple = false)]
pub struct ModeArgs {
    /// Ask for outline content
    #[arg(long)]
    pub document: bool,

    /// Ask for a conversational reply
    #[arg(long)]
    pub chat: bool,
}

impl ModeArgs {
    pub fn mode(self) -> SendMode {
        if self.document {
            SendMode::Document
        } else if self.chat {
            SendMode::Chat
        } else {
            SendMode::Auto
        }
    }
}

#[derive(Debug, Default, Args)]
pub struct ChatArgs {
    #[command(flatten)]
    pub mode: ModeArgs,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// What to ask
    #[arg(required = true, num_args = 1..)]
    pub prompt: Vec<String>,

    #[command(flatten)]
    pub mode: ModeArgs,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Include the chat transcript
    #[arg(long)]
    pub chat: bool,
}

#[derive(Debug, Args)]
pub struct OpenArgs {
    /// Project id or unique prefix
    pub id: String,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Project id or unique prefix
    pub id: String,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Read the outline from this file instead of stdin
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct TitleArgs {
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,
}

#[derive(Debug, Args)]
pub struct InstructionsArgs {
    /// New instructions; omit to show the current ones
    pub text: Vec<String>,

    /// Remove the instructions
    #[arg(long, conflicts_with = "text")]
    pub clear: bool,
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub action: Option<SettingsAction>,
}

#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Show all overrides (default)
    Show,
    /// Override one instruction block
    Set {
        kind: InstructionArg,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Restore defaults for one block, or all of them
    Reset { kind: Option<InstructionArg> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InstructionArg {
    Style,
    System,
    Technical,
}

impl From<InstructionArg> for InstructionKind {
    fn from(arg: InstructionArg) -> Self {
        match arg {
            InstructionArg::Style => InstructionKind::Style,
            InstructionArg::System => InstructionKind::System,
            InstructionArg::Technical => InstructionKind::Technical,
        }
    }
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Directory to write into (default: the exports folder in the data directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ClearArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}
