//! Command dispatch and execution handlers.

use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use quill_storage::{FileStore, InstructionKind, Project, QuillPaths, Sender};
use tracing::debug;

use super::args::*;
use crate::service::{HttpOutlineService, LocalOutlineService, OutlineService};
use crate::session::{SendMode, SendOutcome, Session, SessionError};

type CliSession = Session<Box<dyn OutlineService>>;

/// Dispatch a CLI command to its handler.
pub async fn dispatch_command(cli: Cli) -> Result<()> {
    let (session, paths) = open_session(&cli.global)?;

    match cli.command {
        None => run_chat(&session, ChatArgs::default()).await,
        Some(Commands::Chat(args)) => run_chat(&session, args).await,
        Some(Commands::Send(args)) => run_send(&session, args).await,
        Some(Commands::Show(args)) => {
            print_project(&session.current(), args.chat);
            Ok(())
        }
        Some(Commands::New) => {
            let project = session.create_project()?;
            println!("Created {} ({})", project.title, short_id(&project.id));
            Ok(())
        }
        Some(Commands::List) => run_list(&session),
        Some(Commands::Open(args)) => {
            let project = session.select(&args.id)?;
            println!("Opened {} ({})", project.title, short_id(&project.id));
            Ok(())
        }
        Some(Commands::Delete(args)) => run_delete(&session, args),
        Some(Commands::Edit(args)) => run_edit(&session, args),
        Some(Commands::Undo) => match session.undo() {
            Ok(outline) => {
                print_outline(&outline);
                Ok(())
            }
            Err(SessionError::History(e)) => {
                println!("{e}.");
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        Some(Commands::Redo) => match session.redo() {
            Ok(outline) => {
                print_outline(&outline);
                Ok(())
            }
            Err(SessionError::History(e)) => {
                println!("{e}.");
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        Some(Commands::Title(args)) => {
            session.rename(&args.title.join(" "))?;
            println!("Title set to {}", session.current().title);
            Ok(())
        }
        Some(Commands::Instructions(args)) => run_instructions(&session, args),
        Some(Commands::Settings(args)) => run_settings(&session, args),
        Some(Commands::Export(args)) => {
            let dir = args.output.unwrap_or(paths.exports_dir);
            let path = session.export(&dir)?;
            println!("Exported to {}", path.display());
            Ok(())
        }
        Some(Commands::Clear(args)) => {
            if !args.yes && !confirm("Clear the title, chat, and outline of this project?")? {
                println!("Cancelled.");
                return Ok(());
            }
            session.clear()?;
            println!("Cleared. Use `quill undo` to get the previous outline back.");
            Ok(())
        }
    }
}

/// Load projects from the data directory and pick a backend.
fn open_session(global: &GlobalArgs) -> Result<(CliSession, QuillPaths)> {
    let paths = match &global.data_dir {
        Some(dir) => QuillPaths::from_root(dir.clone()),
        None => QuillPaths::new().context("Could not determine the data directory")?,
    };
    paths
        .ensure_dirs()
        .with_context(|| format!("Could not create {}", paths.data_dir.display()))?;
    debug!(data_dir = %paths.data_dir.display(), "Using data directory");

    let kv = FileStore::new(&paths.store_dir)?;

    let service: Box<dyn OutlineService> = if global.local {
        Box::new(LocalOutlineService::from_env())
    } else {
        let service = HttpOutlineService::new(&global.server)?;
        debug!(endpoint = %service.endpoint(), "Using server backend");
        Box::new(service)
    };

    Ok((Session::open(Arc::new(kv), service)?, paths))
}

async fn run_chat(session: &CliSession, args: ChatArgs) -> Result<()> {
    let project = session.current();
    let interactive = io::stdin().is_terminal();
    if interactive {
        println!(
            "{} ({}). Type a message, or /quit to leave.",
            project.title,
            short_id(&project.id)
        );
    }

    let stdin = io::stdin();
    loop {
        if interactive {
            print!("> ");
            io::stdout().flush()?;
        }
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        match line.trim() {
            "/quit" | "/exit" => break,
            "/show" => print_project(&session.current(), false),
            input => send_and_print(session, input, args.mode.mode()).await?,
        }
    }
    Ok(())
}

async fn run_send(session: &CliSession, args: SendArgs) -> Result<()> {
    send_and_print(session, &args.prompt.join(" "), args.mode.mode()).await
}

async fn send_and_print(session: &CliSession, input: &str, mode: SendMode) -> Result<()> {
    match session.send(input, mode).await {
        Ok(SendOutcome::Ignored) => {}
        Ok(SendOutcome::Replied {
            reply,
            outline_updated,
            ..
        }) => {
            println!("{reply}");
            if outline_updated {
                print_outline(session.current().outline());
            }
        }
        Ok(SendOutcome::Failed { reply }) => eprintln!("{reply}"),
        Err(SessionError::Busy) => eprintln!("Still working on the previous message."),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn run_list(session: &CliSession) -> Result<()> {
    let current = session.current().id;
    for project in session.projects() {
        let marker = if project.id == current { "*" } else { " " };
        println!(
            "{marker} {}  {:<32}  {}",
            short_id(&project.id),
            project.title,
            format_time(project.last_modified)
        );
    }
    Ok(())
}

fn run_delete(session: &CliSession, args: DeleteArgs) -> Result<()> {
    let id = session.resolve(&args.id)?;
    let title = session
        .projects()
        .into_iter()
        .find(|p| p.id == id)
        .map(|p| p.title)
        .unwrap_or_default();

    if !args.yes && !confirm(&format!("Delete \"{title}\" ({})?", short_id(&id)))? {
        println!("Cancelled.");
        return Ok(());
    }

    let (removed, active) = session.delete(&id)?;
    println!("Deleted {}", removed.title);
    println!("Active project: {} ({})", active.title, short_id(&active.id));
    Ok(())
}

fn run_edit(session: &CliSession, args: EditArgs) -> Result<()> {
    let outline = match &args.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    if session.edit_outline(&outline)? {
        println!("Outline updated.");
    } else {
        println!("Outline unchanged.");
    }
    Ok(())
}

fn run_instructions(session: &CliSession, args: InstructionsArgs) -> Result<()> {
    if args.clear {
        session.set_custom_instructions("")?;
        println!("Project instructions removed.");
    } else if args.text.is_empty() {
        let project = session.current();
        if project.custom_instructions.trim().is_empty() {
            println!("No project instructions.");
        } else {
            println!("{}", project.custom_instructions);
        }
    } else {
        session.set_custom_instructions(&args.text.join(" "))?;
        println!("Project instructions saved.");
    }
    Ok(())
}

fn run_settings(session: &CliSession, args: SettingsArgs) -> Result<()> {
    match args.action.unwrap_or(SettingsAction::Show) {
        SettingsAction::Show => {
            let settings = session.instruction_settings()?;
            for kind in InstructionKind::ALL {
                println!("{kind}: {}", settings.get(kind).unwrap_or("(default)"));
            }
        }
        SettingsAction::Set { kind, text } => {
            let kind = InstructionKind::from(kind);
            session.set_instruction(kind, &text.join(" "))?;
            println!("Saved {kind} instructions.");
        }
        SettingsAction::Reset { kind } => {
            let kind = kind.map(InstructionKind::from);
            session.reset_instructions(kind)?;
            match kind {
                Some(kind) => println!("Restored default {kind} instructions."),
                None => println!("Restored all default instructions."),
            }
        }
    }
    Ok(())
}

/// Ask a yes/no question on stdout; anything but `y` is no.
fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N]: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn print_project(project: &Project, with_chat: bool) {
    println!("{} ({})", project.title, short_id(&project.id));
    let history = project.history();
    println!(
        "Version {} of {}, last modified {}",
        history.cursor() + 1,
        history.len(),
        format_time(project.last_modified)
    );
    if !project.custom_instructions.trim().is_empty() {
        println!("Instructions: {}", project.custom_instructions);
    }
    print_outline(project.outline());

    if with_chat {
        for message in &project.chat_history {
            let who = match message.sender {
                Sender::User => "you",
                Sender::Assistant => "assistant",
            };
            println!("[{}] {who}: {}", format_time(message.timestamp), message.message);
        }
    }
}

fn print_outline(outline: &str) {
    if outline.is_empty() {
        println!("\n(empty outline)\n");
    } else {
        println!("\n{outline}\n");
    }
}

/// First eight characters of a project id.
fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(i, _)| &id[..i])
}

fn format_time(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}
