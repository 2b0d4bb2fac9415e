//! The client session: one project store, one backend, one request at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use quill_engine::{CompletionRequest, CompletionResult, HistoryTurn};
use quill_storage::{
    ChatMessage, HistoryError, InstructionKind, InstructionSettings, KeyValueStore, Project,
    ProjectStore, Sender, StorageError,
};
use tracing::{debug, info, warn};

use crate::service::{OutlineService, ServiceError};

/// Chat turns sent along with each request.
pub const CHAT_CONTEXT_LIMIT: usize = 10;

pub const OUTLINE_UPDATED: &str = "I've updated the outline based on your feedback.";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("A request is already in progress")]
    Busy,

    #[error("No project matches '{0}'")]
    NoMatch(String),

    #[error("'{0}' matches more than one project")]
    Ambiguous(String),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// How to classify an outgoing prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SendMode {
    /// Decide from the prompt text.
    #[default]
    Auto,
    Document,
    Chat,
}

impl SendMode {
    pub fn is_document_request(self, prompt: &str) -> bool {
        match self {
            Self::Auto => looks_like_document_request(prompt),
            Self::Document => true,
            Self::Chat => false,
        }
    }
}

/// Prompts that mention the outline or the document ask for outline content.
pub fn looks_like_document_request(prompt: &str) -> bool {
    let prompt = prompt.to_lowercase();
    prompt.contains("outline") || prompt.contains("document")
}

/// What a send produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing to send.
    Ignored,
    /// The assistant replied; `reply` is the message appended to the chat.
    Replied {
        reply: String,
        outline_updated: bool,
        new_title: Option<String>,
    },
    /// The request failed; `reply` is the apology appended to the chat.
    Failed { reply: String },
}

impl SendOutcome {
    pub fn reply(&self) -> Option<&str> {
        match self {
            Self::Ignored => None,
            Self::Replied { reply, .. } | Self::Failed { reply } => Some(reply),
        }
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn failure_message(error: &ServiceError) -> String {
    format!("I apologize, but I encountered an error: {error}. Please try again.")
}

fn history_turns(messages: &[ChatMessage]) -> Vec<HistoryTurn> {
    let start = messages.len().saturating_sub(CHAT_CONTEXT_LIMIT);
    messages[start..]
        .iter()
        .map(|m| match m.sender {
            Sender::User => HistoryTurn::user(&m.message),
            Sender::Assistant => HistoryTurn::assistant(&m.message),
        })
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    (!value.trim().is_empty()).then(|| value.to_string())
}

/// A user session over persisted projects.
///
/// The store lock is never held across a backend call; the busy flag keeps
/// sends from overlapping.
pub struct Session<S> {
    kv: Arc<dyn KeyValueStore>,
    store: Mutex<ProjectStore>,
    service: S,
    busy: AtomicBool,
}

impl<S: OutlineService> Session<S> {
    /// Load projects from `kv` and attach `service`.
    pub fn open(kv: Arc<dyn KeyValueStore>, service: S) -> Result<Self> {
        let store = ProjectStore::load(kv.clone())?;
        Ok(Self {
            kv,
            store: Mutex::new(store),
            service,
            busy: AtomicBool::new(false),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Snapshot of the active project.
    pub fn current(&self) -> Project {
        self.store.lock().current().clone()
    }

    /// All projects, most recently modified first.
    pub fn projects(&self) -> Vec<Project> {
        self.store.lock().list().into_iter().cloned().collect()
    }

    /// Resolve a full id or a unique id prefix.
    pub fn resolve(&self, id: &str) -> Result<String> {
        let store = self.store.lock();
        if store.get(id).is_some() {
            return Ok(id.to_string());
        }
        let mut matches = store.list().into_iter().filter(|p| p.id.starts_with(id));
        match (matches.next(), matches.next()) {
            (Some(project), None) if !id.is_empty() => Ok(project.id.clone()),
            (Some(_), Some(_)) => Err(SessionError::Ambiguous(id.to_string())),
            _ => Err(SessionError::NoMatch(id.to_string())),
        }
    }

    pub fn create_project(&self) -> Result<Project> {
        Ok(self.store.lock().create()?.clone())
    }

    pub fn select(&self, id: &str) -> Result<Project> {
        let id = self.resolve(id)?;
        Ok(self.store.lock().select(&id)?.clone())
    }

    /// Delete a project. Returns the removed project and the one now active.
    pub fn delete(&self, id: &str) -> Result<(Project, Project)> {
        let id = self.resolve(id)?;
        let mut store = self.store.lock();
        let removed = store.delete(&id)?;
        Ok((removed, store.current().clone()))
    }

    pub fn rename(&self, title: &str) -> Result<()> {
        let title = title.trim().to_string();
        self.store.lock().update_current(|p| {
            p.title = title;
            p.touch();
        })?;
        Ok(())
    }

    pub fn set_custom_instructions(&self, instructions: &str) -> Result<()> {
        let instructions = instructions.to_string();
        self.store.lock().update_current(|p| {
            p.custom_instructions = instructions;
            p.touch();
        })?;
        Ok(())
    }

    /// Replace the outline by hand. Returns false when nothing changed.
    pub fn edit_outline(&self, outline: &str) -> Result<bool> {
        Ok(self.store.lock().update_current(|p| p.set_outline(outline))?)
    }

    pub fn undo(&self) -> Result<String> {
        let mut store = self.store.lock();
        let outline = store.update_current(|p| p.undo().map(str::to_string))??;
        Ok(outline)
    }

    pub fn redo(&self) -> Result<String> {
        let mut store = self.store.lock();
        let outline = store.update_current(|p| p.redo().map(str::to_string))??;
        Ok(outline)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.lock().update_current(Project::clear)?;
        Ok(())
    }

    /// Write the active outline to `dir/<title>.txt`.
    pub fn export(&self, dir: &Path) -> Result<PathBuf> {
        let project = self.current();
        let path = dir.join(project.export_file_name());
        std::fs::write(&path, project.outline())?;
        info!(path = %path.display(), "Exported outline");
        Ok(path)
    }

    pub fn instruction_settings(&self) -> Result<InstructionSettings> {
        Ok(InstructionSettings::load(self.kv.as_ref())?)
    }

    pub fn set_instruction(&self, kind: InstructionKind, value: &str) -> Result<()> {
        let mut settings = self.instruction_settings()?;
        settings.set(kind, value);
        settings.save(self.kv.as_ref())?;
        Ok(())
    }

    /// Reset one override, or all of them when `kind` is `None`.
    pub fn reset_instructions(&self, kind: Option<InstructionKind>) -> Result<()> {
        let mut settings = self.instruction_settings()?;
        match kind {
            Some(kind) => settings.reset(kind),
            None => settings.reset_all(),
        }
        settings.save(self.kv.as_ref())?;
        Ok(())
    }

    /// Send user input for the active project.
    ///
    /// The user message is recorded before the backend is called, and the
    /// result is applied to the project the send started on even if another
    /// project has been selected in the meantime.
    pub async fn send(&self, input: &str, mode: SendMode) -> Result<SendOutcome> {
        let prompt = input.trim();
        if prompt.is_empty() {
            return Ok(SendOutcome::Ignored);
        }
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            debug!("Rejecting send while a request is in progress");
            return Err(SessionError::Busy);
        };

        let settings = self.instruction_settings()?;
        let (project_id, request) = {
            let mut store = self.store.lock();
            let project = store.current();
            let request = CompletionRequest {
                prompt: Some(prompt.to_string()),
                current_outline: Some(project.outline().to_string()),
                current_title: Some(project.title.clone()),
                custom_instructions: non_empty(&project.custom_instructions),
                style_instructions: settings.style,
                system_instructions: settings.system,
                technical_instructions: settings.technical,
                chat_history: Some(history_turns(&project.chat_history)),
                is_document_request: mode.is_document_request(prompt),
            };
            let project_id = project.id.clone();
            store.update(&project_id, |p| p.push_message(ChatMessage::user(prompt)))?;
            (project_id, request)
        };

        info!(
            project = %project_id,
            document = request.is_document_request,
            "Sending prompt"
        );

        let result = self
            .service
            .complete(&request)
            .await
            .and_then(|result| match result {
                CompletionResult::Document { outline, .. } if outline.trim().is_empty() => {
                    Err(ServiceError::InvalidResponse)
                }
                other => Ok(other),
            });

        let outcome = match result {
            Ok(CompletionResult::Chat { chat_response }) => SendOutcome::Replied {
                reply: chat_response,
                outline_updated: false,
                new_title: None,
            },
            Ok(CompletionResult::Document {
                outline,
                suggested_title,
            }) => self.apply_document(&project_id, outline, suggested_title)?,
            Err(e) => {
                warn!(error = %e, "Request failed");
                SendOutcome::Failed {
                    reply: failure_message(&e),
                }
            }
        };

        if let Some(reply) = outcome.reply() {
            let message = ChatMessage::assistant(reply);
            self.store
                .lock()
                .update(&project_id, |p| p.push_message(message))?;
        }
        Ok(outcome)
    }

    fn apply_document(
        &self,
        project_id: &str,
        outline: String,
        suggested_title: Option<String>,
    ) -> Result<SendOutcome> {
        self.store.lock().update(project_id, |p| {
            let outline_updated = p.set_outline(outline);
            let new_title = suggested_title.filter(|t| !t.is_empty() && *t != p.title);
            let mut reply = OUTLINE_UPDATED.to_string();
            if let Some(title) = &new_title {
                p.title = title.clone();
                reply.push_str(&format!(
                    " I've also updated the title to better reflect the content: \"{title}\""
                ));
            }
            SendOutcome::Replied {
                reply,
                outline_updated,
                new_title,
            }
        })
        .map_err(SessionError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quill_storage::{MemoryStore, UNTITLED};
    use std::collections::VecDeque;
    use tokio::sync::Notify;

    /// Replays scripted results and records the requests it saw.
    #[derive(Default)]
    struct FakeService {
        results: Mutex<VecDeque<std::result::Result<CompletionResult, ServiceError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeService {
        fn new(results: Vec<std::result::Result<CompletionResult, ServiceError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl OutlineService for FakeService {
        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> std::result::Result<CompletionResult, ServiceError> {
            self.requests.lock().push(request.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.results
                .lock()
                .pop_front()
                .unwrap_or(Err(ServiceError::InvalidResponse))
        }
    }

    fn chat(text: &str) -> std::result::Result<CompletionResult, ServiceError> {
        Ok(CompletionResult::Chat {
            chat_response: text.into(),
        })
    }

    fn document(
        outline: &str,
        title: Option<&str>,
    ) -> std::result::Result<CompletionResult, ServiceError> {
        Ok(CompletionResult::Document {
            outline: outline.into(),
            suggested_title: title.map(String::from),
        })
    }

    fn session(service: FakeService) -> Session<FakeService> {
        Session::open(Arc::new(MemoryStore::new()), service).unwrap()
    }

    #[test]
    fn test_document_heuristic() {
        assert!(looks_like_document_request("Update the OUTLINE please"));
        assert!(looks_like_document_request("rewrite the document"));
        assert!(!looks_like_document_request("who is the villain?"));
        assert!(SendMode::Document.is_document_request("hi"));
        assert!(!SendMode::Chat.is_document_request("the outline"));
    }

    #[tokio::test]
    async fn test_empty_input_is_ignored() {
        let session = session(FakeService::new(vec![]));
        assert_eq!(
            session.send("   ", SendMode::Auto).await.unwrap(),
            SendOutcome::Ignored
        );
        assert!(session.current().chat_history.is_empty());
        assert!(session.service.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_chat_reply_is_appended() {
        let session = session(FakeService::new(vec![chat("Who is the lead?")]));

        let outcome = session.send("a heist on the moon", SendMode::Auto).await.unwrap();
        assert_eq!(outcome.reply(), Some("Who is the lead?"));

        let project = session.current();
        let senders: Vec<_> = project.chat_history.iter().map(|m| m.sender).collect();
        assert_eq!(senders, [Sender::User, Sender::Assistant]);
        assert_eq!(project.chat_history[0].message, "a heist on the moon");
        assert_eq!(project.outline(), "");

        let requests = session.service.requests.lock();
        assert!(!requests[0].is_document_request);
        assert_eq!(requests[0].current_title.as_deref(), Some(UNTITLED));
    }

    #[tokio::test]
    async fn test_document_reply_updates_outline_and_title() {
        let session = session(FakeService::new(vec![document(
            "KITCHEN - DAWN",
            Some("Glass Houses"),
        )]));

        let outcome = session.send("write the outline", SendMode::Auto).await.unwrap();

        let project = session.current();
        assert_eq!(project.outline(), "KITCHEN - DAWN");
        assert_eq!(project.title, "Glass Houses");
        assert_eq!(
            outcome.reply(),
            Some(
                "I've updated the outline based on your feedback. I've also updated the title \
                 to better reflect the content: \"Glass Houses\""
            )
        );
        assert_eq!(session.undo().unwrap(), "");
    }

    #[tokio::test]
    async fn test_same_title_has_no_notice() {
        let session = session(FakeService::new(vec![document("A", Some(UNTITLED))]));

        let outcome = session.send("outline", SendMode::Auto).await.unwrap();
        assert_eq!(outcome.reply(), Some(OUTLINE_UPDATED));
        assert!(matches!(outcome, SendOutcome::Replied { new_title: None, .. }));
    }

    #[tokio::test]
    async fn test_failure_becomes_apology() {
        let session = session(FakeService::new(vec![Err(ServiceError::Api {
            status: 502,
            message: "Provider error (500): boom".into(),
        })]));

        let outcome = session.send("hello", SendMode::Chat).await.unwrap();
        assert_eq!(
            outcome.reply(),
            Some(
                "I apologize, but I encountered an error: Provider error (500): boom. \
                 Please try again."
            )
        );
        assert_eq!(session.current().chat_history.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_outline_is_rejected() {
        let session = session(FakeService::new(vec![document("  ", None)]));
        session.edit_outline("keep me").unwrap();

        let outcome = session.send("outline", SendMode::Auto).await.unwrap();
        assert!(matches!(outcome, SendOutcome::Failed { .. }));
        assert_eq!(session.current().outline(), "keep me");
    }

    #[tokio::test]
    async fn test_request_carries_context() {
        let session = session(FakeService::new(
            (0..7).map(|i| chat(&format!("a{i}"))).collect(),
        ));
        session.set_custom_instructions("Noir tone").unwrap();
        session
            .set_instruction(InstructionKind::Style, "Terse")
            .unwrap();
        for i in 0..7 {
            session.send(&format!("u{i}"), SendMode::Chat).await.unwrap();
        }

        let requests = session.service.requests.lock();
        let last = requests.last().unwrap();
        let history = last.history();
        assert_eq!(history.len(), CHAT_CONTEXT_LIMIT);
        // twelve earlier messages; the prompt itself travels separately
        assert_eq!(history[0].content, "u1");
        assert_eq!(history[9].content, "a5");
        assert_eq!(last.prompt.as_deref(), Some("u6"));
        assert_eq!(last.custom_instructions.as_deref(), Some("Noir tone"));
        assert_eq!(last.style_instructions.as_deref(), Some("Terse"));
        assert_eq!(last.system_instructions, None);
    }

    #[tokio::test]
    async fn test_busy_guard_rejects_overlap() {
        let gate = Arc::new(Notify::new());
        let service = FakeService {
            results: Mutex::new(vec![chat("done")].into()),
            gate: Some(gate.clone()),
            ..Default::default()
        };
        let session = session(service);

        let first = session.send("first", SendMode::Chat);
        let second = async {
            tokio::task::yield_now().await;
            assert!(session.is_busy());
            let result = session.send("second", SendMode::Chat).await;
            gate.notify_one();
            result
        };
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap().reply(), Some("done"));
        assert!(matches!(second, Err(SessionError::Busy)));
        assert!(!session.is_busy());

        let messages: Vec<_> = session
            .current()
            .chat_history
            .into_iter()
            .map(|m| m.message)
            .collect();
        assert_eq!(messages, ["first", "done"]);
    }

    #[tokio::test]
    async fn test_reply_lands_on_originating_project() {
        let gate = Arc::new(Notify::new());
        let service = FakeService {
            results: Mutex::new(vec![document("ACT ONE", None)].into()),
            gate: Some(gate.clone()),
            ..Default::default()
        };
        let session = session(service);
        let original = session.current().id;

        let send = session.send("outline", SendMode::Auto);
        let switch = async {
            tokio::task::yield_now().await;
            session.create_project().unwrap();
            gate.notify_one();
        };
        let (outcome, _) = tokio::join!(send, switch);
        outcome.unwrap();

        assert_eq!(session.current().outline(), "");
        let projects = session.projects();
        let original = projects.iter().find(|p| p.id == original).unwrap();
        assert_eq!(original.outline(), "ACT ONE");
    }

    #[test]
    fn test_project_operations() {
        let session = session(FakeService::new(vec![]));
        let first = session.current().id;

        session.rename("Glass Houses").unwrap();
        assert!(session.edit_outline("A").unwrap());
        assert!(!session.edit_outline("A").unwrap());
        session.edit_outline("B").unwrap();
        assert_eq!(session.undo().unwrap(), "A");
        assert_eq!(session.redo().unwrap(), "B");
        assert!(matches!(
            session.redo(),
            Err(SessionError::History(HistoryError::CannotRedo))
        ));

        let second = session.create_project().unwrap();
        assert_eq!(session.projects().len(), 2);
        assert_eq!(session.select(&first[..8]).unwrap().title, "Glass Houses");

        let (removed, active) = session.delete(&first).unwrap();
        assert_eq!(removed.id, first);
        assert_eq!(active.id, second.id);
        assert!(matches!(session.select(&first), Err(SessionError::NoMatch(_))));
    }

    #[test]
    fn test_clear_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(FakeService::new(vec![]));
        session.rename("Glass Houses: Part 2").unwrap();
        session.edit_outline("KITCHEN - DAWN").unwrap();

        let path = session.export(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "glass_houses__part_2.txt");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "KITCHEN - DAWN");

        session.clear().unwrap();
        let project = session.current();
        assert_eq!(project.title, UNTITLED);
        assert_eq!(project.outline(), "");
        assert_eq!(session.undo().unwrap(), "KITCHEN - DAWN");
    }

    #[test]
    fn test_instruction_reset() {
        let session = session(FakeService::new(vec![]));
        session
            .set_instruction(InstructionKind::System, "Be blunt")
            .unwrap();
        session
            .set_instruction(InstructionKind::Technical, "Use INT/EXT")
            .unwrap();

        session
            .reset_instructions(Some(InstructionKind::System))
            .unwrap();
        let settings = session.instruction_settings().unwrap();
        assert_eq!(settings.system, None);
        assert_eq!(settings.technical.as_deref(), Some("Use INT/EXT"));

        session.reset_instructions(None).unwrap();
        assert_eq!(
            session.instruction_settings().unwrap(),
            InstructionSettings::default()
        );
    }
}
