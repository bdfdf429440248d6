//! Session facade over the tavern kernel: LLM-assisted command resolution
//! with deterministic fallback, optional SQLite persistence, and an
//! explicit session registry behind the HTTP surface.

mod llm_backend;
mod persistence;
mod server;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use contracts::{Command, CommandOutcome, ContentPack, Event, SessionConfig, Snapshot};
use tankard_core::llm::{build_parse_prompt, parse_reply, LanguageBackend};
use tankard_core::state::GameState;
use tokio::sync::Mutex;

pub use llm_backend::{OfflineBackend, OllamaClient, DEFAULT_OLLAMA_BASE_URL, DEFAULT_OLLAMA_MODEL};
pub use persistence::{PersistenceError, SqliteSessionStore};
pub use server::{serve, ServerError};

const PARSE_PROMPT_MAX_CHARS: usize = 2_000;

/// One player's game, behind a per-session lock at the manager level.
/// Command processing is strictly sequential within a session; the only
/// suspend point is the bounded LLM call, and a timed-out or unparseable
/// reply never applies partial results.
pub struct GameSession {
    state: GameState,
    backend: Arc<dyn LanguageBackend>,
    llm_timeout: Duration,
    store: Option<SqliteSessionStore>,
    last_persisted_sequence: u64,
    last_persistence_error: Option<String>,
}

impl GameSession {
    pub fn new(
        config: SessionConfig,
        content: &ContentPack,
        backend: Arc<dyn LanguageBackend>,
    ) -> Self {
        let llm_timeout = Duration::from_secs(config.llm_timeout_secs.max(1));
        Self {
            state: GameState::new(config, content),
            backend,
            llm_timeout,
            store: None,
            last_persisted_sequence: 0,
            last_persistence_error: None,
        }
    }

    /// Fully deterministic session with no model behind it.
    pub fn offline(config: SessionConfig, content: &ContentPack) -> Self {
        Self::new(config, content, Arc::new(OfflineBackend))
    }

    pub fn restore(
        config: SessionConfig,
        content: &ContentPack,
        saved: &contracts::SavedState,
        backend: Arc<dyn LanguageBackend>,
    ) -> Self {
        let llm_timeout = Duration::from_secs(config.llm_timeout_secs.max(1));
        let last_persisted_sequence = saved.next_sequence.saturating_sub(1);
        Self {
            state: GameState::restore(config, content, saved),
            backend,
            llm_timeout,
            store: None,
            last_persisted_sequence,
            last_persistence_error: None,
        }
    }

    pub fn attach_sqlite_store(&mut self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let store = SqliteSessionStore::open(path)?;
        self.store = Some(store);
        self.flush_persistence_if_attached();
        Ok(())
    }

    /// Resolve and apply one line of player input. The fallback chain:
    /// deterministic grammar, then the language backend (healthy, bounded
    /// timeout), then the in-character unknown-command refusal. This always
    /// returns an outcome, never an error.
    pub async fn process_input(&mut self, raw: &str) -> CommandOutcome {
        let mut command = self.state.resolve(raw);
        if command.is_unknown() {
            if let Some(parsed) = self.llm_assist(raw).await {
                command = parsed;
            }
        }

        let outcome = self.state.dispatch(command);
        self.flush_persistence_if_attached();
        outcome
    }

    async fn llm_assist(&mut self, raw: &str) -> Option<Command> {
        if !self.backend.is_healthy().await {
            return None;
        }

        let snapshot = self.state.snapshot(false);
        let prompt = build_parse_prompt(raw, &snapshot, PARSE_PROMPT_MAX_CHARS);
        let reply = match tokio::time::timeout(self.llm_timeout, self.backend.generate(&prompt))
            .await
        {
            Err(_) => {
                tracing::warn!(input = raw, "language backend timed out; using fallback");
                return None;
            }
            Ok(Err(err)) => {
                tracing::warn!(input = raw, error = %err, "language backend failed; using fallback");
                return None;
            }
            Ok(Ok(reply)) => reply,
        };

        match parse_reply(&reply) {
            Ok(command) => Some(command),
            Err(err) => {
                tracing::warn!(input = raw, error = %err, "unparseable model reply; using fallback");
                None
            }
        }
    }

    pub fn snapshot(&mut self, force: bool) -> Snapshot {
        self.state.snapshot(force)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn session_id(&self) -> &str {
        &self.state.config().session_id
    }

    pub fn last_persistence_error(&self) -> Option<&str> {
        self.last_persistence_error.as_deref()
    }

    /// Best-effort flush: persistence failure degrades to in-memory play
    /// with a logged warning, it never blocks the game.
    fn flush_persistence_if_attached(&mut self) {
        let Some(store) = self.store.as_mut() else {
            return;
        };

        let saved = self.state.save_state();
        let new_events: Vec<Event> = self
            .state
            .events()
            .into_iter()
            .filter(|event| event.sequence > self.last_persisted_sequence)
            .cloned()
            .collect();
        let highest = new_events
            .last()
            .map(|event| event.sequence)
            .unwrap_or(self.last_persisted_sequence);

        match store.persist_session(self.state.config(), &saved, &new_events) {
            Ok(()) => {
                self.last_persisted_sequence = highest;
                self.last_persistence_error = None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "persistence failed; continuing in memory");
                self.last_persistence_error = Some(err.to_string());
            }
        }
    }
}

#[derive(Debug)]
pub enum SessionError {
    AlreadyExists(String),
    NotFound(String),
    Persistence(PersistenceError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists(id) => write!(f, "session already exists: {id}"),
            Self::NotFound(id) => write!(f, "session not found: {id}"),
            Self::Persistence(err) => write!(f, "persistence error: {err}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<PersistenceError> for SessionError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}

/// Owns every live session: an explicit id-to-session map with create and
/// destroy lifecycle methods. Sessions share the content pack and the
/// backend strategy but no mutable state.
pub struct SessionManager {
    content: Arc<ContentPack>,
    backend: Arc<dyn LanguageBackend>,
    sqlite_path: Option<PathBuf>,
    sessions: HashMap<String, Arc<Mutex<GameSession>>>,
}

impl SessionManager {
    pub fn new(content: ContentPack, backend: Arc<dyn LanguageBackend>) -> Self {
        Self {
            content: Arc::new(content),
            backend,
            sqlite_path: None,
            sessions: HashMap::new(),
        }
    }

    pub fn offline(content: ContentPack) -> Self {
        Self::new(content, Arc::new(OfflineBackend))
    }

    pub fn with_sqlite_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sqlite_path = Some(path.into());
        self
    }

    pub fn create_session(
        &mut self,
        config: SessionConfig,
    ) -> Result<Arc<Mutex<GameSession>>, SessionError> {
        let session_id = config.session_id.clone();
        if self.sessions.contains_key(&session_id) {
            return Err(SessionError::AlreadyExists(session_id));
        }

        let mut session = GameSession::new(config, &self.content, self.backend.clone());
        if let Some(path) = &self.sqlite_path {
            if let Err(err) = session.attach_sqlite_store(path) {
                tracing::warn!(error = %err, "sqlite unavailable; session is in-memory only");
            }
        }

        let handle = Arc::new(Mutex::new(session));
        self.sessions.insert(session_id, handle.clone());
        Ok(handle)
    }

    /// Restore a persisted session into the registry. `NotFound` when the
    /// store has no such session or no store is configured.
    pub fn load_session(
        &mut self,
        session_id: &str,
    ) -> Result<Arc<Mutex<GameSession>>, SessionError> {
        if let Some(handle) = self.sessions.get(session_id) {
            return Ok(handle.clone());
        }
        let Some(path) = &self.sqlite_path else {
            return Err(SessionError::NotFound(session_id.to_string()));
        };

        let store = SqliteSessionStore::open(path)?;
        let Some((config, saved)) = store.load_session(session_id)? else {
            return Err(SessionError::NotFound(session_id.to_string()));
        };

        let mut session = GameSession::restore(config, &self.content, &saved, self.backend.clone());
        session.store = Some(store);
        let handle = Arc::new(Mutex::new(session));
        self.sessions.insert(session_id.to_string(), handle.clone());
        Ok(handle)
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<Mutex<GameSession>>> {
        self.sessions.get(session_id).cloned()
    }

    /// Drop a session from the registry. Any in-flight LLM parse is simply
    /// abandoned with the handle; nothing partial reaches state.
    pub fn destroy_session(&mut self, session_id: &str) -> Result<(), SessionError> {
        self.sessions
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn llm_reachable(&self) -> bool {
        self.backend.is_healthy().await
    }
}
