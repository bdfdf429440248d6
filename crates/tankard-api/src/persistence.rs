//! SQLite persistence for sessions. The store keeps the latest serialized
//! state per session plus an append-only event journal; the kernel only
//! ever sees `SavedState` dictionaries.

use std::fmt;
use std::path::Path;

use contracts::{Event, SavedState, SessionConfig};
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug)]
pub enum PersistenceError {
    Sqlite(rusqlite::Error),
    Serde(serde_json::Error),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Serde(err) => write!(f, "serde error: {err}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

#[derive(Debug)]
pub struct SqliteSessionStore {
    conn: Connection,
}

impl SqliteSessionStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    /// Upsert the session row and journal any new events, atomically.
    pub fn persist_session(
        &mut self,
        config: &SessionConfig,
        saved: &SavedState,
        new_events: &[Event],
    ) -> Result<(), PersistenceError> {
        let config_json = serde_json::to_string(config)?;
        let state_json = serde_json::to_string(saved)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO sessions (session_id, schema_version, config_json, state_json, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(session_id) DO UPDATE SET
                schema_version = excluded.schema_version,
                config_json = excluded.config_json,
                state_json = excluded.state_json,
                updated_at = excluded.updated_at",
            params![
                saved.session_id.as_str(),
                saved.schema_version.as_str(),
                config_json,
                state_json,
                saved.game_time,
            ],
        )?;

        for event in new_events {
            let payload_json = serde_json::to_string(event)?;
            tx.execute(
                "INSERT OR IGNORE INTO events (
                    session_id,
                    sequence,
                    game_time,
                    event_type,
                    payload_json,
                    created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    event.session_id.as_str(),
                    i64::try_from(event.sequence).unwrap_or(i64::MAX),
                    event.game_time,
                    format!("{:?}", event.event_type),
                    payload_json,
                    event.created_at.as_str(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn load_session(
        &self,
        session_id: &str,
    ) -> Result<Option<(SessionConfig, SavedState)>, PersistenceError> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT config_json, state_json FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((config_json, state_json)) => {
                let config: SessionConfig = serde_json::from_str(&config_json)?;
                let saved: SavedState = serde_json::from_str(&state_json)?;
                Ok(Some((config, saved)))
            }
            None => Ok(None),
        }
    }

    pub fn session_exists(&self, session_id: &str) -> Result<bool, PersistenceError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn delete_session(&mut self, session_id: &str) -> Result<(), PersistenceError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM events WHERE session_id = ?1",
            params![session_id],
        )?;
        tx.execute(
            "DELETE FROM sessions WHERE session_id = ?1",
            params![session_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Journaled events with `sequence > after`, ascending, capped.
    pub fn load_events_after(
        &self,
        session_id: &str,
        after: u64,
        limit: usize,
    ) -> Result<Vec<Event>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT payload_json
             FROM events
             WHERE session_id = ?1 AND sequence > ?2
             ORDER BY sequence ASC
             LIMIT ?3",
        )?;

        let rows = stmt.query_map(
            params![
                session_id,
                i64::try_from(after).unwrap_or(i64::MAX),
                i64::try_from(limit).unwrap_or(i64::MAX)
            ],
            |row| row.get::<_, String>(0),
        )?;

        let mut events = Vec::new();
        for row in rows {
            let payload = row?;
            events.push(serde_json::from_str::<Event>(&payload)?);
        }
        Ok(events)
    }

    fn configure(&mut self) -> Result<(), PersistenceError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    fn migrate(&mut self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                schema_version TEXT NOT NULL,
                config_json TEXT NOT NULL,
                state_json TEXT NOT NULL,
                updated_at REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS events (
                session_id TEXT NOT NULL,
                sequence INTEGER NOT NULL,
                game_time REAL NOT NULL,
                event_type TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (session_id, sequence)
            );

            CREATE INDEX IF NOT EXISTS idx_events_session_sequence
                ON events(session_id, sequence);
            ",
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO schema_migrations(version, name) VALUES(1, 'initial_v1')",
            [],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ContentPack;
    use tankard_core::content::builtin_content;
    use tankard_core::state::GameState;

    fn temp_db_path(name: &str) -> std::path::PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock after epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("tankard_{name}_{nanos}.sqlite"))
    }

    fn play_a_little(content: &ContentPack) -> GameState {
        let mut state = GameState::new(SessionConfig::default(), content);
        state.process_command("buy bread");
        state.process_command("wait 2");
        state
    }

    #[test]
    fn persists_and_loads_a_session() {
        let path = temp_db_path("roundtrip");
        let content = builtin_content();
        let state = play_a_little(&content);
        let saved = state.save_state();
        let events: Vec<Event> = state.events().into_iter().cloned().collect();

        {
            let mut store = SqliteSessionStore::open(&path).expect("open store");
            store
                .persist_session(state.config(), &saved, &events)
                .expect("persist");
        }

        let store = SqliteSessionStore::open(&path).expect("reopen store");
        let (config, loaded) = store
            .load_session(&saved.session_id)
            .expect("load")
            .expect("session exists");
        assert_eq!(config.session_id, saved.session_id);
        assert_eq!(loaded, saved);

        let journal = store
            .load_events_after(&saved.session_id, 0, 100)
            .expect("events load");
        assert_eq!(journal.len(), events.len());

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(path.with_extension("sqlite-wal"));
        let _ = std::fs::remove_file(path.with_extension("sqlite-shm"));
    }

    #[test]
    fn delete_removes_session_and_journal() {
        let path = temp_db_path("delete");
        let content = builtin_content();
        let state = play_a_little(&content);
        let saved = state.save_state();
        let events: Vec<Event> = state.events().into_iter().cloned().collect();

        let mut store = SqliteSessionStore::open(&path).expect("open store");
        store
            .persist_session(state.config(), &saved, &events)
            .expect("persist");
        assert!(store.session_exists(&saved.session_id).expect("exists"));

        store.delete_session(&saved.session_id).expect("delete");
        assert!(!store.session_exists(&saved.session_id).expect("exists"));
        assert!(store
            .load_events_after(&saved.session_id, 0, 10)
            .expect("events load")
            .is_empty());

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(path.with_extension("sqlite-wal"));
        let _ = std::fs::remove_file(path.with_extension("sqlite-shm"));
    }
}
