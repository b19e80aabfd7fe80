//! SQLite backend.
//!
//! Uses a single SQLite database file with four tables:
//! - `sessions` — conversation threads
//! - `messages` — transcript turns
//! - `summaries` — condensed ranges of older messages
//! - `pins` — always-recalled facts
//!
//! Every memory table references `sessions(id)` with `ON DELETE CASCADE`,
//! so deleting a session removes everything it owns. Context reads run in
//! one read transaction and therefore see a single snapshot.
//!
//! Each statement is retried at most once when SQLite reports a transient
//! failure (busy/locked database, pool timeout, I/O error).

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use recollect_core::clock::{Clock, SystemClock};
use recollect_core::error::MemoryError;
use recollect_core::importance::Importance;
use recollect_core::message::{Message, NewMessage, Role};
use recollect_core::pin::{NewPin, Pin, PinType};
use recollect_core::session::{Session, SessionId};
use recollect_core::store::{
    ContextInputs, ContextSource, MessageStore, PinStore, SessionStore, SummaryStore,
};
use recollect_core::summary::{NewSummary, Summary};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, Sqlite, SqlitePool};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const RECENT_MESSAGES_SQL: &str = r#"
    SELECT * FROM messages
    WHERE session_id = ?1
    ORDER BY created_at DESC, id DESC
    LIMIT ?2
"#;

const TOP_SUMMARIES_SQL: &str = r#"
    SELECT * FROM summaries
    WHERE session_id = ?1
    ORDER BY importance DESC, created_at ASC, id ASC
    LIMIT ?2
"#;

const PINS_SQL: &str = r#"
    SELECT * FROM pins
    WHERE session_id = ?1 AND (?2 IS NULL OR pin_type = ?2)
    ORDER BY importance DESC, created_at ASC, id ASC
"#;

/// Tuning knobs for [`SqliteBackend`].
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    /// Pool size for file databases (in-memory databases always use one).
    pub max_connections: u32,
    /// Pause before the single retry of a transient failure.
    pub retry_backoff: Duration,
    /// Reject writes to unknown sessions instead of creating them.
    pub strict_sessions: bool,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            max_connections: 4,
            retry_backoff: Duration::from_millis(50),
            strict_sessions: true,
        }
    }
}

/// A SQLite implementation of every store trait.
pub struct SqliteBackend {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    options: SqliteOptions,
}

impl SqliteBackend {
    /// Open (or create) a database with default options.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database
    /// (useful for tests).
    pub async fn new(path: &str) -> Result<Self, MemoryError> {
        Self::open(path, SqliteOptions::default(), Arc::new(SystemClock)).await
    }

    pub async fn open(
        path: &str,
        options: SqliteOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MemoryError> {
        let connect = SqliteConnectOptions::from_str(path)
            .map_err(|e| MemoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .pragma("foreign_keys", "ON");

        let max_connections = if path.contains(":memory:") {
            1
        } else {
            options.max_connections.max(1)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let backend = Self {
            pool,
            clock,
            options,
        };
        backend.run_migrations().await?;
        info!("SQLite memory store initialized at {path}");
        Ok(backend)
    }

    fn now(&self) -> DateTime<Utc> {
        truncate_to_micros(self.clock.now())
    }

    /// Create tables and indexes.
    async fn run_migrations(&self) -> Result<(), MemoryError> {
        let statements: [(&str, &str); 7] = [
            (
                "sessions table",
                r#"
                CREATE TABLE IF NOT EXISTS sessions (
                    id          TEXT PRIMARY KEY NOT NULL,
                    title       TEXT,
                    created_at  TEXT NOT NULL
                )
                "#,
            ),
            (
                "messages table",
                r#"
                CREATE TABLE IF NOT EXISTS messages (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id  TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                    role        TEXT NOT NULL,
                    text        TEXT NOT NULL,
                    importance  REAL NOT NULL DEFAULT 0.5
                                CHECK (importance >= 0.0 AND importance <= 1.0),
                    created_at  TEXT NOT NULL
                )
                "#,
            ),
            (
                "summaries table",
                r#"
                CREATE TABLE IF NOT EXISTS summaries (
                    id                INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id        TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                    text              TEXT NOT NULL,
                    message_count     INTEGER NOT NULL,
                    start_message_id  INTEGER NOT NULL,
                    end_message_id    INTEGER NOT NULL,
                    importance        REAL NOT NULL DEFAULT 0.7
                                      CHECK (importance >= 0.0 AND importance <= 1.0),
                    created_at        TEXT NOT NULL
                )
                "#,
            ),
            (
                "pins table",
                r#"
                CREATE TABLE IF NOT EXISTS pins (
                    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id         TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                    content            TEXT NOT NULL,
                    source_message_id  INTEGER,
                    importance         REAL NOT NULL DEFAULT 0.8
                                       CHECK (importance >= 0.0 AND importance <= 1.0),
                    pin_type           TEXT NOT NULL DEFAULT 'user'
                                       CHECK (pin_type IN ('user', 'auto', 'code', 'concept', 'system')),
                    created_at         TEXT NOT NULL
                )
                "#,
            ),
            (
                "messages index",
                "CREATE INDEX IF NOT EXISTS idx_messages_session_recent \
                 ON messages(session_id, created_at DESC, id DESC)",
            ),
            (
                "summaries index",
                "CREATE INDEX IF NOT EXISTS idx_summaries_session_rank \
                 ON summaries(session_id, importance DESC, created_at ASC)",
            ),
            (
                "pins index",
                "CREATE INDEX IF NOT EXISTS idx_pins_session_rank \
                 ON pins(session_id, importance DESC)",
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| MemoryError::MigrationFailed(format!("{what}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Run `op`, retrying once after a short pause if it fails transiently.
    async fn with_retry<T, F, Fut>(&self, what: &str, op: F) -> Result<T, MemoryError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        match op().await {
            Ok(value) => Ok(value),
            Err(e) if is_transient(&e) => {
                warn!("{what} failed transiently, retrying once: {e}");
                tokio::time::sleep(self.options.retry_backoff).await;
                op()
                    .await
                    .map_err(|e| MemoryError::Storage(format!("{what}: {e}")))
            }
            Err(e) => Err(MemoryError::Storage(format!("{what}: {e}"))),
        }
    }

    /// Check (strict) or register (lenient) the owning session before a write.
    async fn ensure_session(&self, id: &SessionId) -> Result<(), MemoryError> {
        let pool = &self.pool;
        let sid = id.as_str();

        if self.options.strict_sessions {
            let row = self
                .with_retry("session lookup", move || {
                    sqlx::query("SELECT 1 FROM sessions WHERE id = ?1")
                        .bind(sid)
                        .fetch_optional(pool)
                })
                .await?;
            return match row {
                Some(_) => Ok(()),
                None => Err(MemoryError::session_not_found(sid)),
            };
        }

        let stamp = timestamp(self.now());
        let stamp = stamp.as_str();
        self.with_retry("implicit session insert", move || {
            sqlx::query("INSERT OR IGNORE INTO sessions (id, created_at) VALUES (?1, ?2)")
                .bind(sid)
                .bind(stamp)
                .execute(pool)
        })
        .await?;
        Ok(())
    }

    fn row_to_session(row: &SqliteRow) -> Result<Session, MemoryError> {
        let id: String = column(row, "id")?;
        Ok(Session {
            id: SessionId::parse(&id)?,
            title: column(row, "title")?,
            created_at: parse_timestamp(&column::<String>(row, "created_at")?)?,
        })
    }

    fn row_to_message(row: &SqliteRow) -> Result<Message, MemoryError> {
        let session_id: String = column(row, "session_id")?;
        let role: String = column(row, "role")?;
        Ok(Message {
            id: column(row, "id")?,
            session_id: SessionId::parse(&session_id)?,
            role: role.parse::<Role>()?,
            text: column(row, "text")?,
            importance: Importance::new(column(row, "importance")?)?,
            created_at: parse_timestamp(&column::<String>(row, "created_at")?)?,
        })
    }

    fn row_to_summary(row: &SqliteRow) -> Result<Summary, MemoryError> {
        let session_id: String = column(row, "session_id")?;
        Ok(Summary {
            id: column(row, "id")?,
            session_id: SessionId::parse(&session_id)?,
            text: column(row, "text")?,
            message_count: column(row, "message_count")?,
            start_message_id: column(row, "start_message_id")?,
            end_message_id: column(row, "end_message_id")?,
            importance: Importance::new(column(row, "importance")?)?,
            created_at: parse_timestamp(&column::<String>(row, "created_at")?)?,
        })
    }

    fn row_to_pin(row: &SqliteRow) -> Result<Pin, MemoryError> {
        let session_id: String = column(row, "session_id")?;
        let pin_type: String = column(row, "pin_type")?;
        Ok(Pin {
            id: column(row, "id")?,
            session_id: SessionId::parse(&session_id)?,
            content: column(row, "content")?,
            source_message_id: column(row, "source_message_id")?,
            importance: Importance::new(column(row, "importance")?)?,
            pin_type: pin_type.parse::<PinType>()?,
            created_at: parse_timestamp(&column::<String>(row, "created_at")?)?,
        })
    }
}

/// Read a typed column, naming it in the error.
fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, MemoryError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| MemoryError::QueryFailed(format!("{name} column: {e}")))
}

/// Drop sub-microsecond precision so returned rows equal what a reload sees.
fn truncate_to_micros(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(at.timestamp_micros()).unwrap_or(at)
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, MemoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MemoryError::QueryFailed(format!("bad timestamp {raw:?}: {e}")))
}

/// Busy/locked databases, pool exhaustion and I/O hiccups may succeed on retry.
fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => matches!(
            db.code().as_deref(),
            // SQLITE_BUSY, SQLITE_LOCKED and their extended codes
            Some("5" | "6" | "261" | "262" | "517")
        ),
        _ => false,
    }
}

#[async_trait]
impl SessionStore for SqliteBackend {
    async fn create_session(&self, title: Option<String>) -> Result<Session, MemoryError> {
        let session = Session {
            id: SessionId::new(),
            title,
            created_at: self.now(),
        };
        let pool = &self.pool;
        let sid = session.id.as_str();
        let title = session.title.as_deref();
        let stamp = timestamp(session.created_at);
        let stamp = stamp.as_str();

        self.with_retry("insert session", move || {
            sqlx::query("INSERT INTO sessions (id, title, created_at) VALUES (?1, ?2, ?3)")
                .bind(sid)
                .bind(title)
                .bind(stamp)
                .execute(pool)
        })
        .await?;

        debug!("Created session {}", session.id);
        Ok(session)
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, MemoryError> {
        let pool = &self.pool;
        let sid = id.as_str();
        let row = self
            .with_retry("get session", move || {
                sqlx::query("SELECT * FROM sessions WHERE id = ?1")
                    .bind(sid)
                    .fetch_optional(pool)
            })
            .await?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn delete_session(&self, id: &SessionId) -> Result<bool, MemoryError> {
        let pool = &self.pool;
        let sid = id.as_str();
        let result = self
            .with_retry("delete session", move || {
                sqlx::query("DELETE FROM sessions WHERE id = ?1")
                    .bind(sid)
                    .execute(pool)
            })
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            debug!("Deleted session {id} and its memory");
        }
        Ok(deleted)
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, MemoryError> {
        let pool = &self.pool;
        let rows = self
            .with_retry("list sessions", move || {
                sqlx::query("SELECT * FROM sessions ORDER BY created_at ASC, id ASC").fetch_all(pool)
            })
            .await?;

        rows.iter().map(Self::row_to_session).collect()
    }
}

#[async_trait]
impl MessageStore for SqliteBackend {
    async fn create_message(&self, message: NewMessage) -> Result<Message, MemoryError> {
        self.ensure_session(&message.session_id).await?;

        let created_at = self.now();
        let pool = &self.pool;
        let sid = message.session_id.as_str();
        let role = message.role.as_str();
        let text = message.text.as_str();
        let importance = message.importance.value();
        let stamp = timestamp(created_at);
        let stamp = stamp.as_str();

        let id = self
            .with_retry("insert message", move || async move {
                sqlx::query(
                    "INSERT INTO messages (session_id, role, text, importance, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .bind(sid)
                .bind(role)
                .bind(text)
                .bind(importance)
                .bind(stamp)
                .execute(pool)
                .await
                .map(|r| r.last_insert_rowid())
            })
            .await?;

        debug!("Stored message {id} in session {sid}");
        Ok(Message {
            id,
            session_id: message.session_id,
            role: message.role,
            text: message.text,
            importance: message.importance,
            created_at,
        })
    }

    async fn recent_messages(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<Message>, MemoryError> {
        let pool = &self.pool;
        let sid = session_id.as_str();
        let limit = limit as i64;
        let rows = self
            .with_retry("recent messages", move || {
                sqlx::query(RECENT_MESSAGES_SQL)
                    .bind(sid)
                    .bind(limit)
                    .fetch_all(pool)
            })
            .await?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn messages_after(
        &self,
        session_id: &SessionId,
        after_id: Option<i64>,
    ) -> Result<Vec<Message>, MemoryError> {
        let pool = &self.pool;
        let sid = session_id.as_str();
        let floor = after_id.unwrap_or(i64::MIN);
        let rows = self
            .with_retry("messages after", move || {
                sqlx::query("SELECT * FROM messages WHERE session_id = ?1 AND id > ?2 ORDER BY id ASC")
                    .bind(sid)
                    .bind(floor)
                    .fetch_all(pool)
            })
            .await?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn set_importance(
        &self,
        message_id: i64,
        importance: Importance,
    ) -> Result<bool, MemoryError> {
        let pool = &self.pool;
        let score = importance.value();
        let result = self
            .with_retry("update importance", move || {
                sqlx::query("UPDATE messages SET importance = ?1 WHERE id = ?2")
                    .bind(score)
                    .bind(message_id)
                    .execute(pool)
            })
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_messages(&self, session_id: &SessionId) -> Result<usize, MemoryError> {
        let pool = &self.pool;
        let sid = session_id.as_str();
        let row = self
            .with_retry("count messages", move || {
                sqlx::query("SELECT COUNT(*) AS cnt FROM messages WHERE session_id = ?1")
                    .bind(sid)
                    .fetch_one(pool)
            })
            .await?;

        let cnt: i64 = column(&row, "cnt")?;
        Ok(cnt as usize)
    }
}

#[async_trait]
impl SummaryStore for SqliteBackend {
    async fn create_summary(&self, summary: NewSummary) -> Result<Summary, MemoryError> {
        summary.validate()?;
        self.ensure_session(&summary.session_id).await?;

        let created_at = self.now();
        let pool = &self.pool;
        let sid = summary.session_id.as_str();
        let text = summary.text.as_str();
        let (count, start, end) = (
            summary.message_count,
            summary.start_message_id,
            summary.end_message_id,
        );
        let importance = summary.importance.value();
        let stamp = timestamp(created_at);
        let stamp = stamp.as_str();

        let id = self
            .with_retry("insert summary", move || async move {
                sqlx::query(
                    r#"
                    INSERT INTO summaries
                        (session_id, text, message_count, start_message_id, end_message_id,
                         importance, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                )
                .bind(sid)
                .bind(text)
                .bind(count)
                .bind(start)
                .bind(end)
                .bind(importance)
                .bind(stamp)
                .execute(pool)
                .await
                .map(|r| r.last_insert_rowid())
            })
            .await?;

        debug!("Stored summary {id} over messages {start}..={end} in session {sid}");
        Ok(Summary {
            id,
            session_id: summary.session_id,
            text: summary.text,
            message_count: summary.message_count,
            start_message_id: summary.start_message_id,
            end_message_id: summary.end_message_id,
            importance: summary.importance,
            created_at,
        })
    }

    async fn top_summaries(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<Summary>, MemoryError> {
        let pool = &self.pool;
        let sid = session_id.as_str();
        let limit = limit as i64;
        let rows = self
            .with_retry("top summaries", move || {
                sqlx::query(TOP_SUMMARIES_SQL)
                    .bind(sid)
                    .bind(limit)
                    .fetch_all(pool)
            })
            .await?;

        rows.iter().map(Self::row_to_summary).collect()
    }

    async fn list_summaries(&self, session_id: &SessionId) -> Result<Vec<Summary>, MemoryError> {
        let pool = &self.pool;
        let sid = session_id.as_str();
        let rows = self
            .with_retry("list summaries", move || {
                sqlx::query(
                    "SELECT * FROM summaries WHERE session_id = ?1 ORDER BY created_at ASC, id ASC",
                )
                .bind(sid)
                .fetch_all(pool)
            })
            .await?;

        rows.iter().map(Self::row_to_summary).collect()
    }

    async fn latest_summarized_id(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<i64>, MemoryError> {
        let pool = &self.pool;
        let sid = session_id.as_str();
        let row = self
            .with_retry("latest summarized id", move || {
                sqlx::query("SELECT MAX(end_message_id) AS latest FROM summaries WHERE session_id = ?1")
                    .bind(sid)
                    .fetch_one(pool)
            })
            .await?;

        column(&row, "latest")
    }
}

#[async_trait]
impl PinStore for SqliteBackend {
    async fn create_pin(&self, pin: NewPin) -> Result<Pin, MemoryError> {
        self.ensure_session(&pin.session_id).await?;

        let created_at = self.now();
        let pool = &self.pool;
        let sid = pin.session_id.as_str();
        let content = pin.content.as_str();
        let source = pin.source_message_id;
        let importance = pin.importance.value();
        let pin_type = pin.pin_type.as_str();
        let stamp = timestamp(created_at);
        let stamp = stamp.as_str();

        let id = self
            .with_retry("insert pin", move || async move {
                sqlx::query(
                    r#"
                    INSERT INTO pins
                        (session_id, content, source_message_id, importance, pin_type, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                )
                .bind(sid)
                .bind(content)
                .bind(source)
                .bind(importance)
                .bind(pin_type)
                .bind(stamp)
                .execute(pool)
                .await
                .map(|r| r.last_insert_rowid())
            })
            .await?;

        debug!("Stored {pin_type} pin {id} in session {sid}");
        Ok(Pin {
            id,
            session_id: pin.session_id,
            content: pin.content,
            source_message_id: pin.source_message_id,
            importance: pin.importance,
            pin_type: pin.pin_type,
            created_at,
        })
    }

    async fn list_pins(
        &self,
        session_id: &SessionId,
        pin_type: Option<PinType>,
    ) -> Result<Vec<Pin>, MemoryError> {
        let pool = &self.pool;
        let sid = session_id.as_str();
        let pin_type = pin_type.map(PinType::as_str);
        let rows = self
            .with_retry("list pins", move || {
                sqlx::query(PINS_SQL).bind(sid).bind(pin_type).fetch_all(pool)
            })
            .await?;

        rows.iter().map(Self::row_to_pin).collect()
    }

    async fn delete_pin(&self, pin_id: i64) -> Result<bool, MemoryError> {
        let pool = &self.pool;
        let result = self
            .with_retry("delete pin", move || {
                sqlx::query("DELETE FROM pins WHERE id = ?1")
                    .bind(pin_id)
                    .execute(pool)
            })
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ContextSource for SqliteBackend {
    async fn load_context_inputs(
        &self,
        session_id: &SessionId,
        summary_limit: usize,
        message_window: usize,
    ) -> Result<ContextInputs, MemoryError> {
        let pool = &self.pool;
        let sid = session_id.as_str();
        let summary_limit = summary_limit as i64;
        let message_window = message_window as i64;

        let (pin_rows, summary_rows, message_rows) = self
            .with_retry("context snapshot", move || async move {
                let mut tx = pool.begin().await?;
                let pins = sqlx::query(PINS_SQL)
                    .bind(sid)
                    .bind(None::<&str>)
                    .fetch_all(&mut *tx)
                    .await?;
                let summaries = sqlx::query(TOP_SUMMARIES_SQL)
                    .bind(sid)
                    .bind(summary_limit)
                    .fetch_all(&mut *tx)
                    .await?;
                let messages = sqlx::query(RECENT_MESSAGES_SQL)
                    .bind(sid)
                    .bind(message_window)
                    .fetch_all(&mut *tx)
                    .await?;
                tx.commit().await?;
                Ok::<_, sqlx::Error>((pins, summaries, messages))
            })
            .await?;

        Ok(ContextInputs {
            pins: pin_rows
                .iter()
                .map(Self::row_to_pin)
                .collect::<Result<_, _>>()?,
            summaries: summary_rows
                .iter()
                .map(Self::row_to_summary)
                .collect::<Result<_, _>>()?,
            recent_messages: message_rows
                .iter()
                .map(Self::row_to_message)
                .collect::<Result<_, _>>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use recollect_core::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn test_backend() -> SqliteBackend {
        SqliteBackend::new("sqlite::memory:").await.unwrap()
    }

    async fn with_session(db: &SqliteBackend) -> SessionId {
        db.create_session(Some("test".into())).await.unwrap().id
    }

    #[tokio::test]
    async fn session_round_trip() {
        let db = test_backend().await;
        let session = db.create_session(Some("planning".into())).await.unwrap();
        let loaded = db.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.title.as_deref(), Some("planning"));
        assert_eq!(loaded.created_at, session.created_at);
        assert_eq!(db.list_sessions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn message_round_trip() {
        let db = test_backend().await;
        let sid = with_session(&db).await;
        let stored = db
            .create_message(
                NewMessage::new(sid.clone(), Role::Assistant, "Use cargo workspaces")
                    .with_importance(Importance::new(0.65).unwrap()),
            )
            .await
            .unwrap();

        let loaded = db.recent_messages(&sid, 10).await.unwrap();
        assert_eq!(loaded, vec![stored]);
    }

    #[tokio::test]
    async fn recent_messages_newest_first_and_limited() {
        let db = test_backend().await;
        let sid = with_session(&db).await;
        for i in 0..5 {
            db.create_message(NewMessage::user(sid.clone(), format!("turn {i}")))
                .await
                .unwrap();
        }

        let recent = db.recent_messages(&sid, 3).await.unwrap();
        let texts: Vec<_> = recent.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["turn 4", "turn 3", "turn 2"]);
        assert_eq!(db.count_messages(&sid).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn strict_mode_rejects_unknown_session() {
        let db = test_backend().await;
        let err = db
            .create_pin(NewPin::new(SessionId::parse("ghost").unwrap(), "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn lenient_mode_creates_session() {
        let options = SqliteOptions {
            strict_sessions: false,
            ..SqliteOptions::default()
        };
        let db = SqliteBackend::open("sqlite::memory:", options, Arc::new(SystemClock))
            .await
            .unwrap();
        let sid = SessionId::parse("implicit").unwrap();
        db.create_message(NewMessage::user(sid.clone(), "hi")).await.unwrap();
        assert!(db.get_session(&sid).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn summaries_rank_by_importance_then_age() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let db = SqliteBackend::open("sqlite::memory:", SqliteOptions::default(), clock.clone())
            .await
            .unwrap();
        let sid = with_session(&db).await;

        let a = db.create_summary(NewSummary::for_range(sid.clone(), "a", 1, 10)).await.unwrap();
        clock.advance(ChronoDuration::milliseconds(10));
        let b = db.create_summary(NewSummary::for_range(sid.clone(), "b", 11, 20)).await.unwrap();
        clock.advance(ChronoDuration::milliseconds(10));
        let c = db
            .create_summary(
                NewSummary::for_range(sid.clone(), "c", 21, 30)
                    .with_importance(Importance::new(0.95).unwrap()),
            )
            .await
            .unwrap();

        let top = db.top_summaries(&sid, 2).await.unwrap();
        assert_eq!(top.iter().map(|s| s.id).collect::<Vec<_>>(), vec![c.id, a.id]);
        let all = db.list_summaries(&sid).await.unwrap();
        assert_eq!(all.iter().map(|s| s.id).collect::<Vec<_>>(), vec![a.id, b.id, c.id]);
        assert_eq!(db.latest_summarized_id(&sid).await.unwrap(), Some(30));
    }

    #[tokio::test]
    async fn latest_summarized_id_empty() {
        let db = test_backend().await;
        let sid = with_session(&db).await;
        assert_eq!(db.latest_summarized_id(&sid).await.unwrap(), None);
    }

    #[tokio::test]
    async fn pins_filter_and_delete() {
        let db = test_backend().await;
        let sid = with_session(&db).await;
        let msg = db.create_message(NewMessage::user(sid.clone(), "fn main() {}")).await.unwrap();
        let code = db
            .create_pin(NewPin::new(sid.clone(), "fn main() {}").with_type(PinType::Code).with_source(msg.id))
            .await
            .unwrap();
        db.create_pin(NewPin::new(sid.clone(), "likes terse answers")).await.unwrap();

        let only_code = db.list_pins(&sid, Some(PinType::Code)).await.unwrap();
        assert_eq!(only_code, vec![code.clone()]);
        assert_eq!(db.list_pins(&sid, None).await.unwrap().len(), 2);

        assert!(db.delete_pin(code.id).await.unwrap());
        assert!(!db.delete_pin(code.id).await.unwrap());
        assert_eq!(db.list_pins(&sid, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn set_importance_updates_row() {
        let db = test_backend().await;
        let sid = with_session(&db).await;
        let msg = db.create_message(NewMessage::user(sid.clone(), "x")).await.unwrap();
        assert!(db.set_importance(msg.id, Importance::new(0.1).unwrap()).await.unwrap());
        let loaded = db.recent_messages(&sid, 1).await.unwrap();
        assert_eq!(loaded[0].importance.value(), 0.1);
        assert!(!db.set_importance(msg.id + 100, Importance::MESSAGE).await.unwrap());
    }

    #[tokio::test]
    async fn delete_session_cascades() {
        let db = test_backend().await;
        let sid = with_session(&db).await;
        let keep = with_session(&db).await;
        let m = db.create_message(NewMessage::user(sid.clone(), "a")).await.unwrap();
        db.create_summary(NewSummary::for_range(sid.clone(), "s", m.id, m.id)).await.unwrap();
        db.create_pin(NewPin::new(sid.clone(), "p")).await.unwrap();
        db.create_pin(NewPin::new(keep.clone(), "other")).await.unwrap();

        assert!(db.delete_session(&sid).await.unwrap());
        let inputs = db.load_context_inputs(&sid, 5, 50).await.unwrap();
        assert_eq!(inputs, ContextInputs::default());
        assert_eq!(db.count_messages(&sid).await.unwrap(), 0);
        assert_eq!(db.list_pins(&keep, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn context_snapshot_matches_individual_reads() {
        let db = test_backend().await;
        let sid = with_session(&db).await;
        for i in 0..6 {
            db.create_message(NewMessage::user(sid.clone(), format!("m{i}"))).await.unwrap();
        }
        db.create_summary(NewSummary::for_range(sid.clone(), "early", 1, 3)).await.unwrap();
        db.create_pin(NewPin::new(sid.clone(), "fact")).await.unwrap();

        let inputs = db.load_context_inputs(&sid, 5, 4).await.unwrap();
        assert_eq!(inputs.pins, db.list_pins(&sid, None).await.unwrap());
        assert_eq!(inputs.summaries, db.top_summaries(&sid, 5).await.unwrap());
        assert_eq!(inputs.recent_messages, db.recent_messages(&sid, 4).await.unwrap());
    }

    #[tokio::test]
    async fn file_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.sqlite");
        let url = format!("sqlite://{}", path.display());

        let sid = {
            let db = SqliteBackend::new(&url).await.unwrap();
            let sid = with_session(&db).await;
            db.create_pin(NewPin::new(sid.clone(), "survives restarts")).await.unwrap();
            sid
        };

        let db = SqliteBackend::new(&url).await.unwrap();
        let pins = db.list_pins(&sid, None).await.unwrap();
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].content, "survives restarts");
    }

    #[test]
    fn timestamps_sort_lexicographically() {
        let early = Utc::now();
        let late = early + ChronoDuration::microseconds(1);
        assert!(timestamp(early) < timestamp(late));
        let stored = truncate_to_micros(early);
        assert_eq!(parse_timestamp(&timestamp(early)).unwrap(), stored);
    }

    #[test]
    fn non_transient_errors_are_not_retried() {
        assert!(is_transient(&sqlx::Error::PoolTimedOut));
        assert!(!is_transient(&sqlx::Error::RowNotFound));
    }

    #[tokio::test]
    async fn transient_failure_retried_exactly_once() {
        let db = test_backend().await;
        let calls = AtomicUsize::new(0);

        let result = db
            .with_retry("flaky query", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(sqlx::Error::PoolTimedOut) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(result, Err(MemoryError::Storage(msg)) if msg.contains("flaky query")));
    }

    #[tokio::test]
    async fn permanent_failure_not_retried() {
        let db = test_backend().await;
        let calls = AtomicUsize::new(0);

        let result = db
            .with_retry("missing row", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(sqlx::Error::RowNotFound) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(MemoryError::Storage(_))));
    }

    #[tokio::test]
    async fn retry_recovers_from_one_transient_failure() {
        let db = test_backend().await;
        let calls = AtomicUsize::new(0);

        let result = db
            .with_retry("busy then fine", || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(sqlx::Error::PoolTimedOut)
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
