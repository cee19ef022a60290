//! SQLite-backed persistence for the logical tables in spec §6:
//! `conversation`, `conversation_message`, `conversation_thinking_token`,
//! `model_token_usage`, `token_correction_factor`, `todo_list`, `todo_item`,
//! `plan_mode_state`. Grounded in `loom/src/memory/sqlite_store.rs`'s
//! reopen-a-connection-per-call-via-spawn_blocking pattern, since
//! `rusqlite::Connection` is not `Sync`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::ConversationError;
use crate::message::{Message, Role, ThinkingContent, ToolCall};

fn open(db_path: &Path) -> Result<Connection, ConversationError> {
    Connection::open(db_path).map_err(|e| ConversationError::Storage(e.to_string()))
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversation (
    id TEXT PRIMARY KEY,
    model_nickname TEXT NOT NULL,
    mode TEXT NOT NULL DEFAULT 'code',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS conversation_message (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id TEXT NOT NULL REFERENCES conversation(id),
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    tool_calls TEXT NOT NULL DEFAULT '[]',
    tool_call_id TEXT,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS conversation_thinking_token (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_message_id INTEGER NOT NULL REFERENCES conversation_message(id),
    reasoning_text TEXT,
    encrypted_reasoning TEXT,
    reasoning_id TEXT,
    is_encrypted INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS model_token_usage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id TEXT NOT NULL REFERENCES conversation(id),
    model_nickname TEXT NOT NULL,
    input_tokens INTEGER NOT NULL,
    output_tokens INTEGER NOT NULL,
    reasoning_tokens INTEGER NOT NULL DEFAULT 0,
    recorded_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS token_correction_factor (
    model_nickname TEXT PRIMARY KEY,
    total_samples INTEGER NOT NULL,
    sum_ratio REAL NOT NULL,
    avg_correction REAL NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS todo_list (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversation(id)
);

CREATE TABLE IF NOT EXISTS todo_item (
    id TEXT PRIMARY KEY,
    list_id TEXT NOT NULL REFERENCES todo_list(id),
    position INTEGER NOT NULL,
    content TEXT NOT NULL,
    state TEXT NOT NULL,
    priority TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS plan_mode_state (
    conversation_id TEXT PRIMARY KEY REFERENCES conversation(id),
    enabled INTEGER NOT NULL DEFAULT 0,
    created_files TEXT NOT NULL DEFAULT '[]'
);
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRow {
    pub id: String,
    pub model_nickname: String,
    pub mode: String,
}

/// Owns a database path; every operation opens its own connection inside
/// `spawn_blocking`, matching the teacher's approach to sharing a
/// non-`Sync` `rusqlite::Connection` across async tasks.
pub struct SqliteConversationStore {
    db_path: PathBuf,
}

impl SqliteConversationStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ConversationError> {
        let db_path = path.as_ref().to_path_buf();
        let conn = open(&db_path)?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| ConversationError::Storage(e.to_string()))?;
        Ok(Self { db_path })
    }

    pub async fn create_conversation(
        &self,
        id: &str,
        model_nickname: &str,
    ) -> Result<(), ConversationError> {
        let db_path = self.db_path.clone();
        let id = id.to_string();
        let model_nickname = model_nickname.to_string();
        let now = Utc::now().timestamp();
        tokio::task::spawn_blocking(move || {
            let conn = open(&db_path)?;
            conn.execute(
                "INSERT INTO conversation (id, model_nickname, mode, created_at, updated_at) VALUES (?1, ?2, 'code', ?3, ?3)",
                params![id, model_nickname, now],
            )
            .map_err(|e| ConversationError::Storage(e.to_string()))?;
            conn.execute(
                "INSERT INTO plan_mode_state (conversation_id, enabled, created_files) VALUES (?1, 0, '[]')",
                params![id],
            )
            .map_err(|e| ConversationError::Storage(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| ConversationError::Storage(e.to_string()))?
    }

    pub async fn get_conversation(
        &self,
        id: &str,
    ) -> Result<ConversationRow, ConversationError> {
        let db_path = self.db_path.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = open(&db_path)?;
            conn.query_row(
                "SELECT id, model_nickname, mode FROM conversation WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ConversationRow {
                        id: row.get(0)?,
                        model_nickname: row.get(1)?,
                        mode: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(|e| ConversationError::Storage(e.to_string()))?
            .ok_or_else(|| ConversationError::NotFound(id.clone()))
        })
        .await
        .map_err(|e| ConversationError::Storage(e.to_string()))?
    }

    pub async fn append_message(
        &self,
        conversation_id: &str,
        message: &Message,
    ) -> Result<i64, ConversationError> {
        let db_path = self.db_path.clone();
        let conversation_id = conversation_id.to_string();
        let role = role_to_str(message.role).to_string();
        let content = message.content.clone();
        let tool_calls_json = serde_json::to_string(&message.tool_calls)
            .map_err(|e| ConversationError::Storage(e.to_string()))?;
        let tool_call_id = message.tool_call_id.clone();
        let created_at = message.created_at.timestamp();
        let thinking = message.thinking.clone();

        tokio::task::spawn_blocking(move || {
            let conn = open(&db_path)?;
            conn.execute(
                "INSERT INTO conversation_message (conversation_id, role, content, tool_calls, tool_call_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![conversation_id, role, content, tool_calls_json, tool_call_id, created_at],
            )
            .map_err(|e| ConversationError::Storage(e.to_string()))?;
            let message_id = conn.last_insert_rowid();

            if let Some(t) = thinking {
                conn.execute(
                    "INSERT INTO conversation_thinking_token (conversation_message_id, reasoning_text, encrypted_reasoning, reasoning_id, is_encrypted) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![message_id, t.reasoning_text, t.encrypted_reasoning, t.reasoning_id, t.is_encrypted as i64],
                )
                .map_err(|e| ConversationError::Storage(e.to_string()))?;
            }
            conn.execute(
                "UPDATE conversation SET updated_at = ?1 WHERE id = ?2",
                params![created_at, conversation_id],
            )
            .map_err(|e| ConversationError::Storage(e.to_string()))?;
            Ok(message_id)
        })
        .await
        .map_err(|e| ConversationError::Storage(e.to_string()))?
    }

    pub async fn load_history(&self, conversation_id: &str) -> Result<Vec<Message>, ConversationError> {
        let db_path = self.db_path.clone();
        let conversation_id = conversation_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = open(&db_path)?;
            let mut stmt = conn
                .prepare(
                    "SELECT m.id, m.role, m.content, m.tool_calls, m.tool_call_id, m.created_at,
                            t.reasoning_text, t.encrypted_reasoning, t.reasoning_id, t.is_encrypted
                     FROM conversation_message m
                     LEFT JOIN conversation_thinking_token t ON t.conversation_message_id = m.id
                     WHERE m.conversation_id = ?1
                     ORDER BY m.id ASC",
                )
                .map_err(|e| ConversationError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(params![conversation_id], |row| {
                    let role_str: String = row.get(1)?;
                    let tool_calls_json: String = row.get(3)?;
                    let created_at_secs: i64 = row.get(5)?;
                    let reasoning_text: Option<String> = row.get(6)?;
                    let encrypted_reasoning: Option<String> = row.get(7)?;
                    let reasoning_id: Option<String> = row.get(8)?;
                    let is_encrypted: Option<i64> = row.get(9)?;
                    Ok((
                        role_str,
                        row.get::<_, String>(2)?,
                        tool_calls_json,
                        row.get::<_, Option<String>>(4)?,
                        created_at_secs,
                        reasoning_text,
                        encrypted_reasoning,
                        reasoning_id,
                        is_encrypted,
                    ))
                })
                .map_err(|e| ConversationError::Storage(e.to_string()))?;

            let mut messages = Vec::new();
            for row in rows {
                let (role_str, content, tool_calls_json, tool_call_id, created_at_secs, reasoning_text, encrypted_reasoning, reasoning_id, is_encrypted) =
                    row.map_err(|e| ConversationError::Storage(e.to_string()))?;
                let role = str_to_role(&role_str)
                    .ok_or_else(|| ConversationError::Invariant(format!("unknown role: {role_str}")))?;
                let tool_calls: Vec<ToolCall> = serde_json::from_str(&tool_calls_json)
                    .map_err(|e| ConversationError::Storage(e.to_string()))?;
                let thinking = if reasoning_text.is_some() || encrypted_reasoning.is_some() {
                    Some(ThinkingContent {
                        reasoning_text,
                        encrypted_reasoning,
                        reasoning_id,
                        provider_meta: None,
                        is_encrypted: is_encrypted.unwrap_or(0) != 0,
                    })
                } else {
                    None
                };
                messages.push(Message {
                    role,
                    content,
                    tool_calls,
                    tool_call_id,
                    thinking,
                    created_at: DateTime::from_timestamp(created_at_secs, 0).unwrap_or_else(Utc::now),
                });
            }
            Ok(messages)
        })
        .await
        .map_err(|e| ConversationError::Storage(e.to_string()))?
    }

    pub async fn set_mode(&self, conversation_id: &str, mode: &str) -> Result<(), ConversationError> {
        let db_path = self.db_path.clone();
        let conversation_id = conversation_id.to_string();
        let mode = mode.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = open(&db_path)?;
            conn.execute(
                "UPDATE conversation SET mode = ?1 WHERE id = ?2",
                params![mode, conversation_id],
            )
            .map_err(|e| ConversationError::Storage(e.to_string()))?;
            conn.execute(
                "UPDATE plan_mode_state SET enabled = ?1 WHERE conversation_id = ?2",
                params![(mode == "plan") as i64, conversation_id],
            )
            .map_err(|e| ConversationError::Storage(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| ConversationError::Storage(e.to_string()))?
    }

    pub async fn switch_model(&self, conversation_id: &str, model_nickname: &str) -> Result<(), ConversationError> {
        let db_path = self.db_path.clone();
        let conversation_id = conversation_id.to_string();
        let model_nickname = model_nickname.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = open(&db_path)?;
            conn.execute(
                "UPDATE conversation SET model_nickname = ?1 WHERE id = ?2",
                params![model_nickname, conversation_id],
            )
            .map_err(|e| ConversationError::Storage(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| ConversationError::Storage(e.to_string()))?
    }

    pub async fn plan_mode_created_files(&self, conversation_id: &str) -> Result<HashSet<String>, ConversationError> {
        let db_path = self.db_path.clone();
        let conversation_id = conversation_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = open(&db_path)?;
            let json: String = conn
                .query_row(
                    "SELECT created_files FROM plan_mode_state WHERE conversation_id = ?1",
                    params![conversation_id],
                    |row| row.get(0),
                )
                .map_err(|e| ConversationError::Storage(e.to_string()))?;
            let files: Vec<String> = serde_json::from_str(&json)
                .map_err(|e| ConversationError::Storage(e.to_string()))?;
            Ok(files.into_iter().collect())
        })
        .await
        .map_err(|e| ConversationError::Storage(e.to_string()))?
    }

    pub async fn record_plan_mode_created(&self, conversation_id: &str, relative_path: &str) -> Result<(), ConversationError> {
        let mut files = self.plan_mode_created_files(conversation_id).await?;
        files.insert(relative_path.to_string());
        let db_path = self.db_path.clone();
        let conversation_id = conversation_id.to_string();
        let json = serde_json::to_string(&files).map_err(|e| ConversationError::Storage(e.to_string()))?;
        tokio::task::spawn_blocking(move || {
            let conn = open(&db_path)?;
            conn.execute(
                "UPDATE plan_mode_state SET created_files = ?1 WHERE conversation_id = ?2",
                params![json, conversation_id],
            )
            .map_err(|e| ConversationError::Storage(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| ConversationError::Storage(e.to_string()))?
    }

    /// Sums every recorded usage row for `conversation_id` (spec §6 "/context").
    pub async fn total_token_usage(&self, conversation_id: &str) -> Result<(i64, i64, i64), ConversationError> {
        let db_path = self.db_path.clone();
        let conversation_id = conversation_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = open(&db_path)?;
            conn.query_row(
                "SELECT COALESCE(SUM(input_tokens), 0), COALESCE(SUM(output_tokens), 0), COALESCE(SUM(reasoning_tokens), 0)
                 FROM model_token_usage WHERE conversation_id = ?1",
                params![conversation_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|e| ConversationError::Storage(e.to_string()))
        })
        .await
        .map_err(|e| ConversationError::Storage(e.to_string()))?
    }

    pub async fn record_model_token_usage(
        &self,
        conversation_id: &str,
        model_nickname: &str,
        input_tokens: u64,
        output_tokens: u64,
        reasoning_tokens: u64,
    ) -> Result<(), ConversationError> {
        let db_path = self.db_path.clone();
        let conversation_id = conversation_id.to_string();
        let model_nickname = model_nickname.to_string();
        let now = Utc::now().timestamp();
        tokio::task::spawn_blocking(move || {
            let conn = open(&db_path)?;
            conn.execute(
                "INSERT INTO model_token_usage (conversation_id, model_nickname, input_tokens, output_tokens, reasoning_tokens, recorded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![conversation_id, model_nickname, input_tokens as i64, output_tokens as i64, reasoning_tokens as i64, now],
            )
            .map_err(|e| ConversationError::Storage(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| ConversationError::Storage(e.to_string()))?
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn str_to_role(s: &str) -> Option<Role> {
    match s {
        "system" => Some(Role::System),
        "user" => Some(Role::User),
        "assistant" => Some(Role::Assistant),
        "tool" => Some(Role::Tool),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_and_load_round_trips_history() {
        let dir = tempdir().unwrap();
        let store = SqliteConversationStore::new(dir.path().join("niffler.db")).unwrap();
        store.create_conversation("c1", "test-model").await.unwrap();
        store.append_message("c1", &Message::user("hello")).await.unwrap();
        store
            .append_message("c1", &Message::assistant("hi there", vec![]))
            .await
            .unwrap();

        let history = store.load_history("c1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].content, "hi there");
    }

    #[tokio::test]
    async fn thinking_content_round_trips_through_storage() {
        let dir = tempdir().unwrap();
        let store = SqliteConversationStore::new(dir.path().join("niffler.db")).unwrap();
        store.create_conversation("c1", "test-model").await.unwrap();
        let msg = Message::assistant("answer", vec![])
            .with_thinking(ThinkingContent::plain("reasoning", Some("r1".to_string())));
        store.append_message("c1", &msg).await.unwrap();

        let history = store.load_history("c1").await.unwrap();
        let thinking = history[0].thinking.as_ref().unwrap();
        assert_eq!(thinking.reasoning_text.as_deref(), Some("reasoning"));
        assert!(!thinking.is_encrypted);
    }

    #[tokio::test]
    async fn plan_mode_created_files_accumulate() {
        let dir = tempdir().unwrap();
        let store = SqliteConversationStore::new(dir.path().join("niffler.db")).unwrap();
        store.create_conversation("c1", "test-model").await.unwrap();
        store.record_plan_mode_created("c1", "notes.md").await.unwrap();
        store.record_plan_mode_created("c1", "src/lib.rs").await.unwrap();
        let files = store.plan_mode_created_files("c1").await.unwrap();
        assert!(files.contains("notes.md"));
        assert!(files.contains("src/lib.rs"));
    }

    #[tokio::test]
    async fn total_token_usage_sums_across_recorded_turns() {
        let dir = tempdir().unwrap();
        let store = SqliteConversationStore::new(dir.path().join("niffler.db")).unwrap();
        store.create_conversation("c1", "test-model").await.unwrap();
        store.record_model_token_usage("c1", "test-model", 100, 20, 0).await.unwrap();
        store.record_model_token_usage("c1", "test-model", 50, 10, 5).await.unwrap();
        let (input, output, reasoning) = store.total_token_usage("c1").await.unwrap();
        assert_eq!((input, output, reasoning), (150, 30, 5));
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_found() {
        let dir = tempdir().unwrap();
        let store = SqliteConversationStore::new(dir.path().join("niffler.db")).unwrap();
        let err = store.get_conversation("ghost").await.unwrap_err();
        assert!(matches!(err, ConversationError::NotFound(_)));
    }
}
