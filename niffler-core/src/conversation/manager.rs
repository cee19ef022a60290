//! `ConversationManager`: the façade the CLI and worker loop drive (spec
//! §4.4). Plan-mode state is re-read from storage on every check rather
//! than cached, matching [`crate::tools::EditTool`]'s own re-read discipline.

use std::collections::HashSet;

use uuid::Uuid;

use crate::error::ConversationError;
use crate::message::Message;
use crate::tool_source::ToolCallContext;

use super::store::SqliteConversationStore;

pub struct ConversationManager {
    store: SqliteConversationStore,
}

impl ConversationManager {
    pub fn open(db_path: impl AsRef<std::path::Path>) -> Result<Self, ConversationError> {
        Ok(Self {
            store: SqliteConversationStore::new(db_path)?,
        })
    }

    pub async fn start_conversation(&self, model_nickname: &str) -> Result<String, ConversationError> {
        let id = Uuid::new_v4().to_string();
        self.store.create_conversation(&id, model_nickname).await?;
        Ok(id)
    }

    pub async fn append_message(
        &self,
        conversation_id: &str,
        message: &Message,
    ) -> Result<(), ConversationError> {
        self.store.append_message(conversation_id, message).await?;
        Ok(())
    }

    pub async fn load_history(&self, conversation_id: &str) -> Result<Vec<Message>, ConversationError> {
        self.store.load_history(conversation_id).await
    }

    pub async fn set_mode(&self, conversation_id: &str, plan_mode: bool) -> Result<(), ConversationError> {
        let mode = if plan_mode { "plan" } else { "code" };
        self.store.set_mode(conversation_id, mode).await
    }

    pub async fn switch_model(&self, conversation_id: &str, model_nickname: &str) -> Result<(), ConversationError> {
        self.store.switch_model(conversation_id, model_nickname).await
    }

    pub async fn current_model(&self, conversation_id: &str) -> Result<String, ConversationError> {
        Ok(self.store.get_conversation(conversation_id).await?.model_nickname)
    }

    /// On successful `create`, the created file's relative path is added to
    /// the conversation's plan-mode `createdFiles` set (spec §4.5).
    pub async fn record_plan_mode_created(
        &self,
        conversation_id: &str,
        relative_path: &str,
    ) -> Result<(), ConversationError> {
        self.store
            .record_plan_mode_created(conversation_id, relative_path)
            .await
    }

    pub async fn plan_mode_created_files(&self, conversation_id: &str) -> Result<HashSet<String>, ConversationError> {
        self.store.plan_mode_created_files(conversation_id).await
    }

    pub async fn record_model_token_usage(
        &self,
        conversation_id: &str,
        model_nickname: &str,
        input_tokens: u64,
        output_tokens: u64,
        reasoning_tokens: u64,
    ) -> Result<(), ConversationError> {
        self.store
            .record_model_token_usage(conversation_id, model_nickname, input_tokens, output_tokens, reasoning_tokens)
            .await
    }

    pub async fn total_token_usage(&self, conversation_id: &str) -> Result<(i64, i64, i64), ConversationError> {
        self.store.total_token_usage(conversation_id).await
    }

    /// Builds the per-call [`ToolCallContext`] the tool worker passes to
    /// plan-mode-aware tools, re-reading mode and created-files fresh.
    pub async fn tool_call_context(&self, conversation_id: &str) -> Result<ToolCallContext, ConversationError> {
        let row = self.store.get_conversation(conversation_id).await?;
        let created_files = self.plan_mode_created_files(conversation_id).await?;
        let history = self.load_history(conversation_id).await?;
        Ok(ToolCallContext::new(history)
            .with_mode(row.mode == "plan", created_files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn start_conversation_then_append_and_load_round_trips() {
        let dir = tempdir().unwrap();
        let manager = ConversationManager::open(dir.path().join("niffler.db")).unwrap();
        let id = manager.start_conversation("test-model").await.unwrap();
        manager.append_message(&id, &Message::user("hi")).await.unwrap();
        let history = manager.load_history(&id).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn tool_call_context_reflects_current_mode_and_created_files() {
        let dir = tempdir().unwrap();
        let manager = ConversationManager::open(dir.path().join("niffler.db")).unwrap();
        let id = manager.start_conversation("test-model").await.unwrap();
        manager.set_mode(&id, true).await.unwrap();
        manager.record_plan_mode_created(&id, "notes.md").await.unwrap();

        let ctx = manager.tool_call_context(&id).await.unwrap();
        assert!(ctx.plan_mode_enabled);
        assert!(ctx.plan_mode_created_files.contains("notes.md"));
    }

    #[tokio::test]
    async fn total_token_usage_reflects_recorded_turns() {
        let dir = tempdir().unwrap();
        let manager = ConversationManager::open(dir.path().join("niffler.db")).unwrap();
        let id = manager.start_conversation("test-model").await.unwrap();
        manager.record_model_token_usage(&id, "test-model", 80, 15, 0).await.unwrap();
        let (input, output, reasoning) = manager.total_token_usage(&id).await.unwrap();
        assert_eq!((input, output, reasoning), (80, 15, 0));
    }

    #[tokio::test]
    async fn switch_model_updates_conversation_row() {
        let dir = tempdir().unwrap();
        let manager = ConversationManager::open(dir.path().join("niffler.db")).unwrap();
        let id = manager.start_conversation("model-a").await.unwrap();
        manager.switch_model(&id, "model-b").await.unwrap();
        assert_eq!(manager.current_model(&id).await.unwrap(), "model-b");
    }
}
