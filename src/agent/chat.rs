//! Conversational replies with full project context.
//!
//! One model call produces the reply. If the reply requests a tool through a
//! fenced `tool_code` block, the tool runs and a single follow-up model call
//! continues the reply with the result; the two replies are concatenated.
//! The exchange is appended to conversation history (capped at 50) and
//! persisted before returning.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::indexer::CodebaseIndexer;
use crate::llm::ModelClient;
use crate::search::SearchProvider;
use crate::store::RepoStateStore;
use crate::tools;

use super::prompt;

/// Message fragments that indicate an information-seeking intent worth a
/// pre-emptive web search.
const SEARCH_INTENT_PHRASES: &[&str] = &[
    "search",
    "look up",
    "how to",
    "how do i",
    "what is",
    "what are",
    "latest version",
    "documentation for",
];

pub struct ConversationEngine {
    llm: Arc<dyn ModelClient>,
    store: Arc<RepoStateStore>,
    search: Arc<dyn SearchProvider>,
}

impl ConversationEngine {
    pub fn new(
        llm: Arc<dyn ModelClient>,
        store: Arc<RepoStateStore>,
        search: Arc<dyn SearchProvider>,
    ) -> Self {
        Self { llm, store, search }
    }

    /// Produce a reply to `message`, persisting the updated history.
    pub async fn chat_response(&self, message: &str) -> Result<String> {
        let metadata = self.store.get_metadata().await?;
        let mut memory = self.store.get_memory().await?;
        let indexer = CodebaseIndexer::from_memory(&memory);

        let search_context = if wants_search(message) {
            debug!("message shows search intent; augmenting prompt");
            Some(self.search.search(message).await)
        } else {
            None
        };

        let chat_prompt = prompt::chat_prompt(
            message,
            metadata.as_ref(),
            &indexer.summary(),
            &memory,
            search_context.as_deref(),
        );
        let first_reply = self.llm.generate(&chat_prompt).await?;

        // At most one tool round per chat turn.
        let final_reply = match tools::parse_tool_request(&first_reply) {
            Some(request) => {
                debug!(?request, "reply requested a tool");
                let tool_result = tools::dispatch(&request, &self.store, &*self.search).await;
                let continuation = self
                    .llm
                    .generate(&prompt::tool_continuation_prompt(&first_reply, &tool_result))
                    .await?;
                format!("{first_reply}\n\n{continuation}")
            }
            None => first_reply,
        };

        memory.record_exchange(message, &final_reply);
        self.store.save_memory(&memory).await?;
        Ok(final_reply)
    }
}

/// Keyword heuristic for information-seeking intent.
fn wants_search(message: &str) -> bool {
    let lowered = message.to_lowercase();
    SEARCH_INTENT_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockModel;
    use crate::remote::memory::InMemoryHost;
    use crate::search::FixedSearch;
    use crate::types::MAX_CONVERSATION_ENTRIES;

    async fn engine_with(replies: Vec<&str>) -> (ConversationEngine, Arc<RepoStateStore>) {
        let host = Arc::new(InMemoryHost::new());
        let store = Arc::new(RepoStateStore::new(host, "demo"));
        store.ensure_repository("vercel").await.unwrap();
        let engine = ConversationEngine::new(
            Arc::new(MockModel::new(replies)),
            store.clone(),
            Arc::new(FixedSearch("result: axum 0.7 docs".into())),
        );
        (engine, store)
    }

    #[tokio::test]
    async fn plain_reply_is_persisted_to_history() {
        let (engine, store) = engine_with(vec!["The project looks healthy."]).await;
        let reply = engine.chat_response("status?").await.unwrap();
        assert_eq!(reply, "The project looks healthy.");

        let memory = store.get_memory().await.unwrap();
        assert_eq!(memory.conversation_history.len(), 2);
        assert_eq!(memory.conversation_history[0].content, "status?");
        assert_eq!(memory.conversation_history[1].role, "assistant");
    }

    #[tokio::test]
    async fn tool_round_concatenates_both_replies() {
        let first = "Let me check.\n```tool_code\n{\"tool\": \"read_file\", \"args\": {\"path\": \"package.json\"}}\n```";
        let (engine, store) = engine_with(vec![first, "It lists react 18."]).await;
        store
            .save_file_content("package.json", r#"{"dependencies": {"react": "^18"}}"#, "seed")
            .await
            .unwrap();

        let reply = engine.chat_response("what deps do we have?").await.unwrap();
        assert!(reply.contains("Let me check."));
        assert!(reply.contains("It lists react 18."));
    }

    #[tokio::test]
    async fn history_stays_capped_after_many_turns() {
        let replies: Vec<String> = (0..30).map(|i| format!("reply {i}")).collect();
        let host = Arc::new(InMemoryHost::new());
        let store = Arc::new(RepoStateStore::new(host, "demo"));
        store.ensure_repository("vercel").await.unwrap();
        let engine = ConversationEngine::new(
            Arc::new(MockModel::new(replies)),
            store.clone(),
            Arc::new(FixedSearch(String::new())),
        );

        for i in 0..30 {
            engine.chat_response(&format!("message {i}")).await.unwrap();
        }
        let memory = store.get_memory().await.unwrap();
        assert_eq!(memory.conversation_history.len(), MAX_CONVERSATION_ENTRIES);
    }

    #[test]
    fn search_intent_heuristic() {
        assert!(wants_search("How to configure axum routing?"));
        assert!(wants_search("search for the latest react docs"));
        assert!(!wants_search("rename the login button"));
    }
}
