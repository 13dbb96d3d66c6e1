//! Request pipeline behind `POST /chat`.
//!
//! 1. Check the community scope (before any retrieval or generation)
//! 2. Extract the latest user message as the query
//! 3. Retrieve context from the current index snapshot
//! 4. Assemble the prompt with the live tool catalog
//! 5. Run the tool invocation loop
//! 6. Fingerprint query and answer, hand the record to the ledger

use curator_core::error::ProviderError;
use curator_core::message::ChatRequest;
use curator_core::provider::Generator;
use curator_core::session::SessionRecord;
use curator_core::tool::{ToolDescriptor, ToolProvider};
use curator_index::{DEFAULT_TOP_K, IndexHandle};
use curator_ledger::{LedgerDispatcher, fingerprint};
use curator_security::{RequestGate, ScopeMismatch};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::loop_runner::{LoopOutcome, ToolInvocationLoop};
use crate::prompt::PromptAssembler;

/// Why a chat request failed.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    Authorization(#[from] ScopeMismatch),

    #[error("{0}")]
    Validation(String),

    #[error("Generation failed: {0}")]
    Generation(#[from] ProviderError),
}

/// Body of a successful `/chat` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub answer: String,
    pub session_id: Uuid,
    pub query_hash: String,
    pub answer_hash: String,
}

/// A handled request: the response plus what the loop did to produce it.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub response: ChatResponse,
    pub outcome: LoopOutcome,
}

/// Answers chat requests against the shared index, generator and tools.
pub struct ChatService {
    gate: RequestGate,
    index: Arc<IndexHandle>,
    assembler: PromptAssembler,
    agent: ToolInvocationLoop,
    ledger: Arc<LedgerDispatcher>,
    top_k: usize,
}

impl ChatService {
    pub fn new(generator: Arc<dyn Generator>, index: Arc<IndexHandle>) -> Self {
        Self {
            gate: RequestGate::default(),
            index,
            assembler: PromptAssembler::default(),
            agent: ToolInvocationLoop::new(generator),
            ledger: Arc::new(LedgerDispatcher::disabled()),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_gate(mut self, gate: RequestGate) -> Self {
        self.gate = gate;
        self
    }

    /// Attach a tool provider; its catalog is offered on every request.
    pub fn with_tools(mut self, tools: Arc<dyn ToolProvider>) -> Self {
        self.agent = self.agent.with_tools(tools);
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<LedgerDispatcher>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.agent = self.agent.with_assembler(assembler.clone());
        self.assembler = assembler;
        self
    }

    /// Number of documents retrieved per query (at least 1).
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.agent = self.agent.with_generation_timeout(timeout);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.agent = self.agent.with_tool_timeout(timeout);
        self
    }

    pub fn index(&self) -> &Arc<IndexHandle> {
        &self.index
    }

    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    pub fn ledger(&self) -> &Arc<LedgerDispatcher> {
        &self.ledger
    }

    pub fn tools(&self) -> Option<&Arc<dyn ToolProvider>> {
        self.agent.tools()
    }

    /// Whether a tool provider is attached and its session is alive.
    pub fn tool_provider_connected(&self) -> bool {
        self.agent.connected_tools().is_some()
    }

    /// Answer a request.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        self.handle(request).await.map(|turn| turn.response)
    }

    /// Answer a request and report the loop's bookkeeping alongside.
    pub async fn handle(&self, request: &ChatRequest) -> Result<ChatTurn, ChatError> {
        self.gate.check(request.community_id.as_deref())?;

        let query = request
            .last_user_query()
            .ok_or_else(|| ChatError::Validation("No user message found".into()))?;
        if query.is_empty() {
            return Err(ChatError::Validation("User message is empty".into()));
        }

        let index = self.index.snapshot();
        let context = index.search(query, self.top_k).await;
        debug!(
            docs = index.len(),
            context_bytes = context.len(),
            "Retrieved context"
        );

        let tools = self.tool_catalog().await;
        let prompt = self.assembler.assemble(&context, &tools, &request.messages);
        let outcome = self.agent.run(&prompt).await?;

        let record = SessionRecord::new(fingerprint(query), fingerprint(&outcome.answer));
        let status = self.ledger.commit(&record, self.gate.configured_scope());

        info!(
            session_id = %record.session_id,
            query_hash = %record.query_hash,
            answer_hash = %record.answer_hash,
            generations = outcome.generations,
            tool_invocations = outcome.tool_invocations,
            ledger = ?status,
            "Chat answered"
        );

        Ok(ChatTurn {
            response: ChatResponse {
                answer: outcome.answer.clone(),
                session_id: record.session_id,
                query_hash: record.query_hash,
                answer_hash: record.answer_hash,
            },
            outcome,
        })
    }

    /// Tools offered to the model this turn; empty when none are reachable.
    async fn tool_catalog(&self) -> Vec<ToolDescriptor> {
        let Some(tools) = self.agent.connected_tools() else {
            return Vec::new();
        };
        match tools.list_tools().await {
            Ok(list) => list,
            Err(e) => {
                warn!(provider = %tools.name(), error = %e, "Tool listing failed; offering no tools");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{CountingEmbedder, ScriptedGenerator, ScriptedTools};
    use async_trait::async_trait;
    use curator_core::error::ToolError;
    use curator_core::message::ChatMessage;
    use curator_core::tool::ToolOutput;
    use curator_index::{Document, DocumentIndex};
    use curator_ledger::{CommitPayload, LedgerError, LedgerTransport, RetryPolicy};
    use std::path::PathBuf;
    use std::sync::Mutex;

    const REMOTE_WORK: &str = "Remote work policy: members may work remotely two days a week.";

    async fn index_of(texts: &[&str]) -> Arc<IndexHandle> {
        let embedder = Arc::new(CountingEmbedder);
        let docs = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Document::new(format!("doc{i}.md"), *t))
            .collect();
        let index = DocumentIndex::from_documents(embedder.clone(), docs)
            .await
            .unwrap();
        Arc::new(IndexHandle::new(index, embedder, PathBuf::from("unused")))
    }

    fn ask(query: &str) -> ChatRequest {
        ChatRequest::new(vec![ChatMessage::user(query)])
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<CommitPayload>>,
    }

    #[async_trait]
    impl LedgerTransport for RecordingTransport {
        async fn send(&self, payload: &CommitPayload) -> Result<(), LedgerError> {
            self.sent.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    fn recording_ledger() -> (Arc<RecordingTransport>, Arc<LedgerDispatcher>) {
        let transport = Arc::new(RecordingTransport::default());
        let ledger = LedgerDispatcher::spawn(
            transport.clone(),
            "curation.testnet",
            RetryPolicy::default(),
            16,
        );
        (transport, Arc::new(ledger))
    }

    #[tokio::test]
    async fn retrieved_document_is_inserted_verbatim() {
        let generator = ScriptedGenerator::new(["Two days a week."]);
        let service = ChatService::new(generator.clone(), index_of(&[REMOTE_WORK]).await);

        let response = service.chat(&ask("What is the remote work policy?")).await.unwrap();
        assert_eq!(response.answer, "Two days a week.");

        let prompt = &generator.prompts()[0];
        assert!(prompt.contains(&format!("<context>\n{REMOTE_WORK}\n</context>")));
        assert!(prompt.ends_with("<|user|>\nWhat is the remote work policy?<|end|>\n<|assistant|>\n"));
    }

    #[tokio::test]
    async fn fingerprints_cover_query_and_answer() {
        let generator = ScriptedGenerator::new(["  Two days a week.\n"]);
        let service = ChatService::new(generator, index_of(&[REMOTE_WORK]).await);

        let response = service.chat(&ask("policy?")).await.unwrap();
        assert_eq!(response.query_hash, fingerprint("policy?"));
        assert_eq!(response.answer_hash, fingerprint("Two days a week."));
        assert_eq!(response.query_hash.len(), 64);
    }

    #[tokio::test]
    async fn latest_user_message_is_the_query() {
        let generator = ScriptedGenerator::new(["ok"]);
        let service = ChatService::new(generator.clone(), index_of(&[]).await);
        let request = ChatRequest::new(vec![
            ChatMessage::user("first question"),
            ChatMessage::assistant("first answer"),
            ChatMessage::user("second question"),
        ]);

        let response = service.chat(&request).await.unwrap();
        assert_eq!(response.query_hash, fingerprint("second question"));
        // The whole history is still in the prompt.
        assert!(generator.prompts()[0].contains("<|assistant|>\nfirst answer<|end|>\n"));
    }

    #[tokio::test]
    async fn empty_index_gives_empty_context() {
        let generator = ScriptedGenerator::new(["I don't know."]);
        let service = ChatService::new(generator.clone(), index_of(&[]).await);

        service.chat(&ask("anything")).await.unwrap();
        assert!(generator.prompts()[0].contains("<context>\n\n</context>"));
    }

    #[tokio::test]
    async fn scope_mismatch_never_generates() {
        let generator = ScriptedGenerator::new(["unused"]);
        let service = ChatService::new(generator.clone(), index_of(&[REMOTE_WORK]).await)
            .with_gate(RequestGate::new("dao-1"));

        let err = service
            .chat(&ask("q").with_community("dao-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Authorization(_)));
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn matching_or_unscoped_requests_pass_the_gate() {
        let generator = ScriptedGenerator::new(["a", "b"]);
        let service = ChatService::new(generator.clone(), index_of(&[]).await)
            .with_gate(RequestGate::new("dao-1"));

        service.chat(&ask("q").with_community("dao-1")).await.unwrap();
        service.chat(&ask("q")).await.unwrap();
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn no_user_message_is_a_validation_error() {
        let generator = ScriptedGenerator::new(["unused"]);
        let service = ChatService::new(generator.clone(), index_of(&[]).await);

        let request = ChatRequest::new(vec![ChatMessage::system("rules")]);
        let err = service.chat(&request).await.unwrap_err();
        assert!(matches!(err, ChatError::Validation(ref m) if m == "No user message found"));
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn tool_catalog_and_round_trip() {
        let generator = ScriptedGenerator::new([
            r#"[TOOL:search|{"query":"weather"}]"#,
            "It is sunny.",
        ]);
        let tools = ScriptedTools::replying(ToolOutput::text("sunny"));
        let service =
            ChatService::new(generator.clone(), index_of(&[]).await).with_tools(tools.clone());

        let turn = service.handle(&ask("weather?")).await.unwrap();
        assert_eq!(turn.response.answer, "It is sunny.");
        assert_eq!(turn.outcome.generations, 2);
        assert_eq!(turn.outcome.tool_invocations, 1);

        let prompts = generator.prompts();
        assert!(prompts[0].contains("Available tools:\n- search: Search the web"));
        assert!(prompts[1].contains("<|tool|>\nsunny<|end|>\n<|assistant|>\n"));
        assert!(service.tool_provider_connected());
    }

    #[tokio::test]
    async fn token_without_provider_is_returned_raw() {
        let raw = r#"[TOOL:search|{"query":"weather"}]"#;
        let generator = ScriptedGenerator::new([raw]);
        let service = ChatService::new(generator.clone(), index_of(&[]).await);

        let turn = service.handle(&ask("weather?")).await.unwrap();
        assert_eq!(turn.response.answer, raw);
        assert_eq!(turn.outcome.tool_invocations, 0);
        assert!(!generator.prompts()[0].contains("Available tools"));
        assert!(!service.tool_provider_connected());
    }

    #[tokio::test]
    async fn tool_errors_do_not_fail_the_request() {
        let generator = ScriptedGenerator::new([r#"[TOOL:search|{"query":"x"}]"#, "Could not search."]);
        let tools = ScriptedTools::failing(ToolError::NotConnected("search server exited".into()));
        let service = ChatService::new(generator, index_of(&[]).await).with_tools(tools);

        let response = service.chat(&ask("x?")).await.unwrap();
        assert_eq!(response.answer, "Could not search.");
    }

    #[tokio::test(start_paused = true)]
    async fn generation_timeout_is_a_generation_error() {
        let generator = ScriptedGenerator::slow(["late"], Duration::from_secs(600));
        let service = ChatService::new(generator, index_of(&[]).await)
            .with_generation_timeout(Duration::from_secs(30));

        let err = service.chat(&ask("q")).await.unwrap_err();
        assert!(matches!(err, ChatError::Generation(ProviderError::Timeout(30))));
    }

    #[tokio::test]
    async fn ledger_disabled_by_default() {
        let generator = ScriptedGenerator::new(["a"]);
        let service = ChatService::new(generator, index_of(&[]).await);
        service.chat(&ask("q")).await.unwrap();
        assert!(!service.ledger().is_enabled());
    }

    #[tokio::test]
    async fn ledger_receives_fingerprints() {
        let (transport, ledger) = recording_ledger();
        let generator = ScriptedGenerator::new(["answer"]);
        let service = ChatService::new(generator, index_of(&[]).await)
            .with_gate(RequestGate::new("dao-1"))
            .with_ledger(ledger.clone());

        let response = service.chat(&ask("question")).await.unwrap();
        ledger.shutdown().await;

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].args.session_id, response.session_id.to_string());
        assert_eq!(sent[0].args.query_hash, fingerprint("question"));
        assert_eq!(sent[0].args.answer_hash, fingerprint("answer"));
        assert_eq!(sent[0].args.community_id.as_deref(), Some("dao-1"));
    }

    #[tokio::test]
    async fn unscoped_deployment_commits_null_community() {
        let (transport, ledger) = recording_ledger();
        let generator = ScriptedGenerator::new(["a", "b"]);
        let service =
            ChatService::new(generator, index_of(&[]).await).with_ledger(ledger.clone());

        // A community claimed by the caller is never recorded.
        service.chat(&ask("q").with_community("dao-7")).await.unwrap();
        service.chat(&ask("q")).await.unwrap();
        ledger.shutdown().await;

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].args.community_id, None);
        assert_eq!(sent[1].args.community_id, None);
    }

    #[tokio::test]
    async fn empty_user_message_is_rejected() {
        let generator = ScriptedGenerator::new(["unused"]);
        let service = ChatService::new(generator.clone(), index_of(&[]).await);

        let err = service.chat(&ask("")).await.unwrap_err();
        assert!(matches!(err, ChatError::Validation(ref m) if m == "User message is empty"));
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn whitespace_user_message_is_answered() {
        let generator = ScriptedGenerator::new(["Could you rephrase?"]);
        let service = ChatService::new(generator.clone(), index_of(&[]).await);

        let response = service.chat(&ask("   ")).await.unwrap();
        assert_eq!(response.answer, "Could you rephrase?");
        assert_eq!(response.query_hash, fingerprint("   "));
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn response_serializes_camel_case() {
        let generator = ScriptedGenerator::new(["a"]);
        let service = ChatService::new(generator, index_of(&[]).await);
        let response = service.chat(&ask("q")).await.unwrap();

        let json = serde_json::to_value(&response).unwrap();
        for key in ["answer", "sessionId", "queryHash", "answerHash"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
