//! Process-level wiring shared by the CLI and the HTTP server.
//!
//! [`ChatApp`] owns the session store, the indexer, and the conversation
//! pipeline built from a [`Config`]. Uploads accumulate: every upload
//! re-indexes the chunks of all documents uploaded so far, replacing the
//! previous index in one step.

use std::sync::Arc;

use docchat_core::models::Chunk;
use docchat_core::session::SessionStore;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::conversation::{Conversation, TurnOutcome};
use crate::embedding::{create_embedder, Embedder};
use crate::error::ChatError;
use crate::indexer::{IndexStats, Indexer};
use crate::ingest::{ingest_documents, DocumentSummary, IngestionFailure, UploadedDocument};
use crate::llm::{create_chat_model, ChatModel};
use crate::progress::{IngestProgressEvent, ProgressReporter};
use crate::retriever::Retriever;
use crate::rewrite::QueryRewriter;
use crate::synthesize::AnswerSynthesizer;

/// Outcome of an upload batch.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub documents: Vec<DocumentSummary>,
    pub errors: Vec<IngestionFailure>,
    pub index: IndexStats,
}

pub struct ChatApp {
    config: Config,
    indexer: Arc<Indexer>,
    conversation: Conversation,
    /// Chunks of every document uploaded so far. Also serializes uploads.
    uploaded: Mutex<Vec<Chunk>>,
}

impl ChatApp {
    /// Build the app with the providers named in `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;
        let embedder = create_embedder(&config.embedding)?;
        let llm = create_chat_model(&config.llm)?;
        Ok(Self::with_providers(config, embedder, llm))
    }

    /// Build the app around caller-supplied providers.
    pub fn with_providers(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn ChatModel>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new());
        let indexer = Arc::new(Indexer::new(embedder, config.embedding.batch_size));
        let conversation = Conversation::new(
            sessions,
            QueryRewriter::new(Arc::clone(&llm), config.prompts.contextualize_system.clone()),
            Retriever::new(Arc::clone(&indexer)),
            AnswerSynthesizer::new(llm, config.prompts.qa_system.clone(), config.answer.max_sentences),
            config.retrieval.k,
        );

        Self {
            config: config.clone(),
            indexer,
            conversation,
            uploaded: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        self.conversation.sessions()
    }

    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }

    /// Ingest `docs` and rebuild the index over everything uploaded so far.
    ///
    /// Per-document extraction failures are reported, not returned as
    /// errors. If the rebuild fails, the previous index and upload set are
    /// kept.
    pub async fn upload(
        &self,
        docs: &[UploadedDocument],
        progress: &dyn ProgressReporter,
    ) -> Result<UploadReport, ChatError> {
        let mut uploaded = self.uploaded.lock().await;

        let report = ingest_documents(docs, &self.config.chunking.params(), progress);
        if report.chunks.is_empty() {
            let current = self.indexer.snapshot();
            return Ok(UploadReport {
                documents: report.documents,
                errors: report.errors,
                index: IndexStats {
                    chunks: current.len(),
                    dims: current.dims(),
                    batches: 0,
                },
            });
        }

        let mut candidate = uploaded.clone();
        candidate.extend(report.chunks);
        progress.report(IngestProgressEvent::Indexing {
            chunks: candidate.len() as u64,
        });
        let index = self.indexer.rebuild(candidate.clone()).await?;
        *uploaded = candidate;

        Ok(UploadReport {
            documents: report.documents,
            errors: report.errors,
            index,
        })
    }

    /// Run one conversational turn.
    pub async fn converse(&self, session_id: &str, utterance: &str) -> Result<TurnOutcome, ChatError> {
        self.conversation.converse(session_id, utterance).await
    }
}
