//! Two-phase session: build an index from documents, then answer questions against it.
//!
//! The phases share no in-memory state. Everything a query needs is read back from the
//! persisted artifact, so a fresh session can answer questions about an index built earlier.

use std::sync::Arc;

use dqa_core::chunk::chunk_text;
use dqa_core::config::PipelineConfig;
use dqa_core::error::AppError;
use dqa_core::extract::{extract_text, Document};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::answer::{answer_question, Answer};
use crate::embeddings::Embedder;
use crate::index::{build_index, index_status, IndexBuildInput, IndexStatus};
use crate::llm::Generator;
use crate::providers::{embedder_from_config, generator_from_config};
use crate::retrieve::{retrieve, QueryResult, RetrieveInput};
use crate::retry::RetryPolicy;
use crate::store::{FsVectorStore, VectorStore};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Extracting,
    Chunking,
    Indexing,
    Retrieving,
    Answering,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Phase { phase: Phase },
    IndexReady { status: IndexStatus },
    Answered { answer: Answer },
    Failed { error: AppError },
}

/// Rendering collaborator. The session reports progress; the surface decides how to show it.
pub trait StatusSink {
    fn on_event(&mut self, event: &SessionEvent);
}

/// Sink that only logs.
#[derive(Debug, Default)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn on_event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Phase { phase } => info!(?phase, "session phase"),
            SessionEvent::IndexReady { status } => info!(chunks = status.chunk_count, "index ready"),
            SessionEvent::Answered { answer } => info!(chars = answer.text.len(), "answer ready"),
            SessionEvent::Failed { error } => error!(code = %error.code, err = %error.describe(), "session step failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskOutcome {
    pub answer: Answer,
    pub context: QueryResult,
}

pub struct Session {
    config: PipelineConfig,
    embedder: Box<dyn Embedder>,
    generator: Box<dyn Generator>,
    store: Arc<dyn VectorStore>,
    sink: Box<dyn StatusSink>,
    retry: RetryPolicy,
    phase: Phase,
}

impl Session {
    pub fn new(
        config: PipelineConfig,
        embedder: Box<dyn Embedder>,
        generator: Box<dyn Generator>,
        store: Arc<dyn VectorStore>,
        sink: Box<dyn StatusSink>,
    ) -> Result<Self, AppError> {
        config.chunking.validate()?;
        dqa_core::config::validate_artifact_name(&config.storage.artifact)?;
        let retry = RetryPolicy::from(config.retry);
        Ok(Self {
            config,
            embedder,
            generator,
            store,
            sink,
            retry,
            phase: Phase::Idle,
        })
    }

    /// Wire the configured providers and a filesystem store rooted at `storage.root`.
    pub fn from_config(config: PipelineConfig, sink: Box<dyn StatusSink>) -> Result<Self, AppError> {
        config.validate()?;
        let embedder = embedder_from_config(&config)?;
        let generator = generator_from_config(&config)?;
        let store = FsVectorStore::open(config.storage.root.clone()).with_io_retry(config.retry.into());
        Self::new(config, embedder, generator, Arc::new(store), sink)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.sink.on_event(&SessionEvent::Phase { phase });
    }

    fn finish<T>(&mut self, res: Result<T, AppError>) -> Result<T, AppError> {
        if let Err(e) = &res {
            self.sink.on_event(&SessionEvent::Failed { error: e.clone() });
        }
        self.enter(Phase::Idle);
        res
    }

    /// Extract, chunk, embed and persist. A failure at any step leaves the previous artifact live.
    pub fn build(&mut self, docs: &[Document]) -> Result<IndexStatus, AppError> {
        let res = self.run_build(docs);
        if let Ok(status) = &res {
            self.sink.on_event(&SessionEvent::IndexReady { status: status.clone() });
        }
        self.finish(res)
    }

    fn run_build(&mut self, docs: &[Document]) -> Result<IndexStatus, AppError> {
        self.enter(Phase::Extracting);
        let text = extract_text(docs, &self.config.limits)?;

        self.enter(Phase::Chunking);
        let chunks = chunk_text(&text, &self.config.chunking)?;

        self.enter(Phase::Indexing);
        let input = IndexBuildInput {
            artifact: self.config.storage.artifact.clone(),
            model: self.config.embedding.model.clone(),
            chunking: self.config.chunking,
        };
        build_index(chunks, self.embedder.as_ref(), self.store.as_ref(), &self.retry, &input)
    }

    /// Retrieve the top-K chunks for `question` and answer from them.
    pub fn ask(&mut self, question: &str) -> Result<AskOutcome, AppError> {
        let res = self.run_ask(question);
        if let Ok(outcome) = &res {
            self.sink.on_event(&SessionEvent::Answered {
                answer: outcome.answer.clone(),
            });
        }
        self.finish(res)
    }

    fn run_ask(&mut self, question: &str) -> Result<AskOutcome, AppError> {
        // No index: straight back to idle with the error, no phase transitions.
        self.store.manifest(&self.config.storage.artifact)?;

        self.enter(Phase::Retrieving);
        let input = RetrieveInput {
            artifact: self.config.storage.artifact.clone(),
            model: self.config.embedding.model.clone(),
            query: question.to_string(),
            top_k: self.config.retrieval.top_k,
        };
        let context = retrieve(self.store.as_ref(), self.embedder.as_ref(), &self.retry, &input)?;

        self.enter(Phase::Answering);
        let answer = answer_question(
            self.generator.as_ref(),
            &self.config.generation.model,
            self.config.generation.temperature,
            &context.hits,
            question,
        )?;
        Ok(AskOutcome { answer, context })
    }

    pub fn status(&self) -> Result<IndexStatus, AppError> {
        index_status(self.store.as_ref(), &self.config.storage.artifact)
    }
}
