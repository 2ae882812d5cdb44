//! # docchat
//!
//! Conversational question answering over uploaded documents.
//!
//! Documents are split into overlapping chunks, embedded, and held in an
//! in-memory vector index. Each user turn is rewritten into a standalone
//! query using the session history, answered from the closest chunks, and
//! only then committed to the session transcript.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌─────────────┐
//! │  Ingest  │──▶│ Indexer  │──▶│ VectorIndex │
//! │ PDF/text │   │ (embed)  │   │  (swapped)  │
//! └──────────┘   └──────────┘   └──────┬──────┘
//!                                      │
//!          ┌──────────┐   ┌──────────┐ │ ┌────────────┐
//! utter ──▶│ Rewriter │──▶│Retriever │◀┘ │Synthesizer │──▶ answer
//!          └──────────┘   └────┬─────┘   └─────▲──────┘
//!                              └───────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`app`] | Process-level wiring of all components |
//! | [`config`] | TOML configuration parsing |
//! | [`conversation`] | One turn: rewrite, retrieve, synthesize, commit |
//! | [`embedding`] | Embedding providers |
//! | [`error`] | Stage-aware pipeline errors |
//! | [`extract`] | PDF and text extraction |
//! | [`indexer`] | Builds and swaps the vector index |
//! | [`ingest`] | Documents to chunks |
//! | [`llm`] | Chat-completion providers |
//! | [`progress`] | Upload progress on stderr |
//! | [`retriever`] | Top-k similarity search |
//! | [`rewrite`] | History-aware query rewriting |
//! | [`server`] | HTTP API |
//! | [`synthesize`] | Grounded answer generation |

pub mod app;
pub mod config;
pub mod conversation;
pub mod embedding;
pub mod error;
pub mod extract;
mod http;
pub mod indexer;
pub mod ingest;
pub mod llm;
pub mod progress;
pub mod retriever;
pub mod rewrite;
pub mod server;
pub mod synthesize;
