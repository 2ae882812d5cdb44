//! # docchat core
//!
//! Runtime-free logic for docchat: data models, the overlapping text
//! splitter, the in-memory vector index, and the session history store.
//!
//! This crate contains no tokio, HTTP, or filesystem I/O. Everything that
//! talks to an embedding model or a language model lives in the `docchat`
//! app crate and hands plain vectors and strings to the types here.

pub mod chunk;
pub mod embedding;
pub mod index;
pub mod models;
pub mod session;
