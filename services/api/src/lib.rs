//! services/api/src/lib.rs
//!
//! The document insight service: uploads are stored, their text extracted and
//! chunked into Postgres, and questions about a document are answered by an
//! external LLM from the document's own content.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
