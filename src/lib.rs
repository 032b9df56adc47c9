//! SMX — retrieval-augmented console assistant.
//!
//! Library surface for the binary and for integration tests.

pub mod config;
pub mod error;
pub mod llm;
pub mod logger;
pub mod subsystems;
