//! Agents — turn a user query into an answer.
//!
//! Only the chat agent exists today; it owns prompt assembly and the
//! request/response cycle against the configured provider.

pub mod chat;
