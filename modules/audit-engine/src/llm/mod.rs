//! LLM client (C4): rate-limited, retrying access to a generative text
//! model, with every call captured as a `GeminiInteraction` for the audit
//! record.

pub mod client;
pub mod rate_limiter;

pub use client::{GeminiClient, LlmClient, LlmResponse};
