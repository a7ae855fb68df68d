//! LLM Extraction Client (C4) and the backend capability it is built on.
//!
//! Design note: model the backend as a capability — `complete(prompt,
//! max_tokens, temperature) -> text` — with hosted/local variants swapped by
//! configuration, rather than an inheritance hierarchy.

pub mod backend;
pub mod extraction;

pub use backend::{HostedBackend, LlmBackend, LocalBackend};
pub use extraction::extract;
pub(crate) use extraction::{repair_truncated_json, strip_code_fence};
