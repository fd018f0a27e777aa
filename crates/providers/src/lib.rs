//! Backend provider implementations for careerchat.
//!
//! All providers implement the `careerchat_core::Provider` trait.
//! The router resolves the responder and evaluator backends from configuration.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{Backends, ProviderRouter, build_from_config};
