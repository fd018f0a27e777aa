//! # careerchat core
//!
//! Domain types, traits, and error definitions for the careerchat
//! quality-gated responder. This crate defines the model that every other
//! crate implements against:
//!
//! - the immutable [`ProfessionalContext`] and the store that loads it once
//! - conversation turns and the backend [`Provider`] trait
//! - the closed set of tools ([`ToolKind`]) with their schemas
//! - drafts, verdicts and the reply handed back to the chat surface
//!
//! Implementations live in their respective crates and depend inward on core.

pub mod draft;
pub mod error;
pub mod event;
pub mod message;
pub mod profile;
pub mod prompt;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use draft::{Draft, DraftKind, Outcome, TurnReply, Verdict};
pub use error::{ContextLoadError, Error, EvaluatorError, ProviderError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{ConversationTurn, Role, SessionId, TurnToolCall};
pub use profile::{ContextSources, ContextStore, ProfessionalContext};
pub use prompt::{Persona, PromptTemplates, TemplateId};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ResponseSchema, ToolDefinition};
pub use tool::{ToolCall, ToolKind, ToolResult};
