//! Prompt system for Citewise.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions
//! - Built-in grounded and no-context answer prompts
//! - Workspace overrides under `.citewise/prompts/`
//! - Handlebars template rendering

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{
    builtin_prompt, list_prompts, load_prompt, resolve_prompt, GROUNDED_ANSWER_PROMPT,
    NO_CONTEXT_ANSWER_PROMPT,
};
pub use types::{
    BuiltPrompt, BuiltPromptMetadata, PromptBehavior, PromptDefinition, PromptOutputSpec,
};
