//! Prompt system for docqa.
//!
//! Provides the answer prompt used by `docqa ask`:
//! - a built-in default template
//! - an optional YAML override in `.docqa/prompts/answer.yml`
//! - Handlebars rendering of the question and retrieved context

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_answer_prompt;
pub use loader::{answer_prompt_path, default_answer_prompt, load_answer_prompt, validate_prompt};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
