//! Prompt builder for rendering the answer template.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, CONTEXT_VAR, QUESTION_VAR};
use docqa_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Render `definition` with the question and the assembled reference material.
///
/// Values are inserted verbatim; braces inside the question or context are
/// not interpreted as template syntax.
///
/// # Example
/// ```no_run
/// use docqa_prompt::{build_answer_prompt, default_answer_prompt};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let built = build_answer_prompt(
///     &default_answer_prompt(),
///     "What do mitochondria do?",
///     "Mitochondria produce ATP.",
/// )?;
/// println!("{}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_answer_prompt(
    definition: &PromptDefinition,
    question: &str,
    context: &str,
) -> AppResult<BuiltPrompt> {
    tracing::debug!(
        "Building prompt '{}' ({} context chars)",
        definition.id,
        context.chars().count()
    );

    let mut variables = HashMap::new();
    variables.insert(QUESTION_VAR.to_string(), question.to_string());
    variables.insert(CONTEXT_VAR.to_string(), context.to_string());

    let user = render_template(&definition.template, &variables)?;

    Ok(BuiltPrompt {
        system: definition.system.clone(),
        user,
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            context_chars: context.chars().count(),
            resolved_variables: variables,
        },
    })
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
