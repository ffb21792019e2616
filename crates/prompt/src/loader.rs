//! Loading the answer prompt.

use crate::types::{PromptDefinition, CONTEXT_VAR, QUESTION_VAR};
use docqa_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Identifier of the answer prompt; also its override file stem.
pub const ANSWER_PROMPT_ID: &str = "answer";

const DEFAULT_ANSWER_TEMPLATE: &str = "Answer the question using only the reference material below.\n\n{{context}}\n\nQuestion: {{question}}\nAnswer:";

/// The built-in answer prompt.
pub fn default_answer_prompt() -> PromptDefinition {
    PromptDefinition {
        id: ANSWER_PROMPT_ID.to_string(),
        title: "Answer from reference material".to_string(),
        api_version: "1.0".to_string(),
        system: None,
        template: DEFAULT_ANSWER_TEMPLATE.to_string(),
    }
}

/// Path of the workspace override for the answer prompt.
pub fn answer_prompt_path(docqa_dir: &Path) -> PathBuf {
    docqa_dir
        .join("prompts")
        .join(format!("{}.yml", ANSWER_PROMPT_ID))
}

/// Load `<docqa_dir>/prompts/answer.yml` if present, else the built-in prompt.
///
/// # Example
/// ```no_run
/// use docqa_prompt::load_answer_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_answer_prompt(Path::new(".docqa"))?;
/// println!("Using prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_answer_prompt(docqa_dir: &Path) -> AppResult<PromptDefinition> {
    let prompt_file = answer_prompt_path(docqa_dir);

    if !prompt_file.exists() {
        tracing::debug!("No prompt override at {:?}, using built-in", prompt_file);
        return Ok(default_answer_prompt());
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt override: {} ({:?})", definition.id, prompt_file);
    Ok(definition)
}

/// Validate a prompt definition.
pub fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    for var in [QUESTION_VAR, CONTEXT_VAR] {
        if !references_variable(&def.template, var) {
            return Err(AppError::Prompt(format!(
                "Prompt '{}' template must reference {{{{{}}}}}",
                def.id, var
            )));
        }
    }

    Ok(())
}

/// Whether `template` contains `{{var}}`, ignoring whitespace inside the braces.
fn references_variable(template: &str, var: &str) -> bool {
    let compact: String = template.chars().filter(|c| !c.is_whitespace()).collect();
    compact.contains(&format!("{{{{{}}}}}", var))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_override(docqa_dir: &Path, content: &str) {
        let path = answer_prompt_path(docqa_dir);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_default_when_no_override() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = load_answer_prompt(temp_dir.path()).unwrap();
        assert_eq!(prompt, default_answer_prompt());
        validate_prompt(&prompt).unwrap();
    }

    #[test]
    fn test_load_override() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            "id: answer\ntitle: Tutor\ntemplate: \"根据以下教学内容回答问题：\\n{{ context }}\\n\\n问题：{{question}}\\n答案：\"\n",
        );

        let prompt = load_answer_prompt(temp_dir.path()).unwrap();
        assert_eq!(prompt.title, "Tutor");
        assert!(prompt.template.starts_with("根据以下教学内容回答问题"));
    }

    #[test]
    fn test_override_missing_context_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_override(temp_dir.path(), "id: answer\ntemplate: \"Q: {{question}}\"\n");

        let err = load_answer_prompt(temp_dir.path()).unwrap_err();
        assert!(matches!(err, AppError::Prompt(_)));
        assert!(err.to_string().contains("{{context}}"));
    }

    #[test]
    fn test_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_override(temp_dir.path(), "invalid: yaml: content:");
        assert!(load_answer_prompt(temp_dir.path()).is_err());
    }
}
