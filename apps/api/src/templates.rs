//! Fixed text assets, loaded once at startup and read-only after.
//!
//! Every asset is embedded in the binary. A `TEMPLATE_DIR` may override any of
//! them by file name; a missing or unreadable override falls back to the
//! embedded copy with a warning, so startup never fails on assets.

use std::path::Path;

use tracing::{info, warn};

const LATEX_TEMPLATE_FILE: &str = "latex_template.tex";
const FORMATTER_PROMPT_FILE: &str = "prompts/resume_formatter.txt";
const EVALUATOR_PROMPT_FILE: &str = "prompts/resume_evaluator.txt";
const OPTIMIZER_PROMPT_FILE: &str = "prompts/resume_optimizer.txt";
const COVER_LETTER_PROMPT_FILE: &str = "prompts/cover_letter_generator.txt";

const EMBEDDED_LATEX_TEMPLATE: &str = include_str!("../assets/latex_template.tex");
const EMBEDDED_FORMATTER_PROMPT: &str = include_str!("../assets/prompts/resume_formatter.txt");
const EMBEDDED_EVALUATOR_PROMPT: &str = include_str!("../assets/prompts/resume_evaluator.txt");
const EMBEDDED_OPTIMIZER_PROMPT: &str = include_str!("../assets/prompts/resume_optimizer.txt");
const EMBEDDED_COVER_LETTER_PROMPT: &str =
    include_str!("../assets/prompts/cover_letter_generator.txt");

#[derive(Debug, Clone)]
pub struct TemplateStore {
    /// LaTeX résumé skeleton; also the fallback document for failed generations.
    pub latex_template: String,
    pub formatter_prompt: String,
    pub evaluator_prompt: String,
    pub optimizer_prompt: String,
    pub cover_letter_prompt: String,
}

impl TemplateStore {
    pub fn embedded() -> Self {
        Self {
            latex_template: EMBEDDED_LATEX_TEMPLATE.to_string(),
            formatter_prompt: EMBEDDED_FORMATTER_PROMPT.to_string(),
            evaluator_prompt: EMBEDDED_EVALUATOR_PROMPT.to_string(),
            optimizer_prompt: EMBEDDED_OPTIMIZER_PROMPT.to_string(),
            cover_letter_prompt: EMBEDDED_COVER_LETTER_PROMPT.to_string(),
        }
    }

    /// Loads assets from `dir`, falling back per file to the embedded copies.
    pub fn load(dir: Option<&Path>) -> Self {
        let Some(dir) = dir else {
            info!("Using embedded templates");
            return Self::embedded();
        };

        info!("Loading templates from {}", dir.display());
        Self {
            latex_template: load_or_embedded(dir, LATEX_TEMPLATE_FILE, EMBEDDED_LATEX_TEMPLATE),
            formatter_prompt: load_or_embedded(
                dir,
                FORMATTER_PROMPT_FILE,
                EMBEDDED_FORMATTER_PROMPT,
            ),
            evaluator_prompt: load_or_embedded(
                dir,
                EVALUATOR_PROMPT_FILE,
                EMBEDDED_EVALUATOR_PROMPT,
            ),
            optimizer_prompt: load_or_embedded(
                dir,
                OPTIMIZER_PROMPT_FILE,
                EMBEDDED_OPTIMIZER_PROMPT,
            ),
            cover_letter_prompt: load_or_embedded(
                dir,
                COVER_LETTER_PROMPT_FILE,
                EMBEDDED_COVER_LETTER_PROMPT,
            ),
        }
    }
}

fn load_or_embedded(dir: &Path, file: &str, embedded: &str) -> String {
    let path = dir.join(file);
    match std::fs::read_to_string(&path) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            warn!("Template {} is empty, using embedded copy", path.display());
            embedded.to_string()
        }
        Err(e) => {
            warn!(
                "Error loading template {}: {e}; using embedded copy",
                path.display()
            );
            embedded.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_template_is_a_latex_document() {
        let store = TemplateStore::embedded();
        assert!(store.latex_template.starts_with("\\documentclass"));
        assert!(store.latex_template.contains("\\begin{document}"));
        assert!(store.latex_template.contains("Jake Ryan"));
        assert!(store.evaluator_prompt.contains("SCORE:"));
        assert!(store.evaluator_prompt.contains("FEEDBACK:"));
    }

    #[test]
    fn test_directory_overrides_only_present_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("prompts")).unwrap();
        std::fs::write(
            dir.path().join("prompts/resume_optimizer.txt"),
            "custom optimizer",
        )
        .unwrap();

        let store = TemplateStore::load(Some(dir.path()));
        assert_eq!(store.optimizer_prompt, "custom optimizer");
        assert_eq!(store.latex_template, EMBEDDED_LATEX_TEMPLATE);
        assert_eq!(store.formatter_prompt, EMBEDDED_FORMATTER_PROMPT);
    }

    #[test]
    fn test_empty_override_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LATEX_TEMPLATE_FILE), "   \n").unwrap();

        let store = TemplateStore::load(Some(dir.path()));
        assert_eq!(store.latex_template, EMBEDDED_LATEX_TEMPLATE);
    }
}
