use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Structured skills-gap breakdown parsed from a model answer.
///
/// Category maps keep the order categories were first seen in the answer.
/// A re-analysis replaces the whole value; nothing is merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsAnalysis {
    pub profession_type: String,
    pub skill_categories: Vec<String>,
    pub current_skills: Vec<String>,
    pub current_skills_by_category: IndexMap<String, Vec<String>>,
    pub current_certifications: Vec<String>,
    pub missing_skills: Vec<String>,
    pub recommended_skills: Vec<String>,
    pub recommended_skills_by_category: IndexMap<String, Vec<String>>,
    pub recommended_certifications: Vec<String>,
    /// LaTeX fragment for a "skills & certifications" section.
    pub latex_skills_section: String,
}

impl SkillsAnalysis {
    /// Placeholder analysis carrying a single explanatory line.
    pub fn placeholder(message: impl Into<String>) -> Self {
        Self {
            current_skills: vec![message.into()],
            ..Self::default()
        }
    }
}
