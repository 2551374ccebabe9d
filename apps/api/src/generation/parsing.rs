//! Response Parser
//!
//! Grammar of the model answers this module understands:
//!
//! * Evaluation: a line starting with `SCORE:` followed by an integer, and
//!   free text after the first `FEEDBACK:` marker.
//! * ATS score: the first standalone run of digits anywhere in the answer.
//! * Skills: section headers `PROFESSION_TYPE:`, `SKILL_CATEGORIES:`,
//!   `CURRENT_SKILLS:`, `CURRENT_CERTIFICATIONS:`, `MISSING_SKILLS:`,
//!   `RECOMMENDED_SKILLS:`, `RECOMMENDED_CERTIFICATIONS:` (matched anywhere in
//!   a line), `Category:` lines opening a bucket inside the two skills
//!   sections, and `- item` bullets.
//! * LaTeX: optional ```` ```latex ```` / ```` ``` ```` fences around the document.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::models::{Score, SkillsAnalysis};

pub const DEFAULT_MATCH_SCORE: i64 = 7;
pub const DEFAULT_ATS_SCORE: i64 = 70;
pub const NO_FEEDBACK: &str = "No specific feedback available.";

const SCORE_MARKER: &str = "SCORE:";
const FEEDBACK_MARKER: &str = "FEEDBACK:";
const DOCUMENT_CLASS: &str = r"\documentclass";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub score: Score,
    pub feedback: String,
}

/// Parses a `SCORE:` / `FEEDBACK:` answer. Never fails: missing or garbled
/// pieces fall back to [`DEFAULT_MATCH_SCORE`] and [`NO_FEEDBACK`].
pub fn parse_evaluation(text: &str) -> Evaluation {
    let raw = text
        .lines()
        .find(|line| line.trim_start().starts_with(SCORE_MARKER))
        .and_then(|line| line.trim_start()[SCORE_MARKER.len()..].trim().parse::<i64>().ok())
        .unwrap_or(DEFAULT_MATCH_SCORE);

    let feedback = text
        .split_once(FEEDBACK_MARKER)
        .map(|(_, rest)| rest.trim().to_string())
        .unwrap_or_else(|| NO_FEEDBACK.to_string());

    Evaluation {
        score: Score::matching(raw),
        feedback,
    }
}

fn digits_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b(\d+)\b").expect("static regex is valid"))
}

/// First standalone integer in the answer, clamped to 1 to 100; 70 when absent.
pub fn parse_ats_score(text: &str) -> Score {
    let raw = digits_pattern()
        .captures(text)
        .and_then(|c| c[1].parse::<i64>().ok())
        .unwrap_or(DEFAULT_ATS_SCORE);
    Score::ats(raw)
}

// ───────────────────────────────────────────
// Skills answer state machine
// ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    ProfessionType,
    SkillCategories,
    CurrentSkills,
    CurrentCertifications,
    MissingSkills,
    RecommendedSkills,
    RecommendedCertifications,
}

/// Checked in order; the first marker contained in a line wins.
const SECTION_MARKERS: [(&str, Section); 7] = [
    ("PROFESSION_TYPE:", Section::ProfessionType),
    ("SKILL_CATEGORIES:", Section::SkillCategories),
    ("CURRENT_SKILLS:", Section::CurrentSkills),
    ("CURRENT_CERTIFICATIONS:", Section::CurrentCertifications),
    ("MISSING_SKILLS:", Section::MissingSkills),
    ("RECOMMENDED_SKILLS:", Section::RecommendedSkills),
    ("RECOMMENDED_CERTIFICATIONS:", Section::RecommendedCertifications),
];

impl Section {
    fn has_categories(self) -> bool {
        matches!(self, Section::CurrentSkills | Section::RecommendedSkills)
    }
}

#[derive(Debug, Default)]
struct SkillsParser {
    section: Option<Section>,
    category: Option<String>,
    analysis: SkillsAnalysis,
}

impl SkillsParser {
    fn feed(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        if let Some((marker, section)) = SECTION_MARKERS
            .iter()
            .find(|(marker, _)| line.contains(marker))
        {
            self.enter(*section, line, marker);
        } else if line.ends_with(':') && self.section.is_some_and(Section::has_categories) {
            self.open_category(&line[..line.len() - 1]);
        } else if let Some(item) = line.strip_prefix("- ") {
            self.push_item(item.trim());
        } else if self.section == Some(Section::ProfessionType)
            && self.analysis.profession_type.is_empty()
        {
            // Answers usually put the profession on the line after its header.
            self.analysis.profession_type = line.to_string();
        }
    }

    fn enter(&mut self, section: Section, line: &str, marker: &str) {
        self.section = Some(section);
        match section {
            Section::ProfessionType => {
                if let Some((_, rest)) = line.split_once(marker) {
                    self.analysis.profession_type = rest.trim().trim_matches('*').trim().to_string();
                }
            }
            Section::CurrentSkills | Section::RecommendedSkills => self.category = None,
            _ => {}
        }
    }

    fn open_category(&mut self, name: &str) {
        let buckets = match self.section {
            Some(Section::CurrentSkills) => &mut self.analysis.current_skills_by_category,
            Some(Section::RecommendedSkills) => &mut self.analysis.recommended_skills_by_category,
            _ => return,
        };
        // A repeated header restarts its bucket in place.
        buckets.insert(name.to_string(), Vec::new());
        self.category = Some(name.to_string());
    }

    fn push_item(&mut self, item: &str) {
        let item = item.to_string();
        let category = self.category.as_deref();
        let analysis = &mut self.analysis;
        match self.section {
            Some(Section::ProfessionType) => {
                if analysis.profession_type.is_empty() {
                    analysis.profession_type = item;
                }
            }
            Some(Section::SkillCategories) => analysis.skill_categories.push(item),
            Some(Section::CurrentSkills) => {
                push_to_bucket(&mut analysis.current_skills_by_category, category, &item);
                analysis.current_skills.push(item);
            }
            Some(Section::CurrentCertifications) => analysis.current_certifications.push(item),
            Some(Section::MissingSkills) => analysis.missing_skills.push(item),
            Some(Section::RecommendedSkills) => {
                push_to_bucket(&mut analysis.recommended_skills_by_category, category, &item);
                analysis.recommended_skills.push(item);
            }
            Some(Section::RecommendedCertifications) => {
                analysis.recommended_certifications.push(item)
            }
            None => {}
        }
    }
}

fn push_to_bucket(buckets: &mut IndexMap<String, Vec<String>>, category: Option<&str>, item: &str) {
    let Some(category) = category else {
        return;
    };
    if let Some(bucket) = buckets.get_mut(category) {
        bucket.push(item.to_string());
    }
}

/// Parses a skills answer. Unknown lines are ignored; missing sections stay empty.
/// `latex_skills_section` is left empty for the caller to fill.
pub fn parse_skills(text: &str) -> SkillsAnalysis {
    let mut parser = SkillsParser::default();
    for line in text.lines() {
        parser.feed(line);
    }
    parser.analysis
}

// ───────────────────────────────────────────
// LaTeX and identity helpers
// ───────────────────────────────────────────

/// Drops a leading ```` ```latex ```` or ```` ``` ```` fence and a trailing ```` ``` ````, then trims.
pub fn strip_code_fences(text: &str) -> String {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```latex") {
        body = rest;
    }
    if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim().to_string()
}

/// Fence-stripped answer, only if it is a full LaTeX document.
pub fn extract_latex_document(text: &str) -> Option<String> {
    let body = strip_code_fences(text);
    body.starts_with(DOCUMENT_CLASS).then_some(body)
}

pub const DEFAULT_CANDIDATE_NAME: &str = "Your Name";
pub const DEFAULT_CANDIDATE_EMAIL: &str = "your.email@example.com";

/// Name and email as typeset in the résumé header. Later matches win.
pub fn candidate_identity(latex: &str) -> (String, String) {
    const NAME_MARKER: &str = r"\textbf{\Huge \scshape ";
    const EMAIL_MARKER: &str = "href{mailto:";

    let mut name = DEFAULT_CANDIDATE_NAME.to_string();
    let mut email = DEFAULT_CANDIDATE_EMAIL.to_string();

    for line in latex.lines() {
        if let Some((_, rest)) = line.split_once(NAME_MARKER) {
            if let Some(found) = rest.split('}').next().filter(|n| !n.is_empty()) {
                name = found.to_string();
            }
        } else if let Some((_, rest)) = line.split_once(EMAIL_MARKER) {
            if let Some(found) = rest.split('}').next().filter(|e| !e.is_empty()) {
                email = found.to_string();
            }
        }
    }
    (name, email)
}

/// First non-empty line of the plain-text résumé.
pub fn first_line_name(resume_content: &str) -> String {
    resume_content
        .trim()
        .lines()
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_CANDIDATE_NAME)
        .to_string()
}

/// Deterministic stand-in for the formatter when no credential is available:
/// the template with the candidate's name, email and phone swapped in.
pub fn mock_format_resume(template: &str, resume_content: &str, job_description: &str) -> String {
    let lines: Vec<&str> = resume_content.trim().lines().collect();
    let name = lines.first().copied().unwrap_or(DEFAULT_CANDIDATE_NAME);

    let mut email = DEFAULT_CANDIDATE_EMAIL;
    let mut phone = "Your Phone";
    for line in lines.iter().take(5).copied() {
        let lower = line.to_lowercase();
        if lower.contains('@') && lower.contains('.') {
            email = line.split_whitespace().last().unwrap_or(email);
        } else if ["phone", "tel", "cell"].iter().any(|w| lower.contains(w)) {
            phone = match line.rsplit_once(':') {
                Some((_, number)) => number.trim(),
                None => line,
            };
        }
    }

    let mut latex = template
        .replace("Jake Ryan", name)
        .replace("jake@su.edu", email)
        .replace("123-456-7890", phone);

    if !job_description.is_empty() {
        let preview: String = job_description.chars().take(100).collect();
        let ellipsis = if job_description.chars().count() > 100 { "..." } else { "" };
        let tailored = format!("\\textit{{Tailored for: {preview}{ellipsis}}}\\\\");
        latex = latex.replace(
            r"\begin{document}",
            &format!("\\begin{{document}}\n{tailored}"),
        );
    }
    latex
}
