use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::skills::SkillsAnalysis;

/// Which self-reported scale a score was produced on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    /// Résumé-to-job alignment, 1 to 10.
    Match,
    /// Generic applicant-tracking-system friendliness, 1 to 100.
    Ats,
}

impl ScoreKind {
    pub fn range(self) -> (u32, u32) {
        match self {
            ScoreKind::Match => (1, 10),
            ScoreKind::Ats => (1, 100),
        }
    }

    /// Threshold below which the pipeline runs an improvement cycle.
    pub fn threshold(self) -> u32 {
        match self {
            ScoreKind::Match => 8,
            ScoreKind::Ats => 80,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBadge {
    Good,
    Warning,
    Danger,
}

/// A score that is always inside its kind's declared range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Score {
    kind: ScoreKind,
    value: u32,
}

impl Score {
    /// Clamps any integer (including negatives from a sloppy model answer) into range.
    pub fn new(kind: ScoreKind, raw: i64) -> Self {
        let (min, max) = kind.range();
        let value = raw.clamp(min as i64, max as i64) as u32;
        Self { kind, value }
    }

    pub fn matching(raw: i64) -> Self {
        Self::new(ScoreKind::Match, raw)
    }

    pub fn ats(raw: i64) -> Self {
        Self::new(ScoreKind::Ats, raw)
    }

    pub fn kind(&self) -> ScoreKind {
        self.kind
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn below_threshold(&self) -> bool {
        self.value < self.kind.threshold()
    }

    pub fn badge(&self) -> ScoreBadge {
        let warning_floor = match self.kind {
            ScoreKind::Match => 6,
            ScoreKind::Ats => 60,
        };
        if !self.below_threshold() {
            ScoreBadge::Good
        } else if self.value >= warning_floor {
            ScoreBadge::Warning
        } else {
            ScoreBadge::Danger
        }
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.value, self.kind.range().1)
    }
}

/// A generated résumé and everything derived from it.
///
/// Created when a generation or optimization completes; mutated in place by
/// re-optimization, re-analysis, cover-letter and feedback calls.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeRecord {
    pub id: Uuid,
    pub latex_code: String,
    pub score: Score,
    pub feedback: String,
    pub optimized: bool,
    pub optimization_message: Option<String>,
    pub skills_analysis: Option<SkillsAnalysis>,
    pub cover_letter: Option<String>,
    pub company_name: Option<String>,
    pub job_description: Option<String>,
    /// Plain-text résumé the LaTeX was derived from; ATS improvements re-read it.
    pub source_content: Option<String>,
    /// Caller-supplied credential, reused for follow-up calls on this record.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResumeRecord {
    pub fn new(latex_code: String, score: Score, feedback: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            latex_code,
            score,
            feedback,
            optimized: false,
            optimization_message: None,
            skills_analysis: None,
            cover_letter: None,
            company_name: None,
            job_description: None,
            source_content: None,
            api_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Suggested download name, e.g. `resume_Acme.tex`.
    pub fn download_filename(&self) -> String {
        let company = self
            .company_name
            .as_deref()
            .map(sanitize_filename_part)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "generated".to_string());
        format!("resume_{company}.tex")
    }

    pub fn can_generate_cover_letter(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.company_name) && present(&self.job_description)
    }
}

fn sanitize_filename_part(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_score_clamps_high_and_low() {
        assert_eq!(Score::matching(13).value(), 10);
        assert_eq!(Score::matching(-4).value(), 1);
        assert_eq!(Score::matching(6).value(), 6);
    }

    #[test]
    fn test_ats_score_clamps_to_hundred() {
        assert_eq!(Score::ats(250).value(), 100);
        assert_eq!(Score::ats(0).value(), 1);
        assert_eq!(Score::ats(85).value(), 85);
    }

    #[test]
    fn test_threshold_per_kind() {
        assert!(Score::matching(7).below_threshold());
        assert!(!Score::matching(8).below_threshold());
        assert!(Score::ats(79).below_threshold());
        assert!(!Score::ats(80).below_threshold());
    }

    #[test]
    fn test_badges() {
        assert_eq!(Score::matching(9).badge(), ScoreBadge::Good);
        assert_eq!(Score::matching(6).badge(), ScoreBadge::Warning);
        assert_eq!(Score::matching(5).badge(), ScoreBadge::Danger);
        assert_eq!(Score::ats(80).badge(), ScoreBadge::Good);
        assert_eq!(Score::ats(65).badge(), ScoreBadge::Warning);
        assert_eq!(Score::ats(40).badge(), ScoreBadge::Danger);
    }

    #[test]
    fn test_score_display() {
        assert_eq!(Score::matching(6).to_string(), "6/10");
        assert_eq!(Score::ats(72).to_string(), "72/100");
    }

    #[test]
    fn test_download_filename() {
        let mut record = ResumeRecord::new("x".into(), Score::matching(8), String::new());
        assert_eq!(record.download_filename(), "resume_generated.tex");

        record.company_name = Some("Acme Corp/EU".into());
        assert_eq!(record.download_filename(), "resume_Acme_Corp_EU.tex");

        let mut base = ResumeRecord::new("x".into(), Score::ats(90), String::new());
        base.company_name = Some("base_resume".into());
        assert_eq!(base.download_filename(), "resume_base_resume.tex");
    }

    #[test]
    fn test_api_key_is_never_serialized() {
        let mut record = ResumeRecord::new("x".into(), Score::matching(8), String::new());
        record.api_key = Some("secret".into());
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("api_key").is_none());
        assert_eq!(json["score"]["value"], 8);
        assert_eq!(json["score"]["kind"], "match");
    }

    #[test]
    fn test_cover_letter_requires_company_and_job() {
        let mut record = ResumeRecord::new("x".into(), Score::matching(8), String::new());
        assert!(!record.can_generate_cover_letter());
        record.company_name = Some("Acme".into());
        record.job_description = Some("   ".into());
        assert!(!record.can_generate_cover_letter());
        record.job_description = Some("Rust engineer".into());
        assert!(record.can_generate_cover_letter());
    }
}
