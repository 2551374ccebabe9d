pub mod resume;
pub mod skills;

pub use resume::{ResumeRecord, Score, ScoreBadge, ScoreKind};
pub use skills::SkillsAnalysis;
