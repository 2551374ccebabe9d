//! Optimization flows: the plain operations both front ends call.
//!
//! Tailoring flow: format → evaluate → analyze skills → (score < 8?) optimize →
//! re-evaluate → record. Base flow: generate → ATS score → (score < 80?)
//! improve → record.
//!
//! Every model call is sequential. A failed or unconfigured call never aborts a
//! flow: the step yields its documented fallback and reports a [`Degradation`]
//! that the caller can surface as a warning.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::generation::parsing::{
    candidate_identity, extract_latex_document, first_line_name, mock_format_resume,
    parse_ats_score, parse_evaluation, parse_skills, strip_code_fences, Evaluation,
    DEFAULT_MATCH_SCORE,
};
use crate::generation::prompts::{PromptBuilder, PromptContext};
use crate::llm_client::{GenerationRequest, LlmError, TextGenerator};
use crate::models::{ResumeRecord, Score, SkillsAnalysis};
use crate::templates::TemplateStore;

/// Passes the iterative optimizer runs unless told otherwise.
pub const DEFAULT_OPTIMIZE_ITERATIONS: usize = 2;
/// Upper bound on passes a caller may ask for.
pub const MAX_OPTIMIZE_ITERATIONS: usize = 5;

pub const MOCK_EVALUATION_FEEDBACK: &str = "Resume appears well-tailored to the job description.";
pub const NO_AI_MESSAGE: &str = "AI processing not available. Please set your API key in Settings.";
pub const AUTO_OPTIMIZED_MESSAGE: &str =
    "Optimization was performed automatically because the initial score was low.";
pub const REOPTIMIZED_MESSAGE: &str = "Re-optimization was performed by user request.";
pub const BASE_RESUME_COMPANY: &str = "base_resume";

const MOCK_MATCH_SCORE: i64 = 6;
const MOCK_ATS_SCORE: i64 = 1;
const FAILED_ATS_SCORE: i64 = 70;

// ────────────────────────────────────────────────────────────────────────────
// Degraded results
// ────────────────────────────────────────────────────────────────────────────

/// Why a step returned a fallback instead of model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    /// No credential anywhere; the service was never contacted.
    Mock,
    /// The call or its answer failed; carries the cause.
    Failed(String),
}

impl From<&LlmError> for Degradation {
    fn from(err: &LlmError) -> Self {
        match err {
            LlmError::NotConfigured => Degradation::Mock,
            other => Degradation::Failed(other.to_string()),
        }
    }
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::Mock => write!(f, "no API key configured, mock output used"),
            Degradation::Failed(reason) => write!(f, "generation failed ({reason}), fallback used"),
        }
    }
}

/// A step's value plus whether it is a fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub degraded: Option<Degradation>,
}

impl<T> Outcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            degraded: None,
        }
    }

    pub fn degraded(value: T, reason: Degradation) -> Self {
        Self {
            value,
            degraded: Some(reason),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            degraded: self.degraded,
        }
    }
}

/// Human-readable degradations collected across a multi-step flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Warnings(Vec<String>);

impl Warnings {
    /// Unwraps a step, recording its degradation under `step`.
    pub fn take<T>(&mut self, step: &str, outcome: Outcome<T>) -> T {
        if let Some(reason) = outcome.degraded {
            self.0.push(format!("{step}: {reason}"));
        }
        outcome.value
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// A finished flow: the record to store and what degraded along the way.
#[derive(Debug, Clone)]
pub struct FlowResult {
    pub record: ResumeRecord,
    pub warnings: Warnings,
}

// ────────────────────────────────────────────────────────────────────────────
// Flow inputs
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct TailorRequest {
    pub resume_content: String,
    pub job_description: String,
    pub company_name: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReoptimizeRequest {
    pub latex_code: String,
    pub job_description: String,
    pub feedback: String,
    pub api_key: Option<String>,
    /// Optimize passes; clamped to `1..=MAX_OPTIMIZE_ITERATIONS`.
    pub iterations: usize,
}

fn require(value: &str, message: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        Err(AppError::Validation(message.to_string()))
    } else {
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Prompt Builder + Generation Client + Response Parser behind plain operations.
#[derive(Clone)]
pub struct Pipeline {
    generator: Arc<dyn TextGenerator>,
    templates: Arc<TemplateStore>,
    model: String,
}

impl Pipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        templates: Arc<TemplateStore>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            templates,
            model: model.into(),
        }
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    fn prompts(&self) -> PromptBuilder<'_> {
        PromptBuilder::new(&self.templates)
    }

    async fn call(&self, step: &str, prompt: &str, api_key: Option<&str>) -> Result<String, LlmError> {
        let result = self
            .generator
            .generate(GenerationRequest {
                model: &self.model,
                prompt,
                api_key,
            })
            .await;

        match &result {
            Ok(_) => info!("{step}: model answer received"),
            Err(LlmError::NotConfigured) => warn!("{step}: no API key configured, using mock output"),
            Err(e) => error!("{step}: generation failed: {e}"),
        }
        result
    }

    // ── single operations ──────────────────────────────────────────────────

    /// Plain text → LaTeX. Fences are stripped; there is no document check here.
    pub async fn format_resume(&self, ctx: &PromptContext<'_>, api_key: Option<&str>) -> Outcome<String> {
        let prompt = self.prompts().format(ctx);
        match self.call("format", &prompt, api_key).await {
            Ok(text) => Outcome::ok(strip_code_fences(&text)),
            Err(LlmError::NotConfigured) => Outcome::degraded(
                mock_format_resume(
                    &self.templates.latex_template,
                    ctx.resume_content,
                    ctx.job_description,
                ),
                Degradation::Mock,
            ),
            Err(e) => Outcome::degraded(self.templates.latex_template.clone(), (&e).into()),
        }
    }

    pub async fn evaluate_match(
        &self,
        latex_code: &str,
        job_description: &str,
        api_key: Option<&str>,
    ) -> Outcome<Evaluation> {
        let ctx = PromptContext {
            latex_code,
            job_description,
            ..PromptContext::default()
        };
        let prompt = self.prompts().evaluate(&ctx);

        let outcome = match self.call("evaluate", &prompt, api_key).await {
            Ok(text) => Outcome::ok(parse_evaluation(&text)),
            Err(LlmError::NotConfigured) => Outcome::degraded(
                Evaluation {
                    score: Score::matching(MOCK_MATCH_SCORE),
                    feedback: MOCK_EVALUATION_FEEDBACK.to_string(),
                },
                Degradation::Mock,
            ),
            Err(e) => {
                let feedback = match &e {
                    LlmError::EmptyContent => "Unable to evaluate resume-job match.".to_string(),
                    other => format!("Unable to evaluate resume-job match due to an error: {other}"),
                };
                Outcome::degraded(
                    Evaluation {
                        score: Score::matching(DEFAULT_MATCH_SCORE),
                        feedback,
                    },
                    (&e).into(),
                )
            }
        };
        info!("Resume evaluation completed. Score: {}", outcome.value.score);
        outcome
    }

    /// One optimize pass. Any failure returns the input LaTeX unchanged.
    pub async fn optimize(&self, ctx: &PromptContext<'_>, api_key: Option<&str>) -> Outcome<String> {
        let prompt = self.prompts().optimize(ctx);
        match self.call("optimize", &prompt, api_key).await {
            Ok(text) => Outcome::ok(strip_code_fences(&text)),
            Err(e) => Outcome::degraded(ctx.latex_code.to_string(), (&e).into()),
        }
    }

    /// Up to `max_iterations` optimize passes, stopping as soon as a pass
    /// returns byte-identical LaTeX or degrades.
    pub async fn optimize_iteratively(
        &self,
        ctx: &PromptContext<'_>,
        max_iterations: usize,
        api_key: Option<&str>,
    ) -> Outcome<String> {
        let mut current = ctx.latex_code.to_string();

        for iteration in 1..=max_iterations {
            let pass_ctx = PromptContext {
                latex_code: &current,
                ..*ctx
            };
            let pass = self.optimize(&pass_ctx, api_key).await;

            if pass.is_degraded() {
                return Outcome {
                    value: current,
                    degraded: pass.degraded,
                };
            }
            if pass.value == current {
                info!("Optimization unchanged after pass {iteration}, stopping");
                break;
            }
            current = pass.value;
        }
        Outcome::ok(current)
    }

    /// Two calls: the analysis itself, then the LaTeX skills fragment.
    pub async fn analyze_skills(
        &self,
        latex_code: &str,
        job_description: &str,
        api_key: Option<&str>,
    ) -> Outcome<SkillsAnalysis> {
        let ctx = PromptContext {
            latex_code,
            job_description,
            ..PromptContext::default()
        };
        let prompt = self.prompts().analyze_skills(&ctx);

        let text = match self.call("analyze skills", &prompt, api_key).await {
            Ok(text) => text,
            Err(LlmError::NotConfigured) => {
                return Outcome::degraded(
                    SkillsAnalysis::placeholder("Unable to analyze skills without AI service"),
                    Degradation::Mock,
                )
            }
            Err(e) => {
                let message = match &e {
                    LlmError::EmptyContent => "Error: No response from AI".to_string(),
                    other => format!("Error analyzing skills: {other}"),
                };
                return Outcome::degraded(SkillsAnalysis::placeholder(message), (&e).into());
            }
        };

        let mut analysis = parse_skills(&text);
        let section = self.format_skills_section(&analysis, false, api_key).await;
        analysis.latex_skills_section = section.value;
        Outcome {
            value: analysis,
            degraded: section.degraded,
        }
    }

    /// LaTeX "skills & certifications" fragment from an analysis.
    pub async fn format_skills_section(
        &self,
        analysis: &SkillsAnalysis,
        mark_recommended: bool,
        api_key: Option<&str>,
    ) -> Outcome<String> {
        let prompt = self.prompts().format_skills(analysis, mark_recommended);
        match self.call("format skills", &prompt, api_key).await {
            Ok(text) => Outcome::ok(strip_code_fences(&text)),
            Err(LlmError::NotConfigured) => Outcome::degraded(String::new(), Degradation::Mock),
            Err(e) => Outcome::degraded(
                "Error generating LaTeX skills section".to_string(),
                (&e).into(),
            ),
        }
    }

    pub async fn generate_cover_letter(
        &self,
        latex_code: &str,
        company_name: &str,
        job_description: &str,
        api_key: Option<&str>,
    ) -> Outcome<String> {
        let (name, email) = candidate_identity(latex_code);
        let ctx = PromptContext {
            latex_code,
            company_name,
            job_description,
            ..PromptContext::default()
        };
        let prompt = self.prompts().cover_letter(&ctx, &name, &email);

        match self.call("cover letter", &prompt, api_key).await {
            Ok(text) => Outcome::ok(strip_code_fences(&text)),
            Err(LlmError::NotConfigured) => {
                Outcome::degraded(NO_AI_MESSAGE.to_string(), Degradation::Mock)
            }
            Err(e) => {
                let message = match &e {
                    LlmError::EmptyContent => {
                        "Error: Unable to generate cover letter. Please try again.".to_string()
                    }
                    other => format!("Error generating cover letter: {other}"),
                };
                Outcome::degraded(message, (&e).into())
            }
        }
    }

    pub async fn score_ats(
        &self,
        latex_code: &str,
        original_content: &str,
        job_description: &str,
        api_key: Option<&str>,
    ) -> Outcome<Score> {
        let ctx = PromptContext {
            resume_content: original_content,
            latex_code,
            job_description,
            ..PromptContext::default()
        };
        let prompt = self.prompts().score_ats(&ctx);

        match self.call("ats score", &prompt, api_key).await {
            Ok(text) => Outcome::ok(parse_ats_score(&text)),
            Err(LlmError::NotConfigured) => {
                Outcome::degraded(Score::ats(MOCK_ATS_SCORE), Degradation::Mock)
            }
            Err(e) => Outcome::degraded(Score::ats(FAILED_ATS_SCORE), (&e).into()),
        }
    }

    /// Job-agnostic ATS rewrite, scored. Falls back to the template scored 1
    /// when the answer is not a LaTeX document.
    pub async fn generate_base_resume(
        &self,
        resume_content: &str,
        api_key: Option<&str>,
    ) -> Outcome<(String, Score)> {
        let name = first_line_name(resume_content);
        let ctx = PromptContext {
            resume_content,
            ..PromptContext::default()
        };
        let prompt = self.prompts().generate_base(&ctx, &name);
        let fallback = || (self.templates.latex_template.clone(), Score::ats(MOCK_ATS_SCORE));

        let text = match self.call("base resume", &prompt, api_key).await {
            Ok(text) => text,
            Err(e) => return Outcome::degraded(fallback(), (&e).into()),
        };

        let Some(latex) = extract_latex_document(&text) else {
            warn!("Generated content doesn't start with \\documentclass, using template");
            return Outcome::degraded(
                fallback(),
                Degradation::Failed("answer was not a LaTeX document".to_string()),
            );
        };

        self.score_ats(&latex, resume_content, "", api_key)
            .await
            .map(|score| (latex, score))
    }

    /// One ATS improvement pass, rescored. Unchanged input on any failure.
    pub async fn improve_ats(
        &self,
        latex_code: &str,
        original_content: &str,
        current: Score,
        api_key: Option<&str>,
    ) -> Outcome<(String, Score)> {
        let ctx = PromptContext {
            resume_content: original_content,
            latex_code,
            ..PromptContext::default()
        };
        let prompt = self.prompts().improve_ats(&ctx, current);
        self.rewrite_and_rescore("ats improve", &prompt, &ctx, current, api_key)
            .await
    }

    /// One rewrite addressing free-text user feedback, rescored.
    pub async fn improve_with_feedback(
        &self,
        latex_code: &str,
        original_content: &str,
        feedback: &str,
        current: Score,
        api_key: Option<&str>,
    ) -> Outcome<(String, Score)> {
        let ctx = PromptContext {
            resume_content: original_content,
            latex_code,
            feedback,
            ..PromptContext::default()
        };
        let prompt = self.prompts().improve_with_feedback(&ctx, current);
        self.rewrite_and_rescore("feedback improve", &prompt, &ctx, current, api_key)
            .await
    }

    async fn rewrite_and_rescore(
        &self,
        step: &str,
        prompt: &str,
        ctx: &PromptContext<'_>,
        current: Score,
        api_key: Option<&str>,
    ) -> Outcome<(String, Score)> {
        let unchanged = || (ctx.latex_code.to_string(), current);

        let text = match self.call(step, prompt, api_key).await {
            Ok(text) => text,
            Err(e) => return Outcome::degraded(unchanged(), (&e).into()),
        };
        let Some(latex) = extract_latex_document(&text) else {
            return Outcome::degraded(
                unchanged(),
                Degradation::Failed("answer was not a LaTeX document".to_string()),
            );
        };

        let rescored = self
            .score_ats(&latex, ctx.resume_content, "", api_key)
            .await
            .map(|score| (latex, score));
        info!("{step}: ATS score {} -> {}", current, rescored.value.1);
        rescored
    }

    // ── flows ──────────────────────────────────────────────────────────────

    /// Full tailoring flow. At most one optimize + re-evaluate cycle.
    pub async fn tailor(&self, request: &TailorRequest) -> Result<FlowResult, AppError> {
        require(&request.resume_content, "No resume content provided")?;
        require(
            &request.job_description,
            "Job description is required for tailoring",
        )?;

        let api_key = request.api_key.as_deref().filter(|k| !k.trim().is_empty());
        let mut warnings = Warnings::default();
        let ctx = PromptContext {
            resume_content: &request.resume_content,
            job_description: &request.job_description,
            company_name: request.company_name.as_deref().unwrap_or_default(),
            ..PromptContext::default()
        };

        // Step 1: Format
        info!("Starting resume processing");
        let mut latex_code = warnings.take("format", self.format_resume(&ctx, api_key).await);

        // Step 2: Evaluate
        let mut evaluation = warnings.take(
            "evaluate",
            self.evaluate_match(&latex_code, &request.job_description, api_key)
                .await,
        );

        // Step 3: Skills
        let skills = warnings.take(
            "analyze skills",
            self.analyze_skills(&latex_code, &request.job_description, api_key)
                .await,
        );

        // Step 4: One optimize + re-evaluate cycle when below threshold
        let optimized = evaluation.score.below_threshold();
        if optimized {
            info!(
                "Initial score {} is below threshold. Reprocessing resume...",
                evaluation.score
            );
            let optimize_ctx = PromptContext {
                latex_code: &latex_code,
                feedback: &evaluation.feedback,
                ..ctx
            };
            let next = warnings.take("optimize", self.optimize(&optimize_ctx, api_key).await);
            latex_code = next;
            evaluation = warnings.take(
                "re-evaluate",
                self.evaluate_match(&latex_code, &request.job_description, api_key)
                    .await,
            );
            info!("Optimized resume score: {}", evaluation.score);
        }

        let mut record = ResumeRecord::new(latex_code, evaluation.score, evaluation.feedback);
        record.optimized = optimized;
        record.optimization_message = optimized.then(|| AUTO_OPTIMIZED_MESSAGE.to_string());
        record.skills_analysis = Some(skills);
        record.company_name = non_empty(request.company_name.clone());
        record.job_description = Some(request.job_description.clone());
        record.source_content = Some(request.resume_content.clone());
        record.api_key = api_key.map(String::from);

        Ok(FlowResult { record, warnings })
    }

    /// Iterative optimize + re-evaluate on demand. The result is a new record.
    pub async fn reoptimize(&self, request: &ReoptimizeRequest) -> Result<FlowResult, AppError> {
        require(&request.latex_code, "Missing required fields.")?;
        require(&request.job_description, "Missing required fields.")?;

        let api_key = request.api_key.as_deref().filter(|k| !k.trim().is_empty());
        let mut warnings = Warnings::default();
        let ctx = PromptContext {
            latex_code: &request.latex_code,
            job_description: &request.job_description,
            feedback: &request.feedback,
            ..PromptContext::default()
        };

        let iterations = request.iterations.clamp(1, MAX_OPTIMIZE_ITERATIONS);
        let latex_code = warnings.take(
            "optimize",
            self.optimize_iteratively(&ctx, iterations, api_key).await,
        );
        let evaluation = warnings.take(
            "re-evaluate",
            self.evaluate_match(&latex_code, &request.job_description, api_key)
                .await,
        );

        let mut record = ResumeRecord::new(latex_code, evaluation.score, evaluation.feedback);
        record.optimized = true;
        record.optimization_message = Some(REOPTIMIZED_MESSAGE.to_string());
        record.job_description = Some(request.job_description.clone());
        record.api_key = api_key.map(String::from);

        Ok(FlowResult { record, warnings })
    }

    /// ATS base-resume flow: generate, score, at most one improvement pass.
    pub async fn base_resume(
        &self,
        resume_content: &str,
        api_key: Option<&str>,
    ) -> Result<FlowResult, AppError> {
        require(resume_content, "No resume content provided")?;

        let api_key = api_key.filter(|k| !k.trim().is_empty());
        let mut warnings = Warnings::default();

        info!("Generating base resume");
        let (mut latex_code, mut score) = warnings.take(
            "base resume",
            self.generate_base_resume(resume_content, api_key).await,
        );

        if score.below_threshold() {
            info!("Initial ATS score {score} is below threshold. Improving resume...");
            (latex_code, score) = warnings.take(
                "ats improve",
                self.improve_ats(&latex_code, resume_content, score, api_key)
                    .await,
            );
        }

        let mut record = ResumeRecord::new(
            latex_code,
            score,
            format!("Base resume generated with ATS score: {score}"),
        );
        record.optimized = !score.below_threshold();
        record.optimization_message = Some(format!(
            "Base resume optimized for ATS systems. Final ATS score: {score}"
        ));
        record.company_name = Some(BASE_RESUME_COMPANY.to_string());
        record.source_content = Some(resume_content.to_string());
        record.api_key = api_key.map(String::from);

        Ok(FlowResult { record, warnings })
    }

    /// Rewrites a base résumé from user feedback. The caller stores the result
    /// over the old record whatever the new score is.
    pub async fn apply_feedback(
        &self,
        record: &ResumeRecord,
        feedback: &str,
    ) -> Result<FlowResult, AppError> {
        require(feedback, "Please provide feedback first.")?;

        let api_key = record.api_key.as_deref();
        let mut warnings = Warnings::default();
        let previous = record.score;

        let (latex_code, score) = warnings.take(
            "feedback improve",
            self.improve_with_feedback(
                &record.latex_code,
                record.source_content.as_deref().unwrap_or_default(),
                feedback,
                previous,
                api_key,
            )
            .await,
        );

        let mut updated = record.clone();
        updated.latex_code = latex_code;
        updated.score = score;
        updated.feedback =
            format!("Resume regenerated based on user feedback. New ATS score: {score}");
        updated.optimization_message = Some(format!(
            "Resume improved based on your feedback. ATS score changed from {} to {score}",
            previous.value()
        ));
        updated.optimized = !score.below_threshold();
        updated.touch();

        Ok(FlowResult {
            record: updated,
            warnings,
        })
    }
}
