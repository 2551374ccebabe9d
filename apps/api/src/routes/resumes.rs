use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::pipeline::{ReoptimizeRequest, TailorRequest, REOPTIMIZED_MESSAGE};
use crate::generation::{Outcome, Warnings};
use crate::models::{ResumeRecord, Score, ScoreBadge, SkillsAnalysis};
use crate::routes::auth::SessionToken;
use crate::state::AppState;

const LATEX_MEDIA_TYPE: &str = "application/x-tex";

/// Record as returned to clients. The caller's API key is never echoed.
#[derive(Debug, Serialize)]
pub struct ResumeResponse {
    pub resume_id: Uuid,
    pub latex_code: String,
    pub score: Score,
    pub badge: ScoreBadge,
    pub feedback: String,
    pub optimized: bool,
    pub optimization_message: Option<String>,
    pub skills_analysis: Option<SkillsAnalysis>,
    pub cover_letter: Option<String>,
    pub company_name: Option<String>,
    pub download_filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub warnings: Warnings,
}

impl ResumeResponse {
    pub fn new(record: ResumeRecord, warnings: Warnings, message: Option<&'static str>) -> Self {
        Self {
            resume_id: record.id,
            badge: record.score.badge(),
            download_filename: record.download_filename(),
            latex_code: record.latex_code,
            score: record.score,
            feedback: record.feedback,
            optimized: record.optimized,
            optimization_message: record.optimization_message,
            skills_analysis: record.skills_analysis,
            cover_letter: record.cover_letter,
            company_name: record.company_name,
            message,
            warnings,
        }
    }
}

/// Non-empty body key wins over the one stored with the record.
pub(crate) fn pick_api_key(body: Option<String>, stored: Option<String>) -> Option<String> {
    body.filter(|k| !k.trim().is_empty()).or(stored)
}

pub(crate) async fn find_record(state: &AppState, id: Uuid) -> Result<ResumeRecord, AppError> {
    state
        .results
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound("Resume not found".to_string()))
}

/// Request content, else the session's saved main résumé.
pub(crate) async fn resume_content_or_main(
    state: &AppState,
    token: &SessionToken,
    provided: Option<String>,
) -> String {
    match provided.filter(|c| !c.trim().is_empty()) {
        Some(content) => content,
        None => state
            .sessions
            .get(&token.0)
            .await
            .and_then(|s| s.main_resume)
            .unwrap_or_default(),
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub resume_content: Option<String>,
    #[serde(default)]
    pub job_description: String,
    pub company_name: Option<String>,
    pub api_key: Option<String>,
}

/// POST /api/v1/resumes/generate
pub async fn handle_generate(
    State(state): State<AppState>,
    Extension(token): Extension<SessionToken>,
    Json(req): Json<GenerateBody>,
) -> Result<Json<ResumeResponse>, AppError> {
    let request = TailorRequest {
        resume_content: resume_content_or_main(&state, &token, req.resume_content).await,
        job_description: req.job_description,
        company_name: req.company_name,
        api_key: req.api_key,
    };

    let flow = state.pipeline.tailor(&request).await?;
    let id = state.results.put(flow.record.clone()).await;
    state
        .sessions
        .upsert(&token.0, |s| s.current_resume_id = Some(id))
        .await;
    info!("Stored tailored resume {id} ({})", flow.record.score);

    Ok(Json(ResumeResponse::new(
        flow.record,
        flow.warnings,
        Some("Resume generated successfully"),
    )))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeResponse>, AppError> {
    let record = find_record(&state, id).await?;
    Ok(Json(ResumeResponse::new(record, Warnings::default(), None)))
}

/// GET /api/v1/resumes/:id/download
pub async fn handle_download(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let record = find_record(&state, id).await?;
    if record.latex_code.is_empty() {
        return Err(AppError::NotFound("LaTeX code not found".to_string()));
    }

    let disposition = format!("attachment; filename=\"{}\"", record.download_filename());
    Ok((
        [
            (header::CONTENT_TYPE, LATEX_MEDIA_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        record.latex_code,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct ReoptimizeBody {
    #[serde(default)]
    pub latex_code: String,
    #[serde(default)]
    pub job_description: String,
    #[serde(default)]
    pub feedback: String,
    pub company_name: Option<String>,
    pub api_key: Option<String>,
    /// Optimize passes, one unless asked otherwise.
    pub iterations: Option<usize>,
}

/// POST /api/v1/resumes/reoptimize
/// Optimizes supplied LaTeX and stores the result under a new id.
pub async fn handle_reoptimize(
    State(state): State<AppState>,
    Extension(token): Extension<SessionToken>,
    Json(req): Json<ReoptimizeBody>,
) -> Result<Json<ResumeResponse>, AppError> {
    let request = ReoptimizeRequest {
        latex_code: req.latex_code,
        job_description: req.job_description,
        feedback: req.feedback,
        api_key: req.api_key,
        iterations: req.iterations.unwrap_or(1),
    };

    let mut flow = state.pipeline.reoptimize(&request).await?;
    flow.record.company_name = req.company_name.filter(|c| !c.trim().is_empty());
    let id = state.results.put(flow.record.clone()).await;
    state
        .sessions
        .upsert(&token.0, |s| s.current_resume_id = Some(id))
        .await;

    Ok(Json(ResumeResponse::new(
        flow.record,
        flow.warnings,
        Some("Resume re-optimized successfully"),
    )))
}

#[derive(Debug, Default, Deserialize)]
pub struct StoredReoptimizeBody {
    /// Defaults to the record's latest evaluation feedback.
    pub feedback: Option<String>,
    pub api_key: Option<String>,
    pub iterations: Option<usize>,
}

/// POST /api/v1/resumes/:id/reoptimize
/// Optimizes a stored record and updates it in place.
pub async fn handle_reoptimize_stored(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<StoredReoptimizeBody>>,
) -> Result<Json<ResumeResponse>, AppError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let record = find_record(&state, id).await?;

    let request = ReoptimizeRequest {
        job_description: record.job_description.clone().unwrap_or_default(),
        feedback: req
            .feedback
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| record.feedback.clone()),
        api_key: pick_api_key(req.api_key, record.api_key.clone()),
        latex_code: record.latex_code,
        iterations: req.iterations.unwrap_or(1),
    };
    let flow = state.pipeline.reoptimize(&request).await?;

    let fresh = flow.record;
    let updated = state
        .results
        .update(
            id,
            Box::new(move |r: &mut ResumeRecord| {
                r.latex_code = fresh.latex_code;
                r.score = fresh.score;
                r.feedback = fresh.feedback;
                r.optimized = true;
                r.optimization_message = Some(REOPTIMIZED_MESSAGE.to_string());
            }),
        )
        .await
        .ok_or_else(|| AppError::NotFound("Resume not found".to_string()))?;

    Ok(Json(ResumeResponse::new(
        updated,
        flow.warnings,
        Some("Resume re-optimized successfully"),
    )))
}

#[derive(Debug, Deserialize)]
pub struct ReanalyzeBody {
    #[serde(default)]
    pub latex_code: String,
    #[serde(default)]
    pub job_description: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SkillsResponse {
    pub skills_analysis: SkillsAnalysis,
    pub message: &'static str,
    pub warnings: Warnings,
}

impl SkillsResponse {
    fn new(outcome: Outcome<SkillsAnalysis>, message: &'static str) -> Self {
        let mut warnings = Warnings::default();
        let skills_analysis = warnings.take("analyze skills", outcome);
        Self {
            skills_analysis,
            message,
            warnings,
        }
    }
}

/// POST /api/v1/resumes/reanalyze-skills
pub async fn handle_reanalyze_skills(
    State(state): State<AppState>,
    Json(req): Json<ReanalyzeBody>,
) -> Result<Json<SkillsResponse>, AppError> {
    if req.latex_code.trim().is_empty() || req.job_description.trim().is_empty() {
        return Err(AppError::Validation("Missing required fields.".to_string()));
    }

    let api_key = req.api_key.as_deref().filter(|k| !k.trim().is_empty());
    let outcome = state
        .pipeline
        .analyze_skills(&req.latex_code, &req.job_description, api_key)
        .await;

    Ok(Json(SkillsResponse::new(
        outcome,
        "Skills re-analyzed successfully",
    )))
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiKeyBody {
    pub api_key: Option<String>,
}

/// POST /api/v1/resumes/:id/skills
/// Re-runs the analysis for a stored record, replacing the previous one.
pub async fn handle_regenerate_skills(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ApiKeyBody>>,
) -> Result<Json<SkillsResponse>, AppError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let record = find_record(&state, id).await?;
    let job_description = record
        .job_description
        .clone()
        .filter(|j| !j.trim().is_empty())
        .ok_or_else(|| {
            AppError::Validation("This resume has no job description to analyze against.".to_string())
        })?;

    let api_key = pick_api_key(req.api_key, record.api_key);
    let outcome = state
        .pipeline
        .analyze_skills(&record.latex_code, &job_description, api_key.as_deref())
        .await;

    let analysis = outcome.value.clone();
    state
        .results
        .update(
            id,
            Box::new(move |r: &mut ResumeRecord| r.skills_analysis = Some(analysis)),
        )
        .await
        .ok_or_else(|| AppError::NotFound("Resume not found".to_string()))?;

    Ok(Json(SkillsResponse::new(
        outcome,
        "Skills re-analyzed successfully",
    )))
}

#[derive(Debug, Deserialize)]
pub struct SkillsLatexBody {
    #[serde(flatten)]
    pub analysis: SkillsAnalysis,
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SkillsLatexResponse {
    pub latex_skills_section: String,
    pub message: &'static str,
    pub warnings: Warnings,
}

/// POST /api/v1/resumes/skills-latex
/// Regenerates only the LaTeX fragment from a client-edited analysis.
pub async fn handle_skills_latex(
    State(state): State<AppState>,
    Json(req): Json<SkillsLatexBody>,
) -> Result<Json<SkillsLatexResponse>, AppError> {
    let mut probe = req.analysis.clone();
    probe.latex_skills_section.clear();
    if probe == SkillsAnalysis::default() {
        return Err(AppError::Validation("Missing skills data.".to_string()));
    }

    let api_key = req.api_key.as_deref().filter(|k| !k.trim().is_empty());
    let mut warnings = Warnings::default();
    let latex_skills_section = warnings.take(
        "format skills",
        state
            .pipeline
            .format_skills_section(&req.analysis, true, api_key)
            .await,
    );

    Ok(Json(SkillsLatexResponse {
        latex_skills_section,
        message: "Skills LaTeX section regenerated successfully",
        warnings,
    }))
}

#[derive(Debug, Serialize)]
pub struct CoverLetterResponse {
    pub resume_id: Uuid,
    pub cover_letter: String,
    pub warnings: Warnings,
}

/// POST /api/v1/resumes/:id/cover-letter
pub async fn handle_cover_letter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ApiKeyBody>>,
) -> Result<Json<CoverLetterResponse>, AppError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let record = find_record(&state, id).await?;
    if !record.can_generate_cover_letter() {
        return Err(AppError::Validation(
            "A company name and job description are required to generate a cover letter."
                .to_string(),
        ));
    }

    let api_key = pick_api_key(req.api_key, record.api_key.clone());
    let mut warnings = Warnings::default();
    let cover_letter = warnings.take(
        "cover letter",
        state
            .pipeline
            .generate_cover_letter(
                &record.latex_code,
                record.company_name.as_deref().unwrap_or_default(),
                record.job_description.as_deref().unwrap_or_default(),
                api_key.as_deref(),
            )
            .await,
    );

    let letter = cover_letter.clone();
    state
        .results
        .update(
            id,
            Box::new(move |r: &mut ResumeRecord| r.cover_letter = Some(letter)),
        )
        .await
        .ok_or_else(|| AppError::NotFound("Resume not found".to_string()))?;

    Ok(Json(CoverLetterResponse {
        resume_id: id,
        cover_letter,
        warnings,
    }))
}
