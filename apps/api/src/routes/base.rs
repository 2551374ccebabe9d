use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{ResumeRecord, ScoreKind};
use crate::routes::auth::SessionToken;
use crate::routes::resumes::{find_record, resume_content_or_main, ResumeResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BaseResumeBody {
    pub resume_content: Option<String>,
    pub api_key: Option<String>,
}

/// POST /api/v1/base-resumes
/// Job-agnostic ATS résumé: generate, score, and improve once below 80.
pub async fn handle_generate_base(
    State(state): State<AppState>,
    Extension(token): Extension<SessionToken>,
    Json(req): Json<BaseResumeBody>,
) -> Result<Json<ResumeResponse>, AppError> {
    let content = resume_content_or_main(&state, &token, req.resume_content).await;
    let flow = state
        .pipeline
        .base_resume(&content, req.api_key.as_deref())
        .await?;

    let id = state.results.put(flow.record.clone()).await;
    state
        .sessions
        .upsert(&token.0, |s| s.current_base_resume_id = Some(id))
        .await;
    info!("Stored base resume {id} ({})", flow.record.score);

    let message = if flow.record.score.below_threshold() {
        "Base resume generated. Consider manual improvements."
    } else {
        "Base resume generated successfully"
    };
    Ok(Json(ResumeResponse::new(
        flow.record,
        flow.warnings,
        Some(message),
    )))
}

#[derive(Debug, Deserialize)]
pub struct FeedbackBody {
    #[serde(default)]
    pub feedback: String,
    pub api_key: Option<String>,
}

/// POST /api/v1/base-resumes/:id/feedback
/// Rewrites the stored base résumé from user feedback. The new LaTeX and score
/// replace the old ones even when the score is lower.
pub async fn handle_feedback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<FeedbackBody>,
) -> Result<Json<ResumeResponse>, AppError> {
    let mut record = find_record(&state, id).await?;
    if record.score.kind() != ScoreKind::Ats {
        return Err(AppError::Validation(
            "Feedback improvement applies to base resumes only.".to_string(),
        ));
    }
    if let Some(key) = req.api_key.filter(|k| !k.trim().is_empty()) {
        record.api_key = Some(key);
    }

    let flow = state.pipeline.apply_feedback(&record, &req.feedback).await?;

    // Only the rewritten fields are applied; anything stored meanwhile is kept.
    let fresh = flow.record;
    let updated = state
        .results
        .update(
            id,
            Box::new(move |r: &mut ResumeRecord| {
                r.latex_code = fresh.latex_code;
                r.score = fresh.score;
                r.feedback = fresh.feedback;
                r.optimized = fresh.optimized;
                r.optimization_message = fresh.optimization_message;
                r.api_key = fresh.api_key;
            }),
        )
        .await
        .ok_or_else(|| AppError::NotFound("Resume not found".to_string()))?;
    info!("Base resume {id} regenerated from feedback ({})", updated.score);

    Ok(Json(ResumeResponse::new(
        updated,
        flow.warnings,
        Some("Resume regenerated based on your feedback"),
    )))
}
