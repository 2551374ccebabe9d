use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::routes::auth::SessionToken;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MainResumeResponse {
    pub resume_content: Option<String>,
    pub current_resume_id: Option<Uuid>,
    pub current_base_resume_id: Option<Uuid>,
}

/// GET /api/v1/session/main-resume
pub async fn handle_get_main_resume(
    State(state): State<AppState>,
    Extension(token): Extension<SessionToken>,
) -> Result<Json<MainResumeResponse>, AppError> {
    let session = state.sessions.get(&token.0).await.unwrap_or_default();
    Ok(Json(MainResumeResponse {
        resume_content: session.main_resume,
        current_resume_id: session.current_resume_id,
        current_base_resume_id: session.current_base_resume_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SaveMainResumeBody {
    #[serde(default)]
    pub resume_content: String,
}

#[derive(Debug, Serialize)]
pub struct SaveMainResumeResponse {
    pub success: bool,
}

/// PUT /api/v1/session/main-resume
pub async fn handle_save_main_resume(
    State(state): State<AppState>,
    Extension(token): Extension<SessionToken>,
    Json(req): Json<SaveMainResumeBody>,
) -> Result<Json<SaveMainResumeResponse>, AppError> {
    let content = req.resume_content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::Validation("No resume content provided.".to_string()));
    }

    state
        .sessions
        .upsert(&token.0, |s| s.main_resume = Some(content))
        .await;
    Ok(Json(SaveMainResumeResponse { success: true }))
}
