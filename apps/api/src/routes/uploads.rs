use axum::{extract::Multipart, Json};
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::extract::{extract_text, DocumentKind};

/// Largest upload accepted by the extract route.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub file_name: Option<String>,
    pub text: String,
    pub characters: usize,
}

/// POST /api/v1/uploads/extract
/// Multipart field `file`: PDF, DOCX or DOC bytes → plain text.
pub async fn handle_extract(mut multipart: Multipart) -> Result<Json<ExtractResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().map(String::from);
        let content_type = field.content_type().map(String::from);
        let kind = DocumentKind::detect(content_type.as_deref(), file_name.as_deref())?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;

        // PDF parsing is CPU-bound.
        let text = tokio::task::spawn_blocking(move || extract_text(kind, &bytes))
            .await
            .map_err(|e| AppError::Internal(e.into()))??;

        info!(
            "Extracted {} characters from {:?} ({kind:?})",
            text.chars().count(),
            file_name
        );
        return Ok(Json(ExtractResponse {
            file_name,
            characters: text.chars().count(),
            text,
        }));
    }

    Err(AppError::Validation("No file uploaded".to_string()))
}
