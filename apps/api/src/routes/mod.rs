pub mod auth;
pub mod base;
pub mod health;
pub mod resumes;
pub mod session;
pub mod uploads;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // Everything under /api needs a session.
    let api = Router::new()
        // Tailored resumes
        .route("/api/v1/resumes/generate", post(resumes::handle_generate))
        .route("/api/v1/resumes/reoptimize", post(resumes::handle_reoptimize))
        .route(
            "/api/v1/resumes/reanalyze-skills",
            post(resumes::handle_reanalyze_skills),
        )
        .route(
            "/api/v1/resumes/skills-latex",
            post(resumes::handle_skills_latex),
        )
        .route("/api/v1/resumes/:id", get(resumes::handle_get_resume))
        .route(
            "/api/v1/resumes/:id/download",
            get(resumes::handle_download),
        )
        .route(
            "/api/v1/resumes/:id/reoptimize",
            post(resumes::handle_reoptimize_stored),
        )
        .route(
            "/api/v1/resumes/:id/skills",
            post(resumes::handle_regenerate_skills),
        )
        .route(
            "/api/v1/resumes/:id/cover-letter",
            post(resumes::handle_cover_letter),
        )
        // Base resumes
        .route("/api/v1/base-resumes", post(base::handle_generate_base))
        .route(
            "/api/v1/base-resumes/:id/feedback",
            post(base::handle_feedback),
        )
        // Uploads
        .route(
            "/api/v1/uploads/extract",
            post(uploads::handle_extract).layer(DefaultBodyLimit::max(uploads::MAX_UPLOAD_BYTES)),
        )
        // Session
        .route(
            "/api/v1/session/main-resume",
            get(session::handle_get_main_resume).put(session::handle_save_main_resume),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/login", post(auth::handle_login))
        .route("/logout", post(auth::handle_logout))
        .merge(api)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use async_trait::async_trait;

    use crate::config::Config;
    use crate::generation::pipeline::tests::{Call, ScriptedGenerator, DOC, DOC_V2};
    use crate::generation::Pipeline;
    use crate::llm_client::{GenerationRequest, LlmError, TextGenerator};
    use crate::models::{ResumeRecord, Score};
    use crate::store::{InMemoryResultStore, ResultStore, SessionStore};
    use crate::templates::TemplateStore;

    fn state_with(generator: ScriptedGenerator, passcode: Option<&str>) -> AppState {
        let config = Config {
            passcode: passcode.map(String::from),
            ..Config::default()
        };
        AppState::new(config, Arc::new(generator), TemplateStore::embedded())
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn session_cookie(response: &Response) -> String {
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(state_with(ScriptedGenerator::unconfigured(), None));
        let response = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["generation"], "mock");
    }

    #[tokio::test]
    async fn test_download_unknown_id_is_404() {
        let app = build_router(state_with(ScriptedGenerator::unconfigured(), None));
        let uri = format!("/api/v1/resumes/{}/download", Uuid::new_v4());
        let response = app.oneshot(get_request(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_download_serves_latex_file() {
        let state = state_with(ScriptedGenerator::unconfigured(), None);
        let mut record = ResumeRecord::new(DOC.to_string(), Score::matching(9), String::new());
        record.company_name = Some("Acme".to_string());
        let id = state.results.put(record).await;

        let app = build_router(state);
        let uri = format!("/api/v1/resumes/{id}/download");
        let response = app.oneshot(get_request(&uri)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/x-tex"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"resume_Acme.tex\""
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes, DOC.as_bytes());
    }

    #[tokio::test]
    async fn test_generate_in_mock_mode_stores_record() {
        let state = state_with(ScriptedGenerator::unconfigured(), None);
        let app = build_router(state.clone());

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/resumes/generate",
                json!({
                    "resume_content": "Jane Doe\njane@example.com",
                    "job_description": "Rust engineer",
                    "company_name": "Acme"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["score"]["value"], 6);
        assert_eq!(body["badge"], "warning");
        assert_eq!(body["feedback"], "Resume appears well-tailored to the job description.");
        assert_eq!(body["download_filename"], "resume_Acme.tex");
        assert!(body["latex_code"].as_str().unwrap().contains("Jane Doe"));
        assert!(!body["warnings"].as_array().unwrap().is_empty());
        assert!(body.get("api_key").is_none());

        let id: Uuid = body["resume_id"].as_str().unwrap().parse().unwrap();
        assert!(state.results.get(id).await.is_some());
    }

    #[tokio::test]
    async fn test_generate_requires_job_description() {
        let app = build_router(state_with(ScriptedGenerator::unconfigured(), None));
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/resumes/generate",
                json!({ "resume_content": "Jane Doe" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(
            body["error"]["message"],
            "Job description is required for tailoring"
        );
    }

    #[tokio::test]
    async fn test_passcode_gate() {
        let state = state_with(ScriptedGenerator::unconfigured(), Some("letmein"));
        let app = build_router(state);

        let denied = app
            .clone()
            .oneshot(get_request("/api/v1/session/main-resume"))
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .clone()
            .oneshot(json_request("POST", "/login", json!({ "passcode": "nope" })))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let login = app
            .clone()
            .oneshot(json_request("POST", "/login", json!({ "passcode": "letmein" })))
            .await
            .unwrap();
        assert_eq!(login.status(), StatusCode::OK);
        let cookie = session_cookie(&login);

        let save = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/v1/session/main-resume")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::COOKIE, &cookie)
                    .body(Body::from(json!({ "resume_content": "Jane Doe" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(save.status(), StatusCode::OK);

        let load = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/session/main-resume")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(load).await["resume_content"], "Jane Doe");

        let logout = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/logout")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(logout.status(), StatusCode::OK);

        let after = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/session/main-resume")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_open_gate_issues_session_cookie() {
        let app = build_router(state_with(ScriptedGenerator::unconfigured(), None));
        let response = app
            .oneshot(get_request("/api/v1/session/main-resume"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(session_cookie(&response).starts_with("tailor_session="));
    }

    #[tokio::test]
    async fn test_cookieless_reads_open_no_sessions() {
        let state = state_with(ScriptedGenerator::unconfigured(), None);
        let app = build_router(state.clone());

        for _ in 0..50 {
            let response = app
                .clone()
                .oneshot(get_request("/api/v1/session/main-resume"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(state.sessions.len().await, 0);
    }

    #[tokio::test]
    async fn test_open_gate_session_opens_on_first_write() {
        let state = state_with(ScriptedGenerator::unconfigured(), None);
        let app = build_router(state.clone());

        let first = app
            .clone()
            .oneshot(get_request("/api/v1/session/main-resume"))
            .await
            .unwrap();
        let cookie = session_cookie(&first);
        assert_eq!(state.sessions.len().await, 0);

        let save = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/v1/session/main-resume")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::COOKIE, &cookie)
                    .body(Body::from(json!({ "resume_content": "Jane Doe" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(save.status(), StatusCode::OK);
        assert!(save.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(state.sessions.len().await, 1);

        let load = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/session/main-resume")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(load).await["resume_content"], "Jane Doe");
        assert_eq!(state.sessions.len().await, 1);
    }

    #[tokio::test]
    async fn test_skills_latex_requires_data() {
        let app = build_router(state_with(ScriptedGenerator::unconfigured(), None));
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/resumes/skills-latex",
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_skills_latex_from_supplied_analysis() {
        let generator =
            ScriptedGenerator::default().answer(Call::FormatSkills, "\\section{Skills}");
        let app = build_router(state_with(generator, None));
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/resumes/skills-latex",
                json!({
                    "profession_type": "Engineer",
                    "current_skills_by_category": { "Languages": ["Rust"] }
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["latex_skills_section"], "\\section{Skills}");
    }

    #[tokio::test]
    async fn test_cover_letter_needs_company_and_job() {
        let state = state_with(ScriptedGenerator::unconfigured(), None);
        let id = state
            .results
            .put(ResumeRecord::new(DOC.to_string(), Score::matching(8), String::new()))
            .await;

        let app = build_router(state);
        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/resumes/{id}/cover-letter"),
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cover_letter_is_stored_on_record() {
        let generator =
            ScriptedGenerator::default().answer(Call::CoverLetter, "Dear Hiring Manager,");
        let state = state_with(generator, None);
        let mut record = ResumeRecord::new(DOC.to_string(), Score::matching(8), String::new());
        record.company_name = Some("Acme".to_string());
        record.job_description = Some("Rust engineer".to_string());
        let id = state.results.put(record).await;

        let app = build_router(state.clone());
        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/resumes/{id}/cover-letter"),
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            state.results.get(id).await.unwrap().cover_letter.as_deref(),
            Some("Dear Hiring Manager,")
        );
    }

    #[tokio::test]
    async fn test_base_feedback_replaces_record() {
        let generator = ScriptedGenerator::default()
            .answer(Call::FeedbackImprove, DOC_V2)
            .answer(Call::AtsScore, "58");
        let state = state_with(generator, None);
        let mut record = ResumeRecord::new(DOC.to_string(), Score::ats(82), String::new());
        record.source_content = Some("Jane Doe".to_string());
        let id = state.results.put(record).await;

        let app = build_router(state.clone());
        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/base-resumes/{id}/feedback"),
                json!({ "feedback": "Too many buzzwords" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let stored = state.results.get(id).await.unwrap();
        assert_eq!(stored.latex_code, DOC_V2);
        assert_eq!(stored.score, Score::ats(58));
    }

    /// Writes a cover letter onto the record while the feedback rewrite is in flight.
    struct InterleavingGenerator {
        results: Arc<InMemoryResultStore>,
        id: Uuid,
    }

    #[async_trait]
    impl TextGenerator for InterleavingGenerator {
        async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, LlmError> {
            if request.prompt.contains("USER FEEDBACK TO ADDRESS:") {
                self.results
                    .update(
                        self.id,
                        Box::new(|r: &mut ResumeRecord| {
                            r.cover_letter = Some("Dear team".to_string())
                        }),
                    )
                    .await;
                Ok(DOC_V2.to_string())
            } else {
                Ok("58".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_base_feedback_keeps_concurrent_writes() {
        let results = Arc::new(InMemoryResultStore::new());
        let mut record = ResumeRecord::new(DOC.to_string(), Score::ats(82), String::new());
        record.source_content = Some("Jane Doe".to_string());
        let id = results.put(record).await;

        let generator = InterleavingGenerator {
            results: results.clone(),
            id,
        };
        let config = Config::default();
        let pipeline = Pipeline::new(
            Arc::new(generator),
            Arc::new(TemplateStore::embedded()),
            config.genai_model.clone(),
        );
        let state = AppState {
            pipeline: Arc::new(pipeline),
            results: results.clone(),
            sessions: Arc::new(SessionStore::new()),
            config,
        };

        let app = build_router(state);
        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/base-resumes/{id}/feedback"),
                json!({ "feedback": "Shorter summary" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["cover_letter"], "Dear team");

        let stored = results.get(id).await.unwrap();
        assert_eq!(stored.latex_code, DOC_V2);
        assert_eq!(stored.score, Score::ats(58));
        assert_eq!(stored.cover_letter.as_deref(), Some("Dear team"));
    }

    #[tokio::test]
    async fn test_reoptimize_stored_record_in_place() {
        let generator = ScriptedGenerator::default()
            .answer(Call::Optimize, DOC_V2)
            .answer(Call::Evaluate, "SCORE: 9\nFEEDBACK: strong");
        let state = state_with(generator, None);
        let mut record = ResumeRecord::new(DOC.to_string(), Score::matching(5), "weak".into());
        record.job_description = Some("Rust engineer".to_string());
        let id = state.results.put(record).await;

        let app = build_router(state.clone());
        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/resumes/{id}/reoptimize"),
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["resume_id"], id.to_string());
        assert_eq!(
            body["optimization_message"],
            "Re-optimization was performed by user request."
        );

        let stored = state.results.get(id).await.unwrap();
        assert_eq!(stored.latex_code, DOC_V2);
        assert_eq!(stored.score.value(), 9);
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported_type() {
        let app = build_router(state_with(ScriptedGenerator::unconfigured(), None));
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"photo.png\"\r\nContent-Type: image/png\r\n\r\nPNGDATA\r\n--{boundary}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/uploads/extract")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
