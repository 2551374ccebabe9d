//! Shared-passcode gate and session cookie.
//!
//! The passcode is compared in plain text and nothing limits attempts. It keeps
//! casual visitors out; it is not a security boundary.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::state::AppState;
use crate::store::SessionStore;

pub const SESSION_COOKIE: &str = "tailor_session";

/// Session token of the current request, inserted by [`require_session`].
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub passcode: String,
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// POST /login
pub async fn handle_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<Value>), AppError> {
    if let Some(expected) = &state.config.passcode {
        if req.passcode != *expected {
            warn!("Rejected login attempt");
            return Err(AppError::Unauthorized);
        }
    }

    let token = state.sessions.create().await;
    info!("Session opened");
    Ok((jar.add(session_cookie(token)), Json(json!({ "success": true }))))
}

/// POST /logout
pub async fn handle_logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<Value>) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value()).await;
    }
    let removal = Cookie::build(SESSION_COOKIE).path("/").build();
    (jar.remove(removal), Json(json!({ "success": true })))
}

/// Admits requests carrying a live session cookie.
///
/// With no passcode configured every visitor is let through: a cookie token is
/// accepted as-is, and a cookieless request gets a fresh token. Neither stores
/// anything; the session is opened by the first handler that writes to it.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let open_gate = state.config.passcode.is_none();

    let presented = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| is_session_token(t));
    if let Some(token) = presented {
        if open_gate || state.sessions.contains(&token).await {
            request.extensions_mut().insert(SessionToken(token));
            return Ok(next.run(request).await);
        }
    }

    if !open_gate {
        return Err(AppError::Unauthorized);
    }

    let token = SessionStore::new_token();
    request.extensions_mut().insert(SessionToken(token.clone()));
    let response = next.run(request).await;
    Ok((jar.add(session_cookie(token)), response).into_response())
}

/// Tokens are simple-format UUIDs: 32 hex digits.
fn is_session_token(token: &str) -> bool {
    token.len() == 32 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_token_shape() {
        assert!(is_session_token(&SessionStore::new_token()));
        assert!(!is_session_token(""));
        assert!(!is_session_token("not-a-token"));
        assert!(!is_session_token(&"z".repeat(32)));
    }
}
