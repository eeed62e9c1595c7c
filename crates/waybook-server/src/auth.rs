//! Session authentication.
//!
//! Clients present a session id in the `x-session-id` header (or a
//! `wb_session` cookie). The id must resolve to a row in the sessions
//! table; anything else is a 401. The session id doubles as the PII
//! decryption context downstream.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::state::AppState;
use waybook_types::{SessionId, UserId};

pub const SESSION_HEADER: &str = "x-session-id";
pub const SESSION_COOKIE: &str = "wb_session";

/// The authenticated caller, extracted per request.
#[derive(Debug, Clone, Copy)]
pub struct AuthedUser {
    pub user: UserId,
    pub session: SessionId,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = session_token(parts).ok_or_else(|| ApiError::unauthorized("missing session"))?;
        let session =
            SessionId::parse(&raw).map_err(|_| ApiError::unauthorized("invalid session"))?;
        let user = state
            .db()
            .session_user(session)
            .map_err(|e| ApiError::from(waybook_engine::EngineError::Store(e)))?
            .ok_or_else(|| ApiError::unauthorized("unknown session"))?;
        Ok(AuthedUser { user, session })
    }
}

/// Session token from the header, falling back to the cookie.
fn session_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get(SESSION_HEADER) {
        return value.to_str().ok().map(str::to_string);
    }
    let cookies = parts.headers.get(COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}
