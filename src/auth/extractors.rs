use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use crate::{
    error::AppError,
    flash::{Category, Flashes},
    state::AppState,
    users::repo_types::User,
};

/// The caller's user, if the session cookie is valid and the user still exists.
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(user_id) = state.jwt.session_from_headers(&parts.headers) else {
            return Ok(MaybeUser(None));
        };
        let user = state.users.find_by_id(user_id).await?;
        if user.is_none() {
            debug!(%user_id, "session for deleted user");
        }
        Ok(MaybeUser(user))
    }
}

/// Requires a session; anonymous callers are sent to the login page.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        match user {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                let flashes = Flashes::from_request_parts(parts, state)
                    .await
                    .unwrap_or_default();
                let target = parts
                    .uri
                    .path_and_query()
                    .map_or(parts.uri.path(), |pq| pq.as_str());
                let next = encode_query_value(target);
                Err(flashes.redirect_with(
                    &format!("/login?next={next}"),
                    Category::Info,
                    "Please log in to access this page.",
                ))
            }
        }
    }
}

/// Guards pages meant for logged-out callers: anyone with a session is
/// redirected home before the request body is read.
pub struct Anonymous;

#[async_trait]
impl FromRequestParts<AppState> for Anonymous {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await {
            Ok(MaybeUser(None)) => Ok(Anonymous),
            Ok(MaybeUser(Some(user))) => {
                debug!(user_id = %user.id, path = parts.uri.path(), "already authenticated");
                Err(Redirect::to("/").into_response())
            }
            Err(e) => Err(e.into_response()),
        }
    }
}

/// Redirect target for a `next` parameter: only local absolute paths are
/// accepted, everything else goes home.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(n)
            if n.starts_with('/')
                && !n.starts_with("//")
                && !n.contains('\\')
                && !n.contains("://")
                && !n.chars().any(char::is_control) =>
        {
            n
        }
        _ => "/",
    }
}

fn encode_query_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
