//! One-shot notices carried across a redirect in the `flash` cookie.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::SET_COOKIE, request::Parts, HeaderValue},
    response::{IntoResponse, Redirect, Response},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{cookies, state::AppState};

pub const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Success,
    Danger,
    Info,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlashMessage {
    pub category: Category,
    pub message: String,
}

impl FlashMessage {
    pub fn new(category: Category, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// Pending flashes of the current request.
#[derive(Debug, Default)]
pub struct Flashes {
    messages: Vec<FlashMessage>,
    from_cookie: bool,
    secure: bool,
}

fn decode(raw: &str) -> Option<Vec<FlashMessage>> {
    let bytes = Base64UrlUnpadded::decode_vec(raw).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn encode(messages: &[FlashMessage]) -> anyhow::Result<String> {
    let json = serde_json::to_vec(messages)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

#[async_trait]
impl FromRequestParts<AppState> for Flashes {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = cookies::read_cookie(&parts.headers, FLASH_COOKIE);
        let messages = match raw.as_deref().map(decode) {
            Some(Some(m)) => m,
            Some(None) => {
                warn!("discarding unreadable flash cookie");
                Vec::new()
            }
            None => Vec::new(),
        };
        Ok(Self {
            messages,
            from_cookie: raw.is_some(),
            secure: state.config.cookie_secure,
        })
    }
}

impl Flashes {
    pub fn push(&mut self, category: Category, message: impl Into<String>) {
        self.messages.push(FlashMessage::new(category, message));
    }

    /// Drains the messages for display, with the header clearing the
    /// cookie when one was sent.
    pub fn take(self) -> (Vec<FlashMessage>, Option<HeaderValue>) {
        let clear = self
            .from_cookie
            .then(|| cookies::clear_cookie(FLASH_COOKIE, self.secure));
        (self.messages, clear)
    }

    /// Redirects to `to`, keeping every undisplayed message for the next page.
    pub fn redirect(self, to: &str) -> Response {
        let cookie = if self.messages.is_empty() {
            self.from_cookie
                .then(|| cookies::clear_cookie(FLASH_COOKIE, self.secure))
        } else {
            match encode(&self.messages)
                .and_then(|v| Ok(cookies::build_cookie(FLASH_COOKIE, &v, None, self.secure)?))
            {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(error = %e, "dropping flash messages");
                    None
                }
            }
        };
        let mut res = Redirect::to(to).into_response();
        if let Some(cookie) = cookie {
            res.headers_mut().append(SET_COOKIE, cookie);
        }
        res
    }

    pub fn redirect_with(mut self, to: &str, category: Category, message: &str) -> Response {
        self.push(category, message);
        self.redirect(to)
    }
}
