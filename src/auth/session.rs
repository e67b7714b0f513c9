use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::JwtConfig, cookies};

pub const SESSION_COOKIE: &str = "session";

/// What a signed token may be used for.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Session,
    Reset,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

/// Signing keys for session cookies and password reset tokens.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    session_ttl: Duration,
    remember_ttl: Duration,
    reset_ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        let minutes = |m: i64| Duration::from_secs(m.max(0) as u64 * 60);
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            session_ttl: minutes(cfg.session_ttl_minutes),
            remember_ttl: minutes(cfg.remember_ttl_days * 24 * 60),
            reset_ttl: minutes(cfg.reset_ttl_minutes),
        }
    }

    fn sign_at(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        ttl: Duration,
        now: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp().max(0) as usize,
            exp: exp.unix_timestamp().max(0) as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "token signed");
        Ok(token)
    }

    fn verify_kind(&self, token: &str, kind: TokenKind) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        if data.claims.kind != kind {
            anyhow::bail!("expected {:?} token, got {:?}", kind, data.claims.kind);
        }
        Ok(data.claims)
    }

    fn session_ttl_for(&self, remember: bool) -> Duration {
        if remember {
            self.remember_ttl
        } else {
            self.session_ttl
        }
    }

    pub fn issue_session(&self, user_id: Uuid, remember: bool) -> anyhow::Result<String> {
        self.sign_at(
            user_id,
            TokenKind::Session,
            self.session_ttl_for(remember),
            OffsetDateTime::now_utc(),
        )
    }

    /// User id of a valid session token.
    pub fn verify_session(&self, token: &str) -> Option<Uuid> {
        match self.verify_kind(token, TokenKind::Session) {
            Ok(claims) => Some(claims.sub),
            Err(e) => {
                debug!(error = %e, "session token rejected");
                None
            }
        }
    }

    /// `Set-Cookie` value carrying a fresh session for `user_id`.
    pub fn session_cookie(
        &self,
        user_id: Uuid,
        remember: bool,
        secure: bool,
    ) -> anyhow::Result<HeaderValue> {
        let token = self.issue_session(user_id, remember)?;
        let max_age = remember.then(|| self.remember_ttl.as_secs() as i64);
        Ok(cookies::build_cookie(SESSION_COOKIE, &token, max_age, secure)?)
    }

    pub fn session_from_headers(&self, headers: &HeaderMap) -> Option<Uuid> {
        let token = cookies::read_cookie(headers, SESSION_COOKIE)?;
        self.verify_session(&token)
    }

    pub fn issue_reset(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.issue_reset_at(user_id, OffsetDateTime::now_utc())
    }

    fn issue_reset_at(&self, user_id: Uuid, now: OffsetDateTime) -> anyhow::Result<String> {
        self.sign_at(user_id, TokenKind::Reset, self.reset_ttl, now)
    }

    /// Fails closed: malformed, expired, foreign or mis-signed tokens all
    /// yield `None`.
    pub fn verify_reset(&self, token: &str) -> Option<Uuid> {
        match self.verify_kind(token, TokenKind::Reset) {
            Ok(claims) => Some(claims.sub),
            Err(e) => {
                warn!(error = %e, "reset token rejected");
                None
            }
        }
    }
}
