//! Session cookies, one-shot flash messages and the user extractors.
//!
//! The session cookie carries a signed token issued by the service. Flash
//! messages ride in a second cookie that the next rendered page clears.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, HeaderValue, header, request::Parts};
use axum::response::{IntoResponse, Redirect, Response};

use mealmind_core::credentials::SESSION_TTL_DAYS;
use mealmind_core::models::User;

use super::{AppState, WebError};

pub(crate) const SESSION_COOKIE: &str = "mealmind_session";
pub(crate) const FLASH_COOKIE: &str = "mealmind_flash";

/// Attributes for a `Set-Cookie` header. Always `HttpOnly`, `Path=/` and
/// `SameSite=Lax`.
pub(crate) struct CookieAttrs<'a> {
    name: &'a str,
    value: &'a str,
    max_age: Option<i64>,
    secure: bool,
}

impl<'a> CookieAttrs<'a> {
    pub(crate) fn new(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            value,
            max_age: None,
            secure: false,
        }
    }

    pub(crate) fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub(crate) fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub(crate) fn build(&self) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            self.name, self.value
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        if let Some(age) = self.max_age {
            cookie.push_str(&format!("; Max-Age={age}"));
        }
        cookie
    }
}

/// Session cookie for `token`. Without `remember` it lasts for the browser
/// session only.
pub(crate) fn session_cookie(token: &str, remember: bool, secure: bool) -> String {
    let cookie = CookieAttrs::new(SESSION_COOKIE, token).secure(secure);
    if remember {
        cookie.max_age(SESSION_TTL_DAYS * 24 * 60 * 60).build()
    } else {
        cookie.build()
    }
}

pub(crate) fn expired_cookie(name: &str) -> String {
    CookieAttrs::new(name, "").max_age(0).build()
}

pub(crate) fn append_cookie(headers: &mut HeaderMap, cookie: &str) {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        headers.append(header::SET_COOKIE, value);
    }
}

pub(crate) fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Only same-site paths are followed after login.
pub(crate) fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}

// --- Flash messages ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlashLevel {
    Success,
    Info,
    Warning,
    Danger,
}

impl FlashLevel {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        [Self::Success, Self::Info, Self::Warning, Self::Danger]
            .into_iter()
            .find(|l| l.as_str() == value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub(crate) fn new(level: FlashLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub(crate) fn success(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Success, message)
    }

    pub(crate) fn info(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Info, message)
    }

    pub(crate) fn warning(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Warning, message)
    }

    pub(crate) fn danger(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Danger, message)
    }

    fn encode(&self) -> String {
        format!(
            "{}:{}",
            self.level.as_str(),
            urlencoding::encode(&self.message)
        )
    }

    fn decode(value: &str) -> Option<Self> {
        let (level, message) = value.split_once(':')?;
        let message = urlencoding::decode(message).ok()?;
        Some(Self::new(FlashLevel::parse(level)?, message.into_owned()))
    }

    pub(crate) fn cookie(&self) -> String {
        CookieAttrs::new(FLASH_COOKIE, &self.encode()).build()
    }
}

/// Redirect that shows `flash` on the next rendered page.
pub(crate) fn flash_redirect(to: &str, flash: &Flash) -> Response {
    let mut response = Redirect::to(to).into_response();
    append_cookie(response.headers_mut(), &flash.cookie());
    response
}

// --- Extractors ---

/// The flash message left by the previous response, if any.
pub(crate) struct IncomingFlash(pub Option<Flash>);

impl<S: Send + Sync> FromRequestParts<S> for IncomingFlash {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            get_cookie_value(&parts.headers, FLASH_COOKIE).and_then(|v| Flash::decode(&v)),
        ))
    }
}

/// The logged-in user, when there is one.
pub(crate) struct MaybeUser(pub Option<User>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = get_cookie_value(&parts.headers, SESSION_COOKIE) else {
            return Ok(Self(None));
        };
        let user = state.service().user_from_session(&token)?;
        Ok(Self(user))
    }
}

/// A logged-in user. Anonymous requests are sent to the login page with
/// the requested path preserved in `next`.
pub(crate) struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await?.0 {
            Some(user) => Ok(Self(user)),
            None => Err(WebError::LoginRequired {
                next: parts
                    .uri
                    .path_and_query()
                    .map_or_else(|| parts.uri.path().to_string(), ToString::to_string),
            }),
        }
    }
}

/// A logged-in user whose biometric profile is complete.
pub(crate) struct CompleteUser(pub User);

impl FromRequestParts<AppState> for CompleteUser {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.is_profile_complete() {
            Ok(Self(user))
        } else {
            Err(WebError::ProfileIncomplete)
        }
    }
}
