//! Bearer-token extraction for the proxied backend routes.
//!
//! Browsers send the session token as the `token` cookie; API clients may use
//! `Authorization: Bearer <token>` instead.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn cookie_name(self) -> &'static str {
        match self {
            TokenKind::Access => "token",
            TokenKind::Refresh => "refresh_token",
        }
    }
}

/// Finds `<name>=<value>` in a `Cookie` header value.
pub fn token_from_cookies(cookies: &str, kind: TokenKind) -> Option<String> {
    let name = kind.cookie_name();
    cookies
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Looks for `kind`'s cookie across every `Cookie` header.
pub fn cookie_token(headers: &HeaderMap, kind: TokenKind) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookies| token_from_cookies(cookies, kind))
}

fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    cookie_token(headers, TokenKind::Access).or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    })
}

/// The caller's access token. Rejects with 401 when absent.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        token_from_headers(&parts.headers)
            .map(BearerToken)
            .ok_or(AppError::Unauthorized)
    }
}
