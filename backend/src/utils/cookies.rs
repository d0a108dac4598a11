//! Transport contract for the refresh credential.
//!
//! The refresh token travels only in an HTTP-only cookie scoped to the whole
//! site; the access token travels only in response bodies and bearer headers.

use axum::http::{header, HeaderMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

#[derive(Debug, Clone, Copy)]
pub struct CookieOptions {
    pub secure: bool,
    pub same_site: SameSite,
}

pub const REFRESH_COOKIE_NAME: &str = "refresh_token";
pub const REFRESH_COOKIE_PATH: &str = "/";

/// Builds the `Set-Cookie` value that installs a refresh token.
///
/// `max_age_secs` is clamped at zero so an already-expired grant produces an
/// immediately-expiring cookie instead of a malformed attribute.
pub fn build_refresh_cookie(value: &str, max_age_secs: i64, options: CookieOptions) -> String {
    build_cookie(REFRESH_COOKIE_NAME, value, max_age_secs.max(0), options)
}

/// Builds the `Set-Cookie` value that empties the refresh cookie on the client.
pub fn build_clear_refresh_cookie(options: CookieOptions) -> String {
    build_cookie(REFRESH_COOKIE_NAME, "", 0, options)
}

fn build_cookie(name: &str, value: &str, max_age_secs: i64, options: CookieOptions) -> String {
    let mut cookie = format!(
        "{}={}; Path={}; Max-Age={}; HttpOnly; SameSite={}",
        name,
        value,
        REFRESH_COOKIE_PATH,
        max_age_secs,
        same_site_value(options.same_site)
    );
    if options.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn extract_cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|pair| {
        let mut parts = pair.splitn(2, '=');
        let key = parts.next()?.trim();
        let value = parts.next()?.trim();
        if key == name && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

/// Reads the refresh token from every `Cookie` header on the request.
pub fn refresh_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|raw| extract_cookie_value(raw, REFRESH_COOKIE_NAME))
}

fn same_site_value(same_site: SameSite) -> &'static str {
    match same_site {
        SameSite::Lax => "Lax",
        SameSite::Strict => "Strict",
        SameSite::None => "None",
    }
}
