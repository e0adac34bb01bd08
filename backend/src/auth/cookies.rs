//! Session cookies.
//!
//! The server keeps the hosted-auth session in two cookies. Every cookie it
//! sets is listed in [`SESSION_COOKIES`] so sign-out can expire all of them.

use axum::http::{header, HeaderMap, HeaderValue};

pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
pub const REFRESH_TOKEN_COOKIE: &str = "sb-refresh-token";

pub const SESSION_COOKIES: [&str; 2] = [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE];

/// Find a cookie value in the request's `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Builds `Set-Cookie` values with consistent attributes.
#[derive(Debug, Clone, Copy)]
pub struct CookieJar {
    secure: bool,
}

impl CookieJar {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    pub fn set(&self, name: &str, value: &str, max_age_secs: i64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            name, value, max_age_secs
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub fn expire(&self, name: &str) -> String {
        self.set(name, "", 0)
    }

    /// Append `Set-Cookie` headers for a fresh session.
    pub fn write_session(&self, headers: &mut HeaderMap, access_token: &str, refresh_token: &str, expires_in: i64) {
        self.append(headers, self.set(ACCESS_TOKEN_COOKIE, access_token, expires_in));
        // refresh tokens outlive the access token
        self.append(headers, self.set(REFRESH_TOKEN_COOKIE, refresh_token, 60 * 60 * 24 * 30));
    }

    /// Append `Set-Cookie` headers expiring every session cookie.
    pub fn clear_session(&self, headers: &mut HeaderMap) {
        for name in SESSION_COOKIES {
            self.append(headers, self.expire(name));
        }
    }

    fn append(&self, headers: &mut HeaderMap, cookie: String) {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!("Dropping malformed cookie: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_value_across_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "a=1; sb-access-token=tok ; b=2".parse().unwrap());
        assert_eq!(cookie_value(&headers, ACCESS_TOKEN_COOKIE).as_deref(), Some("tok"));
        assert_eq!(cookie_value(&headers, "b").as_deref(), Some("2"));
        assert!(cookie_value(&headers, "missing").is_none());
    }

    #[test]
    fn test_empty_cookie_counts_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "sb-access-token=".parse().unwrap());
        assert!(cookie_value(&headers, ACCESS_TOKEN_COOKIE).is_none());
    }

    #[test]
    fn test_set_cookie_attributes() {
        let cookie = CookieJar::new(true).set("name", "value", 3600);
        assert_eq!(cookie, "name=value; Path=/; HttpOnly; SameSite=Lax; Max-Age=3600; Secure");
        assert!(!CookieJar::new(false).set("name", "value", 1).contains("Secure"));
    }

    #[test]
    fn test_clear_session_expires_every_cookie() {
        let mut headers = HeaderMap::new();
        CookieJar::new(false).clear_session(&mut headers);
        let cookies: Vec<&str> = headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(cookies.len(), SESSION_COOKIES.len());
        for name in SESSION_COOKIES {
            assert!(cookies.iter().any(|c| c.starts_with(&format!("{}=;", name)) && c.contains("Max-Age=0")));
        }
    }
}
