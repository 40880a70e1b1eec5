//! Two-step cookie/session auth against the upstream threat portal (C2).
//!
//! The portal's success signal is a redirect, not a status code a generic
//! HTTP client treats as "done" — reqwest's default redirect policy would
//! silently follow the 302 and hand back the final page, losing the
//! `Location` header this client needs to inspect. Redirects are disabled
//! here so the raw 302 is visible.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use tracing::{info, instrument, warn};

use crate::errors::PortalError;

const AUTH_TIMEOUT: Duration = Duration::from_secs(20);
const SUCCESS_LOCATION_PATH: &str = "/main/main";
const SESSION_COOKIE_NAME: &str = "regtech-va";

pub struct PortalAuthClient {
    http: Client,
    jar: Arc<Jar>,
    base_url: String,
    cookie_auth_mode: Mutex<bool>,
}

impl PortalAuthClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let jar = Arc::new(Jar::default());
        let http = Client::builder()
            .cookie_provider(jar.clone())
            .redirect(Policy::none())
            .timeout(AUTH_TIMEOUT)
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
            )
            .build()
            .expect("reqwest client with a static config must build");

        Self {
            http,
            jar,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cookie_auth_mode: Mutex::new(false),
        }
    }

    pub fn http_client(&self) -> &Client {
        &self.http
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Performs the two-step login. Success is HTTP 302 + a `Location`
    /// pointing at the portal's main page + a `regtech-va` session cookie;
    /// any other combination is a failure, not an error — callers decide
    /// whether to retry.
    #[instrument(skip(self, username, password))]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<bool, PortalError> {
        let url = format!("{}/login/addLogin", self.base_url);
        let body = format!(
            "username={}&password={}",
            urlencode(username),
            urlencode(password)
        );

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Referer", format!("{}/login", self.base_url))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let has_session_cookie = self
            .jar
            .cookies(&url.parse().expect("base_url must be a valid URL"))
            .map(|header| header.to_str().unwrap_or_default().contains(SESSION_COOKIE_NAME))
            .unwrap_or(false);

        let success = status == StatusCode::FOUND
            && location.contains(SUCCESS_LOCATION_PATH)
            && has_session_cookie;

        if success {
            info!("portal authentication succeeded");
        } else {
            warn!(%status, location, "portal authentication failed");
        }
        Ok(success)
    }

    /// True if the response indicates the session cookie is no longer
    /// valid: a direct 401, or a 302 redirecting back to a login page.
    pub fn is_cookie_expired(status: StatusCode, location: Option<&str>) -> bool {
        if status == StatusCode::UNAUTHORIZED {
            return true;
        }
        if status == StatusCode::FOUND {
            if let Some(location) = location {
                return location.to_lowercase().contains("login");
            }
        }
        false
    }

    /// Parses a semicolon-separated raw cookie header directly into the
    /// jar, bypassing login on the next request. Malformed pairs (no `=`)
    /// are skipped silently; this method never fails.
    pub fn set_cookie_string(&self, raw: &str) {
        let url: reqwest::Url = self.base_url.parse().expect("base_url must be a valid URL");
        for pair in raw.split(';') {
            let pair = pair.trim();
            if pair.is_empty() || !pair.contains('=') {
                continue;
            }
            self.jar.add_cookie_str(pair, &url);
        }
        *self.cookie_auth_mode.lock().unwrap() = true;
    }

    pub fn is_cookie_auth_mode(&self) -> bool {
        *self.cookie_auth_mode.lock().unwrap()
    }
}

fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_cookie_expired_detects_401() {
        assert!(PortalAuthClient::is_cookie_expired(StatusCode::UNAUTHORIZED, None));
    }

    #[test]
    fn is_cookie_expired_detects_login_redirect() {
        assert!(PortalAuthClient::is_cookie_expired(
            StatusCode::FOUND,
            Some("/LOGIN/index")
        ));
    }

    #[test]
    fn is_cookie_expired_ignores_normal_redirect() {
        assert!(!PortalAuthClient::is_cookie_expired(
            StatusCode::FOUND,
            Some("/main/main")
        ));
    }

    #[test]
    fn set_cookie_string_skips_malformed_pairs_without_panicking() {
        let client = PortalAuthClient::new("https://portal.example.test");
        client.set_cookie_string("regtech-va=abc; malformed; regtech-front=def");
        assert!(client.is_cookie_auth_mode());
    }

    #[test]
    fn urlencode_escapes_reserved_characters() {
        assert_eq!(urlencode("a b&c"), "a%20b%26c");
    }
}
