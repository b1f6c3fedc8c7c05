//! Google OAuth2 authorization-code flow
//!
//! Builds the consent URL, receives the redirect on a local listener,
//! exchanges the code for tokens and refreshes expired access tokens.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use base64::prelude::*;
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;

use crate::config::GoogleCredentials;
use crate::error::CredentialError;
use crate::models::UserCredential;

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    id_token: Option<String>,
}

/// Claims we read from the id token
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    email: Option<String>,
}

/// OAuth2 client for Google accounts
pub struct OAuthClient {
    credentials: GoogleCredentials,
    agent: ureq::Agent,
}

impl OAuthClient {
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Gmail modify (read + labels), the user's email, and an id token
    const SCOPES: &'static str = "https://www.googleapis.com/auth/gmail.modify \
                                  https://www.googleapis.com/auth/userinfo.email openid";

    /// Lifetime assumed when the token endpoint omits `expires_in`
    const DEFAULT_EXPIRES_IN: i64 = 3600;

    /// Create a client; `agent` carries the HTTP timeout configuration
    pub fn new(credentials: GoogleCredentials, agent: ureq::Agent) -> Self {
        Self { credentials, agent }
    }

    /// Redirect URI registered for this client
    pub fn redirect_uri(&self) -> &str {
        &self.credentials.redirect_uri
    }

    /// Build the consent URL the user opens in a browser
    ///
    /// `access_type=offline` with `prompt=consent` makes Google issue a
    /// refresh token even on re-authorization.
    pub fn authorization_url(&self, state: Option<&str>) -> String {
        let mut url = format!(
            "{}?client_id={}&response_type=code&scope={}&redirect_uri={}\
             &access_type=offline&prompt=consent&include_granted_scopes=true",
            Self::AUTH_URL,
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(Self::SCOPES),
            urlencoding::encode(&self.credentials.redirect_uri),
        );
        if let Some(state) = state {
            url.push_str(&format!("&state={}", urlencoding::encode(state)));
        }
        url
    }

    /// Exchange an authorization code for a credential record
    ///
    /// The record's ID is the email claim of the id token, or
    /// `user-{epoch}` when Google did not return one.
    pub fn exchange_code(&self, code: &str) -> Result<UserCredential> {
        let mut response = self
            .agent
            .post(Self::TOKEN_URL)
            .send_form([
                ("code", code),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .context("Failed to exchange authorization code")?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;

        let now = chrono::Utc::now().timestamp();
        let email = token.id_token.as_deref().and_then(email_from_id_token);
        let id = email.clone().unwrap_or_else(|| format!("user-{}", now));

        Ok(UserCredential::new(
            id,
            email,
            token.refresh_token,
            token.access_token,
            now + token.expires_in.unwrap_or(Self::DEFAULT_EXPIRES_IN),
        ))
    }

    /// Refresh an expired access token, returning the replacement record
    ///
    /// The refresh token is preserved when Google does not rotate it.
    pub fn refresh(&self, credential: &UserCredential) -> Result<UserCredential> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or_else(|| CredentialError::MissingRefreshToken(credential.id.clone()))?;

        let response = self.agent.post(Self::TOKEN_URL).send_form([
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ]);

        let mut response = match response {
            Ok(resp) => resp,
            Err(ureq::Error::StatusCode(status)) => {
                return Err(CredentialError::RefreshRejected {
                    user: credential.id.clone(),
                    reason: format!("token endpoint returned {}", status),
                }
                .into());
            }
            Err(e) => return Err(anyhow::Error::new(e).context("Failed to refresh access token")),
        };

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse refresh token response")?;

        Ok(UserCredential::new(
            credential.id.clone(),
            credential.email.clone(),
            token
                .refresh_token
                .or_else(|| credential.refresh_token.clone()),
            token.access_token,
            chrono::Utc::now().timestamp() + token.expires_in.unwrap_or(Self::DEFAULT_EXPIRES_IN),
        ))
    }

    /// Accept one redirect request on `listener` and return the authorization code
    ///
    /// Answers the browser with a short HTML page either way.
    pub fn wait_for_redirect(&self, listener: TcpListener) -> Result<String> {
        let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .context("Failed to read request")?;

        // Format: GET /oauth2/callback?code=AUTH_CODE&scope=... HTTP/1.1
        let target = request_line.split_whitespace().nth(1).unwrap_or("/");
        let result = parse_redirect_target(target);

        let (status, body) = match &result {
            Ok(_) => (
                "200 OK",
                "Authorization successful. You may close this window.",
            ),
            Err(_) => ("400 Bad Request", "Authorization failed. Please try again."),
        };

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h3>{}</h3></body></html>",
            status, body
        );
        stream.write_all(response.as_bytes()).ok();

        result
    }
}

/// Extract the authorization code from a redirect request target
///
/// Fails with the OAuth `error` parameter when Google reports one, or when
/// no code is present.
pub fn parse_redirect_target(target: &str) -> Result<String> {
    let url = url::Url::parse("http://localhost")
        .and_then(|base| base.join(target))
        .context("Malformed redirect request")?;

    let mut code = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" if !value.is_empty() => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(err) = error {
        anyhow::bail!("OAuth error: {}", err);
    }
    code.context("No authorization code received")
}

/// Read the `email` claim from an id token without verifying its signature
fn email_from_id_token(id_token: &str) -> Option<String> {
    let payload = id_token.split('.').nth(1)?;
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: IdTokenClaims = serde_json::from_slice(&bytes).ok()?;
    claims.email.filter(|e| !e.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> OAuthClient {
        OAuthClient::new(
            GoogleCredentials {
                client_id: "client-123.apps.googleusercontent.com".to_string(),
                client_secret: "secret".to_string(),
                redirect_uri: "http://localhost:8000/oauth2/callback".to_string(),
            },
            ureq::Agent::new_with_defaults(),
        )
    }

    #[test]
    fn test_authorization_url() {
        let url = test_client().authorization_url(Some("xyz"));

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=client-123.apps.googleusercontent.com"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A8000%2Foauth2%2Fcallback"
        ));
        assert!(url.contains("gmail.modify"));
        assert!(url.ends_with("&state=xyz"));
    }

    #[test]
    fn test_parse_redirect_target_code() {
        let code = parse_redirect_target("/oauth2/callback?code=4%2F0Abc&scope=email").unwrap();
        assert_eq!(code, "4/0Abc");
    }

    #[test]
    fn test_parse_redirect_target_error() {
        let err = parse_redirect_target("/oauth2/callback?error=access_denied").unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[test]
    fn test_parse_redirect_target_missing_code() {
        assert!(parse_redirect_target("/oauth2/callback").is_err());
        assert!(parse_redirect_target("/oauth2/callback?code=").is_err());
    }

    #[test]
    fn test_email_from_id_token() {
        let claims = BASE64_URL_SAFE_NO_PAD.encode(r#"{"email":"ops@example.com","sub":"1"}"#);
        let token = format!("eyJhbGciOiJSUzI1NiJ9.{}.sig", claims);
        assert_eq!(
            email_from_id_token(&token),
            Some("ops@example.com".to_string())
        );
    }

    #[test]
    fn test_email_from_malformed_id_token() {
        assert_eq!(email_from_id_token("not-a-jwt"), None);
        assert_eq!(email_from_id_token("a.!!!.c"), None);
    }

    #[test]
    fn test_refresh_without_refresh_token() {
        let credential = UserCredential::new("u", None, None, "expired", 0);
        let err = test_client().refresh(&credential).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CredentialError>(),
            Some(CredentialError::MissingRefreshToken(_))
        ));
    }
}
