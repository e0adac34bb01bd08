use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::jwt::AuthError;

/// Client for the hosted auth REST API (`{project}/auth/v1`).
pub struct AuthClient {
    http_client: Client,
    base_url: String,
    anon_key: String,
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Account as reported by the auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A signed-in session.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: AccountUser,
}

#[derive(Debug)]
pub enum SignUpOutcome {
    /// Email confirmation is disabled; the user is signed in.
    SignedIn(Session),
    /// A confirmation link was emailed.
    ConfirmationSent(AccountUser),
}

/// Sign-up responds with either a session or a bare user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(Session),
    User(AccountUser),
}

/// Error bodies vary between endpoints.
#[derive(Debug, Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description.or(self.msg).or(self.message)
    }
}

impl AuthClient {
    pub fn new(project_url: &str, anon_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: format!("{}/auth/v1", project_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        let url = format!("{}/signup", self.base_url);
        let response = self.post_credentials(&url, email, password).await?;

        match response.json::<SignUpResponse>().await {
            Ok(SignUpResponse::Session(session)) => Ok(SignUpOutcome::SignedIn(session)),
            Ok(SignUpResponse::User(user)) => Ok(SignUpOutcome::ConfirmationSent(user)),
            Err(e) => Err(AuthError::Upstream(e.to_string())),
        }
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let url = format!("{}/token?grant_type=password", self.base_url);
        let response = self.post_credentials(&url, email, password).await?;

        response
            .json::<Session>()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))
    }

    /// Revoke the session behind `access_token`.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let url = format!("{}/logout", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Upstream(format!("logout returned {}", response.status())));
        }
        Ok(())
    }

    async fn post_credentials(&self, url: &str, email: &str, password: &str) -> Result<reqwest::Response, AuthError> {
        tracing::debug!("Calling auth service: {}", url);

        let response = self
            .http_client
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&Credentials { email, password })
            .send()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            let message = body.into_message().unwrap_or_else(|| status.to_string());
            return Err(AuthError::Rejected(message));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Upstream(format!("{}: {}", status, body)));
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session_json() -> serde_json::Value {
        serde_json::json!({
            "access_token": "access",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh",
            "user": { "id": "user-1", "email": "a@example.com" }
        })
    }

    #[tokio::test]
    async fn test_sign_in_returns_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_json()))
            .mount(&server)
            .await;

        let client = AuthClient::new(&server.uri(), "anon");
        let session = client.sign_in_with_password("a@example.com", "pw").await.unwrap();
        assert_eq!(session.access_token, "access");
        assert_eq!(session.user.id, "user-1");
        assert_eq!(session.expires_in, 3600);
    }

    #[tokio::test]
    async fn test_sign_in_surfaces_rejection_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let client = AuthClient::new(&server.uri(), "anon");
        match client.sign_in_with_password("a@example.com", "wrong").await {
            Err(AuthError::Rejected(message)) => assert_eq!(message, "Invalid login credentials"),
            other => panic!("unexpected result: {:?}", other.map(|s| s.user.id)),
        }
    }

    #[tokio::test]
    async fn test_sign_up_pending_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "user-2",
                "email": "b@example.com",
                "confirmation_sent_at": "2024-01-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        let client = AuthClient::new(&format!("{}/", server.uri()), "anon");
        match client.sign_up("b@example.com", "pw").await.unwrap() {
            SignUpOutcome::ConfirmationSent(user) => assert_eq!(user.id, "user-2"),
            SignUpOutcome::SignedIn(_) => panic!("expected confirmation"),
        }
    }

    #[tokio::test]
    async fn test_sign_up_autoconfirmed_returns_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_json()))
            .mount(&server)
            .await;

        let client = AuthClient::new(&server.uri(), "anon");
        assert!(matches!(
            client.sign_up("a@example.com", "pw").await.unwrap(),
            SignUpOutcome::SignedIn(_)
        ));
    }

    #[tokio::test]
    async fn test_sign_out_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .and(header("authorization", "Bearer access"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = AuthClient::new(&server.uri(), "anon");
        client.sign_out("access").await.unwrap();
    }
}
