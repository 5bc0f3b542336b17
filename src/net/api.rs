//! REST client for the marketplace API's auth endpoints.
//!
//! SYSTEM CONTEXT
//! ==============
//! This is the server-trust boundary: the auth store asks it whether a cached
//! session is still honored, trades credentials for a session, revokes
//! sessions on logout, and mints one-time WebSocket tickets for the realtime
//! channel.
//!
//! ERROR HANDLING
//! ==============
//! `verify_session` distinguishes "the server rejected this session"
//! (`Ok(false)`) from "the server could not be asked" (`Err`). The store maps
//! the former to logged-out and the latter to unverified.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::HttpTimeouts;
use crate::session::Session;

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request could not be sent or the response could not be read.
    #[error("API request failed: {0}")]
    Request(String),

    /// The server answered with an unexpected status.
    #[error("API response error: status {status}")]
    Status { status: u16, body: String },

    /// The server refused the supplied credentials.
    #[error("credentials rejected")]
    Unauthorized,

    /// The response body did not match the expected shape.
    #[error("API response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// TRAIT
// =============================================================================

/// Server operations the session runtime depends on.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Ask the server whether `session` is still valid.
    async fn verify_session(&self, session: &Session) -> Result<bool, ApiError>;

    /// Trade credentials for a new session.
    async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError>;

    /// Revoke `session` on the server.
    async fn logout(&self, session: &Session) -> Result<(), ApiError>;

    /// Mint a one-time ticket for a WebSocket upgrade.
    async fn create_ws_ticket(&self, session: &Session) -> Result<String, ApiError>;
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TicketResponse {
    ticket: String,
}

fn session_endpoint(base_url: &str) -> String {
    format!("{base_url}/api/auth/session")
}

fn login_endpoint(base_url: &str) -> String {
    format!("{base_url}/api/auth/login")
}

fn logout_endpoint(base_url: &str) -> String {
    format!("{base_url}/api/auth/logout")
}

fn ws_ticket_endpoint(base_url: &str) -> String {
    format!("{base_url}/api/auth/ws-ticket")
}

/// Map a session-check status to validity. `None` means the status is not
/// an answer about the session at all.
fn session_validity(status: StatusCode) -> Option<bool> {
    if status.is_success() {
        Some(true)
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Some(false)
    } else {
        None
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// `AuthApi` over HTTP via reqwest.
pub struct HttpAuthApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAuthApi {
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(base_url: impl Into<String>, timeouts: HttpTimeouts) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { http, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

async fn error_for_status(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ApiError::Status { status, body }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn verify_session(&self, session: &Session) -> Result<bool, ApiError> {
        let response = self
            .http
            .get(session_endpoint(&self.base_url))
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        match session_validity(response.status()) {
            Some(valid) => Ok(valid),
            None => Err(error_for_status(response).await),
        }
    }

    async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let response = self
            .http
            .post(login_endpoint(&self.base_url))
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            return Err(error_for_status(response).await);
        }
        let text = response.text().await.map_err(|e| ApiError::Request(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn logout(&self, session: &Session) -> Result<(), ApiError> {
        let response = self
            .http
            .post(logout_endpoint(&self.base_url))
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        // An already-revoked session is the outcome logout wanted.
        if response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            Err(error_for_status(response).await)
        }
    }

    async fn create_ws_ticket(&self, session: &Session) -> Result<String, ApiError> {
        let response = self
            .http
            .post(ws_ticket_endpoint(&self.base_url))
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }
        let body: TicketResponse = response.json().await.map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(body.ticket)
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
