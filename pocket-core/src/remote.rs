//! Remote side of the authorization protocol.
//!
//! Pocket's authorization is a three-legged exchange:
//!
//! 1. `POST /v3/oauth/request` issues a request token for a redirect target
//! 2. The user approves the request token at `/auth/authorize` in a browser
//! 3. `POST /v3/oauth/authorize` trades the approved request token for an
//!    access token and the user's name
//!
//! Requests and responses are form encoded. Failures are reported through
//! the `X-Error-Code` and `X-Error` response headers.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

use crate::model::{Authorization, ConsumerKey, RequestToken};

/// Service error code for a request token the user declined.
pub const ERROR_CODE_USER_REJECTED: u32 = 158;

/// Service error code for a request token that has not been approved (yet).
pub const ERROR_CODE_NOT_AUTHORIZED: u32 = 185;

/// Error type for remote authorization calls.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The service could not be reached or failed internally.
    #[error("network error: {message}")]
    Network { message: String },

    /// The service declined the request.
    #[error("rejected by service (HTTP {status}, code {code:?}): {message}")]
    Rejected {
        status: u16,
        code: Option<u32>,
        message: String,
    },

    /// The user has not completed the browser step.
    #[error("authorization still pending: {message}")]
    Pending { message: String },

    /// The service answered with something we could not use.
    #[error("invalid response from service: {message}")]
    InvalidResponse { message: String },

    /// A URL could not be built from the configured base.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// The three operations of the authorization protocol.
///
/// [`PocketAuthClient`] talks to the real service; tests substitute their own.
#[async_trait]
pub trait AuthorizationApi: Send + Sync {
    /// Obtain a request token bound to `redirect_uri`.
    async fn obtain_request_token(
        &self,
        consumer_key: &ConsumerKey,
        redirect_uri: &str,
    ) -> Result<RequestToken, RemoteError>;

    /// Build the URL the user visits to approve `request_token`.
    ///
    /// Pure string construction, no network access.
    fn authorization_url(
        &self,
        request_token: &RequestToken,
        redirect_uri: &str,
    ) -> Result<Url, RemoteError>;

    /// Exchange an approved request token for an access token.
    async fn obtain_access_token(
        &self,
        consumer_key: &ConsumerKey,
        request_token: &RequestToken,
    ) -> Result<Authorization, RemoteError>;
}

/// HTTP implementation of [`AuthorizationApi`] for the Pocket service.
#[derive(Debug, Clone)]
pub struct PocketAuthClient {
    base_url: Url,
    http_client: reqwest::Client,
}

impl PocketAuthClient {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, RemoteError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            http_client: reqwest::Client::new(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        Ok(self.base_url.join(path)?)
    }

    /// POST a form and return the decoded form response.
    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<HashMap<String, String>, RemoteError> {
        let url = self.endpoint(path)?;
        tracing::debug!("POST {}", url);

        let response = self
            .http_client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| RemoteError::Network {
                message: format!("request to {} failed: {}", path, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response.headers()));
        }

        let body = response.text().await.map_err(|e| RemoteError::Network {
            message: format!("failed to read response from {}: {}", path, e),
        })?;

        Ok(url::form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect())
    }
}

/// Classify a non-success response.
fn error_from_response(status: StatusCode, headers: &reqwest::header::HeaderMap) -> RemoteError {
    let code = headers
        .get("x-error-code")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u32>().ok());
    let message = headers
        .get("x-error")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

    if status.is_server_error() {
        return RemoteError::Network {
            message: format!("HTTP {}: {}", status.as_u16(), message),
        };
    }

    if status == StatusCode::FORBIDDEN && code == Some(ERROR_CODE_NOT_AUTHORIZED) {
        return RemoteError::Pending { message };
    }

    RemoteError::Rejected {
        status: status.as_u16(),
        code,
        message,
    }
}

fn required_field(fields: &mut HashMap<String, String>, name: &str) -> Result<String, RemoteError> {
    fields
        .remove(name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RemoteError::InvalidResponse {
            message: format!("missing {} in response", name),
        })
}

#[async_trait]
impl AuthorizationApi for PocketAuthClient {
    async fn obtain_request_token(
        &self,
        consumer_key: &ConsumerKey,
        redirect_uri: &str,
    ) -> Result<RequestToken, RemoteError> {
        let mut fields = self
            .post_form(
                "/v3/oauth/request",
                &[
                    ("consumer_key", consumer_key.expose()),
                    ("redirect_uri", redirect_uri),
                ],
            )
            .await?;

        let code = required_field(&mut fields, "code")?;
        tracing::debug!("Obtained request token");

        Ok(RequestToken::new(code, redirect_uri))
    }

    fn authorization_url(
        &self,
        request_token: &RequestToken,
        redirect_uri: &str,
    ) -> Result<Url, RemoteError> {
        let mut url = self.endpoint("/auth/authorize")?;
        url.query_pairs_mut()
            .append_pair("request_token", request_token.code.expose())
            .append_pair("redirect_uri", redirect_uri);
        Ok(url)
    }

    async fn obtain_access_token(
        &self,
        consumer_key: &ConsumerKey,
        request_token: &RequestToken,
    ) -> Result<Authorization, RemoteError> {
        let mut fields = self
            .post_form(
                "/v3/oauth/authorize",
                &[
                    ("consumer_key", consumer_key.expose()),
                    ("code", request_token.code.expose()),
                ],
            )
            .await?;

        let access_token = required_field(&mut fields, "access_token")?;
        let username = required_field(&mut fields, "username")?;

        Ok(Authorization::new(access_token, username))
    }
}
