//! [`PartyApi`] over HTTP using `reqwest`.

use std::time::Duration;

use partygate_protocol::{
    paths, AuthenticateRequest, AuthenticateResponse, Codec, JsonCodec,
    LogoutResponse, PartyStatus, SessionToken, SESSION_TOKEN_HEADER,
};
use reqwest::{RequestBuilder, Response};

use crate::{AuthReply, PartyApi, TransportError};

/// Talks to a Partygate server at `base_url` (e.g. `http://127.0.0.1:3000`).
///
/// Cloning is cheap; the underlying `reqwest::Client` pools connections.
#[derive(Debug, Clone)]
pub struct HttpPartyApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPartyApi {
    /// Per-request timeout used by [`HttpPartyApi::new`].
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// # Errors
    /// [`TransportError::InvalidUrl`] if `base_url` is not http(s), or
    /// [`TransportError::Network`] if the client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Self::DEFAULT_TIMEOUT)
            .build()
            .map_err(TransportError::Network)?;
        Self::with_client(client, base_url)
    }

    /// Uses a caller-configured client.
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
    ) -> Result<Self, TransportError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(TransportError::InvalidUrl(base_url));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        token: Option<&SessionToken>,
    ) -> Result<Response, TransportError> {
        let request = match token {
            Some(token) => request.header(SESSION_TOKEN_HEADER, token.as_str()),
            None => request,
        };
        request.send().await.map_err(TransportError::Network)
    }
}

async fn unexpected(response: Response) -> TransportError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    TransportError::UnexpectedStatus { status, body }
}

impl HttpPartyApi {
    /// Posts to the authenticate endpoint and classifies the answer by its
    /// body. An undecodable body is a protocol error after a success status
    /// and an unexpected status otherwise.
    async fn post_authenticate(
        &self,
        body: &AuthenticateRequest,
        token: Option<&SessionToken>,
    ) -> Result<AuthReply, TransportError> {
        let request = self.client.post(self.url(paths::AUTHENTICATE)).json(body);
        let response = self.send(request, token).await?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(TransportError::Decode)?;
        let decoded: AuthenticateResponse = match JsonCodec.decode(&bytes) {
            Ok(decoded) => decoded,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(TransportError::UnexpectedStatus {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                });
            }
        };

        tracing::debug!(
            status = status.as_u16(),
            refresh = body.refresh,
            role = ?decoded.role,
            total = decoded.occupancy.total_users,
            "authenticate response"
        );
        Ok(AuthReply::classify(status.as_u16(), decoded))
    }
}

impl PartyApi for HttpPartyApi {
    async fn authenticate(
        &self,
        passkey: &str,
        token: Option<&SessionToken>,
    ) -> Result<AuthReply, TransportError> {
        self.post_authenticate(&AuthenticateRequest::new(passkey), token)
            .await
    }

    async fn refresh(
        &self,
        passkey: &str,
        token: &SessionToken,
    ) -> Result<AuthReply, TransportError> {
        self.post_authenticate(&AuthenticateRequest::refresh(passkey), Some(token))
            .await
    }

    async fn status(
        &self,
        token: Option<&SessionToken>,
    ) -> Result<PartyStatus, TransportError> {
        let request = self.client.get(self.url(paths::STATUS));
        let response = self.send(request, token).await?;
        if !response.status().is_success() {
            return Err(unexpected(response).await);
        }
        response.json().await.map_err(TransportError::Decode)
    }

    async fn logout(
        &self,
        token: &SessionToken,
    ) -> Result<LogoutResponse, TransportError> {
        let request = self.client.post(self.url(paths::LOGOUT));
        let response = self.send(request, Some(token)).await?;
        if !response.status().is_success() {
            return Err(unexpected(response).await);
        }
        response.json().await.map_err(TransportError::Decode)
    }
}
