//! Authenticated Open Payments client.
//!
//! `OpenPaymentsApi` is the capability surface the payment flows depend on.
//! `AuthenticatedClient` implements it over HTTP, signing every call to an
//! authorization or resource server with the client wallet's Ed25519 key.

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use open_payments_types::*;
use reqwest::{header, Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::config::ClientIdentity;
use crate::error::ApiError;
use crate::signer::{RequestParts, RequestSigner};

/// Calls the payment flows make against Open Payments servers.
/// Each method is one independent network call that may fail.
#[async_trait]
pub trait OpenPaymentsApi: Send + Sync {
    async fn get_wallet_address(&self, url: &str) -> Result<WalletAddress, ApiError>;

    async fn request_grant(
        &self,
        auth_server: &str,
        request: &GrantRequest,
    ) -> Result<Grant, ApiError>;

    async fn continue_grant(&self, continuation: &GrantContinuation) -> Result<Grant, ApiError>;

    /// Exchange `token` for its successor. `Ok(None)` when the server answered
    /// without issuing a new token.
    async fn rotate_token(&self, token: &AccessToken) -> Result<Option<AccessToken>, ApiError>;

    async fn create_incoming_payment(
        &self,
        resource_server: &str,
        access_token: &str,
        request: &CreateIncomingPaymentRequest,
    ) -> Result<IncomingPayment, ApiError>;

    async fn create_quote(
        &self,
        resource_server: &str,
        access_token: &str,
        request: &CreateQuoteRequest,
    ) -> Result<Quote, ApiError>;

    async fn create_outgoing_payment(
        &self,
        resource_server: &str,
        access_token: &str,
        request: &CreateOutgoingPaymentRequest,
    ) -> Result<OutgoingPayment, ApiError>;
}

/// Payment pointers (`$wallet.example/alice`) are shorthand for https URLs
pub fn normalize_wallet_address_url(url: &str) -> String {
    let trimmed = url.trim();
    match trimmed.strip_prefix('$') {
        Some(rest) => format!("https://{}", rest),
        None => trimmed.to_string(),
    }
}

/// Short, log-safe prefix of a bearer credential
pub(crate) fn token_hint(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{}…", prefix)
}

fn resource_url(resource_server: &str, collection: &str) -> String {
    format!("{}/{}", resource_server.trim_end_matches('/'), collection)
}

fn truncate_error(s: &str) -> &str {
    match s.char_indices().nth(200) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Grant request body as it goes on the wire
#[derive(Serialize)]
struct GrantRequestBody<'a> {
    #[serde(flatten)]
    request: &'a GrantRequest,
    client: &'a str,
}

pub struct AuthenticatedClient {
    http: Client,
    identity: ClientIdentity,
    signer: RequestSigner,
}

impl AuthenticatedClient {
    pub fn new(
        identity: ClientIdentity,
        key: SigningKey,
        timeout: Duration,
    ) -> Result<Self, String> {
        let http = Client::builder()
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        let signer = RequestSigner::new(key, identity.key_id.clone());

        log::info!(
            "[OPEN_PAYMENTS] Client initialized for {} (key id {})",
            identity.wallet_address_url,
            signer.key_id()
        );

        Ok(Self {
            http,
            identity,
            signer,
        })
    }

    /// Send a signed request and decode the JSON response
    async fn send_signed<R: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        access_token: Option<&str>,
        body: Option<Vec<u8>>,
    ) -> Result<R, ApiError> {
        // Sign exactly the URI reqwest will send
        let target = url::Url::parse(url).map_err(|e| ApiError::Transport {
            url: url.to_string(),
            message: format!("invalid URL: {}", e),
        })?;
        let authorization = access_token.map(|t| format!("GNAP {}", t));

        let signed = self.signer.sign(RequestParts {
            method: method.as_str(),
            target_uri: target.as_str(),
            authorization: authorization.as_deref(),
            body: body.as_deref(),
        });

        let mut request = self
            .http
            .request(method.clone(), target.clone())
            .header(header::ACCEPT, "application/json")
            .header("Signature", &signed.signature)
            .header("Signature-Input", &signed.signature_input);

        if let Some(auth) = &authorization {
            request = request.header(header::AUTHORIZATION, auth);
        }
        if let Some(digest) = &signed.content_digest {
            request = request.header("Content-Digest", digest);
        }
        if let Some(bytes) = body {
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(bytes);
        }

        log::debug!("[OPEN_PAYMENTS] {} {}", method, target);

        let response = request.send().await.map_err(|e| ApiError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        decode_response(url, response).await
    }

    async fn post_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        url: &str,
        access_token: Option<&str>,
        body: &B,
    ) -> Result<R, ApiError> {
        let bytes = serde_json::to_vec(body).map_err(|e| ApiError::Signing {
            url: url.to_string(),
            message: format!("failed to encode body: {}", e),
        })?;
        self.send_signed(Method::POST, url, access_token, Some(bytes))
            .await
    }
}

async fn decode_response<R: DeserializeOwned>(
    url: &str,
    response: reqwest::Response,
) -> Result<R, ApiError> {
    let status = response.status();
    let body = response.text().await.map_err(|e| ApiError::Transport {
        url: url.to_string(),
        message: format!("failed to read response: {}", e),
    })?;

    if !status.is_success() {
        return Err(ApiError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: truncate_error(&body).to_string(),
        });
    }

    serde_json::from_str(&body).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

fn classify(url: &str, response: GrantResponse) -> Result<Grant, ApiError> {
    response.into_grant().map_err(|message| ApiError::Decode {
        url: url.to_string(),
        message,
    })
}

#[async_trait]
impl OpenPaymentsApi for AuthenticatedClient {
    async fn get_wallet_address(&self, url: &str) -> Result<WalletAddress, ApiError> {
        let url = normalize_wallet_address_url(url);
        let response = self
            .http
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;

        decode_response(&url, response).await
    }

    async fn request_grant(
        &self,
        auth_server: &str,
        request: &GrantRequest,
    ) -> Result<Grant, ApiError> {
        let body = GrantRequestBody {
            request,
            client: &self.identity.wallet_address_url,
        };
        let response: GrantResponse = self.post_json(auth_server, None, &body).await?;
        classify(auth_server, response)
    }

    async fn continue_grant(&self, continuation: &GrantContinuation) -> Result<Grant, ApiError> {
        let response: GrantResponse = self
            .post_json(
                &continuation.uri,
                Some(&continuation.access_token.value),
                &serde_json::json!({}),
            )
            .await?;
        classify(&continuation.uri, response)
    }

    async fn rotate_token(&self, token: &AccessToken) -> Result<Option<AccessToken>, ApiError> {
        let response: RotateTokenResponse = self
            .send_signed(Method::POST, &token.manage, Some(&token.value), None)
            .await?;
        Ok(response.access_token)
    }

    async fn create_incoming_payment(
        &self,
        resource_server: &str,
        access_token: &str,
        request: &CreateIncomingPaymentRequest,
    ) -> Result<IncomingPayment, ApiError> {
        let url = resource_url(resource_server, "incoming-payments");
        self.post_json(&url, Some(access_token), request).await
    }

    async fn create_quote(
        &self,
        resource_server: &str,
        access_token: &str,
        request: &CreateQuoteRequest,
    ) -> Result<Quote, ApiError> {
        let url = resource_url(resource_server, "quotes");
        self.post_json(&url, Some(access_token), request).await
    }

    async fn create_outgoing_payment(
        &self,
        resource_server: &str,
        access_token: &str,
        request: &CreateOutgoingPaymentRequest,
    ) -> Result<OutgoingPayment, ApiError> {
        let url = resource_url(resource_server, "outgoing-payments");
        self.post_json(&url, Some(access_token), request).await
    }
}
