//! RFC 9421 HTTP Message Signatures with Ed25519, as Open Payments servers expect.
//!
//! Every call to an authorization or resource server is signed with the client
//! wallet's key so the server can look the key up by `keyid` in the wallet's JWKS.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey};

const SIGNATURE_LABEL: &str = "sig1";

/// Headers produced by signing one request
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    /// `Signature-Input`, e.g. `sig1=("@method" "@target-uri");keyid="k";created=1700000000`
    pub signature_input: String,
    /// `Signature`, e.g. `sig1=:<base64 of 64-byte Ed25519 signature>:`
    pub signature: String,
    /// `Content-Digest` (only when a body is present), `sha-512=:<base64>:`
    pub content_digest: Option<String>,
}

/// The parts of a request covered by the signature
#[derive(Debug, Clone, Copy)]
pub struct RequestParts<'a> {
    pub method: &'a str,
    pub target_uri: &'a str,
    /// Full `Authorization` header value, e.g. `GNAP abc`
    pub authorization: Option<&'a str>,
    /// JSON body bytes
    pub body: Option<&'a [u8]>,
}

/// Compute Content-Digest for an HTTP body using SHA-512 (RFC 9530)
pub fn content_digest_sha512(body: &[u8]) -> String {
    use sha2::{Digest, Sha512};

    let hash = Sha512::digest(body);
    format!("sha-512=:{}:", BASE64.encode(hash))
}

pub struct RequestSigner {
    key: SigningKey,
    key_id: String,
}

impl RequestSigner {
    pub fn new(key: SigningKey, key_id: impl Into<String>) -> Self {
        Self {
            key,
            key_id: key_id.into(),
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn sign(&self, parts: RequestParts<'_>) -> SignedHeaders {
        self.sign_at(parts, Utc::now().timestamp())
    }

    /// Sign with an explicit `created` timestamp
    pub fn sign_at(&self, parts: RequestParts<'_>, created: i64) -> SignedHeaders {
        let content_digest = parts.body.map(content_digest_sha512);
        let (params, base) = signature_base(&parts, content_digest.as_deref(), &self.key_id, created);

        let signature = self.key.sign(base.as_bytes());

        log::debug!(
            "[SIGNER] Signed {} {} ({} byte base)",
            parts.method,
            parts.target_uri,
            base.len()
        );

        SignedHeaders {
            signature_input: format!("{}={}", SIGNATURE_LABEL, params),
            signature: format!("{}=:{}:", SIGNATURE_LABEL, BASE64.encode(signature.to_bytes())),
            content_digest,
        }
    }
}

/// Build the `@signature-params` value and the full signature base.
pub(crate) fn signature_base(
    parts: &RequestParts<'_>,
    content_digest: Option<&str>,
    key_id: &str,
    created: i64,
) -> (String, String) {
    let mut lines: Vec<(&str, String)> = vec![
        ("@method", parts.method.to_uppercase()),
        ("@target-uri", parts.target_uri.to_string()),
    ];
    if let Some(auth) = parts.authorization {
        lines.push(("authorization", auth.to_string()));
    }
    if let (Some(body), Some(digest)) = (parts.body, content_digest) {
        lines.push(("content-digest", digest.to_string()));
        lines.push(("content-length", body.len().to_string()));
        lines.push(("content-type", "application/json".to_string()));
    }

    let components = lines
        .iter()
        .map(|(name, _)| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(" ");
    let params = format!("({});keyid=\"{}\";created={}", components, key_id, created);

    let mut base = lines
        .iter()
        .map(|(name, value)| format!("\"{}\": {}", name, value))
        .collect::<Vec<_>>();
    base.push(format!("\"@signature-params\": {}", params));

    (params, base.join("\n"))
}
