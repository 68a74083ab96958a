//! Shared types for the recurring payments service and the Open Payments
//! resources it drives.
//!
//! Wire types mirror the Open Payments JSON (camelCase for resources, snake_case
//! for GNAP grant bodies). Endpoint request/response bodies for the service's own
//! HTTP surface live at the bottom of this file.

use serde::{Deserialize, Serialize};

// =====================================================
// Wallet Addresses
// =====================================================

/// A resolved wallet address document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAddress {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_name: Option<String>,
    pub asset_code: String,
    pub asset_scale: u8,
    pub auth_server: String,
    pub resource_server: String,
}

/// An amount in minor units of the given asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amount {
    pub value: String,
    pub asset_code: String,
    pub asset_scale: u8,
}

// =====================================================
// Grant Requests
// =====================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessType {
    IncomingPayment,
    OutgoingPayment,
    Quote,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::IncomingPayment => "incoming-payment",
            AccessType::OutgoingPayment => "outgoing-payment",
            AccessType::Quote => "quote",
        }
    }
}

impl std::fmt::Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessAction {
    Create,
    Complete,
    Read,
    ReadAll,
    List,
    ListAll,
}

/// Spending limits attached to an outgoing-payment access item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debit_amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_amount: Option<Amount>,
    /// ISO-8601 repeating interval, e.g. `R20/2024-10-01T11:06:00Z/PT1M`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

/// One entry of a requested access scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessItem {
    #[serde(rename = "type")]
    pub access_type: AccessType,
    pub actions: Vec<AccessAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<PaymentLimits>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenRequest {
    pub access: Vec<AccessItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractStart {
    Redirect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractRequest {
    pub start: Vec<InteractStart>,
}

/// The scope half of a GNAP grant request. The client identity is added by the
/// authenticated client when the request goes on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantRequest {
    pub access_token: AccessTokenRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interact: Option<InteractRequest>,
}

impl GrantRequest {
    pub fn new(access: Vec<AccessItem>) -> Self {
        Self {
            access_token: AccessTokenRequest { access },
            interact: None,
        }
    }

    /// Ask the authorization server to start a redirect-based interaction
    pub fn with_redirect_interaction(mut self) -> Self {
        self.interact = Some(InteractRequest {
            start: vec![InteractStart::Redirect],
        });
        self
    }

    pub fn is_interactive(&self) -> bool {
        self.interact
            .as_ref()
            .map(|i| !i.start.is_empty())
            .unwrap_or(false)
    }

    /// Comma-separated resource types, for diagnostics
    pub fn scope_label(&self) -> String {
        self.access_token
            .access
            .iter()
            .map(|a| a.access_type.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

// =====================================================
// Grant Responses
// =====================================================

/// An access token issued by the authorization server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    pub value: String,
    /// Management URL used to rotate or revoke this token
    pub manage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinueToken {
    pub value: String,
}

/// Handle needed to finalize a pending grant after interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantContinuation {
    pub access_token: ContinueToken,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<u64>,
}

impl GrantContinuation {
    pub fn new(uri: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            access_token: ContinueToken {
                value: token.into(),
            },
            uri: uri.into(),
            wait: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub redirect: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish: Option<String>,
}

/// Raw GNAP grant response, before classification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrantResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<AccessToken>,
    #[serde(rename = "continue", default, skip_serializing_if = "Option::is_none")]
    pub continuation: Option<GrantContinuation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interact: Option<Interaction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingGrant {
    pub continuation: GrantContinuation,
    /// Absent when a continuation is polled before the user finished interacting
    pub interact: Option<Interaction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedGrant {
    pub access_token: AccessToken,
    pub continuation: Option<GrantContinuation>,
}

/// A classified grant
#[derive(Debug, Clone, PartialEq)]
pub enum Grant {
    Pending(PendingGrant),
    Finalized(FinalizedGrant),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantKind {
    Pending,
    Finalized,
}

impl std::fmt::Display for GrantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrantKind::Pending => f.write_str("pending"),
            GrantKind::Finalized => f.write_str("finalized"),
        }
    }
}

impl Grant {
    pub fn kind(&self) -> GrantKind {
        match self {
            Grant::Pending(_) => GrantKind::Pending,
            Grant::Finalized(_) => GrantKind::Finalized,
        }
    }
}

impl GrantResponse {
    /// Classify the response: an issued access token means the grant is usable,
    /// a bare continuation means it still waits on interaction.
    pub fn into_grant(self) -> Result<Grant, String> {
        match (self.access_token, self.continuation) {
            (Some(access_token), continuation) => Ok(Grant::Finalized(FinalizedGrant {
                access_token,
                continuation,
            })),
            (None, Some(continuation)) => Ok(Grant::Pending(PendingGrant {
                continuation,
                interact: self.interact,
            })),
            (None, None) => {
                Err("grant response has neither an access token nor a continuation".to_string())
            }
        }
    }
}

/// Body of a token rotation response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RotateTokenResponse {
    #[serde(default)]
    pub access_token: Option<AccessToken>,
}

// =====================================================
// Payment Resources
// =====================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIncomingPaymentRequest {
    pub wallet_address: String,
    pub incoming_amount: Amount,
    pub metadata: PaymentMetadata,
    pub expires_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingPayment {
    pub id: String,
    pub wallet_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoming_amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_amount: Option<Amount>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuoteRequest {
    pub method: String,
    pub wallet_address: String,
    pub receiver: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: String,
    pub wallet_address: String,
    pub receiver: String,
    pub debit_amount: Amount,
    pub receive_amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Fields this service does not interpret, kept for pass-through
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutgoingPaymentRequest {
    pub wallet_address: String,
    pub quote_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingPayment {
    pub id: String,
    pub wallet_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debit_amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_amount: Option<Amount>,
    #[serde(default)]
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Upstream fields such as `grantSpentDebitAmount` or `client`, returned
    /// to the caller unchanged
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// =====================================================
// Service Request Types
// =====================================================

/// Amounts arrive either as JSON numbers or as strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(serde_json::Number),
    Text(String),
}

impl AmountInput {
    /// Trimmed decimal text, `None` when blank
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            AmountInput::Number(n) => n.to_string(),
            AmountInput::Text(s) => s.trim().to_string(),
        };
        if text.is_empty() { None } else { Some(text) }
    }
}

// POST /create-payment
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub sender_url: Option<String>,
    pub receiver_url: Option<String>,
    pub amount: Option<AmountInput>,
}

// POST /finish-payment
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishPaymentRequest {
    pub quote_id: Option<String>,
    pub continue_uri: Option<String>,
    pub continue_access_token: Option<String>,
    pub sending_wallet_address_url: Option<String>,
}

// =====================================================
// Service Response Types
// =====================================================

/// Everything the caller needs to send the user to consent and finish later
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PendingPaymentHandles {
    pub quote_id: String,
    pub continue_uri: String,
    pub continue_access_token: String,
    pub interact_redirect_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePaymentResponse {
    pub message: String,
    pub response: PendingPaymentHandles,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishPaymentResponse {
    pub outgoing_payments: Vec<OutgoingPayment>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

// =====================================================
// Service Status
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub uptime_secs: u64,
    pub client_wallet_address: String,
    pub additional_payments: u32,
    pub interval: String,
}
