//! Scripted in-memory `OpenPaymentsApi` for unit tests.
//!
//! Queued responses are served in order; when a queue runs dry the double
//! answers with a plausible success so happy paths need no scripting.

use async_trait::async_trait;
use open_payments_types::*;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::client::OpenPaymentsApi;
use crate::error::ApiError;

pub const CONTINUE_URI: &str = "https://auth.example/continue/abc";
pub const CONTINUE_TOKEN: &str = "continue-token";
pub const REDIRECT_URL: &str = "https://auth.example/interact/abc";
pub const INCOMING_PAYMENT_ID: &str = "https://rs.example/incoming-payments/1";
pub const QUOTE_ID: &str = "https://rs.example/quotes/1";

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CallCounts {
    pub wallet_lookups: usize,
    pub grant_requests: usize,
    pub continuations: usize,
    pub rotations: usize,
    pub incoming_payments: usize,
    pub quotes: usize,
    pub outgoing_payments: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.wallet_lookups
            + self.grant_requests
            + self.continuations
            + self.rotations
            + self.incoming_payments
            + self.quotes
            + self.outgoing_payments
    }
}

#[derive(Default)]
pub struct ScriptedApi {
    failing_wallets: Mutex<HashMap<String, u16>>,
    grants: Mutex<VecDeque<Result<Grant, ApiError>>>,
    continues: Mutex<VecDeque<Result<Grant, ApiError>>>,
    rotations: Mutex<VecDeque<Result<Option<AccessToken>, ApiError>>>,
    outgoing: Mutex<VecDeque<Result<OutgoingPayment, ApiError>>>,
    calls: Mutex<CallCounts>,
    /// Auth server and scope of every grant request, in order
    pub grant_log: Mutex<Vec<(String, GrantRequest)>>,
    /// Resource server and token of every resource-creation call, in order
    pub resource_log: Mutex<Vec<(String, String)>>,
    /// Token presented to each rotation, in order
    pub rotation_log: Mutex<Vec<String>>,
    pub incoming_requests: Mutex<Vec<CreateIncomingPaymentRequest>>,
    pub quote_requests: Mutex<Vec<CreateQuoteRequest>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> CallCounts {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_wallet(&self, url: &str, status: u16) {
        self.failing_wallets
            .lock()
            .unwrap()
            .insert(url.to_string(), status);
    }

    pub fn push_grant(&self, grant: Result<Grant, ApiError>) {
        self.grants.lock().unwrap().push_back(grant);
    }

    pub fn push_continue(&self, grant: Result<Grant, ApiError>) {
        self.continues.lock().unwrap().push_back(grant);
    }

    pub fn push_rotation(&self, token: Result<Option<AccessToken>, ApiError>) {
        self.rotations.lock().unwrap().push_back(token);
    }

    pub fn push_outgoing(&self, payment: Result<OutgoingPayment, ApiError>) {
        self.outgoing.lock().unwrap().push_back(payment);
    }

    /// Script the three grants of a successful setup
    pub fn script_setup_grants(&self) {
        self.push_grant(Ok(finalized_grant("incoming-token")));
        self.push_grant(Ok(finalized_grant("quote-token")));
        self.push_grant(Ok(pending_grant()));
    }
}

pub fn server_error(url: &str, status: u16) -> ApiError {
    ApiError::Status {
        url: url.to_string(),
        status,
        body: "scripted failure".to_string(),
    }
}

pub fn wallet(url: &str) -> WalletAddress {
    WalletAddress {
        id: url.to_string(),
        public_name: None,
        asset_code: "USD".to_string(),
        asset_scale: 2,
        auth_server: format!("{}/auth", url),
        resource_server: format!("{}/rs", url),
    }
}

pub fn access_token(value: &str) -> AccessToken {
    AccessToken {
        value: value.to_string(),
        manage: format!("https://auth.example/token/{}", value),
        expires_in: Some(600),
    }
}

pub fn finalized_grant(token: &str) -> Grant {
    Grant::Finalized(FinalizedGrant {
        access_token: access_token(token),
        continuation: None,
    })
}

pub fn pending_grant() -> Grant {
    Grant::Pending(PendingGrant {
        continuation: GrantContinuation::new(CONTINUE_URI, CONTINUE_TOKEN),
        interact: Some(Interaction {
            redirect: REDIRECT_URL.to_string(),
            finish: None,
        }),
    })
}

pub fn quote(id: &str) -> Quote {
    Quote {
        id: id.to_string(),
        wallet_address: "https://wallet.example/alice".to_string(),
        receiver: INCOMING_PAYMENT_ID.to_string(),
        debit_amount: Amount {
            value: "1010".to_string(),
            asset_code: "USD".to_string(),
            asset_scale: 2,
        },
        receive_amount: Amount {
            value: "1000".to_string(),
            asset_code: "USD".to_string(),
            asset_scale: 2,
        },
        method: Some("ilp".to_string()),
        expires_at: None,
        created_at: None,
        extra: serde_json::Map::new(),
    }
}

pub fn outgoing_payment(id: &str) -> OutgoingPayment {
    OutgoingPayment {
        id: id.to_string(),
        wallet_address: "https://wallet.example/alice".to_string(),
        quote_id: Some(QUOTE_ID.to_string()),
        receiver: Some(INCOMING_PAYMENT_ID.to_string()),
        debit_amount: None,
        receive_amount: None,
        sent_amount: None,
        failed: false,
        metadata: None,
        created_at: None,
        extra: serde_json::Map::new(),
    }
}

#[async_trait]
impl OpenPaymentsApi for ScriptedApi {
    async fn get_wallet_address(&self, url: &str) -> Result<WalletAddress, ApiError> {
        self.calls.lock().unwrap().wallet_lookups += 1;
        if let Some(status) = self.failing_wallets.lock().unwrap().get(url) {
            return Err(server_error(url, *status));
        }
        Ok(wallet(url))
    }

    async fn request_grant(
        &self,
        auth_server: &str,
        request: &GrantRequest,
    ) -> Result<Grant, ApiError> {
        self.calls.lock().unwrap().grant_requests += 1;
        self.grant_log
            .lock()
            .unwrap()
            .push((auth_server.to_string(), request.clone()));
        self.grants
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(server_error(auth_server, 500)))
    }

    async fn continue_grant(&self, continuation: &GrantContinuation) -> Result<Grant, ApiError> {
        self.calls.lock().unwrap().continuations += 1;
        self.continues
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(finalized_grant("outgoing-token-0")))
            .map_err(|e| match e {
                ApiError::Status { status, body, .. } => ApiError::Status {
                    url: continuation.uri.clone(),
                    status,
                    body,
                },
                other => other,
            })
    }

    async fn rotate_token(&self, token: &AccessToken) -> Result<Option<AccessToken>, ApiError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.rotations += 1;
            calls.rotations
        };
        self.rotation_log.lock().unwrap().push(token.value.clone());
        self.rotations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Some(access_token(&format!("outgoing-token-{}", n)))))
    }

    async fn create_incoming_payment(
        &self,
        resource_server: &str,
        access_token: &str,
        request: &CreateIncomingPaymentRequest,
    ) -> Result<IncomingPayment, ApiError> {
        self.calls.lock().unwrap().incoming_payments += 1;
        self.resource_log
            .lock()
            .unwrap()
            .push((resource_server.to_string(), access_token.to_string()));
        self.incoming_requests.lock().unwrap().push(request.clone());
        Ok(IncomingPayment {
            id: INCOMING_PAYMENT_ID.to_string(),
            wallet_address: request.wallet_address.clone(),
            incoming_amount: Some(request.incoming_amount.clone()),
            received_amount: None,
            completed: false,
            expires_at: Some(request.expires_at.clone()),
            metadata: None,
            created_at: None,
        })
    }

    async fn create_quote(
        &self,
        resource_server: &str,
        access_token: &str,
        request: &CreateQuoteRequest,
    ) -> Result<Quote, ApiError> {
        self.calls.lock().unwrap().quotes += 1;
        self.resource_log
            .lock()
            .unwrap()
            .push((resource_server.to_string(), access_token.to_string()));
        self.quote_requests.lock().unwrap().push(request.clone());
        let mut q = quote(QUOTE_ID);
        q.wallet_address = request.wallet_address.clone();
        q.receiver = request.receiver.clone();
        Ok(q)
    }

    async fn create_outgoing_payment(
        &self,
        resource_server: &str,
        access_token: &str,
        _request: &CreateOutgoingPaymentRequest,
    ) -> Result<OutgoingPayment, ApiError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.outgoing_payments += 1;
            calls.outgoing_payments
        };
        self.resource_log
            .lock()
            .unwrap()
            .push((resource_server.to_string(), access_token.to_string()));
        self.outgoing.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(outgoing_payment(&format!(
                "https://rs.example/outgoing-payments/{}",
                n
            )))
        })
    }
}
