//! Grant negotiation: requesting, classifying and continuing GNAP grants.
//!
//! Interactive scopes must come back pending and non-interactive scopes must come
//! back finalized. Anything else means the authorization server and this service
//! disagree about the protocol, and the request is abandoned.

use open_payments_types::*;
use std::sync::Arc;

use crate::client::{token_hint, OpenPaymentsApi};
use crate::error::PaymentError;

pub struct GrantNegotiator {
    api: Arc<dyn OpenPaymentsApi>,
}

impl GrantNegotiator {
    pub fn new(api: Arc<dyn OpenPaymentsApi>) -> Self {
        Self { api }
    }

    /// Request a grant and check it has the interactivity the scope asked for
    pub async fn request_grant(
        &self,
        auth_server: &str,
        request: &GrantRequest,
    ) -> Result<Grant, PaymentError> {
        let scope = request.scope_label();
        let expected = if request.is_interactive() {
            GrantKind::Pending
        } else {
            GrantKind::Finalized
        };

        log::info!("[GRANT] Requesting {} grant for {} at {}", expected, scope, auth_server);

        let grant = self.api.request_grant(auth_server, request).await?;
        if grant.kind() != expected {
            log::warn!(
                "[GRANT] Expected {} grant for {}, got {}",
                expected,
                scope,
                grant.kind()
            );
            return Err(PaymentError::UnexpectedGrantState {
                scope,
                expected,
                actual: grant.kind(),
            });
        }

        Ok(grant)
    }

    /// Request a grant that must be usable immediately
    pub async fn request_finalized(
        &self,
        auth_server: &str,
        request: &GrantRequest,
    ) -> Result<FinalizedGrant, PaymentError> {
        match self.request_grant(auth_server, request).await? {
            Grant::Finalized(grant) => {
                log::info!(
                    "[GRANT] Got {} token {}",
                    request.scope_label(),
                    token_hint(&grant.access_token.value)
                );
                Ok(grant)
            }
            Grant::Pending(_) => Err(PaymentError::UnexpectedGrantState {
                scope: request.scope_label(),
                expected: GrantKind::Finalized,
                actual: GrantKind::Pending,
            }),
        }
    }

    /// Request a grant that needs user interaction; returns its continuation
    /// handle and redirect.
    pub async fn request_pending(
        &self,
        auth_server: &str,
        request: &GrantRequest,
    ) -> Result<(GrantContinuation, Interaction), PaymentError> {
        match self.request_grant(auth_server, request).await? {
            Grant::Pending(PendingGrant {
                continuation,
                interact: Some(interact),
            }) => {
                log::info!(
                    "[GRANT] Pending {} grant, interaction at {}",
                    request.scope_label(),
                    interact.redirect
                );
                Ok((continuation, interact))
            }
            Grant::Pending(PendingGrant { interact: None, .. }) => {
                Err(PaymentError::MissingInteraction {
                    scope: request.scope_label(),
                })
            }
            Grant::Finalized(_) => Err(PaymentError::UnexpectedGrantState {
                scope: request.scope_label(),
                expected: GrantKind::Pending,
                actual: GrantKind::Finalized,
            }),
        }
    }

    /// Finalize a pending grant after the user interacted. A grant that is still
    /// pending (never approved, or already consumed) is `GrantNotFinalized`.
    pub async fn continue_grant(
        &self,
        continuation: &GrantContinuation,
    ) -> Result<FinalizedGrant, PaymentError> {
        log::info!("[GRANT] Continuing grant at {}", continuation.uri);

        match self.api.continue_grant(continuation).await? {
            Grant::Finalized(grant) => Ok(grant),
            Grant::Pending(_) => {
                log::warn!("[GRANT] Continuation at {} is still pending", continuation.uri);
                Err(PaymentError::GrantNotFinalized)
            }
        }
    }
}

// =====================================================
// Access Scopes
// =====================================================

/// Non-interactive scope for creating the receiver's incoming payment
pub fn incoming_payment_scope() -> GrantRequest {
    GrantRequest::new(vec![AccessItem {
        access_type: AccessType::IncomingPayment,
        actions: vec![AccessAction::Read, AccessAction::Complete, AccessAction::Create],
        identifier: None,
        limits: None,
    }])
}

/// Non-interactive scope for quoting on the sender's wallet
pub fn quote_scope() -> GrantRequest {
    GrantRequest::new(vec![AccessItem {
        access_type: AccessType::Quote,
        actions: vec![AccessAction::Read, AccessAction::Create],
        identifier: None,
        limits: None,
    }])
}

/// Interactive scope for the recurring outgoing payments, capped by the quote
/// amounts and the repetition interval.
pub fn outgoing_payment_scope(sender: &WalletAddress, quote: &Quote, interval: &str) -> GrantRequest {
    GrantRequest::new(vec![AccessItem {
        access_type: AccessType::OutgoingPayment,
        actions: vec![
            AccessAction::List,
            AccessAction::ListAll,
            AccessAction::Read,
            AccessAction::ReadAll,
            AccessAction::Create,
        ],
        identifier: Some(sender.id.clone()),
        limits: Some(PaymentLimits {
            debit_amount: Some(quote.debit_amount.clone()),
            receive_amount: Some(quote.receive_amount.clone()),
            interval: Some(interval.to_string()),
        }),
    }])
    .with_redirect_interaction()
}
