//! Recurring transfer executor.
//!
//! After the user approved the outgoing-payment grant, one payment is created
//! with the finalized token, then a fixed number of rotate-and-pay cycles run.
//! A failed transfer is recorded and skipped; a failed rotation ends the batch
//! early. Whatever was paid is returned either way.

use open_payments_types::*;
use std::sync::Arc;

use crate::client::{token_hint, OpenPaymentsApi};
use crate::error::{IterationError, PaymentError};
use crate::grants::GrantNegotiator;

/// The single token allowed to act at any moment. Rotation consumes it, so a
/// superseded token cannot be presented again.
#[derive(Debug)]
pub struct ActiveCredential {
    token: AccessToken,
}

impl ActiveCredential {
    pub fn new(token: AccessToken) -> Self {
        Self { token }
    }

    pub fn value(&self) -> &str {
        &self.token.value
    }

    /// Exchange this credential for its successor through its management URL
    pub async fn rotate(self, api: &dyn OpenPaymentsApi) -> Result<ActiveCredential, String> {
        match api.rotate_token(&self.token).await {
            Ok(Some(next)) => Ok(ActiveCredential::new(next)),
            Ok(None) => Err("rotation response did not include an access token".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Result of one recurring run
#[derive(Debug, Default)]
pub struct RecurringReport {
    /// Successful payments, in creation order
    pub payments: Vec<OutgoingPayment>,
    /// Isolated failures, in iteration order
    pub failures: Vec<IterationError>,
}

impl RecurringReport {
    /// True when rotation failed and later cycles were skipped
    pub fn stopped_early(&self) -> bool {
        self.failures
            .iter()
            .any(|f| matches!(f, IterationError::RotationExhausted { .. }))
    }
}

pub struct RecurringTransfers {
    api: Arc<dyn OpenPaymentsApi>,
    negotiator: GrantNegotiator,
    additional_payments: u32,
}

impl RecurringTransfers {
    pub fn new(api: Arc<dyn OpenPaymentsApi>, additional_payments: u32) -> Self {
        Self {
            negotiator: GrantNegotiator::new(api.clone()),
            api,
            additional_payments,
        }
    }

    pub async fn execute(
        &self,
        sender_url: &str,
        quote_id: &str,
        continuation: &GrantContinuation,
    ) -> Result<RecurringReport, PaymentError> {
        let sender = self.api.get_wallet_address(sender_url).await?;
        let grant = self.negotiator.continue_grant(continuation).await?;

        let request = CreateOutgoingPaymentRequest {
            wallet_address: sender.id.clone(),
            quote_id: quote_id.to_string(),
        };

        let mut credential = ActiveCredential::new(grant.access_token);
        let first = self
            .api
            .create_outgoing_payment(&sender.resource_server, credential.value(), &request)
            .await?;
        log::info!("[RECURRING] Created initial payment {}", first.id);

        let mut report = RecurringReport {
            payments: vec![first],
            failures: Vec::new(),
        };

        for iteration in 1..=self.additional_payments {
            credential = match credential.rotate(self.api.as_ref()).await {
                Ok(next) => next,
                Err(reason) => {
                    log::error!(
                        "[RECURRING] Token rotation failed before payment {}: {}",
                        iteration,
                        reason
                    );
                    report
                        .failures
                        .push(IterationError::RotationExhausted { iteration, reason });
                    break;
                }
            };
            log::info!("[RECURRING] Rotated to token {}", token_hint(credential.value()));

            match self
                .api
                .create_outgoing_payment(&sender.resource_server, credential.value(), &request)
                .await
            {
                Ok(payment) => {
                    log::info!(
                        "[RECURRING] Created additional payment {} ({}/{})",
                        payment.id,
                        iteration,
                        self.additional_payments
                    );
                    report.payments.push(payment);
                }
                Err(source) => {
                    log::error!(
                        "[RECURRING] Error creating additional payment {}: {}",
                        iteration,
                        source
                    );
                    report
                        .failures
                        .push(IterationError::TransferCreation { iteration, source });
                }
            }
        }

        log::info!(
            "[RECURRING] Finished: {} payments, {} failures",
            report.payments.len(),
            report.failures.len()
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::testing::{self, ScriptedApi};

    const SENDER: &str = "https://wallet.example/alice";

    fn continuation() -> GrantContinuation {
        GrantContinuation::new(testing::CONTINUE_URI, testing::CONTINUE_TOKEN)
    }

    async fn run(api: &Arc<ScriptedApi>, additional: u32) -> Result<RecurringReport, PaymentError> {
        RecurringTransfers::new(api.clone(), additional)
            .execute(SENDER, testing::QUOTE_ID, &continuation())
            .await
    }

    #[tokio::test]
    async fn test_all_transfers_succeed() {
        let api = Arc::new(ScriptedApi::new());

        let report = run(&api, 4).await.unwrap();
        assert_eq!(report.payments.len(), 5);
        assert!(report.failures.is_empty());
        assert!(!report.stopped_early());

        let calls = api.calls();
        assert_eq!(calls.continuations, 1);
        assert_eq!(calls.rotations, 4);
        assert_eq!(calls.outgoing_payments, 5);
    }

    #[tokio::test]
    async fn test_each_transfer_uses_the_newest_token() {
        let api = Arc::new(ScriptedApi::new());

        run(&api, 4).await.unwrap();

        let used: Vec<String> = api
            .resource_log
            .lock()
            .unwrap()
            .iter()
            .map(|(rs, token)| {
                assert_eq!(rs, &format!("{}/rs", SENDER));
                token.clone()
            })
            .collect();
        assert_eq!(
            used,
            vec![
                "outgoing-token-0",
                "outgoing-token-1",
                "outgoing-token-2",
                "outgoing-token-3",
                "outgoing-token-4",
            ]
        );

        // Every rotation presents the token issued by the previous one
        let rotated = api.rotation_log.lock().unwrap().clone();
        assert_eq!(
            rotated,
            vec![
                "outgoing-token-0",
                "outgoing-token-1",
                "outgoing-token-2",
                "outgoing-token-3",
            ]
        );
    }

    #[tokio::test]
    async fn test_rotation_failure_stops_early() {
        for k in 1..=4u32 {
            let api = Arc::new(ScriptedApi::new());
            for _ in 1..k {
                api.push_rotation(Ok(Some(testing::access_token("fresh"))));
            }
            api.push_rotation(Err(testing::server_error("https://auth.example/token", 500)));

            let report = run(&api, 4).await.unwrap();
            assert_eq!(report.payments.len() as u32, k, "rotation failing at {}", k);
            assert!(report.stopped_early());
            assert_eq!(report.failures.len(), 1);
            assert_eq!(report.failures[0].iteration(), k);

            let calls = api.calls();
            assert_eq!(calls.rotations as u32, k);
            assert_eq!(calls.outgoing_payments as u32, k);
        }
    }

    #[tokio::test]
    async fn test_rotation_without_token_stops_early() {
        let api = Arc::new(ScriptedApi::new());
        api.push_rotation(Ok(Some(testing::access_token("fresh"))));
        api.push_rotation(Ok(None));

        let report = run(&api, 4).await.unwrap();
        assert_eq!(report.payments.len(), 2);
        assert!(matches!(
            report.failures[0],
            IterationError::RotationExhausted { iteration: 2, .. }
        ));
        assert_eq!(api.calls().rotations, 2);
    }

    #[tokio::test]
    async fn test_transfer_failure_is_isolated() {
        let api = Arc::new(ScriptedApi::new());
        api.push_outgoing(Ok(testing::outgoing_payment("p0")));
        api.push_outgoing(Ok(testing::outgoing_payment("p1")));
        api.push_outgoing(Err(testing::server_error("https://rs.example", 500)));
        api.push_outgoing(Ok(testing::outgoing_payment("p3")));
        api.push_outgoing(Ok(testing::outgoing_payment("p4")));

        let report = run(&api, 4).await.unwrap();
        let ids: Vec<&str> = report.payments.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p1", "p3", "p4"]);
        assert!(!report.stopped_early());
        assert!(matches!(
            report.failures[0],
            IterationError::TransferCreation { iteration: 2, .. }
        ));
        assert_eq!(api.calls().rotations, 4);
        assert_eq!(api.calls().outgoing_payments, 5);
    }

    #[tokio::test]
    async fn test_still_pending_grant_attempts_no_transfers() {
        let api = Arc::new(ScriptedApi::new());
        api.push_continue(Ok(testing::pending_grant()));

        let err = run(&api, 4).await.unwrap_err();
        assert!(matches!(err, PaymentError::GrantNotFinalized));

        let calls = api.calls();
        assert_eq!(calls.outgoing_payments, 0);
        assert_eq!(calls.rotations, 0);
    }

    #[tokio::test]
    async fn test_rejected_grant_surfaces_unauthorized() {
        let api = Arc::new(ScriptedApi::new());
        api.push_continue(Err(ApiError::Status {
            url: testing::CONTINUE_URI.to_string(),
            status: 401,
            body: String::new(),
        }));

        let err = run(&api, 4).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(api.calls().outgoing_payments, 0);
    }

    #[tokio::test]
    async fn test_first_transfer_failure_aborts() {
        let api = Arc::new(ScriptedApi::new());
        api.push_outgoing(Err(testing::server_error("https://rs.example", 403)));

        let err = run(&api, 4).await.unwrap_err();
        assert!(matches!(err, PaymentError::Api(_)));
        assert_eq!(api.calls().rotations, 0);
    }

    #[tokio::test]
    async fn test_configurable_cycle_count() {
        let api = Arc::new(ScriptedApi::new());
        let report = run(&api, 0).await.unwrap();
        assert_eq!(report.payments.len(), 1);
        assert_eq!(api.calls().rotations, 0);

        let api = Arc::new(ScriptedApi::new());
        let report = run(&api, 7).await.unwrap();
        assert_eq!(report.payments.len(), 8);
    }
}
