//! Payment setup pipeline.
//!
//! Resolves both wallets, creates the receiver's incoming payment and the
//! sender's quote, then opens the interactive outgoing-payment grant the user
//! has to approve. Each step feeds the next; any failure aborts and leaves
//! already-created resources to expire on their own.

use chrono::{Duration, SecondsFormat, Utc};
use open_payments_types::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

use crate::client::OpenPaymentsApi;
use crate::config::RecurringSchedule;
use crate::error::PaymentError;
use crate::grants::{self, GrantNegotiator};

pub const INCOMING_PAYMENT_DESCRIPTION: &str = "Payment from demo";
pub const INCOMING_PAYMENT_TTL_MINUTES: i64 = 10;
pub const QUOTE_METHOD: &str = "ilp";

/// Output of a successful setup: what the caller needs to send the user to
/// consent and to finish the payment afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPayment {
    pub quote: Quote,
    pub continuation: GrantContinuation,
    pub interact: Interaction,
}

impl PendingPayment {
    pub fn handles(&self) -> PendingPaymentHandles {
        PendingPaymentHandles {
            quote_id: self.quote.id.clone(),
            continue_uri: self.continuation.uri.clone(),
            continue_access_token: self.continuation.access_token.value.clone(),
            interact_redirect_url: self.interact.redirect.clone(),
        }
    }
}

/// Parse a decimal amount in major units
pub fn parse_amount(amount: &str) -> Result<Decimal, PaymentError> {
    Decimal::from_str(amount.trim())
        .map_err(|_| PaymentError::validation(format!("amount '{}' is not a number", amount)))
}

/// Convert a decimal amount in major units to minor units at `scale`.
///
/// `"10"` at scale 2 is `"1000"`. Amounts that are not positive, or that carry
/// more fractional digits than the asset supports, are rejected.
pub fn scale_amount(amount: &str, scale: u8) -> Result<String, PaymentError> {
    let value = parse_amount(amount)?;
    if value <= Decimal::ZERO {
        return Err(PaymentError::validation(format!(
            "amount '{}' must be greater than zero",
            amount
        )));
    }

    let mut scaled = value;
    for _ in 0..scale {
        scaled = scaled.checked_mul(Decimal::TEN).ok_or_else(|| {
            PaymentError::validation(format!("amount '{}' is too large", amount))
        })?;
    }

    if !scaled.fract().is_zero() {
        return Err(PaymentError::validation(format!(
            "amount '{}' has more precision than asset scale {}",
            amount, scale
        )));
    }

    Ok(scaled.trunc().normalize().to_string())
}

pub struct PaymentSetup {
    api: Arc<dyn OpenPaymentsApi>,
    negotiator: GrantNegotiator,
    schedule: RecurringSchedule,
}

impl PaymentSetup {
    pub fn new(api: Arc<dyn OpenPaymentsApi>, schedule: RecurringSchedule) -> Self {
        Self {
            negotiator: GrantNegotiator::new(api.clone()),
            api,
            schedule,
        }
    }

    pub async fn setup_payment(
        &self,
        sender_url: &str,
        receiver_url: &str,
        amount: &str,
    ) -> Result<PendingPayment, PaymentError> {
        // 1. Both wallets, concurrently
        let (receiver, sender) = tokio::try_join!(
            self.api.get_wallet_address(receiver_url),
            self.api.get_wallet_address(sender_url),
        )?;
        log::info!(
            "[SETUP] Resolved wallets: receiver {} ({} scale {}), sender {}",
            receiver.id,
            receiver.asset_code,
            receiver.asset_scale,
            sender.id
        );

        let value = scale_amount(amount, receiver.asset_scale)?;

        // 2. Incoming payment grant on the receiver's auth server
        let incoming_grant = self
            .negotiator
            .request_finalized(&receiver.auth_server, &grants::incoming_payment_scope())
            .await?;

        // 3. Incoming payment, expiring on its own if the flow is abandoned
        let expires_at = (Utc::now() + Duration::minutes(INCOMING_PAYMENT_TTL_MINUTES))
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let incoming_payment = self
            .api
            .create_incoming_payment(
                &receiver.resource_server,
                &incoming_grant.access_token.value,
                &CreateIncomingPaymentRequest {
                    wallet_address: receiver.id.clone(),
                    incoming_amount: Amount {
                        value,
                        asset_code: receiver.asset_code.clone(),
                        asset_scale: receiver.asset_scale,
                    },
                    metadata: PaymentMetadata {
                        description: INCOMING_PAYMENT_DESCRIPTION.to_string(),
                    },
                    expires_at,
                },
            )
            .await?;
        log::info!("[SETUP] Created incoming payment {}", incoming_payment.id);

        // 4. Quote grant on the sender's auth server
        let quote_grant = self
            .negotiator
            .request_finalized(&sender.auth_server, &grants::quote_scope())
            .await?;

        // 5. Quote against the incoming payment
        let quote = self
            .api
            .create_quote(
                &sender.resource_server,
                &quote_grant.access_token.value,
                &CreateQuoteRequest {
                    method: QUOTE_METHOD.to_string(),
                    wallet_address: sender.id.clone(),
                    receiver: incoming_payment.id.clone(),
                },
            )
            .await?;
        log::info!(
            "[SETUP] Created quote {} (debit {} {}, receive {} {})",
            quote.id,
            quote.debit_amount.value,
            quote.debit_amount.asset_code,
            quote.receive_amount.value,
            quote.receive_amount.asset_code
        );

        // 6. Interactive outgoing payment grant, bounded by the quote
        let interval = self.schedule.interval.to_iso8601();
        let scope = grants::outgoing_payment_scope(&sender, &quote, &interval);
        let (continuation, interact) = self
            .negotiator
            .request_pending(&sender.auth_server, &scope)
            .await?;

        Ok(PendingPayment {
            quote,
            continuation,
            interact,
        })
    }
}
