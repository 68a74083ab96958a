//! Axum route handlers for the recurring payments API.

use crate::client::OpenPaymentsApi;
use crate::config::RecurringSchedule;
use crate::error::PaymentError;
use crate::recurring::RecurringTransfers;
use crate::setup::{self, PaymentSetup};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use open_payments_types::*;
use std::sync::Arc;
use std::time::Instant;

pub const CREATE_REQUIRED_FIELDS: &str = "sender_url, receiver_url, and amount are required.";
pub const FINISH_REQUIRED_FIELDS: &str =
    "quoteId, continueUri, continueAccessToken, and sendingWalletAddressUrl are required.";
pub const CONSENT_MESSAGE: &str = "Proceed with user interaction to finalize the payment";
pub const GRANT_REJECTED: &str = "Grant not accepted or expired";

pub struct AppState {
    pub setup: PaymentSetup,
    pub recurring: RecurringTransfers,
    pub client_wallet_address: String,
    pub schedule: RecurringSchedule,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        api: Arc<dyn OpenPaymentsApi>,
        client_wallet_address: String,
        schedule: RecurringSchedule,
    ) -> Self {
        Self {
            setup: PaymentSetup::new(api.clone(), schedule.clone()),
            recurring: RecurringTransfers::new(api, schedule.additional_payments),
            client_wallet_address,
            schedule,
            start_time: Instant::now(),
        }
    }
}

/// Trimmed field value, `None` when missing or blank
fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn log_rejection(rejection: &JsonRejection) {
    log::debug!("[ROUTES] Unreadable request body: {}", rejection.body_text());
}

fn plain_text(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, msg.into()).into_response()
}

// POST /create-payment
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = body.inspect_err(log_rejection) else {
        return plain_text(StatusCode::BAD_REQUEST, CREATE_REQUIRED_FIELDS);
    };
    let amount = req.amount.as_ref().and_then(AmountInput::as_text);
    let (Some(sender_url), Some(receiver_url), Some(amount)) = (
        present(&req.sender_url),
        present(&req.receiver_url),
        amount,
    ) else {
        return plain_text(StatusCode::BAD_REQUEST, CREATE_REQUIRED_FIELDS);
    };

    // Reject unusable amounts before touching any wallet. A numeric zero counts
    // as absent; a textual one is a present but invalid amount.
    let numeric = matches!(req.amount, Some(AmountInput::Number(_)));
    match setup::parse_amount(&amount) {
        Ok(value) if value.is_zero() && numeric => {
            return plain_text(StatusCode::BAD_REQUEST, CREATE_REQUIRED_FIELDS);
        }
        Ok(value) if value.is_zero() || value.is_sign_negative() => {
            return plain_text(
                StatusCode::BAD_REQUEST,
                format!("amount '{}' must be greater than zero", amount),
            );
        }
        Ok(_) => {}
        Err(e) => return plain_text(StatusCode::BAD_REQUEST, e.to_string()),
    }

    match state
        .setup
        .setup_payment(sender_url, receiver_url, &amount)
        .await
    {
        Ok(pending) => {
            let response = pending.handles();
            log::info!(
                "[ROUTES] Payment set up, quote {} awaiting consent at {}",
                response.quote_id,
                response.interact_redirect_url
            );
            (
                StatusCode::OK,
                Json(CreatePaymentResponse {
                    message: CONSENT_MESSAGE.to_string(),
                    response,
                }),
            )
                .into_response()
        }
        Err(PaymentError::Validation(msg)) => plain_text(StatusCode::BAD_REQUEST, msg),
        Err(e) => {
            log::error!("[ROUTES] Error creating payment: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
    }
}

// POST /finish-payment
pub async fn finish_payment(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FinishPaymentRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = body.inspect_err(log_rejection) else {
        return plain_text(StatusCode::BAD_REQUEST, FINISH_REQUIRED_FIELDS);
    };
    let (Some(quote_id), Some(continue_uri), Some(continue_token), Some(sender_url)) = (
        present(&req.quote_id),
        present(&req.continue_uri),
        present(&req.continue_access_token),
        present(&req.sending_wallet_address_url),
    ) else {
        return plain_text(StatusCode::BAD_REQUEST, FINISH_REQUIRED_FIELDS);
    };

    let continuation = GrantContinuation::new(continue_uri, continue_token);

    match state
        .recurring
        .execute(sender_url, quote_id, &continuation)
        .await
    {
        Ok(report) => {
            for failure in &report.failures {
                log::warn!("[ROUTES] Cycle {}: {}", failure.iteration(), failure);
            }
            if report.stopped_early() {
                log::warn!(
                    "[ROUTES] Quote {} stopped early after {} payments",
                    quote_id,
                    report.payments.len()
                );
            }
            (
                StatusCode::OK,
                Json(FinishPaymentResponse {
                    outgoing_payments: report.payments,
                }),
            )
                .into_response()
        }
        Err(e) if e.is_unauthorized() => {
            log::warn!("[ROUTES] Grant rejected: {}", e);
            (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(GRANT_REJECTED))).into_response()
        }
        Err(e) => {
            log::error!("[ROUTES] Error finishing payment: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::with_details(
                    "Internal server error",
                    e.to_string(),
                )),
            )
                .into_response()
        }
    }
}

// GET /status
pub async fn status(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ServiceStatus>) {
    let status = ServiceStatus {
        running: true,
        uptime_secs: state.start_time.elapsed().as_secs(),
        client_wallet_address: state.client_wallet_address.clone(),
        additional_payments: state.schedule.additional_payments,
        interval: state.schedule.interval.to_iso8601(),
    };
    (StatusCode::OK, Json(status))
}
