//! x402-style payment gate.
//!
//! Game routes sit behind this middleware. The handshake: a bare POST
//! gets a 402 with machine-readable payment requirements, the client
//! pays and retries with an `X-PAYMENT` header, the configured verifier
//! checks it, and the request proceeds with a [`VerifiedPayment`] in
//! its extensions. Dev mode skips the handshake entirely so local
//! clients can hit the games with no wallet at all.

mod onchain;
pub mod settle;
mod verifier;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::AppState;

pub use settle::{record_game, SettleError};
pub use verifier::{Verifier, VerifyOutcome, DEV_HEADER_PREFIX, TX_HEADER_PREFIX};

pub const PAYMENT_HEADER: &str = "x-payment";
pub const PAYMENT_SIGNATURE_HEADER: &str = "payment-signature";

/// Game bodies are tiny JSON objects; anything bigger is hostile.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentMode {
    /// No verification at all.
    Dev,
    /// 402 handshake enforced, dev headers accepted.
    Demo,
    /// 402 handshake enforced against real token transfers.
    Onchain,
}

/// Attached to the request once the gate is satisfied. Handlers read
/// the payer address for history attribution and the tx reference to
/// echo back as `betTxHash`.
#[derive(Clone, Debug)]
pub struct VerifiedPayment {
    pub amount: f64,
    pub tx_reference: Option<String>,
    pub payer_address: Option<String>,
    pub mode: PaymentMode,
}

/// One entry of the 402 `paymentRequirements` array, shaped per the
/// x402 "exact" scheme.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirement {
    pub scheme: &'static str,
    pub network: String,
    pub max_amount_required: String,
    pub resource: String,
    pub description: String,
    pub mime_type: &'static str,
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    pub asset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// The modes are exclusive: on-chain beats demo beats dev.
pub fn resolve_mode(config: &crate::config::PaymentConfig) -> PaymentMode {
    if config.onchain_mode {
        PaymentMode::Onchain
    } else if config.demo_mode || !config.dev_mode {
        PaymentMode::Demo
    } else {
        PaymentMode::Dev
    }
}

/// Middleware guarding the game routes. Non-POST traffic passes
/// through untouched.
pub async fn payment_gate(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::POST {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return validation_error("INVALID_BET", "Invalid or missing bet amount");
        }
    };
    let bet = extract_bet(&bytes);

    let config = &state.config.payment;
    let mode = resolve_mode(config);

    if mode == PaymentMode::Dev {
        let mut request = Request::from_parts(parts, Body::from(bytes));
        request.extensions_mut().insert(VerifiedPayment {
            amount: bet.unwrap_or(0.0),
            tx_reference: None,
            payer_address: None,
            mode,
        });
        return next.run(request).await;
    }

    let Some(bet) = bet else {
        return validation_error("INVALID_BET", "Invalid or missing bet amount");
    };

    let Some(header) = payment_header(&parts.headers) else {
        return payment_required(config, mode, bet, parts.uri.path());
    };

    let verifier = match mode {
        PaymentMode::Onchain => Verifier::Onchain,
        _ => Verifier::HeaderAccept,
    };
    let outcome = verifier.verify(&state.rpc, &header, config, bet).await;
    if !outcome.valid {
        debug!(reason = ?outcome.error, "payment verification failed");
        return (
            StatusCode::PAYMENT_REQUIRED,
            Json(json!({
                "error": "Payment verification failed",
                "details": outcome.error,
            })),
        )
            .into_response();
    }

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(VerifiedPayment {
        amount: bet,
        tx_reference: outcome.tx_reference,
        payer_address: outcome.payer_address,
        mode,
    });
    next.run(request).await
}

/// Positive numeric `bet` field of the JSON body, if any.
fn extract_bet(body: &[u8]) -> Option<f64> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let bet = value.get("bet")?.as_f64()?;
    (bet.is_finite() && bet > 0.0).then_some(bet)
}

fn payment_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(PAYMENT_HEADER)
        .or_else(|| headers.get(PAYMENT_SIGNATURE_HEADER))
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn validation_error(code: &str, message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": { "code": code, "message": message } })),
    )
        .into_response()
}

fn payment_required(
    config: &crate::config::PaymentConfig,
    mode: PaymentMode,
    bet: f64,
    resource: &str,
) -> Response {
    let extra = (mode == PaymentMode::Onchain).then(|| {
        json!({
            "mode": "onchain",
            "usdcAddress": config.usdc_address,
            "payoutAddress": config.payout_address,
            "rpcUrl": config.rpc_url,
        })
    });
    let requirement = PaymentRequirement {
        scheme: "exact",
        network: config.network.clone(),
        max_amount_required: format!("{bet:.6}"),
        resource: resource.to_string(),
        description: config.description.clone(),
        mime_type: "application/json",
        pay_to: config.pay_to.clone(),
        max_timeout_seconds: 60,
        asset: config.asset.clone(),
        extra,
    };
    let message = if mode == PaymentMode::Onchain {
        format!(
            "Transfer {bet} USDC to {}. Include tx hash as X-PAYMENT: x402:tx:<hash>",
            config.pay_to
        )
    } else {
        format!(
            "This endpoint requires a payment of {bet} {}. Include an X-PAYMENT header with your x402 payment payload.",
            config.asset
        )
    };
    (
        StatusCode::PAYMENT_REQUIRED,
        Json(json!({
            "error": "Payment Required",
            "paymentRequirements": [requirement],
            "facilitatorUrl": config.facilitator_url,
            "message": message,
        })),
    )
        .into_response()
}
