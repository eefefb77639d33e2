//! Route handlers.
//!
//! Game handlers parse the raw body themselves instead of using the
//! `Json` extractor so each missing or malformed field gets its own
//! error code, and so the body the payment gate already buffered is
//! reused as-is.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{SecondsFormat, Utc};
use commonware_utils::hex;
use rand::{rngs::OsRng, RngCore};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use clawsino_types::casino::{
    BLACKJACK_MAX_BET, BLACKJACK_MIN_BET, COINFLIP_MAX_BET, COINFLIP_MIN_BET, DICE_MAX_BET,
    DICE_MAX_TARGET, DICE_MIN_BET, DICE_MIN_TARGET,
};
use clawsino_types::{
    payout_multiplier, play_blackjack, play_coinflip, play_dice, BlackjackOutcome,
    BlackjackRequest, CoinSide, CoinflipRequest, DicePrediction, DiceRequest,
};

use crate::config::is_hex_address;
use crate::history::GameRecord;
use crate::payment::{settle, PaymentMode, VerifiedPayment};
use crate::AppState;

pub const MALFORMED_REQUEST: &str = "MALFORMED_REQUEST";
pub const INVALID_CHOICE: &str = "INVALID_CHOICE";
pub const INVALID_BET: &str = "INVALID_BET";
pub const INVALID_PREDICTION: &str = "INVALID_PREDICTION";
pub const INVALID_TARGET: &str = "INVALID_TARGET";
pub const IMPOSSIBLE_BET: &str = "IMPOSSIBLE_BET";
pub const INVALID_WALLET: &str = "INVALID_WALLET";
pub const GAME_ERROR: &str = "GAME_ERROR";

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 200;

pub(crate) fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "code": code, "message": message } })),
    )
        .into_response()
}

fn game_id(prefix: &str) -> String {
    let mut suffix = [0u8; 4];
    OsRng.fill_bytes(&mut suffix);
    format!("{prefix}_{}_{}", Utc::now().timestamp_millis(), hex(&suffix))
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// History attribution: the verified payer if we have one, then an
/// explicit `x-wallet` header, then anonymous.
fn wallet(payment: Option<&VerifiedPayment>, headers: &HeaderMap) -> String {
    if let Some(address) = payment.and_then(|p| p.payer_address.as_deref()) {
        return address.to_string();
    }
    headers
        .get("x-wallet")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Record the result on-chain when the wager itself was on-chain.
/// Settlement failures are logged and swallowed; the game response does
/// not depend on them.
async fn maybe_settle(
    state: &AppState,
    payment: Option<&VerifiedPayment>,
    bet: f64,
    won: bool,
    payout: f64,
) -> Option<String> {
    let payment = payment?;
    if payment.mode != PaymentMode::Onchain {
        return None;
    }
    let player = payment.payer_address.as_deref()?;
    let payout = if won { payout } else { 0.0 };
    match settle::record_game(&state.rpc, &state.config.payment, player, bet, won, payout).await {
        Ok(tx_hash) => Some(tx_hash),
        Err(err) => {
            warn!(player, %err, "on-chain payout failed");
            None
        }
    }
}

/// Common tail of every game handler: settle, record history, publish
/// the dashboard event, and shape the response.
#[allow(clippy::too_many_arguments)]
async fn complete_game(
    state: &AppState,
    payment: Option<&VerifiedPayment>,
    headers: &HeaderMap,
    id: String,
    game: &'static str,
    bet: f64,
    won: bool,
    payout: f64,
    outcome: Option<String>,
    result: Value,
) -> Response {
    let payout_tx_hash = maybe_settle(state, payment, bet, won, payout).await;

    let record = GameRecord {
        game_id: id.clone(),
        game: game.to_string(),
        wallet: wallet(payment, headers),
        bet,
        payout,
        won,
        outcome,
        timestamp: timestamp(),
    };
    state.history.record(record.clone());
    state.events.publish(record);
    info!(game, game_id = %id, bet, payout, won, "game completed");

    let mut body = match result {
        Value::Object(map) => map,
        other => {
            warn!(game, ?other, "game result did not serialize to an object");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                GAME_ERROR,
                "Internal game error.",
            );
        }
    };
    body.insert("game_id".to_string(), json!(id));
    if let Some(tx_hash) = payout_tx_hash {
        body.insert("payoutTxHash".to_string(), json!(tx_hash));
    }
    if let Some(tx_reference) = payment.and_then(|p| p.tx_reference.as_deref()) {
        body.insert("betTxHash".to_string(), json!(tx_reference));
    }
    Json(Value::Object(body)).into_response()
}

fn parse_body(body: &Bytes) -> Result<Value, Response> {
    serde_json::from_slice(body).map_err(|_| {
        error_response(
            StatusCode::BAD_REQUEST,
            MALFORMED_REQUEST,
            "Request body must be a JSON object.",
        )
    })
}

fn parse_bet(value: &Value, min: f64, max: f64, message: &str) -> Result<f64, Response> {
    match value.get("bet").and_then(Value::as_f64) {
        Some(bet) if bet.is_finite() && bet >= min && bet <= max => Ok(bet),
        _ => Err(error_response(StatusCode::BAD_REQUEST, INVALID_BET, message)),
    }
}

fn parse_client_seed(value: &Value) -> Option<String> {
    value
        .get("clientSeed")
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "Clawsino, the agentic microtransaction casino",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "GET /api/games",
        "health": "GET /health",
        "games": ["POST /api/coinflip", "POST /api/dice", "POST /api/blackjack"],
        "payment": "x402 (USDC on Base)",
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "clawsino",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn list_games() -> Json<Value> {
    Json(json!({
        "games": [
            {
                "id": "coinflip",
                "name": "Coin Flip",
                "description": "Pick heads or tails. 1.96x payout (2% house edge).",
                "endpoint": "POST /api/coinflip",
                "odds": "50/50, 1.96x payout",
                "betRange": { "min": COINFLIP_MIN_BET, "max": COINFLIP_MAX_BET, "currency": "USDC" },
                "params": {
                    "choice": "heads | tails",
                    "bet": "number (0.01 - 1.00)",
                    "clientSeed": "string (optional, for provable fairness)",
                },
            },
            {
                "id": "dice",
                "name": "Dice Roll (2d6)",
                "description": "Predict if the total of 2d6 will be over or under your target. Variable payout based on probability.",
                "endpoint": "POST /api/dice",
                "odds": "Variable, depends on target and prediction",
                "betRange": { "min": DICE_MIN_BET, "max": DICE_MAX_BET, "currency": "USDC" },
                "params": {
                    "prediction": "over | under",
                    "target": "number (2-12)",
                    "bet": "number (0.01 - 1.00)",
                    "clientSeed": "string (optional)",
                },
            },
            {
                "id": "blackjack",
                "name": "Blackjack",
                "description": "Single-hand blackjack. Auto-plays basic strategy (hit < 17). Blackjack pays 2.5x, win pays 2x, push returns bet.",
                "endpoint": "POST /api/blackjack",
                "odds": "~49% win rate, 2x on win, 2.5x on blackjack",
                "betRange": { "min": BLACKJACK_MIN_BET, "max": BLACKJACK_MAX_BET, "currency": "USDC" },
                "params": {
                    "bet": "number (0.10 - 5.00)",
                    "clientSeed": "string (optional)",
                },
            },
        ],
        "fairness": {
            "method": "commit-reveal",
            "description": "Each response includes a fairness_proof object. Verify by checking SHA-256(serverSeed + nonce) === serverSeedHash, and SHA-256(serverSeed + clientSeed + nonce) === combinedHash. The random outcome is derived from the combinedHash.",
        },
        "payment": {
            "protocol": "x402",
            "network": "Base (EIP-155:8453)",
            "currency": "USDC",
            "description": "Include X-PAYMENT header with x402 payment payload. Without it, you'll receive a 402 Payment Required response with payment instructions.",
        },
    }))
}

pub async fn coinflip(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payment: Option<Extension<VerifiedPayment>>,
    body: Bytes,
) -> Response {
    let value = match parse_body(&body) {
        Ok(value) => value,
        Err(response) => return response,
    };
    if value.get("choice").is_none() && value.get("bet").is_none() {
        return error_response(
            StatusCode::BAD_REQUEST,
            MALFORMED_REQUEST,
            "Request body must include 'choice' and 'bet'.",
        );
    }
    let choice: CoinSide = match value
        .get("choice")
        .cloned()
        .and_then(|choice| serde_json::from_value(choice).ok())
    {
        Some(choice) => choice,
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                INVALID_CHOICE,
                "Choice must be \"heads\" or \"tails\".",
            )
        }
    };
    let bet = match parse_bet(
        &value,
        COINFLIP_MIN_BET,
        COINFLIP_MAX_BET,
        "Bet must be a number between 0.01 and 1.00 USDC.",
    ) {
        Ok(bet) => bet,
        Err(response) => return response,
    };

    let result = play_coinflip(&CoinflipRequest {
        choice,
        bet,
        client_seed: parse_client_seed(&value),
    });
    let won = result.won;
    let payout = result.payout;
    let result = json!(result);

    complete_game(
        &state,
        payment.as_deref(),
        &headers,
        game_id("flip"),
        "coinflip",
        bet,
        won,
        payout,
        None,
        result,
    )
    .await
}

pub async fn dice(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payment: Option<Extension<VerifiedPayment>>,
    body: Bytes,
) -> Response {
    let value = match parse_body(&body) {
        Ok(value) => value,
        Err(response) => return response,
    };
    if value.get("prediction").is_none()
        && value.get("target").is_none()
        && value.get("bet").is_none()
    {
        return error_response(
            StatusCode::BAD_REQUEST,
            MALFORMED_REQUEST,
            "Request body must include 'prediction', 'target', and 'bet'.",
        );
    }
    let prediction: DicePrediction = match value
        .get("prediction")
        .cloned()
        .and_then(|prediction| serde_json::from_value(prediction).ok())
    {
        Some(prediction) => prediction,
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                INVALID_PREDICTION,
                "Prediction must be \"over\" or \"under\".",
            )
        }
    };
    let target = match value.get("target").and_then(Value::as_f64) {
        Some(target)
            if target.fract() == 0.0
                && target >= f64::from(DICE_MIN_TARGET)
                && target <= f64::from(DICE_MAX_TARGET) =>
        {
            target as u8
        }
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                INVALID_TARGET,
                "Target must be an integer between 2 and 12.",
            )
        }
    };
    let bet = match parse_bet(
        &value,
        DICE_MIN_BET,
        DICE_MAX_BET,
        "Bet must be a number between 0.01 and 1.00 USDC.",
    ) {
        Ok(bet) => bet,
        Err(response) => return response,
    };

    // Reject structurally unwinnable bets before drawing anything.
    if payout_multiplier(prediction, target) == 0.0 {
        return error_response(
            StatusCode::BAD_REQUEST,
            IMPOSSIBLE_BET,
            "Impossible bet: 0% win probability for this prediction/target.",
        );
    }

    let result = match play_dice(&DiceRequest {
        prediction,
        target,
        bet,
        client_seed: parse_client_seed(&value),
    }) {
        Ok(result) => result,
        Err(err) => {
            warn!(%err, "dice engine rejected a validated request");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                GAME_ERROR,
                "Internal game error.",
            );
        }
    };
    let won = result.won;
    let payout = result.payout;
    let result = json!(result);

    complete_game(
        &state,
        payment.as_deref(),
        &headers,
        game_id("dice"),
        "dice",
        bet,
        won,
        payout,
        None,
        result,
    )
    .await
}

pub async fn blackjack(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payment: Option<Extension<VerifiedPayment>>,
    body: Bytes,
) -> Response {
    let value = match parse_body(&body) {
        Ok(value) => value,
        Err(response) => return response,
    };
    if value.get("bet").is_none() {
        return error_response(
            StatusCode::BAD_REQUEST,
            MALFORMED_REQUEST,
            "Request body must include 'bet'.",
        );
    }
    let bet = match parse_bet(
        &value,
        BLACKJACK_MIN_BET,
        BLACKJACK_MAX_BET,
        "Bet must be a number between 0.10 and 5.00 USDC.",
    ) {
        Ok(bet) => bet,
        Err(response) => return response,
    };

    let result = play_blackjack(&BlackjackRequest {
        bet,
        client_seed: parse_client_seed(&value),
    });
    let won = matches!(
        result.outcome,
        BlackjackOutcome::Win | BlackjackOutcome::Blackjack
    );
    let payout = result.payout;
    let outcome = json!(result.outcome)
        .as_str()
        .map(str::to_string);
    let result = json!(result);

    complete_game(
        &state,
        payment.as_deref(),
        &headers,
        game_id("bj"),
        "blackjack",
        bet,
        won,
        payout,
        outcome,
        result,
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(wallet): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    if wallet != "anonymous" && !is_hex_address(&wallet) {
        return error_response(
            StatusCode::BAD_REQUEST,
            INVALID_WALLET,
            "Invalid wallet address. Must be a valid Ethereum address (0x...).",
        );
    }

    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let (records, total) = state.history.history(&wallet, limit, offset);
    let stats = state.history.stats(&wallet);

    Json(json!({
        "wallet": wallet,
        "totalGames": stats.total_games,
        "totalBet": stats.total_bet,
        "totalPayout": stats.total_payout,
        "netPnl": stats.net_pnl,
        "records": records,
        "limit": limit,
        "offset": offset,
        "total": total,
    }))
    .into_response()
}
