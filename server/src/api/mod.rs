use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use governor::middleware::NoOpMiddleware;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::{payment, AppState};

mod http;
mod ws;

pub struct Api {
    state: Arc<AppState>,
}

type IpGovernorConfig =
    tower_governor::governor::GovernorConfig<SmartIpKeyExtractor, NoOpMiddleware>;

impl Api {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub fn router(&self) -> Router {
        // Game routes carry the payment gate and, when configured, a
        // per-IP rate limit. Info routes stay open.
        let game_routes = Router::new()
            .route("/coinflip", post(http::coinflip))
            .route("/dice", post(http::dice))
            .route("/blackjack", post(http::blackjack))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                payment::payment_gate,
            ));
        let game_routes = match self.governor_config() {
            Some(config) => game_routes.layer(GovernorLayer { config }),
            None => game_routes,
        };

        let api_routes = Router::new()
            .route("/games", get(http::list_games))
            .route("/history/:wallet", get(http::history))
            .merge(game_routes);

        Router::new()
            .route("/", get(http::root))
            .route("/health", get(http::health))
            .route("/ws", get(ws::dashboard_ws))
            .nest("/api", api_routes)
            .layer(CorsLayer::permissive())
            .layer(middleware::from_fn(request_id_middleware))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    fn governor_config(&self) -> Option<Arc<IpGovernorConfig>> {
        let rate_per_minute = self.state.config.rate_limit_per_minute?;
        let burst_size = self.state.config.rate_limit_burst?;
        if rate_per_minute == 0 || burst_size == 0 {
            return None;
        }
        let nanos_per_request = (60_000_000_000u64 / rate_per_minute).max(1);
        let config = GovernorConfigBuilder::default()
            .period(Duration::from_nanos(nanos_per_request))
            .burst_size(burst_size)
            .key_extractor(SmartIpKeyExtractor)
            .finish();
        if config.is_none() {
            tracing::warn!("invalid rate-limit config; rate limiting disabled");
        }
        config.map(Arc::new)
    }
}

async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(header::HeaderName::from_static("x-request-id"))
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let mut response = next.run(req).await;
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(header::HeaderName::from_static("x-request-id"), header_value);
    }
    if response.status() != StatusCode::SWITCHING_PROTOCOLS {
        tracing::info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "http.request"
        );
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        PaymentConfig, ServerConfig, DEFAULT_ASSET, DEFAULT_DESCRIPTION, DEFAULT_FACILITATOR_URL,
        DEFAULT_NETWORK, DEFAULT_PAY_TO, DEFAULT_PORT, DEFAULT_RPC_TIMEOUT,
    };
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use clawsino_types::verify_proof;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_router(dev_mode: bool, demo_mode: bool) -> Router {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            rate_limit_per_minute: None,
            rate_limit_burst: None,
            payment: PaymentConfig {
                pay_to: DEFAULT_PAY_TO.to_string(),
                network: DEFAULT_NETWORK.to_string(),
                asset: DEFAULT_ASSET.to_string(),
                facilitator_url: DEFAULT_FACILITATOR_URL.to_string(),
                description: DEFAULT_DESCRIPTION.to_string(),
                dev_mode,
                demo_mode,
                onchain_mode: false,
                rpc_url: None,
                usdc_address: None,
                payout_address: None,
                game_server_private_key: None,
                rpc_timeout: DEFAULT_RPC_TIMEOUT,
            },
        };
        let state = AppState::new(config).expect("test state");
        Api::new(state).router()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn post_json(uri: &str, body: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn post_json_paid(uri: &str, body: &str, payment: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-payment", payment)
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn health_and_root_are_open() {
        let router = test_router(true, false);
        let response = router
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "clawsino");

        let response = router
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn games_catalog_bypasses_the_gate_in_demo_mode() {
        let router = test_router(false, true);
        let response = router
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/games")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["games"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn missing_payment_header_yields_402_with_requirements() {
        let router = test_router(false, true);
        let response = router
            .oneshot(post_json("/api/coinflip", r#"{"choice":"heads","bet":0.5}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Payment Required");
        let requirement = &body["paymentRequirements"][0];
        assert_eq!(requirement["scheme"], "exact");
        assert_eq!(requirement["maxAmountRequired"], "0.500000");
        assert_eq!(requirement["resource"], "/api/coinflip");
        assert_eq!(requirement["maxTimeoutSeconds"], 60);
        assert_eq!(body["facilitatorUrl"], DEFAULT_FACILITATOR_URL);
    }

    #[tokio::test]
    async fn invalid_bet_is_400_never_402() {
        let router = test_router(false, true);
        let response = router
            .clone()
            .oneshot(post_json("/api/coinflip", r#"{"choice":"heads","bet":-1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router
            .oneshot(post_json("/api/dice", r#"{"prediction":"over"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn paid_coinflip_returns_a_verifiable_result() {
        let router = test_router(false, true);
        let response = router
            .oneshot(post_json_paid(
                "/api/coinflip",
                r#"{"choice":"heads","bet":0.5}"#,
                "x402:dev:test-tx-123",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["game"], "coinflip");
        assert_eq!(body["betTxHash"], "test-tx-123");
        assert!(body["game_id"].as_str().unwrap().starts_with("flip_"));
        let payout = body["payout"].as_f64().unwrap();
        if body["won"].as_bool().unwrap() {
            assert!((payout - 0.98).abs() < 1e-9);
        } else {
            assert_eq!(payout, 0.0);
        }
        let proof = serde_json::from_value(body["fairness_proof"].clone()).unwrap();
        assert!(verify_proof(&proof));
    }

    #[tokio::test]
    async fn dev_mode_skips_the_payment_handshake() {
        let router = test_router(true, false);
        let response = router
            .oneshot(post_json("/api/dice", r#"{"prediction":"over","target":7,"bet":0.1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["game"], "dice");
        assert!(body.get("betTxHash").is_none());
        let total = body["total"].as_u64().unwrap();
        assert!((2..=12).contains(&total));
    }

    #[tokio::test]
    async fn impossible_dice_bet_is_rejected_before_any_draw() {
        let router = test_router(true, false);
        let response = router
            .oneshot(post_json(
                "/api/dice",
                r#"{"prediction":"over","target":12,"bet":0.1}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "IMPOSSIBLE_BET");
    }

    #[tokio::test]
    async fn blackjack_validates_its_own_bet_range() {
        let router = test_router(true, false);
        let response = router
            .clone()
            .oneshot(post_json("/api/blackjack", r#"{"bet":0.05}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INVALID_BET");

        let response = router
            .oneshot(post_json("/api/blackjack", r#"{"bet":1.0}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["playerHand"].as_array().unwrap().len() >= 2);
        assert!(body["outcome"].is_string());
    }

    #[tokio::test]
    async fn history_attributes_games_to_the_wallet_header() {
        let wallet = "0x2222222222222222222222222222222222222222";
        let router = test_router(true, false);
        let response = router
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/api/coinflip")
                    .header("content-type", "application/json")
                    .header("x-wallet", wallet)
                    .body(Body::from(r#"{"choice":"tails","bet":0.25}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(
                HttpRequest::builder()
                    .uri(format!("/api/history/{wallet}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["totalGames"], 1);
        assert_eq!(body["records"][0]["wallet"], wallet);
        assert_eq!(body["records"][0]["bet"], 0.25);
    }

    #[tokio::test]
    async fn history_rejects_malformed_wallets() {
        let router = test_router(true, false);
        let response = router
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/history/not-a-wallet")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INVALID_WALLET");
    }
}
