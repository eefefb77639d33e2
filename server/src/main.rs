use std::net::{IpAddr, SocketAddr};

use anyhow::Context;
use clap::Parser;
use tracing::info;

use clawsino_server::config::{
    PaymentConfig, ServerConfig, DEFAULT_ASSET, DEFAULT_DESCRIPTION, DEFAULT_FACILITATOR_URL,
    DEFAULT_NETWORK, DEFAULT_PAY_TO, DEFAULT_PORT, DEFAULT_RPC_TIMEOUT,
};
use clawsino_server::payment::{resolve_mode, PaymentMode};
use clawsino_server::{Api, AppState};

#[derive(Debug, Parser)]
#[command(name = "clawsino-server", about = "Pay-per-play game backend")]
struct Args {
    /// Host interface to bind (default: localhost).
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to listen on (falls back to the PORT env var).
    #[arg(short, long)]
    port: Option<u16>,

    /// Enforce the 402 handshake but accept dev payment headers.
    #[arg(long)]
    demo: bool,

    /// Verify payments as real token transfers on the configured chain.
    #[arg(long)]
    onchain: bool,

    /// Disable the dev-mode payment skip.
    #[arg(long)]
    production: bool,

    /// Address that receives wagers (falls back to PAY_TO_ADDRESS).
    #[arg(long)]
    pay_to: Option<String>,

    /// JSON-RPC endpoint for on-chain verification (falls back to RPC_URL).
    #[arg(long)]
    rpc_url: Option<String>,

    /// Token contract to verify transfers against (falls back to USDC_ADDRESS).
    #[arg(long)]
    usdc_address: Option<String>,

    /// Payout contract for on-chain settlement (falls back to PAYOUT_ADDRESS).
    #[arg(long)]
    payout_address: Option<String>,

    /// x402 network identifier (falls back to NETWORK).
    #[arg(long)]
    network: Option<String>,

    /// Asset name advertised in payment requirements (falls back to ASSET).
    #[arg(long)]
    asset: Option<String>,

    /// x402 facilitator URL (falls back to FACILITATOR_URL).
    #[arg(long)]
    facilitator_url: Option<String>,

    /// Per-IP rate limit on game routes, requests per minute.
    #[arg(long)]
    rate_limit_per_minute: Option<u64>,

    /// Burst size for the game-route rate limit.
    #[arg(long)]
    rate_limit_burst: Option<u32>,
}

fn env_string(var: &str) -> Option<String> {
    std::env::var(var).ok().and_then(|value| {
        let trimmed = value.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    env_string(var).and_then(|value| value.parse().ok())
}

fn build_config(args: &Args) -> ServerConfig {
    let x402_mode = env_string("X402_MODE");
    let demo_mode = args.demo || x402_mode.as_deref() == Some("demo");
    let onchain_mode = args.onchain || x402_mode.as_deref() == Some("onchain");
    // The private key never travels through argv.
    let game_server_private_key = env_string("GAME_SERVER_PRIVATE_KEY");

    ServerConfig {
        host: args.host.to_string(),
        port: args
            .port
            .or_else(|| env_parse("PORT"))
            .unwrap_or(DEFAULT_PORT),
        rate_limit_per_minute: args
            .rate_limit_per_minute
            .or_else(|| env_parse("RATE_LIMIT_PER_MIN")),
        rate_limit_burst: args.rate_limit_burst.or_else(|| env_parse("RATE_LIMIT_BURST")),
        payment: PaymentConfig {
            pay_to: args
                .pay_to
                .clone()
                .or_else(|| env_string("PAY_TO_ADDRESS"))
                .unwrap_or_else(|| DEFAULT_PAY_TO.to_string()),
            network: args
                .network
                .clone()
                .or_else(|| env_string("NETWORK"))
                .unwrap_or_else(|| DEFAULT_NETWORK.to_string()),
            asset: args
                .asset
                .clone()
                .or_else(|| env_string("ASSET"))
                .unwrap_or_else(|| DEFAULT_ASSET.to_string()),
            facilitator_url: args
                .facilitator_url
                .clone()
                .or_else(|| env_string("FACILITATOR_URL"))
                .unwrap_or_else(|| DEFAULT_FACILITATOR_URL.to_string()),
            description: DEFAULT_DESCRIPTION.to_string(),
            dev_mode: !args.production,
            demo_mode,
            onchain_mode,
            rpc_url: args.rpc_url.clone().or_else(|| env_string("RPC_URL")),
            usdc_address: args
                .usdc_address
                .clone()
                .or_else(|| env_string("USDC_ADDRESS")),
            payout_address: args
                .payout_address
                .clone()
                .or_else(|| env_string("PAYOUT_ADDRESS")),
            game_server_private_key,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = build_config(&args);
    let mode = match resolve_mode(&config.payment) {
        PaymentMode::Dev => "DEV (payments skipped)",
        PaymentMode::Demo => "DEMO (402 enforced, dev payments accepted)",
        PaymentMode::Onchain => "ONCHAIN (402 enforced, ledger verified)",
    };
    info!(
        mode,
        pay_to = %config.payment.pay_to,
        network = %config.payment.network,
        "clawsino server starting"
    );

    let addr = SocketAddr::new(args.host, config.port);
    let state = AppState::new(config)?;
    let app = Api::new(state).router();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("axum server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_dev_mode_on_the_default_port() {
        let args = Args::parse_from(["clawsino-server"]);
        let config = build_config(&args);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.payment.dev_mode);
        assert!(!config.payment.demo_mode);
        assert!(!config.payment.onchain_mode);
        assert_eq!(resolve_mode(&config.payment), PaymentMode::Dev);
    }

    #[test]
    fn flags_select_modes_and_addresses() {
        let args = Args::parse_from([
            "clawsino-server",
            "--onchain",
            "--pay-to",
            "0x1111111111111111111111111111111111111111",
            "--rpc-url",
            "http://127.0.0.1:8545",
            "--usdc-address",
            "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913",
            "--port",
            "8080",
        ]);
        let config = build_config(&args);
        assert_eq!(config.port, 8080);
        assert!(config.payment.onchain_mode);
        assert_eq!(resolve_mode(&config.payment), PaymentMode::Onchain);
        assert_eq!(
            config.payment.pay_to,
            "0x1111111111111111111111111111111111111111"
        );
        config.payment.validate().expect("valid on-chain config");
    }

    #[test]
    fn production_disables_the_dev_skip() {
        let args = Args::parse_from(["clawsino-server", "--production"]);
        let config = build_config(&args);
        assert!(!config.payment.dev_mode);
        assert_eq!(resolve_mode(&config.payment), PaymentMode::Demo);
    }
}
