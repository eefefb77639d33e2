use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3402;
pub const DEFAULT_NETWORK: &str = "eip155:8453";
pub const DEFAULT_ASSET: &str = "USDC";
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";
pub const DEFAULT_DESCRIPTION: &str = "Clawsino, the agentic microtransaction casino";
pub const DEFAULT_PAY_TO: &str = "0x0000000000000000000000000000000000000000";
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be a 0x-prefixed 20-byte hex address (got {value})")]
    InvalidAddress { field: &'static str, value: String },
    #[error("{field} is required in on-chain mode")]
    MissingOnchainField { field: &'static str },
    #[error("{field} must be a 32-byte hex private key")]
    InvalidPrivateKey { field: &'static str },
    #[error("{field} must be > 0")]
    InvalidNonZero { field: &'static str },
}

/// Payment gate configuration shared by the middleware, the verifiers,
/// and the settlement path.
#[derive(Clone, Debug)]
pub struct PaymentConfig {
    pub pay_to: String,
    pub network: String,
    pub asset: String,
    pub facilitator_url: String,
    pub description: String,
    /// Skip payment verification entirely (local development). Ignored
    /// when demo or on-chain mode is set.
    pub dev_mode: bool,
    /// Enforce the 402 handshake but accept dev payment headers.
    pub demo_mode: bool,
    /// Verify real token transfers against the configured ledger.
    pub onchain_mode: bool,
    pub rpc_url: Option<String>,
    pub usdc_address: Option<String>,
    pub payout_address: Option<String>,
    pub game_server_private_key: Option<String>,
    pub rpc_timeout: Duration,
}

impl PaymentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_hex_address(&self.pay_to) {
            return Err(ConfigError::InvalidAddress {
                field: "pay_to",
                value: self.pay_to.clone(),
            });
        }
        if self.onchain_mode {
            if self.rpc_url.as_deref().map(str::trim).unwrap_or("").is_empty() {
                return Err(ConfigError::MissingOnchainField { field: "rpc_url" });
            }
            match self.usdc_address.as_deref() {
                None => return Err(ConfigError::MissingOnchainField { field: "usdc_address" }),
                Some(address) if !is_hex_address(address) => {
                    return Err(ConfigError::InvalidAddress {
                        field: "usdc_address",
                        value: address.to_string(),
                    })
                }
                Some(_) => {}
            }
        }
        if let Some(address) = self.payout_address.as_deref() {
            if !is_hex_address(address) {
                return Err(ConfigError::InvalidAddress {
                    field: "payout_address",
                    value: address.to_string(),
                });
            }
        }
        if let Some(key) = self.game_server_private_key.as_deref() {
            let stripped = key.strip_prefix("0x").unwrap_or(key);
            if stripped.len() != 64 || !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ConfigError::InvalidPrivateKey {
                    field: "game_server_private_key",
                });
            }
        }
        if self.rpc_timeout.is_zero() {
            return Err(ConfigError::InvalidNonZero { field: "rpc_timeout" });
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Per-IP rate limit on the game routes, requests per minute.
    pub rate_limit_per_minute: Option<u64>,
    pub rate_limit_burst: Option<u32>,
    pub payment: PaymentConfig,
}

pub fn is_hex_address(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .map(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}
