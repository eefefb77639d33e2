//! Clawsino server: HTTP routes, the x402-style payment gate, and the
//! in-memory bookkeeping that observes completed games.
//!
//! Game and fairness logic lives in `clawsino-types`; this crate wires
//! it behind axum with payment verification in front.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod events;
pub mod history;
pub mod payment;

pub use api::Api;
pub use config::{ConfigError, PaymentConfig, ServerConfig};

use events::EventBus;
use history::HistoryStore;

pub struct AppState {
    pub config: ServerConfig,
    pub history: HistoryStore,
    pub events: EventBus,
    /// Shared HTTP client for ledger lookups and settlement, bounded by
    /// the configured RPC timeout.
    pub rpc: reqwest::Client,
}

impl AppState {
    pub fn new(config: ServerConfig) -> anyhow::Result<Arc<Self>> {
        config.payment.validate()?;
        let rpc = reqwest::Client::builder()
            .timeout(config.payment.rpc_timeout)
            .build()?;
        Ok(Arc::new(Self {
            config,
            history: HistoryStore::new(),
            events: EventBus::new(),
            rpc,
        }))
    }
}
