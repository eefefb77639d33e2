//! In-memory wager history.
//!
//! Nothing here survives the process: the store exists so the dashboard
//! and the `/api/history` route can show recent activity. A bounded
//! global log evicts oldest-first; a per-wallet index (lowercased key)
//! serves paged lookups and stats.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde::Serialize;

/// Maximum records kept in memory before oldest-first eviction.
pub const MAX_HISTORY: usize = 10_000;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub game_id: String,
    pub game: String,
    pub wallet: String,
    pub bet: f64,
    pub payout: f64,
    pub won: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    pub timestamp: String,
}

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletStats {
    pub total_games: usize,
    pub total_bet: f64,
    pub total_payout: f64,
    pub net_pnl: f64,
}

#[derive(Default)]
struct Inner {
    all: VecDeque<GameRecord>,
    by_wallet: HashMap<String, Vec<GameRecord>>,
}

pub struct HistoryStore {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity,
        }
    }

    pub fn record(&self, record: GameRecord) {
        let mut inner = self.inner.lock().expect("history lock poisoned");
        if inner.all.len() == self.capacity {
            if let Some(evicted) = inner.all.pop_front() {
                let key = evicted.wallet.to_lowercase();
                if let Some(records) = inner.by_wallet.get_mut(&key) {
                    if let Some(position) =
                        records.iter().position(|r| r.game_id == evicted.game_id)
                    {
                        records.remove(position);
                    }
                    if records.is_empty() {
                        inner.by_wallet.remove(&key);
                    }
                }
            }
        }
        let key = record.wallet.to_lowercase();
        inner.all.push_back(record.clone());
        inner.by_wallet.entry(key).or_default().push(record);
    }

    /// Newest-first page of a wallet's records, plus the wallet's total.
    pub fn history(&self, wallet: &str, limit: usize, offset: usize) -> (Vec<GameRecord>, usize) {
        let inner = self.inner.lock().expect("history lock poisoned");
        let records = match inner.by_wallet.get(&wallet.to_lowercase()) {
            Some(records) => records,
            None => return (Vec::new(), 0),
        };
        let total = records.len();
        let end = total.saturating_sub(offset);
        let start = end.saturating_sub(limit);
        let page = records[start..end].iter().rev().cloned().collect();
        (page, total)
    }

    pub fn stats(&self, wallet: &str) -> WalletStats {
        let inner = self.inner.lock().expect("history lock poisoned");
        let records = inner
            .by_wallet
            .get(&wallet.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let total_bet: f64 = records.iter().map(|r| r.bet).sum();
        let total_payout: f64 = records.iter().map(|r| r.payout).sum();
        WalletStats {
            total_games: records.len(),
            total_bet: round6(total_bet),
            total_payout: round6(total_payout),
            net_pnl: round6(total_payout - total_bet),
        }
    }
}
