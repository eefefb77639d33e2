//! Game outcome engines.
//!
//! Each engine follows the same contract: take a bet and an optional
//! client seed, generate one fresh server seed and nonce, draw uniforms
//! through the fairness engine, map them to an outcome and multiplier,
//! and attach the proof built from the same seed material. Engines never
//! touch payments and never persist anything.

mod blackjack;
mod coinflip;
mod constants;
mod dice;

pub use blackjack::{play_blackjack, BlackjackOutcome, BlackjackRequest, BlackjackResult, Card};
pub use coinflip::{play_coinflip, CoinSide, CoinflipRequest, CoinflipResult};
pub use constants::*;
pub use dice::{
    payout_multiplier, play_dice, win_probability, DicePrediction, DiceRequest, DiceResult,
};

use thiserror::Error as ThisError;

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum GameError {
    #[error("target must be between {min} and {max} (got {got})")]
    TargetOutOfRange { got: i64, min: u8, max: u8 },
}

/// Round a money amount to 6 decimal places.
pub(crate) fn round_money(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Round a payout multiplier to 4 decimal places.
pub(crate) fn round_multiplier(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests;
