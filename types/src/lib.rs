//! Shared types for clawsino: the commit-reveal fairness engine and the
//! game outcome engines built on top of it.
//!
//! Everything in this crate is synchronous and request-scoped. A game is
//! played by generating one fresh server seed and nonce, drawing one or
//! more uniform values from them, and attaching a [`FairnessProof`] that
//! lets the caller recompute the outcome after the seed is revealed.

pub mod casino;
pub mod fairness;

pub use casino::{
    play_blackjack, play_coinflip, play_dice, payout_multiplier, win_probability, BlackjackOutcome,
    BlackjackRequest, BlackjackResult, Card, CoinSide, CoinflipRequest, CoinflipResult,
    DicePrediction, DiceRequest, DiceResult, GameError,
};
pub use fairness::{
    build_proof, commitment, derive_uniform, generate_nonce, generate_server_seed, sha256_hex,
    verify_proof, FairnessCommitment, FairnessProof, DEFAULT_CLIENT_SEED,
};
