use serde::{Deserialize, Serialize};

use crate::fairness::{
    build_proof, derive_uniform, generate_nonce, generate_server_seed, FairnessProof,
    DEFAULT_CLIENT_SEED,
};

use super::{round_money, COINFLIP_MULTIPLIER};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinSide {
    Heads,
    Tails,
}

#[derive(Clone, Debug)]
pub struct CoinflipRequest {
    pub choice: CoinSide,
    pub bet: f64,
    pub client_seed: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CoinflipResult {
    pub game: &'static str,
    pub result: CoinSide,
    pub choice: CoinSide,
    pub won: bool,
    pub bet: f64,
    pub payout: f64,
    pub multiplier: f64,
    pub fairness_proof: FairnessProof,
}

pub fn play_coinflip(request: &CoinflipRequest) -> CoinflipResult {
    let client_seed = request
        .client_seed
        .as_deref()
        .unwrap_or(DEFAULT_CLIENT_SEED);

    let server_seed = generate_server_seed();
    let nonce = generate_nonce();

    let uniform = derive_uniform(&server_seed, client_seed, &nonce);
    let result = if uniform < 0.5 {
        CoinSide::Heads
    } else {
        CoinSide::Tails
    };
    let won = result == request.choice;
    let payout = if won {
        round_money(request.bet * COINFLIP_MULTIPLIER)
    } else {
        0.0
    };

    CoinflipResult {
        game: "coinflip",
        result,
        choice: request.choice,
        won,
        bet: request.bet,
        payout,
        multiplier: COINFLIP_MULTIPLIER,
        fairness_proof: build_proof(&server_seed, client_seed, &nonce),
    }
}
