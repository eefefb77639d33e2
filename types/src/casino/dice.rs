use serde::{Deserialize, Serialize};

use crate::fairness::{
    build_proof, derive_uniform, generate_nonce, generate_server_seed, FairnessProof,
    DEFAULT_CLIENT_SEED,
};

use super::{
    round_money, round_multiplier, GameError, DICE_HOUSE_EDGE, DICE_MAX_TARGET, DICE_MIN_TARGET,
};

/// Ways to roll each 2d6 total from 2 through 12, out of 36.
const ROLL_COUNTS: [u8; 11] = [1, 2, 3, 4, 5, 6, 5, 4, 3, 2, 1];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DicePrediction {
    Over,
    Under,
}

#[derive(Clone, Debug)]
pub struct DiceRequest {
    pub prediction: DicePrediction,
    pub target: u8,
    pub bet: f64,
    pub client_seed: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DiceResult {
    pub game: &'static str,
    pub roll: [u8; 2],
    pub total: u8,
    pub prediction: DicePrediction,
    pub target: u8,
    pub won: bool,
    pub bet: f64,
    pub payout: f64,
    pub multiplier: f64,
    pub fairness_proof: FairnessProof,
}

/// Probability of winning a prediction against a target, over the
/// triangular 2d6 distribution.
pub fn win_probability(prediction: DicePrediction, target: u8) -> f64 {
    let mut ways: u32 = 0;
    for total in DICE_MIN_TARGET..=DICE_MAX_TARGET {
        let matches = match prediction {
            DicePrediction::Over => total > target,
            DicePrediction::Under => total < target,
        };
        if matches {
            ways += u32::from(ROLL_COUNTS[usize::from(total - DICE_MIN_TARGET)]);
        }
    }
    f64::from(ways) / 36.0
}

/// Payout multiplier for a prediction/target pair.
///
/// Zero when the win probability is zero ("over 12" and "under 2" are
/// structurally impossible); otherwise the fair inverse probability less
/// the house edge, rounded to 4 decimals.
pub fn payout_multiplier(prediction: DicePrediction, target: u8) -> f64 {
    let probability = win_probability(prediction, target);
    if probability <= 0.0 {
        return 0.0;
    }
    round_multiplier((1.0 / probability) * (1.0 - DICE_HOUSE_EDGE))
}

fn roll_dice(server_seed: &str, client_seed: &str, nonce: &str) -> [u8; 2] {
    let d1 = derive_uniform(server_seed, client_seed, &format!("{nonce}:d1"));
    let d2 = derive_uniform(server_seed, client_seed, &format!("{nonce}:d2"));
    [(d1 * 6.0) as u8 + 1, (d2 * 6.0) as u8 + 1]
}

pub fn play_dice(request: &DiceRequest) -> Result<DiceResult, GameError> {
    if request.target < DICE_MIN_TARGET || request.target > DICE_MAX_TARGET {
        return Err(GameError::TargetOutOfRange {
            got: i64::from(request.target),
            min: DICE_MIN_TARGET,
            max: DICE_MAX_TARGET,
        });
    }

    let client_seed = request
        .client_seed
        .as_deref()
        .unwrap_or(DEFAULT_CLIENT_SEED);

    let server_seed = generate_server_seed();
    let nonce = generate_nonce();

    let roll = roll_dice(&server_seed, client_seed, &nonce);
    let total = roll[0] + roll[1];

    let won = match request.prediction {
        DicePrediction::Over => total > request.target,
        DicePrediction::Under => total < request.target,
    };

    let multiplier = payout_multiplier(request.prediction, request.target);
    let payout = if won {
        round_money(request.bet * multiplier)
    } else {
        0.0
    };

    Ok(DiceResult {
        game: "dice",
        roll,
        total,
        prediction: request.prediction,
        target: request.target,
        won,
        bet: request.bet,
        payout,
        multiplier,
        fairness_proof: build_proof(&server_seed, client_seed, &nonce),
    })
}
